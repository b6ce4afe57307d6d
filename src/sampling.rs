use std::collections::BTreeMap;

use nalgebra::Vector3;
use ndarray::prelude::*;
use ndarray::{Data, RemoveAxis, Slice};
use rand::Rng;

use crate::error::{Error, Result};
use crate::pointcloud::PointCloud;

/// How [`resample`] fits an array to the requested number of points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResampleMode {
    /// Keep the array as it is. The mask is all true.
    None,
    /// Copy the first `min(n, target_n)` rows into a zero array of `target_n`
    /// rows. Extra rows are dropped, so `n > target_n` truncates.
    Pad,
    /// Draw `target_n` rows uniformly without replacement.
    Sample,
    /// [`ResampleMode::Sample`] followed by [`ResampleMode::Pad`].
    PadAndSample,
}

/// Output of [`resample`].
#[derive(Debug, Clone, PartialEq)]
pub struct Resampled<D: Dimension> {
    /// Shape `[..., target_n, m]`.
    pub array: Array<f32, D>,
    /// Shape `[..., target_n, 1]`, true for rows holding input data.
    pub mask: Array<bool, D>,
}

/// Fits the point axis (the second to last) of `array` to `target_n` rows.
/// See [`resample_with_rng`].
pub fn resample<S, D>(array: &ArrayBase<S, D>, target_n: usize, mode: ResampleMode) -> Result<Resampled<D>>
where
    S: Data<Elem = f32>,
    D: RemoveAxis,
{
    resample_with_rng(array, target_n, mode, &mut rand::thread_rng())
}

/// Fits the point axis (the second to last) of `array` to `target_n` rows.
///
/// The array has shape `[..., n, m]`; any number of leading batch dimensions
/// is accepted, and when sampling the same row selection is used for every
/// batch element. Sampling draws from `rng`, so a seeded generator gives
/// reproducible results.
///
/// # Arguments
///
/// * array - Array of shape `[..., n, m]`.
/// * target_n - Number of rows of the output.
/// * mode - See [`ResampleMode`].
/// * rng - Random source, used only by the sampling modes.
///
/// # Returns
///
/// The resized array and its validity mask. Fails with
/// [`Error::InvalidArgument`] if the array has less than two dimensions, or if
/// sampling asks for more rows than available.
pub fn resample_with_rng<S, D, R>(
    array: &ArrayBase<S, D>,
    target_n: usize,
    mode: ResampleMode,
    rng: &mut R,
) -> Result<Resampled<D>>
where
    S: Data<Elem = f32>,
    D: RemoveAxis,
    R: Rng + ?Sized,
{
    if array.ndim() < 2 {
        return Err(Error::invalid_argument(format!(
            "expected an array of shape [..., n, m], got {:?}",
            array.shape()
        )));
    }

    let array = match mode {
        ResampleMode::Sample | ResampleMode::PadAndSample => sample_rows(array, target_n, rng)?,
        ResampleMode::None | ResampleMode::Pad => array.to_owned(),
    };

    match mode {
        ResampleMode::Pad | ResampleMode::PadAndSample => Ok(pad_rows(&array, target_n)),
        ResampleMode::None | ResampleMode::Sample => {
            let mask = Array::from_elem(mask_dim(&array.raw_dim()), true);
            Ok(Resampled { array, mask })
        }
    }
}

fn mask_dim<D: Dimension>(dim: &D) -> D {
    let mut dim = dim.clone();
    let last = dim.ndim() - 1;
    dim[last] = 1;
    dim
}

fn sample_rows<S, D, R>(array: &ArrayBase<S, D>, target_n: usize, rng: &mut R) -> Result<Array<f32, D>>
where
    S: Data<Elem = f32>,
    D: RemoveAxis,
    R: Rng + ?Sized,
{
    let point_axis = Axis(array.ndim() - 2);
    let n = array.len_of(point_axis);
    if target_n > n {
        return Err(Error::invalid_argument(format!(
            "cannot sample {target_n} points without replacement from {n}"
        )));
    }

    let indices = rand::seq::index::sample(rng, n, target_n).into_vec();
    Ok(array.select(point_axis, &indices))
}

fn pad_rows<D: Dimension>(array: &Array<f32, D>, target_n: usize) -> Resampled<D> {
    let point_axis = Axis(array.ndim() - 2);
    let len = target_n.min(array.len_of(point_axis));

    let mut dim = array.raw_dim();
    dim[point_axis.index()] = target_n;

    let mut out = Array::<f32, D>::zeros(dim.clone());
    out.slice_axis_mut(point_axis, Slice::from(0..len))
        .assign(&array.slice_axis(point_axis, Slice::from(0..len)));

    let mut mask = Array::from_elem(mask_dim(&dim), false);
    mask.slice_axis_mut(point_axis, Slice::from(0..len)).fill(true);

    Resampled { array: out, mask }
}

pub trait Downsample {
    type Output;
    fn downsample(&self, voxel_size: f32) -> Self::Output;
}

struct VoxelAccum {
    point: Vector3<f32>,
    color: Vector3<f32>,
    normal: Vector3<f32>,
    count: usize,
}

impl Default for VoxelAccum {
    fn default() -> Self {
        Self {
            point: Vector3::zeros(),
            color: Vector3::zeros(),
            normal: Vector3::zeros(),
            count: 0,
        }
    }
}

/// Replaces all the points falling in the same `voxel_size` cube by their
/// mean. Colors are averaged and normals are averaged then re-normalized.
/// Points with non finite coordinates are dropped. The output is ordered by
/// voxel coordinate, so the result does not depend on the input order.
pub fn voxel_downsample(cloud: &PointCloud, voxel_size: f32) -> Result<PointCloud> {
    if !voxel_size.is_finite() || voxel_size <= 0.0 {
        return Err(Error::invalid_argument(format!(
            "voxel size must be finite and positive, got {voxel_size}"
        )));
    }
    cloud.validate()?;

    let mut voxels: BTreeMap<(i64, i64, i64), VoxelAccum> = BTreeMap::new();
    for (idx, point) in cloud.points.outer_iter().enumerate() {
        let point = Vector3::new(point[0], point[1], point[2]);
        if !point.iter().all(|v| v.is_finite()) {
            continue;
        }

        let key = (
            (point[0] / voxel_size).floor() as i64,
            (point[1] / voxel_size).floor() as i64,
            (point[2] / voxel_size).floor() as i64,
        );
        let accum = voxels.entry(key).or_default();
        accum.point += point;
        if let Some(colors) = &cloud.colors {
            accum.color += Vector3::new(colors[[idx, 0]], colors[[idx, 1]], colors[[idx, 2]]);
        }
        if let Some(normals) = &cloud.normals {
            accum.normal += Vector3::new(normals[[idx, 0]], normals[[idx, 1]], normals[[idx, 2]]);
        }
        accum.count += 1;
    }

    let len = voxels.len();
    let mut points = Array2::<f32>::zeros((len, 3));
    let mut colors = cloud.colors.as_ref().map(|_| Array2::<f32>::zeros((len, 3)));
    let mut normals = cloud.normals.as_ref().map(|_| Array2::<f32>::zeros((len, 3)));

    for (i, accum) in voxels.values().enumerate() {
        let count = accum.count as f32;
        let mean = accum.point / count;
        points.row_mut(i).assign(&arr1(mean.as_slice()));

        if let Some(colors) = colors.as_mut() {
            colors.row_mut(i).assign(&arr1((accum.color / count).as_slice()));
        }
        if let Some(normals) = normals.as_mut() {
            let normal = accum.normal.try_normalize(f32::EPSILON).unwrap_or_else(Vector3::zeros);
            normals.row_mut(i).assign(&arr1(normal.as_slice()));
        }
    }

    Ok(PointCloud {
        points,
        colors,
        normals,
    })
}

impl Downsample for PointCloud {
    type Output = Result<PointCloud>;

    fn downsample(&self, voxel_size: f32) -> Self::Output {
        voxel_downsample(self, voxel_size)
    }
}
