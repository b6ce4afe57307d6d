use ndarray::prelude::*;

use crate::error::{Error, Result};
use crate::normalize::normalize_inplace;
use crate::normals::DEFAULT_NORMAL_NEIGHBORS;
use crate::pointcloud::PointCloud;

/// Output of [`extract`].
#[derive(Debug, Clone, PartialEq)]
pub struct Extracted {
    /// Shape `[1, n, 6]`: positions in channels 0..3 and colors in 3..6.
    pub batch: Array3<f32>,
    /// Positions, normalized if requested. Shape `[n, 3]`.
    pub positions: Array2<f32>,
    /// Colors. Shape `[n, 3]`.
    pub colors: Array2<f32>,
}

/// Packs the positions and colors of a point cloud into a single-batch
/// `xyz + rgb` array.
///
/// # Arguments
///
/// * cloud - Point cloud with colors.
/// * normalize - Whether to center and scale the positions with
///   [`crate::normalize::normalize`]. Colors are never touched.
pub fn extract(cloud: &PointCloud, normalize: bool) -> Result<Extracted> {
    let len = cloud.len();
    let colors = match &cloud.colors {
        Some(colors) if colors.nrows() >= len && colors.ncols() == 3 => {
            colors.slice(s![..len, ..]).to_owned()
        }
        Some(colors) => {
            return Err(Error::invalid_argument(format!(
                "expected colors of shape [{len}, 3], got {:?}",
                colors.shape()
            )))
        }
        None if len == 0 => Array2::zeros((0, 3)),
        None => {
            return Err(Error::invalid_argument(format!(
                "point cloud with {len} points has no colors"
            )))
        }
    };

    let mut positions = cloud.points.clone();
    if normalize {
        normalize_inplace(&mut positions)?;
    }

    let mut batch = Array3::<f32>::zeros((1, len, 6));
    batch.slice_mut(s![0, .., ..3]).assign(&positions);
    batch.slice_mut(s![0, .., 3..]).assign(&colors);

    Ok(Extracted {
        batch,
        positions,
        colors,
    })
}

/// Drops leading axes of length 1 until the array has at most 2 dimensions.
fn squeeze_leading(mut array: ArrayViewD<f32>) -> ArrayViewD<f32> {
    while array.ndim() > 2 && array.len_of(Axis(0)) == 1 {
        array = array.index_axis_move(Axis(0), 0);
    }
    array
}

fn as_rows<'a>(array: ArrayViewD<'a, f32>, what: &str) -> Result<ArrayView2<'a, f32>> {
    let array = squeeze_leading(array);
    if array.ndim() > 2 {
        return Err(Error::invalid_argument(format!(
            "batching not implemented: {what} has shape {:?}",
            array.shape()
        )));
    }
    if array.ndim() < 2 || array.len_of(Axis(1)) < 3 {
        return Err(Error::invalid_argument(format!(
            "{what} must have shape [n, 3], got {:?}",
            array.shape()
        )));
    }
    Ok(array.into_dimensionality::<Ix2>()?)
}

/// Builds a point cloud from raw arrays.
///
/// Leading axes of length 1 are squeezed, so `[1, n, c]` arrays as produced by
/// [`extract`] or a model are accepted. Arrays that still have more than 2
/// dimensions are rejected; converting a whole batch is not implemented. Only
/// the first three channels of `positions` are used.
///
/// # Arguments
///
/// * positions - Array of shape `[n, c >= 3]`, possibly with leading unit axes.
/// * colors - Optional array of shape `[n, 3]`.
/// * estimate_normals - Computes normals with [`crate::normals::estimate_normals`].
pub fn to_point_cloud(
    positions: ArrayViewD<f32>,
    colors: Option<ArrayViewD<f32>>,
    estimate_normals: bool,
) -> Result<PointCloud> {
    let points = as_rows(positions, "positions")?.slice(s![.., ..3]).to_owned();

    let colors = colors
        .map(|colors| -> Result<Array2<f32>> {
            let colors = as_rows(colors, "colors")?;
            if colors.dim() != (points.nrows(), 3) {
                return Err(Error::invalid_argument(format!(
                    "expected colors of shape [{}, 3], got {:?}",
                    points.nrows(),
                    colors.shape()
                )));
            }
            Ok(colors.to_owned())
        })
        .transpose()?;

    let normals = estimate_normals
        .then(|| crate::normals::estimate_normals(&points.view(), DEFAULT_NORMAL_NEIGHBORS));

    Ok(PointCloud {
        points,
        colors,
        normals,
    })
}
