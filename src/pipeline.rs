//! Pairwise alignment of two point clouds with a registration model.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use ndarray::prelude::*;
use serde_derive::Deserialize;

use crate::batch::PointBatch;
use crate::convert::{extract, to_point_cloud, Extracted};
use crate::error::{Error, Result};
use crate::io::read_point_cloud;
use crate::model::{Registration, RegistrationModel};
use crate::pointcloud::PointCloud;
use crate::sampling::{resample, Downsample, ResampleMode};
use crate::transform::apply_pose;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct AlignParams {
    /// Edge of the voxels used to downsample both clouds.
    pub voxel_size: f32,
    /// Center and scale the clouds before handing them to the model.
    pub normalize: bool,
    /// Compute normals for the clouds of the [`Alignment`].
    pub estimate_normals: bool,
    /// Refine the model pose afterwards. Recorded, has no effect yet.
    pub fine_tune: bool,
}

impl Default for AlignParams {
    fn default() -> Self {
        Self {
            voxel_size: 0.05,
            normalize: true,
            estimate_normals: false,
            fine_tune: true,
        }
    }
}

impl AlignParams {
    /// Reads the parameters from a JSON file. Missing keys take their
    /// default value.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let buffer = BufReader::new(File::open(path)?);
        serde_json::from_reader(buffer)
            .map_err(|err| Error::parser(format!("{}: {err}", path.display())))
    }

    pub fn voxel_size(&'_ mut self, value: f32) -> &'_ mut AlignParams {
        self.voxel_size = value;
        self
    }

    pub fn normalize(&'_ mut self, value: bool) -> &'_ mut AlignParams {
        self.normalize = value;
        self
    }

    pub fn estimate_normals(&'_ mut self, value: bool) -> &'_ mut AlignParams {
        self.estimate_normals = value;
        self
    }

    pub fn fine_tune(&'_ mut self, value: bool) -> &'_ mut AlignParams {
        self.fine_tune = value;
        self
    }
}

/// The clouds produced by [`PairwiseAligner::align`].
#[derive(Debug, Clone)]
pub struct Alignment {
    /// Downsampled source, normalized if asked.
    pub source: PointCloud,
    /// Downsampled target, normalized if asked.
    pub target: PointCloud,
    /// The first `length` downsampled target points moved by the estimated
    /// pose, with the target colors.
    pub result: PointCloud,
    pub registration: Registration,
    /// Number of points both clouds were fitted to.
    pub length: usize,
}

pub struct PairwiseAligner<'a> {
    pub params: AlignParams,
    model: &'a dyn RegistrationModel,
}

impl<'a> PairwiseAligner<'a> {
    pub fn new(params: AlignParams, model: &'a dyn RegistrationModel) -> Self {
        Self { params, model }
    }

    /// Reads both clouds and aligns them, see [`PairwiseAligner::align`].
    pub fn align_files<P, Q>(&self, source_path: P, target_path: Q) -> Result<Alignment>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
    {
        let source = read_point_cloud(source_path)?;
        let target = read_point_cloud(target_path)?;
        self.align(&source, &target)
    }

    fn to_batch(extracted: &Extracted, length: usize) -> Result<PointBatch> {
        PointBatch::try_from(resample(&extracted.batch, length, ResampleMode::Pad)?)
    }

    fn package(&self, positions: &Array2<f32>, colors: &Array2<f32>) -> Result<PointCloud> {
        to_point_cloud(
            positions.view().into_dyn(),
            Some(colors.view().into_dyn()),
            self.params.estimate_normals,
        )
    }

    /// Estimates the pose between `target` and `source` and moves the target
    /// with it.
    ///
    /// Both clouds are downsampled and fitted to the size of the smaller one
    /// before being handed to the model. The result is computed from the
    /// downsampled target in its original coordinates.
    pub fn align(&self, source: &PointCloud, target: &PointCloud) -> Result<Alignment> {
        let source = source.downsample(self.params.voxel_size)?;
        let target = target.downsample(self.params.voxel_size)?;
        tracing::info!(
            source_points = source.len(),
            target_points = target.len(),
            voxel_size = self.params.voxel_size,
            "downsampled"
        );

        let length = source.len().min(target.len());
        if length == 0 {
            return Err(Error::degenerate("no point left after downsampling"));
        }

        let source_extracted = extract(&source, self.params.normalize)?;
        let target_extracted = extract(&target, self.params.normalize)?;
        let source_batch = Self::to_batch(&source_extracted, length)?;
        let target_batch = Self::to_batch(&target_extracted, length)?;

        tracing::debug!(length, model = self.model.name(), fine_tune = self.params.fine_tune, "running model");
        let registration = self.model.infer(&target_batch, &source_batch)?;
        tracing::info!(weight = registration.weight, pose = ?registration.pose.0, "pose estimated");

        let result_points = apply_pose(&target.points.slice(s![..length, ..]), &registration.pose)?;
        let result_colors = target_extracted.colors.slice(s![..length, ..]).to_owned();

        Ok(Alignment {
            source: self.package(&source_extracted.positions, &source_extracted.colors)?,
            target: self.package(&target_extracted.positions, &target_extracted.colors)?,
            result: self.package(&result_points, &result_colors)?,
            registration,
            length,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::IdentityModel;
    use crate::unit_test::sample_cube_pointcloud;
    use rstest::*;
    use std::io::Write;

    #[rstest]
    fn test_align_identity(sample_cube_pointcloud: PointCloud) {
        let model = IdentityModel;
        let aligner = PairwiseAligner::new(*AlignParams::default().voxel_size(0.1), &model);
        let alignment = aligner.align(&sample_cube_pointcloud, &sample_cube_pointcloud).unwrap();

        assert_eq!(alignment.length, sample_cube_pointcloud.len());
        assert_eq!(alignment.result.points, sample_cube_pointcloud.points);
        assert_eq!(alignment.result.colors, sample_cube_pointcloud.colors);
        assert_eq!(alignment.target.len(), alignment.length);
    }

    #[rstest]
    fn test_align_uneven_sizes(sample_cube_pointcloud: PointCloud) {
        let model = IdentityModel;
        let aligner = PairwiseAligner::new(AlignParams::default(), &model);
        let smaller = sample_cube_pointcloud.truncated(40);

        let alignment = aligner.align(&smaller, &sample_cube_pointcloud).unwrap();
        assert_eq!(alignment.length, 40);
        assert_eq!(alignment.result.len(), 40);
        assert_eq!(alignment.source.len(), 40);
        assert_eq!(alignment.target.len(), sample_cube_pointcloud.len());
        assert_eq!(alignment.registration.point_weights.len(), 40);
    }

    #[rstest]
    fn test_align_with_normals(sample_cube_pointcloud: PointCloud) {
        let model = IdentityModel;
        let aligner = PairwiseAligner::new(*AlignParams::default().estimate_normals(true), &model);
        let alignment = aligner.align(&sample_cube_pointcloud, &sample_cube_pointcloud).unwrap();
        assert!(alignment.result.normals.is_some());
        assert!(alignment.source.normals.is_some());
    }

    #[test]
    fn test_align_empty() {
        let model = IdentityModel;
        let aligner = PairwiseAligner::new(AlignParams::default(), &model);
        let empty = PointCloud::new(Array2::zeros((0, 3)));
        assert!(matches!(
            aligner.align(&empty, &empty),
            Err(Error::DegenerateInput(_))
        ));
    }

    #[test]
    fn test_params_from_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{\"voxel_size\": 0.2, \"fine_tune\": false}}").unwrap();

        let params = AlignParams::from_json_file(file.path()).unwrap();
        assert_eq!(
            params,
            *AlignParams::default().voxel_size(0.2).fine_tune(false)
        );
    }
}
