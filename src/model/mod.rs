//! Registration models and how they are loaded.
//!
//! A model receives two padded point batches and answers with the pose that
//! maps the target onto the source. Models are built by name through a
//! [`ModelRegistry`], usually from the hyper-parameters of a [`Checkpoint`].

use ndarray::Array1;

use crate::batch::PointBatch;
use crate::error::Result;
use crate::transform::Pose;

mod checkpoint;
pub use checkpoint::{load_from_checkpoint, Checkpoint};

mod registry;
pub use registry::{ModelFactory, ModelRegistry};

mod identity;
pub use identity::IdentityModel;

mod nearest_svd;
pub use nearest_svd::{NearestSvdConfig, NearestSvdModel};

/// A putative match between a target row and a source row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correspondence {
    pub target: usize,
    pub source: usize,
    pub weight: f32,
}

/// What a model answers for one pair of point batches.
#[derive(Debug, Clone, PartialEq)]
pub struct Registration {
    /// Maps target points onto the source.
    pub pose: Pose,
    /// Overall confidence of the estimate.
    pub weight: f32,
    /// Diagnostics, not used by the alignment itself.
    pub correspondences: Vec<Correspondence>,
    /// One weight per target row, zero for padding rows.
    pub point_weights: Array1<f32>,
}

impl Registration {
    /// A registration that keeps the target where it is.
    pub fn identity(num_points: usize) -> Self {
        Self {
            pose: Pose::eye(),
            weight: 1.0,
            correspondences: Vec::new(),
            point_weights: Array1::zeros(num_points),
        }
    }
}

pub trait RegistrationModel {
    fn name(&self) -> &str;

    /// Estimates the pose aligning `target` onto `source`. Only the first
    /// element of each batch is considered.
    fn infer(&self, target: &PointBatch, source: &PointBatch) -> Result<Registration>;
}
