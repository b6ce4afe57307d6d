//! Point cloud preprocessing and pairwise registration with trained models.
//!
//! The usual entry point is [`pipeline::PairwiseAligner`], which loads two
//! clouds, downsamples and normalizes them, asks a
//! [`model::RegistrationModel`] for the pose between them and applies it.

pub mod batch;
pub mod convert;
pub mod error;
pub mod io;
pub mod kdtree;
pub mod model;
pub mod normalize;
pub mod normals;
pub mod pipeline;
pub mod pointcloud;
pub mod report;
pub mod sampling;
pub mod scene;
pub mod transform;

#[cfg(test)]
mod unit_test;

pub use crate::error::{Error, Result};
pub use crate::pointcloud::PointCloud;
pub use crate::transform::Pose;
