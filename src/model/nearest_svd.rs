use nalgebra::{Matrix3, Rotation3, Vector3, SVD};
use ndarray::prelude::*;
use serde_derive::Deserialize;

use super::{Correspondence, Registration, RegistrationModel};
use crate::batch::PointBatch;
use crate::error::{Error, Result};
use crate::kdtree::KdTree;
use crate::transform::Pose;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct NearestSvdConfig {
    /// Number of match and solve rounds.
    pub iterations: usize,
    /// Distance scale of the correspondence weights `exp(-d² / sigma²)`.
    pub sigma: f32,
}

impl Default for NearestSvdConfig {
    fn default() -> Self {
        Self {
            iterations: 20,
            sigma: 0.25,
        }
    }
}

impl NearestSvdConfig {
    pub fn iterations(&'_ mut self, value: usize) -> &'_ mut NearestSvdConfig {
        self.iterations = value;
        self
    }

    pub fn sigma(&'_ mut self, value: f32) -> &'_ mut NearestSvdConfig {
        self.sigma = value;
        self
    }
}

/// Rigid registration by nearest neighbor matching and weighted SVD.
///
/// Each round moves the valid target points with the current estimate, pairs
/// every one of them with its closest valid source point and solves the
/// weighted orthogonal Procrustes problem between the original target points
/// and their matches.
pub struct NearestSvdModel {
    pub config: NearestSvdConfig,
}

impl NearestSvdModel {
    pub fn new(config: NearestSvdConfig) -> Result<Self> {
        if !(config.sigma.is_finite() && config.sigma > 0.0) {
            return Err(Error::invalid_argument(format!(
                "sigma must be positive, got {}",
                config.sigma
            )));
        }
        Ok(Self { config })
    }
}

fn to_vectors(points: &Array2<f32>) -> Vec<Vector3<f32>> {
    points
        .outer_iter()
        .map(|p| Vector3::new(p[0], p[1], p[2]))
        .collect()
}

/// Weighted Kabsch: the rigid motion minimizing `Σ w |R·from + t - to|²`.
fn weighted_rigid_transform(
    from: &[Vector3<f32>],
    to: &[Vector3<f32>],
    weights: &[f32],
) -> Option<Pose> {
    let total: f32 = weights.iter().sum();
    if total <= f32::EPSILON {
        return None;
    }

    let (from_centroid, to_centroid) = itertools::izip!(from, to, weights).fold(
        (Vector3::<f32>::zeros(), Vector3::<f32>::zeros()),
        |(fc, tc), (f, t, w)| (fc + f * *w, tc + t * *w),
    );
    let from_centroid = from_centroid / total;
    let to_centroid = to_centroid / total;

    let h = itertools::izip!(from, to, weights).fold(Matrix3::<f32>::zeros(), |acc, (f, t, w)| {
        acc + (f - from_centroid) * (t - to_centroid).transpose() * *w
    });

    let svd = SVD::new(h, true, true);
    let u = svd.u?;
    let v = svd.v_t?.transpose();

    // Reflection fix.
    let d = (v * u.transpose()).determinant().signum();
    let rotation = v * Matrix3::from_diagonal(&Vector3::new(1.0, 1.0, d)) * u.transpose();
    let translation = to_centroid - rotation * from_centroid;

    Some(Pose::from_rotation_translation(
        &Rotation3::from_matrix_unchecked(rotation),
        &translation,
    ))
}

impl RegistrationModel for NearestSvdModel {
    fn name(&self) -> &str {
        "nearest_svd"
    }

    fn infer(&self, target: &PointBatch, source: &PointBatch) -> Result<Registration> {
        if target.batch_size() == 0 || source.batch_size() == 0 {
            return Err(Error::invalid_argument("empty point batch"));
        }

        let (target_points, target_rows) = target.valid_points(0);
        let (source_points, source_rows) = source.valid_points(0);
        if target_points.is_empty() || source_points.is_empty() {
            return Err(Error::degenerate("no valid points to register"));
        }

        let tree = KdTree::new(&source_points.view());
        let target_points = to_vectors(&target_points);
        let source_points = to_vectors(&source_points);
        let sigma2 = self.config.sigma * self.config.sigma;

        let mut pose = Pose::eye();
        let mut matches = Vec::with_capacity(target_points.len());
        let mut weights = Vec::with_capacity(target_points.len());
        let match_points = |pose: &Pose, matches: &mut Vec<usize>, weights: &mut Vec<f32>| {
            matches.clear();
            weights.clear();
            for point in target_points.iter() {
                let (index, dist2) = tree
                    .nearest(&pose.transform_point(point))
                    .unwrap_or((0, f32::INFINITY));
                matches.push(index);
                weights.push((-dist2 / sigma2).exp());
            }
        };

        for iteration in 0..self.config.iterations {
            match_points(&pose, &mut matches, &mut weights);
            let matched: Vec<Vector3<f32>> = matches.iter().map(|i| source_points[*i]).collect();
            match weighted_rigid_transform(&target_points, &matched, &weights) {
                Some(estimate) => pose = estimate,
                None => {
                    tracing::warn!(iteration, "no correspondence left, stopping");
                    break;
                }
            }
        }
        match_points(&pose, &mut matches, &mut weights);

        let mut point_weights = Array1::zeros(target.num_points());
        let correspondences = itertools::izip!(&target_rows, &matches, &weights)
            .map(|(row, index, weight)| {
                point_weights[*row] = *weight;
                Correspondence {
                    target: *row,
                    source: source_rows[*index],
                    weight: *weight,
                }
            })
            .collect();

        Ok(Registration {
            pose,
            weight: weights.iter().sum::<f32>() / weights.len() as f32,
            correspondences,
            point_weights,
        })
    }
}
