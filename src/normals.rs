use nalgebra::{Matrix3, SymmetricEigen, Vector3};
use ndarray::prelude::*;
use rayon::prelude::*;

use crate::kdtree::KdTree;

/// Default neighborhood size used by [`crate::convert::to_point_cloud`].
pub const DEFAULT_NORMAL_NEIGHBORS: usize = 30;

/// Estimates per point normals from the local neighborhood.
///
/// For each point, the `k` nearest neighbors (the point included) are found,
/// their covariance matrix is built, and the eigenvector of its smallest
/// eigenvalue is taken as the normal. Normals are flipped to face the origin.
/// Points with less than 3 neighbors get `(0, 0, 1)`.
///
/// # Arguments
///
/// * points - (Nx3) array of positions.
/// * k - Neighborhood size.
///
/// # Returns
///
/// (Nx3) array of unit normals.
pub fn estimate_normals(points: &ArrayView2<f32>, k: usize) -> Array2<f32> {
    estimate_normals_with_viewpoint(points, k, &Vector3::zeros())
}

/// Same as [`estimate_normals`], but orients the normals toward `viewpoint`.
pub fn estimate_normals_with_viewpoint(
    points: &ArrayView2<f32>,
    k: usize,
    viewpoint: &Vector3<f32>,
) -> Array2<f32> {
    let tree = KdTree::new(points);
    let positions: Vec<Vector3<f32>> = points
        .outer_iter()
        .map(|p| Vector3::new(p[0], p[1], p[2]))
        .collect();

    let normals: Vec<Vector3<f32>> = positions
        .par_iter()
        .map(|point| {
            let neighbors = tree.knn(point, k);
            if neighbors.len() < 3 {
                return Vector3::z();
            }

            let count = neighbors.len() as f32;
            let centroid = neighbors
                .iter()
                .fold(Vector3::zeros(), |acc, (idx, _)| acc + positions[*idx])
                / count;

            let covariance = neighbors.iter().fold(Matrix3::zeros(), |acc, (idx, _)| {
                let d = positions[*idx] - centroid;
                acc + d * d.transpose()
            }) / count;

            let eigen = SymmetricEigen::new(covariance);
            let smallest = eigen.eigenvalues.imin();
            let normal: Vector3<f32> = eigen.eigenvectors.column(smallest).into_owned();
            let normal = normal.try_normalize(f32::EPSILON).unwrap_or_else(Vector3::z);

            if normal.dot(&(viewpoint - point)) < 0.0 {
                -normal
            } else {
                normal
            }
        })
        .collect();

    Array2::from_shape_fn((normals.len(), 3), |(i, c)| normals[i][c])
}
