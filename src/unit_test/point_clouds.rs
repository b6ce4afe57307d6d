use nalgebra::Vector3;
use ndarray::Array2;
use rstest::fixture;

use crate::{pointcloud::PointCloud, transform::Pose};

/// Points on the surface of a 5x5x5 grid cube with 0.25 spacing, colored by
/// their grid coordinate.
#[fixture]
pub fn sample_cube_pointcloud() -> PointCloud {
    let mut points = Vec::new();
    let mut colors = Vec::new();
    for i in 0..5 {
        for j in 0..5 {
            for k in 0..5 {
                if [i, j, k].iter().all(|c| *c != 0 && *c != 4) {
                    continue;
                }
                points.extend([
                    1.0 + i as f32 * 0.25,
                    2.0 + j as f32 * 0.25,
                    3.0 + k as f32 * 0.25,
                ]);
                colors.extend([i as f32 / 4.0, j as f32 / 4.0, k as f32 / 4.0]);
            }
        }
    }

    let len = points.len() / 3;
    PointCloud {
        points: Array2::from_shape_vec((len, 3), points).unwrap(),
        colors: Some(Array2::from_shape_vec((len, 3), colors).unwrap()),
        normals: Some(Array2::zeros((len, 3))),
    }
}

/// The cube cloud and a copy moved by a small rigid motion, with the motion
/// that maps the first onto the second.
#[fixture]
pub fn sample_shifted_pair(sample_cube_pointcloud: PointCloud) -> (PointCloud, PointCloud, Pose) {
    let pose = Pose::from_scaled_axis(&Vector3::new(0.0, 0.0, 0.08), &Vector3::new(0.05, -0.03, 0.02));
    let moved = &pose * &sample_cube_pointcloud;
    (sample_cube_pointcloud, moved, pose)
}
