//! Point cloud file formats.

use std::path::Path;

use crate::error::{Error, Result};
use crate::pointcloud::PointCloud;

mod pcd;
pub use pcd::{read_pcd, write_pcd, write_pcd_binary};
mod ply;
pub use ply::{read_ply, write_ply};

pub(crate) fn color_from_u8(value: u8) -> f32 {
    value as f32 / 255.0
}

pub(crate) fn color_to_u8(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn extension(path: &Path) -> Result<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .ok_or_else(|| {
            Error::invalid_argument(format!(
                "cannot guess the point cloud format of {}",
                path.display()
            ))
        })
}

/// Reads a point cloud, choosing the format from the file extension
/// (`.ply` or `.pcd`).
pub fn read_point_cloud<P: AsRef<Path>>(path: P) -> Result<PointCloud> {
    let path = path.as_ref();
    let cloud = match extension(path)?.as_str() {
        "ply" => read_ply(path)?,
        "pcd" => read_pcd(path)?,
        other => {
            return Err(Error::invalid_argument(format!(
                "unsupported point cloud format `.{other}`"
            )))
        }
    };

    tracing::debug!(path = %path.display(), points = cloud.len(), "point cloud loaded");
    Ok(cloud)
}

/// Writes a point cloud, choosing the format from the file extension
/// (`.ply` or `.pcd`, both in ASCII).
pub fn write_point_cloud<P: AsRef<Path>>(path: P, cloud: &PointCloud) -> Result<()> {
    let path = path.as_ref();
    match extension(path)?.as_str() {
        "ply" => write_ply(path, cloud),
        "pcd" => write_pcd(path, cloud),
        other => Err(Error::invalid_argument(format!(
            "unsupported point cloud format `.{other}`"
        ))),
    }
}
