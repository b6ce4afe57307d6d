use ndarray::prelude::*;

use crate::error::{Error, Result};
use crate::transform::Pose;

/// Unordered set of 3D points with optional per-point attributes.
#[derive(Clone, Debug, PartialEq)]
pub struct PointCloud {
    /// Positions. Shape is (Nx3).
    pub points: Array2<f32>,
    /// RGB colors in the [0, 1] range. Shape is (Nx3).
    pub colors: Option<Array2<f32>>,
    /// Per point normals. Shape is (Nx3).
    pub normals: Option<Array2<f32>>,
}

impl PointCloud {
    /// Creates a point cloud with positions only.
    pub fn new(points: Array2<f32>) -> Self {
        Self {
            points,
            colors: None,
            normals: None,
        }
    }

    /// Creates a point cloud with positions and colors, checking that both
    /// have the same number of rows.
    pub fn with_colors(points: Array2<f32>, colors: Array2<f32>) -> Result<Self> {
        let pcl = Self {
            points,
            colors: Some(colors),
            normals: None,
        };
        pcl.validate()?;
        Ok(pcl)
    }

    pub fn len(&self) -> usize {
        self.points.len_of(Axis(0))
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Checks the shape invariants: positions are (Nx3) and attributes, when
    /// present, are (Nx3) too.
    pub fn validate(&self) -> Result<()> {
        if self.points.ncols() != 3 {
            return Err(Error::invalid_argument(format!(
                "points must have 3 columns, got {}",
                self.points.ncols()
            )));
        }

        for (name, attr) in [("colors", &self.colors), ("normals", &self.normals)] {
            if let Some(attr) = attr {
                if attr.dim() != (self.len(), 3) {
                    return Err(Error::invalid_argument(format!(
                        "{name} shape {:?} does not match {} points",
                        attr.shape(),
                        self.len()
                    )));
                }
            }
        }
        Ok(())
    }

    /// Returns a new point cloud with only the first `len` points.
    pub fn truncated(&self, len: usize) -> Self {
        let len = len.min(self.len());
        Self {
            points: self.points.slice(s![..len, ..]).to_owned(),
            colors: self
                .colors
                .as_ref()
                .map(|colors| colors.slice(s![..len, ..]).to_owned()),
            normals: self
                .normals
                .as_ref()
                .map(|normals| normals.slice(s![..len, ..]).to_owned()),
        }
    }
}

impl std::ops::Mul<&PointCloud> for &Pose {
    type Output = PointCloud;

    /// Transforms the positions and rotates the normals. Colors are kept.
    fn mul(self, rhs: &PointCloud) -> PointCloud {
        PointCloud {
            points: self * &rhs.points,
            normals: rhs
                .normals
                .as_ref()
                .map(|normals| self.transform_normals(normals)),
            colors: rhs.colors.clone(),
        }
    }
}
