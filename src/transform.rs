use nalgebra::{Matrix3, Matrix4, Rotation3, Translation3, Vector3, Vector4};
use ndarray::prelude::*;
use ndarray::{Data, Slice};

use std::ops;

use crate::error::{Error, Result};

/// A 4x4 transformation matrix mapping points from one frame into another.
///
/// The matrix follows the column-vector convention: a point `p` is
/// transformed as `M · [p, 1]ᵀ`. The linear part may carry scale or shear;
/// nothing here checks that it is orthonormal.
#[derive(Clone, Debug, PartialEq)]
pub struct Pose(pub Matrix4<f32>);

impl Pose {
    pub fn eye() -> Self {
        Self(Matrix4::identity())
    }

    pub fn from_matrix4(matrix: &Matrix4<f32>) -> Self {
        Self(*matrix)
    }

    /// Creates a pose from a (4x4) array.
    pub fn from_array<S>(array: &ArrayBase<S, Ix2>) -> Result<Self>
    where
        S: Data<Elem = f32>,
    {
        if array.dim() != (4, 4) {
            return Err(Error::invalid_argument(format!(
                "pose must be a 4x4 matrix, got {:?}",
                array.shape()
            )));
        }
        Ok(Self(Matrix4::from_fn(|r, c| array[[r, c]])))
    }

    pub fn from_translation(x: f32, y: f32, z: f32) -> Self {
        Self(Translation3::new(x, y, z).to_homogeneous())
    }

    /// Rigid pose from an axis-angle rotation (`scaled_axis`) followed by a translation.
    pub fn from_scaled_axis(scaled_axis: &Vector3<f32>, translation: &Vector3<f32>) -> Self {
        Self::from_rotation_translation(&Rotation3::from_scaled_axis(*scaled_axis), translation)
    }

    pub fn from_rotation_translation(rotation: &Rotation3<f32>, translation: &Vector3<f32>) -> Self {
        let mut matrix = rotation.to_homogeneous();
        matrix.fixed_slice_mut::<3, 1>(0, 3).copy_from(translation);
        Self(matrix)
    }

    /// The upper-left (3x3) block.
    pub fn linear(&self) -> Matrix3<f32> {
        self.0.fixed_slice::<3, 3>(0, 0).into_owned()
    }

    pub fn translation(&self) -> Vector3<f32> {
        self.0.fixed_slice::<3, 1>(0, 3).into_owned()
    }

    /// Matrix transpose. Converts a pose written for row vectors
    /// (`[p, 1] · M`) into the column-vector convention used here.
    pub fn transpose(&self) -> Self {
        Self(self.0.transpose())
    }

    pub fn inverse(&self) -> Option<Self> {
        self.0.try_inverse().map(Self)
    }

    /// Applies the full affine map to a point. The homogeneous coordinate is
    /// dropped without division.
    pub fn transform_point(&self, point: &Vector3<f32>) -> Vector3<f32> {
        let v = self.0 * Vector4::new(point[0], point[1], point[2], 1.0);
        Vector3::new(v[0], v[1], v[2])
    }

    /// Transforms normals with the inverse transpose of the linear part and
    /// re-normalizes them. For rigid poses this is just the rotation.
    pub fn transform_normals(&self, normals: &Array2<f32>) -> Array2<f32> {
        let normal_matrix = self
            .linear()
            .try_inverse()
            .map(|inv| inv.transpose())
            .unwrap_or_else(|| self.linear());

        let mut result = Array2::<f32>::zeros((normals.nrows(), 3));
        for (in_iter, mut out_iter) in normals.outer_iter().zip(result.outer_iter_mut()) {
            let n = normal_matrix * Vector3::new(in_iter[0], in_iter[1], in_iter[2]);
            let n = n.try_normalize(f32::EPSILON).unwrap_or(n);
            out_iter[0] = n[0];
            out_iter[1] = n[1];
            out_iter[2] = n[2];
        }
        result
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::eye()
    }
}

impl ops::Mul<&Array2<f32>> for &Pose {
    type Output = Array2<f32>;

    fn mul(self, rhs: &Array2<f32>) -> Self::Output {
        let mut result = Array2::<f32>::zeros((rhs.len_of(Axis(0)), 3));

        for (in_iter, mut out_iter) in rhs.axis_iter(Axis(0)).zip(result.axis_iter_mut(Axis(0))) {
            let v = self.transform_point(&Vector3::new(in_iter[0], in_iter[1], in_iter[2]));
            out_iter[0] = v[0];
            out_iter[1] = v[1];
            out_iter[2] = v[2];
        }

        result
    }
}

impl ops::Mul<&Vector3<f32>> for &Pose {
    type Output = Vector3<f32>;

    fn mul(self, rhs: &Vector3<f32>) -> Self::Output {
        self.transform_point(rhs)
    }
}

impl ops::Mul<&Pose> for &Pose {
    type Output = Pose;

    fn mul(self, rhs: &Pose) -> Self::Output {
        Pose(self.0 * rhs.0)
    }
}

impl From<Pose> for Matrix4<f32> {
    fn from(pose: Pose) -> Self {
        pose.0
    }
}

impl From<Matrix4<f32>> for Pose {
    fn from(matrix: Matrix4<f32>) -> Self {
        Self(matrix)
    }
}

/// Lifts points to homogeneous coordinates.
///
/// The input has shape `[..., n, c]` with `c >= 3`. The output has shape
/// `[..., n, 4]`: the first three channels of the input followed by a channel
/// of ones. Leading dimensions are preserved.
pub fn to_homogeneous<S, D>(points: &ArrayBase<S, D>) -> Result<Array<f32, D>>
where
    S: Data<Elem = f32>,
    D: Dimension,
{
    if points.ndim() < 2 {
        return Err(Error::invalid_argument(format!(
            "points must be at least 2D ([..., n, 3]), got shape {:?}",
            points.shape()
        )));
    }

    let channel_axis = Axis(points.ndim() - 1);
    if points.len_of(channel_axis) < 3 {
        return Err(Error::invalid_argument(format!(
            "points need at least 3 channels, got shape {:?}",
            points.shape()
        )));
    }

    let mut dim = points.raw_dim();
    dim[channel_axis.index()] = 4;
    let mut homogeneous = Array::<f32, D>::ones(dim);
    homogeneous
        .slice_axis_mut(channel_axis, Slice::from(0..3))
        .assign(&points.slice_axis(channel_axis, Slice::from(0..3)));
    Ok(homogeneous)
}

/// Applies `pose` to a batch of points and returns the xyz of the first
/// batch element.
///
/// Every point is lifted to `[x, y, z, 1]` and multiplied as a column vector,
/// `pose · p`. The homogeneous channel is dropped without division, so affine
/// poses with scale or shear are applied as-is. Input of shape `[n, c]` is
/// treated as a batch of one.
pub fn apply_pose<S, D>(points: &ArrayBase<S, D>, pose: &Pose) -> Result<Array2<f32>>
where
    S: Data<Elem = f32>,
    D: Dimension,
{
    let homogeneous = to_homogeneous(points)?.into_dyn();

    let mut first = homogeneous.view();
    while first.ndim() > 2 {
        if first.len_of(Axis(0)) == 0 {
            return Err(Error::invalid_argument("cannot apply a pose to an empty batch"));
        }
        first = first.index_axis_move(Axis(0), 0);
    }
    let first = first.into_dimensionality::<Ix2>()?;

    // (pose · pᵀ)ᵀ == p · poseᵀ, keeps the point axis first.
    let pose_t = Array2::from_shape_fn((4, 4), |(r, c)| pose.0[(c, r)]);
    let transformed = first.dot(&pose_t);

    Ok(transformed.slice(s![.., ..3]).to_owned())
}

#[cfg(test)]
mod tests {
    use super::{apply_pose, to_homogeneous, Pose};
    use approx::assert_abs_diff_eq;
    use nalgebra::{Matrix4, Vector3};
    use ndarray::prelude::*;

    #[test]
    fn test_mul_op() {
        let pose = Pose::eye();
        let points = array![[1., 2., 3.], [4., 5., 6.], [7., 8., 9.]];
        let mult_result = &pose * &points;

        assert_eq!(mult_result, points);

        let pose = Pose::from_scaled_axis(
            &(Vector3::y() * std::f32::consts::PI),
            &Vector3::new(0., 0., 3.),
        );

        assert_abs_diff_eq!(
            &pose * &array![[1.0, 2.0, 3.0], [1.0, 2.0, 3.0]],
            array![[-1.0, 2.0, 0.0], [-1.0, 2.0, 0.0]],
            epsilon = 1e-5
        );
    }

    #[test]
    fn test_to_homogeneous() {
        let points = array![[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]], [[7.0, 8.0, 9.0], [0.0, 0.0, 0.0]]];
        let homogeneous = to_homogeneous(&points).unwrap();

        assert_eq!(homogeneous.shape(), &[2, 2, 4]);
        assert_eq!(homogeneous.slice(s![.., .., ..3]), points);
        assert!(homogeneous.slice(s![.., .., 3]).iter().all(|w| *w == 1.0));
    }

    #[test]
    fn test_to_homogeneous_uses_only_xyz() {
        let points = array![[1.0, 2.0, 3.0, 0.5, 0.5, 0.5]];
        let homogeneous = to_homogeneous(&points).unwrap();
        assert_eq!(homogeneous, array![[1.0, 2.0, 3.0, 1.0]]);
    }

    #[test]
    fn test_to_homogeneous_rejects_bad_shapes() {
        assert!(to_homogeneous(&array![1.0f32, 2.0, 3.0]).is_err());
        assert!(to_homogeneous(&array![[1.0f32, 2.0]]).is_err());
    }

    #[test]
    fn test_apply_identity() {
        let points = array![[[1.0, 2.0, 3.0], [-4.0, 5.5, 6.0], [0.0, 0.0, 0.0]]];
        let result = apply_pose(&points, &Pose::eye()).unwrap();
        assert_eq!(result, points.index_axis(Axis(0), 0));
    }

    #[test]
    fn test_apply_returns_first_batch() {
        let points = array![[[1.0, 0.0, 0.0]], [[5.0, 5.0, 5.0]]];
        let result = apply_pose(&points, &Pose::from_translation(0.0, 1.0, 0.0)).unwrap();
        assert_eq!(result, array![[1.0, 1.0, 0.0]]);
    }

    #[test]
    fn test_apply_affine() {
        #[rustfmt::skip]
        let scale_shear = Matrix4::new(
            2.0, 1.0, 0.0, 1.0,
            0.0, 3.0, 0.0, 0.0,
            0.0, 0.0, 0.5, -1.0,
            0.0, 0.0, 0.0, 1.0,
        );
        let result = apply_pose(
            &array![[1.0, 1.0, 2.0], [0.0, 0.0, 0.0]],
            &Pose::from_matrix4(&scale_shear),
        )
        .unwrap();
        assert_abs_diff_eq!(result, array![[4.0, 3.0, 0.0], [1.0, 0.0, -1.0]]);
    }

    #[test]
    fn test_apply_matches_mul_op() {
        let pose = Pose::from_scaled_axis(&Vector3::new(0.1, -0.4, 0.7), &Vector3::new(1.0, 2.0, -3.0));
        let points = array![[1.0, 2.0, 3.0], [-1.0, 0.5, 0.0], [3.0, 3.0, 3.0]];

        assert_abs_diff_eq!(
            apply_pose(&points, &pose).unwrap(),
            &pose * &points,
            epsilon = 1e-5
        );
    }

    #[test]
    fn test_from_array() {
        let array = array![
            [1.0, 0.0, 0.0, 1.0],
            [0.0, 1.0, 0.0, 2.0],
            [0.0, 0.0, 1.0, 3.0],
            [0.0, 0.0, 0.0, 1.0]
        ];
        assert_eq!(Pose::from_array(&array).unwrap(), Pose::from_translation(1.0, 2.0, 3.0));
        assert!(Pose::from_array(&Array2::<f32>::eye(3)).is_err());
    }

    #[test]
    fn test_transpose_inverse() {
        let pose = Pose::from_scaled_axis(&Vector3::new(0.0, 0.0, 0.3), &Vector3::new(1.0, 0.0, 0.0));
        let back = &pose.inverse().unwrap() * &pose;
        assert_abs_diff_eq!(back.0, Matrix4::identity(), epsilon = 1e-6);
        assert_eq!(pose.transpose().transpose(), pose);
    }
}
