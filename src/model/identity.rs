use super::{Registration, RegistrationModel};
use crate::batch::PointBatch;
use crate::error::{Error, Result};

/// Always answers the identity pose.
#[derive(Debug, Default, Clone)]
pub struct IdentityModel;

impl RegistrationModel for IdentityModel {
    fn name(&self) -> &str {
        "identity"
    }

    fn infer(&self, target: &PointBatch, source: &PointBatch) -> Result<Registration> {
        if target.batch_size() == 0 || source.batch_size() == 0 {
            return Err(Error::invalid_argument("empty point batch"));
        }

        let mut registration = Registration::identity(target.num_points());
        registration
            .point_weights
            .iter_mut()
            .zip(target.mask.index_axis(ndarray::Axis(0), 0).column(0))
            .for_each(|(weight, valid)| *weight = if *valid { 1.0 } else { 0.0 });
        Ok(registration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::Pose;
    use ndarray::Array3;

    #[test]
    fn test_identity_pose() {
        let batch = PointBatch::dense(Array3::ones((1, 4, 6))).unwrap();
        let registration = IdentityModel.infer(&batch, &batch).unwrap();

        assert_eq!(registration.pose, Pose::eye());
        assert_eq!(registration.point_weights.to_vec(), vec![1.0; 4]);
    }

    #[test]
    fn test_empty_batch() {
        let batch = PointBatch::dense(Array3::zeros((0, 4, 6))).unwrap();
        assert!(IdentityModel.infer(&batch, &batch).is_err());
    }
}
