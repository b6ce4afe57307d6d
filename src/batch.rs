use ndarray::prelude::*;

use crate::error::{Error, Result};
use crate::sampling::Resampled;

/// Padded point clouds as fed to a registration model.
#[derive(Debug, Clone, PartialEq)]
pub struct PointBatch {
    /// Shape `[batch, n_points, 6]`: xyz followed by rgb.
    pub data: Array3<f32>,
    /// Shape `[batch, n_points, 1]`. Rows where the mask is false are zero.
    pub mask: Array3<bool>,
}

impl PointBatch {
    /// Creates a batch, checking the shapes and that every masked-out row is
    /// all zeros.
    pub fn new(data: Array3<f32>, mask: Array3<bool>) -> Result<Self> {
        let (batch, n_points, channels) = data.dim();
        if channels != 6 {
            return Err(Error::invalid_argument(format!(
                "point batch needs 6 channels (xyz + rgb), got {channels}"
            )));
        }
        if mask.dim() != (batch, n_points, 1) {
            return Err(Error::invalid_argument(format!(
                "mask shape {:?} does not match data shape {:?}",
                mask.shape(),
                data.shape()
            )));
        }

        let padding_is_zero = data
            .outer_iter()
            .zip(mask.outer_iter())
            .all(|(cloud, valid)| {
                cloud
                    .outer_iter()
                    .zip(valid.column(0))
                    .all(|(row, valid)| *valid || row.iter().all(|v| *v == 0.0))
            });
        if !padding_is_zero {
            return Err(Error::invalid_argument(
                "padding rows of a point batch must be zero",
            ));
        }

        Ok(Self { data, mask })
    }

    /// A batch where every row is valid.
    pub fn dense(data: Array3<f32>) -> Result<Self> {
        let (batch, n_points, _) = data.dim();
        Self::new(data, Array3::from_elem((batch, n_points, 1), true))
    }

    pub fn batch_size(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    pub fn num_points(&self) -> usize {
        self.data.len_of(Axis(1))
    }

    /// Number of valid rows of the batch element `index`.
    pub fn valid_count(&self, index: usize) -> usize {
        self.mask
            .index_axis(Axis(0), index)
            .iter()
            .filter(|valid| **valid)
            .count()
    }

    /// Positions of the valid rows of the batch element `index`, with the
    /// index of the row each one came from.
    pub fn valid_points(&self, index: usize) -> (Array2<f32>, Vec<usize>) {
        let valid_rows: Vec<usize> = self
            .mask
            .index_axis(Axis(0), index)
            .column(0)
            .iter()
            .enumerate()
            .filter_map(|(row, valid)| valid.then_some(row))
            .collect();

        let points = self
            .data
            .index_axis(Axis(0), index)
            .slice(s![.., ..3])
            .select(Axis(0), &valid_rows);
        (points, valid_rows)
    }
}

impl TryFrom<Resampled<Ix3>> for PointBatch {
    type Error = Error;

    fn try_from(resampled: Resampled<Ix3>) -> Result<Self> {
        Self::new(resampled.array, resampled.mask)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampling::{resample, ResampleMode};

    #[test]
    fn test_from_resampled() {
        let data = Array3::from_shape_fn((1, 3, 6), |(_, i, c)| (i * 6 + c + 1) as f32);
        let batch = PointBatch::try_from(resample(&data, 5, ResampleMode::Pad).unwrap()).unwrap();

        assert_eq!(batch.batch_size(), 1);
        assert_eq!(batch.num_points(), 5);
        assert_eq!(batch.valid_count(0), 3);

        let (points, rows) = batch.valid_points(0);
        assert_eq!(rows, vec![0, 1, 2]);
        assert_eq!(points, data.slice(s![0, .., ..3]));
    }

    #[test]
    fn test_rejects_nonzero_padding() {
        let data = Array3::<f32>::ones((1, 2, 6));
        let mask = Array3::from_shape_vec((1, 2, 1), vec![true, false]).unwrap();
        assert!(PointBatch::new(data, mask).is_err());
    }

    #[test]
    fn test_rejects_bad_shapes() {
        assert!(PointBatch::dense(Array3::zeros((1, 2, 3))).is_err());
        assert!(PointBatch::new(Array3::zeros((1, 2, 6)), Array3::from_elem((1, 3, 1), true)).is_err());
    }
}
