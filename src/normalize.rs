use ndarray::prelude::*;

use crate::error::{Error, Result};

/// Centers the points at the origin and scales them so that the furthest
/// point lies at distance 1.
///
/// An empty input is returned unchanged. When every point coincides with the
/// centroid there is no scale to recover and [`Error::DegenerateInput`] is
/// returned.
///
/// # Arguments
///
/// * points - (Nx3) array of positions.
pub fn normalize(points: &ArrayView2<f32>) -> Result<Array2<f32>> {
    let mut points = points.to_owned();
    normalize_inplace(&mut points)?;
    Ok(points)
}

/// In-place version of [`normalize`].
pub fn normalize_inplace(points: &mut Array2<f32>) -> Result<()> {
    if points.is_empty() {
        return Ok(());
    }

    if points.iter().any(|v| !v.is_finite()) {
        return Err(Error::invalid_argument("cannot normalize non finite points"));
    }

    let first = points.row(0).to_owned();
    if points.outer_iter().all(|point| point == first) {
        return Err(Error::degenerate(format!(
            "all {} points coincide with their centroid",
            points.nrows()
        )));
    }

    let centroid = points
        .mean_axis(Axis(0))
        .ok_or_else(|| Error::invalid_argument("cannot take the centroid of zero points"))?;
    *points -= &centroid;

    let furthest_distance = points
        .outer_iter()
        .map(|point| point.dot(&point).sqrt())
        .fold(0.0f32, f32::max);

    if !furthest_distance.is_finite() || furthest_distance == 0.0 {
        return Err(Error::degenerate(format!(
            "furthest distance from the centroid is {furthest_distance}"
        )));
    }

    *points /= furthest_distance;
    Ok(())
}
