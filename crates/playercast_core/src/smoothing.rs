//! Local regression smoother (LOWESS) over an evenly spaced series.
//!
//! Each point is replaced by the value of a weighted linear fit through its
//! `k` nearest neighbors by index, where `k = ceil(fraction * len)` and the
//! neighbor weights follow the tricube kernel. A single pass is made; there
//! are no robustness iterations.
//!
//! Series of length 1 or 2 are returned unchanged: a local line through two
//! points reproduces them exactly, so smoothing has nothing to remove.

use crate::error::{ForecastError, Result};

/// Smallest neighborhood that still gives an overdetermined local fit.
const MIN_NEIGHBORS: usize = 3;

/// Below this weighted x-variance the local fit collapses to a weighted mean.
const VARIANCE_TOL: f64 = 1e-12;

/// Smooth `values` with neighborhood fraction `fraction`.
///
/// The output has the same length and ordering as the input. The result is
/// deterministic for a fixed input.
pub fn smooth(values: &[f64], fraction: f64) -> Result<Vec<f64>> {
    let n = values.len();
    if n == 0 {
        return Err(ForecastError::InsufficientData { got: 0, min: 1 });
    }
    if n <= 2 {
        return Ok(values.to_vec());
    }

    let k = neighborhood_size(n, fraction);
    Ok((0..n).map(|i| fit_at(values, i, k)).collect())
}

/// Number of neighbors used per fitted point.
pub fn neighborhood_size(len: usize, fraction: f64) -> usize {
    let k = (fraction * len as f64).ceil() as usize;
    k.max(MIN_NEIGHBORS).min(len)
}

/// Start of the contiguous `k`-point window nearest to `i`.
///
/// For evenly spaced indices the `k` nearest neighbors are contiguous; when
/// two candidates are equidistant the earlier one wins.
fn window_start(i: usize, k: usize, n: usize) -> usize {
    let lo = i.saturating_sub(k / 2);
    lo.min(n - k)
}

/// Tricube kernel on a normalized distance in [0, 1).
#[inline]
fn tricube(u: f64) -> f64 {
    if u >= 1.0 {
        return 0.0;
    }
    let t = 1.0 - u * u * u;
    t * t * t
}

fn fit_at(values: &[f64], i: usize, k: usize) -> f64 {
    let lo = window_start(i, k, values.len());
    let hi = lo + k - 1;

    // One index past the farthest neighbor, so every neighbor keeps weight.
    let max_dist = (i - lo).max(hi - i);
    let bandwidth = (max_dist + 1) as f64;

    let mut sum_w = 0.0;
    let mut sum_wx = 0.0;
    let mut sum_wy = 0.0;
    let mut sum_wxx = 0.0;
    let mut sum_wxy = 0.0;

    for (j, &y) in values.iter().enumerate().take(hi + 1).skip(lo) {
        let x = j as f64;
        let w = tricube((j as f64 - i as f64).abs() / bandwidth);
        let wx = w * x;
        sum_w += w;
        sum_wx += wx;
        sum_wy += w * y;
        sum_wxx += wx * x;
        sum_wxy += wx * y;
    }

    if sum_w <= 0.0 {
        let window = &values[lo..=hi];
        return window.iter().sum::<f64>() / window.len() as f64;
    }

    let x_mean = sum_wx / sum_w;
    let y_mean = sum_wy / sum_w;
    let variance = sum_wxx - sum_wx * sum_wx / sum_w;
    if variance <= VARIANCE_TOL {
        return y_mean;
    }

    let covariance = sum_wxy - sum_wx * sum_wy / sum_w;
    let slope = covariance / variance;
    y_mean + slope * (i as f64 - x_mean)
}
