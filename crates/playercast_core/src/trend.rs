/// Mean of consecutive first differences over the trailing `k` points.
///
/// Only recent movement is considered; older movement in the window is
/// ignored. Returns 0 when fewer than two points are available.
pub fn recent_slope(series: &[f64], k: usize) -> f64 {
    let take = k.min(series.len());
    if take < 2 {
        return 0.0;
    }
    let tail = &series[series.len() - take..];
    // Sum of first differences telescopes to last - first.
    (tail[take - 1] - tail[0]) / (take - 1) as f64
}

/// Ordinary least-squares slope of `series` against its index.
pub fn linear_fit_slope(series: &[f64]) -> f64 {
    let n = series.len();
    if n < 2 {
        return 0.0;
    }

    let nf = n as f64;
    let x_mean = (nf - 1.0) / 2.0;
    let y_mean = series.iter().sum::<f64>() / nf;

    let mut cov = 0.0;
    let mut var = 0.0;
    for (i, &y) in series.iter().enumerate() {
        let dx = i as f64 - x_mean;
        cov += dx * (y - y_mean);
        var += dx * dx;
    }

    if var > 0.0 {
        cov / var
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recent_slope_uses_tail_only() {
        // Flat for a long time, then rising by 10 per step
        let mut series = vec![500.0; 20];
        series.extend([510.0, 520.0, 530.0, 540.0, 550.0]);
        assert!((recent_slope(&series, 5) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_recent_slope_short_series() {
        assert_eq!(recent_slope(&[], 5), 0.0);
        assert_eq!(recent_slope(&[100.0], 5), 0.0);
        assert_eq!(recent_slope(&[100.0, 130.0], 5), 30.0);
        assert_eq!(recent_slope(&[100.0, 130.0, 170.0], 1), 0.0);
    }

    #[test]
    fn test_linear_fit_slope() {
        let series: Vec<f64> = (0..10).map(|i| 3.0 * i as f64 + 1.0).collect();
        assert!((linear_fit_slope(&series) - 3.0).abs() < 1e-9);
        assert_eq!(linear_fit_slope(&[7.0]), 0.0);
    }
}
