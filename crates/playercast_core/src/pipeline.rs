use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{ForecastConfig, SlopeStrategy};
use crate::error::{ForecastError, Result};
use crate::projector::project;
use crate::series::{check_finite, trailing_window, Sample};
use crate::smoothing::smooth;
use crate::trend::{linear_fit_slope, recent_slope};

/// Point forecast with its optimistic and pessimistic bands.
///
/// The three sequences always have the same length (the horizon).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ForecastResult {
    pub forecast: Vec<u64>,
    pub high: Vec<u64>,
    pub low: Vec<u64>,
}

impl ForecastResult {
    /// The degraded response returned when no forecast can be produced.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.forecast.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forecast.is_empty()
    }
}

/// Smooth, estimate the trend, project and band a daily series.
///
/// Only the trailing `window_size` values are used. The anchor is the last
/// smoothed value; the slope comes from `slope_strategy`.
pub fn compute_forecast(series: &[f64], config: &ForecastConfig) -> Result<ForecastResult> {
    config.validate()?;
    if series.is_empty() {
        return Err(ForecastError::InsufficientData { got: 0, min: 1 });
    }

    let window = trailing_window(series, config.window_size);
    check_finite(window)?;

    let smoothed = smooth(window, config.smoothing_fraction)?;
    let anchor = smoothed[smoothed.len() - 1];
    let slope = match config.slope_strategy {
        SlopeStrategy::RecentMomentum => recent_slope(&smoothed, config.trend_window),
        SlopeStrategy::LinearFit => linear_fit_slope(window),
    };

    debug!(
        window_len = window.len(),
        anchor = anchor,
        slope = slope,
        strategy = ?config.slope_strategy,
        horizon = config.horizon,
        "Projecting forecast"
    );

    let forecast = project(anchor, slope, config.horizon, &config.projection_params());
    let (high, low) = config.bands().apply(&forecast);

    Ok(ForecastResult {
        forecast,
        high,
        low,
    })
}

/// [`compute_forecast`] over sample values, in insertion order.
pub fn compute_forecast_samples(
    samples: &[Sample],
    config: &ForecastConfig,
) -> Result<ForecastResult> {
    let values: Vec<f64> = samples.iter().map(|s| s.value).collect();
    compute_forecast(&values, config)
}
