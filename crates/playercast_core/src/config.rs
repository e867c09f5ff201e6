use serde::{Deserialize, Serialize};

#[cfg(feature = "cli")]
use clap::{Args, ValueEnum};

use crate::bands::BandMultipliers;
use crate::error::{ForecastError, Result};
use crate::projector::ProjectionParams;

/// How the trend slope is derived from the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "cli", derive(ValueEnum))]
pub enum SlopeStrategy {
    /// Mean first difference over the trailing points of the smoothed series.
    #[default]
    RecentMomentum,
    /// Least-squares slope over the whole raw window.
    LinearFit,
}

/// Tunables for one forecast request.
///
/// Every field has a default, so a partial TOML table or JSON object
/// deserializes into a complete configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
#[cfg_attr(feature = "cli", derive(Args))]
pub struct ForecastConfig {
    /// Number of trailing samples taken from the history
    #[cfg_attr(feature = "cli", arg(long, default_value_t = 30))]
    pub window_size: usize,

    /// Number of future steps to forecast
    #[cfg_attr(feature = "cli", arg(long, default_value_t = 30))]
    pub horizon: usize,

    /// LOWESS neighborhood fraction, in (0, 1]
    #[cfg_attr(feature = "cli", arg(long, default_value_t = 0.25))]
    pub smoothing_fraction: f64,

    /// Trailing smoothed points used for the momentum slope
    #[cfg_attr(feature = "cli", arg(long, default_value_t = 5))]
    pub trend_window: usize,

    /// Steps after which the slope contribution reaches zero
    #[cfg_attr(feature = "cli", arg(long, default_value_t = 40.0))]
    pub damping_constant: f64,

    /// Amplitude of the additive seasonal oscillation
    #[cfg_attr(feature = "cli", arg(long, default_value_t = 120.0))]
    pub seasonal_amplitude: f64,

    /// Period divisor of the seasonal oscillation (sin(i / period))
    #[cfg_attr(feature = "cli", arg(long, default_value_t = 6.0))]
    pub seasonal_period: f64,

    /// Multiplier for the optimistic band
    #[cfg_attr(feature = "cli", arg(long, default_value_t = 1.05))]
    pub band_high_multiplier: f64,

    /// Multiplier for the pessimistic band
    #[cfg_attr(feature = "cli", arg(long, default_value_t = 0.95))]
    pub band_low_multiplier: f64,

    /// Slope strategy (RecentMomentum, LinearFit)
    #[cfg_attr(feature = "cli", arg(long, value_enum, default_value_t = SlopeStrategy::RecentMomentum))]
    pub slope_strategy: SlopeStrategy,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            window_size: 30,
            horizon: 30,
            smoothing_fraction: 0.25,
            trend_window: 5,
            damping_constant: 40.0,
            seasonal_amplitude: 120.0,
            seasonal_period: 6.0,
            band_high_multiplier: BandMultipliers::DEFAULT.high,
            band_low_multiplier: BandMultipliers::DEFAULT.low,
            slope_strategy: SlopeStrategy::RecentMomentum,
        }
    }
}

impl ForecastConfig {
    /// Defaults with the ±15% band variant.
    pub fn wide_band() -> Self {
        Self::default().with_bands(BandMultipliers::WIDE)
    }

    pub fn with_bands(mut self, bands: BandMultipliers) -> Self {
        self.band_high_multiplier = bands.high;
        self.band_low_multiplier = bands.low;
        self
    }

    pub fn bands(&self) -> BandMultipliers {
        BandMultipliers {
            high: self.band_high_multiplier,
            low: self.band_low_multiplier,
        }
    }

    pub fn projection_params(&self) -> ProjectionParams {
        ProjectionParams {
            damping_constant: self.damping_constant,
            seasonal_amplitude: self.seasonal_amplitude,
            seasonal_period: self.seasonal_period,
        }
    }

    /// Rejects values for which the pipeline arithmetic is undefined.
    pub fn validate(&self) -> Result<()> {
        if self.window_size == 0 {
            return Err(invalid("window_size must be at least 1"));
        }
        if !(self.smoothing_fraction > 0.0 && self.smoothing_fraction <= 1.0) {
            return Err(invalid(format!(
                "smoothing_fraction must be in (0, 1], got {}",
                self.smoothing_fraction
            )));
        }
        if self.trend_window == 0 {
            return Err(invalid("trend_window must be at least 1"));
        }
        if !(self.damping_constant.is_finite() && self.damping_constant > 0.0) {
            return Err(invalid(format!(
                "damping_constant must be positive, got {}",
                self.damping_constant
            )));
        }
        if !self.seasonal_amplitude.is_finite() {
            return Err(invalid("seasonal_amplitude must be finite"));
        }
        if !(self.seasonal_period.is_finite() && self.seasonal_period > 0.0) {
            return Err(invalid(format!(
                "seasonal_period must be positive, got {}",
                self.seasonal_period
            )));
        }
        self.bands().validate()
    }
}

pub(crate) fn invalid(msg: impl Into<String>) -> ForecastError {
    ForecastError::InvalidConfig(msg.into())
}
