use serde::{Deserialize, Serialize};

use crate::config::invalid;
use crate::error::Result;
use crate::projector::to_count;

/// Proportional offsets used to derive the optimistic and pessimistic bands.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandMultipliers {
    pub high: f64,
    pub low: f64,
}

impl BandMultipliers {
    /// ±5%
    pub const DEFAULT: Self = Self {
        high: 1.05,
        low: 0.95,
    };

    /// ±15%
    pub const WIDE: Self = Self {
        high: 1.15,
        low: 0.85,
    };

    pub fn validate(&self) -> Result<()> {
        if !(self.high.is_finite() && self.low.is_finite()) {
            return Err(invalid("band multipliers must be finite"));
        }
        if self.low < 0.0 {
            return Err(invalid(format!(
                "band_low_multiplier must be non-negative, got {}",
                self.low
            )));
        }
        if self.low > 1.0 {
            return Err(invalid(format!(
                "band_low_multiplier must not exceed 1, got {}",
                self.low
            )));
        }
        if self.high < 1.0 {
            return Err(invalid(format!(
                "band_high_multiplier must be at least 1, got {}",
                self.high
            )));
        }
        Ok(())
    }

    /// Returns `(high, low)` computed from every forecast point with this pair.
    pub fn apply(&self, forecast: &[u64]) -> (Vec<u64>, Vec<u64>) {
        forecast
            .iter()
            .map(|&f| {
                let f = f as f64;
                (to_count(f * self.high), to_count(f * self.low))
            })
            .unzip()
    }
}

impl Default for BandMultipliers {
    fn default() -> Self {
        Self::DEFAULT
    }
}
