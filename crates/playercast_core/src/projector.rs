use serde::{Deserialize, Serialize};

/// Fixed policy constants for the projection heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectionParams {
    /// Step at which the slope contribution has decayed to zero.
    pub damping_constant: f64,
    /// Amplitude of the additive oscillation.
    pub seasonal_amplitude: f64,
    /// Divisor applied to the step before `sin`.
    pub seasonal_period: f64,
}

impl Default for ProjectionParams {
    fn default() -> Self {
        Self {
            damping_constant: 40.0,
            seasonal_amplitude: 120.0,
            seasonal_period: 6.0,
        }
    }
}

impl ProjectionParams {
    /// Linear decay from 1 at step 0 to 0 at `damping_constant`.
    #[inline]
    pub fn decay(&self, step: usize) -> f64 {
        (1.0 - step as f64 / self.damping_constant).max(0.0)
    }

    #[inline]
    pub fn seasonal(&self, step: usize) -> f64 {
        self.seasonal_amplitude * (step as f64 / self.seasonal_period).sin()
    }
}

/// Round to the nearest count, clamping negatives to zero.
#[inline]
pub fn to_count(value: f64) -> u64 {
    if value.is_nan() {
        return 0;
    }
    value.round().max(0.0) as u64
}

/// Extrapolate `horizon` values starting at `anchor`.
///
/// Step 0 is the anchor itself. Every later step adds the damped slope and
/// the seasonal term to the running (unclamped) value; only the emitted
/// counts are clamped at zero.
pub fn project(anchor: f64, slope: f64, horizon: usize, params: &ProjectionParams) -> Vec<u64> {
    let mut out = Vec::with_capacity(horizon);
    if horizon == 0 {
        return out;
    }

    let mut value = anchor;
    out.push(to_count(value));
    for step in 1..horizon {
        value += slope * params.decay(step) + params.seasonal(step);
        out.push(to_count(value));
    }
    out
}
