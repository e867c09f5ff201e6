use serde::{Deserialize, Serialize};

use crate::error::{ForecastError, Result};

/// One daily observation. `index` is the day offset; insertion order is
/// chronological, most recent last.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub index: u32,
    pub value: f64,
}

impl Sample {
    pub fn new(index: u32, value: f64) -> Self {
        Self { index, value }
    }
}

/// Numbers a plain value sequence from day 0.
pub fn samples_from_values(values: &[f64]) -> Vec<Sample> {
    values
        .iter()
        .enumerate()
        .map(|(i, &v)| Sample::new(i as u32, v))
        .collect()
}

/// The trailing `size` values, or all of them if fewer exist.
pub fn trailing_window(values: &[f64], size: usize) -> &[f64] {
    let start = values.len().saturating_sub(size);
    &values[start..]
}

/// Fails on the first NaN or infinite value.
pub fn check_finite(values: &[f64]) -> Result<()> {
    match values.iter().position(|v| !v.is_finite()) {
        Some(index) => Err(ForecastError::InvalidSample {
            index,
            value: values[index],
        }),
        None => Ok(()),
    }
}
