//! Short-horizon player-count forecasting.
//!
//! The pipeline is linear and stateless:
//! window -> [`smoothing`] -> [`trend`] -> [`projector`] -> [`bands`].
//! [`compute_forecast`] runs it end to end. Nothing here performs I/O.

pub mod bands;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod projector;
pub mod series;
pub mod smoothing;
pub mod trend;

pub use bands::BandMultipliers;
pub use config::{ForecastConfig, SlopeStrategy};
pub use error::{ForecastError, Result};
pub use pipeline::{compute_forecast, compute_forecast_samples, ForecastResult};
pub use projector::ProjectionParams;
pub use series::Sample;
