use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-process request counters served at `/api/stats`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestStats {
    pub started_at: DateTime<Utc>,
    pub forecasts_served: u64,
    /// Forecast requests answered with the empty fallback
    pub forecasts_degraded: u64,
    pub history_requests: u64,
    pub player_requests: u64,
    pub upstream_failures: u64,
    pub strategies_used: HashMap<String, u64>,
}

impl Default for RequestStats {
    fn default() -> Self {
        let mut strategies = HashMap::new();
        strategies.insert("recent_momentum".to_string(), 0);
        strategies.insert("linear_fit".to_string(), 0);

        RequestStats {
            started_at: Utc::now(),
            forecasts_served: 0,
            forecasts_degraded: 0,
            history_requests: 0,
            player_requests: 0,
            upstream_failures: 0,
            strategies_used: strategies,
        }
    }
}

impl RequestStats {
    pub fn record_forecast(&mut self, strategy: &str) {
        self.forecasts_served += 1;
        *self.strategies_used.entry(strategy.to_string()).or_insert(0) += 1;
    }

    pub fn record_degraded(&mut self) {
        self.forecasts_degraded += 1;
    }

    pub fn record_history(&mut self) {
        self.history_requests += 1;
    }

    pub fn record_players(&mut self) {
        self.player_requests += 1;
    }

    pub fn record_upstream_failure(&mut self) {
        self.upstream_failures += 1;
    }

    /// Share of forecast requests that produced a real result.
    pub fn success_ratio(&self) -> f64 {
        let total = self.forecasts_served + self.forecasts_degraded;
        if total == 0 {
            return 1.0;
        }
        self.forecasts_served as f64 / total as f64
    }
}
