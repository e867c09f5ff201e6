//! Upstream player-data sources.
//!
//! The forecasting core never talks to the network; everything that does
//! lives behind [`SeriesFetcher`] so the API can be driven by a stub in tests.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::cache::CacheStats;
use crate::config::UpstreamConfig;

#[derive(Debug, Error)]
pub enum UpstreamFetchError {
    #[error("invalid app id {0:?}")]
    InvalidAppId(String),
    #[error("upstream request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("upstream returned HTTP {status} for {url}")]
    Status { status: u16, url: String },
    #[error("could not decode upstream payload: {0}")]
    Decode(String),
}

/// One point of upstream player history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    pub timestamp: DateTime<Utc>,
    pub players: f64,
}

/// Shared, immutable player history, oldest first.
pub type History = Arc<Vec<HistoryPoint>>;

pub type FetchFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, UpstreamFetchError>> + Send + 'a>>;

/// Supplies chronological player history and live player counts for an app.
pub trait SeriesFetcher: Send + Sync {
    /// Full available history, oldest first.
    fn fetch_history<'a>(&'a self, app_id: &'a str) -> FetchFuture<'a, History>;

    fn fetch_current_players<'a>(&'a self, app_id: &'a str) -> FetchFuture<'a, u64>;

    /// Counters of the history cache in front of this fetcher, if any.
    fn cache_stats(&self) -> Option<CacheStats> {
        None
    }
}

/// App ids are plain decimal numbers; anything else never reaches the network.
pub fn validate_app_id(app_id: &str) -> Result<(), UpstreamFetchError> {
    if app_id.is_empty() || app_id.len() > 12 || !app_id.bytes().all(|b| b.is_ascii_digit()) {
        return Err(UpstreamFetchError::InvalidAppId(app_id.to_string()));
    }
    Ok(())
}

/// Parses a chart-data payload: an array of `[timestamp_ms, players]` pairs.
/// Pairs with a missing player count are skipped.
pub fn parse_chart_data(body: &str) -> Result<Vec<HistoryPoint>, UpstreamFetchError> {
    let raw: Vec<(i64, Option<f64>)> =
        serde_json::from_str(body).map_err(|e| UpstreamFetchError::Decode(e.to_string()))?;

    let mut points = Vec::with_capacity(raw.len());
    for (ts_ms, players) in raw {
        let Some(players) = players else { continue };
        let timestamp = Utc.timestamp_millis_opt(ts_ms).single().ok_or_else(|| {
            UpstreamFetchError::Decode(format!("timestamp out of range: {}", ts_ms))
        })?;
        points.push(HistoryPoint { timestamp, players });
    }
    Ok(points)
}

#[derive(Deserialize)]
struct PlayerCountEnvelope {
    response: PlayerCountBody,
}

#[derive(Deserialize)]
struct PlayerCountBody {
    #[serde(default)]
    player_count: Option<u64>,
}

/// Parses the current-players payload; a missing count reads as 0.
pub fn parse_player_count(body: &str) -> Result<u64, UpstreamFetchError> {
    let envelope: PlayerCountEnvelope =
        serde_json::from_str(body).map_err(|e| UpstreamFetchError::Decode(e.to_string()))?;
    Ok(envelope.response.player_count.unwrap_or(0))
}

/// Fetches from the public chart-data host and the platform web API.
pub struct SteamFetcher {
    client: reqwest::Client,
    charts_base_url: String,
    api_base_url: String,
}

impl SteamFetcher {
    pub fn new(config: &UpstreamConfig) -> Result<Self, UpstreamFetchError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            charts_base_url: config.charts_base_url.trim_end_matches('/').to_string(),
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn history_url(&self, app_id: &str) -> String {
        format!("{}/app/{}/chart-data.json", self.charts_base_url, app_id)
    }

    pub fn players_url(&self, app_id: &str) -> String {
        format!(
            "{}/ISteamUserStats/GetNumberOfCurrentPlayers/v1/?appid={}",
            self.api_base_url, app_id
        )
    }

    async fn get_text(&self, url: String) -> Result<String, UpstreamFetchError> {
        debug!(url = %url, "Fetching upstream");
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamFetchError::Status {
                status: status.as_u16(),
                url,
            });
        }
        Ok(response.text().await?)
    }
}

impl SeriesFetcher for SteamFetcher {
    fn fetch_history<'a>(&'a self, app_id: &'a str) -> FetchFuture<'a, History> {
        Box::pin(async move {
            validate_app_id(app_id)?;
            let body = self.get_text(self.history_url(app_id)).await?;
            parse_chart_data(&body).map(Arc::new)
        })
    }

    fn fetch_current_players<'a>(&'a self, app_id: &'a str) -> FetchFuture<'a, u64> {
        Box::pin(async move {
            validate_app_id(app_id)?;
            let body = self.get_text(self.players_url(app_id)).await?;
            parse_player_count(&body)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_app_id() {
        assert!(validate_app_id("730").is_ok());
        assert!(validate_app_id("").is_err());
        assert!(validate_app_id("73a").is_err());
        assert!(validate_app_id("../etc").is_err());
        assert!(validate_app_id("1234567890123").is_err());
    }

    #[test]
    fn test_parse_chart_data_skips_nulls() {
        let body = "[[1325376000000, 12345], [1325462400000, null], [1325548800000, 13000.0]]";
        let points = parse_chart_data(body).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].players, 12345.0);
        assert_eq!(points[0].timestamp.timestamp(), 1_325_376_000);
        assert_eq!(points[1].players, 13000.0);
    }

    #[test]
    fn test_parse_chart_data_rejects_garbage() {
        assert!(matches!(
            parse_chart_data("<html>blocked</html>"),
            Err(UpstreamFetchError::Decode(_))
        ));
    }

    #[test]
    fn test_parse_player_count() {
        assert_eq!(
            parse_player_count(r#"{"response":{"player_count":812345,"result":1}}"#).unwrap(),
            812345
        );
        assert_eq!(parse_player_count(r#"{"response":{"result":42}}"#).unwrap(), 0);
        assert!(parse_player_count("{}").is_err());
    }

    #[test]
    fn test_urls_trim_trailing_slash() {
        let fetcher = SteamFetcher::new(&UpstreamConfig {
            charts_base_url: "http://charts.local/".to_string(),
            api_base_url: "http://api.local".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(
            fetcher.history_url("570"),
            "http://charts.local/app/570/chart-data.json"
        );
        assert_eq!(
            fetcher.players_url("570"),
            "http://api.local/ISteamUserStats/GetNumberOfCurrentPlayers/v1/?appid=570"
        );
    }
}
