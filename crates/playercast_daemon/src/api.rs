use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    response::Json,
    routing::{get, post},
    Router,
};
use playercast_core::projector::to_count;
use playercast_core::{
    compute_forecast, BandMultipliers, ForecastConfig, ForecastError, ForecastResult,
    SlopeStrategy,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::cache::{CacheStats, CachedFetcher, SeriesCache};
use crate::config::Config;
use crate::fetcher::{SeriesFetcher, SteamFetcher, UpstreamFetchError};
use crate::stats::RequestStats;

/// Upper bound on a requested horizon.
pub const MAX_HORIZON: usize = 365;

/// Upper bound on the history window a request may smooth.
pub const MAX_WINDOW: usize = 365;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Upstream(#[from] UpstreamFetchError),
    #[error(transparent)]
    Forecast(#[from] ForecastError),
    #[error("malformed request body: {0}")]
    Body(String),
}

#[derive(Clone)]
pub struct ApiState {
    fetcher: Arc<dyn SeriesFetcher>,
    config: Arc<Config>,
    stats: Arc<Mutex<RequestStats>>,
}

impl ApiState {
    pub fn new(fetcher: Arc<dyn SeriesFetcher>, config: Config) -> Self {
        Self {
            fetcher,
            config: Arc::new(config),
            stats: Arc::new(Mutex::new(RequestStats::default())),
        }
    }

    fn stats(&self) -> MutexGuard<'_, RequestStats> {
        self.stats.lock().unwrap_or_else(|poisoned| {
            warn!("Stats mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

// Response types
#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    version: String,
}

#[derive(Serialize)]
pub struct StatsResponse {
    requests: RequestStats,
    cache: Option<CacheStats>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BandPreset {
    Default,
    Wide,
}

impl From<BandPreset> for BandMultipliers {
    fn from(preset: BandPreset) -> Self {
        match preset {
            BandPreset::Default => BandMultipliers::DEFAULT,
            BandPreset::Wide => BandMultipliers::WIDE,
        }
    }
}

/// Per-request overrides on top of the configured forecast settings.
#[derive(Debug, Default, Deserialize)]
pub struct ForecastQuery {
    horizon: Option<usize>,
    band: Option<BandPreset>,
    strategy: Option<SlopeStrategy>,
}

impl ForecastQuery {
    fn apply(&self, base: &ForecastConfig) -> ForecastConfig {
        let mut config = base.clone();
        if let Some(horizon) = self.horizon {
            config.horizon = horizon;
        }
        if let Some(band) = self.band {
            config = config.with_bands(band.into());
        }
        if let Some(strategy) = self.strategy {
            config.slope_strategy = strategy;
        }
        cap_request_cost(&mut config);
        config
    }
}

#[derive(Debug, Deserialize)]
pub struct ForecastRequest {
    series: Vec<f64>,
    /// Partial `ForecastConfig`, layered over the configured forecast section
    #[serde(default)]
    options: Option<Map<String, Value>>,
}

/// Smoothing cost grows with the window squared; keep one request bounded.
fn cap_request_cost(config: &mut ForecastConfig) {
    config.horizon = config.horizon.min(MAX_HORIZON);
    config.window_size = config.window_size.min(MAX_WINDOW);
}

fn merge_options(
    base: &ForecastConfig,
    options: Map<String, Value>,
) -> Result<ForecastConfig, ApiError> {
    let mut merged = serde_json::to_value(base).map_err(|e| ApiError::Body(e.to_string()))?;
    if let Value::Object(fields) = &mut merged {
        fields.extend(options);
    }
    serde_json::from_value(merged)
        .map_err(|e| ApiError::Body(format!("invalid forecast options: {}", e)))
}

fn strategy_label(strategy: SlopeStrategy) -> &'static str {
    match strategy {
        SlopeStrategy::RecentMomentum => "recent_momentum",
        SlopeStrategy::LinearFit => "linear_fit",
    }
}

/// Counts a produced forecast, or logs the failure and substitutes the empty
/// result.
fn finish_forecast(
    state: &ApiState,
    subject: &str,
    strategy: SlopeStrategy,
    outcome: Result<ForecastResult, ApiError>,
) -> ForecastResult {
    match outcome {
        Ok(result) => {
            state.stats().record_forecast(strategy_label(strategy));
            result
        }
        Err(e) => {
            {
                let mut stats = state.stats();
                stats.record_degraded();
                if matches!(e, ApiError::Upstream(_)) {
                    stats.record_upstream_failure();
                }
            }
            warn!(subject = subject, error = %e, "Forecast degraded to empty result");
            ForecastResult::empty()
        }
    }
}

async fn player_values(state: &ApiState, app_id: &str) -> Result<Vec<f64>, UpstreamFetchError> {
    let history = state.fetcher.fetch_history(app_id).await?;
    Ok(history.iter().map(|p| p.players).collect())
}

// Handlers
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn get_players(State(state): State<ApiState>, Path(app_id): Path<String>) -> Json<u64> {
    state.stats().record_players();
    match state.fetcher.fetch_current_players(&app_id).await {
        Ok(count) => Json(count),
        Err(e) => {
            state.stats().record_upstream_failure();
            warn!(app_id = %app_id, error = %e, "Player count unavailable");
            Json(0)
        }
    }
}

async fn get_history(State(state): State<ApiState>, Path(app_id): Path<String>) -> Json<Vec<u64>> {
    state.stats().record_history();
    match player_values(&state, &app_id).await {
        Ok(values) => {
            let window = state.config.forecast.window_size;
            let start = values.len().saturating_sub(window);
            Json(values[start..].iter().map(|&v| to_count(v)).collect())
        }
        Err(e) => {
            state.stats().record_upstream_failure();
            warn!(app_id = %app_id, error = %e, "History unavailable");
            Json(Vec::new())
        }
    }
}

async fn get_forecast(
    State(state): State<ApiState>,
    Path(app_id): Path<String>,
    query: Result<Query<ForecastQuery>, QueryRejection>,
) -> Json<ForecastResult> {
    let query = match query {
        Ok(Query(query)) => query,
        Err(rejection) => {
            warn!(
                app_id = %app_id,
                error = %rejection.body_text(),
                "Ignoring malformed forecast query"
            );
            ForecastQuery::default()
        }
    };
    let config = query.apply(&state.config.forecast);

    let outcome = match player_values(&state, &app_id).await {
        Ok(values) => compute_forecast(&values, &config).map_err(ApiError::from),
        Err(e) => Err(ApiError::from(e)),
    };

    Json(finish_forecast(&state, &app_id, config.slope_strategy, outcome))
}

async fn post_forecast(
    State(state): State<ApiState>,
    payload: Result<Json<ForecastRequest>, JsonRejection>,
) -> Json<ForecastResult> {
    let base = &state.config.forecast;
    let (strategy, outcome) = match payload {
        Ok(Json(request)) => {
            let config = match request.options {
                Some(options) => merge_options(base, options),
                None => Ok(base.clone()),
            };
            match config {
                Ok(mut config) => {
                    cap_request_cost(&mut config);
                    let outcome =
                        compute_forecast(&request.series, &config).map_err(ApiError::from);
                    (config.slope_strategy, outcome)
                }
                Err(e) => (base.slope_strategy, Err(e)),
            }
        }
        Err(rejection) => (
            base.slope_strategy,
            Err(ApiError::Body(rejection.body_text())),
        ),
    };

    Json(finish_forecast(&state, "inline", strategy, outcome))
}

async fn get_stats(State(state): State<ApiState>) -> Json<StatsResponse> {
    let requests = state.stats().clone();
    Json(StatsResponse {
        requests,
        cache: state.fetcher.cache_stats(),
    })
}

async fn get_config(State(state): State<ApiState>) -> Json<Config> {
    Json(state.config.as_ref().clone())
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/players/:app_id", get(get_players))
        .route("/api/history/:app_id", get(get_history))
        .route("/api/forecast", post(post_forecast))
        .route("/api/forecast/:app_id", get(get_forecast))
        .route("/api/stats", get(get_stats))
        .route("/api/config", get(get_config))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Builds the cached upstream fetcher described by `config`.
pub fn build_fetcher(config: &Config) -> Result<Arc<dyn SeriesFetcher>, UpstreamFetchError> {
    let upstream = SteamFetcher::new(&config.upstream)?;
    let cache = SeriesCache::new(
        config.cache.capacity,
        config.cache.ttl_secs.map(Duration::from_secs),
    );
    let delay = Duration::from_millis(config.upstream.rate_limit_delay_ms);
    Ok(Arc::new(CachedFetcher::new(upstream, cache, delay)))
}

pub async fn run_api_server(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let fetcher = build_fetcher(&config)?;
    let addr = config.api.bind_addr();
    let app = router(ApiState::new(fetcher, config));

    info!(addr = %addr, "API server listening");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::{FetchFuture, History, HistoryPoint};
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use chrono::{TimeZone, Utc};
    use tower::ServiceExt;

    /// Serves a fixed history for app "730" and fails for everything else.
    struct StubFetcher {
        history: Vec<f64>,
    }

    impl SeriesFetcher for StubFetcher {
        fn fetch_history<'a>(&'a self, app_id: &'a str) -> FetchFuture<'a, History> {
            Box::pin(async move {
                if app_id != "730" {
                    return Err(UpstreamFetchError::Status {
                        status: 502,
                        url: format!("stub/{}", app_id),
                    });
                }
                Ok(Arc::new(
                    self.history
                        .iter()
                        .enumerate()
                        .map(|(i, &players)| HistoryPoint {
                            timestamp: Utc.timestamp_opt(i as i64 * 86_400, 0).unwrap(),
                            players,
                        })
                        .collect(),
                ))
            })
        }

        fn fetch_current_players<'a>(&'a self, app_id: &'a str) -> FetchFuture<'a, u64> {
            Box::pin(async move {
                if app_id == "730" {
                    Ok(654_321)
                } else {
                    Err(UpstreamFetchError::InvalidAppId(app_id.to_string()))
                }
            })
        }
    }

    fn app_with(config: Config) -> Router {
        let history: Vec<f64> = (0..60).map(|i| 10_000.0 + 50.0 * i as f64).collect();
        router(ApiState::new(Arc::new(StubFetcher { history }), config))
    }

    fn app() -> Router {
        app_with(Config::default())
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    async fn post_json(app: Router, uri: &str, body: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = get_json(app(), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_forecast_for_known_app() {
        let (status, body) = get_json(app(), "/api/forecast/730").await;
        assert_eq!(status, StatusCode::OK);
        let forecast = body["forecast"].as_array().unwrap();
        assert_eq!(forecast.len(), 30);
        assert_eq!(body["high"].as_array().unwrap().len(), 30);
        assert_eq!(body["low"].as_array().unwrap().len(), 30);
        assert!(forecast.iter().all(|v| v.is_u64()));
    }

    #[tokio::test]
    async fn test_forecast_query_overrides() {
        let uri = "/api/forecast/730?horizon=7&band=wide&strategy=linear_fit";
        let (_, body) = get_json(app(), uri).await;
        let forecast = body["forecast"].as_array().unwrap();
        let high = body["high"].as_array().unwrap();
        assert_eq!(forecast.len(), 7);
        let f0 = forecast[0].as_u64().unwrap() as f64;
        let h0 = high[0].as_u64().unwrap() as f64;
        assert!((h0 - (f0 * 1.15).round()).abs() < 1.0);
    }

    #[tokio::test]
    async fn test_forecast_upstream_failure_degrades() {
        let (status, body) = get_json(app(), "/api/forecast/999").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            serde_json::json!({"forecast": [], "high": [], "low": []})
        );
    }

    #[tokio::test]
    async fn test_malformed_query_falls_back_to_defaults() {
        let (status, body) = get_json(app(), "/api/forecast/730?horizon=7&band=bogus").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["forecast"].as_array().unwrap().len(), 30);

        let (_, body) = get_json(app(), "/api/forecast/730?horizon=-1").await;
        assert_eq!(body["forecast"].as_array().unwrap().len(), 30);
    }

    #[tokio::test]
    async fn test_history_window() {
        let (_, body) = get_json(app(), "/api/history/730").await;
        let values = body.as_array().unwrap();
        assert_eq!(values.len(), 30);
        assert_eq!(values[29], 10_000 + 50 * 59);

        let (_, body) = get_json(app(), "/api/history/1").await;
        assert_eq!(body, serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_players() {
        let (_, body) = get_json(app(), "/api/players/730").await;
        assert_eq!(body, 654_321);
        let (_, body) = get_json(app(), "/api/players/abc").await;
        assert_eq!(body, 0);
    }

    #[tokio::test]
    async fn test_post_forecast_inline_series() {
        let (status, body) = post_json(
            app(),
            "/api/forecast",
            r#"{"series": [100, 110, 120, 130], "options": {"horizon": 3}}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["forecast"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_post_options_layer_over_configured_section() {
        let mut config = Config::default();
        config.forecast = ForecastConfig::wide_band();
        let (_, body) = post_json(
            app_with(config),
            "/api/forecast",
            r#"{"series": [2000, 2000, 2000], "options": {"horizon": 3}}"#,
        )
        .await;

        assert_eq!(body["forecast"].as_array().unwrap().len(), 3);
        let f0 = body["forecast"][0].as_u64().unwrap();
        assert_eq!(f0, 2000);
        assert_eq!(body["high"][0], 2300);
        assert_eq!(body["low"][0], 1700);
    }

    #[tokio::test]
    async fn test_post_oversized_window_is_clamped() {
        let series: Vec<f64> = (0..2000).map(|i| 1_000.0 + (i * i) as f64 / 100.0).collect();
        let request = serde_json::json!({
            "series": series,
            "options": {"window_size": 100_000, "smoothing_fraction": 1.0},
        });
        let (_, body) = post_json(app(), "/api/forecast", &request.to_string()).await;

        let expected = compute_forecast(
            &series,
            &ForecastConfig {
                window_size: MAX_WINDOW,
                smoothing_fraction: 1.0,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(body, serde_json::to_value(&expected).unwrap());
    }

    #[tokio::test]
    async fn test_post_invalid_options_degrade() {
        let (status, body) = post_json(
            app(),
            "/api/forecast",
            r#"{"series": [1, 2, 3], "options": {"band_high_multiplier": 0.9}}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["forecast"], serde_json::json!([]));

        let (_, body) = post_json(
            app(),
            "/api/forecast",
            r#"{"series": [1, 2, 3], "options": {"horizon": "soon"}}"#,
        )
        .await;
        assert_eq!(body["high"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_post_forecast_bad_input_degrades() {
        let (status, body) = post_json(app(), "/api/forecast", r#"{"series": []}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["forecast"], serde_json::json!([]));

        let (status, body) = post_json(app(), "/api/forecast", "not json").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["low"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_stats_count_degraded_requests() {
        let app = app();
        get_json(app.clone(), "/api/forecast/730").await;
        get_json(app.clone(), "/api/forecast/404").await;
        let (_, body) = get_json(app, "/api/stats").await;

        assert_eq!(body["requests"]["forecasts_served"], 1);
        assert_eq!(body["requests"]["forecasts_degraded"], 1);
        assert_eq!(body["requests"]["upstream_failures"], 1);
        assert_eq!(body["requests"]["strategies_used"]["recent_momentum"], 1);
        assert!(body["cache"].is_null());
    }

    #[test]
    fn test_query_horizon_and_window_are_capped() {
        let query = ForecastQuery {
            horizon: Some(10_000),
            ..Default::default()
        };
        let base = ForecastConfig {
            window_size: 50_000,
            ..Default::default()
        };
        let config = query.apply(&base);
        assert_eq!(config.horizon, MAX_HORIZON);
        assert_eq!(config.window_size, MAX_WINDOW);
    }
}
