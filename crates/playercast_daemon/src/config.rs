use playercast_core::ForecastConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse failed: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("config serialization failed: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid forecast section: {0}")]
    Forecast(#[from] playercast_core::ForecastError),
}

/// Returns the ~/.playercast directory, creating it if needed.
/// Falls back to a local `.playercast` directory if the home directory cannot be determined.
pub fn data_dir() -> PathBuf {
    match dirs::home_dir() {
        Some(mut path) => {
            path.push(".playercast");
            if let Err(e) = fs::create_dir_all(&path) {
                warn!(error = %e, "Could not create ~/.playercast, falling back to local .playercast");
                let fallback = PathBuf::from(".playercast");
                let _ = fs::create_dir_all(&fallback);
                return fallback;
            }
            path
        }
        None => {
            warn!("Could not determine home directory, falling back to local .playercast");
            let fallback = PathBuf::from(".playercast");
            let _ = fs::create_dir_all(&fallback);
            fallback
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub forecast: ForecastConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub port: u16,
    /// Bind 0.0.0.0 instead of loopback
    pub public: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            port: 5000,
            public: false,
        }
    }
}

impl ApiConfig {
    pub fn bind_addr(&self) -> String {
        if self.public || std::env::var("PLAYERCAST_PUBLIC").is_ok() {
            format!("0.0.0.0:{}", self.port)
        } else {
            format!("127.0.0.1:{}", self.port)
        }
    }
}

/// Where player data comes from and how politely it is fetched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Base URL of the chart-data host (history)
    #[serde(default = "default_charts_base_url")]
    pub charts_base_url: String,
    /// Base URL of the platform web API (current players)
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Pause before each uncached history fetch, in milliseconds
    #[serde(default = "default_rate_limit_delay_ms")]
    pub rate_limit_delay_ms: u64,
}

fn default_charts_base_url() -> String {
    "https://steamcharts.com".to_string()
}

fn default_api_base_url() -> String {
    "https://api.steampowered.com".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_user_agent() -> String {
    concat!("playercast/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_rate_limit_delay_ms() -> u64 {
    250
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            charts_base_url: default_charts_base_url(),
            api_base_url: default_api_base_url(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
            rate_limit_delay_ms: default_rate_limit_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of cached series
    pub capacity: usize,
    /// Entry lifetime; `None` keeps entries until evicted
    pub ttl_secs: Option<u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 50,
            ttl_secs: Some(600),
        }
    }
}

impl Config {
    pub fn get_config_path() -> PathBuf {
        let mut path = data_dir();
        path.push("config.toml");
        path
    }

    /// Loads the default config file, writing defaults first if it is missing.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::get_config_path();

        if !path.exists() {
            let config = Config::default();
            config.save_to(&path)?;
            info!(path = %path.display(), "Wrote default configuration");
            return Ok(config);
        }

        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.forecast.validate()?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}
