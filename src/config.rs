use std::path::PathBuf;
use std::time::Duration;

use crate::error::{AppError, Result};

pub const DEFAULT_BASE_URL: &str = "https://www.alphavantage.co/query";
pub const DEFAULT_MAX_RETRIES: u32 = 6;
pub const DEFAULT_BACKOFF_SECS: u64 = 15;

/// Runtime configuration, resolved from the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Alpha Vantage API key
    pub api_key: String,

    /// Provider query endpoint
    pub base_url: String,

    /// SQLite database path
    pub db_path: PathBuf,

    /// Root directory for CSV artifacts
    pub data_dir: PathBuf,

    /// Total request attempts before giving up
    pub max_retries: u32,

    /// Fixed delay between retry attempts
    pub backoff: Duration,
}

impl AppConfig {
    /// Resolve config from environment variables, falling back to defaults.
    /// Fails only when the API key is missing.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("ALPHAVANTAGE_API_KEY").map_err(|_| {
            AppError::Config("Missing API key: set ALPHAVANTAGE_API_KEY".to_string())
        })?;

        Ok(Self {
            api_key,
            ..Self::offline()
        })
    }

    /// Config without provider credentials, for commands that never hit the
    /// network (ingest, status, add-job).
    pub fn offline() -> Self {
        Self {
            api_key: String::new(),
            base_url: std::env::var("STOCKER_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            db_path: std::env::var("STOCKER_DB")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("stocker.db")),
            data_dir: std::env::var("MARKET_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("market_data")),
            max_retries: parse_env("STOCKER_MAX_RETRIES", DEFAULT_MAX_RETRIES),
            backoff: Duration::from_secs(parse_env("STOCKER_BACKOFF_SECS", DEFAULT_BACKOFF_SECS)),
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
