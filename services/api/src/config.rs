//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The
//! `.env` file is used for local development.

use std::net::SocketAddr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    pub openai_api_key: Option<String>,
    pub generation_model: String,
    pub generation_timeout: Duration,
    pub rate_limit_max_requests: i64,
    pub rate_limit_window_hours: i64,
    pub cors_allowed_origin: String,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for
    /// development, but this is skipped in test environments to ensure tests
    /// are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Load Server and Database Settings ---
        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Load Generation Settings ---
        let openai_api_key = std::env::var("OPENAI_API_KEY").ok();
        let generation_model =
            std::env::var("GENERATION_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
        let generation_timeout_secs =
            parse_env_positive_int("GENERATION_TIMEOUT_SECS", 10)?;
        let generation_timeout = Duration::from_secs(generation_timeout_secs as u64);

        // --- Load Rate Limit Settings ---
        let rate_limit_max_requests = parse_env_positive_int("RATE_LIMIT_MAX_REQUESTS", 10)?;
        let rate_limit_window_hours = parse_env_positive_int("RATE_LIMIT_WINDOW_HOURS", 24)?;

        let cors_allowed_origin = std::env::var("CORS_ALLOWED_ORIGIN")
            .unwrap_or_else(|_| "http://localhost:3000".to_string());

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            openai_api_key,
            generation_model,
            generation_timeout,
            rate_limit_max_requests,
            rate_limit_window_hours,
            cors_allowed_origin,
        })
    }
}

/// Parses an integer setting that only makes sense strictly positive
/// (timeouts, caps, window sizes). Zero or negative values are configuration
/// mistakes, not requests for "no limit".
fn parse_env_positive_int(name: &str, default: i64) -> Result<i64, ConfigError> {
    let value = match std::env::var(name) {
        Ok(raw) => raw
            .parse::<i64>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string()))?,
        Err(_) => default,
    };

    if value <= 0 {
        return Err(ConfigError::InvalidValue(
            name.to_string(),
            format!("must be a positive integer, got {}", value),
        ));
    }
    Ok(value)
}
