//! Application configuration loading and validation.
//!
//! Configuration is loaded from a TOML file with environment variable
//! overrides for the eligibility windows (`ELIGIBILITY_*`). Venue client
//! knobs (`KALSHI_*`) are resolved by the clients themselves.

use serde::Deserialize;
use std::path::Path;
use tracing_subscriber::{fmt, EnvFilter};

use crate::core::domain::eligibility::{
    DEFAULT_FORWARD_HOURS_CRYPTO_DAILY, DEFAULT_GRACE_MINUTES, DEFAULT_LOOKBACK_HOURS_CRYPTO,
    DEFAULT_LOOKBACK_HOURS_LONG,
};
use crate::error::{Error, Result};

/// Database settings.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
}

fn default_database_url() -> String {
    "matchlock.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// JSON log format instead of pretty.
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Eligibility window settings.
#[derive(Debug, Clone, Deserialize)]
pub struct EligibilityConfig {
    #[serde(default = "default_grace_minutes")]
    pub grace_minutes: i64,
    #[serde(default = "default_forward_hours_crypto_daily")]
    pub forward_hours_crypto_daily: i64,
    #[serde(default = "default_lookback_hours_crypto_daily")]
    pub lookback_hours_crypto_daily: i64,
    #[serde(default = "default_lookback_hours_macro")]
    pub lookback_hours_macro: i64,
}

fn default_grace_minutes() -> i64 {
    DEFAULT_GRACE_MINUTES
}

fn default_forward_hours_crypto_daily() -> i64 {
    DEFAULT_FORWARD_HOURS_CRYPTO_DAILY
}

fn default_lookback_hours_crypto_daily() -> i64 {
    DEFAULT_LOOKBACK_HOURS_CRYPTO
}

fn default_lookback_hours_macro() -> i64 {
    DEFAULT_LOOKBACK_HOURS_LONG
}

impl Default for EligibilityConfig {
    fn default() -> Self {
        Self {
            grace_minutes: default_grace_minutes(),
            forward_hours_crypto_daily: default_forward_hours_crypto_daily(),
            lookback_hours_crypto_daily: default_lookback_hours_crypto_daily(),
            lookback_hours_macro: default_lookback_hours_macro(),
        }
    }
}

/// Matching caps.
#[derive(Debug, Clone, Deserialize)]
pub struct MatchingConfig {
    #[serde(default = "default_max_per_side")]
    pub max_per_left: usize,
    #[serde(default = "default_max_per_side")]
    pub max_per_right: usize,
    #[serde(default = "default_quote_heartbeat_secs")]
    pub quote_heartbeat_secs: i64,
}

fn default_max_per_side() -> usize {
    3
}

fn default_quote_heartbeat_secs() -> i64 {
    60
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            max_per_left: default_max_per_side(),
            max_per_right: default_max_per_side(),
            quote_heartbeat_secs: default_quote_heartbeat_secs(),
        }
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub eligibility: EligibilityConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
}

fn env_i64(name: &str) -> Option<i64> {
    std::env::var(name).ok()?.trim().parse().ok()
}

impl Config {
    /// Load configuration from a TOML file; a missing file means defaults.
    /// Environment overrides are applied afterwards either way.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(path)?;
            toml::from_str(&raw).map_err(|e| Error::Config(e.to_string()))?
        } else {
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Some(v) = env_i64("ELIGIBILITY_GRACE_MINUTES") {
            self.eligibility.grace_minutes = v;
        }
        if let Some(v) = env_i64("ELIGIBILITY_FORWARD_HOURS_CRYPTO_DAILY") {
            self.eligibility.forward_hours_crypto_daily = v;
        }
        if let Some(v) = env_i64("ELIGIBILITY_LOOKBACK_HOURS_CRYPTO_DAILY") {
            self.eligibility.lookback_hours_crypto_daily = v;
        }
        if let Some(v) = env_i64("ELIGIBILITY_LOOKBACK_HOURS_MACRO") {
            self.eligibility.lookback_hours_macro = v;
        }
    }

    /// Initialize tracing with the configured level and format.
    pub fn init_logging(&self, level_override: Option<&str>) {
        let level = level_override.unwrap_or(&self.logging.level);
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(format!("matchlock={level},warn")));
        if self.logging.json {
            let _ = fmt().with_env_filter(filter).json().try_init();
        } else {
            let _ = fmt().with_env_filter(filter).try_init();
        }
    }
}
