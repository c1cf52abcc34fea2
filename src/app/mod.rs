//! Application configuration and wiring.

mod config;

pub use config::{
    Config, DatabaseConfig, EligibilityConfig, LoggingConfig, MatchingConfig,
};
