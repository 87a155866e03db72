//! Configuration errors.

use super::error_code::{self, SiftErrorCode};

/// Errors raised while loading heuristics configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid cap value for {name}: {value}")]
    InvalidCap { name: &'static str, value: usize },
}

impl SiftErrorCode for ConfigError {
    fn error_code(&self) -> &'static str {
        error_code::CONFIG_ERROR
    }
}
