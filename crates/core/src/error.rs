//! Core error types

use thiserror::Error;

/// Core error type for Mailwatch
#[derive(Debug, Error)]
pub enum CoreError {
    /// Configuration file could not be parsed
    #[cfg(feature = "toml")]
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
