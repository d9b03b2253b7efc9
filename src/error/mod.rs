//! Error handling module for cuesplit

use thiserror::Error;

use crate::domain::errors::DomainError;

/// Main error type for cuesplit operations
#[derive(Error, Debug)]
pub enum CueSplitError {
    /// Domain rule or pipeline failure
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Invalid configuration value
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Configuration file could not be parsed
    #[error("Failed to parse configuration file {path}: {source}")]
    ConfigParse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    /// Directory walk error
    #[error("Failed to walk input directory: {0}")]
    Walk(#[from] walkdir::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type alias for cuesplit operations
pub type CueSplitResult<T> = std::result::Result<T, CueSplitError>;
