//! Error types for pageplus
//!
//! Provides standardized error handling across the controller.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur in pageplus
#[derive(Debug, Error)]
pub enum PagePlusError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A URL that could not be parsed into a hash
    #[error("Invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// Options storage could not be read or written
    #[error("Storage error in {path}: {message}")]
    Storage { path: PathBuf, message: String },

    /// Options could not be initialized at startup
    #[error("Failed to initialize options: {0}")]
    OptionsInit(String),

    /// An option value rejected by its schema
    #[error("Invalid value for option '{key}' of module '{module}': {message}")]
    InvalidOption {
        module: String,
        key: String,
        message: String,
    },

    /// A GUID with no registered module
    #[error("Module '{0}' not registered")]
    UnknownModule(String),

    /// HTTP requests to the school API or the remote disable list
    #[error("HTTP error: {0}")]
    Http(String),

    /// The lifecycle dispatcher task is gone
    #[error("Dispatcher error: {0}")]
    Dispatcher(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing errors
    #[error("Config parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

impl From<ureq::Error> for PagePlusError {
    fn from(e: ureq::Error) -> Self {
        PagePlusError::Http(e.to_string())
    }
}

/// Result type alias for pageplus operations
pub type PagePlusResult<T> = Result<T, PagePlusError>;
