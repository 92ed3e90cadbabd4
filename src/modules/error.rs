//! Error types reported by module runtimes.

use thiserror::Error;

/// Errors a module can report while loading.
#[derive(Debug, Error)]
pub enum ModuleError {
    #[error("Failed to load module '{module}': {message}")]
    LoadFailed { module: String, message: String },

    #[error("Module '{module}' is missing option '{key}'")]
    MissingOption { module: String, key: String },

    #[error("Option '{key}' of module '{module}' has the wrong type")]
    OptionType { module: String, key: String },
}

/// Result type for module operations.
pub type ModuleResult<T> = Result<T, ModuleError>;
