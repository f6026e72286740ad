//! Settings error types.

use thiserror::Error;

/// Errors that can occur when loading settings.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    /// One or more required variables are unset or empty.
    #[error("missing required configuration: {}", .0.join(", "))]
    Missing(Vec<&'static str>),
    /// A variable is present but its value cannot be used.
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Result type for settings operations.
pub type Result<T> = std::result::Result<T, SettingsError>;
