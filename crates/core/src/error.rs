//! Error types for FakeAdb
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

/// Main error type for FakeAdb
#[derive(Error, Debug)]
pub enum FakeAdbError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for FakeAdb operations
pub type Result<T> = std::result::Result<T, FakeAdbError>;

impl FakeAdbError {
    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            FakeAdbError::Io(e) => format!("I/O failed: {}", e),
            FakeAdbError::Config(msg) => format!("Invalid configuration: {}", msg),
            FakeAdbError::TomlParse(e) => format!("Invalid configuration file: {}", e),
            _ => self.to_string(),
        }
    }
}
