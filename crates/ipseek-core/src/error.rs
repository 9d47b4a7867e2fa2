//! Error types for ipseek
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for ipseek operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for ipseek
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// No update group with the requested name
    #[error("Update group is not found: {0}")]
    GroupNotFound(String),

    /// No backend driver registered for an object type
    #[error("No driver registered for type {0}")]
    UnknownObjectType(String),

    /// A driver-required configuration key is absent
    #[error("Missing configuration setting: {0}")]
    MissingSetting(String),

    /// Authentication against a remote control plane failed
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// HTTP transport or unexpected status errors
    #[error("HTTP error: {0}")]
    Http(String),

    /// Invalid endpoint URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Filesystem errors (configuration loading)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Driver-scoped error
    #[error("Driver error ({driver}): {message}")]
    Driver {
        /// Driver type name
        driver: String,
        /// Error message
        message: String,
    },
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a "group not found" error
    pub fn group_not_found(name: impl Into<String>) -> Self {
        Self::GroupNotFound(name.into())
    }

    /// Create an unknown object type error
    pub fn unknown_type(object_type: impl Into<String>) -> Self {
        Self::UnknownObjectType(object_type.into())
    }

    /// Create a missing setting error
    pub fn missing_setting(key: impl Into<String>) -> Self {
        Self::MissingSetting(key.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create an invalid URL error
    pub fn invalid_url(msg: impl Into<String>) -> Self {
        Self::InvalidUrl(msg.into())
    }

    /// Create a driver-scoped error
    pub fn driver(driver: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Driver {
            driver: driver.into(),
            message: message.into(),
        }
    }
}
