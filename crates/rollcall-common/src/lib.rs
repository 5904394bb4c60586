//! # Rollcall Common
//!
//! Shared error type and logging configuration for the Rollcall offline
//! controller and its host surfaces.
//!
//! ## Features
//!
//! - Unified error type with per-surface categories
//! - Logging configuration and setup
//! - Result and Option extension traits

use thiserror::Error;

pub mod logging;

pub use logging::{init_logging, LogConfig, LogFormat};

/// Unified error type for Rollcall.
#[derive(Error, Debug)]
pub enum RollcallError {
    /// Network-related errors.
    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Cache storage errors.
    #[error("Cache error: {message}")]
    Cache {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Local record store errors.
    #[error("Storage error: {message}")]
    Storage {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Worker lifecycle errors (event delivered in the wrong state).
    #[error("State error: {0}")]
    State(String),

    /// Malformed push or control payloads.
    #[error("Payload error: {0}")]
    Payload(String),

    /// Configuration errors.
    #[error("Config error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// I/O errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Resource not found.
    #[error("Resource not found: {0}")]
    NotFound(String),
}

impl RollcallError {
    /// Create a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            source: None,
        }
    }

    /// Create a cache error.
    pub fn cache(message: impl Into<String>) -> Self {
        Self::Cache {
            message: message.into(),
            source: None,
        }
    }

    /// Create a storage error with source.
    pub fn storage_with_source<E: std::error::Error + Send + Sync + 'static>(
        message: impl Into<String>,
        source: E,
    ) -> Self {
        Self::Storage {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    /// Create a config error with source.
    pub fn config_with_source<E: std::error::Error + Send + Sync + 'static>(
        message: impl Into<String>,
        source: E,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a state error.
    pub fn state(message: impl Into<String>) -> Self {
        Self::State(message.into())
    }

    /// Create a payload error.
    pub fn payload(message: impl Into<String>) -> Self {
        Self::Payload(message.into())
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RollcallError::Network { .. } | RollcallError::Io(_))
    }

    /// Get the error category for logging fields.
    pub fn category(&self) -> &'static str {
        match self {
            RollcallError::Network { .. } => "network",
            RollcallError::Cache { .. } => "cache",
            RollcallError::Storage { .. } => "storage",
            RollcallError::State(_) => "state",
            RollcallError::Payload(_) => "payload",
            RollcallError::Config { .. } => "config",
            RollcallError::Io(_) => "io",
            RollcallError::Json(_) => "json",
            RollcallError::NotFound(_) => "not_found",
        }
    }
}

/// Result type alias for Rollcall operations.
pub type Result<T> = std::result::Result<T, RollcallError>;

/// Extension trait for Result.
pub trait ResultExt<T> {
    /// Add context to an error, classifying it as a config error.
    fn config_context(self, message: impl Into<String>) -> Result<T>;
}

impl<T, E: std::error::Error + Send + Sync + 'static> ResultExt<T> for std::result::Result<T, E> {
    fn config_context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| RollcallError::config_with_source(message, e))
    }
}

/// Extension trait for Option.
pub trait OptionExt<T> {
    /// Convert None to a NotFound error.
    fn ok_or_not_found(self, resource: impl Into<String>) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_not_found(self, resource: impl Into<String>) -> Result<T> {
        self.ok_or_else(|| RollcallError::NotFound(resource.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        assert_eq!(RollcallError::network("test").category(), "network");
        assert_eq!(RollcallError::cache("test").category(), "cache");
        assert_eq!(RollcallError::state("test").category(), "state");
        assert_eq!(RollcallError::payload("bad json").category(), "payload");
    }

    #[test]
    fn test_retryable() {
        assert!(RollcallError::network("test").is_retryable());
        assert!(!RollcallError::cache("test").is_retryable());
        assert!(!RollcallError::payload("test").is_retryable());
    }

    #[test]
    fn test_config_context() {
        let parsed: std::result::Result<u32, _> = "x".parse::<u32>();
        let err = parsed.config_context("version").unwrap_err();
        assert_eq!(err.category(), "config");
        assert!(err.to_string().contains("version"));
    }

    #[test]
    fn test_option_ext() {
        let some: Option<i32> = Some(42);
        assert_eq!(some.ok_or_not_found("test").unwrap(), 42);

        let none: Option<i32> = None;
        assert!(matches!(
            none.ok_or_not_found("test"),
            Err(RollcallError::NotFound(_))
        ));
    }
}
