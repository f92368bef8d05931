//! Error types for the gordian library.
//!
//! Structured error types that preserve context and enable proper error
//! propagation throughout the analysis pipeline. Scan- and file-level
//! failures are recovered locally by the graph builder and never reach this
//! layer; the variants here cover the failures that do bubble up.

use std::io;

use thiserror::Error;

/// Main result type for gordian operations.
pub type Result<T> = std::result::Result<T, GordianError>;

/// Comprehensive error type for all gordian operations.
#[derive(Error, Debug)]
pub enum GordianError {
    /// I/O related errors (file operations, directory access)
    #[error("I/O error: {message}")]
    Io {
        /// Human-readable error message
        message: String,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config {
        /// Error description
        message: String,
        /// Configuration field that caused the error
        field: Option<String>,
    },

    /// Graph construction or traversal errors
    #[error("Graph error: {message}")]
    Graph {
        /// Error description
        message: String,
        /// Graph node or edge that caused the error
        element: Option<String>,
    },

    /// Graph store backend errors (connectivity, persistence, queries)
    #[error("Store error ({backend}): {message}")]
    Store {
        /// Backend identifier (`in-memory`, `json-file`, `neo4j`)
        backend: String,
        /// Error description
        message: String,
        /// Underlying backend error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error description
        message: String,
        /// Underlying serialization error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Validation errors for input data
    #[error("Validation error: {message}")]
    Validation {
        /// Error description
        message: String,
        /// Field or input that failed validation
        field: Option<String>,
    },
}

impl GordianError {
    /// Create a new I/O error with context
    pub fn io(message: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// Create a new configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            field: None,
        }
    }

    /// Create a configuration error scoped to a specific field
    pub fn config_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a new graph error
    pub fn graph(message: impl Into<String>) -> Self {
        Self::Graph {
            message: message.into(),
            element: None,
        }
    }

    /// Create a new store error for the given backend
    pub fn store(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Store {
            backend: backend.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Create a store error wrapping an underlying backend error
    pub fn store_with_source(
        backend: impl Into<String>,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Store {
            backend: backend.into(),
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a new validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: None,
        }
    }
}

impl From<serde_json::Error> for GordianError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

impl From<serde_yaml::Error> for GordianError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Serialization {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_includes_context() {
        let err = GordianError::store("neo4j", "connection refused");
        assert_eq!(err.to_string(), "Store error (neo4j): connection refused");

        let err = GordianError::config_field("must not be empty", "store.path");
        assert!(err.to_string().contains("must not be empty"));
    }

    #[test]
    fn io_error_preserves_source() {
        let inner = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        let err = GordianError::io("failed to read directory", inner);

        let source = std::error::Error::source(&err).expect("source preserved");
        assert!(source.to_string().contains("denied"));
    }

    #[test]
    fn serde_errors_convert() {
        let bad: std::result::Result<serde_json::Value, _> = serde_json::from_str("{nope");
        let err: GordianError = bad.unwrap_err().into();
        assert!(matches!(err, GordianError::Serialization { .. }));
    }
}
