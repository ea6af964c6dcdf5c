//! Error types for reconciliation operations.
//!
//! This module defines the error types used throughout the lbaas crates.
//! All errors implement `std::error::Error` via `thiserror`.

use thiserror::Error;

/// Result type alias for lbaas operations.
pub type LbaasResult<T> = Result<T, LbaasError>;

/// Errors that can occur while mapping or reconciling a service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LbaasError {
    /// Malformed or unsupported input to the model adapter.
    #[error("Cannot map {field}: {message}")]
    Mapping {
        /// The offending input field.
        field: String,
        /// Error message.
        message: String,
    },

    /// A device client call failed.
    #[error("Device {operation} of {kind} '{key}' failed: {message}")]
    Device {
        /// The operation that failed (e.g., "create", "update", "delete").
        operation: String,
        /// The resource kind.
        kind: String,
        /// The resource path.
        key: String,
        /// Error message.
        message: String,
    },

    /// The addressed device object does not exist.
    #[error("{kind} '{key}' not found on device")]
    NotFound {
        /// The resource kind.
        kind: String,
        /// The resource path.
        key: String,
    },

    /// Invalid agent configuration.
    #[error("Invalid configuration for {field}: {message}")]
    Config {
        /// The field that failed validation.
        field: String,
        /// Error message.
        message: String,
    },

    /// A network collaborator (L3 binding, port allocation, topology) failed.
    #[error("Network operation failed: {operation}: {message}")]
    Network {
        /// The operation that failed.
        operation: String,
        /// Error message.
        message: String,
    },

    /// Internal error (unexpected state).
    #[error("Internal error: {message}")]
    Internal {
        /// Error message.
        message: String,
    },
}

impl LbaasError {
    /// Creates a mapping error.
    pub fn mapping(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Mapping {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates a device operation error.
    pub fn device(
        operation: impl Into<String>,
        kind: impl Into<String>,
        key: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Device {
            operation: operation.into(),
            kind: kind.into(),
            key: key.into(),
            message: message.into(),
        }
    }

    /// Creates a not found error.
    pub fn not_found(kind: impl Into<String>, key: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            key: key.into(),
        }
    }

    /// Creates an invalid configuration error.
    pub fn config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Config {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates a network collaborator error.
    pub fn network(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Network {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this error indicates a transient condition
    /// that may succeed when the reconciliation is repeated.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LbaasError::Device { .. } | LbaasError::NotFound { .. } | LbaasError::Network { .. }
        )
    }
}
