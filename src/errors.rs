//! Error handling for the kodekalender progression engine
//!
//! This module provides the structured error types shared by every other
//! module in the crate.

use crate::session_store::StoreError;
use thiserror::Error;

/// Main error type for the progression engine
#[derive(Error, Debug)]
pub enum KalenderError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Session store operation failed: {operation} - {source}")]
    Store {
        operation: String,
        #[source]
        source: StoreError,
    },

    #[error("Serialization failed: {context}")]
    Serialization {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Catalog error: {message}")]
    Catalog { message: String },

    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    #[error("Resource not found: {resource} - {id}")]
    NotFound { resource: String, id: String },

    #[error("I/O operation failed: {operation}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Network operation failed: {operation}")]
    Network {
        operation: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Mutex lock failed: {resource}")]
    MutexPoisoned { resource: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Type alias for Result with KalenderError
pub type KalenderResult<T> = Result<T, KalenderError>;

impl KalenderError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a store error
    pub fn store(operation: impl Into<String>, source: StoreError) -> Self {
        Self::Store {
            operation: operation.into(),
            source,
        }
    }

    /// Create a serialization error
    pub fn serialization(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Serialization {
            context: context.into(),
            source,
        }
    }

    /// Create a catalog error
    pub fn catalog(message: impl Into<String>) -> Self {
        Self::Catalog {
            message: message.into(),
        }
    }

    /// Create a validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(resource: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: id.into(),
        }
    }

    /// Create an I/O error
    pub fn io(operation: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }

    /// Create a network error
    pub fn network(operation: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            operation: operation.into(),
            source,
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// True when the underlying failure is transient and the caller may retry
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            KalenderError::Store {
                source: StoreError::Unavailable { .. },
                ..
            } | KalenderError::Network { .. }
        )
    }
}

/// Helper trait for safe mutex operations
///
/// Returns a proper error on lock poisoning instead of panicking.
pub trait SafeLock<T: ?Sized> {
    /// Safely lock a mutex, returning a KalenderError on poison
    fn safe_lock(&self) -> KalenderResult<std::sync::MutexGuard<'_, T>>;
}

impl<T: ?Sized> SafeLock<T> for std::sync::Mutex<T> {
    fn safe_lock(&self) -> KalenderResult<std::sync::MutexGuard<'_, T>> {
        self.lock().map_err(|_| KalenderError::MutexPoisoned {
            resource: "generic_mutex".to_string(),
        })
    }
}

/// Convert from store errors
impl From<StoreError> for KalenderError {
    fn from(err: StoreError) -> Self {
        KalenderError::store("session_store", err)
    }
}

/// Convert from serde_json errors
impl From<serde_json::Error> for KalenderError {
    fn from(err: serde_json::Error) -> Self {
        KalenderError::serialization("json_operation", err)
    }
}

/// Convert from std::io errors
impl From<std::io::Error> for KalenderError {
    fn from(err: std::io::Error) -> Self {
        KalenderError::io("io_operation", err)
    }
}

/// Convert from reqwest errors
impl From<reqwest::Error> for KalenderError {
    fn from(err: reqwest::Error) -> Self {
        KalenderError::network("http_request", err)
    }
}

/// Convert from String errors
impl From<String> for KalenderError {
    fn from(err: String) -> Self {
        KalenderError::Internal { message: err }
    }
}
