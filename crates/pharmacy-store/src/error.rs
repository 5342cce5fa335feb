//! # Store Error Types
//!
//! Error types for store actions, the backend transport and snapshots.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  reqwest::Error ──► TransportError ─┐                                   │
//! │  io / serde_json ─► PersistenceError┤                                   │
//! │  ValidationError / CoreError ───────┼──► StoreError ──► caller          │
//! │                                     │         │                         │
//! │                                     │         └──► error slot           │
//! │                                     │              "Failed to create    │
//! │                                     │               user"               │
//! │  toml / io (config) ────────────────┘                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Snapshot failures never reach callers of CRUD actions: write-through
//! persistence is best effort and only logged.

use pharmacy_core::{CoreError, EntityKind, ValidationError};
use thiserror::Error;

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type alias for transport calls.
pub type TransportResult<T> = Result<T, TransportError>;

/// Result type alias for snapshot reads and writes.
pub type PersistenceResult<T> = Result<T, PersistenceError>;

// =============================================================================
// Store Error
// =============================================================================

/// Errors returned by store actions and store construction.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No record with this id in the collection.
    #[error("{} not found: {id}", .entity.singular())]
    NotFound { entity: EntityKind, id: String },

    /// Draft failed validation before a record was created.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A domain rule rejected the change.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Backend call failed; the local collection was left untouched.
    #[error("Backend request failed: {0}")]
    Transport(#[from] TransportError),

    /// Snapshot could not be read or written.
    #[error("Snapshot error: {0}")]
    Persistence(#[from] PersistenceError),

    /// A record or patch could not be converted to JSON.
    #[error("Serialization failed: {0}")]
    Serialization(String),

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    #[error("Invalid store configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),
}

impl StoreError {
    pub fn not_found(entity: EntityKind, id: impl Into<String>) -> Self {
        StoreError::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    /// True when retrying the same action may succeed.
    ///
    /// Only transport failures qualify: timeouts, connection errors and
    /// 5xx responses. Validation and domain errors are permanent.
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::Transport(e) => e.is_retryable(),
            _ => false,
        }
    }

    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            StoreError::InvalidConfig(_)
                | StoreError::ConfigLoadFailed(_)
                | StoreError::ConfigSaveFailed(_)
        )
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for StoreError {
    fn from(err: toml::de::Error) -> Self {
        StoreError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for StoreError {
    fn from(err: toml::ser::Error) -> Self {
        StoreError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Transport Error
// =============================================================================

/// Backend REST failures.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection refused, DNS failure, TLS failure.
    #[error("Request failed: {0}")]
    Request(String),

    #[error("Request timed out")]
    Timeout,

    /// Backend answered with a non-2xx status.
    #[error("Backend returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Response body was not the JSON shape expected.
    #[error("Invalid response body: {0}")]
    Decode(String),
}

impl TransportError {
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Request(_) | TransportError::Timeout => true,
            TransportError::Status { status, .. } => *status >= 500,
            TransportError::InvalidUrl(_) | TransportError::Decode(_) => false,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_decode() {
            TransportError::Decode(err.to_string())
        } else {
            TransportError::Request(err.to_string())
        }
    }
}

impl From<url::ParseError> for TransportError {
    fn from(err: url::ParseError) -> Self {
        TransportError::InvalidUrl(err.to_string())
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        TransportError::Decode(err.to_string())
    }
}

// =============================================================================
// Persistence Error
// =============================================================================

/// Snapshot read/write failures.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Payload present but not a valid snapshot.
    #[error("Corrupt snapshot: {0}")]
    Corrupt(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = StoreError::not_found(EntityKind::Users, "u-404");
        assert_eq!(err.to_string(), "user not found: u-404");
        assert!(err.is_not_found());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_retryable_errors() {
        assert!(StoreError::from(TransportError::Timeout).is_retryable());
        assert!(StoreError::from(TransportError::Status {
            status: 503,
            message: "unavailable".into()
        })
        .is_retryable());
        assert!(!StoreError::from(TransportError::Status {
            status: 422,
            message: "bad patch".into()
        })
        .is_retryable());
        assert!(!StoreError::InvalidConfig("bad".into()).is_retryable());
    }

    #[test]
    fn test_validation_converts() {
        let err: StoreError = ValidationError::Required {
            field: "name".into(),
        }
        .into();
        assert!(matches!(err, StoreError::Validation(_)));
        assert_eq!(err.to_string(), "Validation error: name is required");
    }
}
