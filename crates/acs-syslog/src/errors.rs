//! Error types for the syslog event subsystem.
//!
//! [`SyslogEventError`] is returned by every operation in this crate. None of
//! the variants is retried here: each is surfaced to the caller as soon as it
//! occurs, after any pooled connection has been handed back.

use std::fmt;
use std::time::Duration;

use acs_core::StorageId;
use thiserror::Error;

/// A single field that failed structural validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldError {
    /// Field name (e.g. `delete_limit`).
    pub field: String,
    /// What is wrong with it.
    pub message: String,
}

impl FieldError {
    /// Create a field error.
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Errors that can occur while managing syslog event definitions.
#[derive(Debug, Error)]
pub enum SyslogEventError {
    /// Caller lacks administrative rights for the device type.
    #[error("not allowed: {username} is not an administrator for device type {device_type}")]
    Unauthorized {
        /// Caller login.
        username: String,
        /// Device type name.
        device_type: String,
    },

    /// One field failed validation.
    #[error("validation failed: {0}")]
    Validation(FieldError),

    /// Several fields failed validation.
    #[error("validation failed: {}", join_fields(.0))]
    ValidationErrors(Vec<FieldError>),

    /// Record belongs to another device type than the registry it was given to.
    #[error("record belongs to device type {record}, registry manages {registry}")]
    DeviceTypeMismatch {
        /// Device type carried by the record.
        record: String,
        /// Device type managed by the registry.
        registry: String,
    },

    /// Logical event id is already held by another record of the device type.
    #[error("syslog event id {event_id} is already used by storage id {existing} in {device_type}")]
    DuplicateEventId {
        /// The conflicting logical event id.
        event_id: i32,
        /// Storage id of the record currently holding it.
        existing: StorageId,
        /// Device type name.
        device_type: String,
    },

    /// Attempted deletion of a system-reserved logical event id.
    #[error("syslog event {event_id} is reserved: ids 0-999 cannot be deleted")]
    ProtectedEvent {
        /// The reserved logical event id.
        event_id: i32,
    },

    /// A record that was never persisted was handed to an index mutation.
    #[error("syslog event {event_id} has no storage id")]
    NotPersisted {
        /// Logical event id of the record.
        event_id: i32,
    },

    /// A delete named a record whose logical id no longer matches the
    /// indexed record it refers to.
    #[error("syslog event {event_id} does not match indexed record {storage_id} (event id {indexed})")]
    StaleRecord {
        /// Logical event id carried by the caller's record.
        event_id: i32,
        /// Storage id of the indexed record.
        storage_id: StorageId,
        /// Logical event id of the indexed record.
        indexed: i32,
    },

    /// A statement exceeded the configured execution bound.
    #[error("statement exceeded timeout of {}s", .timeout.as_secs_f64())]
    StatementTimeout {
        /// The bound that was exceeded.
        timeout: Duration,
    },

    /// `SQLite` database error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// An update addressed a storage id the table does not contain.
    #[error("no syslog event row with storage id {0}")]
    RowNotFound(StorageId),

    /// No pooled connection could be obtained.
    #[error("connection unavailable: {0}")]
    ConnectionUnavailable(#[from] r2d2::Error),

    /// JSON serialization/deserialization error.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),

    /// The `syslog_event` table is missing or has an unrecognised layout.
    #[error("schema error: {0}")]
    Schema(String),

    /// A store policy string could not be parsed.
    #[error("invalid store policy: {0}")]
    InvalidStorePolicy(String),
}

fn join_fields(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Coarse error category, stable across variants.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Permission gate rejected the caller.
    Authorization,
    /// Structurally invalid input, detected before any store access.
    Validation,
    /// Deletion of a reserved event.
    ProtectedResource,
    /// Failure raised by the store layer, timeouts included.
    Persistence,
    /// No pooled connection available.
    ConnectionUnavailable,
}

impl ErrorKind {
    /// Stable lowercase name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Authorization => "authorization",
            Self::Validation => "validation",
            Self::ProtectedResource => "protected_resource",
            Self::Persistence => "persistence",
            Self::ConnectionUnavailable => "connection_unavailable",
        }
    }
}

impl SyslogEventError {
    /// Build a single-field validation error.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation(FieldError::new(field, message))
    }

    /// Collapse a non-empty list of field errors.
    pub fn from_field_errors(mut errors: Vec<FieldError>) -> Self {
        if errors.len() == 1 {
            Self::Validation(errors.remove(0))
        } else {
            Self::ValidationErrors(errors)
        }
    }

    /// Category of this error.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Unauthorized { .. } => ErrorKind::Authorization,
            Self::Validation(_)
            | Self::ValidationErrors(_)
            | Self::DeviceTypeMismatch { .. }
            | Self::DuplicateEventId { .. }
            | Self::NotPersisted { .. }
            | Self::StaleRecord { .. }
            | Self::InvalidStorePolicy(_) => ErrorKind::Validation,
            Self::ProtectedEvent { .. } => ErrorKind::ProtectedResource,
            Self::ConnectionUnavailable(_) => ErrorKind::ConnectionUnavailable,
            Self::StatementTimeout { .. }
            | Self::Sqlite(_)
            | Self::RowNotFound(_)
            | Self::Serde(_)
            | Self::Schema(_) => ErrorKind::Persistence,
        }
    }

    /// Whether this layer would retry the failed operation. It never does.
    pub const fn is_retryable(&self) -> bool {
        false
    }
}

/// Convenience type alias for syslog event results.
pub type Result<T> = std::result::Result<T, SyslogEventError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_display() {
        let err = SyslogEventError::Unauthorized {
            username: "guest".into(),
            device_type: "ROUTER-X".into(),
        };
        assert_eq!(
            err.to_string(),
            "not allowed: guest is not an administrator for device type ROUTER-X"
        );
        assert_eq!(err.kind(), ErrorKind::Authorization);
    }

    #[test]
    fn protected_display() {
        let err = SyslogEventError::ProtectedEvent { event_id: 42 };
        assert_eq!(
            err.to_string(),
            "syslog event 42 is reserved: ids 0-999 cannot be deleted"
        );
        assert_eq!(err.kind().as_str(), "protected_resource");
    }

    #[test]
    fn single_field_error_collapses() {
        let err = SyslogEventError::from_field_errors(vec![FieldError::new(
            "name",
            "cannot be empty",
        )]);
        assert_eq!(err.to_string(), "validation failed: name: cannot be empty");
    }

    #[test]
    fn multiple_field_errors_joined() {
        let err = SyslogEventError::from_field_errors(vec![
            FieldError::new("name", "cannot be empty"),
            FieldError::new("delete_limit", "must be non-negative"),
        ]);
        assert!(matches!(err, SyslogEventError::ValidationErrors(ref v) if v.len() == 2));
        assert_eq!(
            err.to_string(),
            "validation failed: name: cannot be empty; delete_limit: must be non-negative"
        );
    }

    #[test]
    fn timeout_is_persistence() {
        let err = SyslogEventError::StatementTimeout {
            timeout: Duration::from_secs(60),
        };
        assert_eq!(err.to_string(), "statement exceeded timeout of 60s");
        assert_eq!(err.kind(), ErrorKind::Persistence);
        assert!(!err.is_retryable());
    }

    #[test]
    fn from_rusqlite_error() {
        let err: SyslogEventError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, SyslogEventError::Sqlite(_)));
        assert_eq!(err.kind(), ErrorKind::Persistence);
    }

    #[test]
    fn row_not_found_display() {
        let err = SyslogEventError::RowNotFound(StorageId::new(17));
        assert_eq!(err.to_string(), "no syslog event row with storage id 17");
    }
}
