//! # acs-syslog
//!
//! Syslog event definitions for the ACS platform.
//!
//! A syslog event says which log lines from devices of one device type are
//! captured and how they are retained. This crate keeps the definitions in a
//! relational table and mirrors them in memory:
//!
//! - **Model**: [`SyslogEvent`] with explicit [`StorageState`] and structural validation
//! - **Layout shim**: [`SchemaCompatibility`] picks the legacy or reworked column layout once
//! - **Store**: [`SyslogEventStore`] leases a pooled connection per call and bounds each statement
//! - **Index**: [`EventIndex`], one shared cache keyed by storage id and by (device type, logical id)
//! - **Registry**: [`SyslogEventRegistry`], the per-device-type entry point enforcing permissions
//! - **Notifications**: [`ChangeNotifier`] with a `tokio` broadcast implementation

#![deny(unsafe_code)]

pub mod errors;
pub mod index;
pub mod layout;
pub mod model;
pub mod notify;
pub mod registry;
pub mod sqlite;
pub mod store;

pub use errors::{ErrorKind, FieldError, Result, SyslogEventError};
pub use index::EventIndex;
pub use layout::{ColumnLayout, SchemaCompatibility, SchemaLayout};
pub use model::{
    DEFAULT_EVENT_ID, DUPLICATE_TIMEOUT_MINUTES, MAX_GENERATE_ON_ABSENCE_TIMEOUT_HOURS,
    MatchExpression, RESERVED_EVENT_ID_LIMIT, StorageState, StorePolicy, SyslogEvent,
};
pub use notify::{
    BroadcastNotifier, ChangeKind, ChangeNotifier, RecordingNotifier, SyslogEventChange,
};
pub use registry::SyslogEventRegistry;
pub use sqlite::{ConnectionConfig, ConnectionPool};
pub use store::{EventPersistence, PersistOutcome, SyslogEventStore};
