//! Persistence of syslog event definitions.
//!
//! [`SyslogEventStore`] is the `SQLite` implementation of [`EventPersistence`].
//! Each call leases its own connection, runs under the statement timeout, and
//! releases the connection with the call's failure (if any) before returning.
//! Column sets come from the [`ColumnLayout`](crate::layout::ColumnLayout)
//! picked by [`SchemaCompatibility`]; nothing here branches on the layout.

use std::sync::Arc;
use std::time::Duration;

use acs_core::{DeviceType, StorageId};
use rusqlite::{Connection, params_from_iter};
use tracing::{debug, info};

use crate::errors::{Result, SyslogEventError};
use crate::layout::{EventRow, SchemaCompatibility};
use crate::model::SyslogEvent;
use crate::sqlite::connection::ConnectionPool;
use crate::sqlite::schema::TABLE;
use crate::sqlite::statement::with_statement_timeout;

/// Default bound on a single statement.
pub const DEFAULT_STATEMENT_TIMEOUT: Duration = Duration::from_secs(60);

/// Result of a successful persist.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PersistOutcome {
    /// Storage id of the row (new on insert, unchanged on update).
    pub storage_id: StorageId,
    /// Whether a row was inserted rather than updated.
    pub inserted: bool,
}

/// Storage seam used by the registry.
pub trait EventPersistence: Send + Sync {
    /// Insert the record if it has no storage id, update it otherwise.
    fn persist(&self, event: &SyslogEvent, device_type: &DeviceType) -> Result<PersistOutcome>;

    /// Delete the row matching the record's logical id and device type.
    /// Returns the number of rows removed.
    fn remove(&self, event: &SyslogEvent, device_type: &DeviceType) -> Result<usize>;

    /// Read every row belonging to a device type.
    fn load(&self, device_type: &Arc<DeviceType>) -> Result<Vec<SyslogEvent>>;
}

/// `SQLite`-backed syslog event store.
#[derive(Debug)]
pub struct SyslogEventStore {
    pool: ConnectionPool,
    compat: SchemaCompatibility,
    statement_timeout: Duration,
}

impl SyslogEventStore {
    /// Create a store with the default 60 second statement timeout.
    pub fn new(pool: ConnectionPool, compat: SchemaCompatibility) -> Self {
        Self {
            pool,
            compat,
            statement_timeout: DEFAULT_STATEMENT_TIMEOUT,
        }
    }

    /// Override the statement timeout.
    #[must_use]
    pub fn with_statement_timeout(mut self, timeout: Duration) -> Self {
        self.statement_timeout = timeout;
        self
    }

    /// Layout in use.
    pub fn compatibility(&self) -> &SchemaCompatibility {
        &self.compat
    }

    /// Underlying pool.
    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Lease a connection, run `f` under the timeout, release with the outcome.
    fn run<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let lease = self.pool.lease()?;
        let result = with_statement_timeout(&lease, self.statement_timeout, f);
        lease.release(result.as_ref().err());
        result
    }
}

fn insert_sql(names: &[&str]) -> String {
    let placeholders: Vec<String> = (1..=names.len()).map(|i| format!("?{i}")).collect();
    format!(
        "INSERT INTO {TABLE} ({}) VALUES ({})",
        names.join(", "),
        placeholders.join(", ")
    )
}

fn update_sql(names: &[&str]) -> String {
    let assignments: Vec<String> = names
        .iter()
        .enumerate()
        .map(|(i, name)| format!("{name} = ?{}", i + 1))
        .collect();
    format!(
        "UPDATE {TABLE} SET {} WHERE id = ?{}",
        assignments.join(", "),
        names.len() + 1
    )
}

impl EventPersistence for SyslogEventStore {
    fn persist(&self, event: &SyslogEvent, device_type: &DeviceType) -> Result<PersistOutcome> {
        let columns = self.compat.columns().write_columns(event, device_type)?;
        let names: Vec<&str> = columns.iter().map(|c| c.name).collect();
        let mut values: Vec<_> = columns.into_iter().map(|c| c.value).collect();

        let outcome = self.run(|conn| match event.storage_id() {
            None => {
                let _ = conn.execute(&insert_sql(&names), params_from_iter(values.iter()))?;
                Ok(PersistOutcome {
                    storage_id: StorageId::new(conn.last_insert_rowid()),
                    inserted: true,
                })
            }
            Some(storage_id) => {
                values.push(storage_id.get().into());
                let changed = conn.execute(&update_sql(&names), params_from_iter(values.iter()))?;
                if changed == 0 {
                    return Err(SyslogEventError::RowNotFound(storage_id));
                }
                Ok(PersistOutcome {
                    storage_id,
                    inserted: false,
                })
            }
        })?;

        info!(
            event_id = event.event_id,
            storage_id = %outcome.storage_id,
            device_type = device_type.name(),
            layout = %self.compat.layout(),
            "syslog event {}",
            if outcome.inserted { "inserted" } else { "updated" }
        );
        Ok(outcome)
    }

    fn remove(&self, event: &SyslogEvent, device_type: &DeviceType) -> Result<usize> {
        let filter = self.compat.columns().device_type_filter(device_type);
        let sql = format!(
            "DELETE FROM {TABLE} WHERE syslog_event_id = ?1 AND {} = ?2",
            filter.name
        );
        let removed = self.run(|conn| {
            Ok(conn.execute(&sql, rusqlite::params![event.event_id, filter.value])?)
        })?;

        info!(
            event_id = event.event_id,
            device_type = device_type.name(),
            removed,
            "syslog event deleted"
        );
        Ok(removed)
    }

    fn load(&self, device_type: &Arc<DeviceType>) -> Result<Vec<SyslogEvent>> {
        let columns = self.compat.columns();
        let filter = columns.device_type_filter(device_type);
        let sql = format!(
            "SELECT {} FROM {TABLE} WHERE {} = ?1 ORDER BY syslog_event_id",
            columns.select_list(),
            filter.name
        );
        let rows = self.run(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([&filter.value], EventRow::map)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;

        let events = rows
            .into_iter()
            .map(|row| row.into_event(Arc::clone(device_type)))
            .collect::<Result<Vec<_>>>()?;
        debug!(
            device_type = device_type.name(),
            count = events.len(),
            "syslog events loaded"
        );
        Ok(events)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
