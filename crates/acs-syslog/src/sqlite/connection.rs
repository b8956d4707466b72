//! `SQLite` connection pool with per-lease health reporting.
//!
//! Uses `r2d2` connection pooling with the `r2d2_sqlite` backend. The
//! [`PragmaCustomizer`] runs on each new connection to set WAL mode, foreign
//! keys and the busy timeout.
//!
//! Every persistence call takes a [`ConnectionLease`] and hands it back with
//! [`ConnectionLease::release`], passing the failure (if any) that ended the
//! call. A lease dropped without being released counts as faulty.

use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use acs_settings::DatabaseSettings;
use parking_lot::Mutex;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use tracing::{debug, warn};

use crate::errors::{Result, SyslogEventError};

type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Configuration for the connection pool.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Maximum pool size (default: 8).
    pub pool_size: u32,
    /// Busy timeout in milliseconds (default: 30000).
    pub busy_timeout_ms: u32,
    /// How long `lease` waits for a free connection (default: 5000 ms).
    pub connection_timeout_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            pool_size: 8,
            busy_timeout_ms: 30_000,
            connection_timeout_ms: 5_000,
        }
    }
}

impl From<&DatabaseSettings> for ConnectionConfig {
    fn from(settings: &DatabaseSettings) -> Self {
        Self {
            pool_size: settings.pool_size,
            busy_timeout_ms: settings.busy_timeout_ms,
            connection_timeout_ms: settings.connection_timeout_ms,
        }
    }
}

/// `SQLite` pragma customizer that runs on each new connection.
#[derive(Debug)]
struct PragmaCustomizer {
    busy_timeout_ms: u32,
}

impl r2d2::CustomizeConnection<Connection, rusqlite::Error> for PragmaCustomizer {
    fn on_acquire(&self, conn: &mut Connection) -> std::result::Result<(), rusqlite::Error> {
        conn.execute_batch(&format!(
            "PRAGMA journal_mode = WAL;\
             PRAGMA busy_timeout = {};\
             PRAGMA foreign_keys = ON;\
             PRAGMA synchronous = NORMAL;",
            self.busy_timeout_ms
        ))
    }
}

/// Counters describing how leases were handed back.
#[derive(Debug, Default)]
pub struct PoolHealth {
    leased: AtomicU64,
    healthy_returns: AtomicU64,
    faulty_returns: AtomicU64,
    last_failure: Mutex<Option<String>>,
}

/// Point-in-time copy of [`PoolHealth`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PoolHealthSnapshot {
    /// Leases handed out.
    pub leased: u64,
    /// Leases returned after a successful call.
    pub healthy_returns: u64,
    /// Leases returned after a failed call, or dropped unreleased.
    pub faulty_returns: u64,
    /// Message of the most recent failure.
    pub last_failure: Option<String>,
}

impl PoolHealth {
    fn record_lease(&self) {
        let _ = self.leased.fetch_add(1, Ordering::Relaxed);
    }

    fn record_return(&self, failure: Option<String>) {
        match failure {
            None => {
                let _ = self.healthy_returns.fetch_add(1, Ordering::Relaxed);
            }
            Some(message) => {
                let _ = self.faulty_returns.fetch_add(1, Ordering::Relaxed);
                *self.last_failure.lock() = Some(message);
            }
        }
    }

    /// Copy the current counters.
    pub fn snapshot(&self) -> PoolHealthSnapshot {
        PoolHealthSnapshot {
            leased: self.leased.load(Ordering::Relaxed),
            healthy_returns: self.healthy_returns.load(Ordering::Relaxed),
            faulty_returns: self.faulty_returns.load(Ordering::Relaxed),
            last_failure: self.last_failure.lock().clone(),
        }
    }
}

/// Pool of `SQLite` connections plus its health counters.
#[derive(Clone)]
pub struct ConnectionPool {
    pool: Pool<SqliteConnectionManager>,
    health: Arc<PoolHealth>,
}

impl ConnectionPool {
    /// Create an in-memory pool (for testing).
    ///
    /// Each pooled connection opens its own private database, so tests that
    /// need shared state use `pool_size: 1`.
    pub fn new_in_memory(config: &ConnectionConfig) -> Result<Self> {
        Self::build(SqliteConnectionManager::memory(), config)
    }

    /// Create a file-backed pool.
    pub fn new_file(path: &str, config: &ConnectionConfig) -> Result<Self> {
        Self::build(SqliteConnectionManager::file(path), config)
    }

    fn build(manager: SqliteConnectionManager, config: &ConnectionConfig) -> Result<Self> {
        let pool = Pool::builder()
            .max_size(config.pool_size)
            .connection_timeout(Duration::from_millis(config.connection_timeout_ms))
            .connection_customizer(Box::new(PragmaCustomizer {
                busy_timeout_ms: config.busy_timeout_ms,
            }))
            .build(manager)?;
        Ok(Self {
            pool,
            health: Arc::new(PoolHealth::default()),
        })
    }

    /// Take a dedicated connection.
    ///
    /// Fails with [`SyslogEventError::ConnectionUnavailable`] when no
    /// connection frees up within the configured timeout.
    pub fn lease(&self) -> Result<ConnectionLease> {
        let conn = self.pool.get().map_err(|e| {
            warn!(error = %e, "no pooled connection available");
            SyslogEventError::ConnectionUnavailable(e)
        })?;
        self.health.record_lease();
        Ok(ConnectionLease {
            conn,
            health: Arc::clone(&self.health),
            released: false,
        })
    }

    /// Current health counters.
    pub fn health(&self) -> PoolHealthSnapshot {
        self.health.snapshot()
    }

    /// Configured maximum pool size.
    pub fn max_size(&self) -> u32 {
        self.pool.max_size()
    }
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("max_size", &self.pool.max_size())
            .field("health", &self.health.snapshot())
            .finish()
    }
}

/// A connection taken from the pool for one persistence call.
pub struct ConnectionLease {
    conn: PooledConnection,
    health: Arc<PoolHealth>,
    released: bool,
}

impl ConnectionLease {
    /// Hand the connection back, reporting the failure that ended the call.
    pub fn release(mut self, failure: Option<&SyslogEventError>) {
        self.released = true;
        match failure {
            None => {
                debug!("connection released");
                self.health.record_return(None);
            }
            Some(err) => {
                warn!(error = %err, kind = err.kind().as_str(), "connection released after failure");
                self.health.record_return(Some(err.to_string()));
            }
        }
    }
}

impl std::fmt::Debug for ConnectionLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionLease")
            .field("released", &self.released)
            .finish_non_exhaustive()
    }
}

impl Deref for ConnectionLease {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        &self.conn
    }
}

impl Drop for ConnectionLease {
    fn drop(&mut self) {
        if !self.released {
            warn!("connection dropped without release");
            self.health
                .record_return(Some("connection dropped without release".to_string()));
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
