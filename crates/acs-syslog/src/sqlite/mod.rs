//! `SQLite` backend plumbing for the syslog event store.
//!
//! - **[`connection`]**: `r2d2` pool whose leases report healthy or faulty
//!   returns, with pragmas applied to every new connection.
//! - **[`schema`]**: table bootstrap for either layout and column inspection.
//! - **[`statement`]**: per-statement execution deadline.

pub mod connection;
pub mod schema;
pub mod statement;

pub use connection::{
    ConnectionConfig, ConnectionLease, ConnectionPool, PoolHealth, PoolHealthSnapshot,
};
pub use statement::with_statement_timeout;
