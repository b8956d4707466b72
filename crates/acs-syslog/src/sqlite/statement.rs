//! Statement execution deadline.
//!
//! `SQLite` has no per-statement timeout, so a progress handler checks a
//! deadline every few virtual machine steps and interrupts the statement once
//! it has passed.

use std::time::{Duration, Instant};

use rusqlite::{Connection, ErrorCode};

use crate::errors::{Result, SyslogEventError};

/// VM instructions between deadline checks.
const PROGRESS_STEPS: i32 = 1_000;

/// Removes the progress handler when dropped, unwinding included.
struct HandlerGuard<'c> {
    conn: &'c Connection,
}

impl Drop for HandlerGuard<'_> {
    fn drop(&mut self) {
        self.conn.progress_handler(PROGRESS_STEPS, None::<fn() -> bool>);
    }
}

/// Run `f` with every statement it executes bounded by `timeout`.
///
/// An interrupted statement surfaces as [`SyslogEventError::StatementTimeout`].
/// The handler is removed before returning, even if `f` panics, so a pooled
/// connection never carries a stale deadline.
pub fn with_statement_timeout<T, F>(conn: &Connection, timeout: Duration, f: F) -> Result<T>
where
    F: FnOnce(&Connection) -> Result<T>,
{
    let deadline = Instant::now() + timeout;
    conn.progress_handler(PROGRESS_STEPS, Some(move || Instant::now() >= deadline));
    let guard = HandlerGuard { conn };
    let result = f(conn);
    drop(guard);

    result.map_err(|err| match err {
        SyslogEventError::Sqlite(ref inner)
            if inner.sqlite_error_code() == Some(ErrorCode::OperationInterrupted) =>
        {
            SyslogEventError::StatementTimeout { timeout }
        }
        other => other,
    })
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    const RUNAWAY: &str = "WITH RECURSIVE c(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM c LIMIT 500000000)
                           SELECT count(*) FROM c";

    #[test]
    fn fast_statement_passes() {
        let conn = Connection::open_in_memory().unwrap();
        let n: i64 = with_statement_timeout(&conn, Duration::from_secs(5), |c| {
            Ok(c.query_row("SELECT 41 + 1", [], |row| row.get(0))?)
        })
        .unwrap();
        assert_eq!(n, 42);
    }

    #[test]
    fn slow_statement_times_out() {
        let conn = Connection::open_in_memory().unwrap();
        let timeout = Duration::from_millis(1);
        let result = with_statement_timeout(&conn, timeout, |c| {
            Ok(c.query_row(RUNAWAY, [], |row| row.get::<_, i64>(0))?)
        });
        assert_matches!(result, Err(SyslogEventError::StatementTimeout { timeout: t }) if t == timeout);
    }

    #[test]
    fn handler_removed_afterwards() {
        let conn = Connection::open_in_memory().unwrap();
        let _ = with_statement_timeout(&conn, Duration::ZERO, |c| {
            Ok(c.query_row(RUNAWAY, [], |row| row.get::<_, i64>(0))?)
        });
        // Without the handler a small query runs to completion.
        let n: i64 = conn
            .query_row(
                "WITH RECURSIVE c(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM c LIMIT 10000)
                 SELECT count(*) FROM c",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(n, 10_000);
    }

    #[test]
    fn handler_removed_when_closure_panics() {
        let conn = Connection::open_in_memory().unwrap();
        let unwound = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            with_statement_timeout::<(), _>(&conn, Duration::ZERO, |_| panic!("closure failed"))
        }));
        assert!(unwound.is_err());

        // The deadline has passed; a leftover handler would interrupt this.
        let n: i64 = conn
            .query_row(
                "WITH RECURSIVE c(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM c LIMIT 10000)
                 SELECT count(*) FROM c",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(n, 10_000);
    }

    #[test]
    fn other_errors_pass_through() {
        let conn = Connection::open_in_memory().unwrap();
        let result: Result<i64> = with_statement_timeout(&conn, Duration::from_secs(5), |c| {
            Ok(c.query_row("SELECT * FROM nope", [], |row| row.get(0))?)
        });
        assert_matches!(result, Err(SyslogEventError::Sqlite(_)));
    }
}
