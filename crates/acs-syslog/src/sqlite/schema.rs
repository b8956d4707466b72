//! `syslog_event` table bootstrap.
//!
//! Creates the table in either layout for fresh databases and tests. Moving
//! an existing database from one layout to the other is not handled here.

use rusqlite::Connection;
use tracing::info;

use crate::errors::Result;
use crate::layout::SchemaLayout;

/// Name of the syslog event table.
pub const TABLE: &str = "syslog_event";

const REWORKED_DDL: &str = "
CREATE TABLE IF NOT EXISTS syslog_event (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    syslog_event_id   INTEGER NOT NULL,
    syslog_event_name TEXT    NOT NULL,
    description       TEXT,
    expression        TEXT    NOT NULL,
    delete_limit      INTEGER NOT NULL DEFAULT 0,
    unit_type_id      INTEGER NOT NULL,
    store_policy      TEXT    NOT NULL DEFAULT 'KEEP',
    filestore_id      INTEGER,
    group_id          INTEGER,
    UNIQUE (unit_type_id, syslog_event_id)
);
CREATE INDEX IF NOT EXISTS idx_syslog_event_unit_type ON syslog_event(unit_type_id);
";

const LEGACY_DDL: &str = "
CREATE TABLE IF NOT EXISTS syslog_event (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    syslog_event_id   INTEGER NOT NULL,
    syslog_event_name TEXT    NOT NULL,
    description       TEXT,
    expression        TEXT    NOT NULL,
    delete_limit      INTEGER NOT NULL DEFAULT 0,
    unit_type_name    TEXT    NOT NULL,
    task              TEXT    NOT NULL DEFAULT 'KEEP',
    UNIQUE (unit_type_name, syslog_event_id)
);
CREATE INDEX IF NOT EXISTS idx_syslog_event_unit_type ON syslog_event(unit_type_name);
";

/// Create the table (and its device type index) if it does not exist.
pub fn create(conn: &Connection, layout: SchemaLayout) -> Result<()> {
    let ddl = match layout {
        SchemaLayout::Legacy => LEGACY_DDL,
        SchemaLayout::Reworked => REWORKED_DDL,
    };
    conn.execute_batch(ddl)?;
    info!(%layout, table = TABLE, "syslog event table ready");
    Ok(())
}

/// Column names of `table`, empty when the table does not exist.
pub fn table_columns(conn: &Connection, table: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1)")?;
    let columns = stmt
        .query_map([table], |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;
    Ok(columns)
}
