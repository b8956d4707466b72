//! Column layout of the `syslog_event` table.
//!
//! Two physical layouts exist in the field. The reworked layout references the
//! device type by id and carries the store policy, script and group as
//! separate columns. The legacy layout references the device type by name and
//! folds the policy into a single `task` column.
//!
//! [`SchemaCompatibility`] decides once which layout the connected database
//! uses and hands out the matching [`ColumnLayout`]. Persistence code never
//! branches on the layout itself.

use std::fmt;

use acs_core::{DeviceType, GroupId, ScriptId, StorageId};
use acs_settings::LayoutSetting;
use rusqlite::Connection;
use rusqlite::types::Value;
use tracing::info;

use crate::errors::{Result, SyslogEventError};
use crate::model::{MatchExpression, SyslogEvent};
use crate::sqlite::schema::{self, TABLE};

/// Physical layout of the `syslog_event` table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SchemaLayout {
    /// Flat layout: device type name and `task` column.
    Legacy,
    /// Normalized layout: device type id, policy, script and group columns.
    Reworked,
}

impl fmt::Display for SchemaLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Legacy => "legacy",
            Self::Reworked => "reworked",
        })
    }
}

/// A named value bound into a write statement.
#[derive(Clone, Debug, PartialEq)]
pub struct Column {
    /// Column name.
    pub name: &'static str,
    /// Bound value.
    pub value: Value,
}

impl Column {
    fn new(name: &'static str, value: impl Into<Value>) -> Self {
        Self {
            name,
            value: value.into(),
        }
    }
}

/// Raw row read back from either layout.
///
/// Each layout's select list aliases its columns to these names, so one
/// mapper serves both.
#[derive(Clone, Debug)]
pub struct EventRow {
    /// Primary key.
    pub id: i64,
    /// Logical event id.
    pub event_id: i32,
    /// Name.
    pub name: String,
    /// Description (nullable in the table).
    pub description: Option<String>,
    /// Expression text.
    pub expression: String,
    /// Retention bound.
    pub delete_limit: i32,
    /// Policy text (`store_policy` or legacy `task`).
    pub policy: String,
    /// Script id (always `NULL` under the legacy layout).
    pub script_id: Option<i64>,
    /// Group id (always `NULL` under the legacy layout).
    pub group_id: Option<i64>,
}

impl EventRow {
    /// Map a row produced by [`ColumnLayout::select_list`].
    pub fn map(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            event_id: row.get("syslog_event_id")?,
            name: row.get("syslog_event_name")?,
            description: row.get("description")?,
            expression: row.get("expression")?,
            delete_limit: row.get("delete_limit")?,
            policy: row.get("policy")?,
            script_id: row.get("script_id")?,
            group_id: row.get("group_id")?,
        })
    }

    /// Build the domain record owned by `device_type`.
    pub fn into_event(self, device_type: std::sync::Arc<DeviceType>) -> Result<SyslogEvent> {
        let mut event = SyslogEvent::from_storage(StorageId::new(self.id), device_type);
        event.event_id = self.event_id;
        event.name = self.name;
        event.description = self.description.unwrap_or_default();
        event.expression = MatchExpression::from_storage_text(&self.expression);
        event.delete_limit = self.delete_limit;
        event.store_policy = self.policy.parse()?;
        event.script = self.script_id.map(ScriptId::new);
        event.group = self.group_id.map(GroupId::new);
        Ok(event)
    }
}

/// Column strategy for one physical layout.
pub trait ColumnLayout: Send + Sync {
    /// Which layout this strategy writes.
    fn layout(&self) -> SchemaLayout;

    /// Columns written by insert and update, in bind order.
    fn write_columns(&self, event: &SyslogEvent, device_type: &DeviceType) -> Result<Vec<Column>>;

    /// Column and value selecting the rows of one device type.
    fn device_type_filter(&self, device_type: &DeviceType) -> Column;

    /// Select list aliased to the names [`EventRow::map`] reads.
    fn select_list(&self) -> &'static str;
}

fn common_columns(event: &SyslogEvent) -> Result<Vec<Column>> {
    Ok(vec![
        Column::new("syslog_event_id", event.event_id),
        Column::new("syslog_event_name", event.name.clone()),
        Column::new("description", event.description.clone()),
        Column::new("expression", event.expression.to_storage_text()?),
        Column::new("delete_limit", event.delete_limit),
    ])
}

fn optional_id(id: Option<i64>) -> Value {
    id.map_or(Value::Null, Value::Integer)
}

/// Flat layout with name-based device type and `task` column.
#[derive(Debug)]
pub struct LegacyColumns;

impl ColumnLayout for LegacyColumns {
    fn layout(&self) -> SchemaLayout {
        SchemaLayout::Legacy
    }

    fn write_columns(&self, event: &SyslogEvent, device_type: &DeviceType) -> Result<Vec<Column>> {
        let mut columns = common_columns(event)?;
        columns.push(Column::new("unit_type_name", device_type.name().to_string()));
        columns.push(Column::new("task", event.store_policy.legacy_task()));
        Ok(columns)
    }

    fn device_type_filter(&self, device_type: &DeviceType) -> Column {
        Column::new("unit_type_name", device_type.name().to_string())
    }

    fn select_list(&self) -> &'static str {
        "id, syslog_event_id, syslog_event_name, description, expression, delete_limit, \
         task AS policy, NULL AS script_id, NULL AS group_id"
    }
}

/// Normalized layout with id-based foreign keys.
#[derive(Debug)]
pub struct ReworkedColumns;

impl ColumnLayout for ReworkedColumns {
    fn layout(&self) -> SchemaLayout {
        SchemaLayout::Reworked
    }

    fn write_columns(&self, event: &SyslogEvent, device_type: &DeviceType) -> Result<Vec<Column>> {
        let mut columns = common_columns(event)?;
        columns.push(Column::new("unit_type_id", device_type.id().get()));
        columns.push(Column::new("store_policy", event.store_policy.to_string()));
        columns.push(Column::new(
            "filestore_id",
            optional_id(event.script.map(ScriptId::get)),
        ));
        columns.push(Column::new(
            "group_id",
            optional_id(event.group.map(GroupId::get)),
        ));
        Ok(columns)
    }

    fn device_type_filter(&self, device_type: &DeviceType) -> Column {
        Column::new("unit_type_id", device_type.id().get())
    }

    fn select_list(&self) -> &'static str {
        "id, syslog_event_id, syslog_event_name, description, expression, delete_limit, \
         store_policy AS policy, filestore_id AS script_id, group_id"
    }
}

static LEGACY: LegacyColumns = LegacyColumns;
static REWORKED: ReworkedColumns = ReworkedColumns;

/// Which layout the connected database uses. Decided once, never changes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SchemaCompatibility {
    layout: SchemaLayout,
}

impl SchemaCompatibility {
    /// Use a fixed layout without inspecting the database.
    pub const fn fixed(layout: SchemaLayout) -> Self {
        Self { layout }
    }

    /// Inspect the `syslog_event` table and pick its layout.
    ///
    /// A `unit_type_id` column means reworked; a `unit_type_name` column
    /// means legacy.
    pub fn detect(conn: &Connection) -> Result<Self> {
        let columns = schema::table_columns(conn, TABLE)?;
        if columns.is_empty() {
            return Err(SyslogEventError::Schema(format!("table {TABLE} not found")));
        }
        let has = |name: &str| columns.iter().any(|c| c == name);
        let layout = if has("unit_type_id") {
            SchemaLayout::Reworked
        } else if has("unit_type_name") {
            SchemaLayout::Legacy
        } else {
            return Err(SyslogEventError::Schema(format!(
                "table {TABLE} has neither unit_type_id nor unit_type_name"
            )));
        };
        Ok(Self { layout })
    }

    /// Apply the configured layout selection.
    pub fn resolve(setting: LayoutSetting, conn: &Connection) -> Result<Self> {
        let compat = match setting {
            LayoutSetting::Auto => Self::detect(conn)?,
            LayoutSetting::Legacy => Self::fixed(SchemaLayout::Legacy),
            LayoutSetting::Reworked => Self::fixed(SchemaLayout::Reworked),
        };
        info!(layout = %compat.layout, %setting, "syslog event layout selected");
        Ok(compat)
    }

    /// Whether the reworked layout is available.
    pub const fn supports_rework(&self) -> bool {
        matches!(self.layout, SchemaLayout::Reworked)
    }

    /// The selected layout.
    pub const fn layout(&self) -> SchemaLayout {
        self.layout
    }

    /// Column strategy for the selected layout.
    pub fn columns(&self) -> &'static dyn ColumnLayout {
        match self.layout {
            SchemaLayout::Legacy => &LEGACY,
            SchemaLayout::Reworked => &REWORKED,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
