//! # syslog-events
//!
//! Administers syslog event definitions in the configured ACS database.
//! Every command runs as an administrator and prints JSON to stdout.

#![deny(unsafe_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use acs_core::logging::{init_json_subscriber, init_subscriber};
use acs_core::{CallerContext, DeviceType, DeviceTypeId, GroupId, Permissions, ScriptId};
use acs_settings::{AcsSettings, load_settings, load_settings_from_path};
use acs_syslog::sqlite::schema;
use acs_syslog::{
    ChangeNotifier, ConnectionConfig, ConnectionPool, MatchExpression, RecordingNotifier,
    SchemaCompatibility, SchemaLayout, StorePolicy, SyslogEvent, SyslogEventRegistry,
    SyslogEventStore,
};
use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

/// Syslog event definition administration.
#[derive(Parser, Debug)]
#[command(name = "syslog-events", about = "Manage syslog event definitions")]
struct Cli {
    /// Settings file (defaults to `~/.acs/settings.json`).
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Database path (overrides settings).
    #[arg(long, global = true)]
    db_path: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the syslog event table.
    Init {
        /// Column layout to create.
        #[arg(long, value_enum, default_value_t = LayoutArg::Reworked)]
        layout: LayoutArg,
    },
    /// List the definitions of a device type.
    List(DeviceTypeArgs),
    /// Insert or update a definition read from a JSON file.
    Put {
        #[command(flatten)]
        device_type: DeviceTypeArgs,
        /// JSON file holding the definition.
        #[arg(long)]
        file: PathBuf,
    },
    /// Delete a definition by logical event id.
    Delete {
        #[command(flatten)]
        device_type: DeviceTypeArgs,
        /// Logical event id.
        #[arg(long)]
        event_id: i32,
    },
}

#[derive(Args, Debug)]
struct DeviceTypeArgs {
    /// Device type row id.
    #[arg(long)]
    device_type_id: i64,
    /// Device type name.
    #[arg(long)]
    device_type_name: String,
}

impl DeviceTypeArgs {
    fn device_type(&self) -> Arc<DeviceType> {
        Arc::new(DeviceType::new(
            DeviceTypeId::new(self.device_type_id),
            self.device_type_name.clone(),
        ))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LayoutArg {
    Legacy,
    Reworked,
}

impl From<LayoutArg> for SchemaLayout {
    fn from(arg: LayoutArg) -> Self {
        match arg {
            LayoutArg::Legacy => Self::Legacy,
            LayoutArg::Reworked => Self::Reworked,
        }
    }
}

/// Definition as written in a `put` file.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct EventInput {
    event_id: i32,
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    expression: Option<Value>,
    #[serde(default)]
    delete_limit: i32,
    #[serde(default)]
    store_policy: StorePolicy,
    #[serde(default)]
    script_id: Option<i64>,
    #[serde(default)]
    group_id: Option<i64>,
}

impl EventInput {
    /// Overlay the input on `base`, keeping its storage state.
    fn apply(self, mut base: SyslogEvent) -> SyslogEvent {
        base.event_id = self.event_id;
        base.name = self.name;
        base.description = self.description;
        if let Some(expression) = self.expression {
            base.expression = MatchExpression::new(expression);
        }
        base.delete_limit = self.delete_limit;
        base.store_policy = self.store_policy;
        base.script = self.script_id.map(ScriptId::new);
        base.group = self.group_id.map(GroupId::new);
        base
    }
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    Ok(())
}

fn caller() -> CallerContext {
    let username = std::env::var("USER").unwrap_or_else(|_| "syslog-events".to_string());
    CallerContext::with_permissions(username, Permissions::Admin)
}

fn open_pool(settings: &AcsSettings) -> Result<ConnectionPool> {
    let path = Path::new(&settings.database.path);
    ensure_parent_dir(path)?;
    ConnectionPool::new_file(&settings.database.path, &ConnectionConfig::from(&settings.database))
        .with_context(|| format!("Failed to open database: {}", path.display()))
}

fn open_registry(
    pool: &ConnectionPool,
    settings: &AcsSettings,
    device_type: Arc<DeviceType>,
    notifier: Arc<RecordingNotifier>,
) -> Result<SyslogEventRegistry<SyslogEventStore>> {
    let lease = pool.lease()?;
    let compat = SchemaCompatibility::resolve(settings.syslog.layout, &lease);
    lease.release(compat.as_ref().err());
    let compat = compat.context("Failed to determine syslog event layout")?;

    let store = SyslogEventStore::new(pool.clone(), compat).with_statement_timeout(
        std::time::Duration::from_secs(settings.database.statement_timeout_secs),
    );
    let registry = SyslogEventRegistry::new(
        device_type,
        Arc::new(acs_syslog::EventIndex::new()),
        Arc::new(store),
    )
    .with_notifier(notifier as Arc<dyn ChangeNotifier>);
    let _ = registry.load().context("Failed to load syslog events")?;
    Ok(registry)
}

fn run(command: Command, pool: &ConnectionPool, settings: &AcsSettings) -> Result<Value> {
    let notifier = Arc::new(RecordingNotifier::new());
    match command {
        Command::Init { layout } => {
            let layout = SchemaLayout::from(layout);
            let lease = pool.lease()?;
            let created = schema::create(&lease, layout);
            lease.release(created.as_ref().err());
            created.context("Failed to create syslog event table")?;
            Ok(json!({ "layout": layout.to_string() }))
        }
        Command::List(args) => {
            let registry = open_registry(pool, settings, args.device_type(), notifier)?;
            Ok(serde_json::to_value(registry.list_all())?)
        }
        Command::Put { device_type, file } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let input: EventInput = serde_json::from_str(&content)
                .with_context(|| format!("Invalid event definition in {}", file.display()))?;
            let registry =
                open_registry(pool, settings, device_type.device_type(), Arc::clone(&notifier))?;
            let base = registry.get_by_event_id(input.event_id).map_or_else(
                || SyslogEvent::new(Arc::clone(registry.device_type()), input.event_id, ""),
                |existing| (*existing).clone(),
            );
            let _ = registry.add_or_change(input.apply(base), &caller())?;
            Ok(serde_json::to_value(notifier.changes())?)
        }
        Command::Delete {
            device_type,
            event_id,
        } => {
            let registry =
                open_registry(pool, settings, device_type.device_type(), Arc::clone(&notifier))?;
            let Some(existing) = registry.get_by_event_id(event_id) else {
                bail!(
                    "No syslog event {event_id} for device type {}",
                    device_type.device_type_name
                );
            };
            registry.delete(&existing, &caller())?;
            Ok(serde_json::to_value(notifier.changes())?)
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = match &cli.settings {
        Some(path) => load_settings_from_path(path),
        None => load_settings(),
    }
    .context("Failed to load settings")?;
    if let Some(path) = cli.db_path {
        settings.database.path = path;
    }

    if settings.logging.json {
        init_json_subscriber(&settings.logging.level);
    } else {
        init_subscriber(&settings.logging.level);
    }
    info!(db_path = %settings.database.path, "syslog-events starting");

    let pool = open_pool(&settings)?;
    let output = run(cli.command, &pool, &settings)?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
