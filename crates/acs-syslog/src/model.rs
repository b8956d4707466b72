//! Syslog event definitions.
//!
//! A [`SyslogEvent`] says which log lines from devices of one device type are
//! captured, how long they are kept, and whether duplicates are collapsed.
//! Whether a record has reached the store is tracked explicitly by
//! [`StorageState`]; the storage id is assigned once, on first insert.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};

use acs_core::{DeviceType, DeviceTypeId, GroupId, ScriptId, StorageId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{FieldError, Result, SyslogEventError};

/// Logical ids below this value belong to the platform and cannot be deleted.
pub const RESERVED_EVENT_ID_LIMIT: i32 = 1000;

/// Logical id of the synthesized catch-all event.
pub const DEFAULT_EVENT_ID: i32 = 0;

/// Duplicate window forced onto every DUPLICATE policy under the legacy layout.
pub const DUPLICATE_TIMEOUT_MINUTES: u32 = 60;

/// Upper bound for "generate on absence" timeouts, in hours.
pub const MAX_GENERATE_ON_ABSENCE_TIMEOUT_HOURS: u32 = 48;

const MAX_NAME_LEN: usize = 64;
const MAX_DESCRIPTION_LEN: usize = 255;

/// Whether a record has been written to the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageState {
    /// Never persisted; the next persist is an insert.
    Unpersisted,
    /// Persisted under the given storage id; the next persist is an update.
    Persisted(StorageId),
}

impl StorageState {
    /// The storage id, if assigned.
    pub const fn storage_id(self) -> Option<StorageId> {
        match self {
            Self::Unpersisted => None,
            Self::Persisted(id) => Some(id),
        }
    }
}

/// What happens to log lines matching an event.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum StorePolicy {
    /// Store every matching line.
    #[default]
    Keep,
    /// Drop matching lines.
    Discard,
    /// Store the first line, collapse repeats within the window.
    Duplicate {
        /// Collapse window in minutes.
        window_minutes: u32,
    },
}

impl StorePolicy {
    /// DUPLICATE with the standard 60-minute window.
    pub const DUPLICATE: Self = Self::Duplicate {
        window_minutes: DUPLICATE_TIMEOUT_MINUTES,
    };

    /// Value of the legacy `task` column.
    ///
    /// The legacy layout has no room for per-event windows, so every
    /// DUPLICATE policy is written as `DUPLICATE60`.
    pub fn legacy_task(self) -> String {
        match self {
            Self::Duplicate { .. } => format!("DUPLICATE{DUPLICATE_TIMEOUT_MINUTES}"),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for StorePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Keep => f.write_str("KEEP"),
            Self::Discard => f.write_str("DISCARD"),
            Self::Duplicate { window_minutes } => write!(f, "DUPLICATE{window_minutes}"),
        }
    }
}

impl FromStr for StorePolicy {
    type Err = SyslogEventError;

    fn from_str(s: &str) -> Result<Self> {
        let upper = s.trim().to_uppercase();
        match upper.as_str() {
            // STORE is the name older rows use for KEEP
            "KEEP" | "STORE" => Ok(Self::Keep),
            "DISCARD" => Ok(Self::Discard),
            "DUPLICATE" => Ok(Self::DUPLICATE),
            other => other
                .strip_prefix("DUPLICATE")
                .and_then(|n| n.parse::<u32>().ok())
                .map(|window_minutes| Self::Duplicate { window_minutes })
                .ok_or_else(|| SyslogEventError::InvalidStorePolicy(s.to_string())),
        }
    }
}

impl TryFrom<String> for StorePolicy {
    type Error = SyslogEventError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<StorePolicy> for String {
    fn from(policy: StorePolicy) -> Self {
        policy.to_string()
    }
}

/// Opaque matching rule, stored as JSON text.
///
/// The expression language is interpreted elsewhere; this crate only
/// round-trips it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchExpression(Value);

impl MatchExpression {
    /// Wrap a structured expression.
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Borrow the structured value.
    pub fn value(&self) -> &Value {
        &self.0
    }

    /// Text written to the `expression` column.
    pub fn to_storage_text(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.0)?)
    }

    /// Parse the `expression` column.
    ///
    /// Rows written by older tools hold a bare expression string rather than
    /// JSON; those are kept as a JSON string value.
    pub fn from_storage_text(text: &str) -> Self {
        serde_json::from_str(text).map_or_else(|_| Self(Value::String(text.to_string())), Self)
    }
}

impl Default for MatchExpression {
    fn default() -> Self {
        Self(Value::String("*".to_string()))
    }
}

/// A syslog event definition.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyslogEvent {
    storage: StorageState,
    /// Caller-assigned logical id, unique within the device type.
    pub event_id: i32,
    /// Short name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Matching rule.
    pub expression: MatchExpression,
    /// Retention bound for stored lines.
    pub delete_limit: i32,
    /// Owning device type.
    pub device_type: Arc<DeviceType>,
    /// Retention/dedup behaviour.
    pub store_policy: StorePolicy,
    /// Script run on match (reworked layout only).
    pub script: Option<ScriptId>,
    /// Group the event applies to (reworked layout only).
    pub group: Option<GroupId>,
}

impl SyslogEvent {
    /// New, unpersisted definition with empty description and default policy.
    pub fn new(device_type: Arc<DeviceType>, event_id: i32, name: impl Into<String>) -> Self {
        Self {
            storage: StorageState::Unpersisted,
            event_id,
            name: name.into(),
            description: String::new(),
            expression: MatchExpression::default(),
            delete_limit: 0,
            device_type,
            store_policy: StorePolicy::Keep,
            script: None,
            group: None,
        }
    }

    /// Rebuild a record read back from the store.
    pub(crate) fn from_storage(storage_id: StorageId, device_type: Arc<DeviceType>) -> Self {
        let mut event = Self::new(device_type, 0, String::new());
        event.storage = StorageState::Persisted(storage_id);
        event
    }

    /// The synthesized catch-all event held under storage id 0.
    ///
    /// It is never written to the store and belongs to no real device type.
    pub fn system_default() -> Self {
        let mut event = Self::new(system_device_type(), DEFAULT_EVENT_ID, "Default");
        event.storage = StorageState::Persisted(StorageId::new(0));
        event.description = "Default event".to_string();
        event
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the matching rule.
    #[must_use]
    pub fn with_expression(mut self, expression: MatchExpression) -> Self {
        self.expression = expression;
        self
    }

    /// Set the retention bound.
    #[must_use]
    pub fn with_delete_limit(mut self, delete_limit: i32) -> Self {
        self.delete_limit = delete_limit;
        self
    }

    /// Set the store policy.
    #[must_use]
    pub fn with_store_policy(mut self, store_policy: StorePolicy) -> Self {
        self.store_policy = store_policy;
        self
    }

    /// Set the script reference.
    #[must_use]
    pub fn with_script(mut self, script: Option<ScriptId>) -> Self {
        self.script = script;
        self
    }

    /// Set the group reference.
    #[must_use]
    pub fn with_group(mut self, group: Option<GroupId>) -> Self {
        self.group = group;
        self
    }

    /// Persistence state.
    pub fn storage(&self) -> StorageState {
        self.storage
    }

    /// Storage id, if persisted.
    pub fn storage_id(&self) -> Option<StorageId> {
        self.storage.storage_id()
    }

    /// Whether the logical id is in the platform-reserved range.
    pub fn is_reserved(&self) -> bool {
        self.event_id < RESERVED_EVENT_ID_LIMIT
    }

    /// Record the id assigned by the store on first insert.
    ///
    /// A storage id is immutable: calling this on a persisted record leaves
    /// the first id in place.
    pub(crate) fn mark_persisted(&mut self, storage_id: StorageId) {
        if self.storage == StorageState::Unpersisted {
            self.storage = StorageState::Persisted(storage_id);
        }
    }

    /// Check structural rules. Collects every violation.
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if self.event_id < 0 {
            errors.push(FieldError::new("event_id", "must be non-negative"));
        }
        if self.name.trim().is_empty() {
            errors.push(FieldError::new("name", "cannot be empty"));
        }
        if self.name.chars().count() > MAX_NAME_LEN {
            errors.push(FieldError::new(
                "name",
                format!("exceeds {MAX_NAME_LEN} characters"),
            ));
        }
        if self.description.chars().count() > MAX_DESCRIPTION_LEN {
            errors.push(FieldError::new(
                "description",
                format!("exceeds {MAX_DESCRIPTION_LEN} characters"),
            ));
        }
        if self.expression.value().is_null() {
            errors.push(FieldError::new("expression", "is required"));
        }
        if self.delete_limit < 0 {
            errors.push(FieldError::new("delete_limit", "must be non-negative"));
        }
        if let StorePolicy::Duplicate { window_minutes: 0 } = self.store_policy {
            errors.push(FieldError::new(
                "store_policy",
                "duplicate window must be at least one minute",
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(SyslogEventError::from_field_errors(errors))
        }
    }
}

/// Placeholder owner of [`SyslogEvent::system_default`].
///
/// Device type ids are generated from 1, so id 0 never collides.
pub fn system_device_type() -> Arc<DeviceType> {
    static SYSTEM: OnceLock<Arc<DeviceType>> = OnceLock::new();
    Arc::clone(SYSTEM.get_or_init(|| Arc::new(DeviceType::new(DeviceTypeId::new(0), "system"))))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
