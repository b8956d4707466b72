//! Settings type definitions.
//!
//! All types use camelCase field names in JSON and `#[serde(default)]`, so a
//! settings file only needs the keys it overrides.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings type.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AcsSettings {
    /// Relational store connection settings.
    pub database: DatabaseSettings,
    /// Syslog event subsystem settings.
    pub syslog: SyslogSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

impl AcsSettings {
    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.database.path.trim().is_empty() {
            return Err(SettingsError::InvalidValue(
                "database.path must not be empty".into(),
            ));
        }
        if self.database.pool_size == 0 {
            return Err(SettingsError::InvalidValue(
                "database.poolSize must be at least 1".into(),
            ));
        }
        if self.database.statement_timeout_secs == 0 {
            return Err(SettingsError::InvalidValue(
                "database.statementTimeoutSecs must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Connection pool and statement settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DatabaseSettings {
    /// Path of the `SQLite` database file.
    pub path: String,
    /// Maximum number of pooled connections.
    pub pool_size: u32,
    /// `SQLite` busy timeout in milliseconds.
    pub busy_timeout_ms: u32,
    /// How long to wait for a free pooled connection, in milliseconds.
    pub connection_timeout_ms: u64,
    /// Upper bound on a single statement's execution time, in seconds.
    pub statement_timeout_secs: u64,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
        Self {
            path: format!("{home}/.acs/database/acs.db"),
            pool_size: 8,
            busy_timeout_ms: 30_000,
            connection_timeout_ms: 5_000,
            statement_timeout_secs: 60,
        }
    }
}

/// Which physical column layout the `syslog_event` table uses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutSetting {
    /// Detect from the connected database at startup.
    #[default]
    Auto,
    /// Force the flat name/task layout.
    Legacy,
    /// Force the normalized foreign-key layout.
    Reworked,
}

impl fmt::Display for LayoutSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Auto => "auto",
            Self::Legacy => "legacy",
            Self::Reworked => "reworked",
        })
    }
}

impl FromStr for LayoutSetting {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "legacy" => Ok(Self::Legacy),
            "reworked" => Ok(Self::Reworked),
            other => Err(SettingsError::InvalidValue(format!(
                "unknown syslog layout '{other}'"
            ))),
        }
    }
}

/// Syslog event subsystem settings.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyslogSettings {
    /// Column layout selection.
    pub layout: LayoutSetting,
}

/// Logging configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Minimum level (`RUST_LOG` still wins when set).
    pub level: String,
    /// Emit JSON lines instead of compact text.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_fills_defaults() {
        let settings: AcsSettings =
            serde_json::from_str(r#"{"database": {"poolSize": 2}}"#).unwrap();
        assert_eq!(settings.database.pool_size, 2);
        assert_eq!(settings.database.statement_timeout_secs, 60);
        assert_eq!(settings.logging, LoggingSettings::default());
    }

    #[test]
    fn layout_serde_lowercase() {
        let settings: AcsSettings =
            serde_json::from_str(r#"{"syslog": {"layout": "legacy"}}"#).unwrap();
        assert_eq!(settings.syslog.layout, LayoutSetting::Legacy);
        let json = serde_json::to_value(&settings).unwrap();
        assert_eq!(json["syslog"]["layout"], "legacy");
    }

    #[test]
    fn layout_from_str() {
        assert_eq!("Reworked".parse::<LayoutSetting>().unwrap(), LayoutSetting::Reworked);
        assert_eq!(" auto ".parse::<LayoutSetting>().unwrap(), LayoutSetting::Auto);
        assert!("v2".parse::<LayoutSetting>().is_err());
    }

    #[test]
    fn validate_rejects_zero_pool() {
        let mut settings = AcsSettings::default();
        settings.database.pool_size = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_statement_timeout() {
        let mut settings = AcsSettings::default();
        settings.database.statement_timeout_secs = 0;
        assert!(settings.validate().is_err());
    }
}
