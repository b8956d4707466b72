//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`AcsSettings::default()`]
//! 2. If `~/.acs/settings.json` exists, deep-merge its values over defaults
//! 3. Apply `ACS_*` environment overrides
//! 4. Validate the result

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::{AcsSettings, LayoutSetting};

/// Resolve the path to the settings file (`~/.acs/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".acs").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<AcsSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults; invalid JSON or an invalid merged value
/// is an error.
pub fn load_settings_from_path(path: &Path) -> Result<AcsSettings> {
    load_with(path, |name| std::env::var(name).ok())
}

fn load_with(path: &Path, env: impl Fn(&str) -> Option<String>) -> Result<AcsSettings> {
    let defaults = serde_json::to_value(AcsSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let file: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, file)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: AcsSettings = serde_json::from_value(merged)?;
    apply_overrides(&mut settings, env);
    settings.validate()?;
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
///
/// Objects merge per key, arrays and primitives are replaced, and nulls in
/// `source` leave `target` untouched.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = match target_map.remove(&key) {
                    Some(target_val) => deep_merge(target_val, source_val),
                    None => source_val,
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `ACS_*` overrides read through `env`.
///
/// Values that fail to parse or fall out of range are ignored with a warning.
pub fn apply_overrides(settings: &mut AcsSettings, env: impl Fn(&str) -> Option<String>) {
    let read = |name: &str| env(name).filter(|v| !v.is_empty());

    if let Some(v) = read("ACS_DB_PATH") {
        settings.database.path = v;
    }
    if let Some(v) = read("ACS_DB_POOL_SIZE") {
        match parse_range(&v, 1_u32, 256) {
            Some(n) => settings.database.pool_size = n,
            None => warn!(key = "ACS_DB_POOL_SIZE", value = %v, "invalid env var, ignoring"),
        }
    }
    if let Some(v) = read("ACS_DB_CONNECT_TIMEOUT_MS") {
        match parse_range(&v, 1_u64, 600_000) {
            Some(n) => settings.database.connection_timeout_ms = n,
            None => warn!(key = "ACS_DB_CONNECT_TIMEOUT_MS", value = %v, "invalid env var, ignoring"),
        }
    }
    if let Some(v) = read("ACS_STATEMENT_TIMEOUT_SECS") {
        match parse_range(&v, 1_u64, 3_600) {
            Some(n) => settings.database.statement_timeout_secs = n,
            None => warn!(key = "ACS_STATEMENT_TIMEOUT_SECS", value = %v, "invalid env var, ignoring"),
        }
    }
    if let Some(v) = read("ACS_SYSLOG_LAYOUT") {
        match v.parse::<LayoutSetting>() {
            Ok(layout) => settings.syslog.layout = layout,
            Err(_) => warn!(key = "ACS_SYSLOG_LAYOUT", value = %v, "invalid env var, ignoring"),
        }
    }
    if let Some(v) = read("ACS_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = read("ACS_LOG_JSON") {
        match parse_bool(&v) {
            Some(b) => settings.logging.json = b,
            None => warn!(key = "ACS_LOG_JSON", value = %v, "invalid env var, ignoring"),
        }
    }
}

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a number and keep it only when it lies in `min..=max`.
pub fn parse_range<T>(val: &str, min: T, max: T) -> Option<T>
where
    T: std::str::FromStr + PartialOrd,
{
    let n: T = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::errors::SettingsError;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn merge_nested_override() {
        let target = serde_json::json!({"database": {"poolSize": 8, "path": "/a"}});
        let source = serde_json::json!({"database": {"poolSize": 2}});
        let merged = deep_merge(target, source);
        assert_eq!(merged["database"]["poolSize"], 2);
        assert_eq!(merged["database"]["path"], "/a");
    }

    #[test]
    fn merge_null_preserves_target() {
        let merged = deep_merge(serde_json::json!({"a": 1}), serde_json::json!({"a": null}));
        assert_eq!(merged["a"], 1);
    }

    #[test]
    fn merge_array_replace() {
        let merged = deep_merge(
            serde_json::json!({"items": [1, 2, 3]}),
            serde_json::json!({"items": [4]}),
        );
        assert_eq!(merged["items"], serde_json::json!([4]));
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_with(&dir.path().join("nope.json"), env_of(&[])).unwrap();
        assert_eq!(settings, AcsSettings::default());
    }

    #[test]
    fn file_values_merge_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"database": {"path": "/var/lib/acs/acs.db"}, "syslog": {"layout": "reworked"}}"#,
        )
        .unwrap();

        let settings = load_with(&path, env_of(&[])).unwrap();
        assert_eq!(settings.database.path, "/var/lib/acs/acs.db");
        assert_eq!(settings.database.pool_size, 8);
        assert_eq!(settings.syslog.layout, LayoutSetting::Reworked);
    }

    #[test]
    fn invalid_json_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            load_with(&path, env_of(&[])),
            Err(SettingsError::Json(_))
        ));
    }

    #[test]
    fn invalid_merged_value_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"database": {"poolSize": 0}}"#).unwrap();
        assert!(matches!(
            load_with(&path, env_of(&[])),
            Err(SettingsError::InvalidValue(_))
        ));
    }

    #[test]
    fn env_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"syslog": {"layout": "reworked"}}"#).unwrap();

        let env = env_of(&[
            ("ACS_SYSLOG_LAYOUT", "legacy"),
            ("ACS_DB_POOL_SIZE", "4"),
            ("ACS_STATEMENT_TIMEOUT_SECS", "30"),
            ("ACS_LOG_JSON", "yes"),
            ("ACS_LOG_LEVEL", "debug"),
        ]);
        let settings = load_with(&path, env).unwrap();
        assert_eq!(settings.syslog.layout, LayoutSetting::Legacy);
        assert_eq!(settings.database.pool_size, 4);
        assert_eq!(settings.database.statement_timeout_secs, 30);
        assert!(settings.logging.json);
        assert_eq!(settings.logging.level, "debug");
    }

    #[test]
    fn invalid_env_values_ignored() {
        let mut settings = AcsSettings::default();
        apply_overrides(
            &mut settings,
            env_of(&[
                ("ACS_DB_POOL_SIZE", "0"),
                ("ACS_SYSLOG_LAYOUT", "v9"),
                ("ACS_LOG_JSON", "maybe"),
                ("ACS_DB_PATH", ""),
            ]),
        );
        assert_eq!(settings, AcsSettings::default());
    }

    #[test]
    fn parse_helpers() {
        assert_eq!(parse_bool("ON"), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("2"), None);
        assert_eq!(parse_range("10", 1_u32, 20), Some(10));
        assert_eq!(parse_range("30", 1_u32, 20), None);
        assert_eq!(parse_range("x", 1_u64, 20), None);
    }
}
