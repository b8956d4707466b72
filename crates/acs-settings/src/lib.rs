//! # acs-settings
//!
//! Configuration for ACS services, loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`AcsSettings::default()`]
//! 2. **Settings file**: `~/.acs/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `ACS_*` overrides (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! let settings = acs_settings::load_settings().unwrap_or_default();
//! println!("database: {}", settings.database.path);
//! ```

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::{AcsSettings, DatabaseSettings, LayoutSetting, LoggingSettings, SyslogSettings};
