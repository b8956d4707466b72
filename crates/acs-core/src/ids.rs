//! Integer ID newtypes for type safety.
//!
//! Rows in the ACS database are keyed by store-generated integers. Each
//! entity gets its own newtype so a device type id can never be passed
//! where a storage id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! int_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wrap a raw row identifier.
            #[must_use]
            pub const fn new(raw: i64) -> Self {
                Self(raw)
            }

            /// Return the raw row identifier.
            #[must_use]
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(raw: i64) -> Self {
                Self(raw)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

int_id! {
    /// Identifier of a device type (unit type) row.
    DeviceTypeId
}

int_id! {
    /// Store-generated primary key of a persisted row.
    StorageId
}

int_id! {
    /// Identifier of a script held in the file store.
    ScriptId
}

int_id! {
    /// Identifier of a device group.
    GroupId
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_raw_integer() {
        assert_eq!(StorageId::new(42).to_string(), "42");
        assert_eq!(DeviceTypeId::new(-1).to_string(), "-1");
    }

    #[test]
    fn serde_transparent() {
        let id = GroupId::new(7);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "7");
        let back: GroupId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn ordering_follows_raw_value() {
        assert!(StorageId::new(1) < StorageId::new(2));
        assert_eq!(i64::from(ScriptId::from(9)), 9);
    }
}
