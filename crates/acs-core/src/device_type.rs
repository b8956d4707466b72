//! Device type reference.
//!
//! Device types are owned by the device-type subsystem. Other components
//! hold an `Arc<DeviceType>` and only ever read its id and name.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ids::DeviceTypeId;

/// The category of managed device a definition applies to.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceType {
    id: DeviceTypeId,
    name: String,
}

impl DeviceType {
    /// Create a device type reference.
    pub fn new(id: DeviceTypeId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    /// Row identifier.
    pub fn id(&self) -> DeviceTypeId {
        self.id
    }

    /// Unique display name (e.g. `ROUTER-X`).
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (#{})", self.name, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors_and_display() {
        let dt = DeviceType::new(DeviceTypeId::new(3), "ROUTER-X");
        assert_eq!(dt.id(), DeviceTypeId::new(3));
        assert_eq!(dt.name(), "ROUTER-X");
        assert_eq!(dt.to_string(), "ROUTER-X (#3)");
    }
}
