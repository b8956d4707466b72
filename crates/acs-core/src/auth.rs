//! Caller permissions.
//!
//! The permission model itself lives outside this workspace. Components only
//! need a yes/no answer to "is this caller an administrator for device type
//! X", which is what [`Authorizer`] exposes.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::ids::DeviceTypeId;

/// Answers administrative permission checks for the current caller.
pub trait Authorizer: Send + Sync {
    /// Whether the caller may administer the given device type.
    fn is_device_type_admin(&self, device_type: DeviceTypeId) -> bool;
}

/// Simple permission set: either full admin or admin over a fixed list of
/// device types.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Permissions {
    /// Administrator for every device type.
    Admin,
    /// Administrator for the listed device types only.
    DeviceTypes(HashSet<DeviceTypeId>),
    /// No administrative rights.
    #[default]
    ReadOnly,
}

impl Permissions {
    /// Permissions granting admin over the given device types.
    pub fn device_types(ids: impl IntoIterator<Item = DeviceTypeId>) -> Self {
        Self::DeviceTypes(ids.into_iter().collect())
    }
}

impl Authorizer for Permissions {
    fn is_device_type_admin(&self, device_type: DeviceTypeId) -> bool {
        match self {
            Self::Admin => true,
            Self::DeviceTypes(ids) => ids.contains(&device_type),
            Self::ReadOnly => false,
        }
    }
}

/// Identity and permissions of whoever is invoking a mutation.
#[derive(Clone)]
pub struct CallerContext {
    username: String,
    authorizer: Arc<dyn Authorizer>,
}

impl CallerContext {
    /// Create a caller context.
    pub fn new(username: impl Into<String>, authorizer: Arc<dyn Authorizer>) -> Self {
        Self {
            username: username.into(),
            authorizer,
        }
    }

    /// Shortcut for a caller holding a [`Permissions`] value.
    pub fn with_permissions(username: impl Into<String>, permissions: Permissions) -> Self {
        Self::new(username, Arc::new(permissions))
    }

    /// Login name, used for logging.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Whether the caller may administer the given device type.
    pub fn is_device_type_admin(&self, device_type: DeviceTypeId) -> bool {
        self.authorizer.is_device_type_admin(device_type)
    }
}

impl fmt::Debug for CallerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallerContext")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_covers_everything() {
        let ctx = CallerContext::with_permissions("root", Permissions::Admin);
        assert!(ctx.is_device_type_admin(DeviceTypeId::new(1)));
        assert!(ctx.is_device_type_admin(DeviceTypeId::new(99)));
    }

    #[test]
    fn scoped_admin_only_listed_types() {
        let perms = Permissions::device_types([DeviceTypeId::new(1), DeviceTypeId::new(2)]);
        let ctx = CallerContext::with_permissions("ops", perms);
        assert!(ctx.is_device_type_admin(DeviceTypeId::new(2)));
        assert!(!ctx.is_device_type_admin(DeviceTypeId::new(3)));
    }

    #[test]
    fn default_is_read_only() {
        let ctx = CallerContext::with_permissions("guest", Permissions::default());
        assert!(!ctx.is_device_type_admin(DeviceTypeId::new(1)));
    }

    #[test]
    fn custom_authorizer() {
        struct OddOnly;
        impl Authorizer for OddOnly {
            fn is_device_type_admin(&self, device_type: DeviceTypeId) -> bool {
                device_type.get() % 2 == 1
            }
        }
        let ctx = CallerContext::new("odd", Arc::new(OddOnly));
        assert!(ctx.is_device_type_admin(DeviceTypeId::new(5)));
        assert!(!ctx.is_device_type_admin(DeviceTypeId::new(4)));
        assert!(format!("{ctx:?}").contains("odd"));
    }
}
