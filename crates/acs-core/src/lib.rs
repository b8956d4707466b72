//! # acs-core
//!
//! Foundation types shared by every ACS crate.
//!
//! - **Integer IDs**: `DeviceTypeId`, `StorageId`, `ScriptId`, `GroupId` as newtypes
//! - **Device types**: the [`DeviceType`] reference handed to per-device-type components
//! - **Permissions**: the [`Authorizer`] seam and the [`CallerContext`] passed to mutations
//! - **Logging**: `tracing` subscriber setup and in-memory log capture for tests

#![deny(unsafe_code)]

pub mod auth;
pub mod device_type;
pub mod ids;
pub mod logging;

pub use auth::{Authorizer, CallerContext, Permissions};
pub use device_type::DeviceType;
pub use ids::{DeviceTypeId, GroupId, ScriptId, StorageId};
