//! Per-device-type entry point for syslog event definitions.
//!
//! A [`SyslogEventRegistry`] manages the definitions of one device type. It
//! checks the caller's rights, validates input before touching the store,
//! persists through [`EventPersistence`], updates the shared [`EventIndex`]
//! and finally publishes a change notification.
//!
//! The index lock is only taken after the store call has returned. If the
//! index update were to fail after a successful write, the row stays in the
//! store without a cache entry; nothing rolls the write back.

use std::sync::Arc;

use acs_core::{CallerContext, DeviceType, StorageId};
use tracing::{debug, instrument, warn};

use crate::errors::{Result, SyslogEventError};
use crate::index::EventIndex;
use crate::model::{RESERVED_EVENT_ID_LIMIT, SyslogEvent};
use crate::notify::{ChangeKind, ChangeNotifier, SyslogEventChange};
use crate::store::EventPersistence;

/// Syslog event definitions of one device type.
pub struct SyslogEventRegistry<S: EventPersistence> {
    device_type: Arc<DeviceType>,
    index: Arc<EventIndex>,
    store: Arc<S>,
    notifier: Option<Arc<dyn ChangeNotifier>>,
}

impl<S: EventPersistence> SyslogEventRegistry<S> {
    /// Create a registry without a notification sink.
    pub fn new(device_type: Arc<DeviceType>, index: Arc<EventIndex>, store: Arc<S>) -> Self {
        Self {
            device_type,
            index,
            store,
            notifier: None,
        }
    }

    /// Attach a notification sink.
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn ChangeNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Managed device type.
    pub fn device_type(&self) -> &Arc<DeviceType> {
        &self.device_type
    }

    /// Shared index.
    pub fn index(&self) -> &Arc<EventIndex> {
        &self.index
    }

    /// Read this device type's rows from the store into the index.
    ///
    /// Returns the number of records loaded.
    pub fn load(&self) -> Result<usize> {
        let events = self.store.load(&self.device_type)?;
        let count = self.index.put_all(events.into_iter().map(Arc::new))?;
        debug!(device_type = self.device_type.name(), count, "syslog events warmed up");
        Ok(count)
    }

    /// Insert a new definition or update an existing one.
    ///
    /// Returns the indexed record, carrying its storage id.
    #[instrument(skip_all, fields(event_id = event.event_id, device_type = self.device_type.name()))]
    pub fn add_or_change(&self, mut event: SyslogEvent, ctx: &CallerContext) -> Result<Arc<SyslogEvent>> {
        self.authorize(ctx)?;
        self.check_device_type(&event)?;
        event.validate()?;
        self.check_unique_event_id(&event)?;

        let outcome = self.store.persist(&event, &self.device_type)?;
        event.mark_persisted(outcome.storage_id);

        let event = Arc::new(event);
        self.index.put(Arc::clone(&event))?;

        let kind = if outcome.inserted {
            ChangeKind::Added
        } else {
            ChangeKind::Changed
        };
        self.notify(kind, &event);
        Ok(event)
    }

    /// Delete a definition.
    ///
    /// Logical ids below 1000 are reserved and cannot be deleted.
    #[instrument(skip_all, fields(event_id = event.event_id, device_type = self.device_type.name()))]
    pub fn delete(&self, event: &SyslogEvent, ctx: &CallerContext) -> Result<()> {
        self.authorize(ctx)?;
        self.check_device_type(event)?;
        if event.event_id < RESERVED_EVENT_ID_LIMIT {
            return Err(SyslogEventError::ProtectedEvent {
                event_id: event.event_id,
            });
        }

        let target = self.resolve_for_delete(event)?;

        let removed = self.store.remove(&target, &self.device_type)?;
        if removed == 0 {
            debug!("no stored row matched the deleted syslog event");
        }

        let indexed = self.index.remove(&target);
        let published = indexed.unwrap_or(target);
        self.notify(ChangeKind::Deleted, &published);
        Ok(())
    }

    /// Look up by logical id within this device type.
    pub fn get_by_event_id(&self, event_id: i32) -> Option<Arc<SyslogEvent>> {
        self.index.get_by_event_id(self.device_type.id(), event_id)
    }

    /// Look up by storage id. The index is shared, so this may return a
    /// record of another device type.
    pub fn get_by_storage_id(&self, storage_id: StorageId) -> Option<Arc<SyslogEvent>> {
        self.index.get(storage_id)
    }

    /// Every definition of this device type, ordered by logical id.
    pub fn list_all(&self) -> Vec<Arc<SyslogEvent>> {
        self.index.list(self.device_type.id())
    }

    fn authorize(&self, ctx: &CallerContext) -> Result<()> {
        if ctx.is_device_type_admin(self.device_type.id()) {
            return Ok(());
        }
        warn!(
            username = ctx.username(),
            device_type = self.device_type.name(),
            "syslog event change rejected: not an administrator"
        );
        Err(SyslogEventError::Unauthorized {
            username: ctx.username().to_string(),
            device_type: self.device_type.name().to_string(),
        })
    }

    fn check_device_type(&self, event: &SyslogEvent) -> Result<()> {
        if event.device_type.id() == self.device_type.id() {
            Ok(())
        } else {
            Err(SyslogEventError::DeviceTypeMismatch {
                record: event.device_type.name().to_string(),
                registry: self.device_type.name().to_string(),
            })
        }
    }

    fn check_unique_event_id(&self, event: &SyslogEvent) -> Result<()> {
        match self.get_by_event_id(event.event_id) {
            Some(existing) if existing.storage_id() != event.storage_id() => {
                Err(SyslogEventError::DuplicateEventId {
                    event_id: event.event_id,
                    existing: existing.storage_id().unwrap_or(StorageId::new(0)),
                    device_type: self.device_type.name().to_string(),
                })
            }
            _ => Ok(()),
        }
    }

    /// Indexed record a delete refers to, by storage id first and logical id
    /// second. Store and index are both addressed through it, so a caller
    /// record edited since it was read cannot remove one row from the store
    /// and another from the index.
    fn resolve_for_delete(&self, event: &SyslogEvent) -> Result<Arc<SyslogEvent>> {
        let indexed = event
            .storage_id()
            .and_then(|storage_id| self.index.get(storage_id))
            .or_else(|| self.get_by_event_id(event.event_id));
        let Some(indexed) = indexed else {
            return Ok(Arc::new(event.clone()));
        };

        let same_row = event.storage_id().is_none() || event.storage_id() == indexed.storage_id();
        if indexed.event_id == event.event_id
            && indexed.device_type.id() == self.device_type.id()
            && same_row
        {
            return Ok(indexed);
        }
        warn!(
            indexed_event_id = indexed.event_id,
            "syslog event delete rejected: record is stale"
        );
        Err(SyslogEventError::StaleRecord {
            event_id: event.event_id,
            storage_id: indexed.storage_id().unwrap_or(StorageId::new(0)),
            indexed: indexed.event_id,
        })
    }

    fn notify(&self, kind: ChangeKind, event: &Arc<SyslogEvent>) {
        let Some(notifier) = &self.notifier else {
            return;
        };
        notifier.publish(SyslogEventChange {
            kind,
            event: Arc::clone(event),
            device_type: Arc::clone(&self.device_type),
        });
    }
}

impl<S: EventPersistence> std::fmt::Debug for SyslogEventRegistry<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyslogEventRegistry")
            .field("device_type", &self.device_type.name())
            .field("notifier", &self.notifier.is_some())
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
