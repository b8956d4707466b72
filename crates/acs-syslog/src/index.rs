//! In-memory index of syslog event definitions.
//!
//! Two mappings live behind one lock: a process-wide map keyed by storage id
//! and, per device type, a map keyed by logical event id. [`EventIndex::put`]
//! and [`EventIndex::remove`] touch both in the same critical section, so a
//! reader never sees one updated without the other.
//!
//! One index is created at startup and shared (`Arc<EventIndex>`) by the
//! registries of every device type.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use acs_core::{DeviceTypeId, StorageId};
use parking_lot::RwLock;
use tracing::debug;

use crate::errors::{Result, SyslogEventError};
use crate::model::{SyslogEvent, system_device_type};

#[derive(Default)]
struct IndexState {
    by_storage_id: BTreeMap<StorageId, Arc<SyslogEvent>>,
    by_event_id: HashMap<DeviceTypeId, BTreeMap<i32, Arc<SyslogEvent>>>,
}

impl IndexState {
    fn unlink_logical(&mut self, event: &SyslogEvent, storage_id: StorageId) {
        let device_type = event.device_type.id();
        if let Some(per_type) = self.by_event_id.get_mut(&device_type) {
            if per_type
                .get(&event.event_id)
                .is_some_and(|e| e.storage_id() == Some(storage_id))
            {
                let _ = per_type.remove(&event.event_id);
            }
            if per_type.is_empty() {
                let _ = self.by_event_id.remove(&device_type);
            }
        }
    }
}

/// Dual-keyed cache of persisted syslog events.
pub struct EventIndex {
    state: RwLock<IndexState>,
}

impl EventIndex {
    /// Index holding only the system default event.
    pub fn new() -> Self {
        let default = Arc::new(SyslogEvent::system_default());
        let mut state = IndexState::default();
        if let Some(id) = default.storage_id() {
            let _ = state.by_storage_id.insert(id, default);
        }
        Self {
            state: RwLock::new(state),
        }
    }

    /// Insert or overwrite a persisted record in both mappings.
    ///
    /// If the storage id was indexed under another logical id, the stale
    /// logical entry is dropped. If the logical slot was held by a different
    /// storage id, that record is evicted from both mappings.
    pub fn put(&self, event: Arc<SyslogEvent>) -> Result<()> {
        let storage_id = event.storage_id().ok_or(SyslogEventError::NotPersisted {
            event_id: event.event_id,
        })?;
        let device_type = event.device_type.id();

        let mut state = self.state.write();
        if let Some(previous) = state.by_storage_id.remove(&storage_id) {
            state.unlink_logical(&previous, storage_id);
        }
        let displaced = state
            .by_event_id
            .entry(device_type)
            .or_default()
            .insert(event.event_id, Arc::clone(&event));
        if let Some(displaced_id) = displaced
            .and_then(|d| d.storage_id())
            .filter(|id| *id != storage_id)
        {
            debug!(storage_id = %displaced_id, event_id = event.event_id, "evicting displaced syslog event");
            let _ = state.by_storage_id.remove(&displaced_id);
        }
        let _ = state.by_storage_id.insert(storage_id, event);
        Ok(())
    }

    /// Load a batch of persisted records (cache warm-up).
    pub fn put_all(&self, events: impl IntoIterator<Item = Arc<SyslogEvent>>) -> Result<usize> {
        let mut count = 0;
        for event in events {
            self.put(event)?;
            count += 1;
        }
        Ok(count)
    }

    /// Remove a record from both mappings.
    ///
    /// The record is located by storage id when it has one, otherwise by
    /// device type and logical id.
    pub fn remove(&self, event: &SyslogEvent) -> Option<Arc<SyslogEvent>> {
        let mut state = self.state.write();
        let storage_id = event.storage_id().or_else(|| {
            state
                .by_event_id
                .get(&event.device_type.id())
                .and_then(|m| m.get(&event.event_id))
                .and_then(|e| e.storage_id())
        })?;
        let removed = state.by_storage_id.remove(&storage_id)?;
        state.unlink_logical(&removed, storage_id);
        Some(removed)
    }

    /// Look up by storage id.
    pub fn get(&self, storage_id: StorageId) -> Option<Arc<SyslogEvent>> {
        self.state.read().by_storage_id.get(&storage_id).cloned()
    }

    /// Look up by logical id within a device type.
    pub fn get_by_event_id(&self, device_type: DeviceTypeId, event_id: i32) -> Option<Arc<SyslogEvent>> {
        self.state
            .read()
            .by_event_id
            .get(&device_type)
            .and_then(|m| m.get(&event_id))
            .cloned()
    }

    /// Records of one device type, ordered by logical id.
    pub fn list(&self, device_type: DeviceTypeId) -> Vec<Arc<SyslogEvent>> {
        self.state
            .read()
            .by_event_id
            .get(&device_type)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Every record, ordered by storage id (system default included).
    pub fn list_all(&self) -> Vec<Arc<SyslogEvent>> {
        self.state.read().by_storage_id.values().cloned().collect()
    }

    /// Number of records in the global mapping.
    pub fn len(&self) -> usize {
        self.state.read().by_storage_id.len()
    }

    /// Whether the global mapping is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether both mappings describe the same set of records.
    ///
    /// The system default lives only in the global mapping and is skipped.
    pub fn is_consistent(&self) -> bool {
        let state = self.state.read();
        let system = system_device_type().id();

        let globals_linked = state
            .by_storage_id
            .iter()
            .filter(|(_, e)| e.device_type.id() != system)
            .all(|(id, e)| {
                state
                    .by_event_id
                    .get(&e.device_type.id())
                    .and_then(|m| m.get(&e.event_id))
                    .is_some_and(|linked| Arc::ptr_eq(linked, e) && linked.storage_id() == Some(*id))
            });
        let locals_linked = state.by_event_id.values().flat_map(BTreeMap::values).all(|e| {
            e.storage_id()
                .and_then(|id| state.by_storage_id.get(&id))
                .is_some_and(|global| Arc::ptr_eq(global, e))
        });
        globals_linked && locals_linked
    }
}

impl Default for EventIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("EventIndex")
            .field("records", &state.by_storage_id.len())
            .field("device_types", &state.by_event_id.len())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use acs_core::DeviceType;
    use assert_matches::assert_matches;

    use super::*;

    fn dt(id: i64, name: &str) -> Arc<DeviceType> {
        Arc::new(DeviceType::new(DeviceTypeId::new(id), name))
    }

    fn persisted(device_type: &Arc<DeviceType>, storage: i64, event_id: i32) -> Arc<SyslogEvent> {
        let mut event = SyslogEvent::new(Arc::clone(device_type), event_id, format!("e{event_id}"));
        event.mark_persisted(StorageId::new(storage));
        Arc::new(event)
    }

    #[test]
    fn new_index_holds_system_default_only() {
        let index = EventIndex::new();
        assert_eq!(index.len(), 1);
        let default = index.get(StorageId::new(0)).unwrap();
        assert_eq!(default.name, "Default");
        assert!(index.list(system_device_type().id()).is_empty());
        assert!(index.is_consistent());
    }

    #[test]
    fn put_then_lookup_both_ways() {
        let index = EventIndex::new();
        let router = dt(1, "ROUTER-X");
        let event = persisted(&router, 5, 2001);
        index.put(Arc::clone(&event)).unwrap();

        assert!(Arc::ptr_eq(&index.get(StorageId::new(5)).unwrap(), &event));
        assert!(Arc::ptr_eq(
            &index.get_by_event_id(router.id(), 2001).unwrap(),
            &event
        ));
        assert!(index.get_by_event_id(DeviceTypeId::new(2), 2001).is_none());
        assert!(index.is_consistent());
    }

    #[test]
    fn put_unpersisted_is_rejected() {
        let index = EventIndex::new();
        let event = Arc::new(SyslogEvent::new(dt(1, "ROUTER-X"), 2001, "x"));
        assert_matches!(
            index.put(event),
            Err(SyslogEventError::NotPersisted { event_id: 2001 })
        );
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn put_overwrites_same_storage_id() {
        let index = EventIndex::new();
        let router = dt(1, "ROUTER-X");
        index.put(persisted(&router, 5, 2001)).unwrap();
        let mut updated = (*persisted(&router, 5, 2001)).clone();
        updated.name = "renamed".into();
        index.put(Arc::new(updated)).unwrap();

        assert_eq!(index.len(), 2);
        assert_eq!(index.get(StorageId::new(5)).unwrap().name, "renamed");
        assert_eq!(index.get_by_event_id(router.id(), 2001).unwrap().name, "renamed");
        assert!(index.is_consistent());
    }

    #[test]
    fn put_rekeys_changed_logical_id() {
        let index = EventIndex::new();
        let router = dt(1, "ROUTER-X");
        index.put(persisted(&router, 5, 2001)).unwrap();
        index.put(persisted(&router, 5, 2002)).unwrap();

        assert!(index.get_by_event_id(router.id(), 2001).is_none());
        assert_eq!(index.get_by_event_id(router.id(), 2002).unwrap().storage_id(), Some(StorageId::new(5)));
        assert_eq!(index.list(router.id()).len(), 1);
        assert!(index.is_consistent());
    }

    #[test]
    fn put_evicts_displaced_storage_id() {
        let index = EventIndex::new();
        let router = dt(1, "ROUTER-X");
        index.put(persisted(&router, 5, 2001)).unwrap();
        index.put(persisted(&router, 6, 2001)).unwrap();

        assert!(index.get(StorageId::new(5)).is_none());
        assert_eq!(index.len(), 2);
        assert!(index.is_consistent());
    }

    #[test]
    fn same_logical_id_in_two_device_types() {
        let index = EventIndex::new();
        let router = dt(1, "ROUTER-X");
        let switch = dt(2, "SWITCH-Y");
        index.put(persisted(&router, 5, 2001)).unwrap();
        index.put(persisted(&switch, 6, 2001)).unwrap();

        assert_eq!(index.len(), 3);
        assert_eq!(index.list(router.id()).len(), 1);
        assert_eq!(index.list(switch.id()).len(), 1);
        assert!(index.is_consistent());
    }

    #[test]
    fn remove_clears_both_mappings() {
        let index = EventIndex::new();
        let router = dt(1, "ROUTER-X");
        let event = persisted(&router, 5, 2001);
        index.put(Arc::clone(&event)).unwrap();

        let removed = index.remove(&event).unwrap();
        assert!(Arc::ptr_eq(&removed, &event));
        assert!(index.get(StorageId::new(5)).is_none());
        assert!(index.get_by_event_id(router.id(), 2001).is_none());
        assert!(index.remove(&event).is_none());
        assert!(index.is_consistent());
    }

    #[test]
    fn remove_by_logical_id_when_unpersisted() {
        let index = EventIndex::new();
        let router = dt(1, "ROUTER-X");
        index.put(persisted(&router, 5, 2001)).unwrap();

        let probe = SyslogEvent::new(Arc::clone(&router), 2001, "probe");
        assert!(index.remove(&probe).is_some());
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn list_is_ordered_by_logical_id() {
        let index = EventIndex::new();
        let router = dt(1, "ROUTER-X");
        let count = index
            .put_all([
                persisted(&router, 1, 3000),
                persisted(&router, 2, 1500),
                persisted(&router, 3, 2001),
            ])
            .unwrap();
        assert_eq!(count, 3);
        let ids: Vec<i32> = index.list(router.id()).iter().map(|e| e.event_id).collect();
        assert_eq!(ids, [1500, 2001, 3000]);
        assert_eq!(index.list_all().len(), 4);
    }

    #[test]
    fn concurrent_puts_stay_consistent() {
        let index = Arc::new(EventIndex::new());
        let handles: Vec<_> = (0..8_i64)
            .map(|t| {
                let index = Arc::clone(&index);
                std::thread::spawn(move || {
                    let device_type = dt(t % 2 + 1, "T");
                    for i in 0..50_i64 {
                        let storage = t * 1000 + i + 1;
                        let event = persisted(&device_type, storage, i32::try_from(1000 + i).unwrap());
                        index.put(Arc::clone(&event)).unwrap();
                        if i % 3 == 0 {
                            let _ = index.remove(&event);
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(index.is_consistent());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn random_put_remove_sequences_stay_consistent(
                ops in proptest::collection::vec((1_i64..20, 1000_i32..1010, any::<bool>()), 1..60)
            ) {
                let index = EventIndex::new();
                let router = dt(1, "ROUTER-X");
                for (storage, event_id, is_put) in ops {
                    let event = persisted(&router, storage, event_id);
                    if is_put {
                        index.put(event).unwrap();
                    } else {
                        let _ = index.remove(&event);
                    }
                    prop_assert!(index.is_consistent());
                }
            }
        }
    }
}
