//! Change notifications for syslog event definitions.
//!
//! The registry publishes one [`SyslogEventChange`] per successful mutation,
//! after the index has been updated. How changes reach other nodes is up to
//! the [`ChangeNotifier`] implementation; [`BroadcastNotifier`] fans them out
//! in-process over a `tokio` broadcast channel.

use std::sync::Arc;

use acs_core::DeviceType;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

use crate::model::SyslogEvent;

/// What happened to the record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// First insert.
    Added,
    /// Update of a persisted record.
    Changed,
    /// Deletion.
    Deleted,
}

/// A published change.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyslogEventChange {
    /// What happened.
    pub kind: ChangeKind,
    /// The record after the change (or as it was, for deletions).
    pub event: Arc<SyslogEvent>,
    /// Device type the change is directed at.
    pub device_type: Arc<DeviceType>,
}

/// Sink for change notifications.
pub trait ChangeNotifier: Send + Sync {
    /// Publish one change. Must not block on slow consumers.
    fn publish(&self, change: SyslogEventChange);
}

/// Fans changes out to in-process subscribers.
#[derive(Debug)]
pub struct BroadcastNotifier {
    tx: broadcast::Sender<SyslogEventChange>,
}

impl BroadcastNotifier {
    /// Create a notifier buffering up to `capacity` changes per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to future changes.
    pub fn subscribe(&self) -> broadcast::Receiver<SyslogEventChange> {
        self.tx.subscribe()
    }
}

impl ChangeNotifier for BroadcastNotifier {
    fn publish(&self, change: SyslogEventChange) {
        let kind = change.kind;
        match self.tx.send(change) {
            Ok(receivers) => debug!(?kind, receivers, "syslog event change published"),
            Err(_) => debug!(?kind, "no subscribers for syslog event change"),
        }
    }
}

/// Keeps every published change in memory.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    changes: Mutex<Vec<SyslogEventChange>>,
}

impl RecordingNotifier {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// All changes so far, oldest first.
    pub fn changes(&self) -> Vec<SyslogEventChange> {
        self.changes.lock().clone()
    }

    /// Kinds of all changes so far.
    pub fn kinds(&self) -> Vec<ChangeKind> {
        self.changes.lock().iter().map(|c| c.kind).collect()
    }

    /// Number of recorded changes.
    pub fn len(&self) -> usize {
        self.changes.lock().len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.changes.lock().is_empty()
    }
}

impl ChangeNotifier for RecordingNotifier {
    fn publish(&self, change: SyslogEventChange) {
        self.changes.lock().push(change);
    }
}

#[cfg(test)]
mod tests {
    use acs_core::DeviceTypeId;

    use super::*;

    fn change(kind: ChangeKind) -> SyslogEventChange {
        let device_type = Arc::new(DeviceType::new(DeviceTypeId::new(1), "ROUTER-X"));
        SyslogEventChange {
            kind,
            event: Arc::new(SyslogEvent::new(Arc::clone(&device_type), 2001, "disk-full")),
            device_type,
        }
    }

    #[test]
    fn broadcast_reaches_subscribers() {
        let notifier = BroadcastNotifier::new(8);
        let mut rx = notifier.subscribe();
        notifier.publish(change(ChangeKind::Added));
        notifier.publish(change(ChangeKind::Deleted));

        assert_eq!(rx.try_recv().unwrap().kind, ChangeKind::Added);
        let deleted = rx.try_recv().unwrap();
        assert_eq!(deleted.kind, ChangeKind::Deleted);
        assert_eq!(deleted.device_type.name(), "ROUTER-X");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn broadcast_without_subscribers_is_fine() {
        let notifier = BroadcastNotifier::new(1);
        notifier.publish(change(ChangeKind::Changed));
    }

    #[test]
    fn recorder_keeps_order() {
        let recorder = RecordingNotifier::new();
        assert!(recorder.is_empty());
        recorder.publish(change(ChangeKind::Added));
        recorder.publish(change(ChangeKind::Changed));
        assert_eq!(recorder.kinds(), [ChangeKind::Added, ChangeKind::Changed]);
        assert_eq!(recorder.len(), 2);
    }

    #[test]
    fn change_serializes_camel_case() {
        let json = serde_json::to_value(change(ChangeKind::Added)).unwrap();
        assert_eq!(json["kind"], "added");
        assert_eq!(json["event"]["eventId"], 2001);
        assert_eq!(json["deviceType"]["name"], "ROUTER-X");
    }
}
