//! In-memory capture of tracing events for assertions in tests.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::level_filters::LevelFilter;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;

/// One captured tracing event.
#[derive(Clone, Debug)]
pub struct CapturedRecord {
    /// Event level.
    pub level: Level,
    /// Target module path.
    pub target: String,
    /// Formatted message.
    pub message: String,
    /// Structured fields as `(name, rendered value)`.
    pub fields: Vec<(String, String)>,
}

impl CapturedRecord {
    /// Rendered value of a structured field, if present.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Thread-safe handle on captured events.
#[derive(Clone, Default)]
pub struct CapturedLogs {
    records: Arc<Mutex<Vec<CapturedRecord>>>,
}

impl CapturedLogs {
    fn with<R>(&self, f: impl FnOnce(&mut Vec<CapturedRecord>) -> R) -> R {
        let mut guard = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    /// Snapshot of every captured record.
    pub fn records(&self) -> Vec<CapturedRecord> {
        self.with(|r| r.clone())
    }

    /// Whether any record at `level` contains `message_contains`.
    pub fn has_event(&self, level: Level, message_contains: &str) -> bool {
        self.with(|r| {
            r.iter()
                .any(|e| e.level == level && e.message.contains(message_contains))
        })
    }

    /// Number of records at `level`.
    pub fn count_at_level(&self, level: Level) -> usize {
        self.with(|r| r.iter().filter(|e| e.level == level).count())
    }

    /// Records whose target starts with `target_prefix`.
    pub fn records_for_target(&self, target_prefix: &str) -> Vec<CapturedRecord> {
        self.with(|r| {
            r.iter()
                .filter(|e| e.target.starts_with(target_prefix))
                .cloned()
                .collect()
        })
    }

    /// Drop everything captured so far.
    pub fn clear(&self) {
        self.with(Vec::clear);
    }
}

struct CaptureLayer {
    logs: CapturedLogs,
}

struct FieldVisitor {
    message: String,
    fields: Vec<(String, String)>,
}

impl tracing::field::Visit for FieldVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        let rendered = format!("{value:?}");
        if field.name() == "message" {
            self.message = rendered;
        } else {
            self.fields.push((field.name().to_owned(), rendered));
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            value.clone_into(&mut self.message);
        } else {
            self.fields.push((field.name().to_owned(), value.to_owned()));
        }
    }

    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        self.fields.push((field.name().to_owned(), value.to_string()));
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.fields.push((field.name().to_owned(), value.to_string()));
    }

    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.fields.push((field.name().to_owned(), value.to_string()));
    }
}

impl<S> Layer<S> for CaptureLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let mut visitor = FieldVisitor {
            message: String::new(),
            fields: Vec::new(),
        };
        event.record(&mut visitor);

        let record = CapturedRecord {
            level: *metadata.level(),
            target: metadata.target().to_owned(),
            message: visitor.message,
            fields: visitor.fields,
        };
        self.logs.with(|r| r.push(record));
    }
}

/// Install a thread-local capturing subscriber.
///
/// Uses `set_default`, so it only affects the current thread and is safe in
/// parallel tests. Keep the returned guard alive for the duration of the test.
pub fn capture_logs() -> (CapturedLogs, tracing::subscriber::DefaultGuard) {
    let logs = CapturedLogs::default();
    let layer = CaptureLayer { logs: logs.clone() };

    let subscriber = tracing_subscriber::registry()
        .with(layer)
        .with(LevelFilter::TRACE);

    let guard = subscriber.set_default();
    (logs, guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_levels() {
        let (logs, _guard) = capture_logs();
        tracing::info!("inserted");
        tracing::warn!("faulty release");

        assert!(logs.has_event(Level::INFO, "inserted"));
        assert!(logs.has_event(Level::WARN, "faulty"));
        assert_eq!(logs.count_at_level(Level::ERROR), 0);
    }

    #[test]
    fn captures_structured_fields() {
        let (logs, _guard) = capture_logs();
        tracing::info!(event_id = 2001, device_type = "ROUTER-X", "inserted syslog event");

        let records = logs.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].field("event_id"), Some("2001"));
        assert_eq!(records[0].field("device_type"), Some("ROUTER-X"));
        assert_eq!(records[0].field("missing"), None);
    }

    #[test]
    fn filter_by_target_and_clear() {
        let (logs, _guard) = capture_logs();
        tracing::info!(target: "acs_syslog::store", "store event");
        tracing::info!(target: "acs_settings::loader", "settings event");

        assert_eq!(logs.records_for_target("acs_syslog").len(), 1);
        logs.clear();
        assert!(logs.records().is_empty());
    }
}
