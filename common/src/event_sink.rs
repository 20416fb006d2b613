use std::collections::BTreeMap;

use slog::info;

/// A value attached to a structured event. Kept narrow (strings and
/// i64s cover every field the core emits) rather than reaching for a
/// generic `serde_json::Value`, since the whole point of this seam is
/// that it never carries a transcript or model payload.
#[derive(Clone, Debug)]
pub enum FieldValue {
    Str(String),
    Int(i64),
    Bool(bool),
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Str(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Str(s)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Int(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

pub type Fields = BTreeMap<String, FieldValue>;

/// Replaces the ad-hoc inline loggers of the source system with a
/// single injected chokepoint (§9): every orphan/compensation/readiness
/// event in the core goes through `emit`, so a caller could swap in a
/// metrics-backed sink without touching call sites.
pub trait EventSink: Send + Sync {
    fn emit(&self, event_name: &str, fields: Fields);
}

/// Default sink: one structured `slog` line per event, at `info` level,
/// the way the teacher logs job/file transitions inline through its
/// `Central`-held logger.
pub struct LogEventSink {
    log: slog::Logger,
}

impl LogEventSink {
    pub fn new(log: slog::Logger) -> Self {
        LogEventSink { log }
    }
}

impl EventSink for LogEventSink {
    fn emit(&self, event_name: &str, fields: Fields) {
        let kv = fields
            .into_iter()
            .map(|(k, v)| {
                let rendered = match v {
                    FieldValue::Str(s) => s,
                    FieldValue::Int(n) => n.to_string(),
                    FieldValue::Bool(b) => b.to_string(),
                };
                format!("{k}={rendered}")
            })
            .collect::<Vec<_>>()
            .join(" ");

        info!(self.log, "{}", event_name; "fields" => kv);
    }
}

#[cfg(any(test, feature = "testing"))]
pub struct RecordingEventSink {
    pub events: std::sync::Mutex<Vec<(String, Fields)>>,
}

#[cfg(any(test, feature = "testing"))]
impl Default for RecordingEventSink {
    fn default() -> Self {
        RecordingEventSink { events: std::sync::Mutex::new(Vec::new()) }
    }
}

#[cfg(any(test, feature = "testing"))]
impl EventSink for RecordingEventSink {
    fn emit(&self, event_name: &str, fields: Fields) {
        self.events.lock().unwrap().push((event_name.to_string(), fields));
    }
}
