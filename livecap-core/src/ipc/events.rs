//! Protocol event types.
//!
//! ## Wire format
//!
//! One JSON record per line, tagged by `type`:
//!
//! | Variant | Line |
//! |---------|------|
//! | `Event::Text` | `{"type":"text","content":"..."}` |
//! | `Event::Status` | `{"type":"status","content":"..."}` |
//! | `Event::Error` | `{"type":"error","content":"..."}` |
//! | `Event::Log` | `{"type":"log","level":"INFO","name":"...","message":"...", ...}` |
//!
//! Records are emitted in strict order, one per line, and are never batched
//! or reordered. Hosting processes parse them line by line.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A single protocol record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Event {
    /// Newly appeared caption text: the reconciled suffix, not the full
    /// transcript.
    Text { content: String },
    /// Human-readable lifecycle status.
    Status { content: String },
    /// Error description. Whether the session continues depends on the
    /// failure class (see the worker module docs).
    Error { content: String },
    /// Diagnostic record bridged from the tracing subscriber when the
    /// process is GUI-hosted.
    Log {
        level: String,
        name: String,
        message: String,
        /// Structured fields attached to the tracing event, flattened into
        /// the record.
        #[serde(flatten, default)]
        fields: BTreeMap<String, serde_json::Value>,
    },
}

impl Event {
    pub fn text(content: impl Into<String>) -> Self {
        Event::Text {
            content: content.into(),
        }
    }

    pub fn status(content: impl Into<String>) -> Self {
        Event::Status {
            content: content.into(),
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Event::Error {
            content: content.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_event_serializes_with_lowercase_tag() {
        let event = Event::text("jumps over");

        let json = serde_json::to_value(&event).expect("serialize text event");
        assert_eq!(json["type"], "text");
        assert_eq!(json["content"], "jumps over");

        let round_trip: Event = serde_json::from_value(json).expect("deserialize text event");
        assert_eq!(round_trip, event);
    }

    #[test]
    fn status_and_error_events_share_the_content_shape() {
        let status = serde_json::to_value(Event::status("Ready. Listening...")).unwrap();
        assert_eq!(status["type"], "status");
        assert_eq!(status["content"], "Ready. Listening...");

        let error = serde_json::to_value(Event::error("device lost")).unwrap();
        assert_eq!(error["type"], "error");
        assert_eq!(error["content"], "device lost");
    }

    #[test]
    fn log_event_flattens_extra_fields_into_the_record() {
        let mut fields = BTreeMap::new();
        fields.insert("device".to_string(), serde_json::json!("pulse-monitor"));
        let event = Event::Log {
            level: "INFO".into(),
            name: "livecap_core::worker".into(),
            message: "producer started".into(),
            fields,
        };

        let json = serde_json::to_value(&event).expect("serialize log event");
        assert_eq!(json["type"], "log");
        assert_eq!(json["level"], "INFO");
        assert_eq!(json["name"], "livecap_core::worker");
        assert_eq!(json["message"], "producer started");
        assert_eq!(json["device"], "pulse-monitor");

        let round_trip: Event = serde_json::from_value(json).expect("deserialize log event");
        match round_trip {
            Event::Log { fields, .. } => {
                assert_eq!(fields.get("device"), Some(&serde_json::json!("pulse-monitor")));
            }
            other => panic!("expected log event, got {other:?}"),
        }
    }

    #[test]
    fn log_event_without_extra_fields_emits_no_placeholder_key() {
        let event = Event::Log {
            level: "WARN".into(),
            name: "livecap".into(),
            message: "probe failed".into(),
            fields: BTreeMap::new(),
        };

        let json = serde_json::to_value(&event).unwrap();
        let keys: Vec<&str> = json.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys.len(), 4, "only type/level/name/message expected: {keys:?}");
    }

    #[test]
    fn event_tag_rejects_non_lowercase_values() {
        let invalid = r#"{"type":"Text","content":"x"}"#;
        let err = serde_json::from_str::<Event>(invalid);
        assert!(err.is_err(), "expected invalid casing to fail");
    }
}
