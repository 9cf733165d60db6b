//! Tracing setup for the worker process.
//!
//! Attached to a terminal, logs render human-readable on stderr and stdout
//! stays a clean protocol stream. Hosted by a GUI, stderr goes nowhere
//! useful, so every record is bridged onto the event sink as a `log` line
//! instead and the host decides what to surface.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use livecap_core::{Event, EventSink};
use tracing::field::{Field, Visit};
use tracing::Subscriber;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Installs the global subscriber. Call once, before any other output.
pub fn init(sink: Option<Arc<dyn EventSink>>) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| "livecap=info".parse().unwrap());

    match sink {
        Some(sink) => {
            tracing_subscriber::registry()
                .with(filter)
                .with(SinkLayer { sink })
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

/// Forwards each tracing record to the event sink as [`Event::Log`].
///
/// The sink suppresses its own write-failure warnings, so a dead stdout
/// cannot loop a warning back through this layer forever.
struct SinkLayer {
    sink: Arc<dyn EventSink>,
}

impl<S: Subscriber> Layer<S> for SinkLayer {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        self.sink.emit(Event::Log {
            level: meta.level().to_string(),
            name: meta.target().to_string(),
            message: visitor.message,
            fields: visitor.fields,
        });
    }
}

/// Collects a record's fields as JSON values, keeping `message` separate.
#[derive(Default)]
struct FieldVisitor {
    message: String,
    fields: BTreeMap<String, serde_json::Value>,
}

impl Visit for FieldVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.fields
                .insert(field.name().to_string(), format!("{value:?}").into());
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.insert(field.name().to_string(), value.into());
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.fields.insert(field.name().to_string(), value.into());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.fields.insert(field.name().to_string(), value.into());
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.fields.insert(field.name().to_string(), value.into());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.fields.insert(field.name().to_string(), value.into());
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::Mutex;
    use std::time::Duration;

    use livecap_core::JsonLineSink;

    use super::*;

    #[derive(Default)]
    struct CollectingSink(Mutex<Vec<Event>>);

    impl EventSink for CollectingSink {
        fn emit(&self, event: Event) {
            self.0.lock().unwrap().push(event);
        }
    }

    /// Writer that fails every call, like a host that closed the pipe.
    struct ClosedPipe;

    impl io::Write for ClosedPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "gone"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "gone"))
        }
    }

    #[test]
    fn bridged_records_carry_level_target_and_fields() {
        let sink = Arc::new(CollectingSink::default());
        let layer = SinkLayer { sink: sink.clone() };
        let subscriber = tracing_subscriber::registry().with(layer);

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(target: "livecap::session", windows = 3u64, "session finished");
        });

        let events = sink.0.lock().unwrap();
        assert_eq!(events.len(), 1);
        match &events[0] {
            Event::Log {
                level,
                name,
                message,
                fields,
            } => {
                assert_eq!(level, "INFO");
                assert_eq!(name, "livecap::session");
                assert_eq!(message, "session finished");
                assert_eq!(fields.get("windows"), Some(&serde_json::Value::from(3u64)));
            }
            other => panic!("expected a log event, got {other:?}"),
        }
    }

    #[test]
    fn a_failed_write_warning_routed_back_into_the_same_sink_returns() {
        // GUI-hosted wiring: the layer feeds the very sink that produces
        // the write-failure warning, so that warning re-enters emit on the
        // same thread. Run on a helper thread with a deadline; a sink that
        // warns while holding its writer lock never comes back.
        let (done_tx, done_rx) = std::sync::mpsc::channel();
        std::thread::spawn(move || {
            let sink = Arc::new(JsonLineSink::new(ClosedPipe));
            let layer = SinkLayer {
                sink: Arc::clone(&sink) as Arc<dyn EventSink>,
            };
            let subscriber = tracing_subscriber::registry().with(layer);
            tracing::subscriber::with_default(subscriber, || {
                sink.emit(Event::text("hello"));
                sink.emit(Event::text("still alive"));
            });
            let _ = done_tx.send(());
        });

        assert!(
            done_rx.recv_timeout(Duration::from_secs(3)).is_ok(),
            "emit never returned after the first failed write"
        );
    }

    #[test]
    fn display_and_debug_fields_arrive_as_strings() {
        let sink = Arc::new(CollectingSink::default());
        let layer = SinkLayer { sink: sink.clone() };
        let subscriber = tracing_subscriber::registry().with(layer);

        tracing::subscriber::with_default(subscriber, || {
            let err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone");
            tracing::warn!(target: "livecap::io", error = %err, "event write failed");
        });

        let events = sink.0.lock().unwrap();
        match &events[0] {
            Event::Log { level, fields, .. } => {
                assert_eq!(level, "WARN");
                assert_eq!(fields.get("error"), Some(&serde_json::Value::from("gone")));
            }
            other => panic!("expected a log event, got {other:?}"),
        }
    }
}
