//! Event sink implementations.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::sync::broadcast;

use super::{Event, EventSink};

/// Writes one JSON record per line to a writer, flushing after each record.
///
/// Writes are best-effort. A serialization or write failure is logged and
/// the event dropped; the write-failure warning fires only once because the
/// log bridge may route that very warning back into this sink.
pub struct JsonLineSink<W: Write + Send> {
    writer: Mutex<W>,
    write_failed: AtomicBool,
}

impl JsonLineSink<std::io::Stdout> {
    /// Sink on stdout, the worker process protocol stream.
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> JsonLineSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
            write_failed: AtomicBool::new(false),
        }
    }
}

impl<W: Write + Send> EventSink for JsonLineSink<W> {
    fn emit(&self, event: Event) {
        let line = match serde_json::to_string(&event) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize event");
                return;
            }
        };
        let result = {
            let mut writer = self.writer.lock();
            writeln!(writer, "{line}").and_then(|_| writer.flush())
        };
        // The warning must fire with the writer lock released: the log
        // bridge can route it straight back into this sink.
        if let Err(e) = result {
            if !self.write_failed.swap(true, Ordering::Relaxed) {
                tracing::warn!(error = %e, "event write failed; further write failures suppressed");
            }
        }
    }
}

/// Fans events out to in-process subscribers over a broadcast channel.
///
/// Lagging subscribers lose the oldest events rather than blocking the
/// pipeline; a sink with no subscribers drops everything.
pub struct BroadcastSink {
    tx: broadcast::Sender<Event>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// A new receiver over this sink's event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

impl EventSink for BroadcastSink {
    fn emit(&self, event: Event) {
        // Err means no live receivers, which is not a failure here.
        let _ = self.tx.send(event);
    }
}
