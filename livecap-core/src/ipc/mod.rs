//! Protocol events and emission sinks.
//!
//! Everything the pipeline reports (caption text, lifecycle status, errors,
//! bridged log records) goes through [`EventSink`]. Sinks are best-effort:
//! an emission failure is the sink's problem and must never propagate back
//! into the pipeline.

pub mod events;
pub mod sink;

pub use events::Event;
pub use sink::{BroadcastSink, JsonLineSink};

/// Where pipeline events go.
///
/// Called from the consumer loop and the producer thread; implementations
/// must be cheap and must swallow their own failures.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: Event);
}
