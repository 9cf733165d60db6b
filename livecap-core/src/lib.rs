//! # livecap-core
//!
//! Streaming transcription engine for live captions.
//!
//! ## Architecture
//!
//! ```text
//! Audio device / WAV → producer thread → block queue → CaptionWorker loop
//!                                                           │
//!                                                    SlidingWindow (5 s)
//!                                                           │
//!                                                 SpeechToText::transcribe
//!                                                           │
//!                                               unique_suffix reconciliation
//!                                                           │
//!                                                  EventSink (JSON lines)
//! ```
//!
//! The capture callback is zero-alloc. All heap work happens on the
//! producer and consumer threads.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod audio;
pub mod error;
pub mod hardware;
pub mod ipc;
pub mod text;
pub mod transcribe;
pub mod window;
pub mod worker;

// Convenience re-exports for downstream crates
pub use error::{CaptionError, Result};
pub use hardware::{select_engine_settings, DeviceProfile, EngineSettings, SelectionOverrides};
pub use ipc::{BroadcastSink, Event, EventSink, JsonLineSink};
pub use transcribe::{EngineHandle, SpeechToText, Task};
pub use worker::{CaptionWorker, WorkerConfig, WorkerStatus};

#[cfg(feature = "whisper")]
pub use transcribe::{WhisperEngine, WhisperEngineConfig};
