//! Speech-to-text abstraction.
//!
//! The `SpeechToText` trait decouples the pipeline from any specific backend
//! (stub echo, whisper.cpp, a remote service).
//!
//! `&mut self` on `transcribe` intentionally expresses that decoders are
//! stateful (beam caches, decoder contexts, scratch buffers). All mutation
//! is serialised through `EngineHandle`'s `parking_lot::Mutex`.

pub mod stub;

#[cfg(feature = "whisper")]
pub mod whisper;

#[cfg(feature = "whisper")]
pub use whisper::{WhisperEngine, WhisperEngineConfig};

use std::str::FromStr;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::Result;

/// What the engine should produce from the audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Task {
    /// Recognize in the source language.
    Transcribe,
    /// Recognize and render into English.
    #[default]
    Translate,
}

impl std::fmt::Display for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Task::Transcribe => write!(f, "transcribe"),
            Task::Translate => write!(f, "translate"),
        }
    }
}

impl FromStr for Task {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "transcribe" => Ok(Task::Transcribe),
            "translate" => Ok(Task::Translate),
            other => Err(format!("unknown task '{other}' (expected 'transcribe' or 'translate')")),
        }
    }
}

/// Contract for transcription backends.
pub trait SpeechToText: Send + 'static {
    /// One-time warm-up: locate and load model weights. Called once while
    /// the session initializes; an error here is fatal to the session.
    fn warm_up(&mut self) -> Result<()>;

    /// Transcribe a window of mono f32 samples.
    ///
    /// Blocking, with unbounded latency. The caller applies no timeout, so
    /// a hung backend stalls caption output until the call returns.
    fn transcribe(&mut self, samples: &[f32], language: Option<&str>, task: Task)
        -> Result<String>;
}

/// Thread-safe reference-counted handle to any `SpeechToText` implementor.
///
/// `parking_lot::Mutex` for non-poisoning behavior on panic and a cheap
/// uncontended lock.
#[derive(Clone)]
pub struct EngineHandle(pub Arc<Mutex<dyn SpeechToText>>);

impl EngineHandle {
    /// Wrap any `SpeechToText` in an `EngineHandle`.
    pub fn new<E: SpeechToText>(engine: E) -> Self {
        Self(Arc::new(Mutex::new(engine)))
    }
}

impl std::fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineHandle").finish_non_exhaustive()
    }
}
