//! `CaptionWorker`: top-level session lifecycle.
//!
//! ## Lifecycle
//!
//! ```text
//! CaptionWorker::new()                             status = Idle
//!     └─► run(make_source)
//!         ├─ open audio source on producer thread  status = Initializing
//!         ├─ warm up the speech engine
//!         ├─ producer + consumer loops             status = Listening ⇄ Processing
//!         └─ stop() or stream end                  status = Stopped
//! ```
//!
//! `run` blocks for the whole session and is meant to be hosted on a
//! blocking thread (`tokio::task::spawn_blocking` in the worker binary).
//! `stop()` can be called from any thread and returns once the flag is set;
//! the session winds down within one queue poll interval.
//!
//! ## Threading
//!
//! Capture handles are `!Send` on Windows/macOS (COM / CoreAudio thread
//! affinity), so the audio source is constructed *inside* the producer
//! thread via [`SourceFactory`]. A sync channel propagates the open result
//! back so `run` can fail fast when no device is available.
//!
//! ## Failure classes
//!
//! Source-open and engine warm-up errors are fatal: `run` emits an error
//! event and returns `Err` before any caption is produced. A source failure
//! mid-session stops the producer; the consumer drains what was queued and
//! the session ends normally. Transcription errors are transient: they are
//! reported per window and the session keeps going.

pub mod pipeline;

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use parking_lot::Mutex;
use tracing::info;

use crate::{
    audio::SourceFactory,
    error::{CaptionError, Result},
    ipc::{Event, EventSink},
    transcribe::{EngineHandle, Task},
};

/// Tunables for a caption session.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Sample rate the engine consumes (Hz). Sources must deliver blocks at
    /// this rate. Default: 16000.
    pub sample_rate: u32,
    /// Sliding window length in seconds. Default: 5.0.
    pub window_secs: f32,
    /// Tail carried between consecutive windows, in seconds. Default: 0.5.
    pub overlap_secs: f32,
    /// Idle gap after which accumulated caption text is abandoned and the
    /// next emission starts a fresh line. Default: 15 s.
    pub newline_interval: std::time::Duration,
    /// Samples per producer block. Default: 4000 (0.25 s at 16 kHz).
    pub block_size: usize,
    /// Block queue bound between producer and consumer. `Some(n)` applies
    /// backpressure to the producer when the consumer falls behind; `None`
    /// grows without bound. Default: `None`.
    pub queue_capacity: Option<usize>,
    /// Spoken language hint (ISO 639-1). `None` lets the engine auto-detect.
    pub language: Option<String>,
    /// Whether to transcribe verbatim or translate to English.
    pub task: Task,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            window_secs: 5.0,
            overlap_secs: 0.5,
            newline_interval: std::time::Duration::from_secs(15),
            block_size: 4_000,
            queue_capacity: None,
            language: None,
            task: Task::default(),
        }
    }
}

impl WorkerConfig {
    /// Window length in samples.
    pub fn window_size(&self) -> usize {
        (self.sample_rate as f32 * self.window_secs) as usize
    }

    /// Overlap length in samples.
    pub fn overlap_size(&self) -> usize {
        (self.sample_rate as f32 * self.overlap_secs) as usize
    }
}

/// Machine-readable session state. Human-readable progress goes out as
/// [`Event::Status`] records instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerStatus {
    Idle,
    Initializing,
    Listening,
    Processing,
    Stopped,
    Error,
}

impl std::fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            WorkerStatus::Idle => "idle",
            WorkerStatus::Initializing => "initializing",
            WorkerStatus::Listening => "listening",
            WorkerStatus::Processing => "processing",
            WorkerStatus::Stopped => "stopped",
            WorkerStatus::Error => "error",
        };
        f.write_str(name)
    }
}

/// The top-level session handle.
///
/// All fields use interior mutability, so the worker is `Send + Sync` and
/// can be shared as `Arc<CaptionWorker>` between the session thread and a
/// control surface (signal handler, IPC command loop).
pub struct CaptionWorker {
    config: WorkerConfig,
    engine: EngineHandle,
    sink: Arc<dyn EventSink>,
    /// `true` while a session is active.
    running: Arc<AtomicBool>,
    status: Arc<Mutex<WorkerStatus>>,
}

impl CaptionWorker {
    /// Create a worker. No audio is opened until [`run`](Self::run).
    pub fn new(config: WorkerConfig, engine: EngineHandle, sink: Arc<dyn EventSink>) -> Self {
        Self {
            config,
            engine,
            sink,
            running: Arc::new(AtomicBool::new(false)),
            status: Arc::new(Mutex::new(WorkerStatus::Idle)),
        }
    }

    /// Run one caption session to completion.
    ///
    /// Opens the source, warms up the engine, then streams until `stop()`
    /// is called or the source ends. Blocking; host on a dedicated thread.
    ///
    /// # Errors
    /// - [`CaptionError::AlreadyRunning`] if a session is active.
    /// - Source-open and warm-up failures are returned after an error event
    ///   is emitted; no captions were produced.
    pub fn run(&self, make_source: SourceFactory) -> Result<()> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(CaptionError::AlreadyRunning);
        }

        self.set_status(WorkerStatus::Initializing, Some("Initializing audio source..."));

        let (block_tx, block_rx) = match self.config.queue_capacity {
            Some(bound) => crossbeam_channel::bounded(bound),
            None => crossbeam_channel::unbounded(),
        };

        // Sync oneshot: the producer thread signals source open success or
        // failure before entering its loop.
        let (open_tx, open_rx) = std::sync::mpsc::channel::<Result<()>>();
        // Second gate: blocks are produced only once the engine is warm, so
        // short sources cannot finish before the session reports Listening.
        let (go_tx, go_rx) = std::sync::mpsc::channel::<()>();

        let producer = {
            let running = Arc::clone(&self.running);
            let sink = Arc::clone(&self.sink);
            let block_size = self.config.block_size;
            std::thread::Builder::new()
                .name("livecap-producer".into())
                .spawn(move || {
                    // Source opens on THIS thread; capture handles must not
                    // cross thread boundaries.
                    let source = match make_source() {
                        Ok(s) => {
                            let _ = open_tx.send(Ok(()));
                            s
                        }
                        Err(e) => {
                            let _ = open_tx.send(Err(e));
                            return;
                        }
                    };
                    // A dropped sender means startup failed after the open.
                    if go_rx.recv().is_err() {
                        return;
                    }
                    pipeline::produce(source, block_tx, running, sink, block_size);
                })
                .map_err(|e| CaptionError::Other(anyhow::anyhow!("spawn producer: {e}")))?
        };

        match open_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                self.fail(&e);
                let _ = producer.join();
                return Err(e);
            }
            Err(_) => {
                // Channel closed without a verdict: the producer panicked.
                let e = CaptionError::Other(anyhow::anyhow!("producer thread died during open"));
                self.fail(&e);
                let _ = producer.join();
                return Err(e);
            }
        }

        self.set_status(WorkerStatus::Initializing, Some("Loading speech model..."));
        if let Err(e) = self.engine.0.lock().warm_up() {
            self.fail(&e);
            drop(go_tx);
            let _ = producer.join();
            return Err(e);
        }

        self.set_status(WorkerStatus::Listening, Some("Ready. Listening..."));
        let _ = go_tx.send(());
        info!("caption session started");

        pipeline::run(pipeline::PipelineContext {
            config: self.config.clone(),
            engine: self.engine.clone(),
            blocks: block_rx,
            running: Arc::clone(&self.running),
            sink: Arc::clone(&self.sink),
            status: Arc::clone(&self.status),
        });

        self.running.store(false, Ordering::SeqCst);
        let _ = producer.join();
        self.set_status(WorkerStatus::Stopped, Some("Stopped."));
        info!("caption session ended");
        Ok(())
    }

    /// Request the session to stop. Returns once the flag is set; the
    /// session thread winds down shortly after.
    ///
    /// # Errors
    /// - [`CaptionError::NotRunning`] if no session is active.
    pub fn stop(&self) -> Result<()> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(CaptionError::NotRunning);
        }
        self.running.store(false, Ordering::SeqCst);
        info!("session stop requested");
        Ok(())
    }

    /// Current status (snapshot).
    pub fn status(&self) -> WorkerStatus {
        *self.status.lock()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    fn set_status(&self, status: WorkerStatus, text: Option<&str>) {
        *self.status.lock() = status;
        if let Some(text) = text {
            self.sink.emit(Event::status(text));
        }
    }

    fn fail(&self, error: &CaptionError) {
        self.running.store(false, Ordering::SeqCst);
        *self.status.lock() = WorkerStatus::Error;
        self.sink.emit(Event::error(error.to_string()));
    }
}
