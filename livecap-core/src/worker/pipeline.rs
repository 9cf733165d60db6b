//! Blocking producer/consumer loops.
//!
//! ## Data flow
//!
//! ```text
//! producer thread                 consumer (pipeline::run)
//! ───────────────                 ────────────────────────
//! source.next_block()             recv_timeout(100 ms)
//!   └─► blocks channel ──────────►  └─► SlidingWindow::extend
//!                                       └─► take_window?
//!                                           └─► engine.transcribe
//!                                               └─► unique_suffix
//!                                                   └─► Event::Text
//! ```
//!
//! The consumer polls the queue with a short timeout so a cleared `running`
//! flag is noticed within 100 ms even when no audio arrives. When the
//! producer ends (stream end or source failure) it drops its sender; the
//! consumer keeps receiving until the queue is drained, then exits on
//! disconnect. Nothing already captured is lost.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::{
    audio::{AudioBlock, AudioSource},
    ipc::{Event, EventSink},
    text::{unique_suffix, TranscriptState},
    transcribe::EngineHandle,
    window::SlidingWindow,
    worker::{WorkerConfig, WorkerStatus},
};

/// Queue poll interval. Bounds how long a stop request can go unnoticed
/// while the queue is empty.
const QUEUE_POLL: Duration = Duration::from_millis(100);

/// All context the consumer loop needs, passed as one struct so the
/// hosting thread closure stays tidy.
pub struct PipelineContext {
    pub config: WorkerConfig,
    pub engine: EngineHandle,
    pub blocks: Receiver<AudioBlock>,
    pub running: Arc<AtomicBool>,
    pub sink: Arc<dyn EventSink>,
    pub status: Arc<Mutex<WorkerStatus>>,
}

enum WindowOutcome {
    Emitted,
    Silent,
    Failed,
}

/// Run the consumer loop until `running` clears or the block queue
/// disconnects and drains.
pub fn run(ctx: PipelineContext) {
    let mut window = SlidingWindow::new(ctx.config.window_size(), ctx.config.overlap_size());
    let mut transcript = TranscriptState::new(ctx.config.newline_interval);

    let mut windows_processed = 0usize;
    let mut captions_emitted = 0usize;
    let mut inference_errors = 0usize;

    info!(
        window_samples = ctx.config.window_size(),
        overlap_samples = ctx.config.overlap_size(),
        "caption pipeline started"
    );

    while ctx.running.load(Ordering::Relaxed) {
        let block = match ctx.blocks.recv_timeout(QUEUE_POLL) {
            Ok(block) => block,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        window.extend(&block.samples);
        if let Some(samples) = window.take_window() {
            windows_processed += 1;
            match transcribe_window(&ctx, &samples, &mut transcript) {
                WindowOutcome::Emitted => captions_emitted += 1,
                WindowOutcome::Silent => {}
                WindowOutcome::Failed => inference_errors += 1,
            }
        }
    }

    info!(
        windows_processed,
        captions_emitted, inference_errors, "caption pipeline stopped"
    );
}

fn transcribe_window(
    ctx: &PipelineContext,
    samples: &[f32],
    transcript: &mut TranscriptState,
) -> WindowOutcome {
    set_status(ctx, WorkerStatus::Processing);

    // No deadline applies here: a hung engine stalls caption output until
    // the call returns.
    let result = {
        let mut engine = ctx.engine.0.lock();
        engine.transcribe(samples, ctx.config.language.as_deref(), ctx.config.task)
    };

    let outcome = match result {
        Ok(text) => {
            if transcript.maybe_reset() {
                debug!("idle gap exceeded the newline interval; starting a fresh line");
            }
            let text = text.trim();
            if text.is_empty() {
                WindowOutcome::Silent
            } else {
                let fresh = unique_suffix(transcript.last_full_text(), text);
                if fresh.is_empty() {
                    debug!("window repeated already-emitted text");
                    WindowOutcome::Silent
                } else {
                    ctx.sink.emit(Event::text(fresh));
                    transcript.commit(text.to_string());
                    WindowOutcome::Emitted
                }
            }
        }
        Err(e) => {
            warn!(error = %e, "transcription failed; continuing");
            ctx.sink.emit(Event::error(e.to_string()));
            WindowOutcome::Failed
        }
    };

    set_status(ctx, WorkerStatus::Listening);
    outcome
}

fn set_status(ctx: &PipelineContext, status: WorkerStatus) {
    *ctx.status.lock() = status;
}

/// Run the producer loop: pull fixed-size blocks from the source and feed
/// the queue until `running` clears, the stream ends, or the source fails.
///
/// Runs on the dedicated producer thread. The sender drops on return,
/// which is how the consumer learns the stream is over.
pub fn produce(
    mut source: Box<dyn AudioSource>,
    blocks: Sender<AudioBlock>,
    running: Arc<AtomicBool>,
    sink: Arc<dyn EventSink>,
    block_size: usize,
) {
    debug!(block_size, "audio producer started");
    while running.load(Ordering::Relaxed) {
        match source.next_block(block_size) {
            Ok(Some(block)) => {
                if blocks.send(block).is_err() {
                    // Consumer gone.
                    break;
                }
            }
            Ok(None) => {
                info!("audio source ended");
                sink.emit(Event::status("Audio stream ended."));
                break;
            }
            Err(e) => {
                error!(error = %e, "audio source failed");
                sink.emit(Event::error(e.to_string()));
                break;
            }
        }
    }
    debug!("audio producer exiting");
}
