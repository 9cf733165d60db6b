//! Audio sources.
//!
//! The pipeline pulls mono f32 blocks through the [`AudioSource`] port.
//! Live capture ([`capture::CaptureSource`], feature `audio-cpal`) wraps a
//! cpal input stream; [`wav::WavFileSource`] replays a file for offline runs
//! and tests.
//!
//! # Threading note
//!
//! Capture handles are `!Send` on most platforms (COM on Windows, CoreAudio
//! on macOS), so sources are opened *on* the producer thread: the worker
//! takes a [`SourceFactory`] and invokes it after that thread starts.

#[cfg(feature = "audio-cpal")]
pub mod capture;
#[cfg(feature = "audio-cpal")]
pub mod device;
#[cfg(feature = "audio-cpal")]
pub mod resample;
pub mod wav;

use crate::error::Result;

/// A contiguous block of mono PCM samples at a known sample rate.
#[derive(Debug, Clone)]
pub struct AudioBlock {
    /// Mono f32 samples in [-1.0, 1.0].
    pub samples: Vec<f32>,
    /// Sample rate in Hz (e.g. 16000, 48000).
    pub sample_rate: u32,
}

impl AudioBlock {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Duration of this block in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Pull port the producer task drives.
///
/// `next_block` blocks until `block_size` samples are available, the stream
/// ends (`Ok(None)`), or the device fails. Implementations should return
/// within roughly one block duration; the worker's shutdown latency is
/// bounded by it.
pub trait AudioSource {
    fn next_block(&mut self, block_size: usize) -> Result<Option<AudioBlock>>;
}

/// Deferred source constructor, invoked on the producer thread.
pub type SourceFactory = Box<dyn FnOnce() -> Result<Box<dyn AudioSource>> + Send + 'static>;
