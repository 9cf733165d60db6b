//! Live capture through cpal.
//!
//! # Design constraints
//!
//! The cpal input callback runs on an OS audio thread at elevated priority
//! (TIME_CRITICAL on Windows). It **must not**:
//! - Allocate heap memory after the stream starts
//! - Block on a mutex or condvar
//! - Perform I/O
//!
//! The callback therefore only downmixes into a reused scratch buffer and
//! `push_slice`s into a lock-free SPSC ring. Resampling and block assembly
//! happen on the producer thread in [`AudioSource::next_block`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{Device, FromSample, Sample, SampleFormat, SampleRate, SizedSample, Stream, StreamConfig};
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use tracing::{error, info, warn};

use super::device::{choose_input_device, CapturePreference};
use super::resample::BlockResampler;
use super::{AudioBlock, AudioSource};
use crate::error::{CaptionError, Result};

/// Ring capacity: 2^20 f32 samples ≈ 21.8 s at 48 kHz. Rides out a slow
/// transcription pass without the callback dropping frames.
const RING_CAPACITY: usize = 1 << 20;

/// How long `next_block` sleeps when the ring is empty.
const EMPTY_RING_BACKOFF: Duration = Duration::from_millis(5);

/// Live capture source over a cpal input stream.
///
/// **Not `Send`**: the stream is bound to its creation thread on
/// Windows/macOS, which is why the worker opens sources through a
/// [`SourceFactory`](super::SourceFactory) on the producer thread itself.
pub struct CaptureSource {
    /// Kept alive so the stream is not dropped while capturing.
    _stream: Stream,
    ring: HeapCons<f32>,
    resampler: BlockResampler,
    /// Set by the cpal error callback; surfaces as an error on the next pull.
    stream_failed: Arc<AtomicBool>,
    pending: Vec<f32>,
    scratch: Vec<f32>,
    target_rate: u32,
}

impl CaptureSource {
    /// Open an input device and start capturing at its native config,
    /// converting to mono `target_rate` blocks on pull.
    pub fn open(
        target_rate: u32,
        preferred_name: Option<&str>,
        preference: CapturePreference,
    ) -> Result<Self> {
        let device = choose_input_device(preferred_name, preference)?;
        let supported = device
            .default_input_config()
            .map_err(|e| CaptionError::AudioSource(e.to_string()))?;
        let device_rate = supported.sample_rate().0;
        let channels = supported.channels();
        info!(
            device = device.name().unwrap_or_default().as_str(),
            device_rate, channels, "opening capture stream"
        );

        let config = StreamConfig {
            channels,
            sample_rate: SampleRate(device_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let (producer, ring) = HeapRb::<f32>::new(RING_CAPACITY).split();
        let stream_failed = Arc::new(AtomicBool::new(false));

        let stream = match supported.sample_format() {
            SampleFormat::F32 => {
                build_stream::<f32>(&device, &config, producer, Arc::clone(&stream_failed))
            }
            SampleFormat::I16 => {
                build_stream::<i16>(&device, &config, producer, Arc::clone(&stream_failed))
            }
            SampleFormat::U16 => {
                build_stream::<u16>(&device, &config, producer, Arc::clone(&stream_failed))
            }
            SampleFormat::U8 => {
                build_stream::<u8>(&device, &config, producer, Arc::clone(&stream_failed))
            }
            fmt => Err(CaptionError::UnsupportedSampleFormat(format!("{fmt:?}"))),
        }?;

        stream
            .play()
            .map_err(|e| CaptionError::AudioSource(e.to_string()))?;

        Ok(Self {
            _stream: stream,
            ring,
            resampler: BlockResampler::new(device_rate, target_rate)?,
            stream_failed,
            pending: Vec::new(),
            scratch: vec![0f32; 4096],
            target_rate,
        })
    }
}

impl AudioSource for CaptureSource {
    fn next_block(&mut self, block_size: usize) -> Result<Option<AudioBlock>> {
        loop {
            if self.stream_failed.load(Ordering::Relaxed) {
                return Err(CaptionError::AudioSource(
                    "capture stream reported an error".into(),
                ));
            }
            if self.pending.len() >= block_size {
                let samples: Vec<f32> = self.pending.drain(..block_size).collect();
                return Ok(Some(AudioBlock::new(samples, self.target_rate)));
            }

            let popped = self.ring.pop_slice(&mut self.scratch);
            if popped == 0 {
                std::thread::sleep(EMPTY_RING_BACKOFF);
                continue;
            }
            self.resampler
                .process(&self.scratch[..popped], &mut self.pending);
        }
    }
}

/// Build the input stream for one concrete sample format: downmix to mono
/// f32 and hand off through the ring.
fn build_stream<T>(
    device: &Device,
    config: &StreamConfig,
    mut ring: HeapProd<f32>,
    failed: Arc<AtomicBool>,
) -> Result<Stream>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let channels = config.channels as usize;
    // Sized for the largest callback seen in practice; `resize` only
    // reallocates if a backend delivers more than this in one call.
    let mut mix_buf: Vec<f32> = Vec::with_capacity(8192);

    device
        .build_input_stream(
            config,
            move |data: &[T], _info: &cpal::InputCallbackInfo| {
                let frames = data.len() / channels;
                mix_buf.resize(frames, 0.0);
                if channels == 1 {
                    for (dst, s) in mix_buf.iter_mut().zip(data) {
                        *dst = f32::from_sample(*s);
                    }
                } else {
                    for (dst, frame) in mix_buf.iter_mut().zip(data.chunks_exact(channels)) {
                        let mut sum = 0f32;
                        for s in frame {
                            sum += f32::from_sample(*s);
                        }
                        *dst = sum / channels as f32;
                    }
                }
                let written = ring.push_slice(&mix_buf);
                if written < mix_buf.len() {
                    warn!(
                        "capture ring full: dropped {} frames",
                        mix_buf.len() - written
                    );
                }
            },
            move |err| {
                error!("capture stream error: {err}");
                failed.store(true, Ordering::Relaxed);
            },
            None,
        )
        .map_err(|e| CaptionError::AudioSource(e.to_string()))
}
