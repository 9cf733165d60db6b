//! Sample-rate conversion on the producer thread.
//!
//! Capture runs at the device's native rate (commonly 48 kHz); the pipeline
//! wants 16 kHz mono. [`BlockResampler`] bridges the gap with a rubato
//! `FastFixedIn` session, accumulating partial chunks between calls. Equal
//! rates skip rubato entirely.

use rubato::{FastFixedIn, PolynomialDegree, Resampler};
use tracing::{debug, error};

use crate::error::{CaptionError, Result};

/// Input frames handed to rubato per process call.
const CHUNK_FRAMES: usize = 1024;

/// Converts f32 mono audio from one fixed rate to another.
pub struct BlockResampler {
    /// `None` when input rate == output rate.
    session: Option<FastFixedIn<f32>>,
    /// Partial input kept between calls.
    backlog: Vec<f32>,
    /// Pre-allocated rubato output: `[1][output_frames_max]`.
    out_buf: Vec<Vec<f32>>,
}

impl BlockResampler {
    pub fn new(input_rate: u32, output_rate: u32) -> Result<Self> {
        if input_rate == output_rate {
            return Ok(Self {
                session: None,
                backlog: Vec::new(),
                out_buf: Vec::new(),
            });
        }

        let ratio = output_rate as f64 / input_rate as f64;
        let session = FastFixedIn::<f32>::new(
            ratio,
            1.0, // fixed ratio, no dynamic adjustment
            PolynomialDegree::Cubic,
            CHUNK_FRAMES,
            1, // mono
        )
        .map_err(|e| CaptionError::AudioSource(format!("resampler init: {e}")))?;

        let out_buf = vec![vec![0f32; session.output_frames_max()]];
        debug!(input_rate, output_rate, "resampling enabled");

        Ok(Self {
            session: Some(session),
            backlog: Vec::new(),
            out_buf,
        })
    }

    /// Feed `input`, appending whatever converted audio is ready to `out`.
    ///
    /// Input shorter than the rubato chunk accumulates until a later call
    /// completes it. Equal rates copy straight through.
    pub fn process(&mut self, input: &[f32], out: &mut Vec<f32>) {
        let Some(ref mut session) = self.session else {
            out.extend_from_slice(input);
            return;
        };

        self.backlog.extend_from_slice(input);
        while self.backlog.len() >= CHUNK_FRAMES {
            let chunk = &self.backlog[..CHUNK_FRAMES];
            match session.process_into_buffer(&[chunk], &mut self.out_buf, None) {
                Ok((_consumed, produced)) => {
                    out.extend_from_slice(&self.out_buf[0][..produced]);
                }
                Err(e) => {
                    error!("resampler process error: {e}");
                }
            }
            self.backlog.drain(..CHUNK_FRAMES);
        }
    }

    /// `true` when input rate == output rate and nothing is converted.
    pub fn is_passthrough(&self) -> bool {
        self.session.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_rates_pass_samples_through_untouched() {
        let mut rs = BlockResampler::new(16_000, 16_000).unwrap();
        assert!(rs.is_passthrough());

        let samples: Vec<f32> = (0..480).map(|i| i as f32 * 0.001).collect();
        let mut out = Vec::new();
        rs.process(&samples, &mut out);
        assert_eq!(out, samples);
    }

    #[test]
    fn downsampling_48k_to_16k_thirds_the_length() {
        let mut rs = BlockResampler::new(48_000, 16_000).unwrap();
        assert!(!rs.is_passthrough());

        let mut out = Vec::new();
        rs.process(&vec![0.0f32; 3 * CHUNK_FRAMES], &mut out);
        let expected = CHUNK_FRAMES as isize; // 3072 in → ~1024 out
        assert!(
            (out.len() as isize - expected).unsigned_abs() <= 32,
            "output len={} expected≈{}",
            out.len(),
            expected
        );
    }

    #[test]
    fn short_input_accumulates_until_a_chunk_completes() {
        let mut rs = BlockResampler::new(48_000, 16_000).unwrap();

        let mut out = Vec::new();
        rs.process(&vec![0.0f32; CHUNK_FRAMES / 2], &mut out);
        assert!(out.is_empty(), "half a chunk should produce nothing yet");

        rs.process(&vec![0.0f32; CHUNK_FRAMES / 2 + 16], &mut out);
        assert!(!out.is_empty(), "completing the chunk should produce output");
    }
}
