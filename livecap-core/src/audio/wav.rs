//! WAV file audio source.

use std::path::Path;

use hound::{SampleFormat, WavReader};
use tracing::info;

use super::{AudioBlock, AudioSource};
use crate::error::{CaptionError, Result};

/// Replays a WAV file as fixed-size blocks at the file's own rate.
///
/// Multi-channel files are downmixed to mono and integer PCM is normalized
/// to [-1.0, 1.0]. The whole file decodes up front, so this source suits
/// offline runs and tests rather than hour-long recordings.
pub struct WavFileSource {
    samples: Vec<f32>,
    sample_rate: u32,
    cursor: usize,
}

impl WavFileSource {
    pub fn open(path: &Path) -> Result<Self> {
        let reader = WavReader::open(path)
            .map_err(|e| CaptionError::AudioSource(format!("open {}: {e}", path.display())))?;
        let spec = reader.spec();
        let channels = spec.channels as usize;
        let sample_rate = spec.sample_rate;

        let decode_err =
            |e: hound::Error| CaptionError::AudioSource(format!("decode {}: {e}", path.display()));
        let interleaved: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
            (SampleFormat::Float, _) => reader
                .into_samples::<f32>()
                .collect::<std::result::Result<_, _>>()
                .map_err(decode_err)?,
            (SampleFormat::Int, 16) => reader
                .into_samples::<i16>()
                .map(|s| s.map(|v| v as f32 / 32768.0))
                .collect::<std::result::Result<_, _>>()
                .map_err(decode_err)?,
            (SampleFormat::Int, bits) => {
                let scale = (1i64 << (bits - 1)) as f32;
                reader
                    .into_samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / scale))
                    .collect::<std::result::Result<_, _>>()
                    .map_err(decode_err)?
            }
        };

        let samples = if channels <= 1 {
            interleaved
        } else {
            interleaved
                .chunks_exact(channels)
                .map(|frame| frame.iter().sum::<f32>() / channels as f32)
                .collect()
        };

        info!(
            path = %path.display(),
            sample_rate,
            channels,
            samples = samples.len(),
            "loaded wav source"
        );

        Ok(Self {
            samples,
            sample_rate,
            cursor: 0,
        })
    }

    /// The file's native sample rate; the worker configures the pipeline to
    /// match it.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl AudioSource for WavFileSource {
    fn next_block(&mut self, block_size: usize) -> Result<Option<AudioBlock>> {
        if self.cursor >= self.samples.len() {
            return Ok(None);
        }
        let end = (self.cursor + block_size).min(self.samples.len());
        let block = self.samples[self.cursor..end].to_vec();
        self.cursor = end;
        Ok(Some(AudioBlock::new(block, self.sample_rate)))
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use hound::{WavSpec, WavWriter};

    use super::*;

    fn write_stereo_i16(path: &Path, frames: &[(i16, i16)]) {
        let spec = WavSpec {
            channels: 2,
            sample_rate: 16_000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(path, spec).unwrap();
        for (left, right) in frames {
            writer.write_sample(*left).unwrap();
            writer.write_sample(*right).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn stereo_pcm_is_downmixed_and_normalized() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        write_stereo_i16(&path, &[(16384, 16384), (16384, -16384), (-32768, -32768)]);

        let source = WavFileSource::open(&path).unwrap();
        assert_eq!(source.sample_rate(), 16_000);
        assert_eq!(source.samples.len(), 3);
        assert_relative_eq!(source.samples[0], 0.5, epsilon = 1e-3);
        assert_relative_eq!(source.samples[1], 0.0, epsilon = 1e-3);
        assert_relative_eq!(source.samples[2], -1.0, epsilon = 1e-3);
    }

    #[test]
    fn blocks_come_out_fixed_size_with_a_short_tail() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mono.wav");
        let spec = WavSpec {
            channels: 1,
            sample_rate: 8_000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        for i in 0..10i16 {
            writer.write_sample(i * 100).unwrap();
        }
        writer.finalize().unwrap();

        let mut source = WavFileSource::open(&path).unwrap();
        let first = source.next_block(4).unwrap().unwrap();
        assert_eq!(first.len(), 4);
        assert_eq!(first.sample_rate, 8_000);
        let second = source.next_block(4).unwrap().unwrap();
        assert_eq!(second.len(), 4);
        let tail = source.next_block(4).unwrap().unwrap();
        assert_eq!(tail.len(), 2);
        assert!(source.next_block(4).unwrap().is_none(), "stream must end");
        assert!(source.next_block(4).unwrap().is_none(), "end is sticky");
    }

    #[test]
    fn float_files_pass_through_unscaled() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("float.wav");
        let spec = WavSpec {
            channels: 1,
            sample_rate: 16_000,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        for v in [0.25f32, -0.75, 1.0] {
            writer.write_sample(v).unwrap();
        }
        writer.finalize().unwrap();

        let source = WavFileSource::open(&path).unwrap();
        assert_eq!(source.samples, vec![0.25, -0.75, 1.0]);
    }
}
