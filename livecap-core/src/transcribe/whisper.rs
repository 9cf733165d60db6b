//! whisper.cpp backend via the whisper-rs crate.
//!
//! ## Model files
//!
//! Models are standard ggml files (`ggml-<size>.bin`, with the `-q8_0`
//! quantized variant preferred for int8 runs). Resolution order: explicit
//! path, then `LIVECAP_MODELS_DIR`, then the platform data directory.

use std::path::PathBuf;
use std::sync::Once;

use tracing::{debug, info};
use whisper_rs::{
    install_logging_hooks, FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters,
};

use super::{SpeechToText, Task};
use crate::error::{CaptionError, Result};
use crate::hardware::{ComputePrecision, DeviceKind, EngineSettings};

static LOGGING_HOOKS: Once = Once::new();

/// Windows whose RMS falls below this are treated as silence when VAD
/// filtering is on.
const SPEECH_RMS_THRESHOLD: f32 = 0.01;

/// Configuration for the whisper.cpp engine.
#[derive(Debug, Clone)]
pub struct WhisperEngineConfig {
    /// Path to the ggml model file.
    pub model_path: PathBuf,
    /// Device, precision, beam and VAD selection.
    pub settings: EngineSettings,
    /// Inference threads (`None` = whisper.cpp's own default).
    pub threads: Option<usize>,
}

impl WhisperEngineConfig {
    /// Build a config whose model path follows the settings: the tier picks
    /// the file name, int8 precision prefers the quantized variant, and
    /// `models_dir` (or its defaults) picks the directory.
    pub fn resolve(settings: EngineSettings, models_dir: Option<PathBuf>) -> Self {
        let dir = models_dir.unwrap_or_else(selected_models_dir);
        let plain = dir.join(format!("ggml-{}.bin", settings.model));
        let model_path = match settings.precision {
            ComputePrecision::Int8 => {
                let quantized = dir.join(format!("ggml-{}-q8_0.bin", settings.model));
                // The plain file still serves int8 runs when no quantized
                // variant is installed.
                if quantized.exists() {
                    quantized
                } else {
                    plain
                }
            }
            ComputePrecision::Float16 => plain,
        };
        Self {
            model_path,
            settings,
            threads: None,
        }
    }
}

fn selected_models_dir() -> PathBuf {
    if let Ok(explicit) = std::env::var("LIVECAP_MODELS_DIR") {
        let trimmed = explicit.trim();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed);
        }
    }
    default_models_dir()
}

/// Platform data directory for ggml model files.
pub fn default_models_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA")
            .map(|p| PathBuf::from(p).join("livecap").join("models"))
            .unwrap_or_else(|| PathBuf::from("models"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var_os("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                std::env::var_os("HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("/tmp"))
                    .join(".local")
                    .join("share")
            })
            .join("livecap")
            .join("models")
    }
}

/// whisper.cpp implementation of [`SpeechToText`].
///
/// The context loads in `warm_up`, not in `new`, so construction stays
/// cheap and a missing model file surfaces as an initialization error at
/// session start.
pub struct WhisperEngine {
    config: WhisperEngineConfig,
    ctx: Option<WhisperContext>,
}

impl WhisperEngine {
    pub fn new(config: WhisperEngineConfig) -> Self {
        Self { config, ctx: None }
    }

    pub fn config(&self) -> &WhisperEngineConfig {
        &self.config
    }

    fn rms(samples: &[f32]) -> f32 {
        if samples.is_empty() {
            return 0.0;
        }
        let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
        (sum_sq / samples.len() as f32).sqrt()
    }
}

impl std::fmt::Debug for WhisperEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhisperEngine")
            .field("config", &self.config)
            .field("loaded", &self.ctx.is_some())
            .finish()
    }
}

impl SpeechToText for WhisperEngine {
    fn warm_up(&mut self) -> Result<()> {
        if self.ctx.is_some() {
            return Ok(());
        }
        // Route whisper.cpp's stderr chatter through tracing, once per
        // process.
        LOGGING_HOOKS.call_once(install_logging_hooks);

        let path = &self.config.model_path;
        if !path.exists() {
            return Err(CaptionError::ModelNotFound { path: path.clone() });
        }
        let path_str = path.to_str().ok_or_else(|| {
            CaptionError::EngineInit(format!("non-UTF-8 model path: {}", path.display()))
        })?;

        let mut ctx_params = WhisperContextParameters::default();
        ctx_params.use_gpu(self.config.settings.device == DeviceKind::Cuda);

        info!(
            model = %path.display(),
            device = %self.config.settings.device,
            beam_size = self.config.settings.beam_size,
            "loading whisper model"
        );
        let ctx = WhisperContext::new_with_params(path_str, ctx_params)
            .map_err(|e| CaptionError::EngineInit(format!("failed to load whisper model: {e}")))?;
        self.ctx = Some(ctx);
        Ok(())
    }

    fn transcribe(
        &mut self,
        samples: &[f32],
        language: Option<&str>,
        task: Task,
    ) -> Result<String> {
        let ctx = self
            .ctx
            .as_ref()
            .ok_or_else(|| CaptionError::EngineInit("whisper context not warmed up".into()))?;

        if self.config.settings.vad_filter && Self::rms(samples) < SPEECH_RMS_THRESHOLD {
            debug!("window below speech energy threshold, skipping inference");
            return Ok(String::new());
        }

        let mut state = ctx
            .create_state()
            .map_err(|e| CaptionError::Transcription(format!("create state: {e}")))?;

        let strategy = if self.config.settings.beam_size > 1 {
            SamplingStrategy::BeamSearch {
                beam_size: self.config.settings.beam_size as i32,
                patience: -1.0,
            }
        } else {
            SamplingStrategy::Greedy { best_of: 1 }
        };
        let mut params = FullParams::new(strategy);
        // None lets whisper.cpp auto-detect the spoken language.
        params.set_language(language);
        params.set_translate(task == Task::Translate);
        if let Some(threads) = self.config.threads {
            params.set_n_threads(threads as i32);
        }
        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);

        state
            .full(params, samples)
            .map_err(|e| CaptionError::Transcription(format!("inference failed: {e}")))?;

        let mut text = String::new();
        for segment in state.as_iter() {
            text.push_str(&segment.to_string());
        }
        Ok(text.trim().to_string())
    }
}
