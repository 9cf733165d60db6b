//! Headless caption worker.
//!
//! Speaks the line protocol on stdout: one JSON event per line (`text`,
//! `status`, `error`, `log`). A hosting GUI spawns this binary, reads
//! stdout, and sends SIGINT (or closes stdin and kills) to stop. Run from
//! a terminal it behaves like a plain CLI tool: events still go to stdout
//! while logs render human-readable on stderr.

mod logging;

use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use livecap_core::{
    hardware::{self, ModelSize},
    select_engine_settings, CaptionWorker, EngineHandle, Event, EventSink, JsonLineSink,
    SelectionOverrides, Task, WorkerConfig,
};
use tracing::{info, warn};

/// Live captions for whatever the machine is playing.
#[derive(Parser, Debug)]
#[command(
    name = "livecap",
    version,
    about = "Streaming live captions from system audio"
)]
struct Cli {
    /// Spoken language hint (ISO 639-1, e.g. en, de). Default: auto-detect
    #[arg(long, value_name = "LANG")]
    language: Option<String>,

    /// Model size override (tiny, base, small, medium, large-v3)
    #[arg(long, value_name = "SIZE")]
    model: Option<String>,

    /// Force CPU inference even when a CUDA device is available
    #[arg(long)]
    force_cpu: bool,

    /// RAM to assume for CPU model sizing, in GiB
    #[arg(long, value_name = "GIB")]
    max_ram_gb: Option<u64>,

    /// What to produce: transcribe (source language) or translate (English)
    #[arg(long, value_name = "TASK", default_value = "translate")]
    task: String,

    /// Capture device name override
    #[arg(long, value_name = "DEVICE")]
    device: Option<String>,

    /// Capture a microphone instead of system audio
    #[arg(long)]
    microphone: bool,

    /// Caption a WAV file instead of live audio
    #[arg(long, value_name = "FILE")]
    wav: Option<PathBuf>,

    /// Directory holding ggml model files. Default: the platform data dir
    #[arg(long, value_name = "DIR")]
    models_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let sink: Arc<dyn EventSink> = Arc::new(JsonLineSink::stdout());
    if std::io::stdout().is_terminal() {
        logging::init(None);
    } else {
        // GUI-hosted: stderr goes nowhere useful, bridge logs onto the
        // protocol stream instead.
        logging::init(Some(Arc::clone(&sink)));
    }

    let task: Task = cli.task.parse().map_err(anyhow::Error::msg)?;
    let model_override: Option<ModelSize> = match cli.model.as_deref() {
        Some(raw) => Some(raw.parse().map_err(anyhow::Error::msg)?),
        None => None,
    };

    let profile = hardware::probe();
    if profile.amd_detected && !profile.cuda_available() {
        let notice = "AMD GPU detected, but GPU acceleration is not supported. \
                      Falling back to CPU for transcription.";
        warn!("{notice}");
        sink.emit(Event::status(notice));
    }

    let settings = select_engine_settings(
        &profile,
        &SelectionOverrides {
            force_cpu: cli.force_cpu,
            model: model_override,
            max_ram_gb: cli.max_ram_gb,
        },
    );
    info!(
        device = %settings.device,
        precision = %settings.precision,
        model = %settings.model,
        beam_size = settings.beam_size,
        "engine settings selected"
    );

    let mut config = WorkerConfig {
        language: cli.language.clone(),
        task,
        ..WorkerConfig::default()
    };

    // A WAV file fixes the session rate; live capture resamples to the
    // default instead.
    if let Some(path) = &cli.wav {
        let probe = livecap_core::audio::wav::WavFileSource::open(path)
            .with_context(|| format!("open {}", path.display()))?;
        config.sample_rate = probe.sample_rate();
    }

    let make_source = source_factory(&cli, config.sample_rate)?;
    let engine = build_engine(settings, cli.models_dir.clone(), &sink);

    let worker = Arc::new(CaptionWorker::new(config, engine, Arc::clone(&sink)));

    let mut session = {
        let worker = Arc::clone(&worker);
        tokio::task::spawn_blocking(move || worker.run(make_source))
    };

    tokio::select! {
        result = &mut session => {
            result.context("session thread panicked")??;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("interrupt received, stopping session");
            if let Err(e) = worker.stop() {
                warn!(error = %e, "stop after interrupt");
            }
            session.await.context("session thread panicked")??;
        }
    }

    Ok(())
}

/// Build the deferred source constructor the worker invokes on its
/// producer thread.
fn source_factory(
    cli: &Cli,
    sample_rate: u32,
) -> anyhow::Result<livecap_core::audio::SourceFactory> {
    use livecap_core::audio::AudioSource;

    if let Some(path) = cli.wav.clone() {
        return Ok(Box::new(move || {
            livecap_core::audio::wav::WavFileSource::open(&path)
                .map(|s| Box::new(s) as Box<dyn AudioSource>)
        }));
    }

    #[cfg(feature = "audio-cpal")]
    {
        use livecap_core::audio::capture::CaptureSource;
        use livecap_core::audio::device::CapturePreference;

        let preference = if cli.microphone {
            CapturePreference::Microphone
        } else {
            CapturePreference::SystemAudio
        };
        let name = cli.device.clone();
        Ok(Box::new(move || {
            CaptureSource::open(sample_rate, name.as_deref(), preference)
                .map(|s| Box::new(s) as Box<dyn AudioSource>)
        }))
    }

    #[cfg(not(feature = "audio-cpal"))]
    {
        let _ = sample_rate;
        anyhow::bail!("this build has no live capture; pass --wav FILE")
    }
}

/// Pick the transcription backend for this build.
#[cfg(feature = "whisper")]
fn build_engine(
    settings: livecap_core::EngineSettings,
    models_dir: Option<PathBuf>,
    sink: &Arc<dyn EventSink>,
) -> EngineHandle {
    use livecap_core::transcribe::stub::StubEngine;
    use livecap_core::{WhisperEngine, WhisperEngineConfig};

    let config = WhisperEngineConfig::resolve(settings, models_dir);
    if !config.model_path.exists() {
        warn!(
            model_path = %config.model_path.display(),
            "model file not found, captions will be stubbed"
        );
        sink.emit(Event::status(
            "Speech model unavailable; emitting stub captions.",
        ));
        return EngineHandle::new(StubEngine::new());
    }
    info!(model_path = %config.model_path.display(), "speech model selected");
    EngineHandle::new(WhisperEngine::new(config))
}

#[cfg(not(feature = "whisper"))]
fn build_engine(
    _settings: livecap_core::EngineSettings,
    _models_dir: Option<PathBuf>,
    sink: &Arc<dyn EventSink>,
) -> EngineHandle {
    use livecap_core::transcribe::stub::StubEngine;

    warn!("built without the whisper feature, captions will be stubbed");
    sink.emit(Event::status(
        "Speech model unavailable; emitting stub captions.",
    ));
    EngineHandle::new(StubEngine::new())
}
