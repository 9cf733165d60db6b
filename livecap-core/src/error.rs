use thiserror::Error;

/// All errors produced by livecap-core.
#[derive(Debug, Error)]
pub enum CaptionError {
    #[error("audio source error: {0}")]
    AudioSource(String),

    #[error("no capture device found")]
    NoCaptureDevice,

    #[error("unsupported sample format: {0}")]
    UnsupportedSampleFormat(String),

    #[error("engine initialization error: {0}")]
    EngineInit(String),

    #[error("transcription error: {0}")]
    Transcription(String),

    #[error("worker is already running")]
    AlreadyRunning,

    #[error("worker is not running")]
    NotRunning,

    #[error("model file not found: {path}")]
    ModelNotFound { path: std::path::PathBuf },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, CaptionError>;
