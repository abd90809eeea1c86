/// Daemon error types
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DaemonError>;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Weather API error: {0}")]
    Weather(String),

    #[error("Process error: {0}")]
    Process(String),

    #[error("Player IPC error: {0}")]
    Ipc(String),

    #[error("Playback error: {0}")]
    Playback(#[from] breeze_playback::PlaybackError),

    #[error("Ambient error: {0}")]
    Ambient(#[from] breeze_ambient::AmbientError),
}

impl From<config::ConfigError> for DaemonError {
    fn from(err: config::ConfigError) -> Self {
        DaemonError::Config(err.to_string())
    }
}
