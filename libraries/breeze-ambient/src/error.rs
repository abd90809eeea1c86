//! Error types for context classification and selection

use breeze_playback::PlaybackError;
use thiserror::Error;

/// A raw context sample that cannot be mapped onto a bucket
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassifyError {
    #[error("Weather condition is empty")]
    EmptyWeather,

    #[error("Unknown weather condition: {0}")]
    UnknownWeather(String),

    #[error("Unknown time of day: {0}")]
    UnknownTimeOfDay(String),
}

#[derive(Debug, Error)]
pub enum AmbientError {
    #[error("Classification failed: {0}")]
    Classify(#[from] ClassifyError),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Context source error: {0}")]
    Source(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Playback error: {0}")]
    Playback(#[from] PlaybackError),
}

pub type Result<T> = std::result::Result<T, AmbientError>;
