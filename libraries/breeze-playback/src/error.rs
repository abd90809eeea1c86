//! Error types for playback management

use std::time::Duration;
use thiserror::Error;

/// Playback errors
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// No track is currently loaded
    #[error("No track loaded")]
    NoTrackLoaded,

    /// Stream resolver failed to produce metadata or a stream URL
    #[error("Resolve error: {0}")]
    Resolve(String),

    /// Player backend rejected or failed a command
    #[error("Player error: {0}")]
    Player(String),

    /// An external call did not finish in time
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },
}

impl PlaybackError {
    /// Whether the failure came from an external collaborator
    ///
    /// Transient errors are logged and the affected track is dropped;
    /// `NoTrackLoaded` is a state violation and leaves everything unchanged.
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::NoTrackLoaded)
    }
}

/// Result type for playback operations
pub type Result<T> = std::result::Result<T, PlaybackError>;
