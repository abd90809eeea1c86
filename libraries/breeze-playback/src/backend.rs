//! Player and stream resolver abstractions
//!
//! Platform-specific code (the actual audio player, the URL extractor) is
//! plugged in through these traits.

use crate::error::{PlaybackError, Result};
use crate::types::ResolvedTrack;
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

/// Audio player the engine drives
///
/// Positions and seek targets are seconds from the start of the loaded media.
#[async_trait]
pub trait PlayerBackend: Send {
    /// Replace the loaded media; the player is left paused
    async fn load(&mut self, stream_url: &str) -> Result<()>;

    async fn play(&mut self) -> Result<()>;

    async fn pause(&mut self) -> Result<()>;

    /// Unload media
    async fn stop(&mut self) -> Result<()>;

    async fn seek(&mut self, seconds: f64) -> Result<()>;

    /// Volume in 0..=100
    async fn set_volume(&mut self, level: u8) -> Result<()>;

    async fn position(&mut self) -> Result<f64>;
}

/// Turns a source URL into track metadata and a playable stream
#[async_trait]
pub trait StreamResolver: Send + Sync {
    async fn resolve(&self, url: &str) -> Result<ResolvedTrack>;

    /// Fresh stream URL for playback
    async fn stream_url(&self, url: &str) -> Result<String> {
        Ok(self.resolve(url).await?.stream_url)
    }
}

/// Asynchronous notifications from the player
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerEvent {
    /// Media finished playing
    EndReached,

    /// Player failed on the current media
    Error(String),
}

/// Run an external call with an upper bound
pub async fn with_timeout<T, F>(operation: &'static str, limit: Duration, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(PlaybackError::Timeout {
            operation,
            after: limit,
        }),
    }
}
