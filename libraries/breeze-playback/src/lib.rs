//! Breeze - Playback Engine
//!
//! Queue and transport management for streamed tracks.
//!
//! This crate provides:
//! - A FIFO of pending tracks plus a single current track
//! - Transport control (play, pause, seek, volume, skip)
//! - Chapter navigation with a skip-back grace window
//! - A watchdog that advances the queue on completion, stalls and player errors
//! - A serializable status snapshot
//!
//! # Architecture
//!
//! The engine never talks to an audio device or the network directly. The
//! player and the URL extractor are provided via the [`PlayerBackend`] and
//! [`StreamResolver`] traits, and every call into them is bounded by a
//! timeout.
//!
//! # Example: Driving the engine
//!
//! ```rust,no_run
//! use breeze_playback::{shared, EngineConfig, PlaybackEngine, PlayerBackend, StreamResolver};
//! use std::sync::Arc;
//!
//! # async fn demo(player: Box<dyn PlayerBackend>, resolver: Arc<dyn StreamResolver>) -> breeze_playback::Result<()> {
//! let engine = shared(PlaybackEngine::new(EngineConfig::default(), player, resolver));
//!
//! breeze_playback::request_track(&engine, "https://example.com/watch?v=abc").await?;
//!
//! let mut engine = engine.lock().await;
//! engine.play().await?;
//! engine.skip_next_chapter().await?;
//! println!("{}", engine.status().elapsed);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

pub mod backend;
pub mod chapters;
pub mod engine;
pub mod error;
mod queue;
pub mod types;
pub mod watchdog;

pub use backend::{with_timeout, PlayerBackend, PlayerEvent, StreamResolver};
pub use chapters::{ChapterTarget, SKIP_BACK_GRACE_SECS};
pub use engine::{PlaybackEngine, TickOutcome};
pub use error::{PlaybackError, Result};
pub use queue::Queue;
pub use types::{
    Chapter, EngineConfig, EngineState, ResolvedTrack, StatusSnapshot, Track, TrackSummary,
};
pub use watchdog::{request_track, run_watchdog, shared, SharedEngine};
