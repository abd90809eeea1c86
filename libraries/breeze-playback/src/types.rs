//! Core types for playback management

use serde::{Deserialize, Serialize, Serializer};
use std::time::Duration;

/// A named marker inside a track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    /// Chapter title
    pub title: String,

    /// Offset from the start of the track, in seconds
    pub start_time: f64,

    /// End offset, when the source provides one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<f64>,
}

impl Chapter {
    pub fn new(title: impl Into<String>, start_time: f64) -> Self {
        Self {
            title: title.into(),
            start_time,
            end_time: None,
        }
    }
}

/// Metadata returned by a stream resolver for a source URL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedTrack {
    pub title: String,
    pub duration: f64,
    pub thumbnail: Option<String>,
    pub chapters: Vec<Chapter>,
    pub stream_url: String,
}

/// A playable item
///
/// Metadata is fixed once constructed. The stream URL is filled in when the
/// track is loaded into the player, since platform stream URLs expire.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    /// Source URL the track was requested by
    pub url: String,

    /// Display title
    pub title: String,

    /// Track duration in seconds (0 when unknown)
    pub duration: f64,

    /// Thumbnail URL (optional)
    pub thumbnail: Option<String>,

    /// Ready-to-stream audio URL, once resolved
    pub stream_url: Option<String>,

    chapters: Vec<Chapter>,
}

impl Track {
    /// Create a chapterless track
    pub fn new(url: impl Into<String>, title: impl Into<String>, duration: f64) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            duration: duration.max(0.0),
            thumbnail: None,
            stream_url: None,
            chapters: Vec::new(),
        }
    }

    /// Build a track from resolver output
    pub fn from_resolved(url: impl Into<String>, resolved: ResolvedTrack) -> Self {
        let mut track = Self::new(url, resolved.title, resolved.duration)
            .with_chapters(resolved.chapters);
        track.thumbnail = resolved.thumbnail;
        track.stream_url = Some(resolved.stream_url);
        track
    }

    /// Attach chapters
    ///
    /// Chapters are ordered by start time. Entries whose start is not finite,
    /// or not strictly after the previous chapter, are dropped.
    #[must_use]
    pub fn with_chapters(mut self, mut chapters: Vec<Chapter>) -> Self {
        chapters.retain(|c| c.start_time.is_finite() && c.start_time >= 0.0);
        chapters.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));
        chapters.dedup_by(|next, prev| next.start_time <= prev.start_time);
        self.chapters = chapters;
        self
    }

    #[must_use]
    pub fn with_thumbnail(mut self, thumbnail: impl Into<String>) -> Self {
        self.thumbnail = Some(thumbnail.into());
        self
    }

    pub fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    pub fn has_chapters(&self) -> bool {
        !self.chapters.is_empty()
    }

    /// End of chapter `index`: its own end time, else the next chapter's
    /// start, else the track duration
    pub fn chapter_end(&self, index: usize) -> Option<f64> {
        let chapter = self.chapters.get(index)?;
        Some(
            chapter
                .end_time
                .or_else(|| self.chapters.get(index + 1).map(|next| next.start_time))
                .unwrap_or(self.duration),
        )
    }

    /// Chapterless view used in status snapshots
    pub fn summary(&self) -> TrackSummary {
        TrackSummary {
            url: self.url.clone(),
            title: self.title.clone(),
            duration: self.duration,
            thumbnail: self.thumbnail.clone(),
        }
    }
}

/// Track description without chapters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackSummary {
    pub url: String,
    pub title: String,
    pub duration: f64,
    pub thumbnail: Option<String>,
}

/// Engine state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineState {
    /// No current track
    Empty,

    /// Popped from the queue, stream being resolved and loaded
    Loading,

    /// Current track is playing
    Playing,

    /// Current track is loaded but not playing
    Paused,
}

/// Configuration for the playback engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Initial volume (0-100, default: 80)
    pub volume: u8,

    /// Start playing a track loaded into an idle engine (default: false)
    pub autostart: bool,

    /// Watchdog tick interval (default: 500ms)
    pub watchdog_interval: Duration,

    /// How long elapsed may stay unchanged while playing (default: 10s)
    pub stuck_threshold: Duration,

    /// Remaining seconds at which a track counts as finished (default: 1.0)
    pub completion_margin: f64,

    /// Bound on stream resolution (default: 30s)
    pub resolve_timeout: Duration,

    /// Bound on player commands and position polls (default: 5s)
    pub command_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            volume: 80,
            autostart: false,
            watchdog_interval: Duration::from_millis(500),
            stuck_threshold: Duration::from_secs(10),
            completion_margin: 1.0,
            resolve_timeout: Duration::from_secs(30),
            command_timeout: Duration::from_secs(5),
        }
    }
}

/// Point-in-time view of the engine for status consumers
///
/// `current` and `current_chapter` serialize as `false` when absent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub playing: bool,
    pub elapsed: f64,
    pub duration: f64,
    pub volume: u8,
    #[serde(serialize_with = "some_or_false")]
    pub current: Option<TrackSummary>,
    pub chapters: bool,
    #[serde(serialize_with = "some_or_false")]
    pub current_chapter: Option<Chapter>,
    pub queue: Vec<TrackSummary>,
}

fn some_or_false<T, S>(value: &Option<T>, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    T: Serialize,
    S: Serializer,
{
    match value {
        Some(inner) => inner.serialize(serializer),
        None => serializer.serialize_bool(false),
    }
}
