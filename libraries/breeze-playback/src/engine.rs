//! Playback engine
//!
//! Owns the pending queue, the current track and transport state, and drives
//! a [`PlayerBackend`]. Every external call is bounded by a timeout from
//! [`EngineConfig`].

use crate::backend::{with_timeout, PlayerBackend, PlayerEvent, StreamResolver};
use crate::chapters::{self, ChapterTarget};
use crate::error::{PlaybackError, Result};
use crate::queue::Queue;
use crate::types::{EngineConfig, EngineState, StatusSnapshot, Track};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// What a watchdog tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing loaded, or paused
    Idle,

    /// Playing normally; position updated
    Playing,

    /// Loaded the next pending track into an idle engine
    Recovered,

    /// Track reached its end and the queue advanced
    Completed,

    /// Elapsed stopped advancing and the queue advanced
    Stalled,

    /// Position poll failed and the queue advanced
    Failed,
}

/// Detects playback whose position has stopped moving
#[derive(Debug, Default)]
struct StallTracker {
    last_elapsed: Option<f64>,
    since: Option<Instant>,
}

impl StallTracker {
    fn reset(&mut self) {
        self.last_elapsed = None;
        self.since = None;
    }

    /// Record a sample; true once `elapsed` has been unchanged for longer
    /// than `threshold`
    fn observe(&mut self, elapsed: f64, now: Instant, threshold: Duration) -> bool {
        match (self.last_elapsed, self.since) {
            (Some(last), Some(since)) if (last - elapsed).abs() < f64::EPSILON => {
                now.saturating_duration_since(since) > threshold
            }
            _ => {
                self.last_elapsed = Some(elapsed);
                self.since = Some(now);
                false
            }
        }
    }
}

/// Publishes `Loading` for the length of a load and `Empty` when it ends
///
/// A successful load publishes its own state afterwards; a failed or
/// cancelled one leaves `Empty` behind.
struct LoadingGuard<'a>(&'a watch::Sender<EngineState>);

impl<'a> LoadingGuard<'a> {
    fn new(state: &'a watch::Sender<EngineState>) -> Self {
        state.send_replace(EngineState::Loading);
        Self(state)
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.send_replace(EngineState::Empty);
    }
}

/// Playback queue and state machine
pub struct PlaybackEngine {
    config: EngineConfig,
    player: Box<dyn PlayerBackend>,
    resolver: Arc<dyn StreamResolver>,

    queue: Queue,
    current: Option<Track>,

    playing: bool,
    elapsed: f64,
    current_chapter: usize,
    volume: u8,

    stall: StallTracker,

    state: watch::Sender<EngineState>,
}

impl PlaybackEngine {
    /// Create an idle engine
    pub fn new(
        config: EngineConfig,
        player: Box<dyn PlayerBackend>,
        resolver: Arc<dyn StreamResolver>,
    ) -> Self {
        let volume = config.volume.min(100);
        let (state, _) = watch::channel(EngineState::Empty);
        Self {
            config,
            player,
            resolver,
            queue: Queue::new(),
            current: None,
            playing: false,
            elapsed: 0.0,
            current_chapter: 0,
            volume,
            stall: StallTracker::default(),
            state,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Resolver shared with callers that resolve outside the engine lock
    pub fn resolver(&self) -> Arc<dyn StreamResolver> {
        Arc::clone(&self.resolver)
    }

    // ===== Queue =====

    /// Resolve `url` and enqueue the resulting track
    pub async fn request(&mut self, url: &str) -> Result<()> {
        let resolved = with_timeout(
            "resolve",
            self.config.resolve_timeout,
            self.resolver.resolve(url),
        )
        .await?;
        self.enqueue(Track::from_resolved(url, resolved)).await
    }

    /// Append a track; an idle engine loads it straight away
    pub async fn enqueue(&mut self, track: Track) -> Result<()> {
        info!(url = %track.url, title = %track.title, "Queued track");
        self.queue.push(track);

        if self.current.is_none() {
            self.shift_queue().await?;
            if self.config.autostart && self.current.is_some() {
                self.play().await?;
            }
        }
        Ok(())
    }

    /// Load the head of the queue as the current track
    ///
    /// No-op when a track is already current or the queue is empty. A track
    /// that fails to resolve or load is dropped and the engine stays empty.
    pub async fn shift_queue(&mut self) -> Result<()> {
        if self.current.is_some() {
            return Ok(());
        }
        let Some(mut track) = self.queue.pop() else {
            return Ok(());
        };

        let loaded = {
            let _loading = LoadingGuard::new(&self.state);
            Self::load_track(
                self.player.as_mut(),
                self.resolver.as_ref(),
                &self.config,
                &mut track,
            )
            .await
        };

        match loaded {
            Ok(()) => {
                info!(url = %track.url, title = %track.title, "Loaded track");
                self.current = Some(track);
                self.playing = false;
                self.elapsed = 0.0;
                self.current_chapter = 0;
                self.stall.reset();
                self.publish_state();
                Ok(())
            }
            Err(err) => {
                warn!(url = %track.url, error = %err, "Dropping track that failed to load");
                Err(err)
            }
        }
    }

    /// Load `track` into the player
    ///
    /// A stream URL resolved along with the metadata is used as is. A missing
    /// one is resolved here, and one the player rejects is resolved again
    /// once, since stream URLs expire.
    async fn load_track(
        player: &mut dyn PlayerBackend,
        resolver: &dyn StreamResolver,
        config: &EngineConfig,
        track: &mut Track,
    ) -> Result<()> {
        if let Some(cached) = track.stream_url.take() {
            match with_timeout("load", config.command_timeout, player.load(&cached)).await {
                Ok(()) => {
                    track.stream_url = Some(cached);
                    return Ok(());
                }
                Err(err) => {
                    warn!(url = %track.url, error = %err, "Stream failed to load, resolving again");
                }
            }
        }

        let stream_url = with_timeout(
            "resolve stream",
            config.resolve_timeout,
            resolver.stream_url(&track.url),
        )
        .await?;
        debug!(url = %track.url, "Resolved stream");

        with_timeout("load", config.command_timeout, player.load(&stream_url)).await?;
        track.stream_url = Some(stream_url);
        Ok(())
    }

    // ===== Transport =====

    /// Start or resume the current track
    pub async fn play(&mut self) -> Result<()> {
        if self.current.is_none() {
            return Err(PlaybackError::NoTrackLoaded);
        }
        with_timeout("play", self.config.command_timeout, self.player.play()).await?;
        self.playing = true;
        self.stall.reset();
        self.publish_state();
        Ok(())
    }

    /// Pause the current track
    pub async fn pause(&mut self) -> Result<()> {
        if self.current.is_none() {
            return Err(PlaybackError::NoTrackLoaded);
        }
        with_timeout("pause", self.config.command_timeout, self.player.pause()).await?;
        self.playing = false;
        self.stall.reset();
        self.publish_state();
        Ok(())
    }

    /// Seek within the current track, clamped to `[0, duration]`
    pub async fn set_elapsed(&mut self, seconds: f64) -> Result<()> {
        let Some(track) = self.current.as_ref() else {
            return Err(PlaybackError::NoTrackLoaded);
        };
        let target = if track.duration > 0.0 {
            seconds.clamp(0.0, track.duration)
        } else {
            seconds.max(0.0)
        };
        let chapter = chapters::locate_chapter(track.chapters(), target);

        with_timeout("seek", self.config.command_timeout, self.player.seek(target)).await?;
        self.elapsed = target;
        self.current_chapter = chapter;
        self.stall.reset();
        Ok(())
    }

    /// Set volume, clamped to 0..=100
    pub async fn set_volume(&mut self, level: u8) -> Result<()> {
        let level = level.min(100);
        with_timeout(
            "set volume",
            self.config.command_timeout,
            self.player.set_volume(level),
        )
        .await?;
        self.volume = level;
        Ok(())
    }

    /// Discard the current track and load the next one
    ///
    /// Play state carries over to the new track. The discarded track is never
    /// requeued.
    pub async fn skip_to_next_track(&mut self) -> Result<()> {
        let was_playing = self.playing;
        if was_playing && self.current.is_some() {
            if let Err(err) =
                with_timeout("pause", self.config.command_timeout, self.player.pause()).await
            {
                warn!(error = %err, "Pause before skip failed");
            }
        }

        if let Some(track) = self.current.take() {
            info!(url = %track.url, title = %track.title, "Skipping track");
        }
        self.playing = false;
        self.elapsed = 0.0;
        self.current_chapter = 0;
        self.stall.reset();
        self.publish_state();

        if self.queue.is_empty() {
            if let Err(err) =
                with_timeout("stop", self.config.command_timeout, self.player.stop()).await
            {
                warn!(error = %err, "Stopping player failed");
            }
            debug!("Queue exhausted");
            return Ok(());
        }

        self.shift_queue().await?;
        if was_playing && self.current.is_some() {
            self.play().await?;
        }
        Ok(())
    }

    /// Seek to the next chapter, or skip the track from its last chapter
    pub async fn skip_next_chapter(&mut self) -> Result<()> {
        let Some(track) = self.current.as_ref() else {
            return Err(PlaybackError::NoTrackLoaded);
        };
        match chapters::next_chapter(track.chapters(), self.current_chapter) {
            ChapterTarget::Seek(start) => self.set_elapsed(start).await,
            ChapterTarget::NextTrack => self.skip_to_next_track().await,
        }
    }

    /// Seek back one chapter, or to the start of the current one
    pub async fn skip_previous_chapter(&mut self) -> Result<()> {
        let Some(track) = self.current.as_ref() else {
            return Err(PlaybackError::NoTrackLoaded);
        };
        let target = chapters::previous_chapter(track.chapters(), self.current_chapter, self.elapsed);
        self.set_elapsed(target).await
    }

    // ===== Watchdog =====

    /// One watchdog pass
    ///
    /// Polls the player position while playing, refreshes the current
    /// chapter, and advances the queue when the track has finished, the
    /// position has stopped moving for longer than the stuck threshold, or
    /// the poll itself failed. An idle engine with pending tracks loads the
    /// next one.
    pub async fn watchdog_tick(&mut self, now: Instant) -> Result<TickOutcome> {
        if self.current.is_none() {
            self.stall.reset();
            if self.queue.is_empty() {
                return Ok(TickOutcome::Idle);
            }
            self.shift_queue().await?;
            if self.config.autostart && self.current.is_some() {
                self.play().await?;
            }
            return Ok(TickOutcome::Recovered);
        }

        if !self.playing {
            self.stall.reset();
            return Ok(TickOutcome::Idle);
        }

        let position = match with_timeout(
            "position",
            self.config.command_timeout,
            self.player.position(),
        )
        .await
        {
            Ok(position) => position.max(0.0),
            Err(err) => {
                warn!(error = %err, "Position poll failed, skipping track");
                self.skip_to_next_track().await?;
                return Ok(TickOutcome::Failed);
            }
        };

        let Some(track) = self.current.as_ref() else {
            return Ok(TickOutcome::Idle);
        };
        let duration = track.duration;
        self.elapsed = position;
        self.current_chapter = chapters::locate_chapter(track.chapters(), position);

        if duration > 0.0 && duration - position <= self.config.completion_margin {
            debug!(elapsed = position, duration, "Track finished");
            self.skip_to_next_track().await?;
            return Ok(TickOutcome::Completed);
        }

        if self
            .stall
            .observe(position, now, self.config.stuck_threshold)
        {
            warn!(
                elapsed = position,
                threshold = ?self.config.stuck_threshold,
                "Playback stalled, skipping track"
            );
            self.skip_to_next_track().await?;
            return Ok(TickOutcome::Stalled);
        }

        Ok(TickOutcome::Playing)
    }

    /// React to a player notification
    ///
    /// Both end-of-media and player errors advance the queue, exactly like a
    /// detected completion.
    pub async fn handle_player_event(&mut self, event: PlayerEvent) -> Result<()> {
        match &event {
            PlayerEvent::EndReached => debug!("Player reached end of media"),
            PlayerEvent::Error(message) => warn!(error = %message, "Player reported an error"),
        }
        if self.current.is_none() {
            return Ok(());
        }
        self.skip_to_next_track().await
    }

    // ===== State =====

    pub fn state(&self) -> EngineState {
        *self.state.borrow()
    }

    /// Follow state changes without taking the engine lock
    ///
    /// This is the only way to see [`EngineState::Loading`]: a load runs
    /// inside one engine call.
    pub fn subscribe_state(&self) -> watch::Receiver<EngineState> {
        self.state.subscribe()
    }

    fn publish_state(&self) {
        let next = match (&self.current, self.playing) {
            (None, _) => EngineState::Empty,
            (Some(_), true) => EngineState::Playing,
            (Some(_), false) => EngineState::Paused,
        };
        self.state.send_if_modified(|state| {
            let changed = *state != next;
            *state = next;
            changed
        });
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.current.as_ref()
    }

    pub fn current_chapter(&self) -> usize {
        self.current_chapter
    }

    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Number of tracks waiting behind the current one
    pub fn pending_len(&self) -> usize {
        self.queue.len()
    }

    /// Source URLs of the current and all pending tracks
    pub fn queued_urls(&self) -> Vec<String> {
        self.current
            .iter()
            .chain(self.queue.iter())
            .map(|t| t.url.clone())
            .collect()
    }

    /// Snapshot for status consumers; has no side effects
    pub fn status(&self) -> StatusSnapshot {
        let current_chapter = self
            .current
            .as_ref()
            .and_then(|t| t.chapters().get(self.current_chapter))
            .cloned();

        StatusSnapshot {
            playing: self.playing,
            elapsed: self.elapsed,
            duration: self.current.as_ref().map_or(0.0, |t| t.duration),
            volume: self.volume,
            current: self.current.as_ref().map(Track::summary),
            chapters: self.current.as_ref().is_some_and(Track::has_chapters),
            current_chapter,
            queue: self.queue.iter().map(Track::summary).collect(),
        }
    }
}
