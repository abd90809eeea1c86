//! Autoplay scheduling
//!
//! Watches the pending queue depth and, once it has stayed below target for
//! longer than the timeout, queues a track chosen for the current context.

use crate::catalog::CatalogStore;
use crate::classify::Classification;
use crate::context::ContextCell;
use crate::error::Result;
use crate::ranker::{self, SHORTLIST_SIZE};
use breeze_playback::{request_track, SharedEngine};
use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoplayConfig {
    /// Pending tracks below which the timer runs (default: 1)
    pub target_depth: usize,

    /// How long the queue may stay short before a track is queued (default: 20s)
    pub timeout: Duration,

    /// Check interval (default: 1s)
    pub interval: Duration,

    /// Candidates to draw from (default: 5)
    pub shortlist_size: usize,
}

impl Default for AutoplayConfig {
    fn default() -> Self {
        Self {
            target_depth: 1,
            timeout: Duration::from_secs(20),
            interval: Duration::from_secs(1),
            shortlist_size: SHORTLIST_SIZE,
        }
    }
}

/// Runtime on/off switch shared with other tasks
#[derive(Debug, Clone)]
pub struct AutoplayToggle(Arc<AtomicBool>);

impl AutoplayToggle {
    pub fn new(enabled: bool) -> Self {
        Self(Arc::new(AtomicBool::new(enabled)))
    }

    pub fn is_enabled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn set(&self, enabled: bool) {
        self.0.store(enabled, Ordering::Relaxed);
        info!(enabled, "Autoplay toggled");
    }
}

/// Timer deciding when a track is due
#[derive(Debug)]
pub struct AutoplayScheduler {
    config: AutoplayConfig,
    short_since: Instant,
}

impl AutoplayScheduler {
    pub fn new(config: AutoplayConfig, now: Instant) -> Self {
        Self {
            config,
            short_since: now,
        }
    }

    pub fn config(&self) -> &AutoplayConfig {
        &self.config
    }

    /// Feed the current queue depth; true when a track should be queued
    ///
    /// The timer restarts whenever the queue is deep enough, autoplay is
    /// disabled, or a selection is triggered.
    pub fn observe(&mut self, pending: usize, enabled: bool, now: Instant) -> bool {
        if !enabled || pending >= self.config.target_depth {
            self.short_since = now;
            return false;
        }

        let waited = now.saturating_duration_since(self.short_since);
        if waited > self.config.timeout {
            debug!(
                waited = ?waited,
                timeout = ?self.config.timeout,
                "Queue short for longer than timeout"
            );
            self.short_since = now;
            return true;
        }
        false
    }
}

/// Classify the current context, pick a track and queue it
///
/// Returns the queued URL, or `None` when nothing is eligible.
pub async fn queue_contextual_track<R: Rng + Send + ?Sized>(
    engine: &SharedEngine,
    catalog: &dyn CatalogStore,
    context: &ContextCell,
    shortlist_size: usize,
    rng: &mut R,
) -> Result<Option<String>> {
    let sample = context.current();
    let target = Classification::of(&sample, Utc::now())?;
    info!(context = %target, "Queuing track for context");

    let entries = catalog.load().await?;
    let exclude = engine.lock().await.queued_urls();

    let Some(choice) = ranker::select(&entries, target, &exclude, shortlist_size, rng) else {
        info!(context = %target, "No eligible tracks in catalog");
        return Ok(None);
    };

    info!(url = %choice.url, name = %choice.label, rank = choice.rank, "Autoplay chose track");
    request_track(engine, &choice.url).await?;
    Ok(Some(choice.url))
}

/// Run the autoplay loop until cancelled
///
/// Selection failures are logged; the loop keeps running.
pub async fn run_autoplay<R: Rng + Send>(
    engine: SharedEngine,
    catalog: Arc<dyn CatalogStore>,
    context: ContextCell,
    toggle: AutoplayToggle,
    config: AutoplayConfig,
    mut rng: R,
    cancel: CancellationToken,
) {
    info!(
        interval = ?config.interval,
        timeout = ?config.timeout,
        "Autoplay started"
    );
    let mut interval = tokio::time::interval(config.interval);
    let shortlist_size = config.shortlist_size;
    let mut scheduler = AutoplayScheduler::new(config, Instant::now());

    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                info!("Autoplay stopped");
                break;
            }
            _ = interval.tick() => {
                let pending = engine.lock().await.pending_len();
                if !scheduler.observe(pending, toggle.is_enabled(), Instant::now()) {
                    continue;
                }
                if let Err(err) = queue_contextual_track(
                    &engine,
                    catalog.as_ref(),
                    &context,
                    shortlist_size,
                    &mut rng,
                )
                .await
                {
                    warn!(error = %err, "Autoplay selection failed");
                }
            }
        }
    }
}
