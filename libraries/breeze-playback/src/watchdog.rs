//! Shared engine handle and the watchdog task

use crate::backend::{with_timeout, PlayerEvent};
use crate::engine::{PlaybackEngine, TickOutcome};
use crate::error::Result;
use crate::types::Track;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Engine handle shared between tasks
///
/// Each transport operation runs under a single lock acquisition.
pub type SharedEngine = Arc<Mutex<PlaybackEngine>>;

pub fn shared(engine: PlaybackEngine) -> SharedEngine {
    Arc::new(Mutex::new(engine))
}

/// Resolve `url` without holding the engine lock, then enqueue it
pub async fn request_track(engine: &SharedEngine, url: &str) -> Result<()> {
    let (resolver, limit) = {
        let guard = engine.lock().await;
        (guard.resolver(), guard.config().resolve_timeout)
    };
    let resolved = with_timeout("resolve", limit, resolver.resolve(url)).await?;
    let track = Track::from_resolved(url, resolved);

    engine.lock().await.enqueue(track).await
}

/// Tick the engine watchdog and forward player events until cancelled
///
/// A failed tick is logged; the loop keeps running.
pub async fn run_watchdog(
    engine: SharedEngine,
    mut events: mpsc::Receiver<PlayerEvent>,
    period: Duration,
    cancel: CancellationToken,
) {
    info!(interval = ?period, "Watchdog started");
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut events_open = true;

    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                info!("Watchdog stopped");
                break;
            }
            _ = interval.tick() => {
                let outcome = engine.lock().await.watchdog_tick(Instant::now()).await;
                match outcome {
                    Ok(TickOutcome::Idle | TickOutcome::Playing) => {}
                    Ok(other) => debug!(outcome = ?other, "Watchdog advanced queue"),
                    Err(err) => error!(error = %err, "Watchdog tick failed"),
                }
            }
            event = events.recv(), if events_open => {
                match event {
                    Some(event) => {
                        if let Err(err) = engine.lock().await.handle_player_event(event).await {
                            error!(error = %err, "Handling player event failed");
                        }
                    }
                    None => {
                        debug!("Player event channel closed");
                        events_open = false;
                    }
                }
            }
        }
    }
}
