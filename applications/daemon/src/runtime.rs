/// Daemon runtime - wires the adapters to the engine and supervises tasks
use crate::config::DaemonConfig;
use crate::error::Result;
use crate::notifier::{ContextStatus, Notifier, PlaybackStatus};
use crate::services::{MpvPlayer, OpenWeatherSource, YtDlpResolver};
use breeze_ambient::{
    run_autoplay, run_context_poller, AutoplayToggle, CatalogStore, ContextCell, ContextSource,
    FileCatalogStore,
};
use breeze_playback::{request_track, run_watchdog, shared, PlaybackEngine, SharedEngine};
use chrono::Utc;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Player events buffered between the IPC reader and the watchdog
const EVENT_BUFFER: usize = 32;

/// Start mpv, build the engine and run every background task until Ctrl-C
pub async fn run(config: DaemonConfig, enqueue: Vec<String>) -> Result<()> {
    info!("Starting Breeze");

    let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
    let player = MpvPlayer::spawn(&config.player, events_tx).await?;
    let resolver = YtDlpResolver::new(config.resolver.ytdlp_path.clone());
    info!(ytdlp = %config.resolver.ytdlp_path.display(), "Resolver ready");

    let engine_config = config.playback.engine_config();
    let watchdog_interval = engine_config.watchdog_interval;
    let mut engine = PlaybackEngine::new(engine_config, Box::new(player), Arc::new(resolver));
    engine.set_volume(config.playback.volume).await?;
    let engine = shared(engine);

    let context = ContextCell::new();
    let cancel = CancellationToken::new();
    let mut tasks = JoinSet::new();

    match weather_source(&config).await {
        Some(source) => {
            tasks.spawn(run_context_poller(
                source,
                context.clone(),
                Duration::from_secs(config.weather.poll_interval_secs),
                cancel.clone(),
            ));
        }
        None => warn!("No weather API key configured, using default context"),
    }

    let catalog: Arc<dyn CatalogStore> = Arc::new(FileCatalogStore::new(config.catalog.path.clone()));
    info!(path = %config.catalog.path.display(), "Catalog configured");

    tasks.spawn(run_watchdog(
        Arc::clone(&engine),
        events_rx,
        watchdog_interval,
        cancel.clone(),
    ));

    tasks.spawn(run_autoplay(
        Arc::clone(&engine),
        catalog,
        context.clone(),
        AutoplayToggle::new(config.autoplay.enabled),
        config.autoplay.autoplay_config(),
        StdRng::from_entropy(),
        cancel.clone(),
    ));

    let mut notifier = Notifier::new(config.notifier.capacity);
    notifier.register(Arc::new(PlaybackStatus::new(Arc::clone(&engine))));
    notifier.register(Arc::new(ContextStatus::new(context.clone())));
    tasks.spawn(log_context_changes(context, cancel.clone()));
    tasks.spawn(notifier.run(
        Duration::from_millis(config.notifier.interval_ms),
        cancel.clone(),
    ));

    for url in enqueue {
        spawn_request(&mut tasks, &engine, url);
    }

    info!("Breeze running, press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;
    info!("Shutting down");

    cancel.cancel();
    while let Some(joined) = tasks.join_next().await {
        if let Err(err) = joined {
            error!(error = %err, "Background task panicked");
        }
    }

    if let Err(err) = engine.lock().await.pause().await {
        warn!(error = %err, "Could not pause player on shutdown");
    }
    info!("Breeze stopped");
    Ok(())
}

/// OpenWeather source when an API key is configured
async fn weather_source(config: &DaemonConfig) -> Option<Arc<dyn ContextSource>> {
    config.weather.api_key.as_ref()?;

    let mut source = match OpenWeatherSource::new(&config.weather) {
        Ok(source) => source,
        Err(err) => {
            warn!(error = %err, "Weather source unavailable");
            return None;
        }
    };
    if let (Some(city), Some(country)) = (&config.weather.city, &config.weather.country) {
        source.locate(city, country).await;
    }
    Some(Arc::new(source))
}

fn spawn_request(tasks: &mut JoinSet<()>, engine: &SharedEngine, url: String) {
    let engine = Arc::clone(engine);
    tasks.spawn(async move {
        if let Err(err) = request_track(&engine, &url).await {
            error!(url = %url, error = %err, "Could not queue track");
        }
    });
}

async fn log_context_changes(context: ContextCell, cancel: CancellationToken) {
    let mut updates = context.subscribe();

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let sample = updates.borrow_and_update().clone();
                if let Some(sample) = sample {
                    info!(
                        summary = %sample.summary(Utc::now()),
                        temperature = sample.temperature,
                        "Context updated"
                    );
                }
            }
        }
    }
}
