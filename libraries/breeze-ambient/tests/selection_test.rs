//! Integration tests for contextual selection
//!
//! Exercise ranking, relaxation and autoplay against a real playback engine
//! wired to fake backends.

use async_trait::async_trait;
use breeze_ambient::{
    queue_contextual_track, ranker, run_autoplay, AmbientContext, AutoplayConfig,
    AutoplayToggle, CatalogEntry, Classification, ContextCell, StaticCatalog, TimeOfDay,
    WeatherType,
};
use breeze_playback::{
    shared, EngineConfig, PlaybackEngine, PlayerBackend, ResolvedTrack, SharedEngine,
    StreamResolver,
};
use chrono::Duration as ChronoDuration;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

// ===== Test Helpers =====

struct SilentPlayer;

#[async_trait]
impl PlayerBackend for SilentPlayer {
    async fn load(&mut self, _stream_url: &str) -> breeze_playback::Result<()> {
        Ok(())
    }
    async fn play(&mut self) -> breeze_playback::Result<()> {
        Ok(())
    }
    async fn pause(&mut self) -> breeze_playback::Result<()> {
        Ok(())
    }
    async fn stop(&mut self) -> breeze_playback::Result<()> {
        Ok(())
    }
    async fn seek(&mut self, _seconds: f64) -> breeze_playback::Result<()> {
        Ok(())
    }
    async fn set_volume(&mut self, _level: u8) -> breeze_playback::Result<()> {
        Ok(())
    }
    async fn position(&mut self) -> breeze_playback::Result<f64> {
        Ok(0.0)
    }
}

struct EchoResolver;

#[async_trait]
impl StreamResolver for EchoResolver {
    async fn resolve(&self, url: &str) -> breeze_playback::Result<ResolvedTrack> {
        Ok(ResolvedTrack {
            title: url.to_string(),
            duration: 200.0,
            thumbnail: None,
            chapters: vec![],
            stream_url: format!("{url}#stream"),
        })
    }
}

fn create_engine() -> SharedEngine {
    shared(PlaybackEngine::new(
        EngineConfig::default(),
        Box::new(SilentPlayer),
        Arc::new(EchoResolver),
    ))
}

/// Context that classifies as "day clear" right now
fn clear_day_context() -> ContextCell {
    let now = chrono::Utc::now();
    let cell = ContextCell::new();
    cell.replace(AmbientContext {
        weather_main: "Clear".into(),
        description: "clear sky".into(),
        temperature: 20.0,
        sunrise: now - ChronoDuration::hours(8),
        sunset: now + ChronoDuration::hours(4),
        sampled_at: Some(now),
    });
    cell
}

/// One exact match and five tracks four weather steps away
fn mixed_catalog() -> Vec<CatalogEntry> {
    let mut catalog = vec![CatalogEntry::new("exact").with_weather(&[WeatherType::Clear])];
    for n in 0..5 {
        catalog.push(
            CatalogEntry::new(format!("storm-{n}")).with_weather(&[WeatherType::Thunderstorm]),
        );
    }
    catalog
}

// ===== Ranking =====

#[test]
fn test_relaxed_shortlist_and_weighted_pick() {
    let catalog = mixed_catalog();
    let target = Classification::new(TimeOfDay::Day, WeatherType::Clear);
    let mut rng = StdRng::seed_from_u64(2024);

    let list = ranker::shortlist(&catalog, target, &[], 5, &mut rng);

    assert_eq!(list.len(), 5);
    assert_eq!(list[0].url, "exact");
    assert_eq!(list[0].rank, 0);
    assert!(list[1..].iter().all(|r| r.rank == 40));
    assert!(list.windows(2).all(|w| w[0].rank <= w[1].rank));

    let mut counts: HashMap<String, usize> = HashMap::new();
    for _ in 0..1000 {
        let chosen = ranker::pick(&list, &mut rng).unwrap();
        *counts.entry(chosen.url.clone()).or_default() += 1;
    }
    let exact = counts.get("exact").copied().unwrap_or(0);
    let best_storm = counts
        .iter()
        .filter(|(url, _)| url.starts_with("storm"))
        .map(|(_, &n)| n)
        .max()
        .unwrap_or(0);

    // weights 41 vs 1 each
    assert!(exact > 800, "exact picked {exact} times");
    assert!(exact > best_storm * 10);
}

#[test]
fn test_shortlist_shuffles_overflowing_group() {
    let catalog = mixed_catalog();
    let target = Classification::new(TimeOfDay::Day, WeatherType::Clear);

    let mut seen = std::collections::HashSet::new();
    for seed in 0..20 {
        let mut rng = StdRng::seed_from_u64(seed);
        let list = ranker::shortlist(&catalog, target, &[], 3, &mut rng);
        assert_eq!(list.len(), 3);
        seen.extend(list.into_iter().skip(1).map(|r| r.url));
    }
    assert!(seen.len() > 2);
}

#[test]
fn test_selection_never_returns_excluded() {
    let catalog = mixed_catalog();
    let target = Classification::new(TimeOfDay::Day, WeatherType::Clear);
    let exclude = vec!["exact".to_string(), "storm-0".to_string()];
    let mut rng = StdRng::seed_from_u64(5);

    for _ in 0..200 {
        let chosen = ranker::select(&catalog, target, &exclude, 5, &mut rng).unwrap();
        assert!(!exclude.contains(&chosen.url));
    }
}

// ===== Autoplay =====

#[tokio::test]
async fn test_queue_contextual_track_skips_queued_urls() {
    let engine = create_engine();
    let catalog = StaticCatalog::new(vec![
        CatalogEntry::new("first").with_weather(&[WeatherType::Clear]),
        CatalogEntry::new("second").with_weather(&[WeatherType::Rain]),
    ]);
    let context = clear_day_context();
    let mut rng = StdRng::seed_from_u64(9);

    // A shortlist of one always takes the best remaining rank
    let first = queue_contextual_track(&engine, &catalog, &context, 1, &mut rng)
        .await
        .unwrap();
    let second = queue_contextual_track(&engine, &catalog, &context, 1, &mut rng)
        .await
        .unwrap();
    let third = queue_contextual_track(&engine, &catalog, &context, 1, &mut rng)
        .await
        .unwrap();

    assert_eq!(first.as_deref(), Some("first"));
    assert_eq!(second.as_deref(), Some("second"));
    assert_eq!(third, None);
    assert_eq!(engine.lock().await.queued_urls(), vec!["first", "second"]);
}

#[tokio::test]
async fn test_unclassifiable_context_is_error() {
    let engine = create_engine();
    let catalog = StaticCatalog::new(vec![CatalogEntry::new("any")]);
    let context = clear_day_context();
    let mut sample = context.current();
    sample.weather_main = "Plasma".into();
    context.replace(sample);
    let mut rng = StdRng::seed_from_u64(1);

    let result = queue_contextual_track(&engine, &catalog, &context, 5, &mut rng).await;

    assert!(result.is_err());
    assert!(engine.lock().await.queued_urls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_autoplay_loop_fills_idle_queue() {
    let engine = create_engine();
    let catalog = Arc::new(StaticCatalog::new(mixed_catalog()));
    let toggle = AutoplayToggle::new(true);
    let cancel = CancellationToken::new();
    let config = AutoplayConfig {
        timeout: Duration::from_secs(20),
        interval: Duration::from_secs(1),
        ..AutoplayConfig::default()
    };

    let task = tokio::spawn(run_autoplay(
        engine.clone(),
        catalog,
        clear_day_context(),
        toggle.clone(),
        config,
        StdRng::seed_from_u64(3),
        cancel.clone(),
    ));

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(engine.lock().await.current_track().is_none());

    tokio::time::sleep(Duration::from_secs(15)).await;
    assert!(engine.lock().await.current_track().is_some());

    cancel.cancel();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_autoplay_disabled_queues_nothing() {
    let engine = create_engine();
    let catalog = Arc::new(StaticCatalog::new(mixed_catalog()));
    let cancel = CancellationToken::new();

    let task = tokio::spawn(run_autoplay(
        engine.clone(),
        catalog,
        clear_day_context(),
        AutoplayToggle::new(false),
        AutoplayConfig::default(),
        StdRng::seed_from_u64(3),
        cancel.clone(),
    ));

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert!(engine.lock().await.queued_urls().is_empty());

    cancel.cancel();
    task.await.unwrap();
}
