//! Shared fakes for engine integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use breeze_playback::{
    Chapter, EngineConfig, PlaybackEngine, PlaybackError, PlayerBackend, ResolvedTrack,
    StreamResolver, Track,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Everything the fake player was asked to do
#[derive(Debug, Default)]
pub struct PlayerLog {
    pub loads: Vec<String>,
    pub commands: Vec<&'static str>,
    pub seeks: Vec<f64>,
    pub volume: Option<u8>,
    pub position: f64,
    pub fail_position: bool,
    /// Stream URLs the player refuses to open
    pub rejected: HashSet<String>,
    pub load_delay: Duration,
}

/// Player that records commands and reports a settable position
#[derive(Clone, Default)]
pub struct FakePlayer {
    pub log: Arc<Mutex<PlayerLog>>,
}

impl FakePlayer {
    pub fn set_position(&self, seconds: f64) {
        self.log.lock().unwrap().position = seconds;
    }

    pub fn loads(&self) -> Vec<String> {
        self.log.lock().unwrap().loads.clone()
    }

    pub fn commands(&self) -> Vec<&'static str> {
        self.log.lock().unwrap().commands.clone()
    }

    pub fn reject(&self, stream_url: &str) {
        self.log.lock().unwrap().rejected.insert(stream_url.to_string());
    }

    pub fn set_load_delay(&self, delay: Duration) {
        self.log.lock().unwrap().load_delay = delay;
    }
}

#[async_trait]
impl PlayerBackend for FakePlayer {
    async fn load(&mut self, stream_url: &str) -> breeze_playback::Result<()> {
        let delay = self.log.lock().unwrap().load_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut log = self.log.lock().unwrap();
        if log.rejected.contains(stream_url) {
            return Err(PlaybackError::Player(format!("cannot open {stream_url}")));
        }
        log.loads.push(stream_url.to_string());
        log.position = 0.0;
        Ok(())
    }

    async fn play(&mut self) -> breeze_playback::Result<()> {
        self.log.lock().unwrap().commands.push("play");
        Ok(())
    }

    async fn pause(&mut self) -> breeze_playback::Result<()> {
        self.log.lock().unwrap().commands.push("pause");
        Ok(())
    }

    async fn stop(&mut self) -> breeze_playback::Result<()> {
        self.log.lock().unwrap().commands.push("stop");
        Ok(())
    }

    async fn seek(&mut self, seconds: f64) -> breeze_playback::Result<()> {
        let mut log = self.log.lock().unwrap();
        log.seeks.push(seconds);
        log.position = seconds;
        Ok(())
    }

    async fn set_volume(&mut self, level: u8) -> breeze_playback::Result<()> {
        self.log.lock().unwrap().volume = Some(level);
        Ok(())
    }

    async fn position(&mut self) -> breeze_playback::Result<f64> {
        let log = self.log.lock().unwrap();
        if log.fail_position {
            return Err(PlaybackError::Player("ipc closed".into()));
        }
        Ok(log.position)
    }
}

/// Resolver that maps every URL to `<url>#stream` unless told to fail
#[derive(Default)]
pub struct FakeResolver {
    pub failing: Mutex<HashSet<String>>,
    pub duration: f64,
    pub delay: Mutex<Duration>,
    calls: AtomicUsize,
}

impl FakeResolver {
    pub fn with_duration(duration: f64) -> Self {
        Self {
            duration,
            ..Self::default()
        }
    }

    pub fn fail(&self, url: &str) {
        self.failing.lock().unwrap().insert(url.to_string());
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    /// How many times `resolve` has run
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StreamResolver for FakeResolver {
    async fn resolve(&self, url: &str) -> breeze_playback::Result<ResolvedTrack> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if self.failing.lock().unwrap().contains(url) {
            return Err(PlaybackError::Resolve(format!("{url} unavailable")));
        }
        Ok(ResolvedTrack {
            title: format!("Title of {url}"),
            duration: self.duration,
            thumbnail: None,
            chapters: vec![],
            stream_url: format!("{url}#stream"),
        })
    }
}

/// Engine wired to fresh fakes
pub fn create_test_engine(config: EngineConfig) -> (PlaybackEngine, FakePlayer, Arc<FakeResolver>) {
    let player = FakePlayer::default();
    let resolver = Arc::new(FakeResolver::with_duration(180.0));
    let engine = PlaybackEngine::new(config, Box::new(player.clone()), resolver.clone());
    (engine, player, resolver)
}

pub fn create_test_track(name: &str, duration: f64) -> Track {
    Track::new(format!("https://example.com/{name}"), name, duration)
}

pub fn create_chaptered_track(name: &str, starts: &[f64], duration: f64) -> Track {
    let chapters = starts
        .iter()
        .enumerate()
        .map(|(i, &start)| Chapter::new(format!("Part {}", i + 1), start))
        .collect();
    create_test_track(name, duration).with_chapters(chapters)
}
