/// Status notifier - polls update providers and broadcasts their JSON
use async_trait::async_trait;
use breeze_ambient::ContextCell;
use breeze_playback::SharedEngine;
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Source of one status update per notifier tick
#[async_trait]
pub trait StatusProvider: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &'static str;

    /// Current update, or `None` when there is nothing to report
    async fn update(&self) -> Option<Value>;
}

/// Engine status snapshot
pub struct PlaybackStatus {
    engine: SharedEngine,
}

impl PlaybackStatus {
    pub fn new(engine: SharedEngine) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl StatusProvider for PlaybackStatus {
    fn name(&self) -> &'static str {
        "playback"
    }

    async fn update(&self) -> Option<Value> {
        let status = self.engine.lock().await.status();
        match serde_json::to_value(status) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(error = %err, "Failed to serialize playback status");
                None
            }
        }
    }
}

/// Latest ambient context under a `weather` key
pub struct ContextStatus {
    cell: ContextCell,
}

impl ContextStatus {
    pub fn new(cell: ContextCell) -> Self {
        Self { cell }
    }
}

#[async_trait]
impl StatusProvider for ContextStatus {
    fn name(&self) -> &'static str {
        "weather"
    }

    async fn update(&self) -> Option<Value> {
        let update = self.cell.current().to_update(Utc::now());
        Some(json!({ "weather": update }))
    }
}

pub struct Notifier {
    providers: Vec<Arc<dyn StatusProvider>>,
    sender: broadcast::Sender<String>,
}

impl Notifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            providers: Vec::new(),
            sender,
        }
    }

    pub fn register(&mut self, provider: Arc<dyn StatusProvider>) {
        info!(provider = provider.name(), "Status provider registered");
        self.providers.push(provider);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.sender.subscribe()
    }

    /// Poll every provider once, in registration order
    pub async fn collect(&self) -> Vec<Value> {
        let mut updates = Vec::with_capacity(self.providers.len());
        for provider in &self.providers {
            if let Some(update) = provider.update().await {
                updates.push(update);
            }
        }
        updates
    }

    /// Broadcast one round of updates; returns how many were sent
    pub async fn notify(&self) -> usize {
        if self.sender.receiver_count() == 0 {
            return 0;
        }

        let mut sent = 0;
        for update in self.collect().await {
            // A send only fails when every receiver has gone away
            if self.sender.send(update.to_string()).is_ok() {
                sent += 1;
            }
        }
        sent
    }

    /// Broadcast updates every `period` until cancelled
    pub async fn run(self, period: Duration, cancel: CancellationToken) {
        info!(interval = ?period, providers = self.providers.len(), "Notifier started");
        let mut interval = tokio::time::interval(period);

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    info!("Notifier stopped");
                    break;
                }
                _ = interval.tick() => {
                    let sent = self.notify().await;
                    debug!(sent, "Status updates broadcast");
                }
            }
        }
    }
}
