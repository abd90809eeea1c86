//! Ambient context samples and the poller that keeps them fresh

use crate::classify::{time_of_day, weather_type};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Local, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// One weather observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmbientContext {
    /// Main condition, e.g. "Clouds" or "Clear sky"
    pub weather_main: String,

    /// Free-form description
    pub description: String,

    /// Temperature in °C
    pub temperature: f64,

    pub sunrise: DateTime<Utc>,

    pub sunset: DateTime<Utc>,

    /// When the sample was taken; `None` for the built-in fallback
    pub sampled_at: Option<DateTime<Utc>>,
}

impl AmbientContext {
    /// Context used before any sample has been fetched
    pub fn fallback() -> Self {
        Self::fallback_on(Local::now().date_naive())
    }

    /// Clear sky at 21 °C with sunrise 06:00 and sunset 18:00 local time
    pub fn fallback_on(date: NaiveDate) -> Self {
        Self {
            weather_main: "Clear sky".to_string(),
            description: "Default weather".to_string(),
            temperature: 21.0,
            sunrise: local_time_on(date, 6),
            sunset: local_time_on(date, 18),
            sampled_at: None,
        }
    }

    /// "<time of day> <weather>", falling back to the raw condition when it
    /// does not classify
    pub fn summary(&self, now: DateTime<Utc>) -> String {
        let weather = weather_type(self).map_or_else(
            |_| self.weather_main.to_lowercase(),
            |w| w.as_str().to_string(),
        );
        format!("{} {}", time_of_day(self, now), weather)
    }

    /// Status update for the notifier
    pub fn to_update(&self, now: DateTime<Utc>) -> ContextUpdate {
        ContextUpdate {
            weather: self.weather_main.clone(),
            summary: self.summary(now),
            description: self.description.clone(),
            temperature: self.temperature,
            sunrise: self.sunrise.with_timezone(&Local).to_rfc3339(),
            sunset: self.sunset.with_timezone(&Local).to_rfc3339(),
            tod: time_of_day(self, now).to_string(),
        }
    }
}

fn local_time_on(date: NaiveDate, hour: i64) -> DateTime<Utc> {
    let naive = date.and_time(NaiveTime::default()) + Duration::hours(hour);
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map_or_else(|| Utc.from_utc_datetime(&naive), |t| t.with_timezone(&Utc))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextUpdate {
    pub weather: String,
    pub summary: String,
    pub description: String,
    pub temperature: f64,
    pub sunrise: String,
    pub sunset: String,
    pub tod: String,
}

/// Provider of context samples
#[async_trait]
pub trait ContextSource: Send + Sync {
    async fn fetch(&self) -> Result<AmbientContext>;
}

/// Last known context, shared between the poller and its readers
#[derive(Clone)]
pub struct ContextCell {
    latest: Arc<watch::Sender<Option<AmbientContext>>>,
}

impl Default for ContextCell {
    fn default() -> Self {
        let (latest, _) = watch::channel(None);
        Self {
            latest: Arc::new(latest),
        }
    }
}

impl ContextCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent sample, or the fallback if none has arrived
    pub fn current(&self) -> AmbientContext {
        self.latest
            .borrow()
            .clone()
            .unwrap_or_else(AmbientContext::fallback)
    }

    pub fn has_sample(&self) -> bool {
        self.latest.borrow().is_some()
    }

    pub fn replace(&self, context: AmbientContext) {
        self.latest.send_replace(Some(context));
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<AmbientContext>> {
        self.latest.subscribe()
    }
}

/// Fetch a context sample every `period` until cancelled
///
/// A failed fetch keeps the previous sample in place.
pub async fn run_context_poller(
    source: Arc<dyn ContextSource>,
    cell: ContextCell,
    period: std::time::Duration,
    cancel: CancellationToken,
) {
    info!(interval = ?period, "Context poller started");
    let mut interval = tokio::time::interval(period);

    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                info!("Context poller stopped");
                break;
            }
            _ = interval.tick() => {
                match source.fetch().await {
                    Ok(context) => {
                        debug!(
                            weather = %context.weather_main,
                            temperature = context.temperature,
                            "Fetched context"
                        );
                        cell.replace(context);
                    }
                    Err(err) => warn!(error = %err, "Context fetch failed, keeping last sample"),
                }
            }
        }
    }
}
