/// Ambient context source - OpenWeather current conditions and geocoding
use crate::config::WeatherSettings;
use crate::error::{DaemonError, Result};
use async_trait::async_trait;
use breeze_ambient::{AmbientContext, AmbientError, ContextSource};
use chrono::{DateTime, TimeZone, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Deserialize)]
struct CurrentWeather {
    weather: Vec<Condition>,
    main: Measurements,
    sys: Sun,
    #[serde(default)]
    dt: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Condition {
    main: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct Measurements {
    temp: f64,
}

#[derive(Debug, Deserialize)]
struct Sun {
    sunrise: i64,
    sunset: i64,
}

#[derive(Debug, Deserialize)]
struct GeoLocation {
    lat: f64,
    lon: f64,
}

fn timestamp(seconds: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_opt(seconds, 0)
        .single()
        .ok_or_else(|| DaemonError::Weather(format!("invalid timestamp {seconds}")))
}

/// Turn a `data/2.5/weather` response body into a context sample
pub fn parse_current_weather(raw: &str) -> Result<AmbientContext> {
    let body: CurrentWeather = serde_json::from_str(raw)?;
    let condition = body
        .weather
        .into_iter()
        .next()
        .ok_or_else(|| DaemonError::Weather("response has no conditions".to_string()))?;

    Ok(AmbientContext {
        weather_main: condition.main,
        description: condition.description,
        temperature: body.main.temp,
        sunrise: timestamp(body.sys.sunrise)?,
        sunset: timestamp(body.sys.sunset)?,
        sampled_at: Some(match body.dt {
            Some(dt) => timestamp(dt)?,
            None => Utc::now(),
        }),
    })
}

/// First match of a `geo/1.0/direct` response
pub fn parse_geocode(raw: &str) -> Result<Option<(f64, f64)>> {
    let locations: Vec<GeoLocation> = serde_json::from_str(raw)?;
    Ok(locations.first().map(|l| (l.lat, l.lon)))
}

pub struct OpenWeatherSource {
    http: Client,
    base_url: String,
    api_key: String,
    latitude: f64,
    longitude: f64,
}

impl OpenWeatherSource {
    pub fn new(settings: &WeatherSettings) -> Result<Self> {
        let api_key = settings
            .api_key
            .clone()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| DaemonError::Config("weather.api_key is not set".to_string()))?;

        let http = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .connect_timeout(Duration::from_secs(settings.request_timeout_secs))
            .user_agent(format!("Breeze/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key,
            latitude: settings.latitude,
            longitude: settings.longitude,
        })
    }

    pub fn location(&self) -> (f64, f64) {
        (self.latitude, self.longitude)
    }

    /// Replace the configured coordinates with a geocoded city
    ///
    /// Keeps the configured coordinates when the lookup fails or finds nothing.
    pub async fn locate(&mut self, city: &str, country: &str) {
        match self.geocode(city, country).await {
            Ok(Some((lat, lon))) => {
                info!(city = %city, country = %country, lat, lon, "Geocoded weather location");
                self.latitude = lat;
                self.longitude = lon;
            }
            Ok(None) => warn!(city = %city, country = %country, "City not found, keeping coordinates"),
            Err(err) => warn!(error = %err, "Geocoding failed, keeping coordinates"),
        }
    }

    async fn geocode(&self, city: &str, country: &str) -> Result<Option<(f64, f64)>> {
        let url = format!("{}/geo/1.0/direct", self.base_url);
        let query = format!("{city},{country}");
        debug!(url = %url, query = %query, "Geocoding");

        let body = self
            .http
            .get(&url)
            .query(&[("q", query.as_str()), ("limit", "1"), ("appid", self.api_key.as_str())])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        parse_geocode(&body)
    }

    /// Fetch current conditions at the configured location
    pub async fn current(&self) -> Result<AmbientContext> {
        let url = format!("{}/data/2.5/weather", self.base_url);
        debug!(url = %url, lat = self.latitude, lon = self.longitude, "Fetching weather");

        let body = self
            .http
            .get(&url)
            .query(&[
                ("lat", self.latitude.to_string()),
                ("lon", self.longitude.to_string()),
                ("appid", self.api_key.clone()),
                ("units", "metric".to_string()),
            ])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        parse_current_weather(&body)
    }
}

#[async_trait]
impl ContextSource for OpenWeatherSource {
    async fn fetch(&self) -> breeze_ambient::Result<AmbientContext> {
        self.current()
            .await
            .map_err(|e| AmbientError::Source(e.to_string()))
    }
}
