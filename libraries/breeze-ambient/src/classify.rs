//! Context classification
//!
//! Maps a raw context sample onto ordered time-of-day and weather buckets.
//! Bucket order is what the ranker measures distance in, so the variant
//! order of both enums is significant.

use crate::context::AmbientContext;
use crate::error::ClassifyError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An ordered classification bucket
pub trait Bucket: Copy {
    /// Position along the bucket's axis
    fn ordinal(self) -> usize;
}

/// Distance from `target` to the closest of `candidates`
///
/// `None` or an empty set is a wildcard and matches at distance 0.
pub fn distance<B: Bucket>(target: B, candidates: Option<&[B]>) -> usize {
    candidates
        .and_then(|set| {
            set.iter()
                .map(|b| b.ordinal().abs_diff(target.ordinal()))
                .min()
        })
        .unwrap_or(0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeOfDay {
    Morning,
    Day,
    Evening,
    Night,
}

impl TimeOfDay {
    pub const ALL: [TimeOfDay; 4] = [Self::Morning, Self::Day, Self::Evening, Self::Night];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Morning => "morning",
            Self::Day => "day",
            Self::Evening => "evening",
            Self::Night => "night",
        }
    }
}

impl Bucket for TimeOfDay {
    fn ordinal(self) -> usize {
        self as usize
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeOfDay {
    type Err = ClassifyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ClassifyError::UnknownTimeOfDay(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum WeatherType {
    Clear,
    Clouds,
    Drizzle,
    Rain,
    Thunderstorm,
    Snow,
    Mist,
}

impl WeatherType {
    pub const ALL: [WeatherType; 7] = [
        Self::Clear,
        Self::Clouds,
        Self::Drizzle,
        Self::Rain,
        Self::Thunderstorm,
        Self::Snow,
        Self::Mist,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Clear => "clear",
            Self::Clouds => "clouds",
            Self::Drizzle => "drizzle",
            Self::Rain => "rain",
            Self::Thunderstorm => "thunderstorm",
            Self::Snow => "snow",
            Self::Mist => "mist",
        }
    }

    /// Bucket `steps` positions away on either side, where they exist
    pub fn neighbours(self, steps: usize) -> Vec<WeatherType> {
        let index = self.ordinal();
        [index.checked_add(steps), index.checked_sub(steps)]
            .into_iter()
            .flatten()
            .filter_map(|i| Self::ALL.get(i).copied())
            .collect()
    }
}

impl Bucket for WeatherType {
    fn ordinal(self) -> usize {
        self as usize
    }
}

impl fmt::Display for WeatherType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parses the first word of a weather condition
///
/// "Clear sky" is `Clear`. The atmosphere group (dust, haze, fog, ...) all
/// land on `Mist`.
impl FromStr for WeatherType {
    type Err = ClassifyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s
            .split_whitespace()
            .next()
            .ok_or(ClassifyError::EmptyWeather)?
            .to_lowercase();

        match token.as_str() {
            "clear" => Ok(Self::Clear),
            "clouds" => Ok(Self::Clouds),
            "drizzle" => Ok(Self::Drizzle),
            "rain" => Ok(Self::Rain),
            "thunderstorm" => Ok(Self::Thunderstorm),
            "snow" => Ok(Self::Snow),
            "mist" | "atmosphere" | "dust" | "haze" | "smoke" | "fog" | "sand" | "ash"
            | "squall" | "tornado" => Ok(Self::Mist),
            _ => Err(ClassifyError::UnknownWeather(s.to_string())),
        }
    }
}

impl TryFrom<String> for WeatherType {
    type Error = ClassifyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Time-of-day bucket for `now` relative to the sample's sunrise and sunset
///
/// Bounds are inclusive and checked in order.
pub fn time_of_day(context: &AmbientContext, now: DateTime<Utc>) -> TimeOfDay {
    let sunrise = context.sunrise;
    let sunset = context.sunset;
    let midday = sunrise + (sunset - sunrise) / 2;
    let half_hour = Duration::minutes(30);

    if now <= sunrise - half_hour {
        TimeOfDay::Night
    } else if now <= sunrise + half_hour || now <= midday {
        TimeOfDay::Morning
    } else if now <= sunset - half_hour {
        TimeOfDay::Day
    } else if now <= sunset + Duration::hours(2) {
        TimeOfDay::Evening
    } else {
        TimeOfDay::Night
    }
}

pub fn weather_type(context: &AmbientContext) -> Result<WeatherType, ClassifyError> {
    context.weather_main.parse()
}

/// Both buckets for one context sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub time: TimeOfDay,
    pub weather: WeatherType,
}

impl Classification {
    pub fn new(time: TimeOfDay, weather: WeatherType) -> Self {
        Self { time, weather }
    }

    pub fn of(context: &AmbientContext, now: DateTime<Utc>) -> Result<Self, ClassifyError> {
        Ok(Self {
            time: time_of_day(context, now),
            weather: weather_type(context)?,
        })
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.time, self.weather)
    }
}
