//! Breeze - Ambient Selection
//!
//! Picks tracks to fit the weather and time of day.
//!
//! This crate provides:
//! - Time-of-day and weather buckets derived from a context sample
//! - A catalog of tracks tagged with the buckets they suit
//! - Distance ranking with progressive relaxation and a weighted draw
//! - An autoplay loop that tops up the playback queue when it runs short
//!
//! # Example
//!
//! ```rust
//! use breeze_ambient::{ranker, CatalogEntry, Classification, TimeOfDay, WeatherType};
//! use rand::SeedableRng;
//!
//! let catalog = vec![
//!     CatalogEntry::new("https://example.com/rainy").with_weather(&[WeatherType::Rain]),
//!     CatalogEntry::new("https://example.com/sunny").with_weather(&[WeatherType::Clear]),
//! ];
//! let now = Classification::new(TimeOfDay::Morning, WeatherType::Clear);
//! let mut rng = rand::rngs::StdRng::seed_from_u64(42);
//!
//! let list = ranker::shortlist(&catalog, now, &[], 1, &mut rng);
//! assert_eq!(list[0].url, "https://example.com/sunny");
//! ```

#![forbid(unsafe_code)]

pub mod autoplay;
pub mod catalog;
pub mod classify;
pub mod context;
pub mod error;
pub mod ranker;

pub use autoplay::{
    queue_contextual_track, run_autoplay, AutoplayConfig, AutoplayScheduler, AutoplayToggle,
};
pub use catalog::{
    parse_catalog, CatalogEntry, CatalogFormat, CatalogStore, FileCatalogStore, StaticCatalog,
};
pub use classify::{time_of_day, weather_type, Bucket, Classification, TimeOfDay, WeatherType};
pub use context::{run_context_poller, AmbientContext, ContextCell, ContextSource, ContextUpdate};
pub use error::{AmbientError, ClassifyError, Result};
pub use ranker::{Ranked, SHORTLIST_SIZE};
