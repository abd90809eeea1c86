//! Selection ranking
//!
//! Candidates are ranked by distance from the current classification, with
//! weather weighted ten times heavier than time of day. A shortlist is built
//! from the best ranks, relaxing the match until it is big enough, and one
//! entry is drawn from it with better ranks more likely.

use crate::catalog::CatalogEntry;
use crate::classify::{distance, Classification};
use rand::distributions::{Distribution, WeightedIndex};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

/// Default shortlist size
pub const SHORTLIST_SIZE: usize = 5;

/// Rank multiplier for weather distance
pub const WEATHER_WEIGHT: usize = 10;

/// A catalog entry with its rank against one classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ranked {
    pub url: String,
    pub label: String,
    pub rank: usize,
}

/// `weather_distance * 10 + time_distance`; lower is better
pub fn rank(entry: &CatalogEntry, target: Classification) -> usize {
    let weather = distance(target.weather, entry.weather.as_deref());
    let time = distance(target.time, entry.time.as_deref());
    weather * WEATHER_WEIGHT + time
}

/// Best-ranked candidates, at most `size` of them, in ascending rank order
///
/// URLs in `exclude` are never considered, and a URL listed twice counts
/// once (its first entry). Whole rank groups are taken in order; the group
/// that would overflow `size` is shuffled and cut.
pub fn shortlist<R: Rng + ?Sized>(
    catalog: &[CatalogEntry],
    target: Classification,
    exclude: &[String],
    size: usize,
    rng: &mut R,
) -> Vec<Ranked> {
    let mut groups: BTreeMap<usize, Vec<&CatalogEntry>> = BTreeMap::new();
    let mut seen = HashSet::new();
    for entry in catalog
        .iter()
        .filter(|e| !exclude.contains(&e.url))
        .filter(|e| seen.insert(e.url.as_str()))
    {
        groups.entry(rank(entry, target)).or_default().push(entry);
    }

    if !groups.contains_key(&0) {
        debug!(context = %target, "No tracks match exactly");
    }

    let mut selected = Vec::with_capacity(size);
    let mut relaxed_steps = 0;

    for (rank, mut group) in groups {
        if selected.len() >= size {
            break;
        }

        let step = rank / WEATHER_WEIGHT;
        if step > relaxed_steps {
            relaxed_steps = step;
            let names: Vec<&str> = target
                .weather
                .neighbours(step)
                .into_iter()
                .map(|w| w.as_str())
                .collect();
            debug!(
                context = %target,
                "Relaxing weather match to include {}",
                names.join(" and ")
            );
        }

        let room = size - selected.len();
        if group.len() > room {
            group.shuffle(rng);
            group.truncate(room);
        }
        selected.extend(group.into_iter().map(|entry| Ranked {
            url: entry.url.clone(),
            label: entry.label().to_string(),
            rank,
        }));
    }

    debug!(context = %target, candidates = selected.len(), "Built shortlist");
    selected
}

/// Draw one entry, weighting each by `max_rank - rank + 1`
pub fn pick<'a, R: Rng + ?Sized>(shortlist: &'a [Ranked], rng: &mut R) -> Option<&'a Ranked> {
    let worst = shortlist.iter().map(|r| r.rank).max()?;
    let weights = shortlist.iter().map(|r| worst - r.rank + 1);
    let index = WeightedIndex::new(weights).ok()?;
    shortlist.get(index.sample(rng))
}

/// Shortlist and pick in one step
pub fn select<R: Rng + ?Sized>(
    catalog: &[CatalogEntry],
    target: Classification,
    exclude: &[String],
    size: usize,
    rng: &mut R,
) -> Option<Ranked> {
    let candidates = shortlist(catalog, target, exclude, size, rng);
    pick(&candidates, rng).cloned()
}
