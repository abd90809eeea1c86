//! Track catalog
//!
//! Each entry says which weather and time-of-day buckets a track suits. A
//! missing bucket list matches everything.

use crate::classify::{TimeOfDay, WeatherType};
use crate::error::{AmbientError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    #[serde(alias = "song_url", alias = "track_url")]
    pub url: String,

    #[serde(default, alias = "name", skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(default)]
    pub weather: Option<Vec<WeatherType>>,

    #[serde(default)]
    pub time: Option<Vec<TimeOfDay>>,
}

impl CatalogEntry {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            display_name: None,
            weather: None,
            time: None,
        }
    }

    #[must_use]
    pub fn with_weather(mut self, weather: &[WeatherType]) -> Self {
        self.weather = Some(weather.to_vec());
        self
    }

    #[must_use]
    pub fn with_time(mut self, time: &[TimeOfDay]) -> Self {
        self.time = Some(time.to_vec());
        self
    }

    /// Name to show in logs and listings
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.url)
    }
}

/// Source of catalog entries, read fresh before every selection
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn load(&self) -> Result<Vec<CatalogEntry>>;
}

/// On-disk layouts accepted by [`FileCatalogStore`]
#[derive(Deserialize)]
#[serde(untagged)]
enum CatalogFile {
    Wrapped { songs: Vec<CatalogEntry> },
    Bare(Vec<CatalogEntry>),
}

/// Serialization of a catalog file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogFormat {
    Json,
    Yaml,
}

impl CatalogFormat {
    /// `.yaml` and `.yml` files are YAML, anything else is JSON
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                Self::Yaml
            }
            _ => Self::Json,
        }
    }
}

/// Catalog stored as a JSON or YAML file
///
/// Accepts either a `songs:` list or a bare list of entries.
#[derive(Debug, Clone)]
pub struct FileCatalogStore {
    path: PathBuf,
    format: CatalogFormat,
}

impl FileCatalogStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let format = CatalogFormat::from_path(&path);
        Self { path, format }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> CatalogFormat {
        self.format
    }
}

/// Parse a catalog in either accepted layout
///
/// Entries are keyed by URL: a repeated URL keeps its first position and
/// takes the tags of its last entry.
pub fn parse_catalog(raw: &str, format: CatalogFormat) -> Result<Vec<CatalogEntry>> {
    let file = match format {
        CatalogFormat::Json => serde_json::from_str::<CatalogFile>(raw)?,
        CatalogFormat::Yaml => serde_yaml::from_str::<CatalogFile>(raw)?,
    };
    let entries = match file {
        CatalogFile::Wrapped { songs } => songs,
        CatalogFile::Bare(entries) => entries,
    };
    Ok(dedupe_by_url(entries))
}

fn dedupe_by_url(entries: Vec<CatalogEntry>) -> Vec<CatalogEntry> {
    let mut positions: HashMap<String, usize> = HashMap::with_capacity(entries.len());
    let mut unique: Vec<CatalogEntry> = Vec::with_capacity(entries.len());

    for entry in entries {
        match positions.get(&entry.url) {
            Some(&index) => {
                warn!(url = %entry.url, "Catalog lists a URL twice, keeping the later tags");
                unique[index] = entry;
            }
            None => {
                positions.insert(entry.url.clone(), unique.len());
                unique.push(entry);
            }
        }
    }
    unique
}

#[async_trait]
impl CatalogStore for FileCatalogStore {
    async fn load(&self) -> Result<Vec<CatalogEntry>> {
        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            AmbientError::Catalog(format!("failed to read {}: {e}", self.path.display()))
        })?;
        let entries = parse_catalog(&raw, self.format)?;
        debug!(path = %self.path.display(), entries = entries.len(), "Loaded catalog");
        Ok(entries)
    }
}

/// Fixed in-memory catalog
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    entries: Vec<CatalogEntry>,
}

impl StaticCatalog {
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        Self { entries }
    }
}

#[async_trait]
impl CatalogStore for StaticCatalog {
    async fn load(&self) -> Result<Vec<CatalogEntry>> {
        Ok(self.entries.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_wrapped_layout() {
        let raw = r#"{
            "songs": [
                {"song_url": "https://example.com/a", "weather": ["rain", "drizzle"], "time": null},
                {"song_url": "https://example.com/b", "name": "Sunny", "weather": null, "time": ["morning"]}
            ]
        }"#;
        let entries = parse_catalog(raw, CatalogFormat::Json).unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(
            entries[0].weather,
            Some(vec![WeatherType::Rain, WeatherType::Drizzle])
        );
        assert!(entries[0].time.is_none());
        assert_eq!(entries[1].label(), "Sunny");
        assert_eq!(entries[1].time, Some(vec![TimeOfDay::Morning]));
    }

    #[test]
    fn test_parse_bare_layout_with_missing_fields() {
        let raw = r#"[{"url": "https://example.com/c"}]"#;
        let entries = parse_catalog(raw, CatalogFormat::Json).unwrap();

        assert_eq!(entries, vec![CatalogEntry::new("https://example.com/c")]);
        assert_eq!(entries[0].label(), "https://example.com/c");
    }

    #[test]
    fn test_parse_rejects_unknown_bucket() {
        let raw = r#"[{"url": "u", "weather": ["hail"]}]"#;
        assert!(parse_catalog(raw, CatalogFormat::Json).is_err());
    }

    #[test]
    fn test_parse_yaml_layout() {
        let raw = r#"
songs:
  - song_url: https://example.com/storm
    weather: [thunderstorm, rain]
    time: [evening, night]
  - song_url: https://example.com/anytime
    weather: null
    time: null
"#;
        let entries = parse_catalog(raw, CatalogFormat::Yaml).unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(
            entries[0].weather,
            Some(vec![WeatherType::Thunderstorm, WeatherType::Rain])
        );
        assert_eq!(
            entries[0].time,
            Some(vec![TimeOfDay::Evening, TimeOfDay::Night])
        );
        assert_eq!(entries[1], CatalogEntry::new("https://example.com/anytime"));
    }

    #[test]
    fn test_repeated_url_keeps_position_and_last_tags() {
        let raw = r#"[
            {"url": "https://example.com/a", "weather": ["snow"]},
            {"url": "https://example.com/b"},
            {"url": "https://example.com/a", "weather": ["clear"]}
        ]"#;
        let entries = parse_catalog(raw, CatalogFormat::Json).unwrap();

        let urls: Vec<&str> = entries.iter().map(|e| e.url.as_str()).collect();
        assert_eq!(urls, vec!["https://example.com/a", "https://example.com/b"]);
        assert_eq!(entries[0].weather, Some(vec![WeatherType::Clear]));
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            CatalogFormat::from_path(Path::new("stored_songs.yaml")),
            CatalogFormat::Yaml
        );
        assert_eq!(CatalogFormat::from_path(Path::new("songs.YML")), CatalogFormat::Yaml);
        assert_eq!(CatalogFormat::from_path(Path::new("catalog.json")), CatalogFormat::Json);
        assert_eq!(CatalogFormat::from_path(Path::new("catalog")), CatalogFormat::Json);
    }

    #[tokio::test]
    async fn test_yaml_store_reads_json_text() {
        // YAML is a superset of JSON, so older JSON-bodied .yaml files still load
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stored_songs.yaml");
        std::fs::write(
            &path,
            r#"{"songs": [{"song_url": "https://example.com/x", "weather": ["mist"], "time": ["day"]}]}"#,
        )
        .unwrap();
        let store = FileCatalogStore::new(&path);

        assert_eq!(store.format(), CatalogFormat::Yaml);
        let entries = store.load().await.unwrap();
        assert_eq!(entries[0].weather, Some(vec![WeatherType::Mist]));
    }

    #[tokio::test]
    async fn test_file_store_rereads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"[{{"url": "https://example.com/1"}}]"#).unwrap();
        let store = FileCatalogStore::new(file.path());

        assert_eq!(store.load().await.unwrap().len(), 1);

        std::fs::write(
            file.path(),
            r#"[{"url": "https://example.com/1"}, {"url": "https://example.com/2"}]"#,
        )
        .unwrap();
        assert_eq!(store.load().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_file_store_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCatalogStore::new(dir.path().join("missing.json"));

        assert!(matches!(store.load().await, Err(AmbientError::Catalog(_))));
    }
}
