/// Stream resolver - yt-dlp wrapper for track metadata and audio stream URLs
use crate::error::{DaemonError, Result};
use async_trait::async_trait;
use breeze_playback::{Chapter, PlaybackError, ResolvedTrack, StreamResolver};
use serde::Deserialize;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Same preference as [`best_audio`]: opus first, then any audio-only stream
const AUDIO_FORMAT: &str = "bestaudio[acodec=opus]/bestaudio";

#[derive(Debug, Deserialize)]
struct VideoInfo {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    thumbnail: Option<String>,
    #[serde(default)]
    chapters: Option<Vec<ChapterInfo>>,
    #[serde(default)]
    formats: Vec<FormatInfo>,
}

#[derive(Debug, Deserialize)]
struct ChapterInfo {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    start_time: Option<f64>,
    #[serde(default)]
    end_time: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct FormatInfo {
    url: String,
    #[serde(default)]
    acodec: Option<String>,
    #[serde(default)]
    vcodec: Option<String>,
    #[serde(default)]
    abr: Option<f64>,
}

impl FormatInfo {
    fn bitrate(&self) -> f64 {
        self.abr.unwrap_or(0.0)
    }

    fn is_audio_only(&self) -> bool {
        let has_audio = matches!(self.acodec.as_deref(), Some(c) if c != "none");
        let has_video = matches!(self.vcodec.as_deref(), Some(c) if c != "none");
        has_audio && !has_video
    }
}

/// Opus stream with the highest bitrate, else the best audio-only stream
fn best_audio(formats: &[FormatInfo]) -> Option<&FormatInfo> {
    let by_bitrate = |a: &&FormatInfo, b: &&FormatInfo| a.bitrate().total_cmp(&b.bitrate());

    formats
        .iter()
        .filter(|f| f.acodec.as_deref() == Some("opus"))
        .max_by(by_bitrate)
        .or_else(|| formats.iter().filter(|f| f.is_audio_only()).max_by(by_bitrate))
}

/// Turn `yt-dlp -J` output into a resolved track
pub fn parse_video_info(raw: &[u8]) -> Result<ResolvedTrack> {
    let info: VideoInfo = serde_json::from_slice(raw)?;

    let stream_url = best_audio(&info.formats)
        .map(|f| f.url.clone())
        .ok_or_else(|| DaemonError::Process("no audio streams found".to_string()))?;

    let chapters = info
        .chapters
        .unwrap_or_default()
        .into_iter()
        .filter_map(|c| {
            let title = c.title.filter(|t| !t.is_empty())?;
            Some(Chapter {
                title,
                start_time: c.start_time?,
                end_time: c.end_time,
            })
        })
        .collect();

    Ok(ResolvedTrack {
        title: info.title.unwrap_or_else(|| "Unknown".to_string()),
        duration: info.duration.unwrap_or(0.0),
        thumbnail: info.thumbnail,
        chapters,
        stream_url,
    })
}

#[derive(Debug, Clone)]
pub struct YtDlpResolver {
    ytdlp_path: PathBuf,
}

impl YtDlpResolver {
    pub fn new(ytdlp_path: PathBuf) -> Self {
        Self { ytdlp_path }
    }

    /// Full metadata for `url` from one `yt-dlp -J` run
    pub async fn extract(&self, url: &str) -> Result<ResolvedTrack> {
        debug!(url = %url, "Running yt-dlp for metadata");
        let stdout = self.run(&["-J", "--no-warnings", "--no-playlist", url]).await?;
        parse_video_info(&stdout)
    }

    /// Stream URL only, without the metadata dump
    pub async fn fresh_stream_url(&self, url: &str) -> Result<String> {
        debug!(url = %url, "Running yt-dlp for a stream URL");
        let stdout = self
            .run(&["-g", "-f", AUDIO_FORMAT, "--no-warnings", "--no-playlist", url])
            .await?;
        parse_stream_url(&stdout)
    }

    async fn run(&self, args: &[&str]) -> Result<Vec<u8>> {
        let output = Command::new(&self.ytdlp_path)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DaemonError::Process(format!(
                "yt-dlp failed: {}",
                stderr.trim()
            )));
        }
        Ok(output.stdout)
    }
}

/// First URL printed by `yt-dlp -g`
pub fn parse_stream_url(stdout: &[u8]) -> Result<String> {
    String::from_utf8_lossy(stdout)
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
        .ok_or_else(|| DaemonError::Process("yt-dlp printed no stream URL".to_string()))
}

#[async_trait]
impl StreamResolver for YtDlpResolver {
    async fn resolve(&self, url: &str) -> breeze_playback::Result<ResolvedTrack> {
        self.extract(url)
            .await
            .map_err(|e| PlaybackError::Resolve(e.to_string()))
    }

    /// Used when a track has no stream yet or its stream stopped loading
    async fn stream_url(&self, url: &str) -> breeze_playback::Result<String> {
        self.fresh_stream_url(url)
            .await
            .map_err(|e| PlaybackError::Resolve(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefers_highest_bitrate_opus() {
        let raw = br#"{
            "title": "Rainy Day Mix",
            "duration": 3600.5,
            "thumbnail": "https://img.example.com/t.jpg",
            "formats": [
                {"url": "https://cdn/opus-low", "acodec": "opus", "vcodec": "none", "abr": 48.0},
                {"url": "https://cdn/opus-high", "acodec": "opus", "vcodec": "none", "abr": 160.0},
                {"url": "https://cdn/aac", "acodec": "mp4a.40.2", "vcodec": "none", "abr": 256.0},
                {"url": "https://cdn/video", "acodec": "none", "vcodec": "avc1"}
            ]
        }"#;

        let track = parse_video_info(raw).unwrap();
        assert_eq!(track.stream_url, "https://cdn/opus-high");
        assert_eq!(track.title, "Rainy Day Mix");
        assert_eq!(track.duration, 3600.5);
    }

    #[test]
    fn test_falls_back_to_audio_only_stream() {
        let raw = br#"{
            "formats": [
                {"url": "https://cdn/muxed", "acodec": "mp4a.40.2", "vcodec": "avc1", "abr": 320.0},
                {"url": "https://cdn/m4a", "acodec": "mp4a.40.2", "vcodec": "none", "abr": 128.0}
            ]
        }"#;

        let track = parse_video_info(raw).unwrap();
        assert_eq!(track.stream_url, "https://cdn/m4a");
        assert_eq!(track.title, "Unknown");
    }

    #[test]
    fn test_no_audio_is_error() {
        let raw = br#"{"formats": [{"url": "https://cdn/video", "acodec": "none", "vcodec": "vp9"}]}"#;
        assert!(matches!(parse_video_info(raw), Err(DaemonError::Process(_))));
    }

    #[test]
    fn test_parse_stream_url() {
        let stdout = b"\nhttps://cdn.example.com/audio.webm\nhttps://cdn.example.com/other\n";
        assert_eq!(
            parse_stream_url(stdout).unwrap(),
            "https://cdn.example.com/audio.webm"
        );
        assert!(matches!(parse_stream_url(b"  \n"), Err(DaemonError::Process(_))));
    }

    #[test]
    fn test_chapters_need_title_and_start() {
        let raw = br#"{
            "formats": [{"url": "u", "acodec": "opus", "abr": 1.0}],
            "chapters": [
                {"title": "Intro", "start_time": 0.0, "end_time": 30.0},
                {"title": "", "start_time": 30.0},
                {"title": "Untimed"},
                {"title": "Main", "start_time": 60.0}
            ]
        }"#;

        let track = parse_video_info(raw).unwrap();
        let titles: Vec<&str> = track.chapters.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["Intro", "Main"]);
        assert_eq!(track.chapters[0].end_time, Some(30.0));
    }
}
