/// Player backend - mpv driven over its JSON IPC socket
use crate::config::PlayerSettings;
use crate::error::{DaemonError, Result};
use async_trait::async_trait;
use breeze_playback::{PlaybackError, PlayerBackend, PlayerEvent};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// Attempts to connect while mpv creates its socket
const CONNECT_ATTEMPTS: u32 = 50;
const CONNECT_RETRY_DELAY: Duration = Duration::from_millis(100);

type Reply = std::result::Result<Value, String>;
type PendingReplies = Arc<Mutex<HashMap<u64, oneshot::Sender<Reply>>>>;

#[derive(Debug, Deserialize)]
struct IpcMessage {
    #[serde(default)]
    request_id: Option<u64>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    event: Option<String>,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    file_error: Option<String>,
}

/// A decoded line from the IPC socket
#[derive(Debug, PartialEq)]
pub enum Incoming {
    Reply { request_id: u64, reply: Reply },
    Event(PlayerEvent),
    Ignored,
}

/// Decode one JSON line sent by mpv
///
/// Only `end-file` events with reason `eof` or `error` matter; an `end-file`
/// caused by replacing or stopping the media is ignored.
pub fn parse_ipc_line(line: &str) -> Result<Incoming> {
    let message: IpcMessage = serde_json::from_str(line)?;

    if let Some(request_id) = message.request_id {
        let reply = match message.error.as_deref() {
            None | Some("success") => Ok(message.data.unwrap_or(Value::Null)),
            Some(error) => Err(error.to_string()),
        };
        return Ok(Incoming::Reply { request_id, reply });
    }

    if message.event.as_deref() != Some("end-file") {
        return Ok(Incoming::Ignored);
    }
    Ok(match message.reason.as_deref() {
        Some("eof") => Incoming::Event(PlayerEvent::EndReached),
        Some("error") => Incoming::Event(PlayerEvent::Error(
            message
                .file_error
                .unwrap_or_else(|| "unknown playback error".to_string()),
        )),
        _ => Incoming::Ignored,
    })
}

pub struct MpvPlayer {
    writer: OwnedWriteHalf,
    pending: PendingReplies,
    next_request_id: u64,
    process: Option<Child>,
}

impl MpvPlayer {
    /// Launch an idle mpv and connect to its IPC socket
    pub async fn spawn(settings: &PlayerSettings, events: mpsc::Sender<PlayerEvent>) -> Result<Self> {
        if settings.socket_path.exists() {
            tokio::fs::remove_file(&settings.socket_path).await?;
        }

        let process = Command::new(&settings.mpv_path)
            .arg("--idle=yes")
            .arg("--no-video")
            .arg("--no-terminal")
            .arg(format!(
                "--input-ipc-server={}",
                settings.socket_path.display()
            ))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| DaemonError::Process(format!("failed to start mpv: {e}")))?;
        info!(socket = %settings.socket_path.display(), "Started mpv");

        let mut attempts = 0;
        let stream = loop {
            match UnixStream::connect(&settings.socket_path).await {
                Ok(stream) => break stream,
                Err(err) if attempts < CONNECT_ATTEMPTS => {
                    attempts += 1;
                    debug!(attempt = attempts, error = %err, "Waiting for mpv socket");
                    tokio::time::sleep(CONNECT_RETRY_DELAY).await;
                }
                Err(err) => {
                    return Err(DaemonError::Ipc(format!(
                        "mpv socket never became available: {err}"
                    )))
                }
            }
        };

        let mut player = Self::from_stream(stream, events);
        player.process = Some(process);
        Ok(player)
    }

    /// Connect to an mpv that is already running
    pub async fn connect(socket_path: &Path, events: mpsc::Sender<PlayerEvent>) -> Result<Self> {
        let stream = UnixStream::connect(socket_path).await?;
        Ok(Self::from_stream(stream, events))
    }

    fn from_stream(stream: UnixStream, events: mpsc::Sender<PlayerEvent>) -> Self {
        let (reader, writer) = stream.into_split();
        let pending = PendingReplies::default();
        tokio::spawn(read_messages(reader, Arc::clone(&pending), events));

        Self {
            writer,
            pending,
            next_request_id: 0,
            process: None,
        }
    }

    async fn command(&mut self, args: Value) -> Result<Value> {
        self.next_request_id += 1;
        let request_id = self.next_request_id;
        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(request_id, tx);
        let _entry = PendingEntry {
            pending: Arc::clone(&self.pending),
            request_id,
        };

        let mut line = serde_json::to_string(&json!({
            "command": &args,
            "request_id": request_id,
        }))?;
        line.push('\n');
        self.writer.write_all(line.as_bytes()).await?;

        rx.await
            .map_err(|_| DaemonError::Ipc("mpv connection closed".to_string()))?
            .map_err(|error| DaemonError::Ipc(format!("{args}: {error}")))
    }

    async fn set_pause(&mut self, paused: bool) -> Result<()> {
        self.command(json!(["set_property", "pause", paused])).await?;
        Ok(())
    }
}

/// Removes a request's reply slot when its command finishes or is dropped
struct PendingEntry {
    pending: PendingReplies,
    request_id: u64,
}

impl Drop for PendingEntry {
    fn drop(&mut self) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.request_id);
    }
}

async fn read_messages(
    reader: OwnedReadHalf,
    pending: PendingReplies,
    events: mpsc::Sender<PlayerEvent>,
) {
    let mut lines = BufReader::new(reader).lines();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match parse_ipc_line(&line) {
                Ok(Incoming::Reply { request_id, reply }) => {
                    let waiter = pending
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .remove(&request_id);
                    if let Some(waiter) = waiter {
                        let _ = waiter.send(reply);
                    }
                }
                Ok(Incoming::Event(event)) => {
                    debug!(event = ?event, "mpv event");
                    if events.send(event).await.is_err() {
                        debug!("Player event receiver dropped");
                    }
                }
                Ok(Incoming::Ignored) => {}
                Err(err) => warn!(error = %err, "Unreadable mpv message"),
            },
            Ok(None) => {
                warn!("mpv closed the IPC connection");
                break;
            }
            Err(err) => {
                warn!(error = %err, "Reading from mpv failed");
                break;
            }
        }
    }

    // Fail any command still waiting for a reply
    pending
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clear();
}

fn player_error(err: DaemonError) -> PlaybackError {
    PlaybackError::Player(err.to_string())
}

#[async_trait]
impl PlayerBackend for MpvPlayer {
    async fn load(&mut self, stream_url: &str) -> breeze_playback::Result<()> {
        self.set_pause(true).await.map_err(player_error)?;
        self.command(json!(["loadfile", stream_url, "replace"]))
            .await
            .map_err(player_error)?;
        Ok(())
    }

    async fn play(&mut self) -> breeze_playback::Result<()> {
        self.set_pause(false).await.map_err(player_error)
    }

    async fn pause(&mut self) -> breeze_playback::Result<()> {
        self.set_pause(true).await.map_err(player_error)
    }

    async fn stop(&mut self) -> breeze_playback::Result<()> {
        self.command(json!(["stop"])).await.map_err(player_error)?;
        Ok(())
    }

    async fn seek(&mut self, seconds: f64) -> breeze_playback::Result<()> {
        self.command(json!(["seek", seconds, "absolute"]))
            .await
            .map_err(player_error)?;
        Ok(())
    }

    async fn set_volume(&mut self, level: u8) -> breeze_playback::Result<()> {
        self.command(json!(["set_property", "volume", level]))
            .await
            .map_err(player_error)?;
        Ok(())
    }

    async fn position(&mut self) -> breeze_playback::Result<f64> {
        match self.command(json!(["get_property", "time-pos"])).await {
            Ok(value) => Ok(value.as_f64().unwrap_or(0.0)),
            // Reported while a stream is still opening
            Err(DaemonError::Ipc(message)) if message.ends_with("property unavailable") => Ok(0.0),
            Err(err) => Err(player_error(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reply() {
        let incoming = parse_ipc_line(r#"{"data": 12.5, "error": "success", "request_id": 3}"#).unwrap();
        assert_eq!(
            incoming,
            Incoming::Reply {
                request_id: 3,
                reply: Ok(json!(12.5)),
            }
        );

        let failed =
            parse_ipc_line(r#"{"error": "property unavailable", "request_id": 4}"#).unwrap();
        assert_eq!(
            failed,
            Incoming::Reply {
                request_id: 4,
                reply: Err("property unavailable".to_string()),
            }
        );
    }

    #[test]
    fn test_parse_end_file_events() {
        assert_eq!(
            parse_ipc_line(r#"{"event": "end-file", "reason": "eof", "playlist_entry_id": 1}"#)
                .unwrap(),
            Incoming::Event(PlayerEvent::EndReached)
        );
        assert_eq!(
            parse_ipc_line(
                r#"{"event": "end-file", "reason": "error", "file_error": "loading failed"}"#
            )
            .unwrap(),
            Incoming::Event(PlayerEvent::Error("loading failed".to_string()))
        );
        assert_eq!(
            parse_ipc_line(r#"{"event": "end-file", "reason": "stop"}"#).unwrap(),
            Incoming::Ignored
        );
        assert_eq!(
            parse_ipc_line(r#"{"event": "playback-restart"}"#).unwrap(),
            Incoming::Ignored
        );
    }

    #[test]
    fn test_parse_garbage() {
        assert!(parse_ipc_line("not json").is_err());
    }

    #[tokio::test]
    async fn test_abandoned_command_frees_reply_slot() {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("mpv.sock");
        let listener = tokio::net::UnixListener::bind(&socket).unwrap();

        // Accepts requests but never answers them
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut lines = BufReader::new(stream).lines();
            while lines.next_line().await.unwrap().is_some() {}
        });

        let (events_tx, _events_rx) = mpsc::channel(4);
        let mut player = MpvPlayer::connect(&socket, events_tx).await.unwrap();

        let result = breeze_playback::with_timeout(
            "position",
            Duration::from_millis(50),
            player.position(),
        )
        .await;

        assert!(matches!(result, Err(PlaybackError::Timeout { .. })));
        assert!(player.pending.lock().unwrap().is_empty());

        drop(player);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_commands_round_trip_over_socket() {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("mpv.sock");
        let listener = tokio::net::UnixListener::bind(&socket).unwrap();

        // Minimal mpv stand-in: answers every request, then reports end of file
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (reader, mut writer) = stream.into_split();
            let mut lines = BufReader::new(reader).lines();
            while let Some(line) = lines.next_line().await.unwrap() {
                let request: Value = serde_json::from_str(&line).unwrap();
                let id = request["request_id"].as_u64().unwrap();
                let data = if request["command"][1] == "time-pos" {
                    json!(42.0)
                } else {
                    Value::Null
                };
                let reply = json!({"request_id": id, "error": "success", "data": data});
                writer
                    .write_all(format!("{reply}\n").as_bytes())
                    .await
                    .unwrap();
                if request["command"][0] == "stop" {
                    writer
                        .write_all(b"{\"event\":\"end-file\",\"reason\":\"eof\"}\n")
                        .await
                        .unwrap();
                }
            }
        });

        let (events_tx, mut events_rx) = mpsc::channel(4);
        let mut player = MpvPlayer::connect(&socket, events_tx).await.unwrap();

        player.load("https://cdn/stream").await.unwrap();
        assert_eq!(player.position().await.unwrap(), 42.0);
        player.stop().await.unwrap();
        assert_eq!(events_rx.recv().await, Some(PlayerEvent::EndReached));

        drop(player);
        server.await.unwrap();
    }
}
