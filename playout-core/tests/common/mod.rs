#![allow(dead_code)]

use std::fs::{self, File};
use std::io::Write;
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeZone, Utc};
use playout_core::{parse_channel_config, ChannelConfig, CommandExecutor, PlayoutHooks};
use serde_json::json;
use tempfile::TempDir;
use tokio::process::Command;

pub fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, h, m, s).unwrap()
}

pub fn fixture_config(root: &Path) -> ChannelConfig {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../configs/channel.toml");
    let content = fs::read_to_string(path)
        .unwrap()
        .replace("/home/ubuntu/media-node-data", &root.to_string_lossy());
    parse_channel_config(&content).unwrap()
}

pub struct Channel {
    pub temp: TempDir,
    pub config: Arc<ChannelConfig>,
}

impl Channel {
    pub fn new() -> Self {
        Self::with(|_| {})
    }

    pub fn with(adjust: impl FnOnce(&mut ChannelConfig)) -> Self {
        let temp = TempDir::new().unwrap();
        let mut config = fixture_config(temp.path());
        adjust(&mut config);
        Self {
            temp,
            config: Arc::new(config),
        }
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    pub fn touch(&self, relative: &str) -> PathBuf {
        let path = self.root().join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, b"media").unwrap();
        path
    }

    pub fn write_day_playlist(&self, date: &str, slots: serde_json::Value) {
        let dir = self
            .root()
            .join("channel-main/playlists")
            .join(date);
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("playlist.json"),
            serde_json::to_string_pretty(&json!({ "date": date, "slots": slots })).unwrap(),
        )
        .unwrap();
    }

    pub fn write_default_playlist(&self, slots: serde_json::Value) {
        let dir = self.root().join("default");
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("playlist.json"),
            serde_json::to_string_pretty(&json!({ "slots": slots })).unwrap(),
        )
        .unwrap();
    }
}

pub fn program(path: &str, name: &str, start: &str, end: &str, trim: (f64, f64)) -> serde_json::Value {
    json!({
        "startAt": start,
        "endAt": end,
        "asset": {
            "id": name,
            "path": path,
            "name": name,
            "isAd": false,
            "startAt": trim.0,
            "endAt": trim.1
        }
    })
}

pub fn slot(name: &str, start: &str, end: &str, programs: Vec<serde_json::Value>) -> serde_json::Value {
    json!({
        "name": name,
        "startAt": start,
        "endAt": end,
        "programs": programs,
        "overlays": []
    })
}

/// Scenario fixture: slot 00:00-06:00 with one hour-long program.
pub fn night_slot() -> serde_json::Value {
    slot(
        "night",
        "2024-03-01T00:00:00.000Z",
        "2024-03-01T06:00:00.000Z",
        vec![program(
            "assets/a1/a1.mp4",
            "Opening Hour",
            "2024-03-01T00:00:00.000Z",
            "2024-03-01T01:00:00.000Z",
            (0.0, 3600.0),
        )],
    )
}

#[derive(Default)]
pub struct FakeExecutor {
    pub calls: Mutex<Vec<Vec<String>>>,
    pub stderr: String,
    pub exit_code: i32,
}

impl FakeExecutor {
    pub fn failing(stderr: &str) -> Self {
        Self {
            stderr: stderr.to_string(),
            exit_code: 1,
            ..Self::default()
        }
    }

    pub fn last_args(&self) -> Vec<String> {
        self.calls.lock().unwrap().last().cloned().unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl CommandExecutor for FakeExecutor {
    async fn run(&self, command: &mut Command, mut stderr: File) -> std::io::Result<ExitStatus> {
        let args = command
            .as_std()
            .get_args()
            .map(|arg| arg.to_string_lossy().to_string())
            .collect();
        self.calls.lock().unwrap().push(args);
        stderr.write_all(self.stderr.as_bytes())?;
        Ok(ExitStatus::from_raw(self.exit_code << 8))
    }
}

#[derive(Default)]
pub struct RecordingHooks {
    pub events: Mutex<Vec<String>>,
}

impl RecordingHooks {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl PlayoutHooks for RecordingHooks {
    async fn on_success(&self) {
        self.events.lock().unwrap().push("success".to_string());
    }

    async fn on_error(&self, message: &str) {
        self.events.lock().unwrap().push(format!("error: {message}"));
    }
}

pub fn value_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|arg| arg == flag)
        .and_then(|idx| args.get(idx + 1))
        .map(String::as_str)
}
