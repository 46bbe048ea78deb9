use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tracing::debug;

use crate::config::ChannelConfig;

use super::models::Playlist;
use super::{ScheduleError, ScheduleResult};

/// Read-only view over the channel's playlist files.
#[derive(Debug, Clone)]
pub struct PlaylistStore {
    playlists_dir: PathBuf,
    default_playlist: Option<PathBuf>,
}

impl PlaylistStore {
    pub fn new(config: &ChannelConfig) -> Self {
        Self {
            playlists_dir: config
                .root_dir()
                .join(&config.channel.stream_id)
                .join("playlists"),
            default_playlist: config.default_playlist_path(),
        }
    }

    pub fn day_playlist_path(&self, date: NaiveDate) -> PathBuf {
        self.playlists_dir
            .join(date.format("%Y-%m-%d").to_string())
            .join("playlist.json")
    }

    pub fn load_day(&self, date: NaiveDate) -> ScheduleResult<Option<Playlist>> {
        let path = self.day_playlist_path(date);
        read_playlist(&path)
    }

    pub fn load_default(&self) -> ScheduleResult<Option<Playlist>> {
        match &self.default_playlist {
            Some(path) => read_playlist(path),
            None => {
                debug!("no default playlist configured");
                Ok(None)
            }
        }
    }
}

fn read_playlist(path: &Path) -> ScheduleResult<Option<Playlist>> {
    if !path.exists() {
        debug!(path = %path.display(), "playlist file absent");
        return Ok(None);
    }
    let content = std::fs::read_to_string(path).map_err(|source| ScheduleError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let playlist = serde_json::from_str(&content).map_err(|source| ScheduleError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Some(playlist))
}
