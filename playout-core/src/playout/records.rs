use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{RecordError, RecordResult};

pub const PLAYOUT_FILE: &str = "playout.json";
pub const DETAILS_FILE: &str = "details.json";

/// One line of the "what is airing" record. `in`/`out` are seconds from the
/// slot start.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayoutEntry {
    pub title: String,
    pub file: String,
    #[serde(default)]
    pub thumbnail: Option<String>,
    pub ad: bool,
    #[serde(rename = "in")]
    pub in_secs: i64,
    #[serde(rename = "out")]
    pub out_secs: i64,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DetailsRecord {
    pub slot_name: String,
    pub start_time: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
    pub diff: i64,
}

/// Output locations for one invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunDirectories {
    pub run_dir: PathBuf,
    pub now_playing_dir: PathBuf,
}

impl RunDirectories {
    pub fn for_run(root: &Path, now: DateTime<Utc>) -> Self {
        let base = root.join("playoutfiles");
        Self {
            run_dir: base
                .join(now.format("%Y-%m-%d").to_string())
                .join(now.format("%H%M").to_string()),
            now_playing_dir: base.join("nowPlaying"),
        }
    }

    pub fn ensure(&self) -> RecordResult<()> {
        for dir in [&self.run_dir, &self.now_playing_dir] {
            fs::create_dir_all(dir).map_err(|source| RecordError::Io {
                path: dir.clone(),
                source,
            })?;
        }
        Ok(())
    }
}

/// Single-writer store for the "now playing" snapshot of a channel.
#[derive(Debug, Clone)]
pub struct RecordStore {
    now_playing_dir: PathBuf,
}

impl RecordStore {
    pub fn new(root: &Path) -> Self {
        Self {
            now_playing_dir: root.join("playoutfiles").join("nowPlaying"),
        }
    }

    pub fn now_playing_dir(&self) -> &Path {
        &self.now_playing_dir
    }

    /// Previous run's record; anything unreadable counts as no record.
    pub fn load_previous(&self) -> Vec<PlayoutEntry> {
        let path = self.now_playing_dir.join(PLAYOUT_FILE);
        if !path.exists() {
            debug!(path = %path.display(), "no previous playout record");
            return Vec::new();
        }
        match read_json::<Vec<PlayoutEntry>>(&path) {
            Ok(entries) => entries,
            Err(error) => {
                warn!(path = %path.display(), %error, "ignoring unreadable playout record");
                Vec::new()
            }
        }
    }

    pub fn load_details(&self) -> RecordResult<Option<DetailsRecord>> {
        let path = self.now_playing_dir.join(DETAILS_FILE);
        if !path.exists() {
            return Ok(None);
        }
        read_json(&path).map(Some)
    }

    /// Writes both records into `run_dir`, then copies them into nowPlaying.
    pub fn persist(
        &self,
        run_dir: &Path,
        record: &[PlayoutEntry],
        details: &DetailsRecord,
    ) -> RecordResult<()> {
        let playout_path = run_dir.join(PLAYOUT_FILE);
        let details_path = run_dir.join(DETAILS_FILE);
        write_json(&playout_path, &record)?;
        write_json(&details_path, details)?;
        copy_into(&details_path, &self.now_playing_dir)?;
        copy_into(&playout_path, &self.now_playing_dir)?;
        debug!(run_dir = %run_dir.display(), entries = record.len(), "playout records persisted");
        Ok(())
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> RecordResult<T> {
    let content = fs::read_to_string(path).map_err(|source| RecordError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_str(&content)?)
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> RecordResult<()> {
    let content = serde_json::to_string_pretty(value)?;
    fs::write(path, content).map_err(|source| RecordError::Io {
        path: path.to_path_buf(),
        source,
    })
}

pub(crate) fn copy_into(file: &Path, dir: &Path) -> RecordResult<()> {
    let Some(name) = file.file_name() else {
        return Ok(());
    };
    let target = dir.join(name);
    fs::copy(file, &target).map_err(|source| RecordError::Io {
        path: target.clone(),
        source,
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn entry(file: &str) -> PlayoutEntry {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        PlayoutEntry {
            title: "Opening".into(),
            file: file.into(),
            thumbnail: None,
            ad: false,
            in_secs: 0,
            out_secs: 3600,
            start_at: start,
            end_at: start + chrono::Duration::seconds(3600),
        }
    }

    #[test]
    fn run_directories_follow_date_and_minute() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 9, 5, 42).unwrap();
        let dirs = RunDirectories::for_run(Path::new("/data"), now);
        assert_eq!(dirs.run_dir, PathBuf::from("/data/playoutfiles/2024-03-01/0905"));
        assert_eq!(dirs.now_playing_dir, PathBuf::from("/data/playoutfiles/nowPlaying"));
    }

    #[test]
    fn persist_copies_records_into_now_playing() {
        let temp = TempDir::new().unwrap();
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 0, 30, 0).unwrap();
        let dirs = RunDirectories::for_run(temp.path(), now);
        dirs.ensure().unwrap();
        let store = RecordStore::new(temp.path());
        let details = DetailsRecord {
            slot_name: "night".into(),
            start_time: Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
            started_at: now,
            diff: 0,
        };
        store
            .persist(&dirs.run_dir, &[entry("/data/a.mp4")], &details)
            .unwrap();

        assert!(dirs.run_dir.join(PLAYOUT_FILE).exists());
        assert_eq!(store.load_previous(), vec![entry("/data/a.mp4")]);
        assert_eq!(store.load_details().unwrap(), Some(details));
    }

    #[test]
    fn record_uses_in_and_out_keys() {
        let json = serde_json::to_value(entry("/a.mp4")).unwrap();
        assert_eq!(json["in"], 0);
        assert_eq!(json["out"], 3600);
        assert!(json.get("thumbnail").is_some());
    }

    #[test]
    fn corrupt_record_reads_as_empty() {
        let temp = TempDir::new().unwrap();
        let store = RecordStore::new(temp.path());
        fs::create_dir_all(store.now_playing_dir()).unwrap();
        fs::write(store.now_playing_dir().join(PLAYOUT_FILE), "{not json").unwrap();
        assert!(store.load_previous().is_empty());
    }
}
