use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One day of programming, or the channel's always-on default playlist.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Playlist {
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub slots: Vec<Slot>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Slot {
    pub name: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    #[serde(default)]
    pub programs: Vec<ProgramEntry>,
    #[serde(default)]
    pub overlays: Vec<OverlaySpec>,
}

impl Slot {
    /// Inclusive on both ends; the first matching slot wins when two touch.
    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        self.start_at <= now && now <= self.end_at
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProgramEntry {
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub asset: Asset,
}

impl ProgramEntry {
    pub fn has_ended(&self, now: DateTime<Utc>) -> bool {
        now > self.end_at
    }

    pub fn has_started(&self, now: DateTime<Utc>) -> bool {
        now > self.start_at
    }
}

/// A transcoded asset. `start_at`/`end_at` are trim points in seconds inside
/// the source file, unrelated to the program's schedule timestamps.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub id: String,
    pub path: String,
    pub name: String,
    #[serde(default)]
    pub is_ad: bool,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    pub start_at: f64,
    pub end_at: f64,
}

impl Asset {
    pub fn trim_in_secs(&self) -> i64 {
        self.start_at.max(0.0).round() as i64
    }

    pub fn trim_out_secs(&self) -> i64 {
        self.end_at.max(0.0).round() as i64
    }

    pub fn trim_duration_secs(&self) -> i64 {
        (self.trim_out_secs() - self.trim_in_secs()).max(0)
    }

    pub fn is_advert(&self) -> bool {
        self.is_ad
            || matches!(
                self.category.as_deref().map(str::to_ascii_lowercase).as_deref(),
                Some("ad") | Some("ads")
            )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OverlaySpec {
    pub file: String,
    pub position: OverlayPosition,
    #[serde(default)]
    pub pts: Vec<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct OverlayPosition {
    pub x: i64,
    pub y: i64,
}
