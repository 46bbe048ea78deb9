use std::path::PathBuf;

use chrono::{DateTime, Duration, DurationRound, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::schedule::Slot;

use super::records::PlayoutEntry;

/// Elapsed times beyond a day are treated as schedule gaps, not offsets.
pub const MAX_RESUME_DIFF_SECS: i64 = 86_400;

/// A program that still has to air, with its seek window inside the source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SequencedProgram {
    pub title: String,
    pub file: PathBuf,
    pub is_ad: bool,
    pub seek_secs: i64,
    pub end_secs: i64,
    /// Position of this program in the slot-wide record.
    pub record_index: usize,
}

impl SequencedProgram {
    pub fn duration(&self) -> i64 {
        (self.end_secs - self.seek_secs).max(0)
    }
}

/// First program `now` falls inside of, and how far into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResumeAnchor {
    pub index: usize,
    pub diff: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sequence {
    pub slot_name: String,
    pub slot_start: DateTime<Utc>,
    /// Every program with an existing asset, from the slot start.
    pub record: Vec<PlayoutEntry>,
    /// The part of `record` that has not finished airing.
    pub programs: Vec<SequencedProgram>,
    pub anchor: Option<ResumeAnchor>,
}

impl Sequence {
    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }

    pub fn total_duration(&self) -> i64 {
        self.programs.iter().map(SequencedProgram::duration).sum()
    }

    /// Drops programs with nothing left to play, e.g. a resumed program whose
    /// schedule window outlasts its trim. Returns how many were dropped.
    pub fn drop_exhausted(&mut self) -> usize {
        let before = self.programs.len();
        self.programs.retain(|program| {
            let keep = program.duration() > 0;
            if !keep {
                debug!(title = %program.title, "nothing left to play, dropping program");
            }
            keep
        });
        before - self.programs.len()
    }
}

#[derive(Debug, Clone)]
pub struct ProgramSequencer {
    root: PathBuf,
}

impl ProgramSequencer {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `scheduled` is false for default-playlist slots, whose program
    /// timestamps carry no meaning: nothing is skipped and nothing resumes.
    pub fn sequence(&self, slot: &Slot, scheduled: bool, now: DateTime<Utc>) -> Sequence {
        let slot_start = if scheduled {
            slot.start_at
        } else {
            now.duration_trunc(Duration::minutes(1)).unwrap_or(now)
        };

        let mut record = Vec::new();
        let mut programs = Vec::new();
        let mut anchor = None;
        let mut offset = 0i64;

        for program in &slot.programs {
            let asset = &program.asset;
            let file = self.root.join(asset.path.trim_start_matches('/'));
            if !file.exists() {
                warn!(asset_id = %asset.id, path = %file.display(), "asset missing, skipping program");
                continue;
            }

            let duration = asset.trim_duration_secs();
            let is_ad = asset.is_advert();
            let record_index = record.len();
            record.push(PlayoutEntry {
                title: asset.name.clone(),
                file: file.to_string_lossy().to_string(),
                thumbnail: asset.thumbnail.clone(),
                ad: is_ad,
                in_secs: offset,
                out_secs: offset + duration,
                start_at: slot_start + Duration::seconds(offset),
                end_at: slot_start + Duration::seconds(offset + duration),
            });
            offset += duration;

            if scheduled {
                if program.has_ended(now) {
                    debug!(asset_id = %asset.id, "program already aired");
                    continue;
                }
                if anchor.is_none() && program.has_started(now) {
                    anchor = Some(ResumeAnchor {
                        index: programs.len(),
                        diff: clamp_diff((now - program.start_at).num_seconds(), duration),
                    });
                }
            }

            let seek_secs = asset.trim_in_secs();
            programs.push(SequencedProgram {
                title: asset.name.clone(),
                file,
                is_ad,
                seek_secs,
                end_secs: seek_secs + duration,
                record_index,
            });
        }

        Sequence {
            slot_name: slot.name.clone(),
            slot_start,
            record,
            programs,
            anchor,
        }
    }
}

fn clamp_diff(elapsed: i64, duration: i64) -> i64 {
    if elapsed > MAX_RESUME_DIFF_SECS {
        warn!(elapsed, "elapsed time exceeds a day, clamping resume offset");
    }
    elapsed.clamp(0, duration)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::{Asset, ProgramEntry};
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, h, m, s).unwrap()
    }

    fn program(path: &str, start: DateTime<Utc>, secs: i64) -> ProgramEntry {
        ProgramEntry {
            start_at: start,
            end_at: start + Duration::seconds(secs),
            asset: Asset {
                id: path.into(),
                path: path.into(),
                name: path.into(),
                is_ad: false,
                thumbnail: None,
                category: None,
                start_at: 10.0,
                end_at: 10.0 + secs as f64,
            },
        }
    }

    fn slot(programs: Vec<ProgramEntry>) -> Slot {
        Slot {
            name: "night".into(),
            start_at: at(0, 0, 0),
            end_at: at(6, 0, 0),
            programs,
            overlays: Vec::new(),
        }
    }

    fn touch(dir: &TempDir, name: &str) {
        std::fs::write(dir.path().join(name), b"x").unwrap();
    }

    #[test]
    fn aired_programs_stay_in_record_but_not_in_sequence() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "a.mp4");
        touch(&dir, "b.mp4");
        let slot = slot(vec![
            program("a.mp4", at(0, 0, 0), 600),
            program("b.mp4", at(0, 10, 0), 600),
        ]);
        let sequence = ProgramSequencer::new(dir.path()).sequence(&slot, true, at(0, 12, 0));

        assert_eq!(sequence.record.len(), 2);
        assert_eq!(sequence.record[1].in_secs, 600);
        assert_eq!(sequence.programs.len(), 1);
        assert_eq!(sequence.programs[0].record_index, 1);
        assert_eq!(sequence.anchor, Some(ResumeAnchor { index: 0, diff: 120 }));
        assert_eq!(sequence.total_duration(), 600);
    }

    #[test]
    fn missing_asset_is_skipped_without_record_entry() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "b.mp4");
        let slot = slot(vec![
            program("a.mp4", at(0, 0, 0), 600),
            program("b.mp4", at(0, 10, 0), 300),
        ]);
        let sequence = ProgramSequencer::new(dir.path()).sequence(&slot, true, at(0, 0, 0));

        assert_eq!(sequence.record.len(), 1);
        assert_eq!(sequence.record[0].in_secs, 0);
        assert_eq!(sequence.record[0].out_secs, 300);
        assert_eq!(sequence.programs.len(), 1);
        assert!(sequence.anchor.is_none());
    }

    #[test]
    fn default_slot_ignores_schedule_timestamps() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "a.mp4");
        let slot = slot(vec![program("a.mp4", at(0, 0, 0), 600)]);
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 14, 7, 31).unwrap();
        let sequence = ProgramSequencer::new(dir.path()).sequence(&slot, false, now);

        assert_eq!(sequence.programs.len(), 1);
        assert!(sequence.anchor.is_none());
        assert_eq!(
            sequence.slot_start,
            Utc.with_ymd_and_hms(2024, 3, 9, 14, 7, 0).unwrap()
        );
        assert_eq!(sequence.record[0].start_at, sequence.slot_start);
    }

    #[test]
    fn seek_window_comes_from_trim_points() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "a.mp4");
        let slot = slot(vec![program("a.mp4", at(0, 0, 0), 600)]);
        let sequence = ProgramSequencer::new(dir.path()).sequence(&slot, true, at(0, 0, 0));
        assert_eq!(sequence.programs[0].seek_secs, 10);
        assert_eq!(sequence.programs[0].end_secs, 610);
    }

    #[test]
    fn diff_never_exceeds_program_duration() {
        assert_eq!(clamp_diff(200_000, 3600), 3600);
        assert_eq!(clamp_diff(-5, 3600), 0);
        assert_eq!(clamp_diff(42, 3600), 42);
    }

    #[test]
    fn ad_category_is_recorded_as_advert() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "a.mp4");
        let mut entry = program("a.mp4", at(0, 0, 0), 30);
        entry.asset.category = Some("ad".into());
        let sequence =
            ProgramSequencer::new(dir.path()).sequence(&slot(vec![entry]), true, at(0, 0, 0));
        assert!(sequence.record[0].ad);
        assert!(sequence.programs[0].is_ad);
    }

    #[test]
    fn exhausted_programs_are_dropped() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "a.mp4");
        touch(&dir, "b.mp4");
        let slot = slot(vec![
            program("a.mp4", at(0, 0, 0), 600),
            program("b.mp4", at(0, 10, 0), 600),
        ]);
        let mut sequence = ProgramSequencer::new(dir.path()).sequence(&slot, true, at(0, 5, 0));
        sequence.programs[0].seek_secs = sequence.programs[0].end_secs;

        assert_eq!(sequence.drop_exhausted(), 1);
        assert_eq!(sequence.programs.len(), 1);
        assert_eq!(sequence.programs[0].record_index, 1);
        assert_eq!(sequence.record.len(), 2);
        assert_eq!(sequence.total_duration(), 600);
    }
}

