use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use super::records::PlayoutEntry;
use super::sequencer::{ResumeAnchor, SequencedProgram, MAX_RESUME_DIFF_SECS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResumeDecision {
    /// Restart of a slot already on air: seek `diff` seconds into program `index`.
    SamePlayout { index: usize, diff: i64 },
    FreshStart,
}

impl ResumeDecision {
    pub fn offset(&self) -> i64 {
        match self {
            ResumeDecision::SamePlayout { diff, .. } => *diff,
            ResumeDecision::FreshStart => 0,
        }
    }

    pub fn is_same_playout(&self) -> bool {
        matches!(self, ResumeDecision::SamePlayout { .. })
    }
}

/// Positional prefix comparison of the new record against the previous one.
pub fn detect_resume(
    previous: &[PlayoutEntry],
    current: &[PlayoutEntry],
    anchor: Option<ResumeAnchor>,
) -> ResumeDecision {
    let Some(anchor) = anchor else {
        return ResumeDecision::FreshStart;
    };
    if current.is_empty() || previous.len() < current.len() {
        return ResumeDecision::FreshStart;
    }
    let matches = current
        .iter()
        .zip(previous)
        .all(|(now, before)| now.file == before.file);
    if matches {
        ResumeDecision::SamePlayout {
            index: anchor.index,
            diff: anchor.diff,
        }
    } else {
        ResumeDecision::FreshStart
    }
}

pub fn apply_resume(programs: &mut [SequencedProgram], decision: &ResumeDecision) {
    let ResumeDecision::SamePlayout { index, diff } = *decision else {
        return;
    };
    match programs.get_mut(index) {
        Some(program) => {
            program.seek_secs = (program.seek_secs + diff).min(program.end_secs);
            info!(
                title = %program.title,
                seek = program.seek_secs,
                remaining = program.duration(),
                "resuming program mid-way"
            );
        }
        None => warn!(index, "resume anchor outside sequence, ignoring"),
    }
}

/// Seconds into the slot at which this run's output starts.
pub fn details_diff(
    now: DateTime<Utc>,
    slot_start: DateTime<Utc>,
    anchor: Option<ResumeAnchor>,
    decision: &ResumeDecision,
) -> i64 {
    let mut elapsed = (now - slot_start).num_seconds().max(0);
    if elapsed > MAX_RESUME_DIFF_SECS {
        warn!(elapsed, "slot started more than a day ago, clamping elapsed time");
        elapsed = MAX_RESUME_DIFF_SECS;
    }
    match (decision, anchor) {
        (ResumeDecision::FreshStart, Some(anchor)) => (elapsed - anchor.diff).max(0),
        _ => elapsed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use std::path::PathBuf;

    fn entry(file: &str) -> PlayoutEntry {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        PlayoutEntry {
            title: file.into(),
            file: file.into(),
            thumbnail: None,
            ad: false,
            in_secs: 0,
            out_secs: 60,
            start_at: start,
            end_at: start + Duration::seconds(60),
        }
    }

    const ANCHOR: Option<ResumeAnchor> = Some(ResumeAnchor { index: 0, diff: 90 });

    #[test]
    fn identical_prefix_is_same_playout() {
        let previous = vec![entry("a"), entry("b"), entry("c")];
        let current = vec![entry("a"), entry("b")];
        assert_eq!(
            detect_resume(&previous, &current, ANCHOR),
            ResumeDecision::SamePlayout { index: 0, diff: 90 }
        );
    }

    #[test]
    fn no_previous_record_is_fresh_start() {
        assert_eq!(
            detect_resume(&[], &[entry("a")], ANCHOR),
            ResumeDecision::FreshStart
        );
    }

    #[test]
    fn shorter_previous_record_is_fresh_start() {
        let previous = vec![entry("a")];
        let current = vec![entry("a"), entry("b")];
        assert_eq!(
            detect_resume(&previous, &current, ANCHOR),
            ResumeDecision::FreshStart
        );
    }

    #[test]
    fn any_file_mismatch_is_fresh_start() {
        let previous = vec![entry("a"), entry("x")];
        let current = vec![entry("a"), entry("b")];
        assert_eq!(
            detect_resume(&previous, &current, ANCHOR),
            ResumeDecision::FreshStart
        );
    }

    #[test]
    fn without_anchor_nothing_resumes() {
        let previous = vec![entry("a")];
        assert_eq!(
            detect_resume(&previous, &previous, None),
            ResumeDecision::FreshStart
        );
    }

    #[test]
    fn apply_shifts_seek_and_shrinks_duration() {
        let mut programs = vec![SequencedProgram {
            title: "a".into(),
            file: PathBuf::from("a.mp4"),
            is_ad: false,
            seek_secs: 0,
            end_secs: 3600,
            record_index: 0,
        }];
        apply_resume(
            &mut programs,
            &ResumeDecision::SamePlayout { index: 0, diff: 1860 },
        );
        assert_eq!(programs[0].seek_secs, 1860);
        assert_eq!(programs[0].duration(), 1740);

        apply_resume(&mut programs, &ResumeDecision::FreshStart);
        assert_eq!(programs[0].seek_secs, 1860);
    }

    #[test]
    fn details_diff_subtracts_anchor_on_fresh_start() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let now = start + Duration::seconds(1800);
        let anchor = Some(ResumeAnchor { index: 0, diff: 1800 });
        assert_eq!(details_diff(now, start, anchor, &ResumeDecision::FreshStart), 0);
        assert_eq!(
            details_diff(
                now,
                start,
                anchor,
                &ResumeDecision::SamePlayout { index: 0, diff: 1800 }
            ),
            1800
        );
        assert_eq!(details_diff(start, start, None, &ResumeDecision::FreshStart), 0);
    }

    #[test]
    fn details_diff_clamps_multi_day_gaps() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let now = start + Duration::days(3);
        assert_eq!(
            details_diff(now, start, None, &ResumeDecision::FreshStart),
            MAX_RESUME_DIFF_SECS
        );
    }
}
