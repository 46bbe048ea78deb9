use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn, Instrument};
use uuid::Uuid;

use crate::compositor::Compositor;
use crate::config::ChannelConfig;
use crate::encoder::{CommandExecutor, EncodeCommand, EncodeOutcome, EncoderError, EncoderRunner};
use crate::error::ConfigError;
use crate::playout::{
    apply_resume, details_diff, detect_resume, DetailsRecord, ProgramSequencer, RecordError,
    RecordStore, ResumeDecision, RunDirectories, Sequence,
};
use crate::schedule::{PlaylistStore, ScheduleError, SlotResolver};
use crate::status::PlayoutHooks;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("schedule error: {0}")]
    Schedule(#[from] ScheduleError),
    #[error("record error: {0}")]
    Record(#[from] RecordError),
    #[error("encoder error: {0}")]
    Encoder(#[from] EncoderError),
    #[error("live feed is playing, scheduled playout not started")]
    LiveFeedActive,
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    NoSlot,
    NoPlayableInputs,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum PlayoutMode {
    Scheduled { slot: String },
    DefaultSlot { slot: String },
    Fallback { reason: FallbackReason },
}

impl fmt::Display for PlayoutMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayoutMode::Scheduled { slot } => write!(f, "scheduled slot {slot}"),
            PlayoutMode::DefaultSlot { slot } => write!(f, "default slot {slot}"),
            PlayoutMode::Fallback { reason } => write!(f, "fallback ({reason:?})"),
        }
    }
}

/// Everything one invocation will do, resolved but not yet executed.
#[derive(Debug, Clone, Serialize)]
pub struct PlayoutPlan {
    pub run_id: Uuid,
    pub now: DateTime<Utc>,
    pub mode: PlayoutMode,
    pub directories: RunDirectories,
    pub sequence: Option<Sequence>,
    pub decision: ResumeDecision,
    pub details: Option<DetailsRecord>,
    pub command: EncodeCommand,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunOutcome {
    Completed,
    EncoderFailed { status: Option<i32>, stderr: String },
    Aborted { message: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct EngineReport {
    pub run_id: Uuid,
    pub mode: Option<PlayoutMode>,
    pub script: Option<PathBuf>,
    pub outcome: RunOutcome,
}

pub struct Engine {
    config: Arc<ChannelConfig>,
    resolver: SlotResolver,
    sequencer: ProgramSequencer,
    records: RecordStore,
    compositor: Compositor,
    runner: EncoderRunner,
    hooks: Arc<dyn PlayoutHooks>,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("stream_id", &self.config.channel.stream_id)
            .field("root_dir", &self.config.channel.root_dir)
            .finish()
    }
}

impl Engine {
    pub fn new(
        config: Arc<ChannelConfig>,
        hooks: Arc<dyn PlayoutHooks>,
        executor: Option<Arc<dyn CommandExecutor>>,
    ) -> Self {
        let root = config.root_dir().to_path_buf();
        Self {
            resolver: SlotResolver::new(PlaylistStore::new(&config)),
            sequencer: ProgramSequencer::new(&root),
            records: RecordStore::new(&root),
            compositor: Compositor::new(config.clone()),
            runner: EncoderRunner::new(executor),
            hooks,
            config,
        }
    }

    pub fn records(&self) -> &RecordStore {
        &self.records
    }

    /// Resolves and builds this invocation without touching disk state.
    pub fn plan_at(&self, now: DateTime<Utc>) -> EngineResult<PlayoutPlan> {
        let run_id = Uuid::new_v4();
        let directories = RunDirectories::for_run(self.config.root_dir(), now);
        let resolution = self.resolver.resolve(now)?;

        let Some(slot) = resolution.slot() else {
            return self.fallback_plan(run_id, now, directories, FallbackReason::NoSlot);
        };

        let mut sequence = self.sequencer.sequence(slot, resolution.is_scheduled(), now);
        let previous = self.records.load_previous();
        let decision = detect_resume(&previous, &sequence.record, sequence.anchor);
        info!(
            slot = %slot.name,
            same_playout = decision.is_same_playout(),
            offset = decision.offset(),
            "resume classification"
        );
        apply_resume(&mut sequence.programs, &decision);
        sequence.drop_exhausted();
        if sequence.is_empty() {
            warn!(slot = %slot.name, "no playable programs in slot");
            return self.fallback_plan(
                run_id,
                now,
                directories,
                FallbackReason::NoPlayableInputs,
            );
        }

        let details = DetailsRecord {
            slot_name: slot.name.clone(),
            start_time: slot.start_at,
            started_at: now,
            diff: details_diff(now, sequence.slot_start, sequence.anchor, &decision),
        };
        let composition = self
            .compositor
            .compose(&sequence.programs, &slot.overlays, now)?;
        let command =
            EncodeCommand::scheduled(&self.config, &composition, sequence.total_duration())?;

        let mode = if resolution.is_scheduled() {
            PlayoutMode::Scheduled {
                slot: slot.name.clone(),
            }
        } else {
            PlayoutMode::DefaultSlot {
                slot: slot.name.clone(),
            }
        };
        Ok(PlayoutPlan {
            run_id,
            now,
            mode,
            directories,
            sequence: Some(sequence),
            decision,
            details: Some(details),
            command,
        })
    }

    fn fallback_plan(
        &self,
        run_id: Uuid,
        now: DateTime<Utc>,
        directories: RunDirectories,
        reason: FallbackReason,
    ) -> EngineResult<PlayoutPlan> {
        warn!(?reason, "falling back to default loop");
        let composition = self.compositor.compose_fallback()?;
        let command = EncodeCommand::fallback(&self.config, &composition)?;
        Ok(PlayoutPlan {
            run_id,
            now,
            mode: PlayoutMode::Fallback { reason },
            directories,
            sequence: None,
            decision: ResumeDecision::FreshStart,
            details: None,
            command,
        })
    }

    pub async fn run(&self) -> EngineResult<EngineReport> {
        self.run_at(Utc::now()).await
    }

    /// One invocation: plan, persist, encode, report. Only a live-feed
    /// lockout is returned as an error; everything else goes to the hooks.
    pub async fn run_at(&self, now: DateTime<Utc>) -> EngineResult<EngineReport> {
        if self.config.channel.playing_live_feed {
            return Err(EngineError::LiveFeedActive);
        }

        let plan = match self.plan_at(now) {
            Ok(plan) => plan,
            Err(error) => return Ok(self.abort(Uuid::new_v4(), None, error).await),
        };
        let span = tracing::info_span!("playout", run_id = %plan.run_id);
        let mode = plan.mode.clone();
        match self.execute(&plan).instrument(span).await {
            Ok((script, outcome)) => Ok(self.finish(plan.run_id, mode, script, outcome).await),
            Err(error) => Ok(self.abort(plan.run_id, Some(mode), error).await),
        }
    }

    async fn execute(&self, plan: &PlayoutPlan) -> EngineResult<(PathBuf, EncodeOutcome)> {
        info!(mode = %plan.mode, "starting playout");
        plan.directories.ensure()?;
        if let (Some(sequence), Some(details)) = (&plan.sequence, &plan.details) {
            self.records
                .persist(&plan.directories.run_dir, &sequence.record, details)?;
        }
        let script = plan.command.write_script(&plan.directories)?;
        let outcome = self
            .runner
            .run(&plan.command, &plan.directories.run_dir, plan.now)
            .await?;
        Ok((script, outcome))
    }

    async fn finish(
        &self,
        run_id: Uuid,
        mode: PlayoutMode,
        script: PathBuf,
        outcome: EncodeOutcome,
    ) -> EngineReport {
        let outcome = match outcome {
            EncodeOutcome::Completed => {
                self.hooks.on_success().await;
                RunOutcome::Completed
            }
            EncodeOutcome::Failed { status, stderr } => {
                let message = if stderr.is_empty() {
                    format!("encoder exited with status {status:?}")
                } else {
                    stderr.clone()
                };
                self.hooks.on_error(&message).await;
                RunOutcome::EncoderFailed { status, stderr }
            }
        };
        EngineReport {
            run_id,
            mode: Some(mode),
            script: Some(script),
            outcome,
        }
    }

    async fn abort(
        &self,
        run_id: Uuid,
        mode: Option<PlayoutMode>,
        error: EngineError,
    ) -> EngineReport {
        let message = error.to_string();
        warn!(%run_id, %message, "playout aborted");
        self.hooks.on_error(&message).await;
        EngineReport {
            run_id,
            mode,
            script: None,
            outcome: RunOutcome::Aborted { message },
        }
    }
}
