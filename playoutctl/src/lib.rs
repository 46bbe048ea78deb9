use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use playout_core::playout::RecordError;
use playout_core::{
    load_channel_config, BackendHooks, ChannelConfig, DetailsRecord, Engine, EngineError,
    EngineReport, LogHooks, PlayoutEntry, PlayoutHooks, PlayoutPlan, RecordStore, RunOutcome,
    StatusError,
};
use serde::Serialize;
use thiserror::Error;
use tracing::info;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] playout_core::ConfigError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Engine(#[from] EngineError),
    #[error("record error: {0}")]
    Record(#[from] RecordError),
    #[error("status backend error: {0}")]
    Status(#[from] StatusError),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("invalid timestamp {value}: {source}")]
    InvalidTimestamp {
        value: String,
        source: chrono::ParseError,
    },
    #[error("required resource missing: {0}")]
    MissingResource(String),
    #[error("playout failed: {0}")]
    PlayoutFailed(String),
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Linear channel playout control", long_about = None)]
pub struct Cli {
    /// Path to the channel configuration
    #[arg(long, default_value = "configs/channel.toml")]
    pub config: PathBuf,
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    /// Debug-level logging (RUST_LOG takes precedence)
    #[arg(long, short, default_value_t = false)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Resolve the current slot and stream it until it ends
    Run(AtArgs),
    /// Show what a run would do, without writing records or starting the encoder
    Plan(AtArgs),
    /// Print the records of the slot currently on air
    NowPlaying,
    /// Integrity checks over the configured paths
    #[command(subcommand)]
    Health(HealthCommands),
}

#[derive(Args, Debug, Default)]
pub struct AtArgs {
    /// Evaluate at this instant (RFC 3339) instead of now
    #[arg(long)]
    pub at: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum HealthCommands {
    /// Run the basic checks
    Check,
}

pub fn run(cli: Cli) -> Result<()> {
    let context = AppContext::new(&cli)?;

    match &cli.command {
        Commands::Run(args) => {
            let at = parse_at(args.at.as_deref())?;
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            match runtime.block_on(context.run_once(at)) {
                Ok(report) => {
                    render(&report, cli.format)?;
                    match report.outcome {
                        RunOutcome::Completed => {}
                        RunOutcome::EncoderFailed { stderr, status } => {
                            let message = if stderr.is_empty() {
                                format!("encoder exited with status {status:?}")
                            } else {
                                stderr
                            };
                            return Err(AppError::PlayoutFailed(message));
                        }
                        RunOutcome::Aborted { message } => {
                            return Err(AppError::PlayoutFailed(message));
                        }
                    }
                }
                Err(EngineError::LiveFeedActive) => {
                    info!("live feed active, nothing to do");
                    println!("live feed is playing; scheduled playout skipped");
                }
                Err(err) => return Err(err.into()),
            }
        }
        Commands::Plan(args) => {
            let plan = context.plan(parse_at(args.at.as_deref())?)?;
            render(&plan, cli.format)?;
        }
        Commands::NowPlaying => {
            let now_playing = context.now_playing()?;
            render(&now_playing, cli.format)?;
        }
        Commands::Health(HealthCommands::Check) => {
            let report = context.health_check();
            render(&report, cli.format)?;
            if report
                .iter()
                .any(|entry| matches!(entry.status, CheckStatus::Error))
            {
                return Err(AppError::MissingResource(
                    "one or more checks failed".to_string(),
                ));
            }
        }
    }

    Ok(())
}

fn parse_at(value: Option<&str>) -> Result<DateTime<Utc>> {
    match value {
        None => Ok(Utc::now()),
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|parsed| parsed.with_timezone(&Utc))
            .map_err(|source| AppError::InvalidTimestamp {
                value: raw.to_string(),
                source,
            }),
    }
}

fn render<T>(value: &T, format: OutputFormat) -> Result<()>
where
    T: Serialize + DisplayFallback,
{
    match format {
        OutputFormat::Text => {
            println!("{}", value.display());
            Ok(())
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{}", json);
            Ok(())
        }
    }
}

trait DisplayFallback {
    fn display(&self) -> String;
}

#[derive(Debug)]
struct AppContext {
    config_path: PathBuf,
    config: Arc<ChannelConfig>,
}

impl AppContext {
    fn new(cli: &Cli) -> Result<Self> {
        let config = load_channel_config(&cli.config)?;
        config.validate()?;
        Ok(Self {
            config_path: cli.config.clone(),
            config: Arc::new(config),
        })
    }

    fn hooks(&self) -> Result<Arc<dyn PlayoutHooks>> {
        match &self.config.backend {
            Some(backend) => Ok(Arc::new(BackendHooks::new(backend)?)),
            None => Ok(Arc::new(LogHooks)),
        }
    }

    fn engine(&self) -> Result<Engine> {
        Ok(Engine::new(self.config.clone(), self.hooks()?, None))
    }

    async fn run_once(&self, at: DateTime<Utc>) -> std::result::Result<EngineReport, EngineError> {
        let hooks = match self.hooks() {
            Ok(hooks) => hooks,
            Err(err) => {
                tracing::warn!(%err, "backend hooks unavailable, logging status only");
                Arc::new(LogHooks)
            }
        };
        Engine::new(self.config.clone(), hooks, None).run_at(at).await
    }

    fn plan(&self, at: DateTime<Utc>) -> Result<PlayoutPlan> {
        Ok(self.engine()?.plan_at(at)?)
    }

    fn now_playing(&self) -> Result<NowPlaying> {
        let store = RecordStore::new(self.config.root_dir());
        Ok(NowPlaying {
            details: store.load_details()?,
            entries: store.load_previous(),
        })
    }

    fn health_check(&self) -> Vec<HealthEntry> {
        let config = &self.config;
        let mut results = vec![
            HealthEntry::ok("config", format!("{}", self.config_path.display())),
            self.check_directory("root_dir", config.root_dir(), CheckStatus::Error),
            self.check_directory(
                "fonts_dir",
                Path::new(&config.channel.fonts_dir),
                CheckStatus::Warn,
            ),
        ];

        match config.default_playlist_path() {
            Some(path) => results.push(self.check_path("default_playlist", &path, CheckStatus::Warn)),
            None => results.push(HealthEntry::warn("default_playlist", "not configured")),
        }
        match config.default_video_path() {
            Some(path) => results.push(self.check_path("default_video", &path, CheckStatus::Warn)),
            None => results.push(HealthEntry::warn("default_video", "not configured")),
        }
        results.push(self.check_path(
            "fallback_loop",
            &config.fallback_loop_path(),
            CheckStatus::Error,
        ));
        if config.text_scroll.enabled {
            results.push(self.check_path(
                "text_scroll",
                &config.text_scroll_path(),
                CheckStatus::Warn,
            ));
        }
        if config.logo.enabled {
            results.push(self.check_path(
                "logo",
                &config.resolve_path(&config.logo.source),
                CheckStatus::Warn,
            ));
        }
        results.push(self.check_binary("ffmpeg", &config.ffmpeg.binary));
        results
    }

    fn check_path(&self, name: &str, path: &Path, missing: CheckStatus) -> HealthEntry {
        if path.exists() {
            HealthEntry::ok(name, format!("{}", path.display()))
        } else {
            HealthEntry::new(name, missing, format!("{} missing", path.display()))
        }
    }

    fn check_directory(&self, name: &str, path: &Path, missing: CheckStatus) -> HealthEntry {
        match fs::metadata(path) {
            Ok(meta) if meta.is_dir() => HealthEntry::ok(name, format!("{}", path.display())),
            Ok(_) => HealthEntry::new(name, missing, format!("{} is not a directory", path.display())),
            Err(_) => HealthEntry::new(name, missing, format!("{} not found", path.display())),
        }
    }

    fn check_binary(&self, name: &str, binary: &str) -> HealthEntry {
        match find_binary(binary) {
            Some(path) => HealthEntry::ok(name, format!("{}", path.display())),
            None => HealthEntry::error(name, format!("{binary} not found on PATH")),
        }
    }
}

fn find_binary(binary: &str) -> Option<PathBuf> {
    let candidate = Path::new(binary);
    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(binary))
        .find(|path| path.is_file())
}

#[derive(Debug, Serialize)]
pub struct NowPlaying {
    pub details: Option<DetailsRecord>,
    pub entries: Vec<PlayoutEntry>,
}

impl DisplayFallback for NowPlaying {
    fn display(&self) -> String {
        let mut lines = Vec::new();
        match &self.details {
            Some(details) => lines.push(format!(
                "slot: {} (starts {}, started {}, diff {}s)",
                details.slot_name,
                details.start_time.to_rfc3339(),
                details.started_at.to_rfc3339(),
                details.diff
            )),
            None => lines.push("slot: none on record".to_string()),
        }
        for entry in &self.entries {
            lines.push(format!(
                "{start} {end} {ad}{title} [{inp}-{out}]",
                start = entry.start_at.format("%H:%M:%S"),
                end = entry.end_at.format("%H:%M:%S"),
                ad = if entry.ad { "(ad) " } else { "" },
                title = entry.title,
                inp = entry.in_secs,
                out = entry.out_secs,
            ));
        }
        lines.join("\n")
    }
}

impl DisplayFallback for PlayoutPlan {
    fn display(&self) -> String {
        let mut lines = vec![
            format!("run {}", self.run_id),
            format!("at: {}", self.now.to_rfc3339()),
            format!("mode: {}", self.mode),
            format!("run dir: {}", self.directories.run_dir.display()),
        ];
        if let Some(sequence) = &self.sequence {
            lines.push(format!(
                "resume: {}",
                if self.decision.is_same_playout() {
                    format!("same playout, +{}s", self.decision.offset())
                } else {
                    "fresh start".to_string()
                }
            ));
            for program in &sequence.programs {
                lines.push(format!(
                    "  {title} {seek}s..{end}s{ad}",
                    title = program.title,
                    seek = program.seek_secs,
                    end = program.end_secs,
                    ad = if program.is_ad { " (ad)" } else { "" },
                ));
            }
            lines.push(format!("duration: {}s", sequence.total_duration()));
        }
        lines.push(format!("command: {}", self.command.shell_line()));
        lines.join("\n")
    }
}

impl DisplayFallback for EngineReport {
    fn display(&self) -> String {
        let mode = self
            .mode
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| "unresolved".to_string());
        let outcome = match &self.outcome {
            RunOutcome::Completed => "completed".to_string(),
            RunOutcome::EncoderFailed { status, .. } => format!("encoder failed ({status:?})"),
            RunOutcome::Aborted { message } => format!("aborted: {message}"),
        };
        format!("run {} [{mode}] {outcome}", self.run_id)
    }
}

impl DisplayFallback for Vec<HealthEntry> {
    fn display(&self) -> String {
        self.iter()
            .map(HealthEntry::display)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Serialize)]
pub struct HealthEntry {
    pub name: String,
    pub status: CheckStatus,
    pub detail: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CheckStatus {
    #[serde(rename = "ok")]
    Ok,
    #[serde(rename = "warn")]
    Warn,
    #[serde(rename = "error")]
    Error,
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CheckStatus::Ok => "OK",
            CheckStatus::Warn => "WARN",
            CheckStatus::Error => "ERROR",
        };
        write!(f, "{}", label)
    }
}

impl HealthEntry {
    fn new(name: impl Into<String>, status: CheckStatus, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status,
            detail: detail.into(),
        }
    }

    fn ok(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(name, CheckStatus::Ok, detail)
    }

    fn warn(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(name, CheckStatus::Warn, detail)
    }

    fn error(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(name, CheckStatus::Error, detail)
    }
}

impl DisplayFallback for HealthEntry {
    fn display(&self) -> String {
        format!(
            "[{status}] {name}: {detail}",
            status = self.status,
            name = self.name,
            detail = self.detail
        )
    }
}
