use std::fmt;
use std::fs::File;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::fs as async_fs;
use tokio::process::Command;
use tracing::{info, warn};

use super::{EncodeCommand, EncoderError};

#[async_trait::async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Runs to completion with stderr going to `stderr` as it is produced.
    async fn run(&self, command: &mut Command, stderr: File) -> std::io::Result<ExitStatus>;
}

#[derive(Debug, Default)]
pub struct SystemCommandExecutor;

#[async_trait::async_trait]
impl CommandExecutor for SystemCommandExecutor {
    async fn run(&self, command: &mut Command, stderr: File) -> std::io::Result<ExitStatus> {
        command.stderr(Stdio::from(stderr)).status().await
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EncodeOutcome {
    Completed,
    Failed { status: Option<i32>, stderr: String },
}

/// Runs the encoder to completion. There is no retry here; the supervisor
/// decides what happens after a failure.
#[derive(Clone)]
pub struct EncoderRunner {
    executor: Arc<dyn CommandExecutor>,
}

impl fmt::Debug for EncoderRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncoderRunner").finish_non_exhaustive()
    }
}

impl EncoderRunner {
    pub fn new(executor: Option<Arc<dyn CommandExecutor>>) -> Self {
        let executor = executor.unwrap_or_else(|| Arc::new(SystemCommandExecutor));
        Self { executor }
    }

    pub async fn run(
        &self,
        encode: &EncodeCommand,
        log_dir: &Path,
        started_at: DateTime<Utc>,
    ) -> Result<EncodeOutcome, EncoderError> {
        let mut command = Command::new(&encode.program);
        command
            .args(&encode.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null());

        let log_path = log_dir.join(format!("{}.log", started_at.format("%Y%m%d-%H%M%S")));
        let log_file = File::create(&log_path).map_err(|source| EncoderError::Write {
            path: log_path.clone(),
            source,
        })?;

        info!(
            program = %encode.program.display(),
            duration = ?encode.duration_secs,
            log = %log_path.display(),
            "starting encoder"
        );
        let status = self.executor.run(&mut command, log_file).await?;

        let stderr = match async_fs::read(&log_path).await {
            Ok(bytes) => String::from_utf8_lossy(&bytes).trim().to_string(),
            Err(error) => {
                warn!(path = %log_path.display(), %error, "failed to read encoder log");
                String::new()
            }
        };
        if !stderr.is_empty() || !status.success() {
            warn!(status = ?status.code(), "encoder exited with errors");
            return Ok(EncodeOutcome::Failed {
                status: status.code(),
                stderr,
            });
        }
        info!("slot completed");
        Ok(EncodeOutcome::Completed)
    }
}
