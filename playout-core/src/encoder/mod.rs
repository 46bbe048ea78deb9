pub mod runner;

use std::fs;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::compositor::Composition;
use crate::config::ChannelConfig;
use crate::error::ConfigError;
use crate::playout::RunDirectories;

pub use runner::{CommandExecutor, EncodeOutcome, EncoderRunner, SystemCommandExecutor};

pub const SCRIPT_FILE: &str = "stream.sh";

#[derive(Debug, Error)]
pub enum EncoderError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// One fully resolved encoder invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EncodeCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Hard output duration; `None` loops until stopped from outside.
    pub duration_secs: Option<i64>,
}

impl EncodeCommand {
    pub fn scheduled(
        config: &ChannelConfig,
        composition: &Composition,
        total_secs: i64,
    ) -> Result<Self, ConfigError> {
        Self::build(config, composition, Some(total_secs))
    }

    pub fn fallback(config: &ChannelConfig, composition: &Composition) -> Result<Self, ConfigError> {
        Self::build(config, composition, None)
    }

    fn build(
        config: &ChannelConfig,
        composition: &Composition,
        duration_secs: Option<i64>,
    ) -> Result<Self, ConfigError> {
        let quality = config.quality_profile()?;
        let video = &config.encoder.video;
        let audio = &config.encoder.audio;
        let gop = (video.fps * 2).to_string();

        let mut args = vec![
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            config.ffmpeg.log_level.clone(),
        ];
        for input in &composition.inputs {
            args.extend(input.args());
        }
        if let Some(filter) = composition.graph.render() {
            args.push("-filter_complex".to_string());
            args.push(filter);
        }
        if let Some(total) = duration_secs {
            args.push("-to".to_string());
            args.push(total.to_string());
        }
        let tail = [
            ("-map", "[outv]".to_string()),
            ("-map", "[outa]".to_string()),
            ("-vcodec", video.codec.clone()),
            ("-pix_fmt", "yuv420p".to_string()),
            ("-preset", video.preset.clone()),
            ("-s", quality.resolution.clone()),
            ("-crf", video.crf.to_string()),
            ("-r", video.fps.to_string()),
            ("-g", gop.clone()),
            ("-keyint_min", gop),
            ("-maxrate", quality.bitrate.to_string()),
            ("-b:v", quality.bitrate.to_string()),
            ("-acodec", audio.codec.clone()),
            ("-ar", audio.samplerate.to_string()),
            ("-ac", audio.channels.to_string()),
            ("-threads", config.ffmpeg.thread_count().to_string()),
            ("-b:a", format!("{}k", audio.bitrate)),
            ("-bufsize", (quality.bitrate * 4).to_string()),
            ("-sc_threshold", "0".to_string()),
            ("-fflags", "+genpts".to_string()),
            ("-movflags", "+faststart".to_string()),
            ("-tune", "zerolatency".to_string()),
            ("-f", "flv".to_string()),
        ];
        for (flag, value) in tail {
            args.push(flag.to_string());
            args.push(value);
        }
        args.push(config.broadcast.destination());

        Ok(Self {
            program: PathBuf::from(&config.ffmpeg.binary),
            args,
            duration_secs,
        })
    }

    /// Value following `flag`, if present.
    pub fn arg_value(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|arg| arg == flag)
            .and_then(|idx| self.args.get(idx + 1))
            .map(String::as_str)
    }

    pub fn shell_line(&self) -> String {
        std::iter::once(self.program.to_string_lossy().to_string())
            .chain(self.args.iter().cloned())
            .map(|arg| shell_quote(&arg))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Persists the command as a replayable script in the run directory and
    /// copies it into nowPlaying.
    pub fn write_script(&self, dirs: &RunDirectories) -> Result<PathBuf, EncoderError> {
        let path = dirs.run_dir.join(SCRIPT_FILE);
        let log_pattern = format!("{}/$dt.log", dirs.run_dir.display());
        let script = format!(
            "#!/bin/bash\ntrap \"exit\" INT\n\ndt=$(date -u \"+%Y%m%d-%H%M%S\")\n{} 2>\"{}\"\n",
            self.shell_line(),
            log_pattern
        );
        fs::write(&path, script).map_err(|source| EncoderError::Write {
            path: path.clone(),
            source,
        })?;
        let copy = dirs.now_playing_dir.join(SCRIPT_FILE);
        fs::copy(&path, &copy).map_err(|source| EncoderError::Write { path: copy, source })?;
        debug!(path = %path.display(), "encode script written");
        Ok(path)
    }
}

fn shell_quote(arg: &str) -> String {
    let safe = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-+=:,./@%".contains(c));
    if safe {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', "'\\''"))
    }
}
