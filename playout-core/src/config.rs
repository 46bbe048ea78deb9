use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ChannelConfig {
    pub channel: ChannelSection,
    pub broadcast: BroadcastSection,
    pub encoder: EncoderSection,
    #[serde(default)]
    pub ffmpeg: FfmpegSection,
    pub quality: HashMap<String, QualityProfile>,
    pub logo: LogoSection,
    pub watermark: WatermarkSection,
    pub text_scroll: TextScrollSection,
    pub program_info_overlay: ProgramInfoSection,
    #[serde(default)]
    pub program_info_overlay_styles: HashMap<String, BannerStyle>,
    #[serde(default)]
    pub backend: Option<BackendSection>,
}

impl ChannelConfig {
    pub fn root_dir(&self) -> &Path {
        Path::new(&self.channel.root_dir)
    }

    pub fn resolve_path<P: AsRef<Path>>(&self, candidate: P) -> PathBuf {
        let path = candidate.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root_dir().join(path)
        }
    }

    pub fn font_path(&self, font: &str) -> PathBuf {
        Path::new(&self.channel.fonts_dir).join(font.trim_start_matches('/'))
    }

    /// Profile for the configured `stream_quality`.
    pub fn quality_profile(&self) -> Result<&QualityProfile> {
        self.quality
            .get(&self.channel.stream_quality)
            .ok_or_else(|| ConfigError::UnknownQuality {
                quality: self.channel.stream_quality.clone(),
            })
    }

    pub fn default_playlist_path(&self) -> Option<PathBuf> {
        self.channel
            .default_playlist
            .as_ref()
            .map(|path| self.resolve_path(path))
    }

    pub fn default_video_path(&self) -> Option<PathBuf> {
        self.channel
            .default_video_file
            .as_ref()
            .map(|path| self.resolve_path(path))
    }

    pub fn fallback_loop_path(&self) -> PathBuf {
        self.resolve_path(&self.channel.fallback_loop)
    }

    pub fn text_scroll_path(&self) -> PathBuf {
        self.resolve_path(&self.text_scroll.text_file)
    }

    pub fn validate(&self) -> Result<()> {
        self.quality_profile()?;
        if self.encoder.video.fps == 0 {
            return Err(ConfigError::Invalid("encoder.video.fps must be non-zero".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChannelSection {
    pub stream_id: String,
    pub root_dir: String,
    pub fonts_dir: String,
    pub default_playlist: Option<String>,
    pub default_video_file: Option<String>,
    #[serde(default = "default_fallback_loop")]
    pub fallback_loop: String,
    pub stream_quality: String,
    #[serde(default)]
    pub playing_live_feed: bool,
}

fn default_fallback_loop() -> String {
    "logo.mp4".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct BroadcastSection {
    pub url: String,
    pub key: String,
}

impl BroadcastSection {
    pub fn destination(&self) -> String {
        format!("{}/{}", self.url.trim_end_matches('/'), self.key)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EncoderSection {
    pub video: VideoSection,
    pub audio: AudioSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VideoSection {
    pub codec: String,
    pub fps: u32,
    pub crf: u32,
    pub preset: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AudioSection {
    pub codec: String,
    /// kbit/s
    pub bitrate: u32,
    pub samplerate: u32,
    pub channels: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FfmpegSection {
    #[serde(default = "default_ffmpeg_binary")]
    pub binary: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    pub threads: Option<u32>,
}

impl Default for FfmpegSection {
    fn default() -> Self {
        Self {
            binary: default_ffmpeg_binary(),
            log_level: default_log_level(),
            threads: None,
        }
    }
}

impl FfmpegSection {
    /// Half of the logical cores unless pinned in config.
    pub fn thread_count(&self) -> u32 {
        if let Some(threads) = self.threads {
            return threads.max(1);
        }
        std::thread::available_parallelism()
            .map(|cores| (cores.get() / 2).max(1) as u32)
            .unwrap_or(4)
    }
}

fn default_ffmpeg_binary() -> String {
    "ffmpeg".to_string()
}

fn default_log_level() -> String {
    "error".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct QualityProfile {
    pub resolution: String,
    /// Video bitrate, kbit/s.
    pub bitrate: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogoSection {
    pub enabled: bool,
    pub source: String,
    #[serde(default)]
    pub scale: HashMap<String, String>,
    pub format: String,
    pub color_mixer: String,
    pub x: String,
    pub y: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WatermarkSection {
    pub enabled: bool,
    pub source: String,
    #[serde(default)]
    pub scale: HashMap<String, String>,
    pub color_mixer: String,
    pub x: String,
    pub y: String,
    pub format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TextScrollSection {
    pub enabled: bool,
    #[serde(default = "default_text_filter")]
    pub filter: String,
    #[serde(default = "default_text_file")]
    pub text_file: String,
    pub fontfile: String,
    pub x: String,
    pub y: String,
    pub fontcolor: String,
    pub fontsize: u32,
    #[serde(default)]
    pub shadow_x: i32,
    #[serde(default)]
    pub shadow_y: i32,
}

fn default_text_filter() -> String {
    "drawtext".to_string()
}

fn default_text_file() -> String {
    "live_stream_text_scroll.txt".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProgramInfoSection {
    pub enabled: bool,
    pub default_position: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BannerStyle {
    pub plate: PlateStyle,
    pub label: TextStyle,
    pub title: TextStyle,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PlateStyle {
    pub x: String,
    pub y: String,
    pub w: String,
    pub h: String,
    pub color: String,
    pub thickness: String,
    pub format: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TextStyle {
    #[serde(default)]
    pub text: Option<String>,
    pub x: String,
    pub y: String,
    pub fontfile: String,
    pub fontsize: u32,
    pub fontcolor: String,
    #[serde(rename = "box", default)]
    pub boxed: u32,
    #[serde(default)]
    pub boxborderw: u32,
    #[serde(default = "default_box_color")]
    pub boxcolor: String,
    #[serde(default = "default_box_color")]
    pub shadowcolor: String,
    #[serde(default)]
    pub shadow_x: i32,
    #[serde(default)]
    pub shadow_y: i32,
    pub format: String,
}

fn default_box_color() -> String {
    "black@0.0".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendSection {
    pub url: String,
    #[serde(default)]
    pub token: String,
}

pub fn load_channel_config<P: AsRef<Path>>(path: P) -> Result<ChannelConfig> {
    let config: ChannelConfig = load_toml(path)?;
    config.validate()?;
    Ok(config)
}

pub fn parse_channel_config(content: &str) -> Result<ChannelConfig> {
    let config: ChannelConfig = toml::from_str(content).map_err(|source| ConfigError::Parse {
        source,
        path: PathBuf::from("<inline>"),
    })?;
    config.validate()?;
    Ok(config)
}

fn load_toml<T, P>(path: P) -> Result<T>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        source,
        path: path.to_path_buf(),
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        source,
        path: path.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_fixture_config() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../configs/channel.toml");
        let config = load_channel_config(path).expect("channel config should parse");
        assert_eq!(config.channel.stream_id, "channel-main");
        assert_eq!(config.channel.stream_quality, "SD");
        assert_eq!(config.quality_profile().unwrap().resolution, "1280x720");
        assert!(config.program_info_overlay_styles.contains_key("SD_bottom_left"));
        assert_eq!(
            config.broadcast.destination(),
            "rtmp://live.example.net/app/stream-key"
        );
    }

    #[test]
    fn relative_paths_resolve_against_root() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../configs/channel.toml");
        let config = load_channel_config(path).unwrap();
        assert_eq!(
            config.resolve_path("assets/a.mp4"),
            Path::new(&config.channel.root_dir).join("assets/a.mp4")
        );
        assert_eq!(config.resolve_path("/abs/a.mp4"), PathBuf::from("/abs/a.mp4"));
    }

    #[test]
    fn unknown_quality_is_rejected() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../configs/channel.toml");
        let content = std::fs::read_to_string(path)
            .unwrap()
            .replace("stream_quality = \"SD\"", "stream_quality = \"UHD\"");
        let err = parse_channel_config(&content).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownQuality { .. }));
    }
}
