pub mod graph;

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::ChannelConfig;
use crate::error::ConfigError;
use crate::playout::SequencedProgram;
use crate::schedule::OverlaySpec;

pub use graph::{escape_value, BannerLayer, FilterGraph, FilterNode, TextScrollLayer};

/// Programs shorter than this get no "now playing" banner.
pub const MIN_BANNER_SECONDS: i64 = 1;
pub const MAX_TITLE_CHARS: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EncoderInput {
    Program {
        path: PathBuf,
        seek_secs: i64,
        duration_secs: i64,
    },
    Still {
        path: PathBuf,
    },
    Looped {
        path: PathBuf,
    },
}

impl EncoderInput {
    pub fn args(&self) -> Vec<String> {
        match self {
            EncoderInput::Program {
                path,
                seek_secs,
                duration_secs,
            } => vec![
                "-re".to_string(),
                "-ss".to_string(),
                seek_secs.to_string(),
                "-t".to_string(),
                duration_secs.to_string(),
                "-i".to_string(),
                path.to_string_lossy().to_string(),
            ],
            EncoderInput::Still { path } => {
                vec!["-i".to_string(), path.to_string_lossy().to_string()]
            }
            EncoderInput::Looped { path } => vec![
                "-stream_loop".to_string(),
                "-1".to_string(),
                "-i".to_string(),
                path.to_string_lossy().to_string(),
            ],
        }
    }
}

/// Encoder inputs plus the graph wired over them; node input indexes refer
/// to positions in `inputs`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Composition {
    pub inputs: Vec<EncoderInput>,
    pub graph: FilterGraph,
}

impl Composition {
    fn add_input(&mut self, input: EncoderInput) -> usize {
        self.inputs.push(input);
        self.inputs.len() - 1
    }
}

#[derive(Debug, Clone)]
pub struct Compositor {
    config: Arc<ChannelConfig>,
}

impl Compositor {
    pub fn new(config: Arc<ChannelConfig>) -> Self {
        Self { config }
    }

    /// Full layered composition over programs that still have to air.
    pub fn compose(
        &self,
        programs: &[SequencedProgram],
        overlays: &[OverlaySpec],
        now: DateTime<Utc>,
    ) -> Result<Composition, ConfigError> {
        let resolution = self.config.quality_profile()?.resolution.clone();
        let mut composition = Composition::default();

        if !programs.is_empty() {
            for program in programs {
                let input = composition.add_input(EncoderInput::Program {
                    path: program.file.clone(),
                    seek_secs: program.seek_secs,
                    duration_secs: program.duration(),
                });
                composition.graph.push(FilterNode::Normalize {
                    input,
                    resolution: resolution.clone(),
                });
            }
            composition.graph.push(FilterNode::Concat {
                count: programs.len(),
            });
        }

        self.add_scheduled_overlays(&mut composition, overlays, &resolution, now);
        if self.config.program_info_overlay.enabled {
            self.add_banners(&mut composition, programs);
        }
        if self.config.logo.enabled {
            self.add_logo(&mut composition);
        }
        if self.config.text_scroll.enabled {
            self.add_text_scroll(&mut composition);
        }
        if self.config.watermark.enabled {
            self.add_watermark(&mut composition);
        }
        Ok(composition)
    }

    /// Looping default asset with only the text scroll on top.
    pub fn compose_fallback(&self) -> Result<Composition, ConfigError> {
        let resolution = self.config.quality_profile()?.resolution.clone();
        let path = match self.config.default_video_path() {
            Some(path) if path.exists() => path,
            other => {
                if let Some(missing) = other {
                    warn!(path = %missing.display(), "default video missing, using logo loop");
                }
                self.config.fallback_loop_path()
            }
        };

        let mut composition = Composition::default();
        let input = composition.add_input(EncoderInput::Looped { path });
        composition
            .graph
            .push(FilterNode::Normalize { input, resolution });
        composition.graph.push(FilterNode::Concat { count: 1 });
        if self.config.text_scroll.enabled {
            self.add_text_scroll(&mut composition);
        }
        Ok(composition)
    }

    fn add_scheduled_overlays(
        &self,
        composition: &mut Composition,
        overlays: &[OverlaySpec],
        resolution: &str,
        now: DateTime<Utc>,
    ) {
        let sources = self.config.root_dir().join("sources");
        let mut slot = 0;
        for overlay in overlays {
            let file = sources.join(&overlay.file);
            if !file.exists() {
                debug!(path = %file.display(), "overlay source missing, skipping");
                continue;
            }
            for trigger in &overlay.pts {
                if *trigger < now {
                    continue;
                }
                let offset_secs = (*trigger - now).num_seconds();
                let input = composition.add_input(EncoderInput::Still { path: file.clone() });
                composition.graph.push(FilterNode::ScheduledOverlay {
                    input,
                    slot,
                    offset_secs,
                    resolution: resolution.to_string(),
                    x: overlay.position.x,
                    y: overlay.position.y,
                });
                slot += 1;
            }
        }
    }

    fn add_banners(&self, composition: &mut Composition, programs: &[SequencedProgram]) {
        let key = format!(
            "{}_{}",
            self.config.channel.stream_quality.to_uppercase(),
            self.config.program_info_overlay.default_position
        );
        let Some(style) = self.config.program_info_overlay_styles.get(&key) else {
            warn!(style = %key, "banner style not configured, skipping banner");
            return;
        };

        let mut cursor = 0i64;
        for program in programs {
            let start_secs = cursor;
            let duration = program.duration();
            cursor += duration;
            if program.is_ad || duration < MIN_BANNER_SECONDS {
                continue;
            }
            composition.graph.push(FilterNode::Banner(BannerLayer {
                start_secs,
                end_secs: cursor,
                plate: style.plate.clone(),
                label: style.label.clone(),
                label_text: style.label.text.clone().unwrap_or_default(),
                label_font: self.config.font_path(&style.label.fontfile),
                title: style.title.clone(),
                title_text: truncate_title(&program.title),
                title_font: self.config.font_path(&style.title.fontfile),
            }));
        }
    }

    fn add_logo(&self, composition: &mut Composition) {
        let logo = &self.config.logo;
        let path = self.config.resolve_path(&logo.source);
        if !path.exists() {
            debug!(path = %path.display(), "logo source missing, skipping");
            return;
        }
        let input = composition.add_input(EncoderInput::Still { path });
        composition.graph.push(FilterNode::Logo {
            input,
            scale: self.scale_for(&logo.scale),
            format: logo.format.clone(),
            color_mixer: logo.color_mixer.clone(),
            x: logo.x.clone(),
            y: logo.y.clone(),
        });
    }

    fn add_text_scroll(&self, composition: &mut Composition) {
        let scroll = &self.config.text_scroll;
        let text_file = self.config.text_scroll_path();
        if !text_file.exists() {
            debug!(path = %text_file.display(), "text scroll file missing, skipping");
            return;
        }
        composition
            .graph
            .push(FilterNode::TextScroll(TextScrollLayer {
                filter: scroll.filter.clone(),
                text_file,
                font_file: self.config.font_path(&scroll.fontfile),
                x: scroll.x.clone(),
                y: scroll.y.clone(),
                fontcolor: scroll.fontcolor.clone(),
                fontsize: scroll.fontsize,
                shadow_x: scroll.shadow_x,
                shadow_y: scroll.shadow_y,
            }));
    }

    fn add_watermark(&self, composition: &mut Composition) {
        let watermark = &self.config.watermark;
        let path = self.config.resolve_path(&watermark.source);
        if !path.exists() {
            debug!(path = %path.display(), "watermark source missing, skipping");
            return;
        }
        let input = composition.add_input(EncoderInput::Still { path });
        composition.graph.push(FilterNode::Watermark {
            input,
            scale: self.scale_for(&watermark.scale),
            color_mixer: watermark.color_mixer.clone(),
            x: watermark.x.clone(),
            y: watermark.y.clone(),
            format: watermark.format.clone(),
        });
    }

    fn scale_for(&self, scales: &std::collections::HashMap<String, String>) -> String {
        scales
            .get(&self.config.channel.stream_quality)
            .cloned()
            .unwrap_or_else(|| "iw".to_string())
    }
}

fn truncate_title(title: &str) -> String {
    title.chars().take(MAX_TITLE_CHARS).collect()
}
