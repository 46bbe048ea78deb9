use std::path::PathBuf;

use crate::config::{PlateStyle, TextStyle};

/// Ordered composition nodes; rendered to `-filter_complex` syntax only at
/// emission time. Every node after `Concat` reads and writes `[outv]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterGraph {
    nodes: Vec<FilterNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterNode {
    Normalize {
        input: usize,
        resolution: String,
    },
    Concat {
        count: usize,
    },
    ScheduledOverlay {
        input: usize,
        slot: usize,
        offset_secs: i64,
        resolution: String,
        x: i64,
        y: i64,
    },
    Banner(BannerLayer),
    Logo {
        input: usize,
        scale: String,
        format: String,
        color_mixer: String,
        x: String,
        y: String,
    },
    TextScroll(TextScrollLayer),
    Watermark {
        input: usize,
        scale: String,
        color_mixer: String,
        x: String,
        y: String,
        format: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct BannerLayer {
    pub start_secs: i64,
    pub end_secs: i64,
    pub plate: PlateStyle,
    pub label: TextStyle,
    pub label_text: String,
    pub label_font: PathBuf,
    pub title: TextStyle,
    pub title_text: String,
    pub title_font: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextScrollLayer {
    pub filter: String,
    pub text_file: PathBuf,
    pub font_file: PathBuf,
    pub x: String,
    pub y: String,
    pub fontcolor: String,
    pub fontsize: u32,
    pub shadow_x: i32,
    pub shadow_y: i32,
}

impl FilterGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, node: FilterNode) {
        self.nodes.push(node);
    }

    pub fn nodes(&self) -> &[FilterNode] {
        &self.nodes
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn render(&self) -> Option<String> {
        if self.nodes.is_empty() {
            return None;
        }
        let chains: Vec<String> = self.nodes.iter().map(FilterNode::render).collect();
        Some(chains.join(";"))
    }
}

impl FilterNode {
    pub fn render(&self) -> String {
        match self {
            FilterNode::Normalize { input, resolution } => format!(
                "[{input}:v]scale={scale},setsar=1[{input}v];\
                 [{input}:a]aresample=async=1:first_pts=0[{input}a]",
                scale = scale_expr(resolution),
            ),
            FilterNode::Concat { count } => {
                let pads: String = (0..*count).map(|i| format!("[{i}v][{i}a]")).collect();
                format!("{pads}concat=n={count}:v=1:a=1[outv][outa];[outv]realtime[outv]")
            }
            FilterNode::ScheduledOverlay {
                input,
                slot,
                offset_secs,
                resolution,
                x,
                y,
            } => format!(
                "[{input}:v]setpts=PTS-STARTPTS+{offset_secs}/TB,scale={scale},\
                 colorchannelmixer=aa=1[overlay{slot}];\
                 [outv][overlay{slot}]overlay=x={x}:y={y}:enable='1':eof_action=pass[outv]",
                scale = scale_expr(resolution),
            ),
            FilterNode::Banner(layer) => layer.render(),
            FilterNode::Logo {
                input,
                scale,
                format,
                color_mixer,
                x,
                y,
            } => format!(
                "[{input}:v]setpts=N/FRAME_RATE/TB,scale={scale}:-1,loop=-1:size=160,\
                 format={format},colorchannelmixer={color_mixer}[logo];\
                 [outv][logo]overlay=x={x}:y={y}[outv]"
            ),
            FilterNode::TextScroll(layer) => format!(
                "[outv]{filter}=textfile={text}:fontfile={font}:y={y}:x={x}:fontcolor={color}:\
                 fontsize={size}:shadowx={sx}:shadowy={sy}:reload=1[outv]",
                filter = layer.filter,
                text = escape_value(&layer.text_file.to_string_lossy()),
                font = escape_value(&layer.font_file.to_string_lossy()),
                y = layer.y,
                x = layer.x,
                color = layer.fontcolor,
                size = layer.fontsize,
                sx = layer.shadow_x,
                sy = layer.shadow_y,
            ),
            FilterNode::Watermark {
                input,
                scale,
                color_mixer,
                x,
                y,
                format,
            } => format!(
                "[{input}:v]scale={scale}:-1,colorchannelmixer={color_mixer}[watermark];\
                 [outv][watermark]overlay={x}:{y}:format={format}[outv]"
            ),
        }
    }
}

impl BannerLayer {
    fn render(&self) -> String {
        let enable = format!("enable='between(t,{},{})'", self.start_secs, self.end_secs);
        let plate = &self.plate;
        let plate_chain = format!(
            "[outv]drawbox=x={}:y={}:w={}:h={}:color={}:t={}:{enable},format={}[outv]",
            plate.x, plate.y, plate.w, plate.h, plate.color, plate.thickness, plate.format
        );
        [
            plate_chain,
            drawtext(&self.label, &self.label_text, &self.label_font, &enable),
            drawtext(&self.title, &self.title_text, &self.title_font, &enable),
        ]
        .join(";")
    }
}

fn drawtext(style: &TextStyle, text: &str, font: &std::path::Path, enable: &str) -> String {
    format!(
        "[outv]drawtext=text={text}:expansion=none:x={x}:y={y}:fontfile={font}:fontsize={size}:\
         fontcolor={color}:box={boxed}:boxborderw={border}:boxcolor={boxcolor}:\
         shadowcolor={shadow}:shadowx={sx}:shadowy={sy}:{enable},format={format}[outv]",
        text = escape_value(text),
        x = style.x,
        y = style.y,
        font = escape_value(&font.to_string_lossy()),
        size = style.fontsize,
        color = style.fontcolor,
        boxed = style.boxed,
        border = style.boxborderw,
        boxcolor = style.boxcolor,
        shadow = style.shadowcolor,
        sx = style.shadow_x,
        sy = style.shadow_y,
        format = style.format,
    )
}

/// `1280x720` -> `1280:720`.
fn scale_expr(resolution: &str) -> String {
    resolution.replacen('x', ":", 1)
}

/// Escapes a free-form value twice: once for the filter's option parser,
/// once for the filtergraph parser.
pub fn escape_value(value: &str) -> String {
    let option_level = escape_chars(value, &['\\', '\'', ':']);
    escape_chars(&option_level, &['\\', '\'', '[', ']', ',', ';'])
}

fn escape_chars(value: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
