pub mod compositor;
pub mod config;
pub mod encoder;
pub mod engine;
pub mod error;
pub mod playout;
pub mod schedule;
pub mod status;

pub use compositor::{Composition, Compositor, EncoderInput, FilterGraph, FilterNode};
pub use config::{load_channel_config, parse_channel_config, ChannelConfig};
pub use encoder::{
    CommandExecutor, EncodeCommand, EncodeOutcome, EncoderError, EncoderRunner,
    SystemCommandExecutor,
};
pub use engine::{
    Engine, EngineError, EngineReport, EngineResult, FallbackReason, PlayoutMode, PlayoutPlan,
    RunOutcome,
};
pub use error::{ConfigError, Result};
pub use playout::{
    DetailsRecord, PlayoutEntry, RecordStore, ResumeDecision, RunDirectories, Sequence,
};
pub use schedule::{Playlist, PlaylistStore, Resolution, Slot, SlotResolver};
pub use status::{BackendHooks, LogHooks, PlayoutHooks, StatusError};
