pub mod error;
pub mod models;
pub mod resolver;
pub mod store;

pub use error::{ScheduleError, ScheduleResult};
pub use models::{Asset, OverlayPosition, OverlaySpec, Playlist, ProgramEntry, Slot};
pub use resolver::{find_active_slot, Resolution, SlotResolver};
pub use store::PlaylistStore;
