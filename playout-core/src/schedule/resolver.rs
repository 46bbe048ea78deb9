use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::models::Slot;
use super::store::PlaylistStore;
use super::ScheduleResult;

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Time-matched slot from the day's playlist.
    Scheduled(Slot),
    /// First slot of the default playlist, taken without time matching.
    Default(Slot),
    NoSlot,
}

impl Resolution {
    pub fn slot(&self) -> Option<&Slot> {
        match self {
            Resolution::Scheduled(slot) | Resolution::Default(slot) => Some(slot),
            Resolution::NoSlot => None,
        }
    }

    pub fn is_scheduled(&self) -> bool {
        matches!(self, Resolution::Scheduled(_))
    }
}

pub fn find_active_slot(slots: &[Slot], now: DateTime<Utc>) -> Option<&Slot> {
    slots.iter().find(|slot| slot.contains(now))
}

#[derive(Debug, Clone)]
pub struct SlotResolver {
    store: PlaylistStore,
}

impl SlotResolver {
    pub fn new(store: PlaylistStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &PlaylistStore {
        &self.store
    }

    pub fn resolve(&self, now: DateTime<Utc>) -> ScheduleResult<Resolution> {
        let date = now.date_naive();
        match self.store.load_day(date)? {
            Some(playlist) => {
                if let Some(slot) = find_active_slot(&playlist.slots, now) {
                    info!(slot = %slot.name, %date, "resolved scheduled slot");
                    return Ok(Resolution::Scheduled(slot.clone()));
                }
                warn!(%date, "no slot covers now, taking default playlist");
            }
            None => {
                warn!(%date, "day playlist not found, taking default playlist");
            }
        }

        let Some(default) = self.store.load_default()? else {
            warn!("default playlist unavailable");
            return Ok(Resolution::NoSlot);
        };
        match default.slots.into_iter().next() {
            Some(slot) => {
                info!(slot = %slot.name, "resolved default slot");
                Ok(Resolution::Default(slot))
            }
            None => {
                warn!("default playlist has no slots");
                Ok(Resolution::NoSlot)
            }
        }
    }
}
