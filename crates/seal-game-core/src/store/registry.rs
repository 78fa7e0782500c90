//! Discovery index of active rooms.

use std::collections::BTreeSet;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::protocol::RoomId;

pub trait RoomRegistry: Send + Sync {
    fn register(&self, id: RoomId);

    /// Returns whether the room was listed
    fn remove(&self, id: &RoomId) -> bool;

    fn active_rooms(&self) -> Vec<RoomId>;
}

#[derive(Default)]
pub struct MemoryRoomRegistry {
    active: RwLock<BTreeSet<RoomId>>,
}

impl MemoryRoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeSet<RoomId>> {
        self.active.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeSet<RoomId>> {
        self.active.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl RoomRegistry for MemoryRoomRegistry {
    fn register(&self, id: RoomId) {
        self.write().insert(id);
    }

    fn remove(&self, id: &RoomId) -> bool {
        self.write().remove(id)
    }

    fn active_rooms(&self) -> Vec<RoomId> {
        self.read().iter().copied().collect()
    }
}
