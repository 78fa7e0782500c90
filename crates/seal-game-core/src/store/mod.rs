//! Versioned room storage and the transactional service on top of it.
//!
//! A room is a single mutable resource. Every transition loads the current
//! version, applies the change to a private copy, and commits with a
//! compare-and-swap on the version counter. A stale writer gets
//! [`ServiceError::VersionConflict`] and must reload and retry.

mod memory;
mod registry;
mod service;

pub use memory::MemoryRoomStore;
pub use registry::{MemoryRoomRegistry, RoomRegistry};
pub use service::GameService;

use serde::{Deserialize, Serialize};

use crate::error::ServiceError;
use crate::game::GameRoom;
use crate::protocol::RoomId;

/// A value paired with the store version it was read at or committed as
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Versioned<T> {
    pub version: u64,
    pub value: T,
}

/// Persistence for room aggregates
pub trait RoomStore: Send + Sync {
    /// Store a new room at version 1
    fn insert(&self, room: GameRoom) -> Result<u64, ServiceError>;

    fn load(&self, id: &RoomId) -> Result<Versioned<GameRoom>, ServiceError>;

    /// Replace the room if it is still at `expected_version`; returns the new version
    fn compare_and_swap(
        &self,
        id: &RoomId,
        expected_version: u64,
        room: GameRoom,
    ) -> Result<u64, ServiceError>;

    /// Delete the room if it is still at `expected_version`
    fn remove(&self, id: &RoomId, expected_version: u64) -> Result<GameRoom, ServiceError>;
}
