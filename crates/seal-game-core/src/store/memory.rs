//! In-memory room store.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{RoomStore, Versioned};
use crate::error::ServiceError;
use crate::game::GameRoom;
use crate::protocol::RoomId;

#[derive(Default)]
pub struct MemoryRoomStore {
    rooms: RwLock<HashMap<RoomId, Versioned<GameRoom>>>,
}

impl MemoryRoomStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<RoomId, Versioned<GameRoom>>> {
        self.rooms.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<RoomId, Versioned<GameRoom>>> {
        self.rooms.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl RoomStore for MemoryRoomStore {
    fn insert(&self, room: GameRoom) -> Result<u64, ServiceError> {
        let mut rooms = self.write();
        if rooms.contains_key(&room.id) {
            return Err(ServiceError::DuplicateRoom(room.id));
        }
        rooms.insert(
            room.id,
            Versioned {
                version: 1,
                value: room,
            },
        );
        Ok(1)
    }

    fn load(&self, id: &RoomId) -> Result<Versioned<GameRoom>, ServiceError> {
        self.read()
            .get(id)
            .cloned()
            .ok_or(ServiceError::RoomNotFound(*id))
    }

    fn compare_and_swap(
        &self,
        id: &RoomId,
        expected_version: u64,
        room: GameRoom,
    ) -> Result<u64, ServiceError> {
        let mut rooms = self.write();
        let entry = rooms.get_mut(id).ok_or(ServiceError::RoomNotFound(*id))?;
        if entry.version != expected_version {
            return Err(ServiceError::VersionConflict {
                expected: expected_version,
                actual: entry.version,
            });
        }
        entry.version += 1;
        entry.value = room;
        Ok(entry.version)
    }

    fn remove(&self, id: &RoomId, expected_version: u64) -> Result<GameRoom, ServiceError> {
        let mut rooms = self.write();
        let entry = rooms.get(id).ok_or(ServiceError::RoomNotFound(*id))?;
        if entry.version != expected_version {
            return Err(ServiceError::VersionConflict {
                expected: expected_version,
                actual: entry.version,
            });
        }
        rooms
            .remove(id)
            .map(|entry| entry.value)
            .ok_or(ServiceError::RoomNotFound(*id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RoomConfig;
    use crate::protocol::{Address, TxContext};

    fn room() -> GameRoom {
        let ctx = TxContext::new(Address::from_bytes([1; 32]), 0);
        GameRoom::create(&ctx, RoomId::new(), "t".to_string(), &RoomConfig::default()).unwrap()
    }

    #[test]
    fn test_compare_and_swap_rejects_stale_version() {
        let store = MemoryRoomStore::new();
        let room = room();
        let id = room.id;
        assert_eq!(store.insert(room.clone()), Ok(1));
        assert_eq!(
            store.insert(room.clone()),
            Err(ServiceError::DuplicateRoom(id))
        );

        assert_eq!(store.compare_and_swap(&id, 1, room.clone()), Ok(2));
        assert_eq!(
            store.compare_and_swap(&id, 1, room),
            Err(ServiceError::VersionConflict {
                expected: 1,
                actual: 2
            })
        );
        assert_eq!(store.load(&id).unwrap().version, 2);
    }

    #[test]
    fn test_remove() {
        let store = MemoryRoomStore::new();
        let room = room();
        let id = room.id;
        store.insert(room.clone()).unwrap();
        store.compare_and_swap(&id, 1, room).unwrap();

        assert_eq!(
            store.remove(&id, 1).unwrap_err(),
            ServiceError::VersionConflict {
                expected: 1,
                actual: 2
            }
        );
        assert_eq!(store.load(&id).unwrap().version, 2);

        assert!(store.remove(&id, 2).is_ok());
        assert_eq!(store.load(&id), Err(ServiceError::RoomNotFound(id)));
    }
}
