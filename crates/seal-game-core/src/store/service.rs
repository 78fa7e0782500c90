//! Transactional service: one atomic room transition per call.

use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{info, warn};

use super::{MemoryRoomRegistry, MemoryRoomStore, RoomRegistry, RoomStore, Versioned};
use crate::access::extract_card_index_from_seal_id;
use crate::config::RoomConfig;
use crate::error::{GameError, ServiceError};
use crate::game::{CardIndex, GameRoom, RoomStatus};
use crate::leaderboard::{Leaderboard, LeaderboardEvents, MemoryLeaderboard};
use crate::protocol::{Address, RoomId, TxContext};

/// Applies room transitions all-or-nothing.
///
/// Each transition runs against a private copy of the room, must leave the
/// card partition intact, and is committed by compare-and-swap. Leaderboard
/// results are buffered and only reach the leaderboard after the commit.
pub struct GameService<L = MemoryLeaderboard> {
    store: Arc<dyn RoomStore>,
    registry: Arc<dyn RoomRegistry>,
    leaderboard: Mutex<L>,
}

impl GameService<MemoryLeaderboard> {
    /// Service backed entirely by memory
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryRoomStore::new()),
            Arc::new(MemoryRoomRegistry::new()),
            MemoryLeaderboard::new(),
        )
    }
}

impl<L: Leaderboard> GameService<L> {
    pub fn new(store: Arc<dyn RoomStore>, registry: Arc<dyn RoomRegistry>, leaderboard: L) -> Self {
        Self {
            store,
            registry,
            leaderboard: Mutex::new(leaderboard),
        }
    }

    pub fn leaderboard(&self) -> MutexGuard<'_, L> {
        self.leaderboard
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Open a room and list it in the registry
    pub fn create_room(
        &self,
        ctx: &TxContext,
        name: String,
        config: &RoomConfig,
    ) -> Result<Versioned<GameRoom>, ServiceError> {
        let room = GameRoom::create(ctx, RoomId::new(), name, config)?;
        let id = room.id;
        let version = self.store.insert(room.clone())?;
        self.registry.register(id);
        Ok(Versioned {
            version,
            value: room,
        })
    }

    pub fn room(&self, id: &RoomId) -> Result<Versioned<GameRoom>, ServiceError> {
        self.store.load(id)
    }

    pub fn active_rooms(&self) -> Vec<RoomId> {
        self.registry.active_rooms()
    }

    /// Apply `f` to room `id` atomically.
    ///
    /// With `expected_version` set, a room that moved on since the caller
    /// read it is rejected before `f` runs.
    pub fn transact<T, F>(
        &self,
        id: &RoomId,
        expected_version: Option<u64>,
        f: F,
    ) -> Result<Versioned<T>, ServiceError>
    where
        F: FnOnce(&mut GameRoom, &mut dyn Leaderboard) -> Result<T, GameError>,
    {
        let Versioned {
            version,
            value: mut room,
        } = self.store.load(id)?;
        if let Some(expected) = expected_version {
            if expected != version {
                warn!(
                    "Room {}: stale write at version {}, current {}",
                    id, expected, version
                );
                return Err(ServiceError::VersionConflict {
                    expected,
                    actual: version,
                });
            }
        }

        let mut events = LeaderboardEvents::new();
        let value = f(&mut room, &mut events)?;
        room.check_card_partition()?;

        let version = self.store.compare_and_swap(id, version, room)?;
        if !events.is_empty() {
            events.apply_to(&mut *self.leaderboard());
        }
        Ok(Versioned { version, value })
    }

    /// Authorization check for the decryption service; never mutates
    pub fn seal_approve(
        &self,
        id: &RoomId,
        caller: &Address,
        seal_id: &[u8],
    ) -> Result<CardIndex, ServiceError> {
        let namespace = id.as_bytes();
        // Reject malformed ids before touching the store
        extract_card_index_from_seal_id(seal_id, namespace.len())?;
        let room = self.store.load(id)?.value;
        Ok(room.seal_approve_card(caller, seal_id)?)
    }

    /// Archive a finished room.
    ///
    /// The removal is conditional on the version that was checked, so a
    /// room restarted in the meantime is left alone.
    pub fn cleanup_finished_room(&self, id: &RoomId) -> Result<GameRoom, ServiceError> {
        let current = self.store.load(id)?;
        if current.value.status != RoomStatus::Finished {
            return Err(GameError::RoomNotFinished.into());
        }
        let room = self.store.remove(id, current.version)?;
        self.registry.remove(id);
        info!("Room {} archived", id);
        Ok(room)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::seal::MockSealService;

    fn ctx(b: u8) -> TxContext {
        TxContext::new(Address::from_bytes([b; 32]), 0)
    }

    #[test]
    fn test_create_room_registers_it() {
        let service = GameService::in_memory();
        let created = service
            .create_room(&ctx(1), "table".to_string(), &RoomConfig::default())
            .unwrap();

        assert_eq!(created.version, 1);
        assert_eq!(service.active_rooms(), vec![created.value.id]);
    }

    #[test]
    fn test_failed_transition_is_not_committed() {
        let service = GameService::in_memory();
        let id = service
            .create_room(&ctx(1), "table".to_string(), &RoomConfig::default())
            .unwrap()
            .value
            .id;

        let err = service
            .transact(&id, None, |room, _| {
                room.join(&ctx(2))?;
                room.join(&ctx(2))
            })
            .unwrap_err();
        assert_eq!(err, ServiceError::Game(GameError::AlreadyJoined));

        let stored = service.room(&id).unwrap();
        assert_eq!(stored.version, 1);
        assert_eq!(stored.value.players.len(), 1);
    }

    #[test]
    fn test_stale_version_is_rejected() {
        let service = GameService::in_memory();
        let id = service
            .create_room(&ctx(1), "table".to_string(), &RoomConfig::default())
            .unwrap()
            .value
            .id;

        let joined = service
            .transact(&id, Some(1), |room, _| room.join(&ctx(2)))
            .unwrap();
        assert_eq!(joined.version, 2);

        assert_eq!(
            service
                .transact(&id, Some(1), |room, _| room.join(&ctx(3)))
                .unwrap_err(),
            ServiceError::VersionConflict {
                expected: 1,
                actual: 2
            }
        );
    }

    #[test]
    fn test_partition_break_is_rejected() {
        let service = GameService::in_memory();
        let seal = MockSealService::new();
        let id = service
            .create_room(&ctx(1), "table".to_string(), &RoomConfig::default())
            .unwrap()
            .value
            .id;
        let deck = seal.seal_shuffled(id, &mut rand::thread_rng());
        service
            .transact(&id, None, |room, _| {
                room.join(&ctx(2))?;
                room.submit_encrypted_deck(&ctx(1), deck.ciphertexts, deck.hashes, deck.nonces)
            })
            .unwrap();

        let err = service
            .transact(&id, None, |room, _| {
                room.deck_indices.pop_back();
                Ok(())
            })
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvariantViolation);
    }

    #[test]
    fn test_cleanup_requires_finished_room() {
        let service = GameService::in_memory();
        let id = service
            .create_room(&ctx(1), "table".to_string(), &RoomConfig::default())
            .unwrap()
            .value
            .id;

        assert_eq!(
            service.cleanup_finished_room(&id).unwrap_err(),
            ServiceError::Game(GameError::RoomNotFinished)
        );

        service
            .transact(&id, None, |room, _| {
                room.status = RoomStatus::Finished;
                Ok(())
            })
            .unwrap();
        service.cleanup_finished_room(&id).unwrap();
        assert!(service.active_rooms().is_empty());
        assert_eq!(
            service.room(&id).unwrap_err(),
            ServiceError::RoomNotFound(id)
        );
    }

    /// Lets a queued writer commit right before a removal lands
    #[derive(Default)]
    struct InterleavingStore {
        inner: MemoryRoomStore,
        queued: Mutex<Option<GameRoom>>,
    }

    impl RoomStore for InterleavingStore {
        fn insert(&self, room: GameRoom) -> Result<u64, ServiceError> {
            self.inner.insert(room)
        }

        fn load(&self, id: &RoomId) -> Result<Versioned<GameRoom>, ServiceError> {
            self.inner.load(id)
        }

        fn compare_and_swap(
            &self,
            id: &RoomId,
            expected_version: u64,
            room: GameRoom,
        ) -> Result<u64, ServiceError> {
            self.inner.compare_and_swap(id, expected_version, room)
        }

        fn remove(&self, id: &RoomId, expected_version: u64) -> Result<GameRoom, ServiceError> {
            if let Some(room) = self.queued.lock().unwrap().take() {
                let current = self.inner.load(id)?.version;
                self.inner.compare_and_swap(id, current, room)?;
            }
            self.inner.remove(id, expected_version)
        }
    }

    #[test]
    fn test_cleanup_keeps_room_restarted_concurrently() {
        let store = Arc::new(InterleavingStore::default());
        let service = GameService::new(
            store.clone(),
            Arc::new(MemoryRoomRegistry::new()),
            MemoryLeaderboard::new(),
        );
        let id = service
            .create_room(&ctx(1), "table".to_string(), &RoomConfig::default())
            .unwrap()
            .value
            .id;
        service
            .transact(&id, None, |room, _| {
                room.status = RoomStatus::Finished;
                Ok(())
            })
            .unwrap();

        let mut restarted = service.room(&id).unwrap().value;
        restarted.start_new_game(&ctx(1)).unwrap();
        *store.queued.lock().unwrap() = Some(restarted);

        assert_eq!(
            service.cleanup_finished_room(&id).unwrap_err(),
            ServiceError::VersionConflict {
                expected: 2,
                actual: 3
            }
        );
        let room = service.room(&id).unwrap();
        assert_eq!(room.version, 3);
        assert_eq!(room.value.status, RoomStatus::WaitingForPlayers);
        assert_eq!(service.active_rooms(), vec![id]);
    }

    #[test]
    fn test_seal_approve_checks_namespace() {
        let service = GameService::in_memory();
        let id = service
            .create_room(&ctx(1), "table".to_string(), &RoomConfig::default())
            .unwrap()
            .value
            .id;

        assert_eq!(
            service.seal_approve(&id, &ctx(1).sender, &[0u8; 3]),
            Err(ServiceError::Game(GameError::MalformedSealId))
        );
    }
}
