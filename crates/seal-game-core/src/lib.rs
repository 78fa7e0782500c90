//! Seal Game Core Library
//!
//! This crate provides the encrypted card-game state machine: commit-reveal
//! cells for every card, the capability ledger deciding who may decrypt
//! which card, the room and turn logic, and the versioned store that
//! applies one transition at a time.

pub mod access;
pub mod config;
pub mod crypto;
pub mod error;
pub mod game;
pub mod leaderboard;
pub mod protocol;
pub mod seal;
pub mod store;

pub use access::SealAccessState;
pub use config::RoomConfig;
pub use crypto::Decryptable;
pub use error::{ErrorKind, GameError, ServiceError};
pub use game::{CardIndex, CardValue, GameRoom, PlayCard, Player, RoomStatus};
pub use leaderboard::{Leaderboard, MemoryLeaderboard};
pub use protocol::{Address, RoomId, TxContext};
pub use seal::MockSealService;
pub use store::{GameService, Versioned};
