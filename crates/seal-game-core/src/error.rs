//! Error types for the sealed card game.

use serde::Serialize;
use thiserror::Error;

use crate::game::RoomStatus;
use crate::protocol::RoomId;

/// Broad class of a rejected transition.
///
/// Every variant is non-retryable as-is: the caller must submit a corrected
/// call, never replay a partial effect.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    /// Wrong actor or wrong phase.
    ProtocolViolation,
    /// A reveal did not match its commitment.
    CryptographicMismatch,
    /// The request would break a structural invariant (usually a client bug).
    InvariantViolation,
    /// Room full, deck exhausted, or similar capacity limits.
    CapacityError,
    /// The principal may not learn the requested card.
    AccessDenied,
    /// Referenced entity does not exist.
    NotFound,
}

/// Errors from game operations
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum GameError {
    // Protocol violations
    #[error("Not your turn")]
    NotYourTurn,

    #[error("No pending action to respond to")]
    NoPendingAction,

    #[error("Pending action is not of the requested kind")]
    WrongPendingAction,

    #[error("An action is pending; resolve it first")]
    ActionPending,

    #[error("No chancellor selection is pending")]
    NoChancellorPending,

    #[error("Operation not valid while room is {0:?}")]
    WrongPhase(RoomStatus),

    #[error("Encrypted deck already submitted for this round")]
    DeckAlreadySubmitted,

    #[error("Only the room creator may do this")]
    NotCreator,

    #[error("Caller is not a player in this room")]
    NotAPlayer,

    #[error("Caller already joined this room")]
    AlreadyJoined,

    #[error("The room creator cannot leave")]
    CreatorCannotLeave,

    #[error("Card {0} is not a public card")]
    NotPublicCard(usize),

    #[error("Player {0} is eliminated")]
    PlayerEliminated(usize),

    #[error("Card {0} is not in the caller's hand")]
    CardNotInHand(usize),

    #[error("Caller does not own card {0}")]
    CardNotOwned(usize),

    #[error("Card {0} is not the card named by the pending action")]
    CardMismatch(usize),

    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error("Invalid guard guess")]
    InvalidGuess,

    #[error("Baron play requires the plaintext of the kept card")]
    MissingKeptCard,

    #[error("Hand already revealed for this showdown")]
    AlreadyRevealed,

    #[error("Timeout not reached")]
    TimeoutNotReached,

    #[error("Timeouts are disabled for this room")]
    TimeoutDisabled,

    // Cryptographic mismatch
    #[error("Hash mismatch: plaintext does not match commitment")]
    HashMismatch,

    // Invariant violations
    #[error("Decryptable is in the wrong state for this operation")]
    WrongState,

    #[error("Card {0} already has an owner")]
    DuplicateCard(usize),

    #[error("Card {0} is not registered")]
    CardNotRegistered(usize),

    #[error("Card index {0} out of range")]
    InvalidCardIndex(usize),

    #[error("Invalid card data: {0}")]
    InvalidCardData(String),

    #[error("Chancellor indices do not reconstitute the drawn set")]
    ChancellorSetMismatch,

    #[error("Deck size mismatch: expected {expected}, got {actual}")]
    DeckSizeMismatch { expected: usize, actual: usize },

    #[error("Invalid ciphertext length {0}")]
    InvalidCiphertext(usize),

    #[error("Card partition broken: {0}")]
    PartitionViolation(String),

    #[error("Invalid room configuration: {0}")]
    InvalidConfig(String),

    #[error("Malformed seal id")]
    MalformedSealId,

    // Capacity errors
    #[error("Room is full")]
    RoomFull,

    #[error("Not enough players to start")]
    NotEnoughPlayers,

    // Access
    #[error("Access denied to card {0}")]
    AccessDenied(usize),

    #[error("Seal id is outside this room's namespace")]
    NamespaceMismatch,

    // Registry
    #[error("Room is not finished")]
    RoomNotFinished,
}

impl GameError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        use GameError::*;
        match self {
            NotYourTurn
            | NoPendingAction
            | WrongPendingAction
            | ActionPending
            | NoChancellorPending
            | WrongPhase(_)
            | DeckAlreadySubmitted
            | NotCreator
            | NotAPlayer
            | AlreadyJoined
            | CreatorCannotLeave
            | NotPublicCard(_)
            | PlayerEliminated(_)
            | CardNotInHand(_)
            | CardNotOwned(_)
            | CardMismatch(_)
            | InvalidTarget(_)
            | InvalidGuess
            | MissingKeptCard
            | AlreadyRevealed
            | TimeoutNotReached
            | TimeoutDisabled
            | RoomNotFinished => ErrorKind::ProtocolViolation,
            HashMismatch => ErrorKind::CryptographicMismatch,
            WrongState
            | DuplicateCard(_)
            | CardNotRegistered(_)
            | InvalidCardIndex(_)
            | InvalidCardData(_)
            | ChancellorSetMismatch
            | DeckSizeMismatch { .. }
            | InvalidCiphertext(_)
            | PartitionViolation(_)
            | InvalidConfig(_)
            | MalformedSealId => ErrorKind::InvariantViolation,
            RoomFull | NotEnoughPlayers => ErrorKind::CapacityError,
            AccessDenied(_) | NamespaceMismatch => ErrorKind::AccessDenied,
        }
    }
}

/// Errors from the transactional service around a room
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Game(#[from] GameError),

    #[error("Room {0} not found")]
    RoomNotFound(RoomId),

    #[error("Room changed concurrently: expected version {expected}, found {actual}")]
    VersionConflict { expected: u64, actual: u64 },

    #[error("Room {0} already exists")]
    DuplicateRoom(RoomId),
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::Game(e) => e.kind(),
            ServiceError::RoomNotFound(_) => ErrorKind::NotFound,
            ServiceError::VersionConflict { .. } => ErrorKind::ProtocolViolation,
            ServiceError::DuplicateRoom(_) => ErrorKind::InvariantViolation,
        }
    }
}
