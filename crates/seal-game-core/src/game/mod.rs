//! Game state: cards, seats, rooms, and turn resolution.

mod card;
mod log;
mod pending;
mod player;
mod room;
mod turn;

pub use card::{
    full_deck, stacked_deck, tokens_to_win_for, CardIndex, CardValue, DECK_SIZE, MAX_PLAYERS,
    MIN_PLAYERS, TWO_PLAYER_PUBLIC_CARDS,
};
pub use log::{DiscardReason, DiscardedCardEntry};
pub use pending::{ChancellorState, PendingAction, PendingEffect, PendingKind};
pub use player::Player;
pub use room::{GameRoom, RoomStatus};
pub use turn::PlayCard;
