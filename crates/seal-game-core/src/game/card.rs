//! Card values and deck composition.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Index into a room's card arrays. Hands hold these, never values.
pub type CardIndex = usize;

/// Number of cards in a full deck
pub const DECK_SIZE: usize = 21;

/// Face-up cards removed at the start of a two-player round
pub const TWO_PLAYER_PUBLIC_CARDS: usize = 3;

pub const MIN_PLAYERS: usize = 2;
pub const MAX_PLAYERS: usize = 6;

/// Card rank, ordered by value
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CardValue {
    Spy,
    Guard,
    Priest,
    Baron,
    Handmaid,
    Prince,
    Chancellor,
    King,
    Countess,
    Princess,
}

impl CardValue {
    pub const ALL: [CardValue; 10] = [
        CardValue::Spy,
        CardValue::Guard,
        CardValue::Priest,
        CardValue::Baron,
        CardValue::Handmaid,
        CardValue::Prince,
        CardValue::Chancellor,
        CardValue::King,
        CardValue::Countess,
        CardValue::Princess,
    ];

    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        Self::ALL.get(value as usize).copied()
    }

    /// Copies of this value in a full deck
    pub fn copies(&self) -> usize {
        match self {
            CardValue::Guard => 6,
            CardValue::Spy
            | CardValue::Priest
            | CardValue::Baron
            | CardValue::Handmaid
            | CardValue::Prince
            | CardValue::Chancellor => 2,
            CardValue::King | CardValue::Countess | CardValue::Princess => 1,
        }
    }

    /// Does playing this card name another player?
    pub fn requires_target(&self) -> bool {
        matches!(
            self,
            CardValue::Guard
                | CardValue::Priest
                | CardValue::Baron
                | CardValue::Prince
                | CardValue::King
        )
    }

    /// May the actor name themselves?
    pub fn allows_self_target(&self) -> bool {
        matches!(self, CardValue::Prince)
    }

    pub fn name(&self) -> &'static str {
        match self {
            CardValue::Spy => "Spy",
            CardValue::Guard => "Guard",
            CardValue::Priest => "Priest",
            CardValue::Baron => "Baron",
            CardValue::Handmaid => "Handmaid",
            CardValue::Prince => "Prince",
            CardValue::Chancellor => "Chancellor",
            CardValue::King => "King",
            CardValue::Countess => "Countess",
            CardValue::Princess => "Princess",
        }
    }
}

impl fmt::Display for CardValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), self.as_u8())
    }
}

/// Every card of a full deck in value order
pub fn full_deck() -> Vec<CardValue> {
    CardValue::ALL
        .iter()
        .flat_map(|v| std::iter::repeat(*v).take(v.copies()))
        .collect()
}

/// A full deck with `top` dealt first, for scripted rounds.
///
/// Values in `top` consume copies from the rest of the deck; asking for more
/// copies than exist yields an oversized deck that submission will reject.
pub fn stacked_deck(top: &[CardValue]) -> Vec<CardValue> {
    let mut rest = full_deck();
    for value in top {
        if let Some(pos) = rest.iter().position(|v| v == value) {
            rest.remove(pos);
        }
    }
    let mut deck = top.to_vec();
    deck.extend(rest);
    deck
}

/// Default tokens needed to win a game with `players` seats
pub fn tokens_to_win_for(players: usize) -> u32 {
    match players {
        0..=2 => 6,
        3 => 5,
        4 => 4,
        _ => 3,
    }
}
