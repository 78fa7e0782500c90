//! Open sub-protocols that suspend turn advancement.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::card::{CardIndex, CardValue};
use crate::protocol::Address;

/// Which response a pending action waits for, with its typed payload
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PendingEffect {
    /// Responder is eliminated if their card equals `guess`
    Guard { guess: CardValue },
    /// Lower of `initiator_value` and the responder's card is eliminated
    Baron {
        initiator_value: CardValue,
        initiator_card: CardIndex,
    },
    /// Responder discards their card and draws a replacement
    Prince,
}

impl PendingEffect {
    pub fn kind(&self) -> PendingKind {
        match self {
            PendingEffect::Guard { .. } => PendingKind::Guard,
            PendingEffect::Baron { .. } => PendingKind::Baron,
            PendingEffect::Prince => PendingKind::Prince,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PendingKind {
    Guard,
    Baron,
    Prince,
}

impl fmt::Display for PendingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PendingKind::Guard => write!(f, "guard"),
            PendingKind::Baron => write!(f, "baron"),
            PendingKind::Prince => write!(f, "prince"),
        }
    }
}

/// An effect waiting on a second player's reveal
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAction {
    pub effect: PendingEffect,
    pub initiator: Address,
    pub initiator_idx: usize,
    pub responder: Address,
    pub responder_idx: usize,
    /// The responder's card that must be revealed
    pub card_index: CardIndex,
}

/// Draw-two-keep-one selection in progress
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChancellorState {
    pub player_idx: usize,
    /// Every card the player holds while choosing
    pub card_indices: Vec<CardIndex>,
}
