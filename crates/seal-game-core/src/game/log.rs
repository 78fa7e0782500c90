//! Append-only discard history.

use serde::{Deserialize, Serialize};

use super::card::{CardIndex, CardValue};
use crate::protocol::Address;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscardReason {
    Played,
    EliminatedByGuard,
    EliminatedByBaron,
    DiscardedByPrince,
}

/// One face-up card. Rows are appended and never edited.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscardedCardEntry {
    pub player_addr: Address,
    pub player_idx: usize,
    pub card_value: CardValue,
    pub card_index: CardIndex,
    pub turn_number: u64,
    pub round: u32,
    pub reason: DiscardReason,
}
