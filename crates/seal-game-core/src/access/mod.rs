//! Capability ledger for card visibility.
//!
//! Answers "may principal P learn the value of card C right now". Ownership
//! is seeded at deal time and moved by trade effects; third parties get
//! time-bounded grants measured in ledger turns, not wall-clock time, so
//! expiry replays deterministically.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::GameError;
use crate::game::CardIndex;
use crate::protocol::Address;

/// Width of the card index suffix in a seal id
pub const SEAL_INDEX_LEN: usize = 8;

/// Who holds a card
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardOwnership {
    pub card_index: CardIndex,
    pub owner: Address,
    /// Set once the card has been discarded face-up
    pub is_revealed: bool,
}

/// A viewer's grant on one card, valid while `current_turn < expires_turn`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemporaryAccess {
    pub viewer: Address,
    pub card_index: CardIndex,
    pub expires_turn: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealAccessState {
    ownership: BTreeMap<CardIndex, CardOwnership>,
    temporary: Vec<TemporaryAccess>,
    current_turn: u64,
}

impl SealAccessState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_turn(&self) -> u64 {
        self.current_turn
    }

    pub fn ownership(&self, index: CardIndex) -> Option<&CardOwnership> {
        self.ownership.get(&index)
    }

    pub fn temporary_grants(&self) -> &[TemporaryAccess] {
        &self.temporary
    }

    /// Seed ownership of a freshly dealt card
    pub fn register_card(&mut self, index: CardIndex, owner: Address) -> Result<(), GameError> {
        if self.ownership.contains_key(&index) {
            return Err(GameError::DuplicateCard(index));
        }
        self.ownership.insert(
            index,
            CardOwnership {
                card_index: index,
                owner,
                is_revealed: false,
            },
        );
        Ok(())
    }

    /// Seed ownership of several cards; all or nothing
    pub fn register_cards_for_player(
        &mut self,
        indices: &[CardIndex],
        owner: Address,
    ) -> Result<(), GameError> {
        for (i, index) in indices.iter().enumerate() {
            if self.ownership.contains_key(index) || indices[..i].contains(index) {
                return Err(GameError::DuplicateCard(*index));
            }
        }
        for index in indices {
            self.register_card(*index, owner)?;
        }
        Ok(())
    }

    fn held_mut(&mut self, index: CardIndex) -> Result<&mut CardOwnership, GameError> {
        match self.ownership.get_mut(&index) {
            Some(entry) if !entry.is_revealed => Ok(entry),
            _ => Err(GameError::CardNotRegistered(index)),
        }
    }

    pub fn transfer_ownership(
        &mut self,
        index: CardIndex,
        new_owner: Address,
    ) -> Result<(), GameError> {
        self.held_mut(index)?.owner = new_owner;
        Ok(())
    }

    /// Exchange the owners of two held cards
    pub fn swap_ownership(&mut self, a: CardIndex, b: CardIndex) -> Result<(), GameError> {
        let owner_a = self.held_mut(a)?.owner;
        let owner_b = self.held_mut(b)?.owner;
        self.held_mut(a)?.owner = owner_b;
        self.held_mut(b)?.owner = owner_a;
        Ok(())
    }

    /// Let `viewer` see card `index` for `duration_turns` ledger turns
    pub fn grant_temporary_access(
        &mut self,
        viewer: Address,
        index: CardIndex,
        duration_turns: u64,
    ) -> Result<(), GameError> {
        self.held_mut(index)?;
        self.temporary.push(TemporaryAccess {
            viewer,
            card_index: index,
            expires_turn: self.current_turn.saturating_add(duration_turns),
        });
        Ok(())
    }

    pub fn has_temporary_access(&self, viewer: &Address, index: CardIndex) -> bool {
        self.temporary.iter().any(|grant| {
            grant.viewer == *viewer
                && grant.card_index == index
                && self.current_turn < grant.expires_turn
        })
    }

    /// Does `owner` currently hold `index`?
    pub fn owns_card(&self, owner: &Address, index: CardIndex) -> bool {
        self.ownership
            .get(&index)
            .map(|entry| !entry.is_revealed && entry.owner == *owner)
            .unwrap_or(false)
    }

    /// The authorization predicate every value-revealing read goes through
    pub fn can_access_card(&self, principal: &Address, index: CardIndex) -> bool {
        self.owns_card(principal, index) || self.has_temporary_access(principal, index)
    }

    pub fn cleanup_expired_access(&mut self) {
        let now = self.current_turn;
        self.temporary.retain(|grant| now < grant.expires_turn);
    }

    /// Drop every grant held by `viewer`, whatever its expiry
    pub fn revoke_grants_to(&mut self, viewer: &Address) {
        self.temporary.retain(|grant| grant.viewer != *viewer);
    }

    pub fn advance_turn(&mut self) {
        self.current_turn += 1;
    }

    /// The card left play face-up; keep the entry as history
    pub fn remove_card(&mut self, index: CardIndex) -> Result<(), GameError> {
        self.held_mut(index)?.is_revealed = true;
        self.temporary.retain(|grant| grant.card_index != index);
        Ok(())
    }

    /// The card went back into the undealt deck; forget it entirely
    pub fn release_card(&mut self, index: CardIndex) -> Result<(), GameError> {
        self.held_mut(index)?;
        self.ownership.remove(&index);
        self.temporary.retain(|grant| grant.card_index != index);
        Ok(())
    }
}

/// Is `prefix` a prefix of `bytes`?
pub fn is_prefix(prefix: &[u8], bytes: &[u8]) -> bool {
    bytes.len() >= prefix.len() && &bytes[..prefix.len()] == prefix
}

/// Card index encoded after the namespace, as a big-endian u64
pub fn extract_card_index_from_seal_id(
    seal_id: &[u8],
    namespace_len: usize,
) -> Result<CardIndex, GameError> {
    if seal_id.len() != namespace_len + SEAL_INDEX_LEN {
        return Err(GameError::MalformedSealId);
    }
    let mut raw = [0u8; SEAL_INDEX_LEN];
    raw.copy_from_slice(&seal_id[namespace_len..]);
    CardIndex::try_from(u64::from_be_bytes(raw)).map_err(|_| GameError::MalformedSealId)
}

/// Build the seal id for a card in a namespace
pub fn seal_id_for(namespace: &[u8], index: CardIndex) -> Vec<u8> {
    let mut id = namespace.to_vec();
    id.extend_from_slice(&(index as u64).to_be_bytes());
    id
}
