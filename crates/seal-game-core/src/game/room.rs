//! Room aggregate: seats, card arrays, and round lifecycle.
//!
//! Card identity is an index into `cards`. Hands, the undealt deck, the
//! discard log, the public cards and the burn card all hold indices, and at
//! every point they partition `0..cards.len()` (see
//! [`GameRoom::check_card_partition`]). Values only become visible through
//! the commit-reveal cells, gated by the access ledger.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, info};

use super::card::{
    tokens_to_win_for, CardIndex, CardValue, DECK_SIZE, MIN_PLAYERS, TWO_PLAYER_PUBLIC_CARDS,
};
use super::log::{DiscardReason, DiscardedCardEntry};
use super::pending::{ChancellorState, PendingAction};
use super::player::Player;
use crate::access::{extract_card_index_from_seal_id, is_prefix, seal_id_for, SealAccessState};
use crate::config::RoomConfig;
use crate::crypto::Decryptable;
use crate::error::GameError;
use crate::protocol::{Address, RoomId, TxContext};

/// Room lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomStatus {
    WaitingForPlayers,
    InProgress,
    /// Deck ran out; alive players reveal their hands
    Showdown,
    RoundOver,
    Finished,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameRoom {
    pub id: RoomId,
    pub name: String,
    pub creator: Address,
    pub pot: u64,
    pub entry_fee: u64,
    pub players: Vec<Player>,
    /// Commitment ledger, one cell per card index
    pub cards: Vec<Decryptable>,
    /// Undealt cards, drawn from the front
    pub deck_indices: VecDeque<CardIndex>,
    pub burn_card_index: Option<CardIndex>,
    pub public_card_indices: Vec<CardIndex>,
    /// Index-aligned with `public_card_indices`
    pub revealed_values: Vec<Option<CardValue>>,
    pub status: RoomStatus,
    /// Seat whose turn it is
    pub current_turn: usize,
    pub max_players: usize,
    pub round_number: u32,
    pub tokens_to_win: u32,
    pub tokens_override: Option<u32>,
    pub discard_log: Vec<DiscardedCardEntry>,
    pub pending_action: Option<PendingAction>,
    pub chancellor: Option<ChancellorState>,
    pub access: SealAccessState,
    /// Showdown reveals, index-aligned with `players`
    pub showdown_reveals: Vec<Option<CardValue>>,
    /// Round winners while `RoundOver`, game winners once `Finished`
    pub winners: Vec<Address>,
    /// Seat that opens the next round
    pub starter_idx: usize,
    pub turn_timeout_ms: u64,
    pub last_action_ms: u64,
}

impl GameRoom {
    /// Open a room; the creator takes seat 0
    pub fn create(
        ctx: &TxContext,
        id: RoomId,
        name: String,
        config: &RoomConfig,
    ) -> Result<Self, GameError> {
        config.validate()?;

        info!("Room {} created by {}", id, ctx.sender);

        Ok(Self {
            id,
            name,
            creator: ctx.sender,
            pot: config.entry_fee,
            entry_fee: config.entry_fee,
            players: vec![Player::new(ctx.sender)],
            cards: Vec::new(),
            deck_indices: VecDeque::new(),
            burn_card_index: None,
            public_card_indices: Vec::new(),
            revealed_values: Vec::new(),
            status: RoomStatus::WaitingForPlayers,
            current_turn: 0,
            max_players: config.max_players,
            round_number: 0,
            tokens_to_win: config
                .tokens_to_win
                .unwrap_or_else(|| tokens_to_win_for(config.max_players)),
            tokens_override: config.tokens_to_win,
            discard_log: Vec::new(),
            pending_action: None,
            chancellor: None,
            access: SealAccessState::new(),
            showdown_reveals: Vec::new(),
            winners: Vec::new(),
            starter_idx: 0,
            turn_timeout_ms: config.turn_timeout_ms,
            last_action_ms: ctx.timestamp_ms,
        })
    }

    // === Read accessors ===

    pub fn player_index(&self, addr: &Address) -> Option<usize> {
        self.players.iter().position(|p| p.addr == *addr)
    }

    pub fn is_member(&self, addr: &Address) -> bool {
        self.player_index(addr).is_some()
    }

    pub fn current_player(&self) -> Option<&Player> {
        self.players.get(self.current_turn)
    }

    pub fn alive_indices(&self) -> Vec<usize> {
        (0..self.players.len())
            .filter(|i| self.players[*i].is_alive)
            .collect()
    }

    pub fn chancellor_pending(&self) -> bool {
        self.chancellor.is_some()
    }

    /// Byte prefix scoping seal ids to this room
    pub fn namespace(&self) -> &[u8] {
        self.id.as_bytes()
    }

    pub fn seal_id(&self, index: CardIndex) -> Vec<u8> {
        seal_id_for(self.namespace(), index)
    }

    /// Discard log rows of the round in progress
    pub fn current_round_log(&self) -> impl Iterator<Item = &DiscardedCardEntry> {
        let round = self.round_number;
        self.discard_log.iter().filter(move |e| e.round == round)
    }

    pub(crate) fn require_status(&self, expected: RoomStatus) -> Result<(), GameError> {
        if self.status != expected {
            return Err(GameError::WrongPhase(self.status));
        }
        Ok(())
    }

    pub(crate) fn touch(&mut self, ctx: &TxContext) {
        self.last_action_ms = ctx.timestamp_ms;
    }

    // === Membership ===

    pub fn join(&mut self, ctx: &TxContext) -> Result<(), GameError> {
        self.require_status(RoomStatus::WaitingForPlayers)?;
        if self.is_member(&ctx.sender) {
            return Err(GameError::AlreadyJoined);
        }
        if self.players.len() >= self.max_players {
            return Err(GameError::RoomFull);
        }

        self.players.push(Player::new(ctx.sender));
        self.pot = self.pot.saturating_add(self.entry_fee);
        self.touch(ctx);

        info!(
            "Player {} joined room {} ({}/{})",
            ctx.sender,
            self.id,
            self.players.len(),
            self.max_players
        );
        Ok(())
    }

    pub fn leave(&mut self, ctx: &TxContext) -> Result<(), GameError> {
        self.require_status(RoomStatus::WaitingForPlayers)?;
        let idx = self.player_index(&ctx.sender).ok_or(GameError::NotAPlayer)?;
        if ctx.sender == self.creator {
            return Err(GameError::CreatorCannotLeave);
        }

        self.players.remove(idx);
        self.pot = self.pot.saturating_sub(self.entry_fee);
        self.touch(ctx);

        info!("Player {} left room {}", ctx.sender, self.id);
        Ok(())
    }

    // === Round lifecycle ===

    /// Install a client-shuffled, client-encrypted deck and deal a round
    pub fn submit_encrypted_deck(
        &mut self,
        ctx: &TxContext,
        ciphertexts: Vec<Vec<u8>>,
        hashes: Vec<[u8; 32]>,
        nonces: Vec<[u8; 32]>,
    ) -> Result<(), GameError> {
        if ctx.sender != self.creator {
            return Err(GameError::NotCreator);
        }
        match self.status {
            RoomStatus::WaitingForPlayers | RoomStatus::RoundOver => {}
            RoomStatus::InProgress | RoomStatus::Showdown => {
                return Err(GameError::DeckAlreadySubmitted)
            }
            RoomStatus::Finished => return Err(GameError::WrongPhase(self.status)),
        }
        if self.players.len() < MIN_PLAYERS {
            return Err(GameError::NotEnoughPlayers);
        }
        for actual in [ciphertexts.len(), hashes.len(), nonces.len()] {
            if actual != DECK_SIZE {
                return Err(GameError::DeckSizeMismatch {
                    expected: DECK_SIZE,
                    actual,
                });
            }
        }
        let cards = ciphertexts
            .into_iter()
            .zip(hashes)
            .zip(nonces)
            .map(|((ciphertext, hash), nonce)| Decryptable::new(ciphertext, hash, nonce))
            .collect::<Result<Vec<_>, _>>()?;

        if self.round_number == 0 {
            self.tokens_to_win = self
                .tokens_override
                .unwrap_or_else(|| tokens_to_win_for(self.players.len()));
        }
        self.round_number += 1;
        self.cards = cards;
        self.access = SealAccessState::new();
        self.pending_action = None;
        self.chancellor = None;
        self.winners.clear();
        self.showdown_reveals = vec![None; self.players.len()];
        for player in &mut self.players {
            player.reset_for_round();
        }

        self.deck_indices = (0..DECK_SIZE).collect();
        self.burn_card_index = self.deck_indices.pop_front();
        self.public_card_indices.clear();
        self.revealed_values.clear();
        if self.players.len() == 2 {
            for _ in 0..TWO_PLAYER_PUBLIC_CARDS {
                if let Some(card) = self.deck_indices.pop_front() {
                    self.public_card_indices.push(card);
                    self.revealed_values.push(None);
                }
            }
        }

        let seats = self.players.len();
        let starter = self.starter_idx % seats;
        for offset in 0..seats {
            self.deal_to((starter + offset) % seats)?;
        }
        self.current_turn = starter;
        self.deal_to(starter)?;

        self.status = RoomStatus::InProgress;
        self.touch(ctx);

        info!(
            "Room {} round {} dealt; {} opens",
            self.id, self.round_number, self.players[starter].addr
        );
        Ok(())
    }

    /// Reset a finished game so the same seats can play again
    pub fn start_new_game(&mut self, ctx: &TxContext) -> Result<(), GameError> {
        if ctx.sender != self.creator {
            return Err(GameError::NotCreator);
        }
        self.require_status(RoomStatus::Finished)?;

        for player in &mut self.players {
            player.reset_for_round();
            player.tokens = 0;
        }
        self.cards.clear();
        self.deck_indices.clear();
        self.burn_card_index = None;
        self.public_card_indices.clear();
        self.revealed_values.clear();
        self.discard_log.clear();
        self.pending_action = None;
        self.chancellor = None;
        self.access = SealAccessState::new();
        self.showdown_reveals.clear();
        self.winners.clear();
        self.round_number = 0;
        self.starter_idx = 0;
        self.current_turn = 0;
        self.pot = self.entry_fee.saturating_mul(self.players.len() as u64);
        self.status = RoomStatus::WaitingForPlayers;
        self.touch(ctx);

        info!("Room {} reset for a new game", self.id);
        Ok(())
    }

    /// Publish the value of a face-up card
    pub fn reveal_public_card(
        &mut self,
        ctx: &TxContext,
        index: CardIndex,
        plaintext: Vec<u8>,
    ) -> Result<CardValue, GameError> {
        if !self.is_member(&ctx.sender) {
            return Err(GameError::NotAPlayer);
        }
        let pos = self
            .public_card_indices
            .iter()
            .position(|c| *c == index)
            .ok_or(GameError::NotPublicCard(index))?;
        let value = self.cards[index].verify_card(&plaintext)?;
        self.cards[index].decrypt(plaintext)?;
        self.revealed_values[pos] = Some(value);

        debug!("Room {} public card {} is {}", self.id, index, value);
        Ok(value)
    }

    // === Authorization ===

    /// Decide whether the decryption service may release card plaintext
    /// named by `seal_id` to `caller`
    pub fn seal_approve_card(
        &self,
        caller: &Address,
        seal_id: &[u8],
    ) -> Result<CardIndex, GameError> {
        let namespace = self.namespace();
        if !is_prefix(namespace, seal_id) {
            return Err(GameError::NamespaceMismatch);
        }
        let index = extract_card_index_from_seal_id(seal_id, namespace.len())?;
        let cell = self
            .cards
            .get(index)
            .ok_or(GameError::InvalidCardIndex(index))?;

        if self.public_card_indices.contains(&index)
            || cell.is_decrypted()
            || self.access.can_access_card(caller, index)
        {
            Ok(index)
        } else {
            Err(GameError::AccessDenied(index))
        }
    }

    // === Invariants ===

    /// Every card index must sit in exactly one location
    pub fn check_card_partition(&self) -> Result<(), GameError> {
        if self.cards.is_empty() {
            return Ok(());
        }
        let mut seen = vec![0usize; self.cards.len()];
        let mut mark = |index: CardIndex, location: &str| -> Result<(), GameError> {
            match seen.get_mut(index) {
                Some(count) => {
                    *count += 1;
                    Ok(())
                }
                None => Err(GameError::PartitionViolation(format!(
                    "{} holds out-of-range card {}",
                    location, index
                ))),
            }
        };

        for index in &self.deck_indices {
            mark(*index, "deck")?;
        }
        for player in &self.players {
            for index in &player.hand {
                mark(*index, "hand")?;
            }
        }
        for entry in self.current_round_log() {
            mark(entry.card_index, "discard log")?;
        }
        for index in &self.public_card_indices {
            mark(*index, "public cards")?;
        }
        if let Some(index) = self.burn_card_index {
            mark(index, "burn")?;
        }

        match seen.iter().position(|count| *count != 1) {
            Some(index) => Err(GameError::PartitionViolation(format!(
                "card {} appears {} times",
                index, seen[index]
            ))),
            None => Ok(()),
        }
    }

    // === Card movement helpers ===

    /// Move the front of the deck into a hand; `None` when the deck is empty
    pub(crate) fn deal_to(&mut self, idx: usize) -> Result<Option<CardIndex>, GameError> {
        let Some(card) = self.deck_indices.pop_front() else {
            return Ok(None);
        };
        self.access.register_card(card, self.players[idx].addr)?;
        self.players[idx].hand.push(card);
        Ok(Some(card))
    }

    /// Value of a card: verified from `plaintext`, or read back if already revealed
    pub(crate) fn peek_card(
        &self,
        index: CardIndex,
        plaintext: &[u8],
    ) -> Result<CardValue, GameError> {
        let cell = self
            .cards
            .get(index)
            .ok_or(GameError::InvalidCardIndex(index))?;
        if cell.is_decrypted() {
            return cell
                .revealed_value()
                .ok_or_else(|| GameError::InvalidCardData(format!("card {}", index)));
        }
        cell.verify_card(plaintext)
    }

    /// Record a verified reveal in the commitment ledger
    pub(crate) fn open_card(
        &mut self,
        index: CardIndex,
        plaintext: Vec<u8>,
    ) -> Result<(), GameError> {
        if self.cards[index].is_encrypted() {
            self.cards[index].decrypt(plaintext)?;
        }
        Ok(())
    }

    /// Move a revealed card from a hand to the discard log
    pub(crate) fn discard_from_hand(
        &mut self,
        idx: usize,
        index: CardIndex,
        value: CardValue,
        reason: DiscardReason,
    ) -> Result<(), GameError> {
        if !self.players[idx].remove_from_hand(index) {
            return Err(GameError::CardNotInHand(index));
        }
        self.access.remove_card(index)?;
        let player = &mut self.players[idx];
        player.discarded.push(value);
        self.discard_log.push(DiscardedCardEntry {
            player_addr: player.addr,
            player_idx: idx,
            card_value: value,
            card_index: index,
            turn_number: self.access.current_turn(),
            round: self.round_number,
            reason,
        });
        Ok(())
    }
}
