//! Turn resolution and the pending-action sub-protocol.
//!
//! A played card is verified, discarded, and its effect applied. Effects
//! that need a second player's hidden card open a [`PendingAction`]; the
//! turn only advances once that player answers with `respond_*`. Every
//! entry point validates fully before its first mutation.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::card::{CardIndex, CardValue};
use super::log::DiscardReason;
use super::pending::{ChancellorState, PendingAction, PendingEffect, PendingKind};
use super::room::{GameRoom, RoomStatus};
use crate::error::GameError;
use crate::leaderboard::Leaderboard;
use crate::protocol::{hex_serde, TxContext};

/// A `play_turn` request
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayCard {
    pub card_index: CardIndex,
    #[serde(with = "hex_serde::bytes")]
    pub plaintext: Vec<u8>,
    #[serde(default)]
    pub target: Option<usize>,
    #[serde(default)]
    pub guess: Option<CardValue>,
    /// Baron only: plaintext of the card the actor keeps
    #[serde(default, with = "hex_serde::opt_bytes")]
    pub kept_plaintext: Option<Vec<u8>>,
}

impl PlayCard {
    pub fn new(card_index: CardIndex, plaintext: Vec<u8>) -> Self {
        Self {
            card_index,
            plaintext,
            target: None,
            guess: None,
            kept_plaintext: None,
        }
    }

    pub fn target(mut self, target: usize) -> Self {
        self.target = Some(target);
        self
    }

    pub fn guess(mut self, guess: CardValue) -> Self {
        self.guess = Some(guess);
        self
    }

    pub fn kept(mut self, plaintext: Vec<u8>) -> Self {
        self.kept_plaintext = Some(plaintext);
        self
    }
}

/// Effect worked out during validation, applied afterwards
enum Effect {
    None,
    Spy,
    Guard { target: usize, card: CardIndex, guess: CardValue },
    Priest { card: CardIndex },
    Baron {
        target: usize,
        card: CardIndex,
        kept: CardIndex,
        kept_value: CardValue,
        kept_plaintext: Vec<u8>,
    },
    Handmaid,
    Prince { target: usize, card: CardIndex },
    Chancellor,
    King { target: usize, mine: CardIndex, theirs: CardIndex },
    Princess,
}

impl GameRoom {
    /// Play a card from the current player's hand
    pub fn play_turn(
        &mut self,
        ctx: &TxContext,
        leaderboard: &mut dyn Leaderboard,
        play: PlayCard,
    ) -> Result<(), GameError> {
        self.require_status(RoomStatus::InProgress)?;
        let actor = self.player_index(&ctx.sender).ok_or(GameError::NotAPlayer)?;
        if actor != self.current_turn {
            return Err(GameError::NotYourTurn);
        }
        if self.pending_action.is_some() || self.chancellor_pending() {
            return Err(GameError::ActionPending);
        }
        if !self.players[actor].is_alive {
            return Err(GameError::PlayerEliminated(actor));
        }

        let index = play.card_index;
        if !self.players[actor].holds(index) {
            return Err(GameError::CardNotInHand(index));
        }
        if !self.access.owns_card(&ctx.sender, index) {
            return Err(GameError::CardNotOwned(index));
        }
        let value = self.peek_card(index, &play.plaintext)?;
        let effect = self.plan_effect(actor, index, value, &play)?;

        // Validated; apply
        self.open_card(index, play.plaintext)?;
        self.discard_from_hand(actor, index, value, DiscardReason::Played)?;
        self.touch(ctx);

        debug!(
            "Room {} turn {}: player {} plays {}",
            self.id,
            self.access.current_turn(),
            actor,
            value
        );

        match effect {
            Effect::None => {}
            Effect::Spy => self.players[actor].has_played_spy = true,
            Effect::Guard {
                target,
                card,
                guess,
            } => {
                self.open_pending(actor, target, card, PendingEffect::Guard { guess });
                return Ok(());
            }
            Effect::Priest { card } => {
                let turns = self.alive_indices().len() as u64;
                self.access.grant_temporary_access(ctx.sender, card, turns)?;
            }
            Effect::Baron {
                target,
                card,
                kept,
                kept_value,
                kept_plaintext,
            } => {
                self.open_card(kept, kept_plaintext)?;
                self.open_pending(
                    actor,
                    target,
                    card,
                    PendingEffect::Baron {
                        initiator_value: kept_value,
                        initiator_card: kept,
                    },
                );
                return Ok(());
            }
            Effect::Handmaid => self.players[actor].is_immune = true,
            Effect::Prince { target, card } => {
                self.open_pending(actor, target, card, PendingEffect::Prince);
                return Ok(());
            }
            Effect::Chancellor => {
                for _ in 0..2 {
                    self.deal_to(actor)?;
                }
                if self.players[actor].hand.len() > 1 {
                    self.chancellor = Some(ChancellorState {
                        player_idx: actor,
                        card_indices: self.players[actor].hand.clone(),
                    });
                    return Ok(());
                }
            }
            Effect::King {
                target,
                mine,
                theirs,
            } => {
                self.access.swap_ownership(mine, theirs)?;
                self.players[actor].hand = vec![theirs];
                self.players[target].hand = vec![mine];
            }
            Effect::Princess => self.eliminate(actor),
        }

        self.finish_turn(leaderboard)
    }

    /// Reveal the card a Guard named
    pub fn respond_guard(
        &mut self,
        ctx: &TxContext,
        leaderboard: &mut dyn Leaderboard,
        card_index: CardIndex,
        plaintext: Vec<u8>,
    ) -> Result<(), GameError> {
        let pending = self.pending_for(ctx, PendingKind::Guard, card_index)?;
        let value = self.peek_card(card_index, &plaintext)?;
        let PendingEffect::Guard { guess } = pending.effect else {
            return Err(GameError::WrongPendingAction);
        };

        self.open_card(card_index, plaintext)?;
        self.pending_action = None;
        self.touch(ctx);

        if value == guess {
            info!(
                "Room {}: guard guessed {} correctly, player {} eliminated",
                self.id, guess, pending.responder_idx
            );
            self.discard_from_hand(
                pending.responder_idx,
                card_index,
                value,
                DiscardReason::EliminatedByGuard,
            )?;
            self.eliminate(pending.responder_idx);
        } else {
            debug!("Room {}: guard guessed {}, card was not", self.id, guess);
        }

        self.finish_turn(leaderboard)
    }

    /// Reveal the card a Baron compares against
    pub fn respond_baron(
        &mut self,
        ctx: &TxContext,
        leaderboard: &mut dyn Leaderboard,
        card_index: CardIndex,
        plaintext: Vec<u8>,
    ) -> Result<(), GameError> {
        let pending = self.pending_for(ctx, PendingKind::Baron, card_index)?;
        let value = self.peek_card(card_index, &plaintext)?;
        let PendingEffect::Baron {
            initiator_value,
            initiator_card,
        } = pending.effect
        else {
            return Err(GameError::WrongPendingAction);
        };

        self.open_card(card_index, plaintext)?;
        self.pending_action = None;
        self.touch(ctx);

        let loser = match initiator_value.cmp(&value) {
            std::cmp::Ordering::Greater => Some((pending.responder_idx, card_index, value)),
            std::cmp::Ordering::Less => {
                Some((pending.initiator_idx, initiator_card, initiator_value))
            }
            std::cmp::Ordering::Equal => None,
        };
        if let Some((idx, card, card_value)) = loser {
            info!(
                "Room {}: baron {} vs {}, player {} eliminated",
                self.id, initiator_value, value, idx
            );
            self.discard_from_hand(idx, card, card_value, DiscardReason::EliminatedByBaron)?;
            self.eliminate(idx);
        }

        self.finish_turn(leaderboard)
    }

    /// Discard the card a Prince named and draw a replacement
    pub fn respond_prince(
        &mut self,
        ctx: &TxContext,
        leaderboard: &mut dyn Leaderboard,
        card_index: CardIndex,
        plaintext: Vec<u8>,
    ) -> Result<(), GameError> {
        let pending = self.pending_for(ctx, PendingKind::Prince, card_index)?;
        let value = self.peek_card(card_index, &plaintext)?;
        let idx = pending.responder_idx;

        self.open_card(card_index, plaintext)?;
        self.pending_action = None;
        self.touch(ctx);
        self.discard_from_hand(idx, card_index, value, DiscardReason::DiscardedByPrince)?;

        if value == CardValue::Princess {
            info!("Room {}: player {} discarded the Princess", self.id, idx);
            self.eliminate(idx);
        } else if self.deal_to(idx)?.is_none() {
            if let Some(burn) = self.burn_card_index.take() {
                self.access.register_card(burn, self.players[idx].addr)?;
                self.players[idx].hand.push(burn);
                debug!("Room {}: player {} takes the burn card", self.id, idx);
            }
        }

        self.finish_turn(leaderboard)
    }

    /// Keep one card from a Chancellor draw and return the rest to the deck
    /// bottom in the given order
    pub fn resolve_chancellor(
        &mut self,
        ctx: &TxContext,
        leaderboard: &mut dyn Leaderboard,
        keep_card_index: CardIndex,
        return_indices: Vec<CardIndex>,
    ) -> Result<(), GameError> {
        self.require_status(RoomStatus::InProgress)?;
        let state = self.chancellor.as_ref().ok_or(GameError::NoChancellorPending)?;
        let idx = state.player_idx;
        if self.players[idx].addr != ctx.sender {
            return Err(GameError::NotYourTurn);
        }

        let mut claimed = return_indices.clone();
        claimed.push(keep_card_index);
        claimed.sort_unstable();
        let mut expected = state.card_indices.clone();
        expected.sort_unstable();
        if claimed != expected {
            return Err(GameError::ChancellorSetMismatch);
        }

        for index in &return_indices {
            self.players[idx].remove_from_hand(*index);
            self.access.release_card(*index)?;
            self.deck_indices.push_back(*index);
        }
        self.chancellor = None;
        self.touch(ctx);

        debug!(
            "Room {}: chancellor keeps {}, returns {:?}",
            self.id, keep_card_index, return_indices
        );
        self.finish_turn(leaderboard)
    }

    /// Showdown reveal of the caller's last card
    pub fn reveal_hand(
        &mut self,
        ctx: &TxContext,
        leaderboard: &mut dyn Leaderboard,
        card_index: CardIndex,
        plaintext: Vec<u8>,
    ) -> Result<CardValue, GameError> {
        self.require_status(RoomStatus::Showdown)?;
        let idx = self.player_index(&ctx.sender).ok_or(GameError::NotAPlayer)?;
        if !self.players[idx].is_alive {
            return Err(GameError::PlayerEliminated(idx));
        }
        if self.showdown_reveals.get(idx).copied().flatten().is_some() {
            return Err(GameError::AlreadyRevealed);
        }
        if !self.players[idx].holds(card_index) {
            return Err(GameError::CardNotInHand(card_index));
        }
        let value = self.peek_card(card_index, &plaintext)?;

        self.open_card(card_index, plaintext)?;
        self.showdown_reveals[idx] = Some(value);
        self.touch(ctx);
        debug!("Room {}: player {} shows {}", self.id, idx, value);

        self.resolve_showdown(leaderboard);
        Ok(value)
    }

    /// Forfeit whoever the room is waiting on once the turn timeout lapses
    pub fn claim_timeout(
        &mut self,
        ctx: &TxContext,
        leaderboard: &mut dyn Leaderboard,
    ) -> Result<Vec<usize>, GameError> {
        if !matches!(self.status, RoomStatus::InProgress | RoomStatus::Showdown) {
            return Err(GameError::WrongPhase(self.status));
        }
        if !self.is_member(&ctx.sender) {
            return Err(GameError::NotAPlayer);
        }
        if self.turn_timeout_ms == 0 {
            return Err(GameError::TimeoutDisabled);
        }
        if ctx.timestamp_ms.saturating_sub(self.last_action_ms) < self.turn_timeout_ms {
            return Err(GameError::TimeoutNotReached);
        }

        let stalled = if let Some(pending) = &self.pending_action {
            vec![pending.responder_idx]
        } else if let Some(state) = &self.chancellor {
            vec![state.player_idx]
        } else if self.status == RoomStatus::Showdown {
            self.alive_indices()
                .into_iter()
                .filter(|i| self.showdown_reveals.get(*i).copied().flatten().is_none())
                .collect()
        } else {
            vec![self.current_turn]
        };

        for idx in &stalled {
            warn!(
                "Room {}: player {} timed out and forfeits the round",
                self.id, idx
            );
            self.eliminate(*idx);
        }
        self.pending_action = None;
        self.chancellor = None;
        self.touch(ctx);

        if self.status == RoomStatus::Showdown {
            self.resolve_showdown(leaderboard);
        } else {
            self.finish_turn(leaderboard)?;
        }
        Ok(stalled)
    }

    // === Internals ===

    /// Check a play and work out its effect without touching state
    fn plan_effect(
        &self,
        actor: usize,
        index: CardIndex,
        value: CardValue,
        play: &PlayCard,
    ) -> Result<Effect, GameError> {
        let target = self.validate_target(actor, value, play.target)?;
        let other_card = self.players[actor]
            .hand
            .iter()
            .copied()
            .find(|c| *c != index);

        let effect = match (value, target) {
            (CardValue::Spy, _) => Effect::Spy,
            (CardValue::Guard, Some(target)) => {
                let guess = play.guess.ok_or(GameError::InvalidGuess)?;
                if guess == CardValue::Guard {
                    return Err(GameError::InvalidGuess);
                }
                Effect::Guard {
                    target,
                    card: self.held_card(target)?,
                    guess,
                }
            }
            (CardValue::Priest, Some(target)) => Effect::Priest {
                card: self.held_card(target)?,
            },
            (CardValue::Baron, Some(target)) => {
                let kept_plaintext = play
                    .kept_plaintext
                    .clone()
                    .ok_or(GameError::MissingKeptCard)?;
                let kept = other_card.ok_or(GameError::MissingKeptCard)?;
                let kept_value = self.peek_card(kept, &kept_plaintext)?;
                Effect::Baron {
                    target,
                    card: self.held_card(target)?,
                    kept,
                    kept_value,
                    kept_plaintext,
                }
            }
            (CardValue::Handmaid, _) => Effect::Handmaid,
            (CardValue::Prince, Some(target)) => {
                let card = if target == actor {
                    other_card.ok_or_else(|| {
                        GameError::InvalidTarget("no card left to discard".to_string())
                    })?
                } else {
                    self.held_card(target)?
                };
                Effect::Prince { target, card }
            }
            (CardValue::Chancellor, _) => Effect::Chancellor,
            (CardValue::King, Some(target)) => Effect::King {
                target,
                mine: other_card.ok_or_else(|| {
                    GameError::InvalidTarget("no card left to trade".to_string())
                })?,
                theirs: self.held_card(target)?,
            },
            (CardValue::Princess, _) => Effect::Princess,
            _ => Effect::None,
        };
        Ok(effect)
    }

    /// Resolve the named target. `None` means no legal target exists.
    fn validate_target(
        &self,
        actor: usize,
        value: CardValue,
        target: Option<usize>,
    ) -> Result<Option<usize>, GameError> {
        if !value.requires_target() {
            return match target {
                Some(_) => Err(GameError::InvalidTarget(format!(
                    "{} takes no target",
                    value.name()
                ))),
                None => Ok(None),
            };
        }

        match target {
            Some(t) if t >= self.players.len() => {
                Err(GameError::InvalidTarget(format!("no player {}", t)))
            }
            Some(t) if t == actor => {
                if value.allows_self_target() {
                    Ok(Some(t))
                } else {
                    Err(GameError::InvalidTarget("cannot target yourself".to_string()))
                }
            }
            Some(t) if !self.players[t].is_targetable() => Err(GameError::InvalidTarget(
                format!("player {} is immune or eliminated", t),
            )),
            Some(t) => Ok(Some(t)),
            None if value.allows_self_target() => Ok(Some(actor)),
            None => {
                let any_target = (0..self.players.len())
                    .any(|i| i != actor && self.players[i].is_targetable());
                if any_target {
                    Err(GameError::InvalidTarget("a target is required".to_string()))
                } else {
                    Ok(None)
                }
            }
        }
    }

    fn held_card(&self, idx: usize) -> Result<CardIndex, GameError> {
        self.players[idx]
            .hand
            .first()
            .copied()
            .ok_or_else(|| GameError::InvalidTarget(format!("player {} holds no card", idx)))
    }

    fn pending_for(
        &self,
        ctx: &TxContext,
        kind: PendingKind,
        card_index: CardIndex,
    ) -> Result<PendingAction, GameError> {
        self.require_status(RoomStatus::InProgress)?;
        let pending = self
            .pending_action
            .as_ref()
            .ok_or(GameError::NoPendingAction)?;
        if pending.responder != ctx.sender {
            return Err(GameError::NotYourTurn);
        }
        if pending.effect.kind() != kind {
            return Err(GameError::WrongPendingAction);
        }
        if pending.card_index != card_index {
            return Err(GameError::CardMismatch(card_index));
        }
        Ok(pending.clone())
    }

    fn open_pending(
        &mut self,
        initiator_idx: usize,
        responder_idx: usize,
        card_index: CardIndex,
        effect: PendingEffect,
    ) {
        debug!(
            "Room {}: {} awaits player {} (card {})",
            self.id,
            effect.kind(),
            responder_idx,
            card_index
        );
        self.pending_action = Some(PendingAction {
            effect,
            initiator: self.players[initiator_idx].addr,
            initiator_idx,
            responder: self.players[responder_idx].addr,
            responder_idx,
            card_index,
        });
    }

    fn eliminate(&mut self, idx: usize) {
        let player = &mut self.players[idx];
        player.is_alive = false;
        player.is_immune = false;
        info!("Room {}: player {} eliminated", self.id, player.addr);
    }

    /// Round-end check, then hand the turn on
    fn finish_turn(&mut self, leaderboard: &mut dyn Leaderboard) -> Result<(), GameError> {
        let alive = self.alive_indices();
        if alive.len() <= 1 {
            self.end_round(alive, leaderboard);
            return Ok(());
        }
        if self.deck_indices.is_empty() {
            self.begin_showdown();
            return Ok(());
        }
        self.advance_turn()
    }

    fn advance_turn(&mut self) -> Result<(), GameError> {
        let seats = self.players.len();
        let next = (1..=seats)
            .map(|offset| (self.current_turn + offset) % seats)
            .find(|i| self.players[*i].is_alive)
            .ok_or(GameError::NotEnoughPlayers)?;

        self.access.advance_turn();
        self.access.cleanup_expired_access();
        // A Priest view ends when the priest's next turn begins, even if
        // eliminations shortened the lap
        self.access.revoke_grants_to(&self.players[next].addr);
        self.current_turn = next;
        self.players[next].is_immune = false;

        if self.deal_to(next)?.is_none() {
            self.begin_showdown();
        }
        Ok(())
    }

    fn begin_showdown(&mut self) {
        info!("Room {}: deck exhausted, showdown", self.id);
        self.status = RoomStatus::Showdown;
        self.showdown_reveals = vec![None; self.players.len()];
    }

    /// End the showdown once every alive player has revealed
    fn resolve_showdown(&mut self, leaderboard: &mut dyn Leaderboard) {
        let alive = self.alive_indices();
        let mut shown = Vec::with_capacity(alive.len());
        for idx in alive {
            match self.showdown_reveals.get(idx).copied().flatten() {
                Some(value) => shown.push((idx, value, self.players[idx].discard_total())),
                None => return,
            }
        }

        let best = shown.iter().map(|(_, value, total)| (*value, *total)).max();
        let winners = shown
            .iter()
            .filter(|(_, value, total)| Some((*value, *total)) == best)
            .map(|(idx, _, _)| *idx)
            .collect();
        self.end_round(winners, leaderboard);
    }

    fn end_round(&mut self, winners: Vec<usize>, leaderboard: &mut dyn Leaderboard) {
        self.pending_action = None;
        self.chancellor = None;

        for idx in &winners {
            self.players[*idx].tokens += 1;
            leaderboard.record_round_win(&self.players[*idx].addr);
        }
        let spies: Vec<usize> = self
            .alive_indices()
            .into_iter()
            .filter(|i| self.players[*i].has_played_spy)
            .collect();
        if let [spy] = spies[..] {
            self.players[spy].tokens += 1;
            debug!("Room {}: spy bonus for player {}", self.id, spy);
        }

        if let Some(first) = winners.first() {
            self.starter_idx = *first;
        }
        self.winners = winners.iter().map(|i| self.players[*i].addr).collect();
        info!(
            "Room {} round {} won by {:?}",
            self.id, self.round_number, winners
        );

        let champions: Vec<usize> = (0..self.players.len())
            .filter(|i| self.players[*i].tokens >= self.tokens_to_win)
            .collect();
        if champions.is_empty() {
            self.status = RoomStatus::RoundOver;
            return;
        }

        let share = self.pot / champions.len() as u64;
        let remainder = self.pot % champions.len() as u64;
        for player in &self.players {
            leaderboard.record_game_played(&player.addr);
        }
        for (n, idx) in champions.iter().enumerate() {
            let winnings = if n == 0 { share + remainder } else { share };
            leaderboard.record_game_win(&self.players[*idx].addr, winnings);
        }
        self.winners = champions.iter().map(|i| self.players[*i].addr).collect();
        self.pot = 0;
        self.status = RoomStatus::Finished;
        info!("Room {} finished, winners {:?}", self.id, champions);
    }
}
