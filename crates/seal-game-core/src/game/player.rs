//! Seat state for one player.

use serde::{Deserialize, Serialize};

use super::card::{CardIndex, CardValue};
use crate::protocol::Address;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub addr: Address,
    /// Card indices held, never values
    pub hand: Vec<CardIndex>,
    /// Values this player has discarded face-up this round
    pub discarded: Vec<CardValue>,
    pub is_alive: bool,
    pub is_immune: bool,
    /// Round tokens won this game
    pub tokens: u32,
    pub has_played_spy: bool,
}

impl Player {
    pub fn new(addr: Address) -> Self {
        Self {
            addr,
            hand: Vec::new(),
            discarded: Vec::new(),
            is_alive: true,
            is_immune: false,
            tokens: 0,
            has_played_spy: false,
        }
    }

    pub fn holds(&self, index: CardIndex) -> bool {
        self.hand.contains(&index)
    }

    /// Take a card out of the hand; false if it was not there
    pub fn remove_from_hand(&mut self, index: CardIndex) -> bool {
        match self.hand.iter().position(|c| *c == index) {
            Some(pos) => {
                self.hand.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Sum of discarded values, the showdown tie-breaker
    pub fn discard_total(&self) -> u32 {
        self.discarded.iter().map(|v| v.as_u8() as u32).sum()
    }

    /// Clear per-round state, keeping tokens
    pub fn reset_for_round(&mut self) {
        self.hand.clear();
        self.discarded.clear();
        self.is_alive = true;
        self.is_immune = false;
        self.has_played_spy = false;
    }

    /// Can another player's effect name this player?
    pub fn is_targetable(&self) -> bool {
        self.is_alive && !self.is_immune
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remove_from_hand() {
        let mut player = Player::new(Address::from_bytes([1; 32]));
        player.hand = vec![4, 9];

        assert!(player.remove_from_hand(4));
        assert!(!player.remove_from_hand(4));
        assert_eq!(player.hand, vec![9]);
    }

    #[test]
    fn test_reset_keeps_tokens() {
        let mut player = Player::new(Address::from_bytes([1; 32]));
        player.tokens = 3;
        player.is_alive = false;
        player.discarded.push(CardValue::Guard);
        player.has_played_spy = true;

        player.reset_for_round();

        assert_eq!(player.tokens, 3);
        assert!(player.is_alive);
        assert!(player.discarded.is_empty());
        assert!(!player.has_played_spy);
    }

    #[test]
    fn test_discard_total() {
        let mut player = Player::new(Address::from_bytes([1; 32]));
        player.discarded = vec![CardValue::Baron, CardValue::King];
        assert_eq!(player.discard_total(), 10);
    }
}
