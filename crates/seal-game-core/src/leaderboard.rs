//! Leaderboard collaborator.
//!
//! The room reports round and game results through [`Leaderboard`] and
//! otherwise treats it as opaque.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::protocol::Address;

/// Sink for game results
pub trait Leaderboard {
    fn record_round_win(&mut self, player: &Address);

    fn record_game_played(&mut self, player: &Address);

    fn record_game_win(&mut self, player: &Address, winnings: u64);
}

/// One recorded result
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LeaderboardEvent {
    RoundWin(Address),
    GamePlayed(Address),
    GameWin { player: Address, winnings: u64 },
}

/// Buffer of results, replayed into a real leaderboard once a transition commits
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LeaderboardEvents(Vec<LeaderboardEvent>);

impl LeaderboardEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Replay every buffered event into `target`
    pub fn apply_to(self, target: &mut dyn Leaderboard) {
        for event in self.0 {
            match event {
                LeaderboardEvent::RoundWin(player) => target.record_round_win(&player),
                LeaderboardEvent::GamePlayed(player) => target.record_game_played(&player),
                LeaderboardEvent::GameWin { player, winnings } => {
                    target.record_game_win(&player, winnings)
                }
            }
        }
    }
}

impl Leaderboard for LeaderboardEvents {
    fn record_round_win(&mut self, player: &Address) {
        self.0.push(LeaderboardEvent::RoundWin(*player));
    }

    fn record_game_played(&mut self, player: &Address) {
        self.0.push(LeaderboardEvent::GamePlayed(*player));
    }

    fn record_game_win(&mut self, player: &Address, winnings: u64) {
        self.0.push(LeaderboardEvent::GameWin {
            player: *player,
            winnings,
        });
    }
}

/// Per-player totals
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerStats {
    pub rounds_won: u32,
    pub games_played: u32,
    pub games_won: u32,
    pub winnings: u64,
}

/// In-memory leaderboard
#[derive(Clone, Debug, Default)]
pub struct MemoryLeaderboard {
    stats: HashMap<Address, PlayerStats>,
}

impl MemoryLeaderboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self, player: &Address) -> Option<&PlayerStats> {
        self.stats.get(player)
    }

    /// Top `n` players by games won, then rounds won
    pub fn top(&self, n: usize) -> Vec<(Address, PlayerStats)> {
        let mut all: Vec<_> = self
            .stats
            .iter()
            .map(|(addr, stats)| (*addr, stats.clone()))
            .collect();
        all.sort_by(|(a_addr, a), (b_addr, b)| {
            b.games_won
                .cmp(&a.games_won)
                .then(b.rounds_won.cmp(&a.rounds_won))
                .then(a_addr.cmp(b_addr))
        });
        all.truncate(n);
        all
    }
}

impl Leaderboard for MemoryLeaderboard {
    fn record_round_win(&mut self, player: &Address) {
        self.stats.entry(*player).or_default().rounds_won += 1;
    }

    fn record_game_played(&mut self, player: &Address) {
        self.stats.entry(*player).or_default().games_played += 1;
    }

    fn record_game_win(&mut self, player: &Address, winnings: u64) {
        let stats = self.stats.entry(*player).or_default();
        stats.games_won += 1;
        stats.winnings = stats.winnings.saturating_add(winnings);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_replay_into_memory_leaderboard() {
        let a = Address::from_bytes([1; 32]);
        let b = Address::from_bytes([2; 32]);

        let mut events = LeaderboardEvents::new();
        events.record_round_win(&a);
        events.record_round_win(&a);
        events.record_game_played(&a);
        events.record_game_played(&b);
        events.record_game_win(&a, 200);

        let mut board = MemoryLeaderboard::new();
        events.apply_to(&mut board);

        let stats = board.stats(&a).unwrap();
        assert_eq!(stats.rounds_won, 2);
        assert_eq!(stats.games_won, 1);
        assert_eq!(stats.winnings, 200);
        assert_eq!(board.stats(&b).unwrap().games_played, 1);
    }

    #[test]
    fn test_top_orders_by_wins() {
        let a = Address::from_bytes([1; 32]);
        let b = Address::from_bytes([2; 32]);
        let mut board = MemoryLeaderboard::new();
        board.record_round_win(&a);
        board.record_game_win(&b, 0);

        let top = board.top(1);
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].0, b);
    }
}
