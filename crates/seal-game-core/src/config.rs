//! Per-room configuration.

use serde::{Deserialize, Serialize};

use crate::error::GameError;
use crate::game::{MAX_PLAYERS, MIN_PLAYERS};

/// Settings fixed when a room is created
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomConfig {
    pub max_players: usize,
    /// Overrides the table-derived token target
    pub tokens_to_win: Option<u32>,
    /// Bookkeeping stake each player adds to the pot on joining
    pub entry_fee: u64,
    /// Inactivity before `claim_timeout` is allowed; 0 disables it
    pub turn_timeout_ms: u64,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            max_players: 4,
            tokens_to_win: None,
            entry_fee: 0,
            turn_timeout_ms: 0,
        }
    }
}

impl RoomConfig {
    pub fn validate(&self) -> Result<(), GameError> {
        if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&self.max_players) {
            return Err(GameError::InvalidConfig(format!(
                "max_players must be within {}..={}",
                MIN_PLAYERS, MAX_PLAYERS
            )));
        }
        if self.tokens_to_win == Some(0) {
            return Err(GameError::InvalidConfig(
                "tokens_to_win must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
