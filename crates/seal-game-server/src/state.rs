//! Application state management.

use chrono::{DateTime, Utc};
use seal_game_core::{Address, GameService, TxContext};
use std::sync::{Arc, Mutex};

use crate::config::ServerConfig;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    service: Arc<GameService>,
    config: Arc<ServerConfig>,
    /// Simulated current time (for timeout testing)
    current_time: Arc<Mutex<Option<DateTime<Utc>>>>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            service: Arc::new(GameService::in_memory()),
            config: Arc::new(config),
            current_time: Arc::new(Mutex::new(None)),
        }
    }

    pub fn service(&self) -> &GameService {
        &self.service
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Get current time (real or simulated)
    pub fn now(&self) -> DateTime<Utc> {
        let simulated = *self
            .current_time
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        simulated.unwrap_or_else(Utc::now)
    }

    /// Advance simulated time by seconds
    pub fn advance_time(&self, seconds: i64) {
        let mut current_time = self
            .current_time
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let now = (*current_time).unwrap_or_else(Utc::now);
        *current_time = Some(now + chrono::Duration::seconds(seconds));
    }

    /// Transaction context for a request from `sender`
    pub fn tx(&self, sender: Address) -> TxContext {
        let ms = self.now().timestamp_millis();
        TxContext::new(sender, u64::try_from(ms).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_time_moves_tx_clock() {
        let state = AppState::new(ServerConfig::default());
        let sender = Address::from_bytes([1; 32]);
        let before = state.tx(sender).timestamp_ms;

        state.advance_time(600);
        let after = state.tx(sender).timestamp_ms;
        assert!(after >= before + 600_000);
    }
}
