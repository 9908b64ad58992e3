//! Server configuration: defaults, optional JSON file, CLI overrides.

use serde::{Deserialize, Serialize};
use shared::{
    BLOCK_GENERATION_PERIOD_MS, INITIAL_NUM_BLOCKS, LOCK_ACK_TIMEOUT_MS, MAX_BLOCKS_GENERATED,
    MAX_PLAYERS_PER_GAME, SERVER_UPDATE_PERIOD_MS, SOLUTION_HOLD_TIME_MS, TIMER_PERIOD_MS,
};
use std::path::Path;
use std::time::Duration;

/// Everything the server binary can tune. The physics period is not here:
/// clients replay inputs with the same fixed step, so it is a shared constant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub timer_period_ms: u64,
    pub broadcast_period_ms: u64,
    pub block_generation_period_ms: u64,
    pub client_timeout_ms: u64,
    pub session: SessionSettings,
}

/// Per-session rules.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub max_players: usize,
    pub initial_blocks: usize,
    pub max_blocks: usize,
    pub solution_hold_time_ms: u64,
    pub lock_ack_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            timer_period_ms: TIMER_PERIOD_MS,
            broadcast_period_ms: SERVER_UPDATE_PERIOD_MS,
            block_generation_period_ms: BLOCK_GENERATION_PERIOD_MS,
            client_timeout_ms: 10_000,
            session: SessionSettings::default(),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            max_players: MAX_PLAYERS_PER_GAME,
            initial_blocks: INITIAL_NUM_BLOCKS,
            max_blocks: MAX_BLOCKS_GENERATED,
            solution_hold_time_ms: SOLUTION_HOLD_TIME_MS,
            lock_ack_timeout_ms: LOCK_ACK_TIMEOUT_MS,
        }
    }
}

impl ServerConfig {
    /// Loads a JSON config file. Missing fields keep their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn timer_period(&self) -> Duration {
        Duration::from_millis(self.timer_period_ms.max(1))
    }

    pub fn broadcast_period(&self) -> Duration {
        Duration::from_millis(self.broadcast_period_ms.max(1))
    }

    pub fn block_generation_period(&self) -> Duration {
        Duration::from_millis(self.block_generation_period_ms.max(1))
    }

    pub fn client_timeout(&self) -> Duration {
        Duration::from_millis(self.client_timeout_ms)
    }
}
