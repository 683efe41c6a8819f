//! Game Configuration
//!
//! Engine and module knobs, loaded from `PROOFGAME_*` environment variables.
//! Network settings live in `network::server::ServerConfig`, auth in
//! `network::auth::AuthConfig`.

use std::time::Duration;

use thiserror::Error;

use crate::core::identity::Address;
use crate::questions::bank::BankConfig;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "PROOFGAME_";

/// Default time a player may wait in an unfilled lobby.
pub const DEFAULT_LOBBY_WAIT_TIMEOUT: Duration = Duration::from_secs(300);

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A variable is set but cannot be parsed.
    #[error("invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        /// Variable name.
        key: String,
        /// Raw value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },
}

/// Game configuration.
#[derive(Clone, Debug)]
pub struct GameConfig {
    /// Genesis governors. Empty means the binary picks a development governor.
    pub governors: Vec<Address>,
    /// Settings for the deployed question bank.
    pub bank: BankConfig,
    /// Waiting players are evicted after this long.
    pub lobby_wait_timeout: Duration,
    /// Seed for the development verification key.
    pub vk_seed: String,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            governors: Vec::new(),
            bank: BankConfig::default(),
            lobby_wait_timeout: DEFAULT_LOBBY_WAIT_TIMEOUT,
            vk_seed: "proofgame-dev".into(),
        }
    }
}

impl GameConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary variable lookup (keys include the prefix).
    ///
    /// Unset variables keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let get = |name: &str| {
            let key = format!("{}{}", ENV_PREFIX, name);
            lookup(&key).map(|value| (key, value))
        };

        if let Some((key, value)) = get("GOVERNORS") {
            config.governors = value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| s.parse::<Address>().map_err(|e| invalid(&key, &value, e)))
                .collect::<Result<_, _>>()?;
        }

        if let Some((key, value)) = get("LOBBY_SIZE") {
            let size: usize = value.parse().map_err(|e| invalid(&key, &value, e))?;
            if size == 0 {
                return Err(invalid(&key, &value, "lobby size must be at least 1"));
            }
            config.bank.lobby_size = size;
        }

        if let Some((key, value)) = get("BIND_CLAIMANT") {
            config.bank.bind_claimant = parse_bool(&value)
                .ok_or_else(|| invalid(&key, &value, "expected true/false"))?;
        }

        if let Some((key, value)) = get("MAX_FAILED_ATTEMPTS") {
            let max: u32 = value.parse().map_err(|e| invalid(&key, &value, e))?;
            config.bank.max_failed_attempts = (max > 0).then_some(max);
        }

        if let Some((key, value)) = get("LOBBY_WAIT_TIMEOUT_SECS") {
            let secs: u64 = value.parse().map_err(|e| invalid(&key, &value, e))?;
            config.lobby_wait_timeout = Duration::from_secs(secs);
        }

        if let Some((_, value)) = get("VK_SEED") {
            config.vk_seed = value;
        }

        Ok(config)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

pub(crate) fn invalid(key: &str, value: &str, reason: impl ToString) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
