use crate::{
    clock::{
        DeadlineWindow,
        MAX_MULTIPLIER,
    },
    fuel_ledger::LocalFunding,
    units::payout_nanos,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    fs,
    path::PathBuf,
    time::Duration,
};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Game parameters. Amounts are in minor units, durations in milliseconds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub min_wager: u64,
    pub tick_ms: u64,
    pub cooldown_ms: u64,
    pub deadline_window: DeadlineWindow,
    pub airdrop_amount: u64,
    pub ledger_timeout_ms: u64,
    /// Starting balance of the in-memory ledger used by `--demo`.
    pub demo_balance: u64,
    /// Player chips on the `--local` Fuel node.
    pub local_player_funds: u64,
    /// House chips on the `--local` node. When unset the house gets enough
    /// for the airdrop plus a max cash-out of everything the player can hold.
    pub local_house_funds: Option<u64>,
    pub deadline_seed: Option<u64>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            min_wager: 100_000_000,
            tick_ms: 50,
            cooldown_ms: 4_000,
            deadline_window: DeadlineWindow::default(),
            airdrop_amount: 100_000_000_000,
            ledger_timeout_ms: 30_000,
            demo_balance: 10_000_000_000,
            local_player_funds: 10_000_000_000,
            local_house_funds: None,
            deadline_seed: None,
        }
    }
}

impl GameConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn ledger_timeout(&self) -> Duration {
        Duration::from_millis(self.ledger_timeout_ms)
    }

    pub fn local_funding(&self) -> LocalFunding {
        let house = self.local_house_funds.unwrap_or_else(|| {
            let reachable = self.local_player_funds.saturating_add(self.airdrop_amount);
            self.airdrop_amount
                .saturating_add(payout_nanos(reachable, MAX_MULTIPLIER))
        });
        LocalFunding {
            player: self.local_player_funds,
            house,
        }
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: GameConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a JSON config file; `~` is expanded.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let path = PathBuf::from(shellexpand::tilde(path).into_owned());
        let raw = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        Self::from_json(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_wager == 0 {
            return Err(ConfigError::Invalid("min_wager must be positive".to_string()));
        }
        if self.tick_ms == 0 {
            return Err(ConfigError::Invalid("tick_ms must be positive".to_string()));
        }
        let window = self.deadline_window;
        if window.min_ms == 0 || window.min_ms > window.max_ms {
            return Err(ConfigError::Invalid(format!(
                "deadline window {}..{} ms is empty",
                window.min_ms, window.max_ms
            )));
        }
        Ok(())
    }
}
