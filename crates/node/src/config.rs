//! Node configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tally_common::utils::codec::parse_amount;
use tally_common::utils::logging::LoggingConfig;
use tally_common::Address;
use tally_core::LedgerParams;
use tracing::warn;

use crate::error::{NodeError, NodeResult};

/// Hosting node configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// HTTP listen address
    pub server_addr: String,

    /// Reserved identity of the ledger itself
    pub ledger_address: Address,

    /// Initial owner. Required when no snapshot exists.
    pub owner: Option<Address>,

    /// Amount minted per faucet draw (decimal)
    pub faucet_amount: String,

    /// Minimum seconds between faucet draws of one account
    pub faucet_cooldown_secs: u64,

    /// Maximum amount per transfer (decimal)
    pub max_transfer_limit: String,

    /// Where the ledger snapshot is kept across restarts
    pub snapshot_path: Option<PathBuf>,

    /// Seconds between background snapshot writes; 0 writes only on shutdown
    pub snapshot_interval_secs: u64,

    /// Buffered events per subscriber
    pub event_capacity: usize,

    /// Events kept in memory for `/api/events`
    pub event_retention: usize,

    /// Expose /metrics
    pub metrics_enabled: bool,

    /// Enable CORS
    pub cors_enabled: bool,

    pub logging: LoggingConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            server_addr: "0.0.0.0:3000".to_string(),
            ledger_address: Address::from_low_u64(0x7a11),
            owner: None,
            faucet_amount: "1000000000000000000000".to_string(), // 1000 units
            faucet_cooldown_secs: 86400, // 24 hours
            max_transfer_limit: "10000000000000000000000".to_string(), // 10000 units
            snapshot_path: None,
            snapshot_interval_secs: 5,
            event_capacity: 1024,
            event_retention: 100_000,
            metrics_enabled: true,
            cors_enabled: true,
            logging: LoggingConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Load from environment variables with defaults
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Override fields from `TALLY_*` environment variables.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Override fields from `TALLY_*` keys resolved by `lookup`.
    /// Unparsable values are logged and leave the field unchanged.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup("TALLY_SERVER_ADDR") {
            self.server_addr = addr;
        }

        if let Some(owner) = lookup("TALLY_OWNER") {
            match owner.parse::<Address>() {
                Ok(owner) => self.owner = Some(owner),
                Err(e) => warn!("Ignoring TALLY_OWNER: {}", e),
            }
        }

        if let Some(path) = lookup("TALLY_SNAPSHOT_PATH") {
            self.snapshot_path = Some(PathBuf::from(path));
        }

        if let Some(amount) = lookup("TALLY_FAUCET_AMOUNT") {
            self.faucet_amount = amount;
        }

        if let Some(cooldown) = lookup("TALLY_FAUCET_COOLDOWN") {
            match cooldown.trim().parse::<u64>() {
                Ok(secs) => self.faucet_cooldown_secs = secs,
                Err(e) => warn!("Ignoring TALLY_FAUCET_COOLDOWN '{}': {}", cooldown, e),
            }
        }

        if let Some(limit) = lookup("TALLY_MAX_TRANSFER_LIMIT") {
            self.max_transfer_limit = limit;
        }
    }

    pub fn faucet_cooldown(&self) -> Duration {
        Duration::from_secs(self.faucet_cooldown_secs)
    }

    /// Initial ledger parameters, validated against the ledger bounds.
    pub fn ledger_params(&self) -> NodeResult<LedgerParams> {
        let owner = self
            .owner
            .ok_or_else(|| NodeError::Config("owner is not configured".to_string()))?;
        let faucet_amount = parse_amount(&self.faucet_amount)
            .map_err(|e| NodeError::Config(format!("faucet_amount: {}", e)))?;
        let max_transfer_limit = parse_amount(&self.max_transfer_limit)
            .map_err(|e| NodeError::Config(format!("max_transfer_limit: {}", e)))?;

        let params = LedgerParams {
            owner,
            faucet_amount,
            faucet_cooldown: self.faucet_cooldown(),
            max_transfer_limit,
        };
        params.validate()?;
        Ok(params)
    }

    /// TOML rendering, used to print a starter config file.
    pub fn to_toml(&self) -> NodeResult<String> {
        toml::to_string_pretty(self).map_err(|e| NodeError::Config(e.to_string()))
    }
}
