use std::{path::Path, path::PathBuf, time::Duration};

use alloy_primitives::Address;
use color_eyre::eyre::{Result, WrapErr};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::domain::amount::Amount;

/// Chain id (and network id) of the Berachain Bepolia testnet.
pub const BEPOLIA_CHAIN_ID: u64 = 80069;

/// Get the data directory for the application.
pub fn get_data_dir() -> PathBuf {
    if let Ok(s) = std::env::var("BERA_WALLET_DATA") {
        PathBuf::from(s)
    } else if let Some(proj_dirs) = ProjectDirs::from("com", "bera", "bera-wallet") {
        proj_dirs.data_local_dir().to_path_buf()
    } else {
        PathBuf::from(".").join(".data")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub name: String,
    pub rpc_url: String,
    /// Chain id used for EIP-155 signing.
    pub chain_id: u64,
    /// Network id the endpoint is expected to report. A mismatch is a warning.
    pub expected_network_id: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountConfig {
    /// Address the supplied key must derive, if set.
    pub address: Option<Address>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenConfig {
    pub symbol: String,
    pub address: Address,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    pub native_interval_secs: u64,
    pub token_interval_secs: u64,
}

impl SyncConfig {
    pub fn native_interval(&self) -> Duration {
        Duration::from_secs(self.native_interval_secs)
    }

    pub fn token_interval(&self) -> Duration {
        Duration::from_secs(self.token_interval_secs)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            native_interval_secs: 30,
            token_interval_secs: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitConfig {
    pub receipt_timeout_secs: u64,
    pub receipt_poll_interval_ms: u64,
    /// Extra gas on top of the estimate, in percent.
    pub gas_margin_percent: u64,
}

impl SubmitConfig {
    pub fn receipt_timeout(&self) -> Duration {
        Duration::from_secs(self.receipt_timeout_secs)
    }

    pub fn receipt_poll_interval(&self) -> Duration {
        Duration::from_millis(self.receipt_poll_interval_ms)
    }
}

impl Default for SubmitConfig {
    fn default() -> Self {
        Self {
            receipt_timeout_secs: 30,
            receipt_poll_interval_ms: 1_000,
            gas_margin_percent: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnbondingSeed {
    pub amount: Amount,
    pub due_in_secs: u64,
}

/// Position reported by the first staking fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StakingSeed {
    pub staked_amount: Amount,
    pub rewards: Amount,
    pub apr: Amount,
    pub total_claimed: Amount,
    pub unbonding: Vec<UnbondingSeed>,
}

impl Default for StakingSeed {
    fn default() -> Self {
        let amount = |s: &str| s.parse::<Amount>().unwrap_or_default();
        Self {
            staked_amount: amount("500"),
            rewards: amount("25.5"),
            apr: amount("12.5"),
            total_claimed: amount("150.75"),
            unbonding: vec![UnbondingSeed {
                amount: amount("100"),
                due_in_secs: 10 * 24 * 60 * 60,
            }],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StakingConfig {
    pub cooldown_secs: u64,
    /// Simulated confirmation wait for stake/unbond/claim.
    pub processing_latency_ms: u64,
    pub initial: StakingSeed,
}

impl StakingConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    pub fn processing_latency(&self) -> Duration {
        Duration::from_millis(self.processing_latency_ms)
    }
}

impl Default for StakingConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: 14 * 24 * 60 * 60,
            processing_latency_ms: 2_000,
            initial: StakingSeed::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub network: NetworkConfig,
    #[serde(default)]
    pub account: AccountConfig,
    #[serde(default)]
    pub tokens: Vec<TokenConfig>,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub submit: SubmitConfig,
    #[serde(default)]
    pub staking: StakingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self::bepolia()
    }
}

impl Config {
    /// Create config from CLI args.
    pub fn new(network: &str, rpc_url: Option<&str>) -> Self {
        Self::from_network(network).with_rpc_url(rpc_url)
    }

    /// Replace the endpoint when one was given on the command line.
    pub fn with_rpc_url(mut self, rpc_url: Option<&str>) -> Self {
        if let Some(url) = rpc_url {
            self.network.rpc_url = url.to_string();
        }
        self
    }

    /// Load a JSON config file.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read config {}", path.display()))?;
        let config = serde_json::from_str(&data)
            .wrap_err_with(|| format!("Invalid config {}", path.display()))?;
        Ok(config)
    }

    pub fn bepolia() -> Self {
        Self {
            network: NetworkConfig {
                name: "bepolia".to_string(),
                rpc_url: "https://bepolia.rpc.berachain.com/".to_string(),
                chain_id: BEPOLIA_CHAIN_ID,
                expected_network_id: BEPOLIA_CHAIN_ID,
            },
            account: AccountConfig::default(),
            tokens: default_tokens(),
            sync: SyncConfig::default(),
            submit: SubmitConfig::default(),
            staking: StakingConfig::default(),
        }
    }

    pub fn devnet() -> Self {
        Self {
            network: NetworkConfig {
                name: "devnet".to_string(),
                rpc_url: "http://127.0.0.1:8545".to_string(),
                chain_id: BEPOLIA_CHAIN_ID,
                expected_network_id: BEPOLIA_CHAIN_ID,
            },
            account: AccountConfig::default(),
            tokens: Vec::new(),
            sync: SyncConfig::default(),
            submit: SubmitConfig::default(),
            staking: StakingConfig::default(),
        }
    }

    pub fn from_network(network: &str) -> Self {
        match network {
            "devnet" => Self::devnet(),
            _ => Self::bepolia(),
        }
    }
}

fn default_tokens() -> Vec<TokenConfig> {
    [
        ("wBERA", "0x5806E416dA447b267cEA759358cF22Cc41FAE80F"),
        ("HONEY", "0x4E9e46969Dc7Fc7dD48c36ff601ff79EA4650bF7"),
    ]
    .into_iter()
    .filter_map(|(symbol, address)| {
        address.parse().ok().map(|address| TokenConfig {
            symbol: symbol.to_string(),
            address,
        })
    })
    .collect()
}
