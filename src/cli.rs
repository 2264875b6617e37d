use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "bera-wallet")]
#[command(version)]
#[command(about = "A single-account Berachain wallet: send BERA, watch balances, stake")]
pub struct Args {
    /// Network to connect to (bepolia, devnet)
    #[arg(short, long, default_value = "bepolia")]
    pub network: String,

    /// Custom RPC URL (overrides network default)
    #[arg(long)]
    pub rpc_url: Option<String>,

    /// JSON config file (replaces the network preset)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Data directory path
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// File holding the hex signing key. Falls back to $BERA_WALLET_KEY.
    #[arg(long)]
    pub key_file: Option<PathBuf>,

    /// Use a local in-memory chain instead of the RPC endpoint
    #[arg(long)]
    pub offline: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Refresh and print native and token balances
    Balance,
    /// Send BERA to an address
    Send { to: String, amount: String },
    /// Keep balances in sync and print them until interrupted
    Watch {
        /// Stop after this many seconds
        #[arg(long)]
        seconds: Option<u64>,
    },
    /// Show the staking position
    Staking,
    /// Stake BERA
    Stake { amount: String },
    /// Start unbonding staked BERA
    Unbond { amount: String },
    /// Claim staking rewards
    Claim,
    /// Print the signing key
    RevealKey,
    /// Check the endpoint's network id
    Network,
}

impl Args {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
