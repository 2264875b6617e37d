//! Integration test module for bera-wallet.
//!
//! Provides a test environment that manages:
//! - An in-memory chain with a funded account and two tokens
//! - A session wired to that chain
//! - Helpers for whole-unit amounts

pub mod e2e_send_flow;
pub mod e2e_staking;
pub mod e2e_sync;

use std::sync::Arc;

use alloy_primitives::{Address, U256};
use bera_wallet::{
    app::Session,
    config::{Config, TokenConfig},
    domain::{account::Account, amount::ten_pow},
    infra::memory::InMemoryChain,
};

/// Anvil's first development key.
pub const OWNER_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

/// Anvil's second development address.
pub const RECIPIENT: &str = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8";

/// Test environment for integration tests.
pub struct TestEnv {
    pub chain: InMemoryChain,
    pub session: Session,
    pub honey: Address,
    pub wbera: Address,
}

impl TestEnv {
    /// Fresh chain and session. The owner holds `native` BERA, 1000 HONEY
    /// (18 decimals) and 42.5 wBERA (6 decimals).
    pub fn new(native: u64) -> Self {
        let honey = Address::repeat_byte(0x48);
        let wbera = Address::repeat_byte(0x57);

        let mut config = Config::devnet();
        config.tokens = vec![
            TokenConfig {
                symbol: "HONEY".into(),
                address: honey,
            },
            TokenConfig {
                symbol: "wBERA".into(),
                address: wbera,
            },
        ];

        let account = Account::from_hex_key(OWNER_KEY).expect("valid test key");
        let chain = InMemoryChain::new(config.network.chain_id);
        chain.set_balance(account.address(), units(native, 18));
        chain.deploy_token(honey, 18, account.address(), units(1_000, 18));
        chain.deploy_token(wbera, 6, account.address(), U256::from(42_500_000u64));

        let session = Session::new(config, account, Arc::new(chain.clone()));
        Self {
            chain,
            session,
            honey,
            wbera,
        }
    }

    pub fn owner(&self) -> Address {
        self.session.address()
    }

    pub fn recipient(&self) -> Address {
        RECIPIENT.parse().expect("valid recipient")
    }
}

/// `n` whole units at `decimals`.
pub fn units(n: u64, decimals: u8) -> U256 {
    U256::from(n) * ten_pow(decimals).expect("decimals in range")
}
