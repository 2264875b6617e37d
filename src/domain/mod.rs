pub mod account;
pub mod amount;
pub mod history;
pub mod signer;
pub mod staking;
pub mod token;
pub mod tx;
pub mod tx_builder;
