use std::{path::Path, sync::Arc, time::Duration};

use alloy_primitives::U256;
use bera_wallet::{
    app::Session,
    config::Config,
    domain::{account::Account, amount::ten_pow, staking::StakingPosition},
    infra::{gateway::ChainGateway, memory::InMemoryChain, rpc::JsonRpcGateway},
};
use color_eyre::eyre::{eyre, Result, WrapErr};
use tracing::{info, warn};
use zeroize::Zeroizing;

use crate::cli::{Args, Command};

/// Balance given to the account on the offline chain, in whole BERA.
const OFFLINE_FUNDING: u64 = 100;

pub async fn run(args: &Args) -> Result<()> {
    let config = match &args.config {
        Some(path) => Config::load(path)?.with_rpc_url(args.rpc_url.as_deref()),
        None => Config::new(&args.network, args.rpc_url.as_deref()),
    };
    let account = load_account(args.key_file.as_deref(), &config)?;

    let gateway: Arc<dyn ChainGateway> = if args.offline {
        info!("Using in-memory chain");
        Arc::new(offline_chain(&config, &account))
    } else {
        let rpc = JsonRpcGateway::new(&config.network.rpc_url)?;
        info!("Using RPC endpoint {}", rpc.rpc_url());
        Arc::new(rpc)
    };
    let mut session = Session::new(config, account, gateway);

    match &args.command {
        Command::Balance => {
            let (native, tokens) = session.refresh_balances().await;
            native.wrap_err("Failed to read native balance")?;
            if let Err(e) = tokens {
                warn!("{}", e);
            }
            print_balances(&session);
        }
        Command::Send { to, amount } => {
            let record = session.send(to, amount).await?;
            println!(
                "Sent {} BERA to {} ({})",
                record.amount,
                record.counterparty,
                record.hash.map(|h| h.to_string()).unwrap_or_default()
            );
        }
        Command::Watch { seconds } => {
            watch(&mut session, seconds.map(Duration::from_secs)).await?;
        }
        Command::Staking => {
            print_position(&session.staking().fetch());
        }
        Command::Stake { amount } => {
            session.staking().fetch();
            print_position(&session.staking().stake(amount).await?);
        }
        Command::Unbond { amount } => {
            session.staking().fetch();
            print_position(&session.staking().unbond(amount).await?);
        }
        Command::Claim => {
            session.staking().fetch();
            print_position(&session.staking().claim_rewards().await?);
        }
        Command::Network => {
            let status = session.check_network().await?;
            let verdict = if status.matches() { "ok" } else { "MISMATCH" };
            println!(
                "network id {} (expected {}): {}",
                status.reported, status.expected, verdict
            );
        }
        Command::RevealKey => {
            warn!("Signing key revealed on request");
            println!("{}", session.account().reveal_signing_key().as_str());
        }
    }
    Ok(())
}

/// Read the signing key from `key_file` or `$BERA_WALLET_KEY`.
fn load_account(key_file: Option<&Path>, config: &Config) -> Result<Account> {
    let key = match key_file {
        Some(path) => Zeroizing::new(
            std::fs::read_to_string(path)
                .wrap_err_with(|| format!("Failed to read key file {}", path.display()))?,
        ),
        None => Zeroizing::new(
            std::env::var("BERA_WALLET_KEY")
                .map_err(|_| eyre!("No signing key: pass --key-file or set BERA_WALLET_KEY"))?,
        ),
    };
    let account = Account::from_hex_key(&key)?;
    match config.account.address {
        Some(expected) => Ok(account.expect_address(expected)?),
        None => Ok(account),
    }
}

fn offline_chain(config: &Config, account: &Account) -> InMemoryChain {
    let chain = InMemoryChain::new(config.network.chain_id);
    chain.set_network_id(config.network.expected_network_id);
    let unit = ten_pow(18).unwrap_or(U256::from(1u64));
    chain.set_balance(account.address(), U256::from(OFFLINE_FUNDING) * unit);
    for token in &config.tokens {
        chain.deploy_token(token.address, 18, account.address(), U256::from(1_000u64) * unit);
    }
    chain
}

async fn watch(session: &mut Session, limit: Option<Duration>) -> Result<()> {
    session.start_sync();
    let period = session.config().sync.token_interval();
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    let deadline = async {
        match limit {
            Some(limit) => tokio::time::sleep(limit).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = ticker.tick() => print_balances(session),
            _ = &mut deadline => break,
            res = tokio::signal::ctrl_c() => {
                res?;
                break;
            }
        }
    }
    session.stop_sync();
    Ok(())
}

fn print_balances(session: &Session) {
    println!("{}", session.address());
    for line in session.balances() {
        println!(
            "  {:<8} {:>24}  (as of {})",
            line.symbol,
            line.value,
            line.refreshed_at.format("%H:%M:%S")
        );
    }
}

fn print_position(position: &StakingPosition) {
    println!("Staked:        {} BERA", position.staked_amount);
    println!("Rewards:       {} BERA", position.rewards);
    println!("APR:           {}%", position.apr);
    println!("Total claimed: {} BERA", position.total_claimed);
    for entry in &position.unbonding {
        println!(
            "Unbonding:     {} BERA until {}",
            entry.amount,
            entry.completion_time.format("%Y-%m-%d %H:%M UTC")
        );
    }
}
