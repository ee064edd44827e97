//! Command line interface for the volume bot
//!
//! Wires the configured pieces together: RPC ledger, confirmation
//! manager, swap provider, trade executor, scheduler and session. The
//! `start` command runs a session until its duration elapses or Ctrl+C
//! requests a stop.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use volume_bot_config::{write_template, BotConfig, ConfigLoader, ProviderKind};
use volume_bot_core::{
    FileWalletStore, RoundRunner, SessionState, TradeCycleScheduler, VolumeSession, WalletStore,
};
use volume_bot_execution::{
    BondingCurveClient, JupiterClient, SwapExecutor, SwapProvider, TradeExecutor,
};
use volume_bot_logging::LoggingOptions;
use volume_bot_rpc::{ConfirmationManager, LedgerRpc, SolanaLedger};

mod utils;

use utils::{create_spinner, print_error, print_info, print_success};

#[derive(Parser, Debug)]
#[clap(name = "volume-bot", version, about = "Token volume trading bot", long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[clap(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the configured log filter
    #[clap(short, long, value_name = "LEVEL")]
    log_level: Option<String>,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a volume session until its duration elapses or Ctrl+C
    Start,

    /// Print the wallet pool without touching the network
    Wallets,

    /// Write a configuration file with every default filled in
    GenerateConfig {
        /// Output file
        #[clap(short, long, value_name = "FILE", default_value = "config.json")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::GenerateConfig { output } = &cli.command {
        write_template(output).context("failed to write configuration template")?;
        print_success(&format!("Configuration template written: {:?}", output));
        return Ok(());
    }

    let config = ConfigLoader::new()
        .with_cli_config_path(cli.config.as_ref())
        .load()
        .context("failed to load configuration")?;

    let logging_options = LoggingOptions {
        level: cli
            .log_level
            .clone()
            .unwrap_or_else(|| config.logging.level.clone()),
        json: config.logging.json,
        file_dir: config.logging.file_dir.clone(),
    };
    let _log_guard =
        volume_bot_logging::init(&logging_options).context("failed to initialize logging")?;

    match cli.command {
        Commands::Start => run_session(config).await,
        Commands::Wallets => list_wallets(&config),
        Commands::GenerateConfig { .. } => unreachable!("handled before logging init"),
    }
}

/// Build the full stack from the config and run one session
async fn run_session(config: BotConfig) -> Result<()> {
    let spinner = create_spinner("Starting volume session...");

    let mint = config.trade.mint_pubkey()?;
    let duration = Duration::from_secs(config.session.duration_secs);

    let ledger: Arc<dyn LedgerRpc> = Arc::new(SolanaLedger::new(&config.rpc)?);
    let confirmations = Arc::new(ConfirmationManager::new(
        Arc::clone(&ledger),
        config.confirmation.clone(),
    ));

    let provider: Arc<dyn SwapProvider> = match config.trade.provider {
        ProviderKind::Jupiter => Arc::new(JupiterClient::new(&config.trade.jupiter_url)),
        ProviderKind::BondingCurve => {
            Arc::new(BondingCurveClient::new(&config.trade.bonding_curve_url))
        }
    };
    info!(provider = provider.name(), mint = %mint, "swap provider selected");

    let executor: Arc<dyn TradeExecutor> = Arc::new(SwapExecutor::new(
        provider,
        Arc::clone(&ledger),
        Arc::clone(&confirmations),
        config.trade.swap.clone(),
    ));
    let runner: Arc<dyn RoundRunner> = Arc::new(TradeCycleScheduler::new(
        executor,
        config.session.round.clone(),
    ));

    let wallets = FileWalletStore::new(&config.wallets.path)
        .load()
        .context("failed to load wallet pool")?;
    let wallet_count = wallets.len();

    let session = Arc::new(VolumeSession::new(
        runner,
        confirmations,
        wallets,
        config.session.pacing.clone(),
    ));

    let mut status_rx = session.subscribe_status();
    let status_printer = tokio::spawn(async move {
        while let Ok(event) = status_rx.recv().await {
            print_info(&format!(
                "round {} | success {} | {}s remaining",
                event.rounds, event.success_rate, event.remaining_seconds
            ));
            if !event.is_running() {
                break;
            }
        }
    });

    {
        let session = Arc::clone(&session);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                print_info("stop requested, finishing the current round");
                session.stop();
            }
        });
    }

    spinner.finish_with_message(format!(
        "Session started: {} wallets in groups of {} for {}s",
        wallet_count, config.session.pacing.group_size, config.session.duration_secs
    ));

    let stats = session.start(mint, duration).await?;
    status_printer.await.ok();

    match session.state() {
        SessionState::Completed => print_success(&format!(
            "Session completed: {} rounds, success rate {}",
            stats.rounds,
            stats.success_rate()
        )),
        SessionState::Stopped => print_success(&format!(
            "Session stopped: {} rounds, success rate {}",
            stats.rounds,
            stats.success_rate()
        )),
        other => print_error(&format!("Session ended in unexpected state {:?}", other)),
    }
    if stats.skipped_sells > 0 {
        print_info(&format!("{} sells skipped on empty balances", stats.skipped_sells));
    }

    Ok(())
}

/// List the wallet pool's public keys
fn list_wallets(config: &BotConfig) -> Result<()> {
    let wallets = FileWalletStore::new(&config.wallets.path)
        .load()
        .context("failed to load wallet pool")?;

    println!("{} wallets in {}", wallets.len(), config.wallets.path);
    for wallet in &wallets {
        println!("  {}", wallet);
    }
    Ok(())
}
