//! Core orchestration for the volume bot
//!
//! This module coordinates the trading run:
//! - Wallet pool loading and group partitioning
//! - The trade-cycle scheduler (one buy-then-sell round across all groups)
//! - The session controller (run/stop lifecycle, round pacing, status
//!   events, aggregate statistics)

mod scheduler;
mod session;
mod stats;
mod status;
mod wallet;

pub use scheduler::{RoundReport, RoundRunner, SchedulerConfig, TradeCycleScheduler};
pub use session::{SessionConfig, VolumeSession};
pub use stats::SessionStats;
pub use status::{SessionState, StatusEvent};
pub use wallet::{partition_into_groups, FileWalletStore, TradeWallet, WalletStore};

/// Result type for the core module
pub type CoreResult<T> = std::result::Result<T, CoreError>;

/// Error types for the core module
#[derive(thiserror::Error, Debug)]
pub enum CoreError {
    #[error("Session already running")]
    AlreadyRunning,

    #[error("No wallets available")]
    NoWallets,

    #[error("Wallet store error: {0}")]
    WalletStore(String),

    #[error("Round error: {0}")]
    Round(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
