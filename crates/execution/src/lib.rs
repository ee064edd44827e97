//! Swap execution for the volume bot
//!
//! This module turns a trade decision into a confirmed ledger transaction:
//! - [`SwapProvider`] is the boundary to the external quote/build services
//!   (a DEX aggregator and a bonding-curve trade API)
//! - [`SwapExecutor`] drives one pass end to end: quote, build, sign,
//!   submit, and hand the signature to the confirmation manager
//! - [`TradeExecutor`] is the seam the trade-cycle scheduler fans out over

use async_trait::async_trait;
use solana_sdk::{pubkey::Pubkey, signature::Keypair};

use volume_bot_rpc::RpcError;

mod bonding_curve;
mod config;
mod executor;
mod jupiter;
mod provider;

pub use bonding_curve::BondingCurveClient;
pub use config::SwapConfig;
pub use executor::SwapExecutor;
pub use jupiter::JupiterClient;
pub use provider::{BuiltSwap, QuoteArtifact, SwapDirection, SwapProvider, SwapRequest, WSOL_MINT};

/// Result type for the execution module
pub type ExecutionResult<T> = std::result::Result<T, ExecutionError>;

/// Error types for the execution module
#[derive(thiserror::Error, Debug)]
pub enum ExecutionError {
    #[error("Quote failed: {0}")]
    QuoteFailed(String),

    #[error("Swap build failed: {0}")]
    BuildFailed(String),

    #[error("Invalid transaction artifact: {0}")]
    InvalidTransaction(String),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Confirmation error: {0}")]
    Confirmation(#[from] RpcError),

    #[error("Insufficient token balance")]
    InsufficientBalance,
}

/// One buy or sell pass for one wallet, executed to a definitive outcome.
///
/// The production implementation is [`SwapExecutor`]; the scheduler only
/// sees this trait so round logic can be tested without a network.
#[async_trait]
pub trait TradeExecutor: Send + Sync {
    /// Execute a single pass: build, sign, submit, confirm. Any error is
    /// terminal for this pass only.
    async fn execute_pass(
        &self,
        wallet: &Keypair,
        direction: SwapDirection,
        mint: Pubkey,
    ) -> ExecutionResult<()>;

    /// Balance of `mint` held by `owner`, used for the sell pre-check
    async fn token_balance(&self, owner: &Pubkey, mint: &Pubkey) -> ExecutionResult<u64>;
}
