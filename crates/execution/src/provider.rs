//! Swap provider boundary
//!
//! A provider answers two questions: what would this trade get me (quote),
//! and what transaction executes it (build). The bot treats the answers as
//! opaque; pricing strategy is entirely the provider's concern.

use async_trait::async_trait;
use solana_sdk::pubkey::Pubkey;

use crate::ExecutionResult;

/// Wrapped-SOL mint, the quote-side asset of every volume trade
pub const WSOL_MINT: Pubkey =
    solana_sdk::pubkey!("So11111111111111111111111111111111111111112");

/// Trade direction for one pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapDirection {
    /// SOL in, token out
    Buy,

    /// Token in, SOL out
    Sell,
}

impl SwapDirection {
    /// Input mint for this direction against `mint`
    pub fn input_mint(&self, mint: &Pubkey) -> Pubkey {
        match self {
            SwapDirection::Buy => WSOL_MINT,
            SwapDirection::Sell => *mint,
        }
    }

    /// Output mint for this direction against `mint`
    pub fn output_mint(&self, mint: &Pubkey) -> Pubkey {
        match self {
            SwapDirection::Buy => *mint,
            SwapDirection::Sell => WSOL_MINT,
        }
    }
}

impl std::fmt::Display for SwapDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SwapDirection::Buy => write!(f, "buy"),
            SwapDirection::Sell => write!(f, "sell"),
        }
    }
}

/// Parameters of one swap pass
#[derive(Debug, Clone)]
pub struct SwapRequest {
    /// Trading wallet's public key
    pub wallet: Pubkey,

    /// Target token mint
    pub mint: Pubkey,

    /// Buy or sell
    pub direction: SwapDirection,

    /// Lamports for buys, token base units for sells
    pub amount: u64,

    /// Allowed slippage in basis points
    pub slippage_bps: u16,

    /// Priority fee in lamports
    pub priority_fee_lamports: u64,
}

/// Provider-specific quote, passed back verbatim to the build step
#[derive(Debug, Clone)]
pub struct QuoteArtifact {
    /// The request the quote answers
    pub request: SwapRequest,

    /// Opaque provider payload. Bonding-curve trades price server-side at
    /// build time, so their payload is null.
    pub payload: serde_json::Value,
}

/// A ready-to-sign transaction produced by a provider
#[derive(Debug, Clone)]
pub struct BuiltSwap {
    /// Serialized versioned transaction, fee payer signature slot unsigned
    pub transaction: Vec<u8>,

    /// Height after which the ledger will refuse the transaction, if the
    /// provider reports one
    pub last_valid_block_height: Option<u64>,
}

/// External quote/build service. Any non-success response is a hard failure
/// for the pass that requested it.
#[async_trait]
pub trait SwapProvider: Send + Sync {
    /// Short provider name for logs
    fn name(&self) -> &'static str;

    /// Price the requested trade
    async fn get_quote(&self, request: &SwapRequest) -> ExecutionResult<QuoteArtifact>;

    /// Build a ready-to-sign transaction for a quoted trade
    async fn build_swap(&self, quote: &QuoteArtifact) -> ExecutionResult<BuiltSwap>;
}
