//! Trade sizing and fee configuration

use serde::{Deserialize, Serialize};

/// Externally supplied trade parameters, uniform across providers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapConfig {
    /// Lamports spent per buy pass
    #[serde(default = "default_buy_amount_lamports")]
    pub buy_amount_lamports: u64,

    /// Allowed slippage in basis points
    #[serde(default = "default_slippage_bps")]
    pub slippage_bps: u16,

    /// Priority fee in lamports attached to each swap
    #[serde(default = "default_priority_fee_lamports")]
    pub priority_fee_lamports: u64,
}

fn default_buy_amount_lamports() -> u64 {
    10_000_000 // 0.01 SOL
}

fn default_slippage_bps() -> u16 {
    250
}

fn default_priority_fee_lamports() -> u64 {
    100_000
}

impl Default for SwapConfig {
    fn default() -> Self {
        Self {
            buy_amount_lamports: default_buy_amount_lamports(),
            slippage_bps: default_slippage_bps(),
            priority_fee_lamports: default_priority_fee_lamports(),
        }
    }
}
