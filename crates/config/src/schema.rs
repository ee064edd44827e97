//! Configuration schema
//!
//! Top-level `BotConfig` aggregates the per-subsystem config structs so
//! one file (or environment) configures the whole bot.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;

use volume_bot_core::{SchedulerConfig, SessionConfig};
use volume_bot_execution::SwapConfig;
use volume_bot_rpc::{ConfirmationConfig, RpcConfig};

use crate::error::{ConfigError, ConfigResult};

/// Which swap provider builds the transactions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Jupiter,
    BondingCurve,
}

impl Default for ProviderKind {
    fn default() -> Self {
        ProviderKind::Jupiter
    }
}

/// Trade sizing, target token and provider endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeSettings {
    /// Target token mint, base58
    #[serde(default)]
    pub mint: String,

    #[serde(default)]
    pub provider: ProviderKind,

    #[serde(default = "default_jupiter_url")]
    pub jupiter_url: String,

    #[serde(default = "default_bonding_curve_url")]
    pub bonding_curve_url: String,

    #[serde(flatten)]
    pub swap: SwapConfig,
}

fn default_jupiter_url() -> String {
    "https://quote-api.jup.ag/v6".to_string()
}

fn default_bonding_curve_url() -> String {
    "https://pumpportal.fun".to_string()
}

impl Default for TradeSettings {
    fn default() -> Self {
        Self {
            mint: String::new(),
            provider: ProviderKind::default(),
            jupiter_url: default_jupiter_url(),
            bonding_curve_url: default_bonding_curve_url(),
            swap: SwapConfig::default(),
        }
    }
}

impl TradeSettings {
    pub fn mint_pubkey(&self) -> ConfigResult<Pubkey> {
        Pubkey::from_str(&self.mint)
            .map_err(|e| ConfigError::ValidationError(format!("invalid mint address: {}", e)))
    }
}

/// Session duration plus the pacing knobs of the round loop
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Wall-clock run length in seconds
    #[serde(default = "default_duration_secs")]
    pub duration_secs: u64,

    #[serde(flatten)]
    pub pacing: SessionConfig,

    #[serde(flatten)]
    pub round: SchedulerConfig,
}

fn default_duration_secs() -> u64 {
    3_600
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            duration_secs: default_duration_secs(),
            pacing: SessionConfig::default(),
            round: SchedulerConfig::default(),
        }
    }
}

/// Where the trading wallets come from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletSettings {
    /// JSON file holding an array of base58-encoded secret keys
    #[serde(default = "default_wallet_path")]
    pub path: String,
}

fn default_wallet_path() -> String {
    "wallets.json".to_string()
}

impl Default for WalletSettings {
    fn default() -> Self {
        Self {
            path: default_wallet_path(),
        }
    }
}

/// Log output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Filter directive, e.g. "info" or "volume_bot=debug"
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of the human format
    #[serde(default)]
    pub json: bool,

    /// Directory for daily-rolled log files; stderr only when unset
    #[serde(default)]
    pub file_dir: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            file_dir: None,
        }
    }
}

/// Complete bot configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BotConfig {
    #[serde(default)]
    pub rpc: RpcConfig,

    #[serde(default)]
    pub confirmation: ConfirmationConfig,

    #[serde(default)]
    pub trade: TradeSettings,

    #[serde(default)]
    pub session: SessionSettings,

    #[serde(default)]
    pub wallets: WalletSettings,

    #[serde(default)]
    pub logging: LoggingSettings,
}

impl BotConfig {
    /// Reject a configuration the bot could not trade with
    pub fn validate(&self) -> ConfigResult<()> {
        if self.rpc.http_url.is_empty() {
            return Err(ConfigError::ValidationError(
                "rpc.http_url cannot be empty".to_string(),
            ));
        }
        if self.rpc.ws_url.is_empty() {
            return Err(ConfigError::ValidationError(
                "rpc.ws_url cannot be empty".to_string(),
            ));
        }
        self.rpc
            .commitment_config()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;

        self.trade.mint_pubkey()?;
        if self.trade.swap.buy_amount_lamports == 0 {
            return Err(ConfigError::ValidationError(
                "trade.buy_amount_lamports must be positive".to_string(),
            ));
        }
        if self.trade.swap.slippage_bps > 10_000 {
            return Err(ConfigError::ValidationError(
                "trade.slippage_bps cannot exceed 10000".to_string(),
            ));
        }

        if self.session.pacing.min_round_delay_ms > self.session.pacing.max_round_delay_ms {
            return Err(ConfigError::ValidationError(
                "session.min_round_delay_ms cannot exceed session.max_round_delay_ms".to_string(),
            ));
        }
        if self.session.pacing.group_size == 0 {
            return Err(ConfigError::ValidationError(
                "session.group_size must be positive".to_string(),
            ));
        }

        if self.wallets.path.is_empty() {
            return Err(ConfigError::ValidationError(
                "wallets.path cannot be empty".to_string(),
            ));
        }

        if self.confirmation.timeout_ms == 0 || self.confirmation.poll_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "confirmation timings must be positive".to_string(),
            ));
        }

        Ok(())
    }
}
