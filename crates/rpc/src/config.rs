//! Configuration for the ledger RPC boundary

use serde::{Deserialize, Serialize};
use solana_sdk::commitment_config::CommitmentConfig;

use crate::{RpcError, RpcResult};

/// RPC endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    /// HTTP RPC endpoint
    #[serde(default)]
    pub http_url: String,

    /// WebSocket endpoint for signature subscriptions
    #[serde(default)]
    pub ws_url: String,

    /// Commitment level: "processed", "confirmed" or "finalized"
    #[serde(default = "default_commitment")]
    pub commitment: String,
}

fn default_commitment() -> String {
    "confirmed".to_string()
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            http_url: String::new(),
            ws_url: String::new(),
            commitment: default_commitment(),
        }
    }
}

impl RpcConfig {
    /// Parse the configured commitment level
    pub fn commitment_config(&self) -> RpcResult<CommitmentConfig> {
        match self.commitment.as_str() {
            "processed" => Ok(CommitmentConfig::processed()),
            "confirmed" => Ok(CommitmentConfig::confirmed()),
            "finalized" => Ok(CommitmentConfig::finalized()),
            other => Err(RpcError::InvalidConfig(format!(
                "unknown commitment level: {}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commitment_levels_parse() {
        let mut config = RpcConfig::default();
        assert_eq!(
            config.commitment_config().unwrap(),
            CommitmentConfig::confirmed()
        );

        config.commitment = "finalized".to_string();
        assert_eq!(
            config.commitment_config().unwrap(),
            CommitmentConfig::finalized()
        );

        config.commitment = "bogus".to_string();
        assert!(config.commitment_config().is_err());
    }
}
