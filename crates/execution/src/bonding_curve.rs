//! Bonding-curve trade API client (PumpPortal `trade-local` shape)
//!
//! The curve prices trades server-side, so there is no separate quote call:
//! `get_quote` synthesizes an artifact and `build_swap` does one POST that
//! returns the serialized transaction directly as the response body.

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use crate::provider::{BuiltSwap, QuoteArtifact, SwapDirection, SwapProvider, SwapRequest};
use crate::{ExecutionError, ExecutionResult};

const LAMPORTS_PER_SOL: f64 = 1_000_000_000.0;

/// Client for a bonding-curve trade API
pub struct BondingCurveClient {
    http: reqwest::Client,
    base_url: String,
    pool: String,
}

impl BondingCurveClient {
    /// Create a client against the given API base URL (e.g.
    /// `https://pumpportal.fun`)
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            pool: "pump".to_string(),
        }
    }

    fn trade_body(&self, request: &SwapRequest) -> serde_json::Value {
        let action = match request.direction {
            SwapDirection::Buy => "buy",
            SwapDirection::Sell => "sell",
        };

        // Buys are denominated in SOL, sells in token units; the API wants
        // slippage as a percentage and the priority fee in SOL.
        let denominated_in_sol = matches!(request.direction, SwapDirection::Buy);
        let amount: serde_json::Value = if denominated_in_sol {
            json!(request.amount as f64 / LAMPORTS_PER_SOL)
        } else {
            json!(request.amount)
        };

        json!({
            "publicKey": request.wallet.to_string(),
            "action": action,
            "mint": request.mint.to_string(),
            "amount": amount,
            "denominatedInSol": denominated_in_sol.to_string(),
            "slippage": request.slippage_bps as f64 / 100.0,
            "priorityFee": request.priority_fee_lamports as f64 / LAMPORTS_PER_SOL,
            "pool": self.pool,
        })
    }
}

#[async_trait]
impl SwapProvider for BondingCurveClient {
    fn name(&self) -> &'static str {
        "bonding-curve"
    }

    async fn get_quote(&self, request: &SwapRequest) -> ExecutionResult<QuoteArtifact> {
        // Pricing happens on the curve at build time.
        Ok(QuoteArtifact {
            request: request.clone(),
            payload: serde_json::Value::Null,
        })
    }

    async fn build_swap(&self, quote: &QuoteArtifact) -> ExecutionResult<BuiltSwap> {
        let url = format!("{}/api/trade-local", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(&self.trade_body(&quote.request))
            .send()
            .await
            .map_err(|e| ExecutionError::BuildFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ExecutionError::BuildFailed(format!("{}: {}", status, body)));
        }

        let transaction = response
            .bytes()
            .await
            .map_err(|e| ExecutionError::BuildFailed(e.to_string()))?
            .to_vec();

        if transaction.is_empty() {
            return Err(ExecutionError::InvalidTransaction(
                "empty transaction body".to_string(),
            ));
        }

        debug!(
            direction = %quote.request.direction,
            bytes = transaction.len(),
            "curve transaction built"
        );

        Ok(BuiltSwap {
            transaction,
            last_valid_block_height: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::pubkey::Pubkey;

    fn client() -> BondingCurveClient {
        BondingCurveClient::new("https://example.invalid")
    }

    #[test]
    fn buy_body_is_denominated_in_sol() {
        let request = SwapRequest {
            wallet: Pubkey::new_unique(),
            mint: Pubkey::new_unique(),
            direction: SwapDirection::Buy,
            amount: 10_000_000, // 0.01 SOL
            slippage_bps: 250,
            priority_fee_lamports: 100_000,
        };

        let body = client().trade_body(&request);
        assert_eq!(body["action"], "buy");
        assert_eq!(body["denominatedInSol"], "true");
        assert_eq!(body["amount"], 0.01);
        assert_eq!(body["slippage"], 2.5);
        assert_eq!(body["priorityFee"], 0.0001);
        assert_eq!(body["pool"], "pump");
    }

    #[test]
    fn sell_body_is_denominated_in_tokens() {
        let request = SwapRequest {
            wallet: Pubkey::new_unique(),
            mint: Pubkey::new_unique(),
            direction: SwapDirection::Sell,
            amount: 123_456,
            slippage_bps: 100,
            priority_fee_lamports: 100_000,
        };

        let body = client().trade_body(&request);
        assert_eq!(body["action"], "sell");
        assert_eq!(body["denominatedInSol"], "false");
        assert_eq!(body["amount"], 123_456);
    }
}
