//! DEX aggregator client (Jupiter v6 API shape)
//!
//! Two calls per pass: GET `/quote` returns an opaque route, POST `/swap`
//! turns that route plus the wallet's public key into a base64-encoded
//! versioned transaction ready for the fee payer's signature.

use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::provider::{BuiltSwap, QuoteArtifact, SwapProvider, SwapRequest};
use crate::{ExecutionError, ExecutionResult};

/// Client for a Jupiter-style aggregator
pub struct JupiterClient {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SwapResponse {
    swap_transaction: String,
    last_valid_block_height: Option<u64>,
}

impl JupiterClient {
    /// Create a client against the given API base URL (e.g.
    /// `https://quote-api.jup.ag/v6`)
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    fn quote_query(request: &SwapRequest) -> Vec<(&'static str, String)> {
        vec![
            ("inputMint", request.direction.input_mint(&request.mint).to_string()),
            ("outputMint", request.direction.output_mint(&request.mint).to_string()),
            ("amount", request.amount.to_string()),
            ("slippageBps", request.slippage_bps.to_string()),
        ]
    }

    fn swap_body(quote: &QuoteArtifact) -> serde_json::Value {
        json!({
            "quoteResponse": quote.payload,
            "userPublicKey": quote.request.wallet.to_string(),
            "wrapAndUnwrapSol": true,
            "prioritizationFeeLamports": quote.request.priority_fee_lamports,
        })
    }
}

#[async_trait]
impl SwapProvider for JupiterClient {
    fn name(&self) -> &'static str {
        "jupiter"
    }

    async fn get_quote(&self, request: &SwapRequest) -> ExecutionResult<QuoteArtifact> {
        let url = format!("{}/quote", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&Self::quote_query(request))
            .send()
            .await
            .map_err(|e| ExecutionError::QuoteFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ExecutionError::QuoteFailed(format!("{}: {}", status, body)));
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ExecutionError::QuoteFailed(e.to_string()))?;

        debug!(
            direction = %request.direction,
            amount = request.amount,
            "aggregator quote received"
        );

        Ok(QuoteArtifact {
            request: request.clone(),
            payload,
        })
    }

    async fn build_swap(&self, quote: &QuoteArtifact) -> ExecutionResult<BuiltSwap> {
        let url = format!("{}/swap", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(&Self::swap_body(quote))
            .send()
            .await
            .map_err(|e| ExecutionError::BuildFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ExecutionError::BuildFailed(format!("{}: {}", status, body)));
        }

        let swap: SwapResponse = response
            .json()
            .await
            .map_err(|e| ExecutionError::BuildFailed(e.to_string()))?;

        let transaction = base64::engine::general_purpose::STANDARD
            .decode(&swap.swap_transaction)
            .map_err(|e| ExecutionError::InvalidTransaction(e.to_string()))?;

        Ok(BuiltSwap {
            transaction,
            last_valid_block_height: swap.last_valid_block_height,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{SwapDirection, WSOL_MINT};
    use solana_sdk::pubkey::Pubkey;

    fn request(direction: SwapDirection) -> SwapRequest {
        SwapRequest {
            wallet: Pubkey::new_unique(),
            mint: Pubkey::new_unique(),
            direction,
            amount: 5_000_000,
            slippage_bps: 250,
            priority_fee_lamports: 100_000,
        }
    }

    #[test]
    fn buy_quote_query_swaps_sol_for_the_token() {
        let request = request(SwapDirection::Buy);
        let query = JupiterClient::quote_query(&request);

        assert_eq!(query[0], ("inputMint", WSOL_MINT.to_string()));
        assert_eq!(query[1], ("outputMint", request.mint.to_string()));
        assert_eq!(query[2], ("amount", "5000000".to_string()));
        assert_eq!(query[3], ("slippageBps", "250".to_string()));
    }

    #[test]
    fn swap_body_carries_the_quote_and_fee() {
        let request = request(SwapDirection::Sell);
        let quote = QuoteArtifact {
            request: request.clone(),
            payload: serde_json::json!({"route": "opaque"}),
        };

        let body = JupiterClient::swap_body(&quote);
        assert_eq!(body["quoteResponse"]["route"], "opaque");
        assert_eq!(body["userPublicKey"], request.wallet.to_string());
        assert_eq!(body["prioritizationFeeLamports"], 100_000);
    }
}
