//! Ledger RPC boundary for the volume bot
//!
//! This module provides the bot's view of the Solana ledger:
//! - The [`LedgerRpc`] trait, the seam between the confirmation core and the
//!   network (mocked in tests, implemented by [`SolanaLedger`] in production)
//! - The [`ConfirmationManager`], which resolves a definitive outcome for
//!   every submitted transaction by racing a signature subscription against
//!   rate-limited status polling
//! - The [`PollGate`], a cooperative self-throttle shared by all polls

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use solana_client::{
    client_error::ClientError,
    nonblocking::pubsub_client::PubsubClient,
    nonblocking::rpc_client::RpcClient,
    rpc_config::{RpcSendTransactionConfig, RpcSignatureSubscribeConfig},
    rpc_response::{Response, RpcSignatureResult},
};
use futures::{Stream, StreamExt};
use solana_sdk::{
    commitment_config::CommitmentConfig,
    pubkey::Pubkey,
    signature::Signature,
    transaction::VersionedTransaction,
};
use solana_transaction_status::TransactionConfirmationStatus;
use tokio::sync::oneshot;
use tracing::{debug, warn};

mod config;
mod confirmation;
mod rate_limiter;

pub use config::RpcConfig;
pub use confirmation::{ConfirmationConfig, ConfirmationManager};
pub use rate_limiter::{PollGate, PollGateConfig, PollGateStats};

/// Result type for the RPC module
pub type RpcResult<T> = std::result::Result<T, RpcError>;

/// Error types for the RPC module
#[derive(thiserror::Error, Debug, Clone)]
pub enum RpcError {
    #[error("Client error: {0}")]
    Client(String),

    #[error("Rate limited by provider")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    #[error("Transaction expired: block height budget exceeded")]
    TransactionExpired,

    #[error("Confirmation timed out")]
    ConfirmationTimeout,

    #[error("Subscription error: {0}")]
    Subscription(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<ClientError> for RpcError {
    fn from(err: ClientError) -> Self {
        classify_error_message(&err.to_string())
    }
}

/// Map an error message onto the bot's taxonomy, distinguishing provider
/// rate limiting from other failures.
fn classify_error_message(msg: &str) -> RpcError {
    if msg.contains("429") || msg.contains("Too Many Requests") {
        RpcError::RateLimited {
            retry_after: parse_retry_after(msg),
        }
    } else {
        RpcError::Client(msg.to_string())
    }
}

/// Best-effort extraction of a retry-after hint (in seconds) from an error
/// message. Providers are inconsistent here, so absence is the common case.
fn parse_retry_after(msg: &str) -> Option<Duration> {
    let lower = msg.to_ascii_lowercase();
    let idx = lower.find("retry-after")?;
    let tail = &lower[idx + "retry-after".len()..];
    let digits: String = tail
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse::<u64>().ok().map(Duration::from_secs)
}

/// Durability tier reported for a signature
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationTier {
    /// Processed by a leader, may still be rolled back
    Processed,

    /// Voted on by a supermajority
    Confirmed,

    /// Rooted, cannot be rolled back
    Finalized,
}

impl From<TransactionConfirmationStatus> for ConfirmationTier {
    fn from(status: TransactionConfirmationStatus) -> Self {
        match status {
            TransactionConfirmationStatus::Processed => Self::Processed,
            TransactionConfirmationStatus::Confirmed => Self::Confirmed,
            TransactionConfirmationStatus::Finalized => Self::Finalized,
        }
    }
}

/// Status snapshot for a submitted signature
#[derive(Debug, Clone, Default)]
pub struct SignatureStatus {
    /// Execution error reported by the ledger, if any
    pub err: Option<String>,

    /// Durability tier reached so far
    pub tier: Option<ConfirmationTier>,
}

impl SignatureStatus {
    /// Whether the reported tier satisfies the confirmed-or-better bar
    pub fn is_confirmed(&self) -> bool {
        matches!(
            self.tier,
            Some(ConfirmationTier::Confirmed) | Some(ConfirmationTier::Finalized)
        )
    }
}

/// Push notification delivered by a signature subscription
#[derive(Debug, Clone)]
pub struct SignatureNotification {
    /// Execution error carried by the notification, `None` on success
    pub err: Option<String>,
}

/// The bot's view of the ledger.
///
/// Every call is a suspension point and may fail with
/// [`RpcError::RateLimited`], which callers must treat as transient.
#[async_trait]
pub trait LedgerRpc: Send + Sync {
    /// Submit a signed transaction, returning its signature
    async fn submit_transaction(&self, tx: &VersionedTransaction) -> RpcResult<Signature>;

    /// Fetch the current status of a signature, `None` if the ledger has not
    /// observed it yet
    async fn get_signature_status(
        &self,
        signature: &Signature,
    ) -> RpcResult<Option<SignatureStatus>>;

    /// Open a one-shot notification channel for a signature at the configured
    /// commitment level. The receiver is dropped without a value if the
    /// subscription closes before a notification arrives.
    async fn subscribe_signature(
        &self,
        signature: &Signature,
    ) -> RpcResult<oneshot::Receiver<SignatureNotification>>;

    /// Current block height at the configured commitment level
    async fn get_block_height(&self) -> RpcResult<u64>;

    /// Balance of `mint` tokens held by `owner`, in base units.
    /// A missing token account reads as zero.
    async fn get_token_balance(&self, owner: &Pubkey, mint: &Pubkey) -> RpcResult<u64>;
}

/// Production [`LedgerRpc`] over the nonblocking Solana RPC and pubsub clients
pub struct SolanaLedger {
    /// HTTP RPC client
    rpc: Arc<RpcClient>,

    /// WebSocket endpoint for signature subscriptions
    ws_url: String,

    /// Commitment level for queries and subscriptions
    commitment: CommitmentConfig,
}

impl SolanaLedger {
    /// Create a ledger client from the RPC section of the configuration
    pub fn new(config: &RpcConfig) -> RpcResult<Self> {
        if config.http_url.is_empty() {
            return Err(RpcError::InvalidConfig("rpc.http_url is required".to_string()));
        }
        if config.ws_url.is_empty() {
            return Err(RpcError::InvalidConfig("rpc.ws_url is required".to_string()));
        }

        let commitment = config.commitment_config()?;
        let rpc = Arc::new(RpcClient::new_with_commitment(
            config.http_url.clone(),
            commitment,
        ));

        Ok(Self {
            rpc,
            ws_url: config.ws_url.clone(),
            commitment,
        })
    }

    /// Commitment level this client queries at
    pub fn commitment(&self) -> CommitmentConfig {
        self.commitment
    }
}

#[async_trait]
impl LedgerRpc for SolanaLedger {
    async fn submit_transaction(&self, tx: &VersionedTransaction) -> RpcResult<Signature> {
        let config = RpcSendTransactionConfig {
            skip_preflight: true,
            preflight_commitment: Some(self.commitment.commitment),
            max_retries: Some(0),
            ..RpcSendTransactionConfig::default()
        };

        let signature = self.rpc.send_transaction_with_config(tx, config).await?;
        debug!(%signature, "transaction submitted");
        Ok(signature)
    }

    async fn get_signature_status(
        &self,
        signature: &Signature,
    ) -> RpcResult<Option<SignatureStatus>> {
        let response = self.rpc.get_signature_statuses(&[*signature]).await?;

        let status = response
            .value
            .into_iter()
            .next()
            .flatten()
            .map(|status| SignatureStatus {
                err: status.err.map(|e| e.to_string()),
                tier: status.confirmation_status.map(ConfirmationTier::from),
            });

        Ok(status)
    }

    async fn subscribe_signature(
        &self,
        signature: &Signature,
    ) -> RpcResult<oneshot::Receiver<SignatureNotification>> {
        let (tx, rx) = oneshot::channel();
        let ws_url = self.ws_url.clone();
        let commitment = self.commitment;
        let signature = *signature;

        // The pubsub client is owned by a dedicated task so the subscription
        // stream's borrow of it never escapes. Setup failures are logged and
        // leave the receiver to be dropped; the poll strategy carries on.
        tokio::spawn(async move {
            let client = match PubsubClient::new(&ws_url).await {
                Ok(client) => client,
                Err(e) => {
                    warn!(%signature, "signature subscription connect failed: {}", e);
                    return;
                }
            };

            let config = RpcSignatureSubscribeConfig {
                commitment: Some(commitment),
                enable_received_notification: Some(false),
            };

            let (mut stream, unsubscribe) =
                match client.signature_subscribe(&signature, Some(config)).await {
                    Ok(subscription) => subscription,
                    Err(e) => {
                        warn!(%signature, "signature subscription failed: {}", e);
                        return;
                    }
                };

            relay_signature_notification(&signature, &mut stream, tx).await;

            drop(stream);
            unsubscribe().await;
        });

        Ok(rx)
    }

    async fn get_block_height(&self) -> RpcResult<u64> {
        let height = self
            .rpc
            .get_block_height_with_commitment(self.commitment)
            .await?;
        Ok(height)
    }

    async fn get_token_balance(&self, owner: &Pubkey, mint: &Pubkey) -> RpcResult<u64> {
        let ata = spl_associated_token_account::get_associated_token_address(owner, mint);

        match self.rpc.get_token_account_balance(&ata).await {
            Ok(amount) => Ok(amount.amount.parse::<u64>().unwrap_or(0)),
            Err(e) => {
                let classified = RpcError::from(e);
                if matches!(classified, RpcError::RateLimited { .. }) {
                    return Err(classified);
                }
                // No token account yet means the wallet simply holds nothing.
                debug!(%owner, %mint, "token balance read as zero");
                Ok(0)
            }
        }
    }
}

/// Forward the first subscription notification into `tx`, or stop as soon
/// as the receiver is dropped. A confirmation that resolves another way
/// drops its receiver, and the subscription must not outlive it: the caller
/// unsubscribes right after this returns.
async fn relay_signature_notification<S>(
    signature: &Signature,
    stream: &mut S,
    mut tx: oneshot::Sender<SignatureNotification>,
) where
    S: Stream<Item = Response<RpcSignatureResult>> + Unpin,
{
    tokio::select! {
        response = stream.next() => {
            if let Some(response) = response {
                let err = match response.value {
                    RpcSignatureResult::ProcessedSignature(result) => {
                        result.err.map(|e| e.to_string())
                    }
                    RpcSignatureResult::ReceivedSignature(_) => None,
                };
                let _ = tx.send(SignatureNotification { err });
            }
        }
        _ = tx.closed() => {
            debug!(%signature, "confirmation resolved elsewhere, dropping subscription");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_errors_are_classified() {
        let err = classify_error_message("HTTP status client error (429 Too Many Requests)");
        assert!(matches!(err, RpcError::RateLimited { .. }));

        let err = classify_error_message("connection reset by peer");
        assert!(matches!(err, RpcError::Client(_)));
    }

    #[test]
    fn retry_after_hint_is_parsed() {
        let retry = parse_retry_after("429 Too Many Requests, retry-after: 7");
        assert_eq!(retry, Some(Duration::from_secs(7)));
        assert_eq!(parse_retry_after("connection reset by peer"), None);
    }

    #[tokio::test]
    async fn dropped_receiver_ends_the_subscription_relay() {
        let signature = Signature::new_unique();
        let (tx, rx) = oneshot::channel();
        // A signature that never lands produces no notification at all.
        let mut stream = futures::stream::pending::<Response<RpcSignatureResult>>();

        let relay = tokio::spawn(async move {
            relay_signature_notification(&signature, &mut stream, tx).await;
        });
        drop(rx);

        tokio::time::timeout(Duration::from_millis(200), relay)
            .await
            .expect("relay must end once the receiver is gone")
            .unwrap();
    }

    #[tokio::test]
    async fn notification_is_forwarded_before_the_relay_ends() {
        use solana_client::rpc_response::{ProcessedSignatureResult, RpcResponseContext};

        let signature = Signature::new_unique();
        let (tx, rx) = oneshot::channel();
        let response = Response {
            context: RpcResponseContext {
                slot: 1,
                api_version: None,
            },
            value: RpcSignatureResult::ProcessedSignature(ProcessedSignatureResult { err: None }),
        };
        let mut stream = futures::stream::iter(vec![response]);

        relay_signature_notification(&signature, &mut stream, tx).await;

        let notification = rx.await.unwrap();
        assert!(notification.err.is_none());
    }

    #[test]
    fn confirmed_and_finalized_tiers_pass_the_bar() {
        let confirmed = SignatureStatus {
            err: None,
            tier: Some(ConfirmationTier::Confirmed),
        };
        assert!(confirmed.is_confirmed());

        let processed = SignatureStatus {
            err: None,
            tier: Some(ConfirmationTier::Processed),
        };
        assert!(!processed.is_confirmed());
    }
}
