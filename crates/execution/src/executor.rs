//! End-to-end swap execution
//!
//! One pass: size the trade, quote it, build the transaction, sign as fee
//! payer, submit, and wait for the confirmation manager's verdict. Every
//! error is terminal for the pass and only for the pass.

use std::sync::Arc;

use async_trait::async_trait;
use solana_sdk::{
    pubkey::Pubkey,
    signature::{Keypair, Signature},
    signer::Signer,
    transaction::VersionedTransaction,
};
use tracing::{debug, info, warn};

use volume_bot_rpc::{ConfirmationManager, LedgerRpc};

use crate::config::SwapConfig;
use crate::provider::{SwapDirection, SwapProvider, SwapRequest};
use crate::{ExecutionError, ExecutionResult, TradeExecutor};

/// Production trade executor: provider + ledger + confirmation manager
pub struct SwapExecutor {
    provider: Arc<dyn SwapProvider>,
    ledger: Arc<dyn LedgerRpc>,
    confirmations: Arc<ConfirmationManager>,
    config: SwapConfig,
}

impl SwapExecutor {
    pub fn new(
        provider: Arc<dyn SwapProvider>,
        ledger: Arc<dyn LedgerRpc>,
        confirmations: Arc<ConfirmationManager>,
        config: SwapConfig,
    ) -> Self {
        Self {
            provider,
            ledger,
            confirmations,
            config,
        }
    }

    /// Confirmation manager driving this executor's passes
    pub fn confirmations(&self) -> Arc<ConfirmationManager> {
        Arc::clone(&self.confirmations)
    }

    /// Trade size for one pass: a fixed lamport spend for buys, the wallet's
    /// entire token balance for sells.
    async fn pass_amount(
        &self,
        wallet: &Pubkey,
        direction: SwapDirection,
        mint: &Pubkey,
    ) -> ExecutionResult<u64> {
        match direction {
            SwapDirection::Buy => Ok(self.config.buy_amount_lamports),
            SwapDirection::Sell => {
                let balance = self
                    .ledger
                    .get_token_balance(wallet, mint)
                    .await
                    .map_err(|e| ExecutionError::Rpc(e.to_string()))?;
                if balance == 0 {
                    return Err(ExecutionError::InsufficientBalance);
                }
                Ok(balance)
            }
        }
    }
}

#[async_trait]
impl TradeExecutor for SwapExecutor {
    async fn execute_pass(
        &self,
        wallet: &Keypair,
        direction: SwapDirection,
        mint: Pubkey,
    ) -> ExecutionResult<()> {
        let owner = wallet.pubkey();
        let amount = self.pass_amount(&owner, direction, &mint).await?;

        let request = SwapRequest {
            wallet: owner,
            mint,
            direction,
            amount,
            slippage_bps: self.config.slippage_bps,
            priority_fee_lamports: self.config.priority_fee_lamports,
        };

        let quote = self.provider.get_quote(&request).await?;
        let built = self.provider.build_swap(&quote).await?;
        let tx = sign_as_fee_payer(&built.transaction, wallet)?;

        let signature = self
            .ledger
            .submit_transaction(&tx)
            .await
            .map_err(|e| ExecutionError::Rpc(e.to_string()))?;

        debug!(
            %signature,
            wallet = %owner,
            %direction,
            provider = self.provider.name(),
            "pass submitted, awaiting confirmation"
        );

        match self.confirmations.confirm(&signature).await {
            Ok(_) => {
                info!(%signature, wallet = %owner, %direction, "pass confirmed");
                Ok(())
            }
            Err(e) => {
                warn!(%signature, wallet = %owner, %direction, "pass not confirmed: {}", e);
                Err(ExecutionError::Confirmation(e))
            }
        }
    }

    async fn token_balance(&self, owner: &Pubkey, mint: &Pubkey) -> ExecutionResult<u64> {
        self.ledger
            .get_token_balance(owner, mint)
            .await
            .map_err(|e| ExecutionError::Rpc(e.to_string()))
    }
}

/// Deserialize a provider-built transaction and place the wallet's signature
/// in the fee payer slot.
fn sign_as_fee_payer(bytes: &[u8], wallet: &Keypair) -> ExecutionResult<VersionedTransaction> {
    let mut tx: VersionedTransaction = bincode::deserialize(bytes)
        .map_err(|e| ExecutionError::InvalidTransaction(e.to_string()))?;

    let required = tx.message.header().num_required_signatures as usize;
    if required == 0 {
        return Err(ExecutionError::InvalidTransaction(
            "transaction requires no signatures".to_string(),
        ));
    }

    let signature = wallet.sign_message(&tx.message.serialize());
    tx.signatures.resize(required, Signature::default());
    tx.signatures[0] = signature;

    Ok(tx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{BuiltSwap, QuoteArtifact};
    use parking_lot::Mutex;
    use solana_sdk::message::Message;
    use solana_sdk::system_instruction;
    use solana_sdk::transaction::Transaction;
    use std::sync::atomic::{AtomicU64, Ordering};
    use tokio::sync::oneshot;
    use volume_bot_rpc::{
        ConfirmationConfig, ConfirmationTier, PollGateConfig, RpcError, RpcResult,
        SignatureNotification, SignatureStatus,
    };

    fn unsigned_transfer(wallet: &Keypair) -> Vec<u8> {
        let instruction =
            system_instruction::transfer(&wallet.pubkey(), &Pubkey::new_unique(), 1);
        let message = Message::new(&[instruction], Some(&wallet.pubkey()));
        let tx = VersionedTransaction::from(Transaction::new_unsigned(message));
        bincode::serialize(&tx).unwrap()
    }

    #[test]
    fn fee_payer_signature_lands_in_slot_zero_and_verifies() {
        let wallet = Keypair::new();
        let bytes = unsigned_transfer(&wallet);

        let tx = sign_as_fee_payer(&bytes, &wallet).unwrap();
        assert_eq!(tx.signatures.len(), 1);
        assert!(tx.signatures[0].verify(
            wallet.pubkey().as_ref(),
            &tx.message.serialize()
        ));
    }

    #[test]
    fn garbage_bytes_are_rejected() {
        let wallet = Keypair::new();
        let result = sign_as_fee_payer(&[0xde, 0xad, 0xbe, 0xef], &wallet);
        assert!(matches!(result, Err(ExecutionError::InvalidTransaction(_))));
    }

    /// Ledger that confirms everything instantly and serves a fixed balance
    struct InstantLedger {
        balance: AtomicU64,
        submitted: Mutex<Vec<Signature>>,
    }

    #[async_trait]
    impl LedgerRpc for InstantLedger {
        async fn submit_transaction(&self, tx: &VersionedTransaction) -> RpcResult<Signature> {
            let signature = tx.signatures[0];
            self.submitted.lock().push(signature);
            Ok(signature)
        }

        async fn get_signature_status(
            &self,
            _signature: &Signature,
        ) -> RpcResult<Option<SignatureStatus>> {
            Ok(Some(SignatureStatus {
                err: None,
                tier: Some(ConfirmationTier::Finalized),
            }))
        }

        async fn subscribe_signature(
            &self,
            _signature: &Signature,
        ) -> RpcResult<oneshot::Receiver<SignatureNotification>> {
            Err(RpcError::Subscription("not available".to_string()))
        }

        async fn get_block_height(&self) -> RpcResult<u64> {
            Ok(100)
        }

        async fn get_token_balance(&self, _owner: &Pubkey, _mint: &Pubkey) -> RpcResult<u64> {
            Ok(self.balance.load(Ordering::Relaxed))
        }
    }

    /// Provider that builds an unsigned self-transfer for whoever asks
    struct LoopbackProvider;

    #[async_trait]
    impl SwapProvider for LoopbackProvider {
        fn name(&self) -> &'static str {
            "loopback"
        }

        async fn get_quote(&self, request: &SwapRequest) -> ExecutionResult<QuoteArtifact> {
            Ok(QuoteArtifact {
                request: request.clone(),
                payload: serde_json::Value::Null,
            })
        }

        async fn build_swap(&self, quote: &QuoteArtifact) -> ExecutionResult<BuiltSwap> {
            let instruction = system_instruction::transfer(
                &quote.request.wallet,
                &quote.request.wallet,
                quote.request.amount,
            );
            let message = Message::new(&[instruction], Some(&quote.request.wallet));
            let tx = VersionedTransaction::from(Transaction::new_unsigned(message));
            Ok(BuiltSwap {
                transaction: bincode::serialize(&tx).unwrap(),
                last_valid_block_height: None,
            })
        }
    }

    fn executor(balance: u64) -> SwapExecutor {
        let ledger = Arc::new(InstantLedger {
            balance: AtomicU64::new(balance),
            submitted: Mutex::new(Vec::new()),
        });
        let config = ConfirmationConfig {
            poll_interval_ms: 10,
            timeout_ms: 1_000,
            max_block_age: 150,
            height_refresh_ms: 10,
            gate: PollGateConfig {
                method_budget: 1_000,
                rps_budget: 1_000,
                retry_after_floor_ms: 10,
            },
        };
        let confirmations = Arc::new(ConfirmationManager::new(
            Arc::clone(&ledger) as Arc<dyn LedgerRpc>,
            config,
        ));

        SwapExecutor::new(
            Arc::new(LoopbackProvider),
            ledger,
            confirmations,
            SwapConfig::default(),
        )
    }

    #[tokio::test]
    async fn buy_pass_builds_signs_submits_and_confirms() {
        let executor = executor(0);
        let wallet = Keypair::new();

        let result = executor
            .execute_pass(&wallet, SwapDirection::Buy, Pubkey::new_unique())
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn sell_pass_with_zero_balance_is_insufficient() {
        let executor = executor(0);
        let wallet = Keypair::new();

        let result = executor
            .execute_pass(&wallet, SwapDirection::Sell, Pubkey::new_unique())
            .await;
        assert!(matches!(result, Err(ExecutionError::InsufficientBalance)));
    }

    #[tokio::test]
    async fn sell_pass_spends_the_whole_balance() {
        let executor = executor(42_000);
        let wallet = Keypair::new();

        let result = executor
            .execute_pass(&wallet, SwapDirection::Sell, Pubkey::new_unique())
            .await;
        assert!(result.is_ok());
    }
}
