//! Trading wallet pool
//!
//! A [`TradeWallet`] is one of N trading identities drawn from the pool.
//! Key material is owned exclusively by the wallet and never logged in
//! full; group membership is positional and recomputed per run.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Keypair;
use solana_sdk::signer::Signer;
use tracing::info;

use crate::{CoreError, CoreResult};

/// One trading identity from the wallet pool
#[derive(Clone)]
pub struct TradeWallet {
    index: usize,
    keypair: Arc<Keypair>,
}

impl TradeWallet {
    pub fn new(index: usize, keypair: Keypair) -> Self {
        Self {
            index,
            keypair: Arc::new(keypair),
        }
    }

    /// Stable position of this wallet in the pool
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    /// Signing key, for the execution layer only
    pub fn keypair(&self) -> &Keypair {
        &self.keypair
    }
}

impl fmt::Debug for TradeWallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Secret key stays out of all output.
        f.debug_struct("TradeWallet")
            .field("index", &self.index)
            .field("pubkey", &self.pubkey())
            .finish()
    }
}

impl fmt::Display for TradeWallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "wallet#{} ({})", self.index, self.pubkey())
    }
}

/// Partition wallets into fixed-size groups for parallel execution.
/// Membership is positional; the final group may be short.
pub fn partition_into_groups(wallets: Vec<TradeWallet>, group_size: usize) -> Vec<Vec<TradeWallet>> {
    let group_size = group_size.max(1);
    let mut groups = Vec::with_capacity(wallets.len().div_ceil(group_size));

    let mut current = Vec::with_capacity(group_size);
    for wallet in wallets {
        current.push(wallet);
        if current.len() == group_size {
            groups.push(std::mem::replace(&mut current, Vec::with_capacity(group_size)));
        }
    }
    if !current.is_empty() {
        groups.push(current);
    }

    groups
}

/// Source of trading wallets, consulted once at session setup
pub trait WalletStore: Send + Sync {
    fn load(&self) -> CoreResult<Vec<TradeWallet>>;
}

/// Wallet store backed by a JSON file holding an array of base58-encoded
/// secret keys
pub struct FileWalletStore {
    path: PathBuf,
}

impl FileWalletStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl WalletStore for FileWalletStore {
    fn load(&self) -> CoreResult<Vec<TradeWallet>> {
        let raw = std::fs::read_to_string(&self.path)?;
        let encoded: Vec<String> = serde_json::from_str(&raw)
            .map_err(|e| CoreError::WalletStore(format!("malformed wallet file: {}", e)))?;

        let mut wallets = Vec::with_capacity(encoded.len());
        for (index, secret) in encoded.iter().enumerate() {
            let bytes = bs58::decode(secret).into_vec().map_err(|e| {
                CoreError::WalletStore(format!("wallet {}: invalid base58: {}", index, e))
            })?;
            let keypair = Keypair::from_bytes(&bytes).map_err(|e| {
                CoreError::WalletStore(format!("wallet {}: invalid keypair: {}", index, e))
            })?;
            wallets.push(TradeWallet::new(index, keypair));
        }

        if wallets.is_empty() {
            return Err(CoreError::NoWallets);
        }

        info!(count = wallets.len(), "wallet pool loaded");
        Ok(wallets)
    }
}
