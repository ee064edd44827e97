//! Transaction confirmation manager
//!
//! A submitted Solana transaction has no synchronous success signal: the
//! network may drop it, delay it, rate-limit the caller, or silently expire
//! it after a bounded number of blocks. The [`ConfirmationManager`] resolves
//! a definitive outcome for every signature by racing two strategies:
//!
//! - a push subscription on the signature (resolves on first notification)
//! - an active poll loop on a fixed interval, admitted through the shared
//!   [`PollGate`] and subject to a block-height expiry policy
//!
//! Whichever strategy produces a terminal outcome first wins; resolution is
//! idempotent, so the loser's late write is silently dropped. An overall
//! wall-clock timeout backstops both strategies so a caller is never left
//! waiting indefinitely.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use solana_sdk::signature::Signature;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, timeout};
use tracing::{debug, trace, warn};

use crate::rate_limiter::{PollGate, PollGateConfig, PollGateStats};
use crate::{LedgerRpc, RpcError, RpcResult};

/// Configuration for the confirmation manager
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmationConfig {
    /// Interval between status polls, in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Overall wall-clock budget per confirmation, in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Blocks a transaction may age past its starting height before it is
    /// considered expired
    #[serde(default = "default_max_block_age")]
    pub max_block_age: u64,

    /// Cadence of the shared block-height refresh, in milliseconds
    #[serde(default = "default_height_refresh_ms")]
    pub height_refresh_ms: u64,

    /// Admission gate for status polling
    #[serde(default)]
    pub gate: PollGateConfig,
}

fn default_poll_interval_ms() -> u64 {
    2_000
}

fn default_timeout_ms() -> u64 {
    45_000
}

fn default_max_block_age() -> u64 {
    150
}

fn default_height_refresh_ms() -> u64 {
    1_000
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            timeout_ms: default_timeout_ms(),
            max_block_age: default_max_block_age(),
            height_refresh_ms: default_height_refresh_ms(),
            gate: PollGateConfig::default(),
        }
    }
}

impl ConfirmationConfig {
    fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    fn height_refresh_interval(&self) -> Duration {
        Duration::from_millis(self.height_refresh_ms)
    }
}

/// One in-flight confirmation. Created on registration, mutated only by the
/// manager's own tasks, removed exactly once at resolution.
#[derive(Debug)]
struct PendingEntry {
    /// When the confirmation was registered
    created_at: Instant,

    /// Ledger height observed at registration; zero means unknown, which
    /// disables the expiry check for this entry
    start_height: u64,

    /// Status polls attempted so far
    poll_attempts: u32,

    /// Whether the push subscription was attached
    subscribed: bool,
}

/// Single-assignment result slot shared by the racing strategies. The first
/// resolver wins; later attempts are expected under racing and dropped.
struct ResolutionSlot {
    tx: Mutex<Option<oneshot::Sender<RpcResult<bool>>>>,
}

impl ResolutionSlot {
    fn new(tx: oneshot::Sender<RpcResult<bool>>) -> Self {
        Self {
            tx: Mutex::new(Some(tx)),
        }
    }

    /// Write the outcome if nobody has yet. Returns whether this call won.
    fn resolve(&self, outcome: RpcResult<bool>) -> bool {
        match self.tx.lock().take() {
            Some(tx) => tx.send(outcome).is_ok(),
            None => false,
        }
    }
}

/// Tracks in-flight transactions and resolves exactly one outcome per
/// signature: confirmed, failed, expired, or timed out.
pub struct ConfirmationManager {
    ledger: Arc<dyn LedgerRpc>,
    config: ConfirmationConfig,

    /// Shared poll admission gate, one per manager instance
    gate: Arc<PollGate>,

    /// In-flight confirmations, keyed by signature
    pending: Arc<DashMap<Signature, PendingEntry>>,

    /// Block-height cache refreshed by one ticking task and read by every
    /// pending confirmation's expiry check; zero until the first fetch
    current_height: Arc<AtomicU64>,

    /// Handle of the height-refresh task, aborted on shutdown
    height_task: Mutex<Option<JoinHandle<()>>>,
}

impl ConfirmationManager {
    /// Create a manager over the given ledger
    pub fn new(ledger: Arc<dyn LedgerRpc>, config: ConfirmationConfig) -> Self {
        let gate = Arc::new(PollGate::new(config.gate.clone()));

        Self {
            ledger,
            config,
            gate,
            pending: Arc::new(DashMap::new()),
            current_height: Arc::new(AtomicU64::new(0)),
            height_task: Mutex::new(None),
        }
    }

    /// Spawn the shared block-height refresh task. Idempotent.
    pub fn start(&self) {
        let mut guard = self.height_task.lock();
        if guard.is_some() {
            return;
        }

        let ledger = Arc::clone(&self.ledger);
        let height = Arc::clone(&self.current_height);
        let refresh = self.config.height_refresh_interval();

        *guard = Some(tokio::spawn(async move {
            let mut ticker = interval(refresh);
            loop {
                ticker.tick().await;
                match ledger.get_block_height().await {
                    Ok(h) => {
                        height.store(h, Ordering::Relaxed);
                        trace!(height = h, "block height refreshed");
                    }
                    Err(RpcError::RateLimited { .. }) => {
                        trace!("block height refresh rate limited");
                    }
                    Err(e) => {
                        debug!("block height refresh failed: {}", e);
                    }
                }
            }
        }));
    }

    /// Abort the height-refresh task. Pending confirmations keep their own
    /// timers and still resolve or time out on their own clock.
    pub fn shutdown(&self) {
        if let Some(task) = self.height_task.lock().take() {
            task.abort();
            debug!("block height refresh task stopped");
        }
    }

    /// Number of confirmations currently in flight
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Last observed block height, zero if none yet
    pub fn current_height(&self) -> u64 {
        self.current_height.load(Ordering::Relaxed)
    }

    /// Poll gate counters
    pub fn gate_stats(&self) -> PollGateStats {
        self.gate.stats()
    }

    /// Resolve a definitive outcome for `signature`.
    ///
    /// Returns `Ok(true)` once either strategy observes a confirmed or
    /// finalized status. Fails with [`RpcError::TransactionFailed`] on a
    /// ledger-reported execution error, [`RpcError::TransactionExpired`] when
    /// the block-height budget is exceeded, and
    /// [`RpcError::ConfirmationTimeout`] when no terminal signal arrives
    /// inside the wall-clock budget. Callers must treat a timeout as
    /// "unknown", not "failed": the transaction may still land later.
    pub async fn confirm(&self, signature: &Signature) -> RpcResult<bool> {
        let start_height = self.observed_height().await;

        let entry = PendingEntry {
            created_at: Instant::now(),
            start_height,
            poll_attempts: 0,
            subscribed: false,
        };

        match self.pending.entry(*signature) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                // A second registration would let two callers race one
                // entry's removal.
                return Err(RpcError::Client(format!(
                    "confirmation already pending for {}",
                    signature
                )));
            }
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert(entry);
            }
        }

        let (tx, rx) = oneshot::channel();
        let slot = Arc::new(ResolutionSlot::new(tx));

        let sub_task = self.spawn_subscription(*signature, Arc::clone(&slot));
        let poll_task = self.spawn_poll_loop(*signature, start_height, Arc::clone(&slot));

        let outcome = match timeout(self.config.timeout(), rx).await {
            Ok(Ok(result)) => result,
            // Both strategies dropped their slot without resolving, or the
            // timer fired: either way the backstop outcome is a timeout.
            Ok(Err(_)) | Err(_) => Err(RpcError::ConfirmationTimeout),
        };

        sub_task.abort();
        poll_task.abort();

        if let Some((_, entry)) = self.pending.remove(signature) {
            debug!(
                %signature,
                polls = entry.poll_attempts,
                subscribed = entry.subscribed,
                elapsed_ms = entry.created_at.elapsed().as_millis() as u64,
                outcome = ?outcome,
                "confirmation resolved"
            );
        }

        outcome
    }

    /// Strategy A: push subscription. Setup failures are logged and leave
    /// strategy B to carry the confirmation alone.
    fn spawn_subscription(&self, signature: Signature, slot: Arc<ResolutionSlot>) -> JoinHandle<()> {
        let ledger = Arc::clone(&self.ledger);
        let pending = Arc::clone(&self.pending);

        tokio::spawn(async move {
            let rx = match ledger.subscribe_signature(&signature).await {
                Ok(rx) => rx,
                Err(e) => {
                    warn!(%signature, "signature subscription setup failed: {}", e);
                    return;
                }
            };

            if let Some(mut entry) = pending.get_mut(&signature) {
                entry.subscribed = true;
            }

            match rx.await {
                Ok(notification) => {
                    let outcome = match notification.err {
                        Some(err) => Err(RpcError::TransactionFailed(err)),
                        None => Ok(true),
                    };
                    if slot.resolve(outcome) {
                        trace!(%signature, "resolved via subscription");
                    }
                }
                Err(_) => {
                    debug!(%signature, "signature subscription closed without notification");
                }
            }
        })
    }

    /// Strategy B: active polling with rate-limit backoff and block-height
    /// expiry. Expiry is only evaluated here, never by an independent timer.
    fn spawn_poll_loop(
        &self,
        signature: Signature,
        start_height: u64,
        slot: Arc<ResolutionSlot>,
    ) -> JoinHandle<()> {
        let ledger = Arc::clone(&self.ledger);
        let pending = Arc::clone(&self.pending);
        let gate = Arc::clone(&self.gate);
        let current_height = Arc::clone(&self.current_height);
        let poll_interval = self.config.poll_interval();
        let max_block_age = self.config.max_block_age;

        tokio::spawn(async move {
            loop {
                sleep(poll_interval).await;

                if let Some(remaining) = gate.retry_after_remaining() {
                    sleep(remaining).await;
                }
                if !gate.try_acquire() {
                    continue;
                }

                if let Some(mut entry) = pending.get_mut(&signature) {
                    entry.poll_attempts += 1;
                }

                match ledger.get_signature_status(&signature).await {
                    Ok(Some(status)) => {
                        if let Some(err) = status.err {
                            slot.resolve(Err(RpcError::TransactionFailed(err)));
                            return;
                        }
                        if status.is_confirmed() {
                            if slot.resolve(Ok(true)) {
                                trace!(%signature, "resolved via poll");
                            }
                            return;
                        }
                    }
                    Ok(None) => {}
                    Err(RpcError::RateLimited { retry_after }) => {
                        let enforced = gate.on_rate_limited(retry_after);
                        debug!(
                            %signature,
                            backoff_ms = enforced.as_millis() as u64,
                            "status poll rate limited"
                        );
                        continue;
                    }
                    Err(e) => {
                        warn!(%signature, "status poll failed: {}", e);
                    }
                }

                // Height zero means the starting height was never observed,
                // so the age of the transaction cannot be bounded yet.
                let height = current_height.load(Ordering::Relaxed);
                if start_height > 0 && height > start_height.saturating_add(max_block_age) {
                    slot.resolve(Err(RpcError::TransactionExpired));
                    return;
                }
            }
        })
    }

    /// Height observed "now": the shared cache when warm, a direct fetch
    /// otherwise. A failed fetch leaves the height unknown rather than
    /// guessing, which disables expiry for that entry.
    async fn observed_height(&self) -> u64 {
        let cached = self.current_height.load(Ordering::Relaxed);
        if cached > 0 {
            return cached;
        }

        match self.ledger.get_block_height().await {
            Ok(height) => {
                self.current_height.store(height, Ordering::Relaxed);
                height
            }
            Err(e) => {
                warn!("could not observe starting block height: {}", e);
                0
            }
        }
    }
}
