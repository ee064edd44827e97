//! Session controller
//!
//! Owns the run/stop lifecycle of one volume session: loops trade rounds
//! until the wall-clock deadline passes or an operator stops it, with a
//! randomized pause between rounds so the cadence doesn't leave a
//! regular on-chain footprint.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use rand::Rng;
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use volume_bot_rpc::ConfirmationManager;

use crate::scheduler::{RoundReport, RoundRunner};
use crate::stats::SessionStats;
use crate::status::{SessionState, StatusEvent};
use crate::wallet::{partition_into_groups, TradeWallet};
use crate::{CoreError, CoreResult};

/// Pacing and sizing knobs for a session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Lower bound of the random pause between rounds, in milliseconds
    #[serde(default = "default_min_round_delay_ms")]
    pub min_round_delay_ms: u64,
    /// Upper bound of the random pause between rounds, in milliseconds
    #[serde(default = "default_max_round_delay_ms")]
    pub max_round_delay_ms: u64,
    /// Pause after a round-level fault before trying again, in milliseconds
    #[serde(default = "default_round_fault_backoff_ms")]
    pub round_fault_backoff_ms: u64,
    /// Wallets per parallel group
    #[serde(default = "default_group_size")]
    pub group_size: usize,
}

fn default_min_round_delay_ms() -> u64 {
    15_000
}

fn default_max_round_delay_ms() -> u64 {
    45_000
}

fn default_round_fault_backoff_ms() -> u64 {
    5_000
}

fn default_group_size() -> usize {
    5
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            min_round_delay_ms: default_min_round_delay_ms(),
            max_round_delay_ms: default_max_round_delay_ms(),
            round_fault_backoff_ms: default_round_fault_backoff_ms(),
            group_size: default_group_size(),
        }
    }
}

pub struct VolumeSession {
    runner: Arc<dyn RoundRunner>,
    confirmations: Arc<ConfirmationManager>,
    wallets: Vec<TradeWallet>,
    config: SessionConfig,
    state: RwLock<SessionState>,
    stop_requested: AtomicBool,
    stats: Mutex<SessionStats>,
    status_tx: broadcast::Sender<StatusEvent>,
}

impl VolumeSession {
    pub fn new(
        runner: Arc<dyn RoundRunner>,
        confirmations: Arc<ConfirmationManager>,
        wallets: Vec<TradeWallet>,
        config: SessionConfig,
    ) -> Self {
        let (status_tx, _) = broadcast::channel(64);
        Self {
            runner,
            confirmations,
            wallets,
            config,
            state: RwLock::new(SessionState::Idle),
            stop_requested: AtomicBool::new(false),
            stats: Mutex::new(SessionStats::new()),
            status_tx,
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    /// Subscribe to per-round status snapshots. Safe to call before or
    /// during a run; lagging receivers drop old events.
    pub fn subscribe_status(&self) -> broadcast::Receiver<StatusEvent> {
        self.status_tx.subscribe()
    }

    /// Run the trade loop against `mint` for `duration`, then wind down.
    /// Returns the final statistics for the run.
    pub async fn start(&self, mint: Pubkey, duration: Duration) -> CoreResult<SessionStats> {
        {
            let mut state = self.state.write();
            if state.is_running() {
                return Err(CoreError::AlreadyRunning);
            }
            if self.wallets.is_empty() {
                return Err(CoreError::NoWallets);
            }
            *state = SessionState::Running;
        }
        self.stop_requested.store(false, Ordering::SeqCst);
        *self.stats.lock() = SessionStats::new();

        let groups = partition_into_groups(self.wallets.clone(), self.config.group_size);
        let deadline = Utc::now() + chrono::Duration::from_std(duration).unwrap_or_default();
        let batch_attempts = self.wallets.len() as u64 * 2;

        self.confirmations.start();
        info!(
            mint = %mint,
            wallets = self.wallets.len(),
            groups = groups.len(),
            duration_secs = duration.as_secs(),
            "session started"
        );

        loop {
            if self.stop_requested.load(Ordering::SeqCst) {
                info!("stop requested, ending session");
                break;
            }
            if Utc::now() >= deadline {
                info!("session duration elapsed");
                break;
            }

            match self.runner.run_round(&groups, mint).await {
                Ok(report) => {
                    self.stats.lock().record_round(report);
                    self.emit_status(deadline);
                }
                Err(e) => {
                    // The whole batch is charged as failed so the
                    // success rate reflects the outage.
                    error!(error = %e, "round fault");
                    self.stats.lock().record_round(RoundReport {
                        successes: 0,
                        attempted: batch_attempts,
                        skipped_sells: 0,
                    });
                    self.emit_status(deadline);
                    tokio::time::sleep(Duration::from_millis(self.config.round_fault_backoff_ms))
                        .await;
                    continue;
                }
            }

            if self.stop_requested.load(Ordering::SeqCst) || Utc::now() >= deadline {
                continue;
            }

            let delay = {
                // Scoped so the RNG is not held across the await.
                let mut rng = rand::thread_rng();
                rng.gen_range(self.config.min_round_delay_ms..=self.config.max_round_delay_ms)
            };
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        self.confirmations.shutdown();

        let final_state = if self.stop_requested.load(Ordering::SeqCst) {
            SessionState::Stopped
        } else {
            SessionState::Completed
        };
        *self.state.write() = final_state;
        self.emit_status(deadline);

        let stats = {
            let mut stats = self.stats.lock();
            stats.ended_at = Some(Utc::now());
            stats.clone()
        };
        info!(
            rounds = stats.rounds,
            success_rate = %stats.success_rate(),
            state = ?final_state,
            "session finished"
        );
        Ok(stats)
    }

    /// Request a stop. Idempotent from any state; a round already in
    /// flight finishes before the loop observes the flag.
    pub fn stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
        let mut state = self.state.write();
        if *state == SessionState::Idle {
            *state = SessionState::Stopped;
        } else if state.is_running() {
            warn!("stop requested, current round will finish");
        }
    }

    fn emit_status(&self, deadline: chrono::DateTime<Utc>) {
        let stats = self.stats.lock();
        let event = StatusEvent {
            state: self.state(),
            rounds: stats.rounds,
            success_rate: stats.success_rate(),
            remaining_seconds: stats.remaining_seconds(deadline),
        };
        // No subscribers is fine.
        let _ = self.status_tx.send(event);
    }
}
