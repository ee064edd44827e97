//! Trade-cycle scheduler
//!
//! A round runs every wallet group in parallel. Inside one group each
//! wallet first buys, then (after a settle delay) sells its full token
//! balance. A wallet failure never aborts the group: the remaining
//! wallets keep trading and the round report carries the damage.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use tracing::{debug, info, warn};

use volume_bot_execution::{SwapDirection, TradeExecutor};

use crate::wallet::TradeWallet;
use crate::CoreResult;

/// Timing knobs for one trade round
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Delay between wallet launches inside a group, in milliseconds
    #[serde(default = "default_stagger_ms")]
    pub stagger_ms: u64,
    /// Wait between the buy pass and the sell pass, in milliseconds
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
}

fn default_stagger_ms() -> u64 {
    1_000
}

fn default_settle_delay_ms() -> u64 {
    5_000
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            stagger_ms: default_stagger_ms(),
            settle_delay_ms: default_settle_delay_ms(),
        }
    }
}

/// Outcome of a single round across all groups
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoundReport {
    /// Passes that confirmed on chain
    pub successes: u64,
    /// Passes attempted: two per wallet, always, so the success rate
    /// denominator is stable across rounds
    pub attempted: u64,
    /// Sells skipped because the wallet held no tokens (not failures)
    pub skipped_sells: u64,
}

impl RoundReport {
    pub fn merge(&mut self, other: RoundReport) {
        self.successes += other.successes;
        self.attempted += other.attempted;
        self.skipped_sells += other.skipped_sells;
    }
}

/// Executes one full round of trading; the session loop drives this
#[async_trait]
pub trait RoundRunner: Send + Sync {
    async fn run_round(
        &self,
        groups: &[Vec<TradeWallet>],
        mint: Pubkey,
    ) -> CoreResult<RoundReport>;
}

pub struct TradeCycleScheduler {
    executor: Arc<dyn TradeExecutor>,
    config: SchedulerConfig,
}

impl TradeCycleScheduler {
    pub fn new(executor: Arc<dyn TradeExecutor>, config: SchedulerConfig) -> Self {
        Self { executor, config }
    }

    /// Buy with every wallet in the group, staggered so launches don't
    /// land in the same slot. Returns one flag per wallet.
    async fn buy_pass(&self, group: &[TradeWallet], mint: Pubkey) -> Vec<bool> {
        let stagger = Duration::from_millis(self.config.stagger_ms);

        let buys = group.iter().enumerate().map(|(i, wallet)| {
            let executor = Arc::clone(&self.executor);
            let wallet = wallet.clone();
            async move {
                if i > 0 {
                    tokio::time::sleep(stagger * i as u32).await;
                }
                match executor
                    .execute_pass(wallet.keypair(), SwapDirection::Buy, mint)
                    .await
                {
                    Ok(()) => {
                        debug!(wallet = %wallet, "buy confirmed");
                        true
                    }
                    Err(e) => {
                        warn!(wallet = %wallet, error = %e, "buy failed");
                        false
                    }
                }
            }
        });

        join_all(buys).await
    }

    /// Sell the full token balance of every wallet in the group, under
    /// the same staggering as the buy pass. A wallet with nothing to
    /// sell is skipped, which is not a failure.
    async fn sell_pass(&self, group: &[TradeWallet], mint: Pubkey) -> (Vec<bool>, u64) {
        let stagger = Duration::from_millis(self.config.stagger_ms);

        let sells = group.iter().enumerate().map(|(i, wallet)| {
            let executor = Arc::clone(&self.executor);
            let wallet = wallet.clone();
            async move {
                if i > 0 {
                    tokio::time::sleep(stagger * i as u32).await;
                }

                let balance = match executor.token_balance(&wallet.pubkey(), &mint).await {
                    Ok(balance) => balance,
                    Err(e) => {
                        warn!(wallet = %wallet, error = %e, "balance lookup failed");
                        return (false, false);
                    }
                };
                if balance == 0 {
                    debug!(wallet = %wallet, "no tokens to sell, skipping");
                    return (false, true);
                }

                match executor
                    .execute_pass(wallet.keypair(), SwapDirection::Sell, mint)
                    .await
                {
                    Ok(()) => {
                        debug!(wallet = %wallet, "sell confirmed");
                        (true, false)
                    }
                    Err(e) => {
                        warn!(wallet = %wallet, error = %e, "sell failed");
                        (false, false)
                    }
                }
            }
        });

        let results = join_all(sells).await;
        let skipped = results.iter().filter(|(_, skipped)| *skipped).count() as u64;
        let outcomes = results.into_iter().map(|(ok, _)| ok).collect();
        (outcomes, skipped)
    }

    async fn run_group(&self, group: &[TradeWallet], mint: Pubkey) -> RoundReport {
        let buys = self.buy_pass(group, mint).await;

        tokio::time::sleep(Duration::from_millis(self.config.settle_delay_ms)).await;

        let (sells, skipped_sells) = self.sell_pass(group, mint).await;

        let successes =
            buys.iter().filter(|ok| **ok).count() + sells.iter().filter(|ok| **ok).count();

        RoundReport {
            successes: successes as u64,
            attempted: group.len() as u64 * 2,
            skipped_sells,
        }
    }
}

#[async_trait]
impl RoundRunner for TradeCycleScheduler {
    async fn run_round(
        &self,
        groups: &[Vec<TradeWallet>],
        mint: Pubkey,
    ) -> CoreResult<RoundReport> {
        let group_runs = groups.iter().map(|group| self.run_group(group, mint));
        let reports = join_all(group_runs).await;

        let mut round = RoundReport::default();
        for report in reports {
            round.merge(report);
        }

        info!(
            successes = round.successes,
            attempted = round.attempted,
            skipped_sells = round.skipped_sells,
            "round finished"
        );
        Ok(round)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use solana_sdk::signature::Keypair;
    use solana_sdk::signer::Signer;
    use std::collections::{HashMap, HashSet};
    use volume_bot_execution::{ExecutionError, ExecutionResult};

    /// Scripted executor: failing wallets error on every pass, balances
    /// accrue on buys except for wallets scripted to stay empty.
    struct ScriptedExecutor {
        failing: HashSet<Pubkey>,
        stays_empty: HashSet<Pubkey>,
        balances: Mutex<HashMap<Pubkey, u64>>,
        passes: Mutex<Vec<(Pubkey, SwapDirection)>>,
    }

    impl ScriptedExecutor {
        fn new() -> Self {
            Self {
                failing: HashSet::new(),
                stays_empty: HashSet::new(),
                balances: Mutex::new(HashMap::new()),
                passes: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl TradeExecutor for ScriptedExecutor {
        async fn execute_pass(
            &self,
            wallet: &Keypair,
            direction: SwapDirection,
            _mint: Pubkey,
        ) -> ExecutionResult<()> {
            let owner = wallet.pubkey();
            self.passes.lock().push((owner, direction));

            if self.failing.contains(&owner) {
                return Err(ExecutionError::QuoteFailed("scripted failure".into()));
            }
            if direction == SwapDirection::Buy && !self.stays_empty.contains(&owner) {
                *self.balances.lock().entry(owner).or_insert(0) += 1_000;
            }
            Ok(())
        }

        async fn token_balance(&self, owner: &Pubkey, _mint: &Pubkey) -> ExecutionResult<u64> {
            Ok(self.balances.lock().get(owner).copied().unwrap_or(0))
        }
    }

    fn pool(n: usize) -> Vec<TradeWallet> {
        (0..n).map(|i| TradeWallet::new(i, Keypair::new())).collect()
    }

    fn fast_config() -> SchedulerConfig {
        SchedulerConfig {
            stagger_ms: 1,
            settle_delay_ms: 1,
        }
    }

    #[tokio::test]
    async fn a_clean_round_trades_every_wallet_twice() {
        let executor = Arc::new(ScriptedExecutor::new());
        let scheduler = TradeCycleScheduler::new(executor.clone(), fast_config());
        let groups = crate::wallet::partition_into_groups(pool(10), 5);

        let report = scheduler
            .run_round(&groups, Pubkey::new_unique())
            .await
            .unwrap();

        assert_eq!(report.attempted, 20);
        assert_eq!(report.successes, 20);
        assert_eq!(report.skipped_sells, 0);
        assert_eq!(executor.passes.lock().len(), 20);
    }

    #[tokio::test]
    async fn one_failing_wallet_does_not_stop_its_group() {
        let wallets = pool(5);
        let victim = wallets[2].pubkey();

        let mut executor = ScriptedExecutor::new();
        executor.failing.insert(victim);
        let executor = Arc::new(executor);

        let scheduler = TradeCycleScheduler::new(executor.clone(), fast_config());
        let groups = crate::wallet::partition_into_groups(wallets, 5);

        let report = scheduler
            .run_round(&groups, Pubkey::new_unique())
            .await
            .unwrap();

        // The victim loses its buy and has nothing to sell; the other
        // four wallets complete both passes.
        assert_eq!(report.attempted, 10);
        assert_eq!(report.successes, 8);
        assert_eq!(report.skipped_sells, 1);

        let buys = executor
            .passes
            .lock()
            .iter()
            .filter(|(_, d)| *d == SwapDirection::Buy)
            .count();
        assert_eq!(buys, 5);
    }

    #[tokio::test]
    async fn empty_wallets_skip_the_sell_without_counting_as_failures() {
        let wallets = pool(10);

        // Wallet 7 buys but its tokens never arrive, so the sell pass
        // sees an empty balance.
        let mut executor = ScriptedExecutor::new();
        executor.stays_empty.insert(wallets[7].pubkey());
        let executor = Arc::new(executor);

        let scheduler = TradeCycleScheduler::new(executor.clone(), fast_config());
        let groups = crate::wallet::partition_into_groups(wallets, 5);

        let report = scheduler
            .run_round(&groups, Pubkey::new_unique())
            .await
            .unwrap();

        assert_eq!(report.attempted, 20);
        assert_eq!(report.skipped_sells, 1);
        // 10 buys and 9 sells land; the skip costs a success but is not
        // a fault.
        assert_eq!(report.successes, 19);
    }

    #[tokio::test]
    async fn groups_run_in_parallel() {
        let executor = Arc::new(ScriptedExecutor::new());
        let scheduler = TradeCycleScheduler::new(
            executor.clone(),
            SchedulerConfig {
                stagger_ms: 5,
                settle_delay_ms: 20,
            },
        );
        let groups = crate::wallet::partition_into_groups(pool(15), 5);

        let started = std::time::Instant::now();
        let report = scheduler
            .run_round(&groups, Pubkey::new_unique())
            .await
            .unwrap();
        let elapsed = started.elapsed();

        assert_eq!(report.successes, 30);
        // Three sequential groups would need at least 3x the settle
        // delay; parallel groups finish in roughly one.
        assert!(elapsed < Duration::from_millis(60 * 3));
    }
}
