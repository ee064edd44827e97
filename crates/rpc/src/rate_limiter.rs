//! Cooperative self-throttle for status polling
//!
//! Every signature confirmation polls through one shared [`PollGate`]. The
//! gate tracks a remaining call budget for the status method, a
//! requests-per-second budget, and a forced retry-after window set whenever
//! the provider answers with a rate-limit error. It is a cooperative
//! throttle, not a hard guarantee against provider-side limits.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Configuration for the poll admission gate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollGateConfig {
    /// Total status-call budget for the life of the gate
    #[serde(default = "default_method_budget")]
    pub method_budget: u64,

    /// Status calls allowed per second
    #[serde(default = "default_rps_budget")]
    pub rps_budget: u32,

    /// Minimum enforced delay after a rate-limit error, in milliseconds
    #[serde(default = "default_retry_after_floor_ms")]
    pub retry_after_floor_ms: u64,
}

fn default_method_budget() -> u64 {
    1_000_000
}

fn default_rps_budget() -> u32 {
    10
}

fn default_retry_after_floor_ms() -> u64 {
    2_000
}

impl Default for PollGateConfig {
    fn default() -> Self {
        Self {
            method_budget: default_method_budget(),
            rps_budget: default_rps_budget(),
            retry_after_floor_ms: default_retry_after_floor_ms(),
        }
    }
}

impl PollGateConfig {
    /// Enforced floor on retry-after delays
    pub fn retry_after_floor(&self) -> Duration {
        Duration::from_millis(self.retry_after_floor_ms)
    }
}

/// Mutable gate state, serialized behind one mutex so concurrent polls never
/// race a read-then-write.
struct GateState {
    /// Remaining status-call budget
    remaining_calls: u64,

    /// Remaining calls inside the current one-second window
    remaining_this_second: u32,

    /// When the per-second window resets
    window_reset: Instant,

    /// Forced delay after a provider rate-limit error
    retry_after_until: Option<Instant>,
}

/// Counters for observability
#[derive(Debug, Clone, Default)]
pub struct PollGateStats {
    /// Polls admitted
    pub allowed: u64,

    /// Polls denied by a budget or the retry-after window
    pub denied: u64,

    /// Rate-limit errors reported back to the gate
    pub rate_limited: u64,
}

/// Shared admission gate for status polling
pub struct PollGate {
    config: PollGateConfig,
    state: Mutex<GateState>,
    allowed: AtomicU64,
    denied: AtomicU64,
    rate_limited: AtomicU64,
}

impl PollGate {
    /// Create a gate with optimistic initial budgets
    pub fn new(config: PollGateConfig) -> Self {
        let state = GateState {
            remaining_calls: config.method_budget,
            remaining_this_second: config.rps_budget,
            window_reset: Instant::now() + Duration::from_secs(1),
            retry_after_until: None,
        };

        Self {
            config,
            state: Mutex::new(state),
            allowed: AtomicU64::new(0),
            denied: AtomicU64::new(0),
            rate_limited: AtomicU64::new(0),
        }
    }

    /// Try to admit one status poll. A poll is admitted only when both
    /// budgets are positive and the retry-after window has passed.
    pub fn try_acquire(&self) -> bool {
        let mut state = self.state.lock();
        let now = Instant::now();

        if let Some(until) = state.retry_after_until {
            if now < until {
                self.denied.fetch_add(1, Ordering::Relaxed);
                return false;
            }
            state.retry_after_until = None;
        }

        if now >= state.window_reset {
            state.remaining_this_second = self.config.rps_budget;
            state.window_reset = now + Duration::from_secs(1);
        }

        if state.remaining_calls == 0 || state.remaining_this_second == 0 {
            self.denied.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        state.remaining_calls -= 1;
        state.remaining_this_second -= 1;
        self.allowed.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Record a provider rate-limit error and enforce a retry-after window.
    /// Returns the delay actually enforced (provider hint, floored).
    pub fn on_rate_limited(&self, retry_after: Option<Duration>) -> Duration {
        let delay = retry_after
            .unwrap_or_else(|| self.config.retry_after_floor())
            .max(self.config.retry_after_floor());

        let mut state = self.state.lock();
        state.retry_after_until = Some(Instant::now() + delay);
        self.rate_limited.fetch_add(1, Ordering::Relaxed);
        delay
    }

    /// Time left inside the forced retry-after window, if any
    pub fn retry_after_remaining(&self) -> Option<Duration> {
        let state = self.state.lock();
        let until = state.retry_after_until?;
        let now = Instant::now();
        if now < until {
            Some(until - now)
        } else {
            None
        }
    }

    /// Snapshot of gate counters
    pub fn stats(&self) -> PollGateStats {
        PollGateStats {
            allowed: self.allowed.load(Ordering::Relaxed),
            denied: self.denied.load(Ordering::Relaxed),
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate(method_budget: u64, rps: u32, floor_ms: u64) -> PollGate {
        PollGate::new(PollGateConfig {
            method_budget,
            rps_budget: rps,
            retry_after_floor_ms: floor_ms,
        })
    }

    #[test]
    fn admits_until_per_second_budget_is_spent() {
        let gate = gate(100, 3, 2_000);

        assert!(gate.try_acquire());
        assert!(gate.try_acquire());
        assert!(gate.try_acquire());
        assert!(!gate.try_acquire());

        let stats = gate.stats();
        assert_eq!(stats.allowed, 3);
        assert_eq!(stats.denied, 1);
    }

    #[test]
    fn window_reset_restores_the_per_second_budget() {
        let gate = gate(100, 1, 2_000);

        assert!(gate.try_acquire());
        assert!(!gate.try_acquire());

        // Force the window into the past rather than sleeping.
        gate.state.lock().window_reset = Instant::now() - Duration::from_millis(1);
        assert!(gate.try_acquire());
    }

    #[test]
    fn exhausted_method_budget_denies_everything() {
        let gate = gate(2, 10, 2_000);

        assert!(gate.try_acquire());
        assert!(gate.try_acquire());
        assert!(!gate.try_acquire());
    }

    #[test]
    fn rate_limit_window_blocks_admission_and_respects_the_floor() {
        let gate = gate(100, 10, 50);

        let enforced = gate.on_rate_limited(Some(Duration::from_millis(10)));
        assert_eq!(enforced, Duration::from_millis(50));
        assert!(!gate.try_acquire());
        assert!(gate.retry_after_remaining().is_some());

        let enforced = gate.on_rate_limited(Some(Duration::from_millis(200)));
        assert_eq!(enforced, Duration::from_millis(200));
    }

    #[test]
    fn expired_retry_window_admits_again() {
        let gate = gate(100, 10, 50);

        gate.on_rate_limited(None);
        gate.state.lock().retry_after_until = Some(Instant::now() - Duration::from_millis(1));

        assert!(gate.retry_after_remaining().is_none());
        assert!(gate.try_acquire());
    }
}
