//! Session counters

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scheduler::RoundReport;

/// Running totals for the life of one session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub rounds: u64,
    pub successes: u64,
    pub attempted: u64,
    pub skipped_sells: u64,
}

impl SessionStats {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            ended_at: None,
            rounds: 0,
            successes: 0,
            attempted: 0,
            skipped_sells: 0,
        }
    }

    pub fn record_round(&mut self, report: RoundReport) {
        self.rounds += 1;
        self.successes += report.successes;
        self.attempted += report.attempted;
        self.skipped_sells += report.skipped_sells;
    }

    /// Confirmed passes over attempted passes, as "S/T"
    pub fn success_rate(&self) -> String {
        format!("{}/{}", self.successes, self.attempted)
    }

    /// Seconds left until `deadline`, clamped at zero
    pub fn remaining_seconds(&self, deadline: DateTime<Utc>) -> i64 {
        (deadline - Utc::now()).num_seconds().max(0)
    }
}

impl Default for SessionStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn rounds_accumulate_into_the_rate() {
        let mut stats = SessionStats::new();
        stats.record_round(RoundReport {
            successes: 9,
            attempted: 10,
            skipped_sells: 1,
        });
        stats.record_round(RoundReport {
            successes: 10,
            attempted: 10,
            skipped_sells: 0,
        });

        assert_eq!(stats.rounds, 2);
        assert_eq!(stats.success_rate(), "19/20");
        assert_eq!(stats.skipped_sells, 1);
    }

    #[test]
    fn remaining_seconds_never_goes_negative() {
        let stats = SessionStats::new();
        assert_eq!(stats.remaining_seconds(Utc::now() - Duration::hours(1)), 0);
        assert!(stats.remaining_seconds(Utc::now() + Duration::seconds(90)) > 80);
    }
}
