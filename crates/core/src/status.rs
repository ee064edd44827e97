//! Session state and status events

use serde::{Deserialize, Serialize};

/// Lifecycle of a volume session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// Created, never started
    Idle,
    /// Trade loop is live
    Running,
    /// Halted by an operator stop request
    Stopped,
    /// Ran its full duration and wound down on its own
    Completed,
}

impl SessionState {
    pub fn is_running(&self) -> bool {
        matches!(self, SessionState::Running)
    }
}

/// Snapshot broadcast after every round (and once at shutdown)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusEvent {
    pub state: SessionState,
    pub rounds: u64,
    /// Confirmed over attempted passes, "S/T"
    pub success_rate: String,
    pub remaining_seconds: i64,
}

impl StatusEvent {
    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }
}
