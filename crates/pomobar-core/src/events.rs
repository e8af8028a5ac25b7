use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::timer::{SessionType, TimerState};

/// Every state change in the timer produces an Event.
/// UI sinks subscribe to them; the runtime publishes them after the
/// state change has been applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    TimerStarted {
        session_type: SessionType,
        remaining_secs: u64,
        total_secs: u64,
        at: DateTime<Utc>,
    },
    TimerPaused {
        session_type: SessionType,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    TimerStopped {
        session_type: SessionType,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    TimerReset {
        session_type: SessionType,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    DurationChanged {
        session_type: SessionType,
        total_secs: u64,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    /// Emitted on every poll while running.
    Tick {
        session_type: SessionType,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    /// A phase reached zero. Fired exactly once per phase.
    PhaseCompleted {
        session_type: SessionType,
        started_at: Option<DateTime<Utc>>,
        duration_secs: f64,
        at: DateTime<Utc>,
    },
    SessionTypeChanged {
        session_type: SessionType,
        cycle_position: u32,
        at: DateTime<Utc>,
    },
    SystemSuspended {
        at: DateTime<Utc>,
    },
    /// Host woke up; `compensated_secs` is the sleep interval removed from
    /// the running countdown (zero when nothing was running).
    SystemResumed {
        compensated_secs: f64,
        at: DateTime<Utc>,
    },
    /// The "show statistics" hotkey fired; UI hosts open their stats view.
    ShowStatistics {
        at: DateTime<Utc>,
    },
    StateSnapshot {
        state: TimerState,
        session_type: SessionType,
        remaining_secs: u64,
        total_secs: u64,
        cycle_position: u32,
        long_break_interval: u32,
        full_cycle_mode: bool,
        work_sessions_completed: u64,
        at: DateTime<Utc>,
    },
}
