use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::SessionStatus;
use crate::timer::SessionState;

/// Every session transition produces an Event.
/// The CLI prints them; the countdown driver forwards them to the UI loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    SessionStarted {
        duration_secs: u64,
        at: DateTime<Utc>,
    },
    DistractionLogged {
        distraction_count: u32,
        at: DateTime<Utc>,
    },
    /// The countdown reached zero on its own.
    SessionCompleted {
        status: SessionStatus,
        distraction_count: u32,
        at: DateTime<Utc>,
    },
    SessionAbandoned {
        distraction_count: u32,
        at: DateTime<Utc>,
    },
    /// The user ended the session early; always recorded as clean.
    SessionFinished {
        distraction_count: u32,
        at: DateTime<Utc>,
    },
    SessionReset {
        at: DateTime<Utc>,
    },
    StateSnapshot {
        state: SessionState,
        remaining_secs: u64,
        total_secs: u64,
        distraction_count: u32,
        started_at: Option<DateTime<Utc>>,
        progress_pct: f64,
        at: DateTime<Utc>,
    },
}
