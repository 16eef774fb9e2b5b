//! Session lifecycle engine.
//!
//! The engine is a pure state machine over a single focus session. It has no
//! thread and no clock of its own: every command takes the current time, and
//! the caller is responsible for calling `tick()` once per second (or
//! `advance()` when catching up on elapsed wall-clock time).
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Running -> (Completed | Abandoned | Finished) -> Idle
//! ```
//!
//! Each session hands out at most one [`NewSession`] record. The latch that
//! enforces this lives on the active session itself and is checked by every
//! terminal transition.
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = SessionMachine::new(DEFAULT_FOCUS_SECS);
//! engine.start(Utc::now());
//! // Once per second:
//! if let Some(Transition { record: Some(record), .. }) = engine.tick(Utc::now()) {
//!     store.insert_session(&record)?;
//! }
//! ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::events::Event;
use crate::session::{NewSession, SessionStatus};

/// Length of one focus interval: 25 minutes.
pub const DEFAULT_FOCUS_SECS: u64 = 25 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Running,
    /// The countdown ran out on its own.
    Completed,
    Abandoned,
    /// The user ended the session early.
    Finished,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionState::Completed | SessionState::Abandoned | SessionState::Finished
        )
    }
}

/// Per-session fields, cleared on reset.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ActiveSession {
    started_at: DateTime<Utc>,
    #[serde(default)]
    ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    distraction_timestamps: Vec<DateTime<Utc>>,
    /// Set the moment this session's record is handed out.
    #[serde(default)]
    saved: bool,
}

impl ActiveSession {
    fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            ended_at: None,
            distraction_timestamps: Vec::new(),
            saved: false,
        }
    }

    fn distraction_count(&self) -> u32 {
        u32::try_from(self.distraction_timestamps.len()).unwrap_or(u32::MAX)
    }

    /// Stamp the end time and hand out the record, at most once.
    fn take_record(
        &mut self,
        status: SessionStatus,
        ended_at: DateTime<Utc>,
    ) -> Option<NewSession> {
        if self.saved {
            return None;
        }
        self.saved = true;
        let ended_at = ended_at.max(self.started_at);
        self.ended_at = Some(ended_at);
        Some(NewSession {
            start_time: self.started_at,
            end_time: Some(ended_at),
            status,
            distraction_count: self.distraction_count(),
            distraction_timestamps: Some(self.distraction_timestamps.clone()),
        })
    }
}

/// Outcome of a transition that ends a session.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub event: Event,
    /// Record to persist; `None` if this session was already emitted.
    pub record: Option<NewSession>,
}

/// Single-session state machine.
///
/// Serializable so the one-shot CLI can park it between invocations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMachine {
    focus_secs: u64,
    state: SessionState,
    remaining_secs: u64,
    #[serde(default)]
    active: Option<ActiveSession>,
    /// Instant up to which the countdown has been applied.
    #[serde(default)]
    last_tick_at: Option<DateTime<Utc>>,
}

impl Default for SessionMachine {
    fn default() -> Self {
        Self::new(DEFAULT_FOCUS_SECS)
    }
}

impl SessionMachine {
    /// Create an idle machine with the given focus interval (at least 1s).
    pub fn new(focus_secs: u64) -> Self {
        let focus_secs = focus_secs.max(1);
        Self {
            focus_secs,
            state: SessionState::Idle,
            remaining_secs: focus_secs,
            active: None,
            last_tick_at: None,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn focus_secs(&self) -> u64 {
        self.focus_secs
    }

    pub fn remaining_secs(&self) -> u64 {
        self.remaining_secs
    }

    pub fn distraction_count(&self) -> u32 {
        self.active
            .as_ref()
            .map(ActiveSession::distraction_count)
            .unwrap_or(0)
    }

    pub fn distraction_timestamps(&self) -> &[DateTime<Utc>] {
        self.active
            .as_ref()
            .map(|a| a.distraction_timestamps.as_slice())
            .unwrap_or(&[])
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.active.as_ref().map(|a| a.started_at)
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.active.as_ref().and_then(|a| a.ended_at)
    }

    /// Whether the current session's record has already been handed out.
    pub fn is_saved(&self) -> bool {
        self.active.as_ref().is_some_and(|a| a.saved)
    }

    /// 0.0 .. 100.0 progress through the focus interval.
    pub fn progress_pct(&self) -> f64 {
        let elapsed = self.focus_secs.saturating_sub(self.remaining_secs);
        (elapsed as f64 / self.focus_secs as f64 * 100.0).min(100.0)
    }

    /// Build a full state snapshot event.
    pub fn snapshot(&self, now: DateTime<Utc>) -> Event {
        Event::StateSnapshot {
            state: self.state,
            remaining_secs: self.remaining_secs,
            total_secs: self.focus_secs,
            distraction_count: self.distraction_count(),
            started_at: self.started_at(),
            progress_pct: self.progress_pct(),
            at: now,
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn start(&mut self, now: DateTime<Utc>) -> Option<Event> {
        if self.state != SessionState::Idle {
            debug!(state = ?self.state, "start ignored");
            return None;
        }
        self.active = Some(ActiveSession::new(now));
        self.remaining_secs = self.focus_secs;
        self.last_tick_at = Some(now);
        self.state = SessionState::Running;
        Some(Event::SessionStarted {
            duration_secs: self.focus_secs,
            at: now,
        })
    }

    /// Record one distraction. Silently ignored unless running.
    pub fn log_distraction(&mut self, now: DateTime<Utc>) -> Option<Event> {
        if self.state != SessionState::Running {
            debug!(state = ?self.state, "distraction ignored");
            return None;
        }
        let active = self.active.as_mut()?;
        active.distraction_timestamps.push(now);
        Some(Event::DistractionLogged {
            distraction_count: active.distraction_count(),
            at: now,
        })
    }

    pub fn abandon(&mut self, now: DateTime<Utc>) -> Option<Transition> {
        if self.state != SessionState::Running {
            debug!(state = ?self.state, "abandon ignored");
            return None;
        }
        let active = self.active.as_mut()?;
        let record = active.take_record(SessionStatus::Abandoned, now);
        let event = Event::SessionAbandoned {
            distraction_count: active.distraction_count(),
            at: now,
        };
        self.state = SessionState::Abandoned;
        self.last_tick_at = None;
        Some(Transition { event, record })
    }

    /// End early. Always recorded as clean, whatever the distraction count.
    pub fn finish(&mut self, now: DateTime<Utc>) -> Option<Transition> {
        if self.state != SessionState::Running {
            debug!(state = ?self.state, "finish ignored");
            return None;
        }
        let active = self.active.as_mut()?;
        let record = active.take_record(SessionStatus::Clean, now);
        let event = Event::SessionFinished {
            distraction_count: active.distraction_count(),
            at: now,
        };
        self.state = SessionState::Finished;
        self.last_tick_at = None;
        Some(Transition { event, record })
    }

    /// Call once per second. Returns a transition when the countdown ends.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Option<Transition> {
        self.advance(1, now)
    }

    /// Apply `elapsed_secs` of countdown at once.
    ///
    /// If the countdown is overshot, the end time is stamped at the instant
    /// it actually reached zero rather than at `now`.
    pub fn advance(&mut self, elapsed_secs: u64, now: DateTime<Utc>) -> Option<Transition> {
        if self.state != SessionState::Running || elapsed_secs == 0 {
            return None;
        }
        if elapsed_secs < self.remaining_secs {
            self.remaining_secs -= elapsed_secs;
            self.last_tick_at = Some(now);
            return None;
        }
        let overshoot = elapsed_secs - self.remaining_secs;
        self.remaining_secs = 0;
        let ended_at = now.checked_sub_signed(secs(overshoot)).unwrap_or(now);
        self.complete(ended_at)
    }

    /// Apply whatever wall-clock time has passed since the last tick.
    pub fn catch_up(&mut self, now: DateTime<Utc>) -> Option<Transition> {
        if self.state != SessionState::Running {
            return None;
        }
        let last = self.last_tick_at?;
        let elapsed = (now - last).num_seconds();
        if elapsed <= 0 {
            return None;
        }
        let elapsed = elapsed.unsigned_abs();
        // Keep the sub-second remainder for the next catch-up.
        let tick_at = last + secs(elapsed);
        self.advance(elapsed, tick_at)
    }

    /// Return to idle from any terminal state. Never re-emits.
    pub fn reset(&mut self, now: DateTime<Utc>) -> Option<Event> {
        if !self.state.is_terminal() {
            debug!(state = ?self.state, "reset ignored");
            return None;
        }
        self.state = SessionState::Idle;
        self.active = None;
        self.remaining_secs = self.focus_secs;
        self.last_tick_at = None;
        Some(Event::SessionReset { at: now })
    }

    /// Change the focus interval. Only takes effect while idle.
    pub fn set_focus_secs(&mut self, focus_secs: u64) -> bool {
        if self.state != SessionState::Idle {
            return false;
        }
        self.focus_secs = focus_secs.max(1);
        self.remaining_secs = self.focus_secs;
        true
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn complete(&mut self, ended_at: DateTime<Utc>) -> Option<Transition> {
        let active = self.active.as_mut()?;
        let record = active.take_record(SessionStatus::Clean, ended_at);
        let event = Event::SessionCompleted {
            status: SessionStatus::Clean,
            distraction_count: active.distraction_count(),
            at: active.ended_at.unwrap_or(ended_at),
        };
        self.state = SessionState::Completed;
        self.last_tick_at = None;
        Some(Transition { event, record })
    }
}

fn secs(n: u64) -> Duration {
    Duration::seconds(i64::try_from(n).unwrap_or(i64::MAX).min(i64::MAX / 1_000))
}
