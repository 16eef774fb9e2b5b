//! Session lifecycle controller.
//!
//! Wraps a [`SessionMachine`] with a clock and a [`SessionSink`]. Terminal
//! transitions are committed first and the emitted record is handed to the
//! sink together with the machine that produced it; a failed write is logged
//! and otherwise ignored, so local state always reflects the outcome the user
//! chose.

use std::sync::Arc;

use tracing::{error, info};

use super::clock::{Clock, SystemClock};
use super::engine::{SessionMachine, SessionState, Transition};
use crate::events::Event;
use crate::storage::SessionSink;

pub struct SessionController<S> {
    machine: SessionMachine,
    sink: S,
    clock: Arc<dyn Clock>,
}

impl<S: SessionSink> SessionController<S> {
    /// Idle controller on the system clock.
    pub fn new(sink: S, focus_secs: u64) -> Self {
        Self::from_machine(SessionMachine::new(focus_secs), sink, Arc::new(SystemClock))
    }

    pub fn with_clock(sink: S, focus_secs: u64, clock: Arc<dyn Clock>) -> Self {
        Self::from_machine(SessionMachine::new(focus_secs), sink, clock)
    }

    /// Resume from a previously parked machine.
    pub fn from_machine(machine: SessionMachine, sink: S, clock: Arc<dyn Clock>) -> Self {
        Self {
            machine,
            sink,
            clock,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn machine(&self) -> &SessionMachine {
        &self.machine
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn state(&self) -> SessionState {
        self.machine.state()
    }

    pub fn remaining_secs(&self) -> u64 {
        self.machine.remaining_secs()
    }

    pub fn distraction_count(&self) -> u32 {
        self.machine.distraction_count()
    }

    pub fn snapshot(&self) -> Event {
        self.machine.snapshot(self.clock.now())
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn start(&mut self) -> Option<Event> {
        let event = self.machine.start(self.clock.now())?;
        info!(focus_secs = self.machine.focus_secs(), "session started");
        Some(event)
    }

    pub fn log_distraction(&mut self) -> Option<Event> {
        self.machine.log_distraction(self.clock.now())
    }

    pub fn abandon(&mut self) -> Option<Event> {
        let transition = self.machine.abandon(self.clock.now())?;
        Some(self.commit(transition))
    }

    pub fn finish(&mut self) -> Option<Event> {
        let transition = self.machine.finish(self.clock.now())?;
        Some(self.commit(transition))
    }

    /// One second of countdown. Returns the completion event when it runs out.
    pub fn tick(&mut self) -> Option<Event> {
        let transition = self.machine.tick(self.clock.now())?;
        Some(self.commit(transition))
    }

    /// Apply all wall-clock time since the last tick.
    pub fn catch_up(&mut self) -> Option<Event> {
        let transition = self.machine.catch_up(self.clock.now())?;
        Some(self.commit(transition))
    }

    pub fn reset(&mut self) -> Option<Event> {
        self.machine.reset(self.clock.now())
    }

    pub fn set_focus_secs(&mut self, focus_secs: u64) -> bool {
        self.machine.set_focus_secs(focus_secs)
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn commit(&mut self, transition: Transition) -> Event {
        if let Some(record) = transition.record {
            match self.sink.commit_session(&self.machine, &record) {
                Ok(saved) => info!(
                    id = %saved.id,
                    status = %saved.status,
                    distractions = saved.distraction_count,
                    "session saved"
                ),
                Err(e) => error!(
                    error = %e,
                    status = %record.status,
                    "failed to save session; outcome kept locally"
                ),
            }
        }
        transition.event
    }
}
