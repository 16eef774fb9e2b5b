//! Live countdown driver.
//!
//! Owns a background tokio task that ticks the controller once per interval
//! while the session is running. The task is aborted whenever the session
//! leaves the running state through a command, and when the runner is
//! dropped, so nothing keeps ticking after the owner goes away.
//!
//! Every event (command results, per-tick snapshots, completion) is forwarded
//! over an unbounded channel in the order it happened.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::debug;

use super::controller::SessionController;
use super::engine::SessionState;
use crate::events::Event;
use crate::storage::SessionSink;

pub struct SessionRunner<S> {
    controller: Arc<Mutex<SessionController<S>>>,
    events: mpsc::UnboundedSender<Event>,
    ticker: Option<JoinHandle<()>>,
    tick_interval: Duration,
}

impl<S> SessionRunner<S>
where
    S: SessionSink + Send + 'static,
{
    pub fn new(
        controller: SessionController<S>,
        tick_interval: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let runner = Self {
            controller: Arc::new(Mutex::new(controller)),
            events: tx,
            ticker: None,
            tick_interval: tick_interval.max(Duration::from_millis(1)),
        };
        (runner, rx)
    }

    /// Shared handle to the underlying controller.
    pub fn controller(&self) -> Arc<Mutex<SessionController<S>>> {
        Arc::clone(&self.controller)
    }

    pub fn is_ticking(&self) -> bool {
        self.ticker.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub async fn snapshot(&self) -> Event {
        self.controller.lock().await.snapshot()
    }

    /// Keep counting down a controller that was already running when it was
    /// handed over. Returns whether the ticker was started.
    pub async fn resume(&mut self) -> bool {
        if self.controller.lock().await.state() != SessionState::Running {
            return false;
        }
        self.spawn_ticker();
        true
    }

    pub async fn start(&mut self) -> Option<Event> {
        let event = self.controller.lock().await.start()?;
        self.emit(&event);
        self.spawn_ticker();
        Some(event)
    }

    pub async fn log_distraction(&self) -> Option<Event> {
        let event = self.controller.lock().await.log_distraction()?;
        self.emit(&event);
        Some(event)
    }

    pub async fn abandon(&mut self) -> Option<Event> {
        let event = self.controller.lock().await.abandon()?;
        self.cancel_ticker();
        self.emit(&event);
        Some(event)
    }

    pub async fn finish(&mut self) -> Option<Event> {
        let event = self.controller.lock().await.finish()?;
        self.cancel_ticker();
        self.emit(&event);
        Some(event)
    }

    pub async fn reset(&mut self) -> Option<Event> {
        let event = self.controller.lock().await.reset()?;
        self.cancel_ticker();
        self.emit(&event);
        Some(event)
    }

    fn emit(&self, event: &Event) {
        // A closed receiver only means nobody is listening any more.
        let _ = self.events.send(event.clone());
    }

    fn spawn_ticker(&mut self) {
        self.cancel_ticker();

        let controller = Arc::clone(&self.controller);
        let events = self.events.clone();
        let tick_interval = self.tick_interval;

        let handle = tokio::spawn(async move {
            let mut interval = time::interval(tick_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            interval.tick().await;

            loop {
                interval.tick().await;

                let (snapshot, done) = {
                    let mut guard = controller.lock().await;
                    if guard.state() != SessionState::Running {
                        break;
                    }
                    let done = guard.tick();
                    (guard.snapshot(), done)
                };

                let _ = events.send(snapshot);
                if let Some(event) = done {
                    let _ = events.send(event);
                    break;
                }
            }
            debug!("ticker stopped");
        });

        self.ticker = Some(handle);
    }

    fn cancel_ticker(&mut self) {
        if let Some(handle) = self.ticker.take() {
            handle.abort();
        }
    }
}

impl<S> Drop for SessionRunner<S> {
    fn drop(&mut self) {
        if let Some(handle) = self.ticker.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;

    fn runner(focus_secs: u64) -> (SessionRunner<Database>, mpsc::UnboundedReceiver<Event>) {
        let db = Database::open_memory().unwrap();
        let controller = SessionController::new(db, focus_secs);
        SessionRunner::new(controller, Duration::from_secs(1))
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<Event>) -> Vec<Event> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            out.push(event);
        }
        out
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_completes_and_saves_once() {
        let (mut runner, mut rx) = runner(3);
        runner.start().await.unwrap();
        assert!(runner.is_ticking());

        time::sleep(Duration::from_secs(10)).await;

        let controller = runner.controller();
        let guard = controller.lock().await;
        assert_eq!(guard.state(), SessionState::Completed);
        assert_eq!(guard.sink().session_count().unwrap(), 1);
        drop(guard);

        let events = drain(&mut rx);
        assert!(matches!(events.first(), Some(Event::SessionStarted { .. })));
        assert!(matches!(events.last(), Some(Event::SessionCompleted { .. })));
        let completions = events
            .iter()
            .filter(|e| matches!(e, Event::SessionCompleted { .. }))
            .count();
        assert_eq!(completions, 1);
        assert!(!runner.is_ticking());
    }

    #[tokio::test(start_paused = true)]
    async fn abandon_stops_the_countdown() {
        let (mut runner, mut rx) = runner(60);
        runner.start().await.unwrap();
        time::sleep(Duration::from_millis(2_500)).await;

        runner.log_distraction().await.unwrap();
        runner.abandon().await.unwrap();
        assert!(!runner.is_ticking());

        let controller = runner.controller();
        let remaining = controller.lock().await.remaining_secs();
        time::sleep(Duration::from_secs(30)).await;

        let guard = controller.lock().await;
        assert_eq!(guard.state(), SessionState::Abandoned);
        assert_eq!(guard.remaining_secs(), remaining);
        assert_eq!(guard.sink().session_count().unwrap(), 1);
        drop(guard);

        let events = drain(&mut rx);
        assert!(matches!(events.last(), Some(Event::SessionAbandoned { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn finish_stops_the_countdown() {
        let (mut runner, mut rx) = runner(60);
        runner.start().await.unwrap();
        time::sleep(Duration::from_millis(2_500)).await;

        runner.finish().await.unwrap();
        assert!(!runner.is_ticking());

        let controller = runner.controller();
        let remaining = controller.lock().await.remaining_secs();
        time::sleep(Duration::from_secs(90)).await;

        let guard = controller.lock().await;
        assert_eq!(guard.state(), SessionState::Finished);
        assert_eq!(guard.remaining_secs(), remaining);
        assert_eq!(guard.sink().session_count().unwrap(), 1);
        drop(guard);

        let events = drain(&mut rx);
        assert!(matches!(events.last(), Some(Event::SessionFinished { .. })));
        assert!(!events
            .iter()
            .any(|e| matches!(e, Event::SessionCompleted { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn reset_leaves_the_countdown_stopped() {
        let (mut runner, mut rx) = runner(3);
        runner.start().await.unwrap();
        time::sleep(Duration::from_secs(10)).await;
        runner.reset().await.unwrap();
        assert!(!runner.is_ticking());
        drain(&mut rx);

        time::sleep(Duration::from_secs(30)).await;

        let controller = runner.controller();
        let guard = controller.lock().await;
        assert_eq!(guard.state(), SessionState::Idle);
        assert_eq!(guard.remaining_secs(), 3);
        assert_eq!(guard.sink().session_count().unwrap(), 1);
        drop(guard);
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn resume_picks_up_a_running_controller() {
        let db = Database::open_memory().unwrap();
        let mut controller = SessionController::new(db, 3);
        controller.start().unwrap();
        let (mut resumed, mut rx) = SessionRunner::new(controller, Duration::from_secs(1));

        assert!(resumed.resume().await);
        time::sleep(Duration::from_secs(10)).await;

        let controller = resumed.controller();
        let guard = controller.lock().await;
        assert_eq!(guard.state(), SessionState::Completed);
        assert_eq!(guard.sink().session_count().unwrap(), 1);
        drop(guard);
        assert!(matches!(
            drain(&mut rx).last(),
            Some(Event::SessionCompleted { .. })
        ));

        let (mut idle, _rx) = runner(60);
        assert!(!idle.resume().await);
        assert!(!idle.is_ticking());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_runner_stops_ticking() {
        let (mut runner, _rx) = runner(60);
        runner.start().await.unwrap();
        let controller = runner.controller();
        drop(runner);

        time::sleep(Duration::from_secs(30)).await;
        let guard = controller.lock().await;
        assert_eq!(guard.state(), SessionState::Running);
        assert_eq!(guard.remaining_secs(), 60);
        assert_eq!(guard.sink().session_count().unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_after_finish_allows_restart() {
        let (mut runner, _rx) = runner(60);
        runner.start().await.unwrap();
        assert!(runner.reset().await.is_none());
        runner.finish().await.unwrap();
        runner.reset().await.unwrap();
        runner.start().await.unwrap();
        assert!(runner.is_ticking());
    }
}
