use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use clap::Subcommand;
use pomofocus_core::storage::{Database, ParkedStore};
use pomofocus_core::timer::{SessionController, SessionMachine, SessionRunner, SystemClock};
use pomofocus_core::{Config, Event, Result, SessionState};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

#[derive(Subcommand)]
pub enum TimerAction {
    /// Start a focus session
    Start,
    /// Log a distraction in the running session
    Distract,
    /// Abandon the running session
    Abandon,
    /// Finish the running session early (recorded as clean)
    Finish,
    /// Return to idle after a session has ended
    Reset,
    /// Print current timer state as JSON
    Status,
    /// Run the countdown in the foreground with single-key actions
    Run,
}

/// Load the parked session and apply the time that passed since it was last
/// saved. Returns the completion event when the session ran out meanwhile.
fn resume(config: &Config) -> Result<(SessionController<ParkedStore>, Option<Event>)> {
    let store = ParkedStore::new(Database::open()?);
    let machine = store
        .load_machine()?
        .unwrap_or_else(|| SessionMachine::new(config.timer.focus_duration_secs));
    let mut controller = SessionController::from_machine(machine, store, Arc::new(SystemClock));
    // Picks up a changed focus interval; ignored unless idle.
    controller.set_focus_secs(config.timer.focus_duration_secs);
    let caught_up = controller.catch_up();
    Ok((controller, caught_up))
}

fn park(controller: &SessionController<ParkedStore>) -> Result<()> {
    controller.sink().save_machine(controller.machine())?;
    debug!(state = ?controller.state(), "timer state parked");
    Ok(())
}

pub fn run(action: TimerAction) -> Result<()> {
    let config = Config::load()?;
    if matches!(action, TimerAction::Run) {
        return run_foreground(&config);
    }

    // Time that passed since the last invocation comes first, so a session
    // that already ran out is completed before the command is applied.
    let (mut controller, caught_up) = resume(&config)?;

    let outcome = match action {
        TimerAction::Start => controller.start(),
        TimerAction::Distract => controller.log_distraction(),
        TimerAction::Abandon => controller.abandon(),
        TimerAction::Finish => controller.finish(),
        TimerAction::Reset => controller.reset(),
        TimerAction::Status | TimerAction::Run => None,
    };
    park(&controller)?;

    if let Some(event) = caught_up {
        println!("{}", serde_json::to_string_pretty(&event)?);
    }
    match outcome {
        Some(event) => println!("{}", serde_json::to_string_pretty(&event)?),
        None => println!("{}", serde_json::to_string_pretty(&controller.snapshot())?),
    }
    Ok(())
}

fn run_foreground(config: &Config) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(foreground(config))
}

async fn foreground(config: &Config) -> Result<()> {
    let (controller, caught_up) = resume(config)?;
    let (mut runner, mut events) = SessionRunner::new(
        controller,
        Duration::from_millis(config.timer.tick_interval_ms),
    );
    if let Some(event) = caught_up {
        render(&event)?;
    }
    if runner.resume().await {
        eprintln!("resuming the session in progress");
    }

    eprintln!("[enter] start  [d] distraction  [a] abandon  [f] finish  [r] reset  [q] quit");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match line.trim().to_ascii_lowercase().as_str() {
                    "" | "s" => {
                        if runner.start().await.is_none() {
                            eprintln!("a session is already in progress; press r after it ends");
                        }
                    }
                    "d" => {
                        runner.log_distraction().await;
                    }
                    "a" => {
                        runner.abandon().await;
                    }
                    "f" => {
                        runner.finish().await;
                    }
                    "r" => {
                        runner.reset().await;
                    }
                    "q" => break,
                    other => eprintln!("unknown key: {other}"),
                }
                park_shared(&runner).await?;
            }
            Some(event) = events.recv() => render(&event)?,
        }
    }

    // Events queued by the last command are still shown.
    while let Ok(event) = events.try_recv() {
        render(&event)?;
    }

    let controller = runner.controller();
    let guard = controller.lock().await;
    park(&guard)?;
    if guard.state() == SessionState::Running {
        eprintln!("\nsession parked; it keeps counting down (see `pomofocus timer status`)");
    }
    Ok(())
}

async fn park_shared(runner: &SessionRunner<ParkedStore>) -> Result<()> {
    let controller = runner.controller();
    let guard = controller.lock().await;
    park(&guard)
}

fn render(event: &Event) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    match event {
        Event::StateSnapshot {
            remaining_secs,
            distraction_count,
            ..
        } => {
            write!(
                stdout,
                "\r{:02}:{:02}  distractions: {}   ",
                remaining_secs / 60,
                remaining_secs % 60,
                distraction_count
            )?;
        }
        other => {
            writeln!(stdout, "\n{}", serde_json::to_string(other)?)?;
            if let Some(line) = summary(other) {
                writeln!(stdout, "{line}")?;
            }
            if matches!(other, Event::SessionCompleted { .. }) {
                // Terminal bell.
                write!(stdout, "\x07")?;
            }
        }
    }
    stdout.flush()?;
    Ok(())
}

/// One-line outcome shown when a session ends.
fn summary(event: &Event) -> Option<String> {
    match event {
        Event::SessionCompleted {
            distraction_count, ..
        }
        | Event::SessionFinished {
            distraction_count, ..
        } => Some(match distraction_count {
            0 => "You completed the session without distractions.".to_string(),
            1 => "You completed the session with 1 distraction.".to_string(),
            n => format!("You completed the session with {n} distractions."),
        }),
        Event::SessionAbandoned { .. } => Some("The session was abandoned.".to_string()),
        _ => None,
    }
}
