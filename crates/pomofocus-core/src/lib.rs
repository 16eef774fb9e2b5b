//! # pomofocus core library
//!
//! Core logic for the pomofocus focus timer: one fixed-length focus session at
//! a time, distraction logging, early abandon or finish, persistence of each
//! finished session, and daily statistics over the stored history. The
//! `pomofocus` CLI is a thin layer over this crate.
//!
//! ## Architecture
//!
//! - **Timer**: a tick-driven session state machine ([`SessionMachine`]), a
//!   controller that stamps times and persists the outcome exactly once
//!   ([`SessionController`]), and a tokio countdown driver ([`SessionRunner`])
//! - **Storage**: SQLite session store and TOML configuration
//! - **Stats**: pure aggregation of sessions into per-day metrics
//!
//! ## Key Components
//!
//! - [`SessionController`]: session lifecycle with persistence
//! - [`Database`]: session history and key-value state
//! - [`DailyMetricsAnalyzer`]: today / yesterday / trailing-window metrics
//! - [`Config`]: application configuration management

pub mod error;
pub mod events;
pub mod session;
pub mod stats;
pub mod storage;
pub mod timer;

pub use error::{ConfigError, CoreError, DatabaseError, Result, ValidationError};
pub use events::Event;
pub use session::{NewSession, Session, SessionStatus};
pub use stats::{DailyMetrics, DailyMetricsAnalyzer, MetricsReport, WindowTotals};
pub use storage::{Config, Database, ParkedStore, SessionSink, SessionSource};
pub use timer::{
    Clock, ManualClock, SessionController, SessionMachine, SessionRunner, SessionState,
    SystemClock, DEFAULT_FOCUS_SECS,
};
