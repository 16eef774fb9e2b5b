mod clock;
mod controller;
mod engine;
mod runner;

pub use clock::{Clock, ManualClock, SystemClock};
pub use controller::SessionController;
pub use engine::{SessionMachine, SessionState, Transition, DEFAULT_FOCUS_SECS};
pub use runner::SessionRunner;
