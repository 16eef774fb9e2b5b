mod config;
pub mod database;
pub mod migrations;
mod parked;
mod traits;

pub use config::{Config, LoggingConfig, StatsConfig, TimerConfig};
pub use database::Database;
pub use parked::{ParkedStore, MACHINE_KEY};
pub use traits::{SessionSink, SessionSource};

use std::path::PathBuf;

/// Returns the data directory, creating it if needed.
///
/// `POMOFOCUS_DATA_DIR` overrides the location outright. Otherwise this is
/// `~/.config/pomofocus[-dev]/`, with the `-dev` suffix when
/// `POMOFOCUS_ENV=dev`.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, std::io::Error> {
    let dir = match std::env::var_os("POMOFOCUS_DATA_DIR") {
        Some(explicit) if !explicit.is_empty() => PathBuf::from(explicit),
        _ => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");

            let env = std::env::var("POMOFOCUS_ENV").unwrap_or_else(|_| "production".to_string());

            if env == "dev" {
                base_dir.join("pomofocus-dev")
            } else {
                base_dir.join("pomofocus")
            }
        }
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
