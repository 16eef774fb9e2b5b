//! Session records.
//!
//! A [`NewSession`] is what the lifecycle controller emits when a focus
//! interval reaches a terminal outcome; a [`Session`] is the same record as
//! read back from the store, with its id and creation time attached.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Outcome of a focus session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Completed, either naturally or by finishing early.
    Clean,
    /// Terminated early by the user.
    Abandoned,
}

impl SessionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Clean => "clean",
            SessionStatus::Abandoned => "abandoned",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "clean" => Ok(SessionStatus::Clean),
            "abandoned" => Ok(SessionStatus::Abandoned),
            other => Err(format!("unknown session status: {other}")),
        }
    }
}

/// Insert payload for one finished session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSession {
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub status: SessionStatus,
    pub distraction_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distraction_timestamps: Option<Vec<DateTime<Utc>>>,
}

impl NewSession {
    /// Check the record invariants before it is written.
    ///
    /// # Errors
    /// Returns an error if `end_time` precedes `start_time` or the tracked
    /// timestamps disagree with `distraction_count`.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(end) = self.end_time {
            if end < self.start_time {
                return Err(ValidationError::InvalidTimeRange {
                    start: self.start_time,
                    end,
                });
            }
        }
        if let Some(ref timestamps) = self.distraction_timestamps {
            if timestamps.len() != self.distraction_count as usize {
                return Err(ValidationError::DistractionCountMismatch {
                    count: self.distraction_count,
                    timestamps: timestamps.len(),
                });
            }
        }
        Ok(())
    }
}

/// A persisted session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub status: SessionStatus,
    pub distraction_count: u32,
    #[serde(default)]
    pub distraction_timestamps: Option<Vec<DateTime<Utc>>>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Minutes between start and end; 0 while `end_time` is missing.
    pub fn focus_minutes(&self) -> f64 {
        match self.end_time {
            Some(end) => (end - self.start_time).num_milliseconds() as f64 / 60_000.0,
            None => 0.0,
        }
    }

    /// Offset of each recorded distraction from `start_time`, in minutes.
    ///
    /// Timestamps outside `[start_time, end_time]` are skipped.
    pub fn distraction_offsets_minutes(&self) -> Vec<f64> {
        let duration = self.focus_minutes();
        self.distraction_timestamps
            .iter()
            .flatten()
            .map(|ts| (*ts - self.start_time).num_milliseconds() as f64 / 60_000.0)
            .filter(|offset| *offset >= 0.0 && *offset <= duration)
            .collect()
    }
}
