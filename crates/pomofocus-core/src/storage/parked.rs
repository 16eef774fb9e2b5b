//! The live session, parked in the kv table between invocations.
//!
//! [`ParkedStore`] is a [`SessionSink`] over [`Database`] that writes the
//! machine state and the record it hands out in one transaction, so a stored
//! record and the state that marks it as saved never disagree. Every process
//! that drives the timer goes through the same parked state.

use tracing::warn;

use crate::error::DatabaseError;
use crate::session::{NewSession, Session};
use crate::timer::SessionMachine;

use super::database::Database;
use super::traits::SessionSink;

/// kv key holding the parked [`SessionMachine`].
pub const MACHINE_KEY: &str = "session_machine";

pub struct ParkedStore {
    db: Database,
}

impl ParkedStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    /// The parked machine, if any. An unreadable entry is logged and treated
    /// as absent.
    ///
    /// # Errors
    /// Returns an error if the kv table cannot be read.
    pub fn load_machine(&self) -> Result<Option<SessionMachine>, DatabaseError> {
        load(&self.db)
    }

    /// Park `machine`, replacing whatever was parked before.
    ///
    /// # Errors
    /// Returns an error if the kv write fails.
    pub fn save_machine(&self, machine: &SessionMachine) -> Result<(), DatabaseError> {
        save(&self.db, machine)
    }
}

fn load(db: &Database) -> Result<Option<SessionMachine>, DatabaseError> {
    let Some(json) = db.kv_get(MACHINE_KEY)? else {
        return Ok(None);
    };
    match serde_json::from_str(&json) {
        Ok(machine) => Ok(Some(machine)),
        Err(e) => {
            warn!(error = %e, "discarding unreadable timer state");
            Ok(None)
        }
    }
}

fn save(db: &Database, machine: &SessionMachine) -> Result<(), DatabaseError> {
    let json =
        serde_json::to_string(machine).map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
    db.kv_set(MACHINE_KEY, &json)
}

impl SessionSink for ParkedStore {
    fn insert_session(&self, record: &NewSession) -> Result<Session, DatabaseError> {
        self.db.insert_session(record)
    }

    fn commit_session(
        &self,
        machine: &SessionMachine,
        record: &NewSession,
    ) -> Result<Session, DatabaseError> {
        self.db.transaction(|db| {
            // Another process may have recorded this session since we loaded it.
            if let Some(started_at) = machine.started_at() {
                let stored = load(db)?;
                if stored.is_some_and(|s| s.is_saved() && s.started_at() == Some(started_at)) {
                    return Err(DatabaseError::AlreadyRecorded { started_at });
                }
            }
            save(db, machine)?;
            db.insert_session(record)
        })
    }
}
