//! Collaborator seams between the session core and whatever stores sessions.

use std::sync::Arc;

use crate::error::DatabaseError;
use crate::session::{NewSession, Session};
use crate::timer::SessionMachine;

/// Persistence seam: insert one finished session.
///
/// No update or delete path exists; a record is written once and never
/// touched again.
pub trait SessionSink {
    fn insert_session(&self, record: &NewSession) -> Result<Session, DatabaseError>;

    /// Store the record handed out by `machine`'s latest transition.
    ///
    /// Sinks that also keep the live machine override this to write both in
    /// one step; the default only inserts the record.
    fn commit_session(
        &self,
        machine: &SessionMachine,
        record: &NewSession,
    ) -> Result<Session, DatabaseError> {
        let _ = machine;
        self.insert_session(record)
    }
}

/// Retrieval seam: the full session history, newest `created_at` first.
pub trait SessionSource {
    fn list_sessions(&self) -> Result<Vec<Session>, DatabaseError>;
}

impl<T: SessionSink + ?Sized> SessionSink for Arc<T> {
    fn insert_session(&self, record: &NewSession) -> Result<Session, DatabaseError> {
        (**self).insert_session(record)
    }

    fn commit_session(
        &self,
        machine: &SessionMachine,
        record: &NewSession,
    ) -> Result<Session, DatabaseError> {
        (**self).commit_session(machine, record)
    }
}

impl<T: SessionSource + ?Sized> SessionSource for Arc<T> {
    fn list_sessions(&self) -> Result<Vec<Session>, DatabaseError> {
        (**self).list_sessions()
    }
}

impl<T: SessionSink + ?Sized> SessionSink for &T {
    fn insert_session(&self, record: &NewSession) -> Result<Session, DatabaseError> {
        (**self).insert_session(record)
    }

    fn commit_session(
        &self,
        machine: &SessionMachine,
        record: &NewSession,
    ) -> Result<Session, DatabaseError> {
        (**self).commit_session(machine, record)
    }
}
