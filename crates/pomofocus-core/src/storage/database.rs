//! SQLite-based session storage.
//!
//! Provides persistent storage for:
//! - Finished focus sessions (insert-only)
//! - Key-value store for application state (the parked session engine)

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::session::{NewSession, Session, SessionStatus};

use super::data_dir;
use super::migrations;
use super::traits::{SessionSink, SessionSource};

/// Raw column values before decoding.
type SessionRow = (
    String,
    String,
    Option<String>,
    String,
    u32,
    Option<String>,
    String,
);

/// SQLite database for session storage.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Open the database at `<data_dir>/pomofocus.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, DatabaseError> {
        let path = data_dir()?.join("pomofocus.db");
        Self::open_at(&path)
    }

    /// Open (or create) the database at an explicit path.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open_at(path: &Path) -> Result<Self, DatabaseError> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        debug!(path = %path.display(), "database opened");
        Ok(db)
    }

    /// Open an in-memory database.
    ///
    /// # Errors
    /// Returns an error if the schema cannot be created.
    pub fn open_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory().map_err(|source| DatabaseError::OpenFailed {
            path: ":memory:".into(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), DatabaseError> {
        migrations::migrate(&self.conn).map_err(|e| DatabaseError::MigrationFailed(e.to_string()))
    }

    /// Insert a finished session with an explicit creation time.
    ///
    /// # Errors
    /// Returns an error if the record is invalid or the insert fails.
    pub fn insert_session_at(
        &self,
        record: &NewSession,
        created_at: DateTime<Utc>,
    ) -> Result<Session, DatabaseError> {
        record.validate()?;

        let id = Uuid::new_v4().to_string();
        let timestamps = record
            .distraction_timestamps
            .as_ref()
            .map(|list| {
                let encoded: Vec<String> = list.iter().map(|ts| encode_ts(*ts)).collect();
                serde_json::to_string(&encoded)
            })
            .transpose()
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        self.conn.execute(
            "INSERT INTO pomodoro_sessions
                (id, start_time, end_time, status, distraction_count, distraction_timestamps, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                id,
                encode_ts(record.start_time),
                record.end_time.map(encode_ts),
                record.status.as_str(),
                record.distraction_count,
                timestamps,
                encode_ts(created_at),
            ],
        )?;

        Ok(Session {
            id,
            start_time: record.start_time,
            end_time: record.end_time,
            status: record.status,
            distraction_count: record.distraction_count,
            distraction_timestamps: record.distraction_timestamps.clone(),
            created_at,
        })
    }

    /// Most recent sessions first, at most `limit` of them.
    ///
    /// # Errors
    /// Returns an error if the query fails or a row cannot be decoded.
    pub fn recent_sessions(&self, limit: usize) -> Result<Vec<Session>, DatabaseError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.query_sessions(
            "SELECT id, start_time, end_time, status, distraction_count, distraction_timestamps, created_at
             FROM pomodoro_sessions
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?1",
            params![limit],
        )
    }

    pub fn session_count(&self) -> Result<u64, DatabaseError> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM pomodoro_sessions", [], |row| {
                row.get::<_, i64>(0)
            })?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    fn query_sessions(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<Session>, DatabaseError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, u32>(4)?,
                row.get::<_, Option<String>>(5)?,
                row.get::<_, String>(6)?,
            ))
        })?;

        let mut sessions = Vec::new();
        for row in rows {
            sessions.push(decode_row(row?)?);
        }
        Ok(sessions)
    }

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, DatabaseError> {
        let mut stmt = self.conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
        let result = stmt.query_row(params![key], |row| row.get::<_, String>(0));
        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), DatabaseError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    /// Run `f` inside one SQLite transaction.
    ///
    /// Everything `f` writes through `self` commits together; an error from
    /// `f` rolls all of it back.
    ///
    /// # Errors
    /// Returns `f`'s error, or a database error if the transaction cannot be
    /// opened or committed.
    pub fn transaction<T, E>(&self, f: impl FnOnce(&Self) -> Result<T, E>) -> Result<T, E>
    where
        E: From<DatabaseError>,
    {
        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(DatabaseError::from)?;
        let value = f(self)?;
        tx.commit().map_err(DatabaseError::from)?;
        Ok(value)
    }
}

impl SessionSink for Database {
    fn insert_session(&self, record: &NewSession) -> Result<Session, DatabaseError> {
        self.insert_session_at(record, Utc::now())
    }
}

impl SessionSource for Database {
    fn list_sessions(&self) -> Result<Vec<Session>, DatabaseError> {
        self.query_sessions(
            "SELECT id, start_time, end_time, status, distraction_count, distraction_timestamps, created_at
             FROM pomodoro_sessions
             ORDER BY created_at DESC, rowid DESC",
            params![],
        )
    }
}

// Fixed-width so that text ordering matches time ordering.
fn encode_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_ts(id: &str, raw: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DatabaseError::CorruptRow {
            id: id.to_string(),
            message: format!("bad timestamp '{raw}': {e}"),
        })
}

fn decode_row(row: SessionRow) -> Result<Session, DatabaseError> {
    let (id, start, end, status, distraction_count, timestamps, created) = row;

    let status: SessionStatus = status.parse().map_err(|message| DatabaseError::CorruptRow {
        id: id.clone(),
        message,
    })?;

    let distraction_timestamps = match timestamps {
        Some(json) => {
            let raw: Vec<String> =
                serde_json::from_str(&json).map_err(|e| DatabaseError::CorruptRow {
                    id: id.clone(),
                    message: format!("bad distraction_timestamps: {e}"),
                })?;
            let parsed = raw
                .iter()
                .map(|ts| decode_ts(&id, ts))
                .collect::<Result<Vec<_>, _>>()?;
            if parsed.len() != distraction_count as usize {
                warn!(
                    id = %id,
                    distraction_count,
                    timestamps = parsed.len(),
                    "distraction count disagrees with stored timestamps"
                );
            }
            Some(parsed)
        }
        None => None,
    };

    Ok(Session {
        start_time: decode_ts(&id, &start)?,
        end_time: end.as_deref().map(|raw| decode_ts(&id, raw)).transpose()?,
        created_at: decode_ts(&id, &created)?,
        status,
        distraction_count,
        distraction_timestamps,
        id,
    })
}
