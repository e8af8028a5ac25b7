//! SQLite-based session storage.
//!
//! Provides persistent storage for:
//! - Finished Pomodoro sessions (append-only)
//! - Key-value store for application state (the CLI keeps its timer here)

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use tracing::{debug, warn};
use uuid::Uuid;

use super::data_dir;
use super::store::{SessionRecord, SessionStore};
use crate::error::{CoreError, DatabaseError};
use crate::timer::SessionType;

/// SQLite database for session storage.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the database at `<data_dir>/pomobar.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the data directory cannot be prepared or the
    /// database cannot be opened or migrated.
    pub fn open() -> Result<Self, CoreError> {
        let path = data_dir()?.join("pomobar.db");
        Ok(Self::open_at(&path)?)
    }

    /// Open (or create) a database file at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self, DatabaseError> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        debug!(path = %path.display(), "session database opened");
        Ok(db)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), rusqlite::Error> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS sessions (
                id            TEXT PRIMARY KEY,
                session_type  TEXT NOT NULL,
                start_time    TEXT NOT NULL,
                end_time      TEXT NOT NULL,
                duration_secs REAL NOT NULL,
                completed     INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_sessions_start_time ON sessions(start_time);",
        )?;
        Ok(())
    }

    /// Append a finished session.
    pub fn record_session(&self, record: &SessionRecord) -> Result<(), DatabaseError> {
        self.conn.execute(
            "INSERT INTO sessions (id, session_type, start_time, end_time, duration_secs, completed)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.id.to_string(),
                record.session_type.as_str(),
                record.start_time.to_rfc3339(),
                record.end_time.to_rfc3339(),
                record.duration_secs,
                record.completed,
            ],
        )?;
        Ok(())
    }

    /// All sessions, oldest first. Rows that cannot be decoded are logged
    /// and skipped.
    pub fn sessions(&self) -> Result<Vec<SessionRecord>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, session_type, start_time, end_time, duration_secs, completed
             FROM sessions
             ORDER BY start_time",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(RawSession {
                id: row.get(0)?,
                session_type: row.get(1)?,
                start_time: row.get(2)?,
                end_time: row.get(3)?,
                duration_secs: row.get(4)?,
                completed: row.get(5)?,
            })
        })?;

        let mut sessions = Vec::new();
        for row in rows {
            match row?.decode() {
                Ok(session) => sessions.push(session),
                Err(e) => warn!(error = %e, "skipping unreadable session row"),
            }
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
}

impl SessionStore for Database {
    fn append(&mut self, record: &SessionRecord) -> Result<(), DatabaseError> {
        self.record_session(record)
    }

    fn query_all(&self) -> Result<Vec<SessionRecord>, DatabaseError> {
        self.sessions()
    }
}

struct RawSession {
    id: String,
    session_type: String,
    start_time: String,
    end_time: String,
    duration_secs: f64,
    completed: bool,
}

impl RawSession {
    fn decode(self) -> Result<SessionRecord, DatabaseError> {
        let corrupt = |message: String| DatabaseError::CorruptRow {
            id: self.id.clone(),
            message,
        };
        let id = Uuid::parse_str(&self.id).map_err(|e| corrupt(e.to_string()))?;
        let session_type = self.session_type.parse::<SessionType>().map_err(corrupt)?;
        let start_time = parse_time(&self.start_time).map_err(corrupt)?;
        let end_time = parse_time(&self.end_time).map_err(corrupt)?;
        Ok(SessionRecord {
            id,
            start_time,
            end_time,
            duration_secs: self.duration_secs,
            session_type,
            completed: self.completed,
        })
    }
}

fn parse_time(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| format!("invalid timestamp '{raw}': {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_and_query() {
        let db = Database::open_memory().unwrap();
        let now = Utc::now();
        let record = SessionRecord::completed(
            SessionType::Work,
            now - chrono::Duration::minutes(25),
            now,
            1_500.0,
        );
        db.record_session(&record).unwrap();

        let sessions = db.sessions().unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].id, record.id);
        assert_eq!(sessions[0].session_type, SessionType::Work);
        assert_eq!(sessions[0].duration_secs, 1_500.0);
        assert!(sessions[0].completed);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let db = Database::open_memory().unwrap();
        let now = Utc::now();
        let record = SessionRecord::completed(SessionType::Work, now, now, 60.0);
        db.record_session(&record).unwrap();
        assert!(db.record_session(&record).is_err());
    }

    #[test]
    fn corrupt_rows_are_skipped() {
        let db = Database::open_memory().unwrap();
        let now = Utc::now();
        let good = SessionRecord::completed(SessionType::Work, now, now, 1_500.0);
        db.record_session(&good).unwrap();
        db.conn
            .execute(
                "INSERT INTO sessions VALUES ('not-a-uuid', 'work', 'x', 'y', 1.0, 1)",
                [],
            )
            .unwrap();
        db.conn
            .execute(
                "INSERT INTO sessions VALUES (?1, 'nap', ?2, ?2, 1.0, 1)",
                params![Uuid::new_v4().to_string(), now.to_rfc3339()],
            )
            .unwrap();

        let sessions = db.sessions().unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].id, good.id);
    }

    #[test]
    fn decode_reports_the_bad_field() {
        let raw = RawSession {
            id: Uuid::new_v4().to_string(),
            session_type: "work".into(),
            start_time: "yesterday".into(),
            end_time: Utc::now().to_rfc3339(),
            duration_secs: 60.0,
            completed: true,
        };
        match raw.decode() {
            Err(DatabaseError::CorruptRow { message, .. }) => {
                assert!(message.contains("yesterday"))
            }
            other => panic!("expected a corrupt row, got {other:?}"),
        }
    }

    #[test]
    fn kv_store() {
        let db = Database::open_memory().unwrap();
        assert!(db.kv_get("test").unwrap().is_none());
        db.kv_set("test", "hello").unwrap();
        assert_eq!(db.kv_get("test").unwrap().unwrap(), "hello");
    }

    #[test]
    fn reopening_a_file_keeps_sessions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pomobar.db");
        let now = Utc::now();
        {
            let mut db = Database::open_at(&path).unwrap();
            db.append(&SessionRecord::completed(SessionType::Work, now, now, 60.0))
                .unwrap();
        }
        let db = Database::open_at(&path).unwrap();
        assert_eq!(db.query_all().unwrap().len(), 1);
    }
}
