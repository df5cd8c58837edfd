//! Storage layer for the activity log.
//!
//! Provides a SQLite [`LogBackend`] using `rusqlite`.
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! The backend is implemented for `&Database` as well, so the three per-tool
//! stores of one process can share a single connection.
//!
//! # Schema
//!
//! All tools share the `activity_logs` table, keyed by the tool's storage key
//! in `kind`. Timestamps are epoch milliseconds. The `seq` column records
//! insertion order; upserts keep the original `seq`, so a completed entry stays
//! where it was first appended.
//!
//! The `data` column stores the tool-specific payload as JSON. When evolving
//! payloads, add fields with defaults; renames break old rows.

use std::path::Path;

use cradle_core::{LogBackend, LogRecord, ToolKind};
use rusqlite::{Connection, params};
use thiserror::Error;

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// A row carries a kind no tool uses.
    #[error("unknown log kind {kind} in row {id}")]
    UnknownKind { id: String, kind: String },
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("path", &self.conn.path())
            .finish()
    }
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database, for tests.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS activity_logs (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                kind TEXT NOT NULL,
                timestamp_ms INTEGER NOT NULL,
                end_time_ms INTEGER,
                duration_seconds INTEGER,
                duration_minutes INTEGER,
                subject_id TEXT,
                data TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_activity_logs_kind ON activity_logs(kind, seq);
            ",
        )?;
        Ok(())
    }

    /// Lists every record of `kind` in insertion order.
    pub fn list_logs(&self, kind: ToolKind) -> Result<Vec<LogRecord>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT id, kind, timestamp_ms, end_time_ms, duration_seconds, duration_minutes, subject_id, data
            FROM activity_logs
            WHERE kind = ?
            ORDER BY seq ASC
            ",
        )?;
        let rows = stmt.query_map([kind.storage_key()], |row| {
            Ok(RawRow {
                id: row.get(0)?,
                kind: row.get(1)?,
                timestamp_ms: row.get(2)?,
                end_time_ms: row.get(3)?,
                duration_seconds: row.get(4)?,
                duration_minutes: row.get(5)?,
                subject_id: row.get(6)?,
                data: row.get(7)?,
            })
        })?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?.into_record()?);
        }
        Ok(records)
    }

    /// Inserts a record, or replaces the stored one with the same ID in place.
    pub fn upsert_log(&self, record: &LogRecord) -> Result<(), DbError> {
        self.conn.execute(
            "
            INSERT INTO activity_logs
            (id, kind, timestamp_ms, end_time_ms, duration_seconds, duration_minutes, subject_id, data)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                kind = excluded.kind,
                timestamp_ms = excluded.timestamp_ms,
                end_time_ms = excluded.end_time_ms,
                duration_seconds = excluded.duration_seconds,
                duration_minutes = excluded.duration_minutes,
                subject_id = excluded.subject_id,
                data = excluded.data
            ",
            params![
                record.id,
                record.kind.storage_key(),
                record.timestamp_ms,
                record.end_time_ms,
                record.duration_seconds,
                record.duration_minutes,
                record.subject_id,
                record.data,
            ],
        )?;
        tracing::debug!(id = %record.id, kind = %record.kind, "log saved");
        Ok(())
    }

    /// Number of stored records per kind, in [`ToolKind::ALL`] order.
    pub fn count_by_kind(&self) -> Result<Vec<(ToolKind, i64)>, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT COUNT(*) FROM activity_logs WHERE kind = ?")?;
        let mut counts = Vec::with_capacity(ToolKind::ALL.len());
        for kind in ToolKind::ALL {
            let count: i64 = stmt.query_row([kind.storage_key()], |row| row.get(0))?;
            counts.push((kind, count));
        }
        Ok(counts)
    }

    /// Distinct subject IDs that own at least one record.
    pub fn list_subjects(&self) -> Result<Vec<String>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT DISTINCT subject_id FROM activity_logs
            WHERE subject_id IS NOT NULL
            ORDER BY subject_id ASC
            ",
        )?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        let mut subjects = Vec::new();
        for row in rows {
            subjects.push(row?);
        }
        Ok(subjects)
    }
}

struct RawRow {
    id: String,
    kind: String,
    timestamp_ms: i64,
    end_time_ms: Option<i64>,
    duration_seconds: Option<i64>,
    duration_minutes: Option<i64>,
    subject_id: Option<String>,
    data: String,
}

impl RawRow {
    fn into_record(self) -> Result<LogRecord, DbError> {
        let Some(kind) = ToolKind::from_storage_key(&self.kind) else {
            return Err(DbError::UnknownKind {
                id: self.id,
                kind: self.kind,
            });
        };
        Ok(LogRecord {
            id: self.id,
            kind,
            timestamp_ms: self.timestamp_ms,
            end_time_ms: self.end_time_ms,
            duration_seconds: self.duration_seconds,
            duration_minutes: self.duration_minutes,
            subject_id: self.subject_id,
            data: self.data,
        })
    }
}

impl LogBackend for &Database {
    type Error = DbError;

    fn load(&self, kind: ToolKind) -> Result<Vec<LogRecord>, Self::Error> {
        self.list_logs(kind)
    }

    fn save(&mut self, record: &LogRecord) -> Result<(), Self::Error> {
        self.upsert_log(record)
    }
}

impl LogBackend for Database {
    type Error = DbError;

    fn load(&self, kind: ToolKind) -> Result<Vec<LogRecord>, Self::Error> {
        self.list_logs(kind)
    }

    fn save(&mut self, record: &LogRecord) -> Result<(), Self::Error> {
        self.upsert_log(record)
    }
}
