use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Result as SqlResult, params};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use super::models::{message_from_row, participant_from_row, to_millis};
use super::{MessageRepository, ParticipantRepository, ensure_data_dir};
use crate::common::{Message, Participant, StoreError};

/// How long a write waits on another connection's lock before failing
const BUSY_TIMEOUT: Duration = Duration::from_millis(250);

/// SQLite-backed storage for participants and messages.
///
/// Calls are synchronous and run on the caller's thread. The room invokes
/// them from async tasks while holding the registry gate, so a slow disk
/// stalls that tokio worker and every other registry operation.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Open (or create) a database file, creating its directory if needed
    pub fn with_path<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();
        ensure_data_dir(path).map_err(|err| {
            StoreError::Unavailable(format!("cannot create {}: {err}", path.display()))
        })?;
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Self::from_connection(conn)
    }

    /// Private in-memory database (tests, throwaway runs)
    pub fn in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Number of stored messages, notices included
    pub fn message_count(&self) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))?;
        usize::try_from(count)
            .map_err(|_| StoreError::Unavailable(format!("invalid message count {count}")))
    }
}

fn init_schema(conn: &Connection) -> SqlResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS participants (
            name TEXT PRIMARY KEY,
            last_seen INTEGER NOT NULL
        )",
        [],
    )?;

    // seq preserves insertion order independent of clock resolution
    conn.execute(
        "CREATE TABLE IF NOT EXISTS messages (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT NOT NULL UNIQUE,
            sender TEXT NOT NULL,
            recipient TEXT NOT NULL,
            text TEXT NOT NULL,
            kind TEXT NOT NULL,
            created_at INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_participants_last_seen ON participants(last_seen)",
        [],
    )?;

    Ok(())
}

impl ParticipantRepository for SqliteStorage {
    fn insert_participant(&self, participant: &Participant) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO participants (name, last_seen) VALUES (?1, ?2)",
            params![participant.name, to_millis(participant.last_seen)],
        )?;
        Ok(())
    }

    fn find_participant(&self, name: &str) -> Result<Option<Participant>, StoreError> {
        let conn = self.lock()?;
        let participant = conn
            .query_row(
                "SELECT name, last_seen FROM participants WHERE name = ?1",
                params![name],
                participant_from_row,
            )
            .optional()?;
        Ok(participant)
    }

    fn touch_participant(&self, name: &str, last_seen: DateTime<Utc>) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE participants SET last_seen = ?1 WHERE name = ?2",
            params![to_millis(last_seen), name],
        )?;
        Ok(changed > 0)
    }

    fn delete_participant(&self, name: &str) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        let changed = conn.execute("DELETE FROM participants WHERE name = ?1", params![name])?;
        Ok(changed > 0)
    }

    fn list_participants(&self) -> Result<Vec<Participant>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT name, last_seen FROM participants ORDER BY name ASC")?;

        let participants = stmt
            .query_map([], participant_from_row)?
            .collect::<SqlResult<Vec<_>>>()?;

        Ok(participants)
    }
}

impl MessageRepository for SqliteStorage {
    fn insert_message(&self, message: &Message) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO messages (id, sender, recipient, text, kind, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                message.id,
                message.from,
                message.to,
                message.text,
                message.kind.as_str(),
                to_millis(message.created_at)
            ],
        )?;
        Ok(())
    }

    fn list_messages(&self) -> Result<Vec<Message>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, sender, recipient, text, kind, created_at
             FROM messages
             ORDER BY seq ASC",
        )?;

        let messages = stmt
            .query_map([], message_from_row)?
            .collect::<SqlResult<Vec<_>>>()?;

        Ok(messages)
    }
}
