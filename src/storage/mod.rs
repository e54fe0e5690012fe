pub mod memory;
pub mod models;
pub mod sqlite;

pub use memory::MemoryStorage;
pub use sqlite::SqliteStorage;

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};

use crate::common::{Message, Participant, StoreError};

/// Durable storage for participants, keyed by name.
pub trait ParticipantRepository: Send + Sync {
    fn insert_participant(&self, participant: &Participant) -> Result<(), StoreError>;

    fn find_participant(&self, name: &str) -> Result<Option<Participant>, StoreError>;

    /// Set `last_seen`. Returns `false` when no participant has that name.
    fn touch_participant(&self, name: &str, last_seen: DateTime<Utc>) -> Result<bool, StoreError>;

    /// Returns `false` when no participant has that name.
    fn delete_participant(&self, name: &str) -> Result<bool, StoreError>;

    /// All participants ordered by name.
    fn list_participants(&self) -> Result<Vec<Participant>, StoreError>;
}

/// Append-only message log.
pub trait MessageRepository: Send + Sync {
    fn insert_message(&self, message: &Message) -> Result<(), StoreError>;

    /// Every message, in insertion order.
    fn list_messages(&self) -> Result<Vec<Message>, StoreError>;
}

/// Ensure the parent directory of a database file exists
pub fn ensure_data_dir(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
