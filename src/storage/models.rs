use chrono::{DateTime, Utc};
use rusqlite::Row;

use crate::common::{Message, MessageKind, Participant};

/// Instants are persisted as epoch milliseconds.
pub fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

pub fn from_millis(column: usize, millis: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(column, millis))
}

/// Map a `participants` row: `name, last_seen`
pub fn participant_from_row(row: &Row<'_>) -> rusqlite::Result<Participant> {
    Ok(Participant {
        name: row.get(0)?,
        last_seen: from_millis(1, row.get(1)?)?,
    })
}

/// Map a `messages` row: `id, sender, recipient, text, kind, created_at`
pub fn message_from_row(row: &Row<'_>) -> rusqlite::Result<Message> {
    let kind: String = row.get(4)?;
    let kind = MessageKind::parse(&kind).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            rusqlite::types::Type::Text,
            format!("unknown message kind `{kind}`").into(),
        )
    })?;

    Ok(Message {
        id: row.get(0)?,
        from: row.get(1)?,
        to: row.get(2)?,
        text: row.get(3)?,
        kind,
        created_at: from_millis(5, row.get(5)?)?,
    })
}
