use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Giá trị `to` đặc biệt: tin nhắn gửi cho cả phòng.
pub const BROADCAST_TARGET: &str = "Todos";

pub const ARRIVAL_TEXT: &str = "entra na sala...";
pub const DEPARTURE_TEXT: &str = "sai da sala...";

/// A participant currently present in the room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub name: String,
    pub last_seen: DateTime<Utc>,
}

impl Participant {
    pub fn new(name: impl Into<String>, last_seen: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            last_seen,
        }
    }
}

/// Message category. The serialized names are the ones spoken on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    #[serde(rename = "message")]
    BroadcastChat,
    #[serde(rename = "private_message")]
    DirectChat,
    #[serde(rename = "status")]
    Status,
}

impl MessageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::BroadcastChat => "message",
            MessageKind::DirectChat => "private_message",
            MessageKind::Status => "status",
        }
    }

    /// Parse a wire name. Returns `None` for anything unknown.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "message" => Some(MessageKind::BroadcastChat),
            "private_message" => Some(MessageKind::DirectChat),
            "status" => Some(MessageKind::Status),
            _ => None,
        }
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Domain model đại diện một tin nhắn chat.
///
/// Immutable once appended to the store; `created_at` is the comparable
/// instant, display formatting happens at the HTTP boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: String,
    pub from: String,
    pub to: String,
    pub text: String,
    pub kind: MessageKind,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        text: impl Into<String>,
        kind: MessageKind,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            from: from.into(),
            to: to.into(),
            text: text.into(),
            kind,
            created_at,
        }
    }

    pub fn arrival(name: &str, at: DateTime<Utc>) -> Self {
        Self::new(name, BROADCAST_TARGET, ARRIVAL_TEXT, MessageKind::Status, at)
    }

    pub fn departure(name: &str, at: DateTime<Utc>) -> Self {
        Self::new(name, BROADCAST_TARGET, DEPARTURE_TEXT, MessageKind::Status, at)
    }

    pub fn is_broadcast(&self) -> bool {
        self.to == BROADCAST_TARGET
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_wire_names() {
        for kind in [
            MessageKind::BroadcastChat,
            MessageKind::DirectChat,
            MessageKind::Status,
        ] {
            assert_eq!(MessageKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(MessageKind::parse("shout"), None);
        assert_eq!(
            serde_json::to_string(&MessageKind::DirectChat).unwrap(),
            "\"private_message\""
        );
    }

    #[test]
    fn test_status_messages_target_room() {
        let now = Utc::now();
        let arrival = Message::arrival("A", now);
        assert_eq!(arrival.kind, MessageKind::Status);
        assert_eq!(arrival.from, "A");
        assert!(arrival.is_broadcast());
        assert_ne!(arrival.id, Message::departure("A", now).id);
    }
}
