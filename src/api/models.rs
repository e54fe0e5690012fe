//! Request/response bodies of the HTTP API

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

use crate::common::{Message, MessageKind, Participant};

/// Display format of message times
pub const TIME_FORMAT: &str = "%H:%M:%S";

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    #[serde(default)]
    pub to: String,
    #[serde(default)]
    pub text: String,
    #[serde(rename = "type", default)]
    pub kind: String,
}

#[derive(Debug, Deserialize)]
pub struct MessagesQuery {
    /// Kept as text so a malformed value maps to a validation error
    pub limit: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ParticipantResponse {
    pub name: String,
    /// Last heartbeat, epoch milliseconds
    #[serde(rename = "lastStatus")]
    pub last_status: i64,
}

impl From<&Participant> for ParticipantResponse {
    fn from(p: &Participant) -> Self {
        Self {
            name: p.name.clone(),
            last_status: p.last_seen.timestamp_millis(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub id: String,
    pub from: String,
    pub to: String,
    pub text: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub time: String,
}

impl From<&Message> for MessageResponse {
    fn from(m: &Message) -> Self {
        Self {
            id: m.id.clone(),
            from: m.from.clone(),
            to: m.to.clone(),
            text: m.text.clone(),
            kind: m.kind,
            time: format_time(m.created_at),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// `HH:mm:ss` in the server's local time zone
pub fn format_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format(TIME_FORMAT).to_string()
}
