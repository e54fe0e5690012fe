//! HTTP handlers for the chat API

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};

use super::error::ApiError;
use super::models::{
    MessageResponse, MessagesQuery, ParticipantResponse, RegisterRequest, SendMessageRequest,
};
use crate::common::ChatError;
use crate::room::ChatRoom;

/// Header carrying the caller's participant name
pub const USER_HEADER: &str = "user";

/// Read the `User` header. Raw UTF-8 is accepted since names are not ASCII-only.
fn user_from_headers(headers: &HeaderMap) -> Result<String, ApiError> {
    let value = headers
        .get(USER_HEADER)
        .ok_or_else(|| ChatError::InvalidName("missing `User` header".into()))?;

    let name = std::str::from_utf8(value.as_bytes())
        .map_err(|_| ChatError::InvalidName("`User` header is not valid UTF-8".into()))?;
    Ok(name.trim().to_string())
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ChatError::Validation(rejection.body_text()).into())
}

/// POST /participants
pub async fn register(
    State(room): State<Arc<ChatRoom>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let request = json_body(payload)?;
    room.register(&request.name).await?;
    Ok(StatusCode::CREATED)
}

/// GET /participants
pub async fn list_participants(
    State(room): State<Arc<ChatRoom>>,
) -> Result<Json<Vec<ParticipantResponse>>, ApiError> {
    let participants = room.list_participants()?;
    Ok(Json(participants.iter().map(ParticipantResponse::from).collect()))
}

/// POST /messages
pub async fn send_message(
    State(room): State<Arc<ChatRoom>>,
    headers: HeaderMap,
    payload: Result<Json<SendMessageRequest>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let from = user_from_headers(&headers)?;
    let request = json_body(payload)?;
    room.send_message(&from, &request.to, &request.text, &request.kind)
        .await?;
    Ok(StatusCode::CREATED)
}

/// GET /messages?limit=N
pub async fn list_messages(
    State(room): State<Arc<ChatRoom>>,
    headers: HeaderMap,
    Query(query): Query<MessagesQuery>,
) -> Result<Json<Vec<MessageResponse>>, ApiError> {
    let viewer = user_from_headers(&headers)?;
    let limit = match query.limit.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(raw.parse::<i64>().map_err(|_| {
            ChatError::Validation(format!("limit `{raw}` is not an integer"))
        })?),
    };

    let messages = room.list_visible_messages(&viewer, limit)?;
    Ok(Json(messages.iter().map(MessageResponse::from).collect()))
}

/// GET /messages/all
pub async fn list_all_messages(
    State(room): State<Arc<ChatRoom>>,
) -> Result<Json<Vec<MessageResponse>>, ApiError> {
    let messages = room.list_all_messages()?;
    Ok(Json(messages.iter().map(MessageResponse::from).collect()))
}

/// POST /status
pub async fn heartbeat(
    State(room): State<Arc<ChatRoom>>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let name = user_from_headers(&headers)?;
    room.heartbeat(&name).await?;
    Ok(StatusCode::OK)
}
