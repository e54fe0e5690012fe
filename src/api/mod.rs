//! HTTP API (axum)
//!
//! Thin adapter over [`ChatRoom`]: parses requests, maps `ChatError` kinds to
//! status codes, formats message times for display.

pub mod error;
pub mod handlers;
pub mod models;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};

use crate::room::ChatRoom;

pub use error::ApiError;

/// Create the API router
pub fn router(room: Arc<ChatRoom>) -> Router {
    Router::new()
        .route(
            "/participants",
            get(handlers::list_participants).post(handlers::register),
        )
        .route(
            "/messages",
            get(handlers::list_messages).post(handlers::send_message),
        )
        .route("/messages/all", get(handlers::list_all_messages))
        .route("/status", post(handlers::heartbeat))
        .with_state(room)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}
