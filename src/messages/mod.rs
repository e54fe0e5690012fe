//! Message log and visibility rules
//!
//! `visibility::is_visible` is the single place that decides who can read a
//! message; `MessageStore::query_visible` is built on top of it.

pub mod store;
pub mod visibility;

pub use store::{DEFAULT_QUERY_LIMIT, MessageStore};
pub use visibility::is_visible;
