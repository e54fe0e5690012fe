//! Shared-room chat relay.
//!
//! Participants register a unique name, exchange broadcast and private
//! messages, and are evicted by the presence sweeper once they stop sending
//! heartbeats.

pub mod api;
pub mod common;
pub mod config;
pub mod messages;
pub mod presence;
pub mod room;
pub mod storage;

pub use common::{BROADCAST_TARGET, ChatError, ChatResult, Message, MessageKind, Participant};
pub use room::ChatRoom;
