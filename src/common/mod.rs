pub mod error;
pub mod types;

pub use error::{ChatError, ChatResult, StoreError};
pub use types::{BROADCAST_TARGET, Message, MessageKind, Participant};
