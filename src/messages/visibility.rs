use crate::common::{Message, MessageKind};

/// Decide whether `viewer` may see `message`.
///
/// Broadcast-kind messages are visible to everyone even when `to` names a
/// single participant. Only direct and status messages honour `to`.
pub fn is_visible(viewer: &str, message: &Message) -> bool {
    message.to == viewer
        || message.from == viewer
        || message.is_broadcast()
        || message.kind == MessageKind::BroadcastChat
}
