//! Chat room service
//!
//! Wires the participant registry, the message store and the clock together
//! and exposes the operations the HTTP layer needs.

use std::sync::Arc;

use crate::common::{ChatError, ChatResult, Message, MessageKind, Participant};
use crate::messages::MessageStore;
use crate::presence::{Clock, NamePolicy, ParticipantRegistry, PresenceSweeper, SweeperConfig};
use crate::storage::{MessageRepository, ParticipantRepository};

pub struct ChatRoom {
    registry: Arc<ParticipantRegistry>,
    store: Arc<MessageStore>,
    clock: Arc<dyn Clock>,
}

impl ChatRoom {
    pub fn new(
        registry: Arc<ParticipantRegistry>,
        store: Arc<MessageStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            registry,
            store,
            clock,
        }
    }

    /// Build a room whose participants and messages live in one storage backend.
    pub fn with_storage<S>(
        storage: Arc<S>,
        clock: Arc<dyn Clock>,
        policy: NamePolicy,
        default_limit: usize,
    ) -> Self
    where
        S: ParticipantRepository + MessageRepository + 'static,
    {
        let participants: Arc<dyn ParticipantRepository> = storage.clone();
        let messages: Arc<dyn MessageRepository> = storage;
        let registry = Arc::new(ParticipantRegistry::new(participants, clock.clone(), policy));
        let store = Arc::new(MessageStore::with_default_limit(messages, default_limit));
        Self::new(registry, store, clock)
    }

    pub fn registry(&self) -> &Arc<ParticipantRegistry> {
        &self.registry
    }

    /// Sweeper sharing this room's registry, store and clock
    pub fn sweeper(&self, config: SweeperConfig) -> PresenceSweeper {
        PresenceSweeper::new(
            self.registry.clone(),
            self.store.clone(),
            self.clock.clone(),
            config,
        )
    }

    /// Register a participant and announce the arrival.
    ///
    /// Insert and arrival notice happen in one registry critical section; if
    /// the notice cannot be stored the participant is removed again.
    pub async fn register(&self, name: &str) -> ChatResult<Participant> {
        let guard = self.registry.lock().await;
        let participant = guard.register(name)?;

        let arrival = Message::arrival(&participant.name, participant.last_seen);
        if let Err(err) = self.store.append(&arrival) {
            log::error!(
                "Arrival notice for {} not stored, rolling back: {err}",
                participant.name
            );
            if let Err(rollback_err) = guard.evict(&participant.name) {
                log::error!("Rollback of {} failed: {rollback_err}", participant.name);
            }
            return Err(err);
        }

        Ok(participant)
    }

    pub async fn heartbeat(&self, name: &str) -> ChatResult<()> {
        self.registry.heartbeat(name.trim()).await.map(|_| ())
    }

    /// Post a chat message. `kind` is the wire name (`message`, `private_message`).
    ///
    /// Sending counts as activity and refreshes the sender's `last_seen`.
    pub async fn send_message(
        &self,
        from: &str,
        to: &str,
        text: &str,
        kind: &str,
    ) -> ChatResult<Message> {
        let from = from.trim();
        let to = to.trim();
        let text = text.trim();

        if to.is_empty() {
            return Err(ChatError::Validation("`to` must not be empty".into()));
        }
        if text.is_empty() {
            return Err(ChatError::Validation("`text` must not be empty".into()));
        }
        let kind = match MessageKind::parse(kind.trim()) {
            Some(MessageKind::Status) => {
                return Err(ChatError::Validation(
                    "status messages are reserved for the server".into(),
                ));
            }
            Some(kind) => kind,
            None => {
                return Err(ChatError::Validation(format!("unknown message type `{kind}`")));
            }
        };

        let guard = self.registry.lock().await;
        let sender = guard.heartbeat(from)?;
        let message = Message::new(sender.name, to, text, kind, self.clock.now());
        self.store.append(&message)?;
        Ok(message)
    }

    pub fn list_participants(&self) -> ChatResult<Vec<Participant>> {
        self.registry.list_active()
    }

    pub fn list_visible_messages(&self, viewer: &str, limit: Option<i64>) -> ChatResult<Vec<Message>> {
        let viewer = viewer.trim();
        if viewer.is_empty() {
            return Err(ChatError::InvalidName("viewer name must not be empty".into()));
        }
        self.store.query_visible(viewer, limit)
    }

    pub fn list_all_messages(&self) -> ChatResult<Vec<Message>> {
        self.store.list_all()
    }
}
