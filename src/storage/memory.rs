use std::collections::BTreeMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use super::{MessageRepository, ParticipantRepository};
use crate::common::{Message, Participant, StoreError};

/// In-process storage; contents are lost on restart.
#[derive(Default)]
pub struct MemoryStorage {
    participants: RwLock<BTreeMap<String, DateTime<Utc>>>,
    messages: RwLock<Vec<Message>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ParticipantRepository for MemoryStorage {
    fn insert_participant(&self, participant: &Participant) -> Result<(), StoreError> {
        let mut participants = self.participants.write().map_err(|_| StoreError::Poisoned)?;
        if participants.contains_key(&participant.name) {
            return Err(StoreError::Unavailable(format!(
                "participant `{}` already stored",
                participant.name
            )));
        }
        participants.insert(participant.name.clone(), participant.last_seen);
        Ok(())
    }

    fn find_participant(&self, name: &str) -> Result<Option<Participant>, StoreError> {
        let participants = self.participants.read().map_err(|_| StoreError::Poisoned)?;
        Ok(participants
            .get(name)
            .map(|last_seen| Participant::new(name, *last_seen)))
    }

    fn touch_participant(&self, name: &str, last_seen: DateTime<Utc>) -> Result<bool, StoreError> {
        let mut participants = self.participants.write().map_err(|_| StoreError::Poisoned)?;
        match participants.get_mut(name) {
            Some(entry) => {
                *entry = last_seen;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn delete_participant(&self, name: &str) -> Result<bool, StoreError> {
        let mut participants = self.participants.write().map_err(|_| StoreError::Poisoned)?;
        Ok(participants.remove(name).is_some())
    }

    fn list_participants(&self) -> Result<Vec<Participant>, StoreError> {
        let participants = self.participants.read().map_err(|_| StoreError::Poisoned)?;
        Ok(participants
            .iter()
            .map(|(name, last_seen)| Participant::new(name.clone(), *last_seen))
            .collect())
    }
}

impl MessageRepository for MemoryStorage {
    fn insert_message(&self, message: &Message) -> Result<(), StoreError> {
        self.messages
            .write()
            .map_err(|_| StoreError::Poisoned)?
            .push(message.clone());
        Ok(())
    }

    fn list_messages(&self) -> Result<Vec<Message>, StoreError> {
        Ok(self.messages.read().map_err(|_| StoreError::Poisoned)?.clone())
    }
}
