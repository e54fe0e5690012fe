//! Participant registry
//!
//! Owns the uniqueness and liveness state of the room. Compound operations
//! (check-then-insert, re-check-then-evict) run while holding the registry
//! gate; see [`ParticipantRegistry::lock`].

use std::sync::Arc;

use regex::Regex;
use tokio::sync::{Mutex, MutexGuard};

use super::clock::Clock;
use crate::common::{ChatError, ChatResult, Participant};
use crate::storage::ParticipantRepository;

pub const DEFAULT_MAX_NAME_LEN: usize = 32;

/// Rejects control and invisible formatting characters.
pub const DEFAULT_NAME_PATTERN: &str = r"^[^\p{Cc}\p{Cf}]+$";

/// Shape check applied to names before registration
#[derive(Debug, Clone)]
pub struct NamePolicy {
    max_len: usize,
    pattern: Regex,
}

impl NamePolicy {
    pub fn new(max_len: usize, pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            max_len,
            pattern: Regex::new(pattern)?,
        })
    }

    /// Trim and validate a raw name, returning the canonical form.
    pub fn normalize(&self, raw: &str) -> ChatResult<String> {
        let name = raw.trim();
        if name.is_empty() {
            return Err(ChatError::InvalidName("name must not be empty".into()));
        }
        if name.chars().count() > self.max_len {
            return Err(ChatError::InvalidName(format!(
                "name longer than {} characters",
                self.max_len
            )));
        }
        if !self.pattern.is_match(name) {
            return Err(ChatError::InvalidName(format!(
                "name `{}` contains forbidden characters",
                name.escape_debug()
            )));
        }
        Ok(name.to_string())
    }
}

/// Registry of active participants
pub struct ParticipantRegistry {
    repo: Arc<dyn ParticipantRepository>,
    clock: Arc<dyn Clock>,
    policy: NamePolicy,
    gate: Mutex<()>,
}

impl ParticipantRegistry {
    pub fn new(
        repo: Arc<dyn ParticipantRepository>,
        clock: Arc<dyn Clock>,
        policy: NamePolicy,
    ) -> Self {
        Self {
            repo,
            clock,
            policy,
            gate: Mutex::new(()),
        }
    }

    /// Enter the registry critical section.
    ///
    /// Every mutation goes through the returned guard, so registrations,
    /// heartbeats and evictions are serialized against each other. Guard
    /// methods are synchronous: nothing inside the section awaits, so
    /// dropping a caller's future cannot interrupt a compound operation.
    /// Storage calls made under the guard block the current tokio worker
    /// until the backend returns.
    pub async fn lock(&self) -> RegistryGuard<'_> {
        RegistryGuard {
            registry: self,
            _gate: self.gate.lock().await,
        }
    }

    pub async fn register(&self, name: &str) -> ChatResult<Participant> {
        self.lock().await.register(name)
    }

    pub async fn heartbeat(&self, name: &str) -> ChatResult<Participant> {
        self.lock().await.heartbeat(name)
    }

    pub async fn evict(&self, name: &str) -> ChatResult<Participant> {
        self.lock().await.evict(name)
    }

    pub fn exists(&self, name: &str) -> ChatResult<bool> {
        Ok(self.repo.find_participant(name)?.is_some())
    }

    pub fn find(&self, name: &str) -> ChatResult<Option<Participant>> {
        Ok(self.repo.find_participant(name)?)
    }

    /// Snapshot of the active participants, ordered by name
    pub fn list_active(&self) -> ChatResult<Vec<Participant>> {
        Ok(self.repo.list_participants()?)
    }
}

/// Exclusive access to the registry. See [`ParticipantRegistry::lock`].
pub struct RegistryGuard<'a> {
    registry: &'a ParticipantRegistry,
    _gate: MutexGuard<'a, ()>,
}

impl RegistryGuard<'_> {
    fn repo(&self) -> &dyn ParticipantRepository {
        self.registry.repo.as_ref()
    }

    /// Validate, check uniqueness and insert with `last_seen = now`.
    pub fn register(&self, name: &str) -> ChatResult<Participant> {
        let name = self.registry.policy.normalize(name)?;

        if self.repo().find_participant(&name)?.is_some() {
            return Err(ChatError::DuplicateName(name));
        }

        let participant = Participant::new(name, self.registry.clock.now());
        self.repo().insert_participant(&participant)?;
        log::info!("Participant registered: {}", participant.name);
        Ok(participant)
    }

    /// Refresh `last_seen`; returns the updated participant.
    pub fn heartbeat(&self, name: &str) -> ChatResult<Participant> {
        let now = self.registry.clock.now();
        if !self.repo().touch_participant(name, now)? {
            return Err(ChatError::NotFound(name.to_string()));
        }
        log::debug!("Heartbeat from {name}");
        Ok(Participant::new(name, now))
    }

    pub fn evict(&self, name: &str) -> ChatResult<Participant> {
        let participant = self
            .repo()
            .find_participant(name)?
            .ok_or_else(|| ChatError::NotFound(name.to_string()))?;

        if !self.repo().delete_participant(name)? {
            return Err(ChatError::NotFound(name.to_string()));
        }
        Ok(participant)
    }

    pub fn find(&self, name: &str) -> ChatResult<Option<Participant>> {
        Ok(self.repo().find_participant(name)?)
    }
}
