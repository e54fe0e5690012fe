use std::sync::Arc;

use super::visibility::is_visible;
use crate::common::{ChatResult, Message};
use crate::storage::MessageRepository;

pub const DEFAULT_QUERY_LIMIT: usize = 100;

/// Append-only message log with visibility-aware queries
pub struct MessageStore {
    repo: Arc<dyn MessageRepository>,
    default_limit: usize,
}

impl MessageStore {
    pub fn new(repo: Arc<dyn MessageRepository>) -> Self {
        Self::with_default_limit(repo, DEFAULT_QUERY_LIMIT)
    }

    pub fn with_default_limit(repo: Arc<dyn MessageRepository>, default_limit: usize) -> Self {
        Self {
            repo,
            default_limit: default_limit.max(1),
        }
    }

    /// Append to the end of the log
    pub fn append(&self, message: &Message) -> ChatResult<()> {
        self.repo.insert_message(message)?;
        log::debug!(
            "Message appended: {} -> {} ({})",
            message.from,
            message.to,
            message.kind
        );
        Ok(())
    }

    /// The `limit` most recent messages visible to `viewer`, oldest first.
    ///
    /// `None` or a non-positive limit falls back to the default.
    pub fn query_visible(&self, viewer: &str, limit: Option<i64>) -> ChatResult<Vec<Message>> {
        let limit = self.effective_limit(limit);

        let mut visible: Vec<Message> = self
            .repo
            .list_messages()?
            .into_iter()
            .filter(|message| is_visible(viewer, message))
            .collect();

        let skip = visible.len().saturating_sub(limit);
        visible.drain(..skip);
        Ok(visible)
    }

    /// Unfiltered log in insertion order
    pub fn list_all(&self) -> ChatResult<Vec<Message>> {
        Ok(self.repo.list_messages()?)
    }

    fn effective_limit(&self, limit: Option<i64>) -> usize {
        match limit {
            Some(n) if n > 0 => usize::try_from(n).unwrap_or(usize::MAX),
            _ => self.default_limit,
        }
    }
}
