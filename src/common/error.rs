use thiserror::Error;

/// Failure of the backing storage. Opaque to callers; never retried here.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("storage lock poisoned")]
    Poisoned,
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Error type shared by the registry, the message store and the room.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("invalid name: {0}")]
    InvalidName(String),
    #[error("name already in use: {0}")]
    DuplicateName(String),
    #[error("participant not found: {0}")]
    NotFound(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type ChatResult<T> = Result<T, ChatError>;
