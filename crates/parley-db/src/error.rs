use thiserror::Error;

pub type Result<T> = std::result::Result<T, DbError>;

#[derive(Debug, Error)]
pub enum DbError {
    /// A required field was missing or empty.
    #[error("{0}")]
    Validation(String),

    /// A reaction referenced a message that does not exist.
    #[error("message {0} not found")]
    NotFound(i64),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("database lock poisoned")]
    Poisoned,
}
