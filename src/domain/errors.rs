//! Error types for queue operations and the collection boundary

use thiserror::Error;

use super::queue_item::ItemId;

/// Failures surfaced by a document collection.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Document serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Unsupported filter: {0}")]
    UnsupportedFilter(String),

    #[error("Collection backend failure: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn invalid_document(reason: impl Into<String>) -> Self {
        Self::InvalidDocument(reason.into())
    }

    pub fn unsupported_filter(reason: impl Into<String>) -> Self {
        Self::UnsupportedFilter(reason.into())
    }

    pub fn backend(reason: impl Into<String>) -> Self {
        Self::Backend(reason.into())
    }
}

/// Coarse classification callers can branch on without matching messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    Duplicate,
    NotFound,
    StoreFailure,
}

/// Errors returned by [`crate::application::QueueStore`].
#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Resource already exists in queue: {url}")]
    Duplicate { url: String },

    #[error("No queue item found with id {id}")]
    NotFound { id: ItemId },

    #[error("Store failure: {0}")]
    Store(#[from] StoreError),
}

impl QueueError {
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::InvalidArgument(reason.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::Duplicate { .. } => ErrorKind::Duplicate,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Store(_) => ErrorKind::StoreFailure,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        self.kind() == ErrorKind::Duplicate
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

impl From<serde_json::Error> for QueueError {
    fn from(error: serde_json::Error) -> Self {
        Self::Store(StoreError::Serialization(error))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
pub type QueueResult<T> = Result<T, QueueError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_classify_every_variant() {
        assert_eq!(QueueError::invalid_argument("bad").kind(), ErrorKind::InvalidArgument);
        assert!(QueueError::Duplicate { url: "http://example.com/".into() }.is_duplicate());
        assert!(QueueError::NotFound { id: ItemId(3) }.is_not_found());
        assert_eq!(
            QueueError::from(StoreError::backend("offline")).kind(),
            ErrorKind::StoreFailure
        );
    }

    #[test]
    fn messages_name_the_offending_value() {
        let duplicate = QueueError::Duplicate { url: "http://example.com/".into() };
        assert_eq!(duplicate.to_string(), "Resource already exists in queue: http://example.com/");
        assert_eq!(
            QueueError::NotFound { id: ItemId(0) }.to_string(),
            "No queue item found with id 0"
        );
    }
}
