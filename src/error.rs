//! Error types shared across the crate.

use std::sync::Arc;

/// Failure of the underlying key-value backend.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("invalid stored json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("storage lock poisoned")]
    Poisoned,
    #[error("persistence worker unavailable: {0}")]
    Worker(String),
}

/// Failure surfaced by the flashcard store.
///
/// The persistence variants keep the messages shown to users; the cause is
/// shared so the error can be both returned and kept as the store's last error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("Could not load your flashcards. Working with default data.")]
    LoadFailed(#[source] Arc<StorageError>),
    #[error("Could not save your flashcards. Try again later.")]
    SaveFailed(#[source] Arc<StorageError>),
    #[error("Could not clear flashcard storage.")]
    ClearFailed(#[source] Arc<StorageError>),
    #[error("a deck with id '{0}' already exists")]
    DuplicateDeck(String),
    #[error("a card with id '{0}' already exists")]
    DuplicateCard(String),
    #[error("no deck with id '{0}'")]
    UnknownDeck(String),
}

impl StoreError {
    pub fn load(cause: StorageError) -> Self {
        StoreError::LoadFailed(Arc::new(cause))
    }

    pub fn save(cause: StorageError) -> Self {
        StoreError::SaveFailed(Arc::new(cause))
    }

    pub fn clear(cause: StorageError) -> Self {
        StoreError::ClearFailed(Arc::new(cause))
    }

    /// True for failures of the persistence layer, as opposed to rejected mutations.
    pub fn is_persistence(&self) -> bool {
        matches!(
            self,
            StoreError::LoadFailed(_) | StoreError::SaveFailed(_) | StoreError::ClearFailed(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_persistence_messages_are_user_facing() {
        let err = StoreError::save(StorageError::Poisoned);
        assert_eq!(
            err.to_string(),
            "Could not save your flashcards. Try again later."
        );
        assert_eq!(err.source().unwrap().to_string(), "storage lock poisoned");
        assert!(err.is_persistence());
    }

    #[test]
    fn test_policy_errors_are_not_persistence() {
        assert!(!StoreError::DuplicateDeck("d1".into()).is_persistence());
    }
}
