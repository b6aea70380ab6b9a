pub mod config;
pub mod database;
pub mod error;
pub mod export;
pub mod models;
pub mod store;

pub use config::{IntegrityPolicy, StoreConfig};
pub use error::{StorageError, StoreError};
pub use models::{Deck, DeckBundle, Flashcard, Subject};
pub use store::FlashStore;
