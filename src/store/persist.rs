//! Background persistence worker.
//!
//! Mutations hand a snapshot to the worker and return immediately. The worker
//! owns every write to the backend and applies commands in the order they were
//! queued. Saves queued back-to-back are collapsed into the newest one, so an
//! older snapshot is never written after a newer one.

use crate::database::KeyValueStore;
use crate::error::{StorageError, StoreError};
use crate::models::{Deck, Flashcard};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Keys under which the two collections are persisted.
#[derive(Clone, Debug)]
pub struct StorageKeys {
    pub decks: String,
    pub cards: String,
}

/// Deep copy of both collections at one point in time.
#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    pub decks: Vec<Deck>,
    pub cards: Vec<Flashcard>,
}

/// Last failure seen by the store, shared with the worker.
#[derive(Clone, Default)]
pub(crate) struct ErrorSlot(Arc<Mutex<Option<StoreError>>>);

impl ErrorSlot {
    fn slot(&self) -> MutexGuard<'_, Option<StoreError>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn set(&self, error: StoreError) {
        *self.slot() = Some(error);
    }

    pub(crate) fn clear(&self) {
        *self.slot() = None;
    }

    pub(crate) fn get(&self) -> Option<StoreError> {
        self.slot().clone()
    }
}

enum Command {
    Save(Snapshot),
    Clear(oneshot::Sender<Result<(), StorageError>>),
    /// Replies with the outcome of the latest save written since the previous flush.
    Flush(oneshot::Sender<Result<(), StoreError>>),
}

pub(crate) struct Persister {
    tx: mpsc::UnboundedSender<Command>,
    handle: JoinHandle<()>,
    errors: ErrorSlot,
}

impl Persister {
    /// Starts the worker task. Must be called from within a tokio runtime.
    pub(crate) fn spawn(
        storage: Arc<dyn KeyValueStore>,
        keys: StorageKeys,
        errors: ErrorSlot,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run(storage, keys, errors.clone(), rx));
        Self { tx, handle, errors }
    }

    /// Queues a snapshot for writing without waiting for it.
    pub(crate) fn schedule_save(&self, snapshot: Snapshot) {
        if self.tx.send(Command::Save(snapshot)).is_err() {
            let err = StoreError::save(worker_gone());
            warn!(error = %err, "persistence worker stopped, save dropped");
            self.errors.set(err);
        }
    }

    /// Waits until everything queued so far has been written.
    pub(crate) async fn flush(&self) -> Result<(), StoreError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Flush(reply))
            .map_err(|_| StoreError::save(worker_gone()))?;
        rx.await.map_err(|_| StoreError::save(worker_gone()))?
    }

    /// Removes both persisted keys, after any queued saves.
    pub(crate) async fn clear(&self) -> Result<(), StorageError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Clear(reply))
            .map_err(|_| worker_gone())?;
        rx.await.map_err(|_| worker_gone())?
    }

    /// Drains the queue and stops the worker.
    pub(crate) async fn shutdown(self) -> Result<(), StoreError> {
        let flushed = self.flush().await;
        drop(self.tx);
        self.handle
            .await
            .map_err(|e| StoreError::save(StorageError::Worker(e.to_string())))?;
        flushed
    }
}

fn worker_gone() -> StorageError {
    StorageError::Worker("channel closed".to_string())
}

async fn run(
    storage: Arc<dyn KeyValueStore>,
    keys: StorageKeys,
    errors: ErrorSlot,
    mut rx: mpsc::UnboundedReceiver<Command>,
) {
    let mut last_save: Result<(), StoreError> = Ok(());
    let mut carried: Option<Command> = None;

    loop {
        let command = match carried.take() {
            Some(command) => command,
            None => match rx.recv().await {
                Some(command) => command,
                None => break,
            },
        };

        match command {
            Command::Save(mut snapshot) => {
                let mut skipped = 0usize;
                while let Ok(next) = rx.try_recv() {
                    match next {
                        Command::Save(newer) => {
                            snapshot = newer;
                            skipped += 1;
                        }
                        other => {
                            carried = Some(other);
                            break;
                        }
                    }
                }
                if skipped > 0 {
                    debug!(skipped, "coalesced queued saves");
                }

                last_save = match write_snapshot(storage.clone(), keys.clone(), snapshot).await {
                    Ok(()) => Ok(()),
                    Err(cause) => {
                        let err = StoreError::save(cause);
                        warn!(error = %err, cause = ?err, "saving flashcards failed");
                        errors.set(err.clone());
                        Err(err)
                    }
                };
            }
            Command::Clear(reply) => {
                let result = remove_keys(storage.clone(), keys.clone()).await;
                let _ = reply.send(result);
            }
            Command::Flush(reply) => {
                let outcome = std::mem::replace(&mut last_save, Ok(()));
                let _ = reply.send(outcome);
            }
        }
    }

    debug!("persistence worker stopped");
}

async fn write_snapshot(
    storage: Arc<dyn KeyValueStore>,
    keys: StorageKeys,
    snapshot: Snapshot,
) -> Result<(), StorageError> {
    tokio::task::spawn_blocking(move || -> Result<(), StorageError> {
        let decks = serde_json::to_value(&snapshot.decks)?;
        let cards = serde_json::to_value(&snapshot.cards)?;
        storage.set_item(&keys.decks, &decks)?;
        storage.set_item(&keys.cards, &cards)?;
        debug!(
            decks = snapshot.decks.len(),
            cards = snapshot.cards.len(),
            "snapshot written"
        );
        Ok(())
    })
    .await
    .map_err(|e| StorageError::Worker(e.to_string()))?
}

async fn remove_keys(storage: Arc<dyn KeyValueStore>, keys: StorageKeys) -> Result<(), StorageError> {
    tokio::task::spawn_blocking(move || -> Result<(), StorageError> {
        storage.remove_item(&keys.decks)?;
        storage.remove_item(&keys.cards)
    })
    .await
    .map_err(|e| StorageError::Worker(e.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;
    use crate::database::test_utils::FlakyStore;
    use crate::models::Subject;

    fn keys() -> StorageKeys {
        StorageKeys {
            decks: "decks".to_string(),
            cards: "cards".to_string(),
        }
    }

    fn snapshot_with_decks(count: usize) -> Snapshot {
        Snapshot {
            decks: (0..count)
                .map(|i| Deck::new(format!("d{i}"), "Deck", Subject::General))
                .collect(),
            cards: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_latest_snapshot_wins() {
        let storage = Arc::new(MemoryStore::new());
        let persister = Persister::spawn(storage.clone(), keys(), ErrorSlot::default());

        for count in 1..=5 {
            persister.schedule_save(snapshot_with_decks(count));
        }
        persister.flush().await.unwrap();

        let decks = storage.get_item("decks").unwrap().unwrap();
        assert_eq!(decks.as_array().unwrap().len(), 5);
        assert_eq!(storage.get_item("cards").unwrap(), Some(serde_json::json!([])));
    }

    #[tokio::test]
    async fn test_clear_runs_after_queued_saves() {
        let storage = Arc::new(MemoryStore::new());
        let persister = Persister::spawn(storage.clone(), keys(), ErrorSlot::default());

        persister.schedule_save(snapshot_with_decks(2));
        persister.clear().await.unwrap();

        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn test_failed_save_is_reported_once() {
        let storage = Arc::new(FlakyStore::new());
        storage.fail_writes(true);
        let errors = ErrorSlot::default();
        let persister = Persister::spawn(storage.clone(), keys(), errors.clone());

        persister.schedule_save(snapshot_with_decks(1));
        assert!(matches!(persister.flush().await, Err(StoreError::SaveFailed(_))));
        assert!(matches!(errors.get(), Some(StoreError::SaveFailed(_))));

        // Nothing written since the last flush.
        assert!(persister.flush().await.is_ok());
    }

    #[test]
    fn test_error_slot_survives_poisoning() {
        let errors = ErrorSlot::default();
        let poisoner = errors.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.0.lock().unwrap();
            panic!("poison the slot");
        })
        .join();

        errors.set(StoreError::save(StorageError::Poisoned));
        assert!(matches!(errors.get(), Some(StoreError::SaveFailed(_))));
        errors.clear();
        assert!(errors.get().is_none());
    }

    #[tokio::test]
    async fn test_shutdown_drains_queue() {
        let storage = Arc::new(MemoryStore::new());
        let persister = Persister::spawn(storage.clone(), keys(), ErrorSlot::default());

        persister.schedule_save(snapshot_with_decks(3));
        persister.shutdown().await.unwrap();

        let decks = storage.get_item("decks").unwrap().unwrap();
        assert_eq!(decks.as_array().unwrap().len(), 3);
    }
}
