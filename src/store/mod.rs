//! In-memory flashcard store with offline persistence.
//!
//! `FlashStore` owns the deck and card collections. Every mutation updates
//! memory synchronously, recomputes the affected decks' `card_count`, and then
//! queues a snapshot for the persistence worker without waiting for it.
//! Loading is explicit and is expected to be awaited once at startup.

pub mod persist;

use crate::config::{IntegrityPolicy, StoreConfig};
use crate::database::KeyValueStore;
use crate::error::{StorageError, StoreError};
use crate::models::{Deck, DeckBundle, Flashcard};
use chrono::NaiveDate;
use persist::{ErrorSlot, Persister, Snapshot, StorageKeys};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct FlashStore {
    decks: Vec<Deck>,
    cards: Vec<Flashcard>,
    is_loading: bool,
    errors: ErrorSlot,
    storage: Arc<dyn KeyValueStore>,
    keys: StorageKeys,
    integrity: IntegrityPolicy,
    persister: Persister,
}

impl FlashStore {
    /// Creates an empty store backed by `storage` and starts its persistence
    /// worker. Must be called from within a tokio runtime.
    ///
    /// The store reports `is_loading() == true` until `load_from_storage`
    /// has completed once.
    pub fn create(storage: Arc<dyn KeyValueStore>, config: &StoreConfig) -> Self {
        let keys = StorageKeys {
            decks: config.decks_key.clone(),
            cards: config.cards_key.clone(),
        };
        let errors = ErrorSlot::default();
        let persister = Persister::spawn(storage.clone(), keys.clone(), errors.clone());

        Self {
            decks: Vec::new(),
            cards: Vec::new(),
            is_loading: true,
            errors,
            storage,
            keys,
            integrity: config.integrity,
            persister,
        }
    }

    /// Waits for queued writes and stops the persistence worker.
    pub async fn dispose(self) -> Result<(), StoreError> {
        debug!("disposing flashcard store");
        self.persister.shutdown().await
    }

    // ---- reads ----

    pub fn decks(&self) -> &[Deck] {
        &self.decks
    }

    pub fn cards(&self) -> &[Flashcard] {
        &self.cards
    }

    pub fn all_decks(&self) -> &[Deck] {
        self.decks()
    }

    pub fn all_cards(&self) -> &[Flashcard] {
        self.cards()
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    /// Last persistence failure, replaced by each new one.
    pub fn error(&self) -> Option<StoreError> {
        self.errors.get()
    }

    pub fn integrity(&self) -> IntegrityPolicy {
        self.integrity
    }

    pub fn deck(&self, deck_id: &str) -> Option<&Deck> {
        self.decks.iter().find(|deck| deck.id == deck_id)
    }

    pub fn card(&self, card_id: &str) -> Option<&Flashcard> {
        self.cards.iter().find(|card| card.id == card_id)
    }

    pub fn get_cards_by_deck(&self, deck_id: &str) -> Vec<&Flashcard> {
        self.cards
            .iter()
            .filter(|card| card.deck_id == deck_id)
            .collect()
    }

    /// Number of cards referencing `deck_id`; the source of truth for `card_count`.
    pub fn get_actual_card_count(&self, deck_id: &str) -> usize {
        self.cards
            .iter()
            .filter(|card| card.deck_id == deck_id)
            .count()
    }

    /// A deck and its cards, if the deck exists.
    pub fn bundle(&self, deck_id: &str) -> Option<DeckBundle> {
        self.deck(deck_id).map(|deck| DeckBundle {
            deck: deck.clone(),
            cards: self.get_cards_by_deck(deck_id).into_iter().cloned().collect(),
        })
    }

    // ---- mutations ----

    pub fn add_deck(&mut self, mut deck: Deck) -> Result<(), StoreError> {
        if self.integrity == IntegrityPolicy::Strict && self.deck(&deck.id).is_some() {
            return Err(rejected(StoreError::DuplicateDeck(deck.id)));
        }

        deck.card_count = count_u32(self.get_actual_card_count(&deck.id));
        deck.set_progress(deck.progress);
        debug!(deck_id = %deck.id, title = %deck.title, "adding deck");
        self.decks.push(deck);
        self.schedule_save();
        Ok(())
    }

    /// Appends a card. Under the permissive policy a card whose deck does not
    /// exist is kept as an orphan.
    pub fn add_card(&mut self, card: Flashcard) -> Result<(), StoreError> {
        if self.integrity == IntegrityPolicy::Strict {
            if self.card(&card.id).is_some() {
                return Err(rejected(StoreError::DuplicateCard(card.id)));
            }
            if self.deck(&card.deck_id).is_none() {
                return Err(rejected(StoreError::UnknownDeck(card.deck_id)));
            }
        }

        debug!(card_id = %card.id, deck_id = %card.deck_id, "adding card");
        let deck_id = card.deck_id.clone();
        self.cards.push(card);
        self.refresh_card_count(&deck_id);
        self.schedule_save();
        Ok(())
    }

    /// Removes a deck together with all of its cards. Returns whether anything
    /// was removed; unknown ids are a no-op.
    pub fn remove_deck(&mut self, deck_id: &str) -> bool {
        let decks_before = self.decks.len();
        let cards_before = self.cards.len();

        self.decks.retain(|deck| deck.id != deck_id);
        self.cards.retain(|card| card.deck_id != deck_id);

        let removed_decks = decks_before - self.decks.len();
        let removed_cards = cards_before - self.cards.len();
        if removed_decks == 0 && removed_cards == 0 {
            return false;
        }

        debug!(deck_id, removed_decks, removed_cards, "removed deck");
        self.schedule_save();
        true
    }

    /// Removes a card and returns it; unknown ids are a no-op.
    pub fn remove_card(&mut self, card_id: &str) -> Option<Flashcard> {
        let (removed, kept): (Vec<Flashcard>, Vec<Flashcard>) = std::mem::take(&mut self.cards)
            .into_iter()
            .partition(|card| card.id == card_id);
        self.cards = kept;

        if removed.is_empty() {
            return None;
        }

        for card in &removed {
            self.refresh_card_count(&card.deck_id);
        }
        debug!(card_id, "removed card");
        self.schedule_save();
        removed.into_iter().next()
    }

    /// Replaces the card with the same id. Returns `Ok(false)` and changes
    /// nothing when no such card exists.
    pub fn edit_card(&mut self, updated: Flashcard) -> Result<bool, StoreError> {
        let Some(index) = self.cards.iter().position(|card| card.id == updated.id) else {
            debug!(card_id = %updated.id, "edit ignored, no such card");
            return Ok(false);
        };

        if self.integrity == IntegrityPolicy::Strict && self.deck(&updated.deck_id).is_none() {
            return Err(rejected(StoreError::UnknownDeck(updated.deck_id)));
        }

        let new_deck_id = updated.deck_id.clone();
        let old_deck_id = std::mem::replace(&mut self.cards[index], updated).deck_id;

        self.refresh_card_count(&new_deck_id);
        if old_deck_id != new_deck_id {
            debug!(from = %old_deck_id, to = %new_deck_id, "card moved between decks");
            self.refresh_card_count(&old_deck_id);
        }
        self.schedule_save();
        Ok(true)
    }

    /// Updates a deck's editable fields. `card_count` is recomputed rather
    /// than taken from `updated`. Returns `false` for an unknown id.
    pub fn edit_deck(&mut self, updated: Deck) -> bool {
        let count = count_u32(self.get_actual_card_count(&updated.id));
        let Some(deck) = self.decks.iter_mut().find(|deck| deck.id == updated.id) else {
            debug!(deck_id = %updated.id, "edit ignored, no such deck");
            return false;
        };

        deck.title = updated.title;
        deck.subject = updated.subject;
        deck.description = updated.description;
        deck.set_progress(updated.progress);
        deck.last_studied = updated.last_studied;
        deck.card_count = count;

        self.schedule_save();
        true
    }

    /// Records a finished study session on a deck.
    pub fn record_study(&mut self, deck_id: &str, progress: u8, studied_on: NaiveDate) -> bool {
        let Some(deck) = self.decks.iter_mut().find(|deck| deck.id == deck_id) else {
            return false;
        };

        deck.mark_studied(progress, studied_on);
        debug!(deck_id, progress = deck.progress, "study session recorded");
        self.schedule_save();
        true
    }

    /// Adds an exported deck and its cards in one mutation. Cards are attached
    /// to the bundle's deck regardless of the deck id they carry.
    pub fn import_bundle(&mut self, bundle: DeckBundle) -> Result<(), StoreError> {
        let DeckBundle { mut deck, cards } = bundle;

        if self.integrity == IntegrityPolicy::Strict {
            if self.deck(&deck.id).is_some() {
                return Err(rejected(StoreError::DuplicateDeck(deck.id)));
            }
            let mut seen = std::collections::HashSet::new();
            for card in &cards {
                if self.card(&card.id).is_some() || !seen.insert(card.id.as_str()) {
                    return Err(rejected(StoreError::DuplicateCard(card.id.clone())));
                }
            }
        }

        let card_total = cards.len();
        self.cards.extend(cards.into_iter().map(|mut card| {
            card.deck_id = deck.id.clone();
            card
        }));
        deck.card_count = count_u32(self.get_actual_card_count(&deck.id));
        deck.set_progress(deck.progress);
        info!(deck_id = %deck.id, cards = card_total, "imported deck");
        self.decks.push(deck);
        self.schedule_save();
        Ok(())
    }

    // ---- persistence ----

    /// Writes both collections and waits for the write to finish.
    pub async fn save_to_storage(&self) -> Result<(), StoreError> {
        self.persister.schedule_save(self.snapshot());
        self.persister.flush().await?;
        info!(
            decks = self.decks.len(),
            cards = self.cards.len(),
            "flashcards saved"
        );
        Ok(())
    }

    /// Waits for queued background saves; returns the latest one's failure.
    pub async fn flush(&self) -> Result<(), StoreError> {
        self.persister.flush().await
    }

    /// Replaces the collections with persisted data.
    ///
    /// Absent or non-array values leave the current collection untouched and
    /// stored entries that do not decode are skipped. On read failure the
    /// in-memory data is kept and the error is both recorded and returned.
    pub async fn load_from_storage(&mut self) -> Result<(), StoreError> {
        self.is_loading = true;
        if let Err(err) = self.persister.flush().await {
            warn!(error = %err, cause = ?err, "pending save failed before load, unsaved changes will be replaced");
        }
        self.errors.clear();

        let outcome = match self.read_persisted().await {
            Ok((decks, cards)) => {
                if let Some(mut decks) = decks {
                    for deck in &mut decks {
                        deck.set_progress(deck.progress);
                    }
                    self.decks = decks;
                }
                if let Some(cards) = cards {
                    self.cards = cards;
                }
                self.refresh_all_card_counts();
                info!(
                    decks = self.decks.len(),
                    cards = self.cards.len(),
                    "flashcards loaded"
                );
                Ok(())
            }
            Err(cause) => {
                let err = StoreError::load(cause);
                warn!(error = %err, cause = ?err, "loading flashcards failed, keeping current data");
                self.errors.set(err.clone());
                Err(err)
            }
        };

        self.is_loading = false;
        outcome
    }

    /// Removes both persisted collections. In-memory data is not touched.
    pub async fn clear_flashcard_storage(&self) -> Result<(), StoreError> {
        match self.persister.clear().await {
            Ok(()) => {
                info!("flashcard storage cleared");
                Ok(())
            }
            Err(cause) => {
                let err = StoreError::clear(cause);
                warn!(error = %err, cause = ?err, "clearing flashcard storage failed");
                self.errors.set(err.clone());
                Err(err)
            }
        }
    }

    // ---- internals ----

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            decks: self.decks.clone(),
            cards: self.cards.clone(),
        }
    }

    fn schedule_save(&self) {
        self.persister.schedule_save(self.snapshot());
    }

    fn refresh_card_count(&mut self, deck_id: &str) {
        let count = count_u32(self.get_actual_card_count(deck_id));
        for deck in self.decks.iter_mut().filter(|deck| deck.id == deck_id) {
            deck.card_count = count;
        }
    }

    fn refresh_all_card_counts(&mut self) {
        let ids: Vec<String> = self.decks.iter().map(|deck| deck.id.clone()).collect();
        for id in ids {
            self.refresh_card_count(&id);
        }
    }

    async fn read_persisted(
        &self,
    ) -> Result<(Option<Vec<Deck>>, Option<Vec<Flashcard>>), StorageError> {
        let storage = self.storage.clone();
        let keys = self.keys.clone();

        tokio::task::spawn_blocking(
            move || -> Result<(Option<Vec<Deck>>, Option<Vec<Flashcard>>), StorageError> {
                let decks = decode_collection(&keys.decks, storage.get_item(&keys.decks)?)?;
                let cards = decode_collection(&keys.cards, storage.get_item(&keys.cards)?)?;
                Ok((decks, cards))
            },
        )
        .await
        .map_err(|e| StorageError::Worker(e.to_string()))?
    }
}

/// Only arrays count as stored collections; anything else is treated as absent.
/// Entries that do not decode are skipped so one bad entry cannot hide the rest.
fn decode_collection<T: DeserializeOwned>(
    key: &str,
    value: Option<Value>,
) -> Result<Option<Vec<T>>, StorageError> {
    match value {
        Some(Value::Array(items)) => {
            let total = items.len();
            let decoded: Vec<T> = items
                .into_iter()
                .enumerate()
                .filter_map(|(index, item)| match serde_json::from_value(item) {
                    Ok(decoded) => Some(decoded),
                    Err(err) => {
                        warn!(key, index, error = %err, "skipping stored entry that does not decode");
                        None
                    }
                })
                .collect();
            if decoded.len() < total {
                warn!(key, skipped = total - decoded.len(), "some stored entries were dropped");
            }
            Ok(Some(decoded))
        }
        Some(_) => {
            warn!(key, "stored value is not an array, ignoring it");
            Ok(None)
        }
        None => Ok(None),
    }
}

fn count_u32(count: usize) -> u32 {
    u32::try_from(count).unwrap_or(u32::MAX)
}

fn rejected(err: StoreError) -> StoreError {
    warn!(error = %err, "mutation rejected");
    err
}
