//! A deck together with its cards, the unit of JSON export and import.
use super::{Deck, Flashcard};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeckBundle {
    pub deck: Deck,
    pub cards: Vec<Flashcard>,
}
