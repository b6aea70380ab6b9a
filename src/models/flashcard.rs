//! Flashcard is a pair <term, definition> that belongs to one deck.
//! The deck is referenced by id only; the model does not check it exists.
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flashcard {
    pub id: String,
    pub term: String,
    pub definition: String,
    pub deck_id: String,
}

impl Flashcard {
    pub fn new(
        id: impl Into<String>,
        term: impl Into<String>,
        definition: impl Into<String>,
        deck_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            term: term.into(),
            definition: definition.into(),
            deck_id: deck_id.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flashcard_creation() {
        let card = Flashcard::new("c1", "hello", "cześć", "d1");

        assert_eq!(card.term, "hello");
        assert_eq!(card.definition, "cześć");
        assert_eq!(card.deck_id, "d1");
    }

    #[test]
    fn test_flashcard_persisted_shape() {
        let card = Flashcard::new("c1", "Cell", "Basic unit of life", "d1");
        let value = serde_json::to_value(&card).unwrap();

        assert_eq!(value["deckId"], "d1");
        assert_eq!(value["term"], "Cell");
        assert!(value.get("deck_id").is_none());
    }
}
