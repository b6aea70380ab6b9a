pub mod deck;
pub mod deck_bundle;
pub mod flashcard;
pub mod subject;

pub use deck::Deck;
pub use deck_bundle::DeckBundle;
pub use flashcard::Flashcard;
pub use subject::Subject;
