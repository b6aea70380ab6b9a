use clap::{Parser, Subcommand};
use studydock::database::SqliteStore;
use studydock::export::json::{export_json_to_path, import_json};
use studydock::*;

use anyhow::{Context, bail};
use chrono::Local;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "studydock", about = "Offline flashcard decks", version)]
struct Cli {
    /// SQLite file to use instead of STUDYDOCK_DB_PATH
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List all decks
    Decks,

    /// List the cards of a deck
    Cards { deck: String },

    /// Create a deck
    AddDeck {
        title: String,
        #[arg(long, default_value = "general")]
        subject: Subject,
        #[arg(long)]
        description: Option<String>,
    },

    /// Add a card to a deck
    AddCard {
        deck: String,
        term: String,
        definition: String,
    },

    /// Change a card's text or move it to another deck
    EditCard {
        id: String,
        #[arg(long)]
        term: Option<String>,
        #[arg(long)]
        definition: Option<String>,
        #[arg(long)]
        deck: Option<String>,
    },

    /// Delete a deck and all of its cards
    RemoveDeck { id: String },

    /// Delete a single card
    RemoveCard { id: String },

    /// Record a study session for a deck
    Study {
        deck: String,
        /// Progress percentage (0-100)
        progress: u8,
    },

    /// Export a deck with its cards to a JSON file
    Export { deck: String, path: PathBuf },

    /// Import a deck from a JSON file
    Import { path: PathBuf },

    /// Remove all persisted flashcard data
    Clear,

    /// Create sample decks
    Seed,
}

impl Command {
    /// Commands whose next save would overwrite the persisted collections.
    fn mutates(&self) -> bool {
        !matches!(
            self,
            Command::Decks | Command::Cards { .. } | Command::Export { .. } | Command::Clear
        )
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("studydock=info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = StoreConfig::from_env()?;
    if let Some(path) = cli.database {
        config.database_path = path;
    }

    let storage = SqliteStore::open(&config.database_path)
        .with_context(|| format!("opening {}", config.database_path.display()))?;
    let mut store = FlashStore::create(Arc::new(storage), &config);

    if let Err(err) = store.load_from_storage().await {
        if cli.command.mutates() {
            store.dispose().await?;
            return Err(anyhow::Error::new(err)
                .context("refusing to change flashcards that could not be loaded"));
        }
        warn!(error = %err, "continuing with empty collections");
    }

    let outcome = run(&mut store, cli.command).await;
    store.dispose().await?;
    outcome
}

async fn run(store: &mut FlashStore, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Decks => {
            if store.decks().is_empty() {
                println!("No decks yet.");
            }
            for deck in store.decks() {
                println!(
                    "{}  {} [{}] {} cards, {}%{}",
                    deck.id,
                    deck.title,
                    deck.subject,
                    deck.card_count,
                    deck.progress,
                    deck.last_studied
                        .as_deref()
                        .map(|day| format!(", last studied {day}"))
                        .unwrap_or_default()
                );
            }
        }
        Command::Cards { deck } => {
            let Some(found) = store.deck(&deck) else {
                bail!("no deck with id '{deck}'");
            };
            println!("{} ({} cards)", found.title, found.card_count);
            for card in store.get_cards_by_deck(&deck) {
                println!("  {}  {} - {}", card.id, card.term, card.definition);
            }
        }
        Command::AddDeck {
            title,
            subject,
            description,
        } => {
            let mut deck = Deck::new(new_id(), title, subject);
            deck.description = description;
            let id = deck.id.clone();
            store.add_deck(deck)?;
            println!("Deck created: {id}");
        }
        Command::AddCard {
            deck,
            term,
            definition,
        } => {
            if store.deck(&deck).is_none() {
                warn!(deck_id = %deck, "adding card to a deck that does not exist");
            }
            let card = Flashcard::new(new_id(), term, definition, deck);
            let id = card.id.clone();
            store.add_card(card)?;
            println!("Card created: {id}");
        }
        Command::EditCard {
            id,
            term,
            definition,
            deck,
        } => {
            let Some(mut card) = store.card(&id).cloned() else {
                bail!("no card with id '{id}'");
            };
            if let Some(term) = term {
                card.term = term;
            }
            if let Some(definition) = definition {
                card.definition = definition;
            }
            if let Some(deck) = deck {
                card.deck_id = deck;
            }
            store.edit_card(card)?;
            println!("Card updated: {id}");
        }
        Command::RemoveDeck { id } => {
            if store.remove_deck(&id) {
                println!("Deck removed: {id}");
            } else {
                println!("No deck with id '{id}'");
            }
        }
        Command::RemoveCard { id } => match store.remove_card(&id) {
            Some(card) => println!("Card removed: {} ({})", card.id, card.term),
            None => println!("No card with id '{id}'"),
        },
        Command::Study { deck, progress } => {
            if !store.record_study(&deck, progress, Local::now().date_naive()) {
                bail!("no deck with id '{deck}'");
            }
            println!("Study session recorded for {deck}");
        }
        Command::Export { deck, path } => {
            let Some(bundle) = store.bundle(&deck) else {
                bail!("no deck with id '{deck}'");
            };
            export_json_to_path(&bundle, &path)?;
            println!(
                "Deck '{}' exported to {}",
                bundle.deck.title,
                path.display()
            );
        }
        Command::Import { path } => {
            let bundle = import_json(&path)?;
            let title = bundle.deck.title.clone();
            let cards = bundle.cards.len();
            store.import_bundle(bundle)?;
            println!("Deck '{title}' imported with {cards} cards");
        }
        Command::Clear => {
            store.clear_flashcard_storage().await?;
            println!("Flashcard storage cleared");
            return Ok(());
        }
        Command::Seed => {
            seed(store)?;
            println!("Sample data created!");
        }
    }

    store.flush().await?;
    Ok(())
}

fn seed(store: &mut FlashStore) -> Result<(), StoreError> {
    let polish = Deck::new(new_id(), "Polish Vocabulary", Subject::General)
        .with_description("Everyday phrases");
    let biology = Deck::new(new_id(), "Cell Biology", Subject::Biology);

    let cards = [
        (&polish.id, "cześć", "hello"),
        (&polish.id, "dziękuję", "thank you"),
        (&polish.id, "proszę", "please"),
        (&biology.id, "Cell", "Basic unit of life"),
        (&biology.id, "Mitochondria", "Powerhouse of the cell"),
    ]
    .map(|(deck_id, term, definition)| Flashcard::new(new_id(), term, definition, deck_id.as_str()));

    store.add_deck(polish)?;
    store.add_deck(biology)?;
    for card in cards {
        store.add_card(card)?;
    }
    Ok(())
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_commands_do_not_mutate() {
        assert!(!Command::Decks.mutates());
        assert!(!Command::Cards { deck: "d1".into() }.mutates());
        assert!(!Command::Export {
            deck: "d1".into(),
            path: PathBuf::from("d1.json"),
        }
        .mutates());
    }

    #[test]
    fn test_write_commands_mutate() {
        assert!(Command::Seed.mutates());
        assert!(Command::RemoveDeck { id: "d1".into() }.mutates());
        assert!(Command::Study {
            deck: "d1".into(),
            progress: 50,
        }
        .mutates());
    }

    #[tokio::test]
    async fn test_seed_files_decks_by_subject() {
        let mut store = FlashStore::create(
            Arc::new(studydock::database::MemoryStore::new()),
            &StoreConfig::default(),
        );
        seed(&mut store).unwrap();

        let polish = store
            .decks()
            .iter()
            .find(|deck| deck.title == "Polish Vocabulary")
            .unwrap();
        assert_eq!(polish.subject, Subject::General);
        assert_eq!(polish.card_count, 3);
    }
}
