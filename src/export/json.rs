//! JSON import/export of a single deck with its cards.

use crate::models::DeckBundle;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("file error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid deck file: {0}")]
    Json(#[from] serde_json::Error),
}

/// Writes the bundle as pretty-printed JSON, replacing any existing file.
pub fn export_json_to_path(bundle: &DeckBundle, path: impl AsRef<Path>) -> Result<(), ExportError> {
    let path = path.as_ref();
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, bundle)?;
    writer.flush()?;

    info!(
        deck = %bundle.deck.title,
        cards = bundle.cards.len(),
        path = %path.display(),
        "deck exported"
    );
    Ok(())
}

/// Reads a bundle previously written by [`export_json_to_path`].
pub fn import_json(path: impl AsRef<Path>) -> Result<DeckBundle, ExportError> {
    let path = path.as_ref();
    let reader = BufReader::new(File::open(path)?);
    let bundle: DeckBundle = serde_json::from_reader(reader)?;

    info!(deck = %bundle.deck.title, path = %path.display(), "deck imported");
    Ok(bundle)
}
