//! Deck is a titled set of flashcards for one subject.
//!
//! Cards are not nested inside the deck; they point back at it through
//! `Flashcard::deck_id`. `card_count` is a denormalized copy of that
//! relationship and is recomputed by the store, never trusted from input.
use super::Subject;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

pub const MAX_PROGRESS: u8 = 100;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deck {
    pub id: String,
    pub title: String,
    pub subject: Subject,
    #[serde(deserialize_with = "lenient_count")]
    pub card_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Milliseconds since the Unix epoch.
    pub created_at: i64,
    /// Percentage, 0-100.
    #[serde(deserialize_with = "lenient_percent")]
    pub progress: u8,
    /// ISO date (`YYYY-MM-DD`) of the last study session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_studied: Option<String>,
}

impl Deck {
    pub fn new(id: impl Into<String>, title: impl Into<String>, subject: Subject) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            subject,
            card_count: 0,
            description: None,
            created_at: Utc::now().timestamp_millis(),
            progress: 0,
            last_studied: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn set_progress(&mut self, progress: u8) {
        self.progress = progress.min(MAX_PROGRESS);
    }

    pub fn mark_studied(&mut self, progress: u8, studied_on: NaiveDate) {
        self.set_progress(progress);
        self.last_studied = Some(studied_on.format("%Y-%m-%d").to_string());
    }
}

/// Accepts any JSON number, rounded and clamped to 0-100.
fn lenient_percent<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
    let value = f64::deserialize(deserializer)?;
    if value.is_nan() {
        return Ok(0);
    }
    Ok(value.round().clamp(0.0, f64::from(MAX_PROGRESS)) as u8)
}

/// Accepts any JSON number; the store recomputes the count anyway.
fn lenient_count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    let value = f64::deserialize(deserializer)?;
    if value.is_nan() {
        return Ok(0);
    }
    Ok(value.round().clamp(0.0, f64::from(u32::MAX)) as u32)
}
