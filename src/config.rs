//! Store configuration: defaults, overridable from the environment (and `.env`).

use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_DATABASE_PATH: &str = "studydock.sqlite3";
pub const DECKS_KEY: &str = "studydock-decks";
pub const CARDS_KEY: &str = "studydock-cards";

/// How strictly the store guards deck/card relationships.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum IntegrityPolicy {
    /// Duplicate ids and cards pointing at missing decks are accepted.
    #[default]
    Permissive,
    /// Duplicate ids and unknown deck references are rejected.
    Strict,
}

impl FromStr for IntegrityPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "permissive" => Ok(IntegrityPolicy::Permissive),
            "strict" => Ok(IntegrityPolicy::Strict),
            other => Err(ConfigError::Invalid {
                var: "STUDYDOCK_INTEGRITY",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value '{value}' for {var}")]
    Invalid { var: &'static str, value: String },
    #[error("{0} must not be empty")]
    Empty(&'static str),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreConfig {
    pub database_path: PathBuf,
    pub decks_key: String,
    pub cards_key: String,
    pub integrity: IntegrityPolicy,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            decks_key: DECKS_KEY.to_string(),
            cards_key: CARDS_KEY.to_string(),
            integrity: IntegrityPolicy::default(),
        }
    }
}

impl StoreConfig {
    /// Reads `STUDYDOCK_*` variables, loading a `.env` file first if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = lookup("STUDYDOCK_DB_PATH") {
            config.database_path = PathBuf::from(non_empty("STUDYDOCK_DB_PATH", path)?);
        }
        if let Some(key) = lookup("STUDYDOCK_DECKS_KEY") {
            config.decks_key = non_empty("STUDYDOCK_DECKS_KEY", key)?;
        }
        if let Some(key) = lookup("STUDYDOCK_CARDS_KEY") {
            config.cards_key = non_empty("STUDYDOCK_CARDS_KEY", key)?;
        }
        if let Some(policy) = lookup("STUDYDOCK_INTEGRITY") {
            config.integrity = policy.parse()?;
        }

        if config.decks_key == config.cards_key {
            return Err(ConfigError::Invalid {
                var: "STUDYDOCK_CARDS_KEY",
                value: config.cards_key,
            });
        }

        Ok(config)
    }

    pub fn with_integrity(mut self, integrity: IntegrityPolicy) -> Self {
        self.integrity = integrity;
        self
    }
}

fn non_empty(var: &'static str, value: String) -> Result<String, ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Empty(var));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var: &str| map.get(var).cloned()
    }

    #[test]
    fn test_defaults_without_variables() {
        let config = StoreConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, StoreConfig::default());
        assert_eq!(config.decks_key, "studydock-decks");
        assert_eq!(config.cards_key, "studydock-cards");
    }

    #[test]
    fn test_overrides() {
        let config = StoreConfig::from_lookup(lookup_from(&[
            ("STUDYDOCK_DB_PATH", "/tmp/cards.db"),
            ("STUDYDOCK_INTEGRITY", "Strict"),
        ]))
        .unwrap();

        assert_eq!(config.database_path, PathBuf::from("/tmp/cards.db"));
        assert_eq!(config.integrity, IntegrityPolicy::Strict);
    }

    #[test]
    fn test_invalid_policy() {
        let result = StoreConfig::from_lookup(lookup_from(&[("STUDYDOCK_INTEGRITY", "lenient")]));
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_empty_key_rejected() {
        let result = StoreConfig::from_lookup(lookup_from(&[("STUDYDOCK_DECKS_KEY", "  ")]));
        assert!(matches!(result, Err(ConfigError::Empty("STUDYDOCK_DECKS_KEY"))));
    }

    #[test]
    fn test_colliding_keys_rejected() {
        let result = StoreConfig::from_lookup(lookup_from(&[
            ("STUDYDOCK_DECKS_KEY", "same"),
            ("STUDYDOCK_CARDS_KEY", "same"),
        ]));
        assert!(result.is_err());
    }
}
