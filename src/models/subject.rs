//! Closed set of study subjects a deck can belong to.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Subject {
    Biology,
    Chemistry,
    Physics,
    Math,
    History,
    Geography,
    English,
    #[default]
    General,
}

impl Subject {
    pub const ALL: [Subject; 8] = [
        Subject::Biology,
        Subject::Chemistry,
        Subject::Physics,
        Subject::Math,
        Subject::History,
        Subject::Geography,
        Subject::English,
        Subject::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Subject::Biology => "biology",
            Subject::Chemistry => "chemistry",
            Subject::Physics => "physics",
            Subject::Math => "math",
            Subject::History => "history",
            Subject::Geography => "geography",
            Subject::English => "english",
            Subject::General => "general",
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown subject '{0}'")]
pub struct UnknownSubject(pub String);

impl FromStr for Subject {
    type Err = UnknownSubject;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Subject::ALL
            .into_iter()
            .find(|subject| subject.as_str() == wanted)
            .ok_or_else(|| UnknownSubject(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("Biology".parse::<Subject>().unwrap(), Subject::Biology);
        assert_eq!(" MATH ".parse::<Subject>().unwrap(), Subject::Math);
    }

    #[test]
    fn test_parse_unknown_subject() {
        assert!("astrology".parse::<Subject>().is_err());
    }

    #[test]
    fn test_serializes_lowercase() {
        let json = serde_json::to_string(&Subject::Geography).unwrap();
        assert_eq!(json, "\"geography\"");
    }
}
