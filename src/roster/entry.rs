//! Roster entries and the normalized identity key used to match them.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// One eligible identity in the roster file.
///
/// Serialized with the roster's column names: `NOM` is the family name,
/// `PRENOM` the given name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    #[serde(rename = "NOM")]
    pub last_name: String,

    #[serde(rename = "PRENOM")]
    pub first_name: String,

    /// Flips to `true` once a credential has been issued. Never reverts.
    #[serde(default, deserialize_with = "deserialize_joined")]
    pub joined: bool,
}

impl RosterEntry {
    pub fn new(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            joined: false,
        }
    }

    pub fn key(&self) -> NameKey {
        NameKey::new(&self.first_name, &self.last_name)
    }

    /// Display name as written in the roster (not normalized).
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
    }
}

/// Anything other than a case-insensitive "true" reads as not joined,
/// including an empty cell.
fn deserialize_joined<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw
        .map(|s| s.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(false))
}

/// Case-insensitive, whitespace-normalized `(first, last)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NameKey {
    first: String,
    last: String,
}

impl NameKey {
    pub fn new(first: &str, last: &str) -> Self {
        Self {
            first: normalize(first),
            last: normalize(last),
        }
    }

    /// Parse a free-text reply: first token is the given name, the remaining
    /// tokens form the family name. `None` when fewer than two tokens.
    pub fn parse(input: &str) -> Option<Self> {
        let mut tokens = input.split_whitespace();
        let first = tokens.next()?;
        let rest: Vec<&str> = tokens.collect();
        if rest.is_empty() {
            return None;
        }
        Some(Self::new(first, &rest.join(" ")))
    }

    pub fn first(&self) -> &str {
        &self.first
    }

    pub fn last(&self) -> &str {
        &self.last
    }
}

impl fmt::Display for NameKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.first, self.last)
    }
}

/// Trim, lowercase, and collapse inner runs of whitespace to one space.
pub fn normalize(value: &str) -> String {
    value
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}
