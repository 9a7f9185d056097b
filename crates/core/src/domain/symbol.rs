use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Ticker symbol, trimmed and uppercased. This is the join key across every table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = normalize(raw);
        if normalized.is_empty() {
            return None;
        }
        Some(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Lookup key form of a raw symbol. Empty when the input is blank.
pub fn normalize(raw: &str) -> String {
    raw.trim().to_uppercase()
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for Symbol {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Symbol::parse(&raw).ok_or_else(|| serde::de::Error::custom("symbol must be non-empty"))
    }
}
