use crate::domain::symbol::Symbol;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_STALENESS_HOURS: i64 = 24;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Rating {
    Buy,
    Hold,
    Sell,
    Other(String),
}

impl Rating {
    /// Loose match: anything mentioning "buy" or "sell" maps to that rating.
    pub fn parse_loose(raw: &str) -> Self {
        let t = raw.trim();
        let lower = t.to_ascii_lowercase();
        if lower == "hold" {
            Self::Hold
        } else if lower.contains("buy") {
            Self::Buy
        } else if lower.contains("sell") {
            Self::Sell
        } else if t.is_empty() {
            Self::Hold
        } else {
            Self::Other(t.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Buy => "Buy",
            Self::Hold => "Hold",
            Self::Sell => "Sell",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for Rating {
    fn from(s: String) -> Self {
        Self::parse_loose(&s)
    }
}

impl From<Rating> for String {
    fn from(r: Rating) -> Self {
        r.as_str().to_string()
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Other(String),
}

impl RiskLevel {
    pub fn parse_loose(raw: &str) -> Self {
        let t = raw.trim();
        let lower = t.to_ascii_lowercase();
        if lower.contains("low") {
            Self::Low
        } else if lower.contains("high") {
            Self::High
        } else if lower.contains("medium") || lower.contains("moderate") {
            Self::Medium
        } else if t.is_empty() {
            Self::Medium
        } else {
            Self::Other(t.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for RiskLevel {
    fn from(s: String) -> Self {
        Self::parse_loose(&s)
    }
}

impl From<RiskLevel> for String {
    fn from(r: RiskLevel) -> Self {
        r.as_str().to_string()
    }
}

/// AI-generated analysis of a single symbol. Stored with last-write-wins upserts keyed
/// by symbol and regenerated once older than the staleness threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub symbol: Symbol,
    pub analysis_date: DateTime<Utc>,
    pub provider: String,
    pub rating: Rating,
    pub price_target: Option<f64>,
    pub risk_level: RiskLevel,
    pub financial_health: String,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub opportunities: Vec<String>,
    pub threats: Vec<String>,
    pub short_term_outlook: String,
    pub long_term_outlook: String,
    pub dividend_analysis: Option<String>,
    pub ai_recommendation: String,
}

impl AnalysisRecord {
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.analysis_date
    }

    /// Fresh while strictly younger than `threshold`. Records dated in the future
    /// count as fresh.
    pub fn is_fresh(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        self.age(now) < threshold
    }
}
