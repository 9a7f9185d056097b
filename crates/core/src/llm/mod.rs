pub mod anthropic;
pub mod error;
pub mod groq;
pub(crate) mod http;
pub mod json;
pub mod prompt;

use crate::config::Settings;
use crate::domain::analysis::AnalysisRecord;
use crate::domain::Symbol;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;

/// Context sent with an analysis request.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisInput {
    pub symbol: Symbol,
    pub company_name: Option<String>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub price: Option<f64>,
    pub dividend_yield: Option<f64>,
    pub payout_ratio: Option<f64>,
}

impl AnalysisInput {
    pub fn new(symbol: Symbol) -> Self {
        Self {
            symbol,
            company_name: None,
            sector: None,
            industry: None,
            price: None,
            dividend_yield: None,
            payout_ratio: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Anthropic,
    Groq,
}

impl Provider {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "anthropic" | "claude" => Some(Self::Anthropic),
            "groq" => Some(Self::Groq),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
            Self::Groq => "groq",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One request, one response. Implementations never retry; any failure is terminal
/// for that attempt.
#[async_trait::async_trait]
pub trait AnalysisGenerator: Send + Sync {
    fn provider(&self) -> Provider;

    async fn generate_analysis(
        &self,
        input: &AnalysisInput,
        generated_at: DateTime<Utc>,
    ) -> anyhow::Result<AnalysisRecord>;
}

/// Builds the generator named by `ANALYSIS_PROVIDER` (default: groq).
pub fn generator_from_settings(settings: &Settings) -> anyhow::Result<Arc<dyn AnalysisGenerator>> {
    match settings.analysis_provider()? {
        Provider::Groq => Ok(Arc::new(groq::GroqClient::from_settings(settings)?)),
        Provider::Anthropic => Ok(Arc::new(anthropic::AnthropicClient::from_settings(settings)?)),
    }
}
