use crate::domain::analysis::AnalysisRecord;
use crate::domain::contract::LlmAnalysis;
use crate::domain::Symbol;
use anyhow::Context;
use chrono::{DateTime, Utc};

pub fn extract_json(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.starts_with("```") {
        // Strip the fence line and the closing fence.
        let mut inner = trimmed;
        if let Some(after_first) = inner.split_once('\n').map(|(_, rest)| rest) {
            inner = after_first;
        }
        if let Some(end) = inner.rfind("```") {
            inner = &inner[..end];
        }
        return Some(inner.trim().to_string());
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(trimmed[start..=end].trim().to_string())
}

pub fn parse_analysis(
    text: &str,
    symbol: &Symbol,
    provider: &str,
    generated_at: DateTime<Utc>,
) -> anyhow::Result<AnalysisRecord> {
    let json_str = extract_json(text).unwrap_or_else(|| text.trim().to_string());
    let parsed = serde_json::from_str::<LlmAnalysis>(&json_str)
        .with_context(|| format!("model output is not a valid analysis object: {json_str}"))?;
    parsed.validate_and_into_record(symbol.clone(), provider, generated_at)
}
