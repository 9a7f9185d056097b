use crate::domain::analysis::{AnalysisRecord, Rating, RiskLevel};
use crate::domain::symbol::Symbol;
use anyhow::ensure;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Analysis object as emitted by the model. Lenient on shape; tightened by
/// `validate_and_into_record`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmAnalysis {
    #[serde(default)]
    pub financial_health: String,
    #[serde(default)]
    pub investment_rating: String,
    #[serde(default, deserialize_with = "lenient_number")]
    pub price_target: Option<f64>,
    #[serde(default)]
    pub risk_level: String,
    #[serde(default, deserialize_with = "string_or_list")]
    pub strengths: Vec<String>,
    #[serde(default, deserialize_with = "string_or_list")]
    pub weaknesses: Vec<String>,
    #[serde(default, deserialize_with = "string_or_list")]
    pub opportunities: Vec<String>,
    #[serde(default, deserialize_with = "string_or_list")]
    pub threats: Vec<String>,
    #[serde(default)]
    pub short_term_outlook: String,
    #[serde(default)]
    pub long_term_outlook: String,
    #[serde(default)]
    pub dividend_analysis: Option<String>,
    #[serde(default)]
    pub ai_recommendation: String,

    // Older single-string prompt shape.
    #[serde(default)]
    pub recommendation: Option<String>,
    #[serde(default)]
    pub analysis_text: Option<String>,
    #[serde(default, deserialize_with = "string_or_list")]
    pub strength: Vec<String>,
    #[serde(default, deserialize_with = "string_or_list")]
    pub weakness: Vec<String>,
    #[serde(default, deserialize_with = "string_or_list")]
    pub opportunity: Vec<String>,
    #[serde(default, deserialize_with = "string_or_list")]
    pub threat: Vec<String>,
}

impl LlmAnalysis {
    pub fn validate_and_into_record(
        self,
        symbol: Symbol,
        provider: &str,
        generated_at: DateTime<Utc>,
    ) -> anyhow::Result<AnalysisRecord> {
        let rating = first_non_empty(&self.investment_rating, self.recommendation.as_deref());
        ensure!(!rating.is_empty(), "investment_rating must be non-empty");

        let ai_recommendation =
            first_non_empty(&self.ai_recommendation, self.analysis_text.as_deref());
        let financial_health = self.financial_health.trim().to_string();
        ensure!(
            !ai_recommendation.is_empty() || !financial_health.is_empty(),
            "analysis must include ai_recommendation or financial_health"
        );

        if let Some(target) = self.price_target {
            ensure!(
                target.is_finite() && target >= 0.0,
                "price_target must be a non-negative number (got {target})"
            );
        }

        Ok(AnalysisRecord {
            symbol,
            analysis_date: generated_at,
            provider: provider.to_string(),
            rating: Rating::parse_loose(&rating),
            price_target: self.price_target.filter(|t| *t > 0.0),
            risk_level: RiskLevel::parse_loose(&self.risk_level),
            financial_health,
            strengths: clean_lines(prefer(self.strengths, self.strength)),
            weaknesses: clean_lines(prefer(self.weaknesses, self.weakness)),
            opportunities: clean_lines(prefer(self.opportunities, self.opportunity)),
            threats: clean_lines(prefer(self.threats, self.threat)),
            short_term_outlook: self.short_term_outlook.trim().to_string(),
            long_term_outlook: self.long_term_outlook.trim().to_string(),
            dividend_analysis: self
                .dividend_analysis
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            ai_recommendation,
        })
    }
}

fn first_non_empty(primary: &str, legacy: Option<&str>) -> String {
    let p = primary.trim();
    if !p.is_empty() {
        return p.to_string();
    }
    legacy.map(str::trim).unwrap_or_default().to_string()
}

fn prefer(primary: Vec<String>, legacy: Vec<String>) -> Vec<String> {
    if primary.is_empty() {
        legacy
    } else {
        primary
    }
}

fn clean_lines(lines: Vec<String>) -> Vec<String> {
    lines
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

// Models return SWOT sections either as arrays or as one comma-separated string.
fn string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        One(String),
        Many(Vec<String>),
        Null(()),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::One(s) => s.split(',').map(|p| p.to_string()).collect(),
        Raw::Many(v) => v,
        Raw::Null(()) => Vec::new(),
    })
}

fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(f64),
        Text(String),
        Null(()),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Num(n) => Some(n),
        Raw::Text(s) => s.trim().trim_start_matches('$').replace(',', "").parse().ok(),
        Raw::Null(()) => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 16, 9, 0, 0).unwrap()
    }

    #[test]
    fn accepts_full_shape() {
        let v = json!({
            "financial_health": "Strong balance sheet",
            "investment_rating": "Buy",
            "price_target": 225.5,
            "risk_level": "Low",
            "strengths": ["brand", " services "],
            "weaknesses": ["saturation"],
            "opportunities": [],
            "threats": ["regulation"],
            "short_term_outlook": "stable",
            "long_term_outlook": "growth",
            "dividend_analysis": "",
            "ai_recommendation": "Accumulate on dips"
        });
        let parsed: LlmAnalysis = serde_json::from_value(v).unwrap();
        let record = parsed
            .validate_and_into_record(Symbol::parse("aapl").unwrap(), "groq", at())
            .unwrap();

        assert_eq!(record.symbol.as_str(), "AAPL");
        assert_eq!(record.rating, Rating::Buy);
        assert_eq!(record.risk_level, RiskLevel::Low);
        assert_eq!(record.strengths, vec!["brand", "services"]);
        assert_eq!(record.dividend_analysis, None);
        assert_eq!(record.analysis_date, at());
    }

    #[test]
    fn accepts_legacy_string_fields() {
        let v = json!({
            "analysis_text": "Solid dividend payer",
            "recommendation": "Hold",
            "strength": "brand, margins",
            "threat": null,
            "price_target": "$11.25"
        });
        let parsed: LlmAnalysis = serde_json::from_value(v).unwrap();
        let record = parsed
            .validate_and_into_record(Symbol::parse("GT").unwrap(), "groq", at())
            .unwrap();

        assert_eq!(record.rating, Rating::Hold);
        assert_eq!(record.strengths, vec!["brand", "margins"]);
        assert!(record.threats.is_empty());
        assert_eq!(record.price_target, Some(11.25));
        assert_eq!(record.ai_recommendation, "Solid dividend payer");
    }

    #[test]
    fn rejects_missing_rating() {
        let parsed: LlmAnalysis =
            serde_json::from_value(json!({"ai_recommendation": "x"})).unwrap();
        assert!(parsed
            .validate_and_into_record(Symbol::parse("KO").unwrap(), "groq", at())
            .is_err());
    }

    #[test]
    fn rejects_negative_price_target() {
        let parsed: LlmAnalysis = serde_json::from_value(json!({
            "investment_rating": "Sell",
            "ai_recommendation": "exit",
            "price_target": -3.0
        }))
        .unwrap();
        assert!(parsed
            .validate_and_into_record(Symbol::parse("KO").unwrap(), "groq", at())
            .is_err());
    }
}
