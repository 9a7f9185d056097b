use crate::config::Settings;
use crate::domain::analysis::AnalysisRecord;
use crate::domain::contract::LlmAnalysis;
use crate::llm::error::LlmDiagnosticsError;
use crate::llm::http::{send_json, Endpoint, EndpointDefaults};
use crate::llm::{json, prompt};
use crate::llm::{AnalysisGenerator, AnalysisInput, Provider};
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

const API_VERSION: &str = "2023-06-01";
const EMIT_TOOL: &str = "emit_analysis";

/// Messages API client. The model is forced to answer through the `emit_analysis`
/// tool so the reply arrives as structured input rather than prose.
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    endpoint: Endpoint,
    api_key: String,
}

impl AnthropicClient {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let endpoint = Endpoint::from_env(
            "ANTHROPIC",
            EndpointDefaults {
                base_url: "https://api.anthropic.com",
                model: "claude-3-5-sonnet-latest",
                max_tokens: 2048,
                timeout_secs: 60,
            },
        )?;
        Ok(Self {
            endpoint,
            api_key: settings.require_anthropic_api_key()?.to_string(),
        })
    }

    fn request_body(&self, input: &AnalysisInput) -> MessagesRequest {
        MessagesRequest {
            model: self.endpoint.model.clone(),
            max_tokens: self.endpoint.max_tokens,
            system: prompt::system_prompt(),
            messages: vec![Turn {
                role: "user",
                content: prompt::user_prompt(input),
            }],
            tools: vec![emit_tool()],
            tool_choice: ForcedTool::Tool { name: EMIT_TOOL },
        }
    }
}

fn emit_tool() -> ToolSpec {
    let string_list = json!({"type": "array", "items": {"type": "string"}});
    ToolSpec {
        name: EMIT_TOOL,
        description: "Record the finished stock analysis",
        input_schema: json!({
            "type": "object",
            "required": ["financial_health", "investment_rating", "risk_level", "ai_recommendation"],
            "properties": {
                "financial_health": {"type": "string"},
                "investment_rating": {"type": "string", "enum": ["Buy", "Hold", "Sell"]},
                "price_target": {"type": ["number", "null"]},
                "risk_level": {"type": "string", "enum": ["Low", "Medium", "High"]},
                "strengths": string_list,
                "weaknesses": string_list,
                "opportunities": string_list,
                "threats": string_list,
                "short_term_outlook": {"type": "string"},
                "long_term_outlook": {"type": "string"},
                "dividend_analysis": {"type": ["string", "null"]},
                "ai_recommendation": {"type": "string"}
            }
        }),
    }
}

/// The `emit_analysis` tool input, if the model called it.
fn tool_input(reply: &MessagesReply) -> Option<&Value> {
    reply.content.iter().find_map(|block| match block {
        Block::ToolUse { name, input } if name == EMIT_TOOL => Some(input),
        _ => None,
    })
}

fn joined_text(reply: &MessagesReply) -> String {
    reply
        .content
        .iter()
        .filter_map(|block| match block {
            Block::Text { text } => Some(text.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait::async_trait]
impl AnalysisGenerator for AnthropicClient {
    fn provider(&self) -> Provider {
        Provider::Anthropic
    }

    async fn generate_analysis(
        &self,
        input: &AnalysisInput,
        generated_at: DateTime<Utc>,
    ) -> anyhow::Result<AnalysisRecord> {
        let req = self
            .endpoint
            .http
            .post(self.endpoint.url("/v1/messages"))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&self.request_body(input));
        let (raw, reply): (Value, MessagesReply) = send_json(Provider::Anthropic, req).await?;

        if reply.stop_reason.as_deref() == Some("max_tokens") {
            tracing::warn!(symbol = %input.symbol, "anthropic reply hit max_tokens; output may be cut off");
        }

        let diagnostic = |stage: &'static str, err: anyhow::Error, raw_output: Option<String>| -> anyhow::Error {
            LlmDiagnosticsError {
                provider: Provider::Anthropic,
                stage,
                detail: format!("{err:#}"),
                raw_output,
                raw_response_json: Some(raw.clone()),
            }
            .into()
        };

        let provider = Provider::Anthropic.as_str();
        match tool_input(&reply) {
            Some(tool_json) => {
                let analysis = serde_json::from_value::<LlmAnalysis>(tool_json.clone())
                    .context("emit_analysis input does not match the analysis contract")
                    .map_err(|err| diagnostic("decode_tool", err, Some(tool_json.to_string())))?;
                analysis
                    .validate_and_into_record(input.symbol.clone(), provider, generated_at)
                    .map_err(|err| diagnostic("validate", err, None))
            }
            // Only reachable if the model ignores the forced tool choice.
            None => {
                let text = joined_text(&reply);
                json::parse_analysis(&text, &input.symbol, provider, generated_at)
                    .map_err(|err| diagnostic("parse", err, Some(text.clone())))
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    system: String,
    messages: Vec<Turn>,
    tools: Vec<ToolSpec>,
    tool_choice: ForcedTool,
}

#[derive(Debug, Serialize)]
struct Turn {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ToolSpec {
    name: &'static str,
    description: &'static str,
    input_schema: Value,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ForcedTool {
    Tool { name: &'static str },
}

#[derive(Debug, Deserialize)]
struct MessagesReply {
    #[serde(default)]
    content: Vec<Block>,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Block {
    Text {
        text: String,
    },
    ToolUse {
        #[serde(default)]
        name: String,
        #[serde(default)]
        input: Value,
    },
    #[serde(other)]
    Other,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::analysis::{Rating, RiskLevel};
    use crate::domain::Symbol;
    use chrono::TimeZone;

    fn reply(v: Value) -> MessagesReply {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn finds_emit_tool_input_among_other_blocks() {
        let r = reply(json!({
            "content": [
                {"type": "thinking", "thinking": "..."},
                {
                    "type": "tool_use",
                    "id": "toolu_1",
                    "name": EMIT_TOOL,
                    "input": {
                        "financial_health": "Strong free cash flow",
                        "investment_rating": "Buy",
                        "price_target": 72.0,
                        "risk_level": "Low",
                        "strengths": ["brand"],
                        "ai_recommendation": "Accumulate"
                    }
                }
            ],
            "stop_reason": "tool_use"
        }));

        let analysis: LlmAnalysis = serde_json::from_value(tool_input(&r).unwrap().clone()).unwrap();
        let at = Utc.with_ymd_and_hms(2026, 10, 16, 9, 0, 0).unwrap();
        let record = analysis
            .validate_and_into_record(Symbol::parse("KO").unwrap(), "anthropic", at)
            .unwrap();
        assert_eq!(record.rating, Rating::Buy);
        assert_eq!(record.risk_level, RiskLevel::Low);
        assert_eq!(record.price_target, Some(72.0));
    }

    #[test]
    fn text_only_reply_has_no_tool_input() {
        let r = reply(json!({
            "content": [
                {"type": "text", "text": "{\"a\":"},
                {"type": "text", "text": "1}"}
            ]
        }));
        assert!(tool_input(&r).is_none());
        assert_eq!(joined_text(&r), "{\"a\":\n1}");
    }

    #[test]
    fn tool_choice_names_emit_tool() {
        let v = serde_json::to_value(ForcedTool::Tool { name: EMIT_TOOL }).unwrap();
        assert_eq!(v, json!({"type": "tool", "name": "emit_analysis"}));
        assert_eq!(emit_tool().input_schema["required"][1], "investment_rating");
    }
}
