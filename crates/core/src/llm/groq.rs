use crate::config::Settings;
use crate::domain::analysis::AnalysisRecord;
use crate::llm::error::LlmDiagnosticsError;
use crate::llm::http::{send_json, Endpoint, EndpointDefaults};
use crate::llm::{json, prompt};
use crate::llm::{AnalysisGenerator, AnalysisInput, Provider};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const TEMPERATURE: f32 = 0.3;

/// OpenAI-compatible chat completions client for Groq.
#[derive(Debug, Clone)]
pub struct GroqClient {
    endpoint: Endpoint,
    api_key: String,
}

impl GroqClient {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let endpoint = Endpoint::from_env(
            "GROQ",
            EndpointDefaults {
                base_url: "https://api.groq.com/openai/v1",
                model: "llama-3.3-70b-versatile",
                max_tokens: 4096,
                timeout_secs: 60,
            },
        )?;
        Ok(Self {
            endpoint,
            api_key: settings.require_groq_api_key()?.to_string(),
        })
    }

    fn request(&self, input: &AnalysisInput) -> ChatRequest {
        ChatRequest {
            model: self.endpoint.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: prompt::system_prompt(),
                },
                ChatMessage {
                    role: "user",
                    content: prompt::user_prompt(input),
                },
            ],
            temperature: TEMPERATURE,
            max_tokens: self.endpoint.max_tokens,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        }
    }

    fn first_content(res: &ChatResponse) -> Option<&str> {
        res.choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .filter(|c| !c.trim().is_empty())
    }
}

#[async_trait::async_trait]
impl AnalysisGenerator for GroqClient {
    fn provider(&self) -> Provider {
        Provider::Groq
    }

    async fn generate_analysis(
        &self,
        input: &AnalysisInput,
        generated_at: DateTime<Utc>,
    ) -> anyhow::Result<AnalysisRecord> {
        let req = self
            .endpoint
            .http
            .post(self.endpoint.url("/chat/completions"))
            .bearer_auth(&self.api_key)
            .json(&self.request(input));
        let (raw_json, res): (Value, ChatResponse) = send_json(Provider::Groq, req).await?;

        let Some(content) = Self::first_content(&res) else {
            return Err(LlmDiagnosticsError {
                provider: Provider::Groq,
                stage: "empty",
                detail: "response has no message content".to_string(),
                raw_output: None,
                raw_response_json: Some(raw_json),
            }
            .into());
        };

        json::parse_analysis(content, &input.symbol, Provider::Groq.as_str(), generated_at).map_err(
            |err| {
                LlmDiagnosticsError {
                    provider: Provider::Groq,
                    stage: "parse",
                    detail: format!("{err:#}"),
                    raw_output: Some(content.to_string()),
                    raw_response_json: Some(raw_json.clone()),
                }
                .into()
            },
        )
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
    response_format: ResponseFormat,
}

#[derive(Debug, Clone, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Clone, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}
