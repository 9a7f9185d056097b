use crate::llm::Provider;
use serde_json::Value;
use std::fmt;

/// Provider failure with enough raw context to debug a bad response. Carried inside
/// `anyhow::Error`; callers may `downcast_ref` for the raw payloads.
#[derive(Debug, Clone)]
pub struct LlmDiagnosticsError {
    pub provider: Provider,
    pub stage: &'static str,
    pub detail: String,
    pub raw_output: Option<String>,
    pub raw_response_json: Option<Value>,
}

impl fmt::Display for LlmDiagnosticsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "analysis provider error (provider={}, stage={}): {}",
            self.provider, self.stage, self.detail
        )
    }
}

impl std::error::Error for LlmDiagnosticsError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downcasts_from_anyhow() {
        let err: anyhow::Error = LlmDiagnosticsError {
            provider: Provider::Groq,
            stage: "http",
            detail: "status=429".to_string(),
            raw_output: Some("rate limited".to_string()),
            raw_response_json: None,
        }
        .into();

        assert_eq!(
            err.to_string(),
            "analysis provider error (provider=groq, stage=http): status=429"
        );
        let diag = err.downcast_ref::<LlmDiagnosticsError>().unwrap();
        assert_eq!(diag.raw_output.as_deref(), Some("rate limited"));
    }
}
