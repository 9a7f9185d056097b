//! HTTP plumbing shared by the provider clients.

use crate::llm::error::LlmDiagnosticsError;
use crate::llm::Provider;
use anyhow::Context;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

pub(crate) struct EndpointDefaults {
    pub base_url: &'static str,
    pub model: &'static str,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

/// Connection settings for one provider. Each field can be overridden with
/// `<PREFIX>_BASE_URL`, `<PREFIX>_MODEL`, `<PREFIX>_MAX_TOKENS` or `<PREFIX>_TIMEOUT_SECS`.
#[derive(Debug, Clone)]
pub(crate) struct Endpoint {
    pub http: reqwest::Client,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
}

impl Endpoint {
    pub fn from_env(prefix: &str, defaults: EndpointDefaults) -> anyhow::Result<Self> {
        let var = |suffix: &str| std::env::var(format!("{prefix}_{suffix}")).ok();

        let timeout_secs = var("TIMEOUT_SECS")
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(defaults.timeout_secs);
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self {
            http,
            base_url: var("BASE_URL").unwrap_or_else(|| defaults.base_url.to_string()),
            model: var("MODEL").unwrap_or_else(|| defaults.model.to_string()),
            max_tokens: var("MAX_TOKENS")
                .and_then(|s| s.parse::<u32>().ok())
                .unwrap_or(defaults.max_tokens),
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }
}

/// Sends `req` once. A non-2xx status becomes an `http` stage diagnostic carrying the
/// body; a 2xx body is returned both raw and decoded.
pub(crate) async fn send_json<T: DeserializeOwned>(
    provider: Provider,
    req: reqwest::RequestBuilder,
) -> anyhow::Result<(Value, T)> {
    let res = req
        .send()
        .await
        .with_context(|| format!("{provider} request failed"))?;

    let status = res.status();
    let body = res
        .text()
        .await
        .with_context(|| format!("failed to read {provider} response body"))?;
    if !status.is_success() {
        return Err(LlmDiagnosticsError {
            provider,
            stage: "http",
            detail: format!("status={status}"),
            raw_response_json: serde_json::from_str::<Value>(&body).ok(),
            raw_output: Some(body),
        }
        .into());
    }

    let raw: Value = serde_json::from_str(&body)
        .with_context(|| format!("{provider} returned non-JSON body: {body}"))?;
    let decoded = serde_json::from_value::<T>(raw.clone())
        .with_context(|| format!("unexpected {provider} response shape"))?;
    Ok((raw, decoded))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joins_without_double_slash() {
        let endpoint = Endpoint {
            http: reqwest::Client::new(),
            base_url: "https://api.example.com/v1/".to_string(),
            model: "m".to_string(),
            max_tokens: 1,
        };
        assert_eq!(
            endpoint.url("/chat/completions"),
            "https://api.example.com/v1/chat/completions"
        );
    }
}
