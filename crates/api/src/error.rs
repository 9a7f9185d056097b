use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use divtrack_core::dashboard::AnalysisUnavailable;
use divtrack_core::staleness::GenerationFailed;
use serde_json::json;

#[derive(Debug)]
pub enum ApiError {
    Degraded,
    BadRequest(String),
    NotFound(String),
    AnalysisUnavailable,
    Upstream(anyhow::Error),
    Internal(anyhow::Error),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Degraded | Self::AnalysisUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Text shown to the client. Internal detail stays in the logs.
    fn message(&self) -> String {
        match self {
            Self::Degraded => "record store is unavailable".to_string(),
            Self::BadRequest(msg) | Self::NotFound(msg) => msg.clone(),
            Self::AnalysisUnavailable => "analysis provider is not configured".to_string(),
            Self::Upstream(_) => "analysis could not be generated; try again later".to_string(),
            Self::Internal(_) => "failed to load data".to_string(),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        if err.downcast_ref::<AnalysisUnavailable>().is_some() {
            Self::AnalysisUnavailable
        } else if err.downcast_ref::<GenerationFailed>().is_some() {
            Self::Upstream(err)
        } else {
            Self::Internal(err)
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            Self::Upstream(err) | Self::Internal(err) => {
                sentry_anyhow::capture_anyhow(err);
                tracing::error!(status = %status, error = %format!("{err:#}"), "request failed");
            }
            _ => tracing::debug!(status = %status, "request rejected"),
        }
        (status, Json(json!({ "error": self.message() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use divtrack_core::domain::Symbol;

    #[test]
    fn generation_failures_map_to_bad_gateway() {
        let err = anyhow::anyhow!("status=500").context(GenerationFailed {
            symbol: Symbol::parse("KO").unwrap(),
        });
        let api: ApiError = err.into();
        assert_eq!(api.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn store_failures_hide_detail() {
        let api: ApiError = anyhow::anyhow!("connection refused").into();
        assert_eq!(api.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(api.message(), "failed to load data");
    }

    #[test]
    fn missing_provider_is_unavailable() {
        let api: ApiError = anyhow::Error::new(AnalysisUnavailable).into();
        assert_eq!(api.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
