use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Failure of one outbound call to a generation endpoint.
///
/// None of these reach the client: the fallback pipeline turns every variant
/// into a degraded result.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("transport failure: {0}")]
    Network(String),
    #[error("upstream responded with status {status}: {body}")]
    Status {
        status: u16,
        body: String,
        rate_limited: bool,
    },
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl UpstreamError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(
            self,
            UpstreamError::Status {
                rate_limited: true,
                ..
            }
        )
    }

    /// Short label used in structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            UpstreamError::Timeout(_) => "timeout",
            UpstreamError::Network(_) => "network",
            UpstreamError::Status {
                rate_limited: true, ..
            } => "rate_limited",
            UpstreamError::Status { .. } => "status",
            UpstreamError::Malformed(_) => "malformed",
        }
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            UpstreamError::Timeout(err.to_string())
        } else {
            UpstreamError::Network(err.to_string())
        }
    }
}

/// Errors surfaced to web API callers. Only client input problems qualify.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        };
        let body = json!({
            "success": false,
            "error": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}
