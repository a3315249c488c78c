use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::UpstreamError;
use crate::models::PromptVariant;

const RATE_LIMIT_MARKER: &str = "rate limit";
const LOG_BODY_LIMIT: usize = 500;

/// Retry budget for one model.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: usize,
    pub rate_limit_base_delay: Duration,
    pub rate_limit_max_delay: Duration,
    pub network_retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 2,
            rate_limit_base_delay: Duration::from_secs(5),
            rate_limit_max_delay: Duration::from_secs(20),
            network_retry_delay: Duration::from_secs(3),
        }
    }
}

impl RetryPolicy {
    /// Delay before retrying after the rate-limited attempt `attempt` (0-based):
    /// base, 2x base, 4x base, ... capped at the maximum.
    pub fn rate_limit_delay(&self, attempt: usize) -> Duration {
        let factor = 1u32.checked_shl(attempt.min(31) as u32).unwrap_or(u32::MAX);
        self.rate_limit_base_delay
            .saturating_mul(factor)
            .min(self.rate_limit_max_delay)
    }
}

/// One call about to be made, as seen in logs.
#[derive(Debug, Clone)]
pub struct ModelAttempt<'a> {
    pub model: &'a str,
    pub prompt_variant: PromptVariant,
    pub http_status: Option<u16>,
    pub rate_limited: bool,
}

/// Completed HTTP exchange. `status` may be a failure: the caller decides
/// whether to fall back.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub body: String,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn is_rate_limited(&self) -> bool {
        !self.is_success() && is_rate_limited(&self.body)
    }

    pub fn json(&self) -> Result<Value, UpstreamError> {
        serde_json::from_str(&self.body)
            .map_err(|err| UpstreamError::Malformed(format!("response is not JSON: {err}")))
    }

    /// Converts a failed exchange into the error the orchestrator records.
    pub fn into_result(self) -> Result<RawResponse, UpstreamError> {
        if self.is_success() {
            return Ok(self);
        }
        let rate_limited = self.is_rate_limited();
        Err(UpstreamError::Status {
            status: self.status.as_u16(),
            body: truncate_for_log(&self.body, LOG_BODY_LIMIT),
            rate_limited,
        })
    }
}

pub fn is_rate_limited(body: &str) -> bool {
    body.to_lowercase().contains(RATE_LIMIT_MARKER)
}

pub fn truncate_for_log(value: &str, limit: usize) -> String {
    if value.chars().count() <= limit {
        return value.to_string();
    }
    let truncated: String = value.chars().take(limit).collect();
    format!("{truncated}... (truncated)")
}

/// Issues POSTs against generation endpoints. Cheap to clone; the inner
/// client pools connections.
#[derive(Debug, Clone)]
pub struct ModelInvoker {
    client: Client,
}

impl ModelInvoker {
    pub fn new(client: Client) -> Self {
        ModelInvoker { client }
    }

    pub fn build() -> Result<Self, reqwest::Error> {
        let client = Client::builder().build()?;
        Ok(ModelInvoker::new(client))
    }

    /// Sends `payload` until it succeeds, fails without a rate-limit marker,
    /// or the attempt budget runs out.
    ///
    /// Rate-limited responses back off exponentially. Transport errors and
    /// timeouts wait a fixed delay; the last one is returned as an error.
    pub async fn invoke(
        &self,
        endpoint: &str,
        payload: &Value,
        timeout: Duration,
        policy: &RetryPolicy,
        attempt_info: ModelAttempt<'_>,
    ) -> Result<RawResponse, UpstreamError> {
        let max_attempts = policy.max_attempts.max(1);
        let mut attempt = 0usize;

        loop {
            let remaining = attempt + 1 < max_attempts;
            debug!(
                model = attempt_info.model,
                variant = ?attempt_info.prompt_variant,
                attempt = attempt + 1,
                max_attempts,
                "sending model request"
            );

            let sent = self
                .client
                .post(endpoint)
                .timeout(timeout)
                .json(payload)
                .send()
                .await;

            let response = match sent {
                Ok(response) => response,
                Err(err) => {
                    let err = UpstreamError::from(err);
                    warn!(
                        model = attempt_info.model,
                        attempt = attempt + 1,
                        kind = err.kind(),
                        retrying = remaining,
                        "model request failed: {}",
                        err
                    );
                    if remaining {
                        tokio::time::sleep(policy.network_retry_delay).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(err);
                }
            };

            let status = response.status();
            let body = match response.text().await {
                Ok(body) => body,
                Err(err) => {
                    let err = UpstreamError::from(err);
                    if remaining {
                        warn!(model = attempt_info.model, "failed to read body: {}", err);
                        tokio::time::sleep(policy.network_retry_delay).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(err);
                }
            };

            let raw = RawResponse { status, body };
            let record = ModelAttempt {
                http_status: Some(status.as_u16()),
                rate_limited: raw.is_rate_limited(),
                ..attempt_info.clone()
            };

            if raw.is_success() {
                info!(
                    model = record.model,
                    status = status.as_u16(),
                    attempt = attempt + 1,
                    "model request succeeded"
                );
                return Ok(raw);
            }

            warn!(
                model = record.model,
                variant = ?record.prompt_variant,
                status = status.as_u16(),
                rate_limited = record.rate_limited,
                body = %truncate_for_log(&raw.body, LOG_BODY_LIMIT),
                "model request returned an error status"
            );

            if record.rate_limited && remaining {
                let wait = policy.rate_limit_delay(attempt);
                info!(
                    model = record.model,
                    wait_ms = wait.as_millis() as u64,
                    "rate limited, backing off before retry"
                );
                tokio::time::sleep(wait).await;
                attempt += 1;
                continue;
            }

            return Ok(raw);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_rate_limit_markers() {
        assert!(is_rate_limited("{\"error\":\"Rate limit exceeded\"}"));
        assert!(is_rate_limited("hit the RATE LIMIT, slow down"));
        assert!(!is_rate_limited("Internal Server Error"));
        assert!(!is_rate_limited(""));
    }

    #[test]
    fn rate_limit_marker_ignores_case() {
        assert!(is_rate_limited("Rate Limit Exceeded"));
        assert!(is_rate_limited("rate limit exceeded"));
        assert!(!is_rate_limited("Too many limits were rated"));
    }

    #[test]
    fn rate_limit_delay_doubles_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.rate_limit_delay(0), Duration::from_secs(5));
        assert_eq!(policy.rate_limit_delay(1), Duration::from_secs(10));
        assert_eq!(policy.rate_limit_delay(2), Duration::from_secs(20));
        assert_eq!(policy.rate_limit_delay(3), Duration::from_secs(20));
        assert_eq!(policy.rate_limit_delay(64), Duration::from_secs(20));
    }

    #[test]
    fn successful_response_is_never_rate_limited() {
        let raw = RawResponse {
            status: StatusCode::OK,
            body: "rate limit docs".to_string(),
        };
        assert!(!raw.is_rate_limited());
        assert!(raw.into_result().is_ok());
    }

    #[test]
    fn failed_response_converts_to_status_error() {
        let raw = RawResponse {
            status: StatusCode::FORBIDDEN,
            body: "Rate limit exceeded".to_string(),
        };
        let err = raw.into_result().unwrap_err();
        assert!(err.is_rate_limited());
    }

    #[test]
    fn truncates_long_bodies() {
        let text = "a".repeat(20);
        assert_eq!(truncate_for_log(&text, 5), "aaaaa... (truncated)");
        assert_eq!(truncate_for_log("short", 10), "short");
    }
}
