use std::env;
use std::time::Duration;

use tracing::info;

use crate::invoker::RetryPolicy;

pub const DEFAULT_PRIMARY_TEXT_MODEL: &str = "anthropic.claude-3-5-sonnet-20240620-v1:0";
pub const DEFAULT_SECONDARY_TEXT_MODEL: &str = "anthropic.claude-3-haiku-20240307-v1:0";

/// Process-wide settings, loaded once before the first request is served.
#[derive(Debug, Clone)]
pub struct Config {
    pub text_endpoint: Option<String>,
    pub image_endpoint: Option<String>,
    pub primary_text_model: String,
    pub secondary_text_model: Option<String>,
    pub text_timeout: Duration,
    pub image_timeout: Duration,
    pub text_retry: RetryPolicy,
    pub image_primary_retry: RetryPolicy,
    pub image_secondary_retry: RetryPolicy,
    pub bedrock_region: String,
    pub s3_bucket: String,
    pub s3_region: String,
    pub image_function_name: String,
    pub image_function_region: String,
    pub port: u16,
    pub log_level: String,
    pub log_json: bool,
}

fn env_string(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_optional(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_usize(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|value| value.trim().parse::<usize>().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Self {
        let rate_limit_base = Duration::from_millis(env_u64("RATE_LIMIT_BASE_DELAY_MS", 5_000));
        let rate_limit_max = Duration::from_millis(env_u64("RATE_LIMIT_MAX_DELAY_MS", 20_000));
        let network_delay = Duration::from_millis(env_u64("NETWORK_RETRY_DELAY_MS", 3_000));
        let policy = |max_attempts: usize| RetryPolicy {
            max_attempts: max_attempts.max(1),
            rate_limit_base_delay: rate_limit_base,
            rate_limit_max_delay: rate_limit_max,
            network_retry_delay: network_delay,
        };

        // An explicitly empty FORMULA_SECONDARY_MODEL disables the second tier.
        let secondary_text_model = match env::var("FORMULA_SECONDARY_MODEL") {
            Ok(value) if value.trim().is_empty() => None,
            Ok(value) => Some(value.trim().to_string()),
            Err(_) => Some(DEFAULT_SECONDARY_TEXT_MODEL.to_string()),
        };

        Config {
            text_endpoint: env_optional("LAMBDA_BEDROCK_ENDPOINT"),
            image_endpoint: env_optional("LAMBDA_BEDROCK_IMAGE_ENDPOINT"),
            primary_text_model: env_string("FORMULA_PRIMARY_MODEL", DEFAULT_PRIMARY_TEXT_MODEL),
            secondary_text_model,
            text_timeout: Duration::from_secs(env_u64("TEXT_TIMEOUT_SECS", 30)),
            image_timeout: Duration::from_secs(env_u64("IMAGE_TIMEOUT_SECS", 60)),
            text_retry: policy(env_usize("TEXT_MAX_ATTEMPTS", 2)),
            image_primary_retry: policy(env_usize("IMAGE_PRIMARY_MAX_ATTEMPTS", 1)),
            image_secondary_retry: policy(env_usize("IMAGE_SECONDARY_MAX_ATTEMPTS", 1)),
            bedrock_region: env_string("BEDROCK_REGION", "us-east-1"),
            s3_bucket: env_string("S3_BUCKET", "formula-platform-generated-images"),
            s3_region: env_string("AWS_REGION", "ap-southeast-1"),
            image_function_name: env_string("IMAGE_FUNCTION_NAME", "BedrockImageGeneration"),
            image_function_region: env_string("IMAGE_FUNCTION_REGION", "us-east-1"),
            port: env_u64("PORT", 3000).min(u16::MAX as u64) as u16,
            log_level: env_string("LOG_LEVEL", "info"),
            log_json: env_string("LOG_FORMAT", "text").eq_ignore_ascii_case("json"),
        }
    }

    pub fn log_summary(&self) {
        info!(
            text_endpoint = self.text_endpoint.is_some(),
            image_endpoint = self.image_endpoint.is_some(),
            primary_text_model = %self.primary_text_model,
            secondary_text_model = ?self.secondary_text_model,
            "configuration loaded"
        );
    }
}

impl Default for Config {
    /// Unconfigured endpoints with the documented retry defaults.
    fn default() -> Self {
        let policy = |max_attempts| RetryPolicy {
            max_attempts,
            ..RetryPolicy::default()
        };
        Config {
            text_endpoint: None,
            image_endpoint: None,
            primary_text_model: DEFAULT_PRIMARY_TEXT_MODEL.to_string(),
            secondary_text_model: Some(DEFAULT_SECONDARY_TEXT_MODEL.to_string()),
            text_timeout: Duration::from_secs(30),
            image_timeout: Duration::from_secs(60),
            text_retry: policy(2),
            image_primary_retry: policy(1),
            image_secondary_retry: policy(1),
            bedrock_region: "us-east-1".to_string(),
            s3_bucket: "formula-platform-generated-images".to_string(),
            s3_region: "ap-southeast-1".to_string(),
            image_function_name: "BedrockImageGeneration".to_string(),
            image_function_region: "us-east-1".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_json: false,
        }
    }
}
