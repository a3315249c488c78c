use std::sync::Arc;

use rand::Rng;
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use crate::config::Config;
use crate::demo_image::DemoImageParams;
use crate::error::UpstreamError;
use crate::formula::{degraded_formula, FormulaResult};
use crate::invoker::{ModelAttempt, ModelInvoker, RetryPolicy};
use crate::language::{detect_language, Language};
use crate::models::{ImageModel, PromptVariant};
use crate::normalize::{normalize_formula, normalize_image_url};
use crate::prompt::{formula_prompt, image_prompt, ImagePromptDetails, DEFAULT_PRODUCT_TYPE};

pub const PRIMARY_IMAGE_MODEL: ImageModel = ImageModel::TitanV1;
pub const SECONDARY_IMAGE_MODEL: ImageModel = ImageModel::NovaCanvas;

const TEXT_MAX_TOKENS: u32 = 800;
const TEXT_TEMPERATURE: f64 = 0.7;
const IMAGE_SIZE: u32 = 1024;
const IMAGE_CFG_SCALE: f64 = 8.0;

/// One formula request after language detection.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub raw_text: String,
    pub language: Language,
}

impl GenerationRequest {
    pub fn new(raw_text: impl Into<String>) -> Self {
        let raw_text = raw_text.into();
        let language = detect_language(&raw_text);
        GenerationRequest { raw_text, language }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageRequest {
    pub product_name: String,
    pub tonal_styling: String,
    pub product_type: Option<String>,
}

impl ImageRequest {
    fn prompt_details(&self) -> ImagePromptDetails<'_> {
        ImagePromptDetails {
            product_name: &self.product_name,
            tonal_styling: &self.tonal_styling,
            product_type: self.product_type.as_deref(),
        }
    }

    pub fn demo_image_url(&self) -> String {
        let details = self.prompt_details();
        DemoImageParams::new(&self.product_name, &self.tonal_styling, details.product_type()).url()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ImageResult {
    fn image(url: String) -> Self {
        ImageResult {
            success: true,
            image_url: Some(url),
            error: None,
        }
    }
}

/// Primary model, secondary model, then a locally built result. Neither
/// entry point returns an error.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: Arc<Config>,
    invoker: ModelInvoker,
}

impl Pipeline {
    pub fn new(config: Arc<Config>, invoker: ModelInvoker) -> Self {
        Pipeline { config, invoker }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub async fn generate_formula(&self, request: &GenerationRequest) -> FormulaResult {
        info!(
            language = request.language.output_name(),
            chars = request.raw_text.chars().count(),
            "formula generation requested"
        );

        let Some(endpoint) = self.config.text_endpoint.as_deref() else {
            warn!("LAMBDA_BEDROCK_ENDPOINT not configured, returning degraded formula");
            return degraded_formula(&request.raw_text, request.language);
        };

        let prompt = formula_prompt(&request.raw_text, request.language);
        let models = std::iter::once(self.config.primary_text_model.as_str())
            .chain(self.config.secondary_text_model.as_deref());

        for (tier, model) in models.enumerate() {
            match self.try_formula_model(endpoint, model, &prompt).await {
                Ok(formula) => {
                    info!(model, tier, "formula generated");
                    return formula;
                }
                Err(err) => {
                    warn!(model, tier, kind = err.kind(), "formula model failed: {}", err);
                }
            }
        }

        warn!("all formula models failed, returning degraded formula");
        degraded_formula(&request.raw_text, request.language)
    }

    async fn try_formula_model(
        &self,
        endpoint: &str,
        model: &str,
        prompt: &str,
    ) -> Result<FormulaResult, UpstreamError> {
        let payload = json!({
            "message": prompt,
            "model": model,
            "max_tokens": TEXT_MAX_TOKENS,
            "temperature": TEXT_TEMPERATURE,
        });
        let attempt = ModelAttempt {
            model,
            prompt_variant: PromptVariant::Formula,
            http_status: None,
            rate_limited: false,
        };
        let response = self
            .invoker
            .invoke(
                endpoint,
                &payload,
                self.config.text_timeout,
                &self.config.text_retry,
                attempt,
            )
            .await?
            .into_result()?;
        normalize_formula(response.json()?)
    }

    pub async fn generate_image(&self, request: &ImageRequest) -> ImageResult {
        info!(
            product = %request.product_name,
            product_type = request.product_type.as_deref().unwrap_or(DEFAULT_PRODUCT_TYPE),
            "image generation requested"
        );

        let Some(endpoint) = self.config.image_endpoint.as_deref() else {
            warn!("LAMBDA_BEDROCK_IMAGE_ENDPOINT not configured, returning demo image");
            return ImageResult::image(request.demo_image_url());
        };

        let tiers: [(ImageModel, &RetryPolicy); 2] = [
            (PRIMARY_IMAGE_MODEL, &self.config.image_primary_retry),
            (SECONDARY_IMAGE_MODEL, &self.config.image_secondary_retry),
        ];

        let mut failures = Vec::with_capacity(tiers.len());
        for (model, policy) in tiers {
            match self.try_image_model(endpoint, model, policy, request).await {
                Ok(url) => {
                    info!(model = model.id(), url = %url, "image generated");
                    return ImageResult::image(url);
                }
                Err(err) => {
                    warn!(model = model.id(), kind = err.kind(), "image model failed: {}", err);
                    failures.push(err);
                }
            }
        }

        let all_rate_limited = failures.iter().all(UpstreamError::is_rate_limited);
        let url = request.demo_image_url();
        warn!(
            all_rate_limited,
            url = %url,
            "both image models failed, returning demo image"
        );
        ImageResult::image(url)
    }

    async fn try_image_model(
        &self,
        endpoint: &str,
        model: ImageModel,
        policy: &RetryPolicy,
        request: &ImageRequest,
    ) -> Result<String, UpstreamError> {
        let prompt = image_prompt(model, &request.prompt_details());
        let seed: u32 = rand::thread_rng().gen_range(0..1_000_000);
        let payload = json!({
            "prompt": prompt,
            "model": model.id(),
            "width": IMAGE_SIZE,
            "height": IMAGE_SIZE,
            "quality": "premium",
            "cfg_scale": IMAGE_CFG_SCALE,
            "seed": seed,
        });
        let attempt = ModelAttempt {
            model: model.id(),
            prompt_variant: model.prompt_variant(),
            http_status: None,
            rate_limited: false,
        };
        let response = self
            .invoker
            .invoke(
                endpoint,
                &payload,
                self.config.image_timeout,
                policy,
                attempt,
            )
            .await?
            .into_result()?;
        normalize_image_url(response.json()?)
    }
}
