use async_trait::async_trait;
use aws_sdk_bedrockruntime::error::{DisplayErrorContext, SdkError};
use aws_sdk_bedrockruntime::operation::invoke_model::InvokeModelError;
use aws_sdk_bedrockruntime::primitives::Blob;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{info, warn};

use crate::models::ImageModel;
use crate::validation::ImageParams;

const NEGATIVE_PROMPT: &str = "blurry, low quality, distorted, watermark, text, logo";

#[derive(Debug, Error)]
pub enum BedrockImageError {
    #[error("Rate limit exceeded, please try again later")]
    Throttled,
    #[error("Invalid parameters for {model}: {message}")]
    Validation { model: ImageModel, message: String },
    #[error("Model {0} is not ready, please try again later")]
    ModelNotReady(ImageModel),
    #[error("Service quota exceeded for image generation")]
    QuotaExceeded,
    #[error("Bedrock image generation error: {0}")]
    Service(String),
    #[error("No image data found in Bedrock response")]
    MissingImage,
}

impl BedrockImageError {
    pub fn is_throttled(&self) -> bool {
        matches!(self, BedrockImageError::Throttled)
    }
}

/// Base64 image returned by a model.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedImage {
    pub data: String,
    pub model: ImageModel,
}

#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(&self, params: &ImageParams) -> Result<GeneratedImage, BedrockImageError>;
}

/// Request body for `InvokeModel`. Nova Canvas and Titan share the
/// `TEXT_IMAGE` task shape; only Nova accepts the conditioning image list.
pub fn build_payload(params: &ImageParams) -> Value {
    let mut text_to_image = json!({
        "text": params.prompt,
        "negativeText": NEGATIVE_PROMPT,
    });
    if params.model == ImageModel::NovaCanvas {
        text_to_image["images"] = json!([]);
    }

    json!({
        "taskType": "TEXT_IMAGE",
        "textToImageParams": text_to_image,
        "imageGenerationConfig": {
            "numberOfImages": 1,
            "height": params.height,
            "width": params.width,
            "cfgScale": params.cfg_scale,
            "seed": params.seed,
            "quality": params.quality.as_str(),
        }
    })
}

/// Nova answers with `images[0]`, Titan with `artifacts[0].base64`.
pub fn extract_image_data(body: &Value) -> Result<String, BedrockImageError> {
    body.pointer("/images/0")
        .or_else(|| body.pointer("/artifacts/0/base64"))
        .and_then(Value::as_str)
        .filter(|data| !data.is_empty())
        .map(str::to_string)
        .ok_or(BedrockImageError::MissingImage)
}

fn classify_error<R>(model: ImageModel, err: SdkError<InvokeModelError, R>) -> BedrockImageError
where
    R: std::fmt::Debug + 'static,
{
    let context = DisplayErrorContext(&err).to_string();
    let service_error = match err {
        SdkError::ServiceError(service) => service.into_err(),
        _ => return BedrockImageError::Service(context),
    };

    if service_error.is_throttling_exception() {
        BedrockImageError::Throttled
    } else if service_error.is_validation_exception() {
        BedrockImageError::Validation {
            model,
            message: service_error.to_string(),
        }
    } else if service_error.is_model_not_ready_exception() {
        BedrockImageError::ModelNotReady(model)
    } else if service_error.is_service_quota_exceeded_exception() {
        BedrockImageError::QuotaExceeded
    } else {
        BedrockImageError::Service(context)
    }
}

pub struct BedrockImageService {
    client: aws_sdk_bedrockruntime::Client,
}

impl BedrockImageService {
    pub fn new(client: aws_sdk_bedrockruntime::Client) -> Self {
        BedrockImageService { client }
    }
}

#[async_trait]
impl ImageGenerator for BedrockImageService {
    async fn generate(&self, params: &ImageParams) -> Result<GeneratedImage, BedrockImageError> {
        let payload = build_payload(params);
        info!(
            model = params.model.id(),
            width = params.width,
            height = params.height,
            quality = params.quality.as_str(),
            cfg_scale = params.cfg_scale,
            "calling Bedrock"
        );

        let body = serde_json::to_vec(&payload)
            .map_err(|err| BedrockImageError::Service(err.to_string()))?;
        let response = self
            .client
            .invoke_model()
            .model_id(params.model.id())
            .content_type("application/json")
            .accept("application/json")
            .body(Blob::new(body))
            .send()
            .await
            .map_err(|err| {
                let err = classify_error(params.model, err);
                warn!(model = params.model.id(), "Bedrock call failed: {}", err);
                err
            })?;

        let response_body: Value = serde_json::from_slice(response.body().as_ref())
            .map_err(|err| BedrockImageError::Service(format!("invalid response body: {err}")))?;
        let data = extract_image_data(&response_body)?;

        Ok(GeneratedImage {
            data,
            model: params.model,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::Quality;

    fn params(model: ImageModel) -> ImageParams {
        ImageParams {
            prompt: "jar on marble".to_string(),
            model,
            width: 1024,
            height: 768,
            quality: Quality::Premium,
            cfg_scale: 8.0,
            seed: 7,
        }
    }

    #[test]
    fn nova_payload_carries_image_list() {
        let payload = build_payload(&params(ImageModel::NovaCanvas));
        assert_eq!(payload["taskType"], "TEXT_IMAGE");
        assert_eq!(payload["textToImageParams"]["images"], json!([]));
        assert_eq!(payload["textToImageParams"]["negativeText"], NEGATIVE_PROMPT);
        assert_eq!(payload["imageGenerationConfig"]["height"], 768);
        assert_eq!(payload["imageGenerationConfig"]["quality"], "premium");
    }

    #[test]
    fn titan_payload_omits_image_list() {
        let payload = build_payload(&params(ImageModel::TitanV1));
        assert!(payload["textToImageParams"].get("images").is_none());
        assert_eq!(payload["imageGenerationConfig"]["seed"], 7);
    }

    #[test]
    fn extracts_either_response_shape() {
        let nova = json!({ "images": ["bm92YQ=="] });
        assert_eq!(extract_image_data(&nova).unwrap(), "bm92YQ==");

        let titan = json!({ "artifacts": [{ "base64": "dGl0YW4=" }] });
        assert_eq!(extract_image_data(&titan).unwrap(), "dGl0YW4=");

        assert!(matches!(
            extract_image_data(&json!({ "images": [] })),
            Err(BedrockImageError::MissingImage)
        ));
    }

    #[test]
    fn throttled_error_mentions_rate_limit() {
        let message = BedrockImageError::Throttled.to_string();
        assert!(crate::invoker::is_rate_limited(&message));
    }
}
