use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderName, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Map, Value};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

use crate::bedrock_image::{BedrockImageError, GeneratedImage, ImageGenerator};
use crate::models::ImageModel;
use crate::prompt::{truncate_chars, CONCISE_PROMPT_MAX_CHARS};
use crate::storage::{ImageStore, StorageError, StoredImage};
use crate::validation::{sanitize_prompt, validate_image_request, ImageParams, Quality};

const FALLBACK_IMAGE_MODEL: ImageModel = ImageModel::TitanV1;

#[derive(Clone)]
pub struct ImageLambdaState {
    pub generator: Arc<dyn ImageGenerator>,
    pub store: Arc<dyn ImageStore>,
    pub region: String,
    pub bucket: String,
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn success_response(message: &str, data: Value) -> Response {
    let mut body = Map::new();
    body.insert("success".to_string(), Value::Bool(true));
    body.insert("message".to_string(), Value::from(message));
    body.insert("timestamp".to_string(), Value::from(timestamp()));
    if let Value::Object(data) = data {
        body.extend(data);
    }
    (StatusCode::OK, Json(Value::Object(body))).into_response()
}

fn error_response(status: StatusCode, error: &str, details: Option<Value>) -> Response {
    let mut body = json!({
        "success": false,
        "error": error,
        "statusCode": status.as_u16(),
        "timestamp": timestamp(),
    });
    if let Some(details) = details {
        body["details"] = details;
    }
    (status, Json(body)).into_response()
}

/// Failure of one generate request, mapped onto an HTTP status.
#[derive(Debug)]
enum GenerateFailure {
    Generation(BedrockImageError),
    BothModels(BedrockImageError),
    Storage(StorageError),
}

impl IntoResponse for GenerateFailure {
    fn into_response(self) -> Response {
        match self {
            GenerateFailure::Generation(err) | GenerateFailure::BothModels(err) if err.is_throttled() => {
                error_response(
                    StatusCode::TOO_MANY_REQUESTS,
                    "Rate Limit Exceeded",
                    Some(Value::from(err.to_string())),
                )
            }
            GenerateFailure::BothModels(_) => error_response(
                StatusCode::BAD_GATEWAY,
                "Image Generation Failed",
                Some(Value::from("Both Nova Canvas and Titan failed to generate image")),
            ),
            GenerateFailure::Generation(err) => error_response(
                StatusCode::BAD_GATEWAY,
                "Image Generation Failed",
                Some(Value::from(err.to_string())),
            ),
            GenerateFailure::Storage(err) => error_response(
                StatusCode::SERVICE_UNAVAILABLE,
                "Storage Error",
                Some(Value::from(format!("Unable to store generated image: {err}"))),
            ),
        }
    }
}

/// Runs the requested model and, when Nova Canvas was asked for and failed,
/// retries once on Titan with the prompt cut to Titan's input limit.
async fn generate_with_fallback(
    generator: &dyn ImageGenerator,
    params: &mut ImageParams,
) -> Result<(GeneratedImage, bool), GenerateFailure> {
    let requested = generator.generate(params).await;
    match requested {
        Ok(image) => Ok((image, false)),
        Err(err) if params.model == ImageModel::NovaCanvas => {
            warn!("Nova Canvas failed ({}), trying Titan Image Generator", err);
            params.model = FALLBACK_IMAGE_MODEL;
            params.prompt = truncate_chars(&params.prompt, CONCISE_PROMPT_MAX_CHARS);
            generator
                .generate(params)
                .await
                .map(|image| (image, true))
                .map_err(GenerateFailure::BothModels)
        }
        Err(err) => Err(GenerateFailure::Generation(err)),
    }
}

fn generated_body(params: &ImageParams, stored: &StoredImage) -> Value {
    json!({
        "imageUrl": stored.public_url,
        "s3_url": stored.public_url,
        "presigned_url": stored.public_url,
        "model": params.model.id(),
        "metadata": {
            "width": params.width,
            "height": params.height,
            "model": params.model.id(),
            "s3Key": stored.key,
            "timestamp": timestamp(),
        }
    })
}

async fn generate(state: &ImageLambdaState, body: &[u8]) -> Response {
    if body.iter().all(u8::is_ascii_whitespace) {
        return error_response(
            StatusCode::BAD_REQUEST,
            "Validation Error",
            Some(json!(["Request body is required"])),
        );
    }
    let body: Value = match serde_json::from_slice(body) {
        Ok(body) => body,
        Err(err) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "Validation Error",
                Some(json!([format!("Invalid JSON in request body: {err}")])),
            );
        }
    };

    let mut params = match validate_image_request(&body) {
        Ok(params) => params,
        Err(errors) => {
            return error_response(StatusCode::BAD_REQUEST, "Validation Error", Some(json!(errors)));
        }
    };

    params.prompt = sanitize_prompt(&params.prompt);
    if params.prompt.is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            "Invalid Input",
            Some(Value::from("Prompt cannot be empty after sanitization")),
        );
    }

    info!(
        model = params.model.id(),
        prompt_chars = params.prompt.chars().count(),
        "processing image generation request"
    );

    let (image, used_fallback) = match generate_with_fallback(state.generator.as_ref(), &mut params).await {
        Ok(generated) => generated,
        Err(failure) => {
            error!("image generation failed: {:?}", failure);
            return failure.into_response();
        }
    };

    let stored = match state.store.upload(&image.data, &params).await {
        Ok(stored) => stored,
        Err(err) => {
            error!("storing generated image failed: {}", err);
            return GenerateFailure::Storage(err).into_response();
        }
    };

    info!(model = image.model.id(), url = %stored.public_url, "image generated and uploaded");
    let message = if used_fallback {
        "Image generated successfully with fallback model"
    } else {
        "Image generated successfully"
    };
    success_response(message, generated_body(&params, &stored))
}

async fn dispatch(State(state): State<ImageLambdaState>, method: Method, body: Bytes) -> Response {
    match method {
        Method::POST => generate(&state, &body).await,
        _ => error_response(
            StatusCode::METHOD_NOT_ALLOWED,
            "Method Not Allowed",
            Some(Value::from("Only POST requests are supported")),
        ),
    }
}

fn probe_params() -> ImageParams {
    ImageParams {
        prompt: "A simple test image: red apple on white background".to_string(),
        model: ImageModel::NovaCanvas,
        width: 512,
        height: 512,
        quality: Quality::Standard,
        cfg_scale: 7.0,
        seed: 12345,
    }
}

async fn health(State(state): State<ImageLambdaState>) -> Response {
    let params = probe_params();
    let (bedrock, s3) = tokio::join!(state.generator.generate(&params), state.store.check());

    let status = |ok: bool| if ok { "connected" } else { "disconnected" };
    let services = json!({
        "bedrock": status(bedrock.is_ok()),
        "s3": status(s3.is_ok()),
    });

    match (bedrock, s3) {
        (Ok(_), Ok(())) => success_response(
            "Image generation service is healthy",
            json!({
                "status": "healthy",
                "services": services,
                "environment": {
                    "region": state.region,
                    "s3Bucket": state.bucket,
                }
            }),
        ),
        (bedrock, s3) => {
            warn!(services = %services, "image generation service unhealthy");
            error_response(
                StatusCode::SERVICE_UNAVAILABLE,
                "Service Unhealthy",
                Some(json!({
                    "services": services,
                    "errors": {
                        "bedrock": bedrock.err().map(|err| err.to_string()),
                        "s3": s3.err().map(|err| err.to_string()),
                    }
                })),
            )
        }
    }
}

pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::GET, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-amz-date"),
            HeaderName::from_static("x-api-key"),
            HeaderName::from_static("x-amz-security-token"),
        ])
        .max_age(Duration::from_secs(86400))
}

/// Every path accepts `POST` so the function works behind any API Gateway
/// resource; only `/health` is routed separately. `OPTIONS` preflights are
/// answered by the CORS layer before reaching a handler.
pub fn router(state: ImageLambdaState) -> Router {
    Router::new()
        .route("/health", get(health))
        .fallback(dispatch)
        .layer(cors_layer())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use std::sync::Mutex;
    use tower::ServiceExt;

    struct FakeGenerator {
        fail: Vec<ImageModel>,
        throttle: bool,
        calls: Mutex<Vec<ImageModel>>,
        prompt_chars: Mutex<Vec<usize>>,
    }

    impl FakeGenerator {
        fn new(fail: Vec<ImageModel>) -> Self {
            FakeGenerator {
                fail,
                throttle: false,
                calls: Mutex::new(Vec::new()),
                prompt_chars: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<ImageModel> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ImageGenerator for FakeGenerator {
        async fn generate(&self, params: &ImageParams) -> Result<GeneratedImage, BedrockImageError> {
            self.calls.lock().unwrap().push(params.model);
            self.prompt_chars.lock().unwrap().push(params.prompt.chars().count());
            if self.fail.contains(&params.model) {
                if self.throttle {
                    return Err(BedrockImageError::Throttled);
                }
                return Err(BedrockImageError::Service("boom".to_string()));
            }
            Ok(GeneratedImage {
                data: "iVBORw0KGgo=".to_string(),
                model: params.model,
            })
        }
    }

    struct FakeStore {
        fail: bool,
    }

    #[async_trait]
    impl ImageStore for FakeStore {
        async fn upload(&self, _image: &str, params: &ImageParams) -> Result<StoredImage, StorageError> {
            if self.fail {
                return Err(StorageError::AccessDenied);
            }
            let key = format!("generated-images/test-{}.png", params.seed);
            Ok(StoredImage {
                public_url: format!("https://bucket.s3.ap-southeast-1.amazonaws.com/{key}"),
                key,
                bucket: "bucket".to_string(),
            })
        }

        async fn check(&self) -> Result<(), StorageError> {
            if self.fail {
                return Err(StorageError::NoSuchBucket("bucket".to_string()));
            }
            Ok(())
        }
    }

    fn app(generator: Arc<FakeGenerator>, store_fails: bool) -> Router {
        router(ImageLambdaState {
            generator,
            store: Arc::new(FakeStore { fail: store_fails }),
            region: "us-east-1".to_string(),
            bucket: "bucket".to_string(),
        })
    }

    async fn send(app: Router, method: Method, uri: &str, body: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn generates_and_uploads() {
        let generator = Arc::new(FakeGenerator::new(vec![]));
        let (status, body) = send(
            app(generator.clone(), false),
            Method::POST,
            "/generate-image",
            r#"{"prompt":"<b>glass</b> serum bottle","seed":5}"#,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], "Image generated successfully");
        assert_eq!(body["model"], "amazon.nova-canvas-v1:0");
        assert_eq!(
            body["imageUrl"],
            "https://bucket.s3.ap-southeast-1.amazonaws.com/generated-images/test-5.png"
        );
        assert_eq!(body["s3_url"], body["imageUrl"]);
        assert_eq!(body["metadata"]["s3Key"], "generated-images/test-5.png");
        assert_eq!(generator.calls(), vec![ImageModel::NovaCanvas]);
    }

    #[tokio::test]
    async fn nova_failure_falls_back_to_titan() {
        let generator = Arc::new(FakeGenerator::new(vec![ImageModel::NovaCanvas]));
        let (status, body) =
            send(app(generator.clone(), false), Method::POST, "/", r#"{"prompt":"jar"}"#).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["model"], "amazon.titan-image-generator-v1");
        assert_eq!(body["message"], "Image generated successfully with fallback model");
        assert_eq!(
            generator.calls(),
            vec![ImageModel::NovaCanvas, ImageModel::TitanV1]
        );
    }

    #[tokio::test]
    async fn titan_fallback_gets_a_prompt_within_its_limit() {
        let generator = Arc::new(FakeGenerator::new(vec![ImageModel::NovaCanvas]));
        let prompt = "amber glass serum bottle ".repeat(60);
        let body = json!({ "prompt": prompt }).to_string();
        let (status, _) = send(app(generator.clone(), false), Method::POST, "/", &body).await;

        assert_eq!(status, StatusCode::OK);
        let prompt_chars = generator.prompt_chars.lock().unwrap().clone();
        assert_eq!(prompt_chars.len(), 2);
        assert!(prompt_chars[0] > CONCISE_PROMPT_MAX_CHARS);
        assert_eq!(prompt_chars[1], CONCISE_PROMPT_MAX_CHARS);
    }

    #[tokio::test]
    async fn titan_failure_has_no_fallback() {
        let generator = Arc::new(FakeGenerator::new(vec![ImageModel::TitanV1]));
        let (status, body) = send(
            app(generator.clone(), false),
            Method::POST,
            "/",
            r#"{"prompt":"jar","model":"amazon.titan-image-generator-v1"}"#,
        )
        .await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"], "Image Generation Failed");
        assert_eq!(generator.calls(), vec![ImageModel::TitanV1]);
    }

    #[tokio::test]
    async fn throttling_maps_to_429() {
        let generator = Arc::new(FakeGenerator {
            throttle: true,
            ..FakeGenerator::new(vec![ImageModel::NovaCanvas, ImageModel::TitanV1])
        });
        let (status, body) = send(app(generator, false), Method::POST, "/", r#"{"prompt":"jar"}"#).await;

        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["error"], "Rate Limit Exceeded");
        assert!(body["details"].as_str().unwrap().contains("Rate limit exceeded"));
    }

    #[tokio::test]
    async fn storage_failure_maps_to_503() {
        let generator = Arc::new(FakeGenerator::new(vec![]));
        let (status, body) = send(app(generator, true), Method::POST, "/", r#"{"prompt":"jar"}"#).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "Storage Error");
    }

    #[tokio::test]
    async fn validation_errors_are_listed() {
        let generator = Arc::new(FakeGenerator::new(vec![]));
        let (status, body) = send(
            app(generator.clone(), false),
            Method::POST,
            "/",
            r#"{"prompt":"jar","width":10,"quality":"ultra"}"#,
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Validation Error");
        assert_eq!(body["details"].as_array().unwrap().len(), 2);
        assert!(generator.calls().is_empty());
    }

    #[tokio::test]
    async fn empty_and_invalid_bodies_are_rejected() {
        let generator = Arc::new(FakeGenerator::new(vec![]));
        let (status, body) = send(app(generator.clone(), false), Method::POST, "/", "").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["details"][0], "Request body is required");

        let (status, _) = send(app(generator.clone(), false), Method::POST, "/", "{nope").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) =
            send(app(generator, false), Method::POST, "/", r#"{"prompt":"<i></i>"}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid Input");
    }

    #[tokio::test]
    async fn preflight_is_answered_with_cors_headers() {
        let generator = Arc::new(FakeGenerator::new(vec![]));
        let response = app(generator.clone(), false)
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/generate-image")
                    .header("origin", "https://formula.example")
                    .header("access-control-request-method", "POST")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["access-control-allow-origin"], "*");
        assert_eq!(response.headers()["access-control-max-age"], "86400");
        assert!(generator.calls().is_empty());
    }

    #[tokio::test]
    async fn other_methods_are_rejected() {
        let generator = Arc::new(FakeGenerator::new(vec![]));
        let (status, body) = send(app(generator, false), Method::PUT, "/", "").await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body["statusCode"], 405);
    }

    #[tokio::test]
    async fn health_reports_each_service() {
        let generator = Arc::new(FakeGenerator::new(vec![]));
        let (status, body) = send(app(generator.clone(), false), Method::GET, "/health", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["environment"]["s3Bucket"], "bucket");

        let (status, body) = send(app(generator, true), Method::GET, "/health", "").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["details"]["services"]["bedrock"], "connected");
        assert_eq!(body["details"]["services"]["s3"], "disconnected");
        assert_eq!(body["details"]["errors"]["s3"], "S3 bucket bucket does not exist");
    }
}
