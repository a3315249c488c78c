use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::warn;

use crate::demo_image::{render_demo_svg, DemoImageParams, DEMO_IMAGE_PATH};
use crate::error::ApiError;
use crate::formula::FormulaResult;
use crate::pipeline::{GenerationRequest, ImageRequest, ImageResult, Pipeline};

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    #[serde(default)]
    product_spec: Option<String>,
}

#[derive(Serialize)]
struct FormulaResponse {
    success: bool,
    product: FormulaResult,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateImageRequest {
    #[serde(default)]
    product_name: Option<String>,
    #[serde(default)]
    tonal_styling: Option<String>,
    #[serde(default)]
    product_type: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn reject_body(rejection: JsonRejection, message: &str) -> ApiError {
    warn!("rejected request body: {}", rejection.body_text());
    ApiError::BadRequest(message.to_string())
}

#[axum::debug_handler]
async fn generate(
    State(state): State<AppState>,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Json<FormulaResponse>, ApiError> {
    const MISSING: &str = "Product specification is required";

    let Json(payload) = payload.map_err(|rejection| reject_body(rejection, MISSING))?;
    let product_spec =
        non_blank(payload.product_spec).ok_or_else(|| ApiError::BadRequest(MISSING.to_string()))?;

    let request = GenerationRequest::new(product_spec);
    let product = state.pipeline.generate_formula(&request).await;

    Ok(Json(FormulaResponse {
        success: true,
        product,
    }))
}

#[axum::debug_handler]
async fn generate_image(
    State(state): State<AppState>,
    payload: Result<Json<GenerateImageRequest>, JsonRejection>,
) -> Result<Json<ImageResult>, ApiError> {
    const MISSING: &str = "Product name and tonal styling are required";

    let Json(payload) = payload.map_err(|rejection| reject_body(rejection, MISSING))?;
    let (Some(product_name), Some(tonal_styling)) = (
        non_blank(payload.product_name),
        non_blank(payload.tonal_styling),
    ) else {
        return Err(ApiError::BadRequest(MISSING.to_string()));
    };

    let request = ImageRequest {
        product_name,
        tonal_styling,
        product_type: non_blank(payload.product_type),
    };
    Ok(Json(state.pipeline.generate_image(&request).await))
}

async fn demo_image(Query(params): Query<DemoImageParams>) -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "image/svg+xml"),
            (header::CACHE_CONTROL, "public, max-age=86400"),
        ],
        render_demo_svg(&params),
    )
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    let config = state.pipeline.config();
    Json(json!({
        "status": "ok",
        "textEndpoint": config.text_endpoint.is_some(),
        "imageEndpoint": config.image_endpoint.is_some(),
    }))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/generate", post(generate))
        .route("/api/generate-image", post(generate_image))
        .route(DEMO_IMAGE_PATH, get(demo_image))
        .route("/health", get(health))
        .with_state(state)
}
