//! Pulls the useful payload out of upstream responses whose shape varies
//! between Lambda revisions and providers.
//!
//! Each strategy is a variant tried in a fixed order; the first one that
//! yields a non-empty value wins.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::error::UpstreamError;
use crate::formula::FormulaResult;

static FENCED_JSON_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"```(?:json|JSON)?\s*(\{[\s\S]*?\})\s*```").expect("valid fenced json regex")
});

/// Where the formula text may live in a text-model response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormulaSource {
    /// `data.response`
    DataResponse,
    Response,
    Message,
    Content,
    /// `product` already holding a structured object.
    Product,
    /// The response object itself.
    WholeBody,
}

impl FormulaSource {
    pub const ORDER: [FormulaSource; 6] = [
        FormulaSource::DataResponse,
        FormulaSource::Response,
        FormulaSource::Message,
        FormulaSource::Content,
        FormulaSource::Product,
        FormulaSource::WholeBody,
    ];

    pub fn extract(self, body: &Value) -> Option<FormulaResult> {
        match self {
            FormulaSource::DataResponse => body.pointer("/data/response").and_then(formula_from_field),
            FormulaSource::Response => body.get("response").and_then(formula_from_field),
            FormulaSource::Message => body.get("message").and_then(formula_from_field),
            FormulaSource::Content => body.get("content").and_then(formula_from_field),
            FormulaSource::Product => body.get("product").and_then(FormulaResult::from_value),
            FormulaSource::WholeBody => FormulaResult::from_value(body),
        }
    }
}

fn formula_from_field(field: &Value) -> Option<FormulaResult> {
    match field {
        Value::String(text) => formula_from_text(text),
        Value::Object(_) => FormulaResult::from_value(field),
        // Anthropic-style content blocks: [{"type": "text", "text": "..."}]
        Value::Array(blocks) => blocks
            .iter()
            .filter_map(|block| block.get("text").and_then(Value::as_str))
            .find_map(formula_from_text),
        _ => None,
    }
}

/// Finds a formula object inside free text: a fenced block first, then the
/// outermost braces, then the text as-is.
pub fn formula_from_text(text: &str) -> Option<FormulaResult> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Some(caps) = FENCED_JSON_RE.captures(text) {
        if let Some(formula) = caps
            .get(1)
            .and_then(|block| serde_json::from_str::<Value>(block.as_str()).ok())
            .and_then(|value| FormulaResult::from_value(&value))
        {
            return Some(formula);
        }
    }

    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if start < end {
            if let Some(formula) = serde_json::from_str::<Value>(&text[start..=end])
                .ok()
                .and_then(|value| FormulaResult::from_value(&value))
            {
                return Some(formula);
            }
        }
    }

    serde_json::from_str::<Value>(text)
        .ok()
        .and_then(|value| FormulaResult::from_value(&value))
}

/// Unwraps an API Gateway proxy envelope (`{"statusCode": .., "body": "<json>"}`).
/// Other values come back unchanged.
pub fn unwrap_envelope(body: Value) -> Value {
    let inner = match body.get("body") {
        Some(Value::String(text)) if body.get("statusCode").is_some() => {
            serde_json::from_str::<Value>(text).ok()
        }
        Some(Value::Object(_)) if body.get("statusCode").is_some() => body.get("body").cloned(),
        _ => None,
    };
    inner.unwrap_or(body)
}

pub fn normalize_formula(body: Value) -> Result<FormulaResult, UpstreamError> {
    let body = unwrap_envelope(body);
    FormulaSource::ORDER
        .iter()
        .find_map(|source| source.extract(&body))
        .ok_or_else(|| UpstreamError::Malformed("no formula payload in response".to_string()))
}

/// Field names image Lambdas have used for the generated image location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageUrlSource {
    ImageUrl,
    ImageUrlSnake,
    S3Url,
    S3UrlCamel,
    PresignedUrl,
    /// `artifacts[0].s3Uri`
    ArtifactS3Uri,
}

impl ImageUrlSource {
    pub const ORDER: [ImageUrlSource; 6] = [
        ImageUrlSource::ImageUrl,
        ImageUrlSource::ImageUrlSnake,
        ImageUrlSource::S3Url,
        ImageUrlSource::S3UrlCamel,
        ImageUrlSource::PresignedUrl,
        ImageUrlSource::ArtifactS3Uri,
    ];

    pub fn extract(self, body: &Value) -> Option<String> {
        let value = match self {
            ImageUrlSource::ImageUrl => body.get("imageUrl"),
            ImageUrlSource::ImageUrlSnake => body.get("image_url"),
            ImageUrlSource::S3Url => body.get("s3_url"),
            ImageUrlSource::S3UrlCamel => body.get("s3Url"),
            ImageUrlSource::PresignedUrl => body.get("presigned_url"),
            ImageUrlSource::ArtifactS3Uri => body.pointer("/artifacts/0/s3Uri"),
        }?;
        value
            .as_str()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(str::to_string)
    }
}

pub fn normalize_image_url(body: Value) -> Result<String, UpstreamError> {
    let body = unwrap_envelope(body);
    ImageUrlSource::ORDER
        .iter()
        .find_map(|source| source.extract(&body))
        .ok_or_else(|| UpstreamError::Malformed("no image URL in response".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn canonical() -> Value {
        json!({
            "name": "Radiance Elixir",
            "description": "Brightens. Hydrates.",
            "claims": ["a", "b", "c", "d"],
            "ingredients": [{"name": "Niacinamide", "percentage": "5.0%"}],
            "tonalStyling": "Frosted glass"
        })
    }

    #[test]
    fn reextracts_formula_from_fenced_block() {
        let text = format!(
            "Here is your formula:\n```json\n{}\n```\nEnjoy!",
            serde_json::to_string_pretty(&canonical()).unwrap()
        );
        let expected = FormulaResult::from_value(&canonical()).unwrap();
        assert_eq!(formula_from_text(&text), Some(expected.clone()));

        let body = json!({ "data": { "response": text } });
        assert_eq!(normalize_formula(body).unwrap(), expected);
    }

    #[test]
    fn finds_braces_in_prose() {
        let text = format!("Sure! {} Let me know.", canonical());
        let formula = formula_from_text(&text).unwrap();
        assert_eq!(formula.name, "Radiance Elixir");
    }

    #[test]
    fn strategies_follow_priority_order() {
        let body = json!({
            "response": serde_json::to_string(&json!({"name": "From Response"})).unwrap(),
            "message": serde_json::to_string(&json!({"name": "From Message"})).unwrap(),
        });
        assert_eq!(normalize_formula(body).unwrap().name, "From Response");
    }

    #[test]
    fn empty_fields_fall_through() {
        let body = json!({
            "response": "",
            "content": [{"type": "text", "text": canonical().to_string()}]
        });
        assert_eq!(normalize_formula(body).unwrap().name, "Radiance Elixir");
    }

    #[test]
    fn unwraps_api_gateway_envelope() {
        let body = json!({
            "statusCode": 200,
            "body": json!({ "response": canonical().to_string() }).to_string()
        });
        assert_eq!(normalize_formula(body).unwrap().name, "Radiance Elixir");
    }

    #[test]
    fn unrecognized_body_is_malformed() {
        let err = normalize_formula(json!({ "success": true, "message": "ok" })).unwrap_err();
        assert!(matches!(err, UpstreamError::Malformed(_)));
    }

    #[test]
    fn image_url_uses_first_present_key() {
        let body = json!({ "s3_url": "https://b/s3.png", "image_url": "https://b/snake.png" });
        assert_eq!(normalize_image_url(body).unwrap(), "https://b/snake.png");

        let body = json!({ "imageUrl": "  ", "presigned_url": "https://b/p.png" });
        assert_eq!(normalize_image_url(body).unwrap(), "https://b/p.png");

        let body = json!({ "artifacts": [{ "s3Uri": "s3://bucket/key.png" }] });
        assert_eq!(normalize_image_url(body).unwrap(), "s3://bucket/key.png");
    }

    #[test]
    fn image_url_inside_envelope() {
        let body = json!({
            "statusCode": 200,
            "body": json!({ "success": true, "imageUrl": "https://b/x.png" }).to_string()
        });
        assert_eq!(normalize_image_url(body).unwrap(), "https://b/x.png");
    }

    #[test]
    fn missing_image_url_is_malformed() {
        assert!(normalize_image_url(json!({ "success": true })).is_err());
    }
}
