use itertools::Itertools;
use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use crate::models::ImageModel;

pub const MAX_PROMPT_CHARS: usize = 2000;
const DIMENSION_RANGE: std::ops::RangeInclusive<u64> = 256..=2048;
const CFG_SCALE_RANGE: std::ops::RangeInclusive<f64> = 1.0..=20.0;
const MAX_SEED: u64 = 2_147_483_647;

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid tag regex"));
static SCHEME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)javascript:|data:").expect("valid scheme regex"));
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));
static CONTROL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\x00-\x08\x0B\x0C\x0E-\x1F\x7F]").expect("valid control char regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Standard,
    Premium,
}

impl Quality {
    pub fn as_str(self) -> &'static str {
        match self {
            Quality::Standard => "standard",
            Quality::Premium => "premium",
        }
    }
}

/// Validated parameters for one Bedrock image generation.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageParams {
    pub prompt: String,
    pub model: ImageModel,
    pub width: u32,
    pub height: u32,
    pub quality: Quality,
    pub cfg_scale: f64,
    pub seed: u32,
}

fn optional_dimension(body: &Value, key: &str, errors: &mut Vec<String>) -> u32 {
    let Some(value) = body.get(key).filter(|value| !value.is_null()) else {
        return 1024;
    };
    match value.as_u64().filter(|value| DIMENSION_RANGE.contains(value)) {
        Some(value) => value as u32,
        None => {
            let label = if key == "width" { "Width" } else { "Height" };
            errors.push(format!("{label} must be an integer between 256 and 2048"));
            1024
        }
    }
}

/// Checks the image Lambda request body. Every problem found is reported,
/// not only the first.
pub fn validate_image_request(body: &Value) -> Result<ImageParams, Vec<String>> {
    if !body.is_object() {
        return Err(vec!["Request body must be a JSON object".to_string()]);
    }

    let mut errors = Vec::new();

    let prompt = match body.get("prompt") {
        Some(Value::String(prompt)) if prompt.trim().is_empty() => {
            errors.push("Prompt cannot be empty".to_string());
            String::new()
        }
        Some(Value::String(prompt)) if prompt.chars().count() > MAX_PROMPT_CHARS => {
            errors.push(format!("Prompt must be less than {MAX_PROMPT_CHARS} characters"));
            String::new()
        }
        Some(Value::String(prompt)) => prompt.clone(),
        _ => {
            errors.push("Prompt is required and must be a string".to_string());
            String::new()
        }
    };

    let model = match body.get("model").filter(|value| !value.is_null()) {
        None => ImageModel::NovaCanvas,
        Some(value) => match value.as_str().and_then(|id| id.parse::<ImageModel>().ok()) {
            Some(model) => model,
            None => {
                let valid = ImageModel::ALL.iter().map(|model| model.id()).join(", ");
                errors.push(format!("Model must be one of: {valid}"));
                ImageModel::NovaCanvas
            }
        },
    };

    let width = optional_dimension(body, "width", &mut errors);
    let height = optional_dimension(body, "height", &mut errors);

    let quality = match body.get("quality").filter(|value| !value.is_null()) {
        None => Quality::Premium,
        Some(value) => match value.as_str() {
            Some("standard") => Quality::Standard,
            Some("premium") => Quality::Premium,
            _ => {
                errors.push("Quality must be one of: standard, premium".to_string());
                Quality::Premium
            }
        },
    };

    let cfg_scale = match body.get("cfg_scale").filter(|value| !value.is_null()) {
        None => 8.0,
        Some(value) => match value.as_f64().filter(|value| CFG_SCALE_RANGE.contains(value)) {
            Some(value) => value,
            None => {
                errors.push("cfg_scale must be a number between 1.0 and 20.0".to_string());
                8.0
            }
        },
    };

    let seed = match body.get("seed").filter(|value| !value.is_null()) {
        None => rand::thread_rng().gen_range(0..1_000_000),
        Some(value) => match value.as_u64().filter(|seed| *seed <= MAX_SEED) {
            Some(seed) => seed as u32,
            None => {
                errors.push("seed must be an integer between 0 and 2147483647".to_string());
                0
            }
        },
    };

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(ImageParams {
        prompt,
        model,
        width,
        height,
        quality,
        cfg_scale,
        seed,
    })
}

/// Strips markup, script-like schemes and control characters from a prompt,
/// collapses whitespace and caps the length.
pub fn sanitize_prompt(input: &str) -> String {
    let cleaned = TAG_RE.replace_all(input.trim(), "");
    let cleaned = SCHEME_RE.replace_all(&cleaned, "");
    let cleaned = WHITESPACE_RE.replace_all(&cleaned, " ");
    let cleaned = CONTROL_RE.replace_all(&cleaned, "");
    cleaned.trim().chars().take(MAX_PROMPT_CHARS).collect()
}
