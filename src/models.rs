use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Bedrock image models reachable through the image-generation Lambda.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageModel {
    #[serde(rename = "amazon.titan-image-generator-v1")]
    TitanV1,
    #[serde(rename = "amazon.nova-canvas-v1:0")]
    NovaCanvas,
}

impl ImageModel {
    pub const ALL: [ImageModel; 2] = [ImageModel::NovaCanvas, ImageModel::TitanV1];

    pub fn id(self) -> &'static str {
        match self {
            ImageModel::TitanV1 => "amazon.titan-image-generator-v1",
            ImageModel::NovaCanvas => "amazon.nova-canvas-v1:0",
        }
    }

    /// Titan only ever receives the concise variant.
    pub fn prompt_variant(self) -> PromptVariant {
        match self {
            ImageModel::TitanV1 => PromptVariant::Concise,
            ImageModel::NovaCanvas => PromptVariant::Detailed,
        }
    }
}

impl fmt::Display for ImageModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownModel(pub String);

impl fmt::Display for UnknownModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unsupported model: {}", self.0)
    }
}

impl std::error::Error for UnknownModel {}

impl FromStr for ImageModel {
    type Err = UnknownModel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ImageModel::ALL
            .into_iter()
            .find(|model| model.id() == s)
            .ok_or_else(|| UnknownModel(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptVariant {
    /// Formula instruction for the text model.
    Formula,
    Detailed,
    Concise,
}
