use serde::Serialize;

const THAI_BLOCK: std::ops::RangeInclusive<char> = '\u{0E00}'..='\u{0E7F}';

/// Which prompt and fallback templates a request should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// English templates.
    Default,
    /// Thai templates.
    Localized,
}

impl Language {
    pub fn output_name(self) -> &'static str {
        match self {
            Language::Default => "English",
            Language::Localized => "Thai",
        }
    }
}

/// A single Thai code point anywhere in the text selects the Thai templates,
/// even when the rest of the input is in another script.
pub fn detect_language(text: &str) -> Language {
    if text.chars().any(|ch| THAI_BLOCK.contains(&ch)) {
        Language::Localized
    } else {
        Language::Default
    }
}
