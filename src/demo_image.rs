use serde::{Deserialize, Serialize};

pub const DEMO_IMAGE_PATH: &str = "/api/demo-image";

/// Query parameters of the demo image endpoint.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct DemoImageParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl DemoImageParams {
    pub fn new(product: &str, style: &str, kind: &str) -> Self {
        DemoImageParams {
            product: Some(product.to_string()),
            style: Some(style.to_string()),
            kind: Some(kind.to_string()),
        }
    }

    /// Relative URL pointing at the demo image for these parameters.
    pub fn url(&self) -> String {
        match serde_urlencoded::to_string(self) {
            Ok(query) if !query.is_empty() => format!("{DEMO_IMAGE_PATH}?{query}"),
            _ => DEMO_IMAGE_PATH.to_string(),
        }
    }
}

fn param_or<'a>(value: &'a Option<String>, default: &'a str) -> &'a str {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(default)
}

fn escape_xml(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Renders the placeholder packaging mockup. Pure: equal parameters give
/// byte-identical output.
pub fn render_demo_svg(params: &DemoImageParams) -> String {
    let product_name = param_or(&params.product, "Luxury Serum");
    let styling = param_or(&params.style, "elegant premium").to_lowercase();
    let product_type = param_or(&params.kind, "serum");

    let mut name_parts = product_name.split_whitespace();
    let brand_name = name_parts
        .next()
        .map(str::to_uppercase)
        .unwrap_or_else(|| "LUXURY".to_string());
    let product_line = name_parts.collect::<Vec<_>>().join(" ").to_uppercase();
    let product_line = if product_line.is_empty() {
        "RENEWAL".to_string()
    } else {
        product_line
    };

    let has = |words: &[&str]| words.iter().any(|word| styling.contains(word));
    let is_minimal = has(&["minimal", "clean"]);
    let is_luxury = has(&["luxury", "premium"]);
    let is_gold = has(&["gold", "metallic"]);
    let is_glass = has(&["glass", "frosted"]);

    let cap_color = if is_gold {
        "#f59e0b"
    } else if is_luxury {
        "#1f2937"
    } else {
        "#6366f1"
    };
    let label_bg = if is_minimal { "#ffffff" } else { "#f8fafc" };
    let bottle_opacity = if is_glass { "0.7" } else { "0.9" };

    format!(
        r##"<svg width="256" height="256" viewBox="0 0 256 256" xmlns="http://www.w3.org/2000/svg">
  <defs>
    <linearGradient id="bg" x1="0%" y1="0%" x2="100%" y2="100%">
      <stop offset="0%" style="stop-color:#f8fafc;stop-opacity:1" />
      <stop offset="100%" style="stop-color:#e2e8f0;stop-opacity:1" />
    </linearGradient>
    <linearGradient id="bottle" x1="0%" y1="0%" x2="100%" y2="100%">
      <stop offset="0%" style="stop-color:#ffffff;stop-opacity:{bottle_opacity}" />
      <stop offset="50%" style="stop-color:#f1f5f9;stop-opacity:0.8" />
      <stop offset="100%" style="stop-color:#cbd5e1;stop-opacity:0.7" />
    </linearGradient>
    <linearGradient id="cap" x1="0%" y1="0%" x2="100%" y2="100%">
      <stop offset="0%" style="stop-color:{cap_color};stop-opacity:1" />
      <stop offset="50%" style="stop-color:{cap_color}cc;stop-opacity:1" />
      <stop offset="100%" style="stop-color:{cap_color}99;stop-opacity:1" />
    </linearGradient>
    <linearGradient id="label" x1="0%" y1="0%" x2="100%" y2="100%">
      <stop offset="0%" style="stop-color:{label_bg};stop-opacity:0.95" />
      <stop offset="100%" style="stop-color:#f8fafc;stop-opacity:0.9" />
    </linearGradient>
  </defs>
  <rect width="256" height="256" fill="url(#bg)" />
  <ellipse cx="128" cy="240" rx="50" ry="8" fill="#000000" opacity="0.1"/>
  <rect x="95" y="80" width="66" height="140" rx="8" ry="8" fill="url(#bottle)" stroke="#e2e8f0" stroke-width="1"/>
  <rect x="110" y="65" width="36" height="20" rx="2" ry="2" fill="url(#bottle)" stroke="#e2e8f0" stroke-width="1"/>
  <rect x="105" y="45" width="46" height="25" rx="4" ry="4" fill="url(#cap)"/>
  <rect x="120" y="35" width="16" height="15" rx="2" ry="2" fill="url(#cap)"/>
  <rect x="100" y="110" width="56" height="80" rx="4" ry="4" fill="url(#label)" stroke="#e5e7eb" stroke-width="1"/>
  <text x="128" y="130" font-family="Arial, sans-serif" font-size="8" font-weight="bold" text-anchor="middle" fill="#1f2937">{brand_name}</text>
  <text x="128" y="142" font-family="Arial, sans-serif" font-size="6" text-anchor="middle" fill="#6b7280">{product_line}</text>
  <text x="128" y="154" font-family="Arial, sans-serif" font-size="6" text-anchor="middle" fill="#6b7280">{product_type}</text>
  <line x1="105" y1="165" x2="151" y2="165" stroke="#e5e7eb" stroke-width="1"/>
  <text x="128" y="175" font-family="Arial, sans-serif" font-size="4" text-anchor="middle" fill="#9ca3af">PREMIUM FORMULA</text>
  <text x="128" y="183" font-family="Arial, sans-serif" font-size="4" text-anchor="middle" fill="#9ca3af">ADVANCED PEPTIDES</text>
  <rect x="98" y="85" width="8" height="60" rx="4" ry="4" fill="#ffffff" opacity="0.3"/>
  <text x="128" y="205" font-family="Arial, sans-serif" font-size="3" text-anchor="middle" fill="#9ca3af" opacity="0.6">DEMO MOCKUP</text>
</svg>
"##,
        bottle_opacity = bottle_opacity,
        cap_color = cap_color,
        label_bg = label_bg,
        brand_name = escape_xml(&brand_name),
        product_line = escape_xml(&product_line),
        product_type = escape_xml(&product_type.to_uppercase()),
    )
}
