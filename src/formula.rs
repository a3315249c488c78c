use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::language::Language;

#[derive(Debug, Clone, PartialEq, PartialOrd, Deserialize, Serialize)]
pub struct Ingredient {
    pub name: String,
    pub percentage: String,
}

impl Ingredient {
    fn new(name: &str, percentage: &str) -> Self {
        Ingredient {
            name: name.to_string(),
            percentage: percentage.to_string(),
        }
    }
}

/// Formulation returned to the client. Every field is always populated.
#[derive(Debug, Clone, PartialEq, PartialOrd, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormulaResult {
    pub name: String,
    pub description: String,
    pub claims: Vec<String>,
    pub ingredients: Vec<Ingredient>,
    pub tonal_styling: String,
}

const FORMULA_FIELDS: [&str; 5] = ["name", "description", "claims", "ingredients", "tonalStyling"];

const DEFAULT_NAME: &str = "PREMIUM FORMULA";
const DEFAULT_DESCRIPTION: &str = "A cutting-edge formulation designed for exceptional results.";
const DEFAULT_TONAL_STYLING: &str =
    "Elegant glass bottle with premium metallic accents, conveying scientific sophistication and luxury";
const DEFAULT_CLAIMS: [&str; 4] = [
    "Visible results in just 7 days",
    "Clinically proven active ingredients",
    "Advanced delivery system",
    "Dermatologist recommended formula",
];
const DEFAULT_INGREDIENTS: [(&str, &str); 4] = [
    ("Advanced Active Complex", "3.0%"),
    ("Hydrating Base System", "2.5%"),
    ("Skin Barrier Enhancer", "1.5%"),
    ("Antioxidant Complex", "0.5%"),
];

impl FormulaResult {
    /// Builds a result from a parsed upstream object, filling gaps with
    /// defaults. Returns `None` when the object carries none of the formula
    /// fields at all.
    pub fn from_value(value: &Value) -> Option<FormulaResult> {
        let object = value.as_object()?;
        if !FORMULA_FIELDS.iter().any(|field| object.contains_key(*field)) {
            return None;
        }

        let text = |key: &str| {
            object
                .get(key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };

        let claims: Vec<String> = object
            .get("claims")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::trim)
                    .filter(|claim| !claim.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let ingredients: Vec<Ingredient> = object
            .get("ingredients")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(ingredient_from_value).collect())
            .unwrap_or_default();

        Some(FormulaResult {
            name: text("name").unwrap_or_else(|| DEFAULT_NAME.to_string()),
            description: text("description").unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string()),
            claims: if claims.is_empty() {
                DEFAULT_CLAIMS.iter().map(|claim| claim.to_string()).collect()
            } else {
                claims
            },
            ingredients: if ingredients.is_empty() {
                DEFAULT_INGREDIENTS
                    .iter()
                    .map(|(name, percentage)| Ingredient::new(name, percentage))
                    .collect()
            } else {
                ingredients
            },
            tonal_styling: text("tonalStyling")
                .or_else(|| text("tonal_styling"))
                .unwrap_or_else(|| DEFAULT_TONAL_STYLING.to_string()),
        })
    }
}

fn ingredient_from_value(value: &Value) -> Option<Ingredient> {
    match value {
        Value::String(name) if !name.trim().is_empty() => Some(Ingredient::new(name.trim(), "")),
        Value::Object(object) => {
            let name = object.get("name")?.as_str()?.trim();
            if name.is_empty() {
                return None;
            }
            let percentage = match object.get("percentage") {
                Some(Value::String(text)) => text.trim().to_string(),
                Some(Value::Number(number)) => format!("{number}%"),
                _ => String::new(),
            };
            Some(Ingredient {
                name: name.to_string(),
                percentage,
            })
        }
        _ => None,
    }
}

const INGREDIENT_KEYWORDS: [(&str, &str); 10] = [
    ("argan", "Argan Oil"),
    ("rosehip", "Rosehip Oil"),
    ("vitamin e", "Vitamin E (Tocopherol)"),
    ("vitamin c", "Vitamin C (L-Ascorbic Acid)"),
    ("hyaluronic acid", "Sodium Hyaluronate"),
    ("retinol", "Retinol"),
    ("niacinamide", "Niacinamide (Vitamin B3)"),
    ("peptides", "Palmitoyl Tripeptide Complex"),
    ("ceramides", "Ceramide Complex NP"),
    ("squalane", "Squalane"),
];

const PRODUCT_TYPE_KEYWORDS: [(&[&str], &str); 5] = [
    (&["oil"], "face oil"),
    (&["cream", "moisturizer"], "cream"),
    (&["cleanser", "wash"], "cleanser"),
    (&["mask"], "mask"),
    (&["toner"], "toner"),
];

const MIN_DEGRADED_INGREDIENTS: usize = 3;

/// Locally built formula for when every upstream attempt failed.
///
/// Deterministic: the same text and language always produce the same
/// result. Keywords in the request pick the product type, name, packaging
/// and the ingredients the user asked for; gaps are topped up from a base
/// hydration complex so at least three ingredients are listed.
pub fn degraded_formula(raw_text: &str, language: Language) -> FormulaResult {
    let lowered = raw_text.to_lowercase();

    let product_type = PRODUCT_TYPE_KEYWORDS
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|keyword| lowered.contains(keyword)))
        .map(|(_, product_type)| *product_type)
        .unwrap_or("serum");

    let mut ingredients: Vec<Ingredient> = INGREDIENT_KEYWORDS
        .iter()
        .filter(|(keyword, _)| lowered.contains(keyword))
        .enumerate()
        .map(|(index, (_, name))| Ingredient {
            name: name.to_string(),
            percentage: format!("{:.1}%", (index + 1) as f64 * 1.5),
        })
        .collect();

    let base: &[(&str, &str)] = match language {
        Language::Localized => &[
            ("Sodium Hyaluronate", "2.0%"),
            ("Niacinamide (Vitamin B3)", "3.0%"),
            ("Ceramide Complex", "1.5%"),
        ],
        Language::Default => &[
            ("Sodium Hyaluronate (Multi-Molecular Weight)", "2.0%"),
            ("Niacinamide (Vitamin B3)", "3.0%"),
            ("Ceramide Complex NP", "1.5%"),
        ],
    };
    for &(name, percentage) in base {
        if ingredients.len() >= MIN_DEGRADED_INGREDIENTS {
            break;
        }
        let stem = name.split(' ').next().unwrap_or(name);
        let already_listed = ingredients
            .iter()
            .any(|ingredient| ingredient.name.starts_with(stem));
        if !already_listed {
            ingredients.push(Ingredient::new(name, percentage));
        }
    }

    match language {
        Language::Localized => FormulaResult {
            name: "สูตรเฉพาะบุคคล".to_string(),
            description: "สูตรสำคัญที่ออกแบบมาเฉพาะสำหรับความต้องการของคุณ ด้วยส่วนผสมคุณภาพสูงที่ได้รับการคัดสรรมาอย่างดี".to_string(),
            claims: vec![
                "ปรับสภาพผิวให้ดีขึ้นอย่างเห็นได้ชัด".to_string(),
                "ให้ความชุ่มชื้นและบำรุงผิวอย่างล้ำลึก".to_string(),
                "เหมาะสำหรับการใช้ประจำวัน".to_string(),
                "ผ่านการทดสอบความปลอดภัยแล้ว".to_string(),
            ],
            ingredients,
            tonal_styling: "บรรจุภัณฑ์สไตล์มินิมอลที่สะท้อนคุณภาพและความหรูหรา".to_string(),
        },
        Language::Default => {
            let name = if lowered.contains("luxury") || lowered.contains("premium") {
                format!("Luxury {}", capitalize(product_type))
            } else if lowered.contains("anti-aging") || lowered.contains("anti aging") {
                "Anti-Aging Treatment".to_string()
            } else if lowered.contains("brightening") || lowered.contains("vitamin c") {
                "Brightening Complex".to_string()
            } else if product_type == "face oil" {
                "Nourishing Face Oil".to_string()
            } else {
                "Custom Formula".to_string()
            };
            let concern = if product_type == "face oil" {
                "dry skin"
            } else {
                "skin"
            };
            let tonal_styling = if lowered.contains("amber") {
                "Elegant amber glass dropper bottle with premium metallic accents, designed to protect contents from light while maintaining luxury appeal"
            } else {
                "Premium glass packaging with modern minimalist design reflecting quality and sophistication"
            };

            FormulaResult {
                name,
                description: format!(
                    "A carefully crafted {product_type} formulated to address your specific skincare needs with premium ingredients and advanced formulation technology."
                ),
                claims: vec![
                    format!("Targets specific {concern} concerns effectively"),
                    "Delivers visible results with consistent use".to_string(),
                    "Formulated with clinically-tested ingredients".to_string(),
                    "Suitable for daily skincare routine".to_string(),
                ],
                ingredients,
                tonal_styling: tonal_styling.to_string(),
            }
        }
    }
}

fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_value_fills_missing_fields() {
        let formula = FormulaResult::from_value(&json!({ "name": "Glow Serum" })).unwrap();
        assert_eq!(formula.name, "Glow Serum");
        assert_eq!(formula.description, DEFAULT_DESCRIPTION);
        assert_eq!(formula.claims.len(), 4);
        assert_eq!(formula.ingredients.len(), 4);
        assert_eq!(formula.tonal_styling, DEFAULT_TONAL_STYLING);
    }

    #[test]
    fn from_value_keeps_unusual_lengths() {
        let formula = FormulaResult::from_value(&json!({
            "name": "Duo",
            "claims": ["One", "Two"],
            "ingredients": [
                {"name": "Squalane", "percentage": 5},
                "Retinol",
                {"name": "", "percentage": "1%"}
            ]
        }))
        .unwrap();
        assert_eq!(formula.claims, vec!["One", "Two"]);
        assert_eq!(
            formula.ingredients,
            vec![Ingredient::new("Squalane", "5%"), Ingredient::new("Retinol", "")]
        );
    }

    #[test]
    fn from_value_rejects_unrelated_objects() {
        assert!(FormulaResult::from_value(&json!({ "success": true })).is_none());
        assert!(FormulaResult::from_value(&json!(["name"])).is_none());
    }

    #[test]
    fn serializes_camel_case() {
        let formula = degraded_formula("serum", Language::Default);
        let value = serde_json::to_value(&formula).unwrap();
        assert!(value.get("tonalStyling").is_some());
        assert!(value.get("tonal_styling").is_none());
    }

    #[test]
    fn degraded_formula_matches_keywords() {
        let formula = degraded_formula(
            "A luxury face oil with Argan and rosehip, amber bottle",
            Language::Default,
        );
        assert_eq!(formula.name, "Luxury Face oil");
        assert!(formula.description.contains("face oil"));
        assert_eq!(formula.claims[0], "Targets specific dry skin concerns effectively");
        assert_eq!(formula.ingredients[0], Ingredient::new("Argan Oil", "1.5%"));
        assert_eq!(formula.ingredients[1], Ingredient::new("Rosehip Oil", "3.0%"));
        assert_eq!(formula.ingredients.len(), 3);
        assert!(formula.tonal_styling.contains("amber"));
    }

    #[test]
    fn degraded_formula_without_keywords_uses_base_complex() {
        let formula = degraded_formula("something nice", Language::Default);
        assert_eq!(formula.name, "Custom Formula");
        assert_eq!(formula.ingredients.len(), 3);
        assert_eq!(formula.claims.len(), 4);
    }

    #[test]
    fn degraded_formula_is_deterministic() {
        let text = "Brightening vitamin C serum with niacinamide";
        assert_eq!(
            degraded_formula(text, Language::Default),
            degraded_formula(text, Language::Default)
        );
        let formula = degraded_formula(text, Language::Default);
        assert_eq!(formula.name, "Brightening Complex");
        // niacinamide was requested, so the base complex must not repeat it
        let niacinamide = formula
            .ingredients
            .iter()
            .filter(|ingredient| ingredient.name.starts_with("Niacinamide"))
            .count();
        assert_eq!(niacinamide, 1);
    }

    #[test]
    fn degraded_thai_formula_keeps_english_ingredient_names() {
        let formula = degraded_formula("เซรั่ม vitamin c และ retinol", Language::Localized);
        assert_eq!(formula.name, "สูตรเฉพาะบุคคล");
        assert_eq!(formula.ingredients[0].name, "Vitamin C (L-Ascorbic Acid)");
        assert_eq!(formula.ingredients[1].name, "Retinol");
        assert!(formula.ingredients.len() >= 3);
    }
}
