use crate::language::Language;
use crate::models::ImageModel;
use crate::validation::MAX_PROMPT_CHARS;

/// Titan's hard input limit.
pub const CONCISE_PROMPT_MAX_CHARS: usize = 512;

pub const DEFAULT_PRODUCT_TYPE: &str = "serum";

/// Product details feeding the packaging mockup prompts.
#[derive(Debug, Clone, PartialEq)]
pub struct ImagePromptDetails<'a> {
    pub product_name: &'a str,
    pub tonal_styling: &'a str,
    pub product_type: Option<&'a str>,
}

impl ImagePromptDetails<'_> {
    pub fn product_type(&self) -> &str {
        self.product_type
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(DEFAULT_PRODUCT_TYPE)
    }
}

/// Instruction for the formula text model. Output fields follow the
/// request language except ingredient names, which stay in English INCI form.
pub fn formula_prompt(raw_text: &str, language: Language) -> String {
    match language {
        Language::Localized => format!(
            concat!(
                "สร้างสูตรเครื่องสำอางระดับพรีเมียมสำหรับข้อกำหนดผลิตภัณฑ์นี้:\n",
                "\n",
                "{spec}\n",
                "\n",
                "ข้อกำหนด:\n",
                "- สร้างชื่อผลิตภัณฑ์ที่น่าสนใจ 2-3 คำที่ฟังดูหรูหราและเหมาะสำหรับการตลาด\n",
                "- เขียนคำอธิบายผลิตภัณฑ์ที่กระชับ 2 ประโยคที่เน้นประโยชน์หลัก\n",
                "- ระบุการอ้างสรรพคุณ 4 ข้อที่ทรงพลังฟังดูเป็นวิทยาศาสตร์แต่เข้าใจง่าย\n",
                "- รวมส่วนผสมออกฤทธิ์หลัก 4-6 ชนิดพร้อมเปอร์เซ็นต์ที่สมเหตุสมผล\n",
                "- อธิบายบรรจุภัณฑ์ในประโยคเดียวที่น่าสนใจ เน้นความหรูหราและประสิทธิภาพ\n",
                "\n",
                "ตอบกลับเป็น JSON:\n",
                "{{\n",
                "  \"name\": \"ชื่อผลิตภัณฑ์พรีเมียม\",\n",
                "  \"description\": \"คำอธิบาย 2 ประโยคกระชับที่ขายประโยชน์และประสบการณ์\",\n",
                "  \"claims\": [\"การอ้างสรรพคุณ 1 พร้อมประโยชน์เฉพาะ/กรอบเวลา\", \"การอ้างสรรพคุณ 2 พร้อมผลลัพธ์ที่วัดได้\", \"การอ้างสรรพคุณ 3 พร้อมคุณสมบัติเฉพาะ\", \"การอ้างสรรพคุณ 4 พร้อมการปรับปรุงผิว\"],\n",
                "  \"ingredients\": [{{\"name\": \"Active Ingredient (Scientific Name)\", \"percentage\": \"X.X%\"}}, ...],\n",
                "  \"tonalStyling\": \"ประโยคเดียวที่น่าสนใจอธิบายบรรจุภัณฑ์หรูหราที่เข้ากับการวางตำแหน่งผลิตภัณฑ์\"\n",
                "}}\n",
                "\n",
                "หมายเหตุสำคัญ: ชื่อส่วนผสม (ingredients) ให้ใช้ภาษาอังกฤษตามมาตรฐานสากล ",
                "แต่ข้อมูลอื่นทั้งหมดให้เป็นภาษาไทย ทำให้น่าประทับใจ เป็นวิทยาศาสตร์ แต่เข้าใจง่าย ",
                "เน้นผลลัพธ์ที่ฟังดูเป็นไปได้และน่าปรารถนา",
            ),
            spec = raw_text
        ),
        Language::Default => format!(
            concat!(
                "Create a premium cosmetic formulation for this product specification:\n",
                "\n",
                "{spec}\n",
                "\n",
                "REQUIREMENTS:\n",
                "- Generate a compelling 2-3 word product name that sounds premium and marketable\n",
                "- Write a concise 2-sentence product description highlighting key benefits\n",
                "- List exactly 4 powerful claims that sound scientific yet accessible\n",
                "- Include 4-6 key active ingredients with realistic percentages\n",
                "- Describe packaging in one compelling sentence emphasizing luxury and efficacy\n",
                "\n",
                "FORMAT RESPONSE AS JSON:\n",
                "{{\n",
                "  \"name\": \"PREMIUM PRODUCT NAME\",\n",
                "  \"description\": \"Concise 2-sentence description that sells the benefits and experience.\",\n",
                "  \"claims\": [\"Claim 1 with specific benefit/timeframe\", \"Claim 2 with measurable result\", \"Claim 3 with unique feature\", \"Claim 4 with skin improvement\"],\n",
                "  \"ingredients\": [{{\"name\": \"Active Ingredient (Scientific Name)\", \"percentage\": \"X.X%\"}}, ...],\n",
                "  \"tonalStyling\": \"One compelling sentence describing luxury packaging that matches the product positioning\"\n",
                "}}\n",
                "\n",
                "Ingredient names must use standard English scientific (INCI) naming.\n",
                "Make it impressive, scientific, yet accessible. ",
                "Focus on results that sound achievable and desirable.",
            ),
            spec = raw_text
        ),
    }
}

/// Picks the prompt variant the target model accepts.
pub fn image_prompt(model: ImageModel, details: &ImagePromptDetails<'_>) -> String {
    match model {
        ImageModel::TitanV1 => concise_image_prompt(details),
        ImageModel::NovaCanvas => detailed_image_prompt(details),
    }
}

pub fn detailed_image_prompt(details: &ImagePromptDetails<'_>) -> String {
    let styling = details.tonal_styling;
    let container = if styling.contains("frosted") || styling.contains("glass") {
        "Frosted glass bottle"
    } else {
        "Premium glass container"
    };
    let accents = if styling.contains("gold") || styling.contains("metallic") {
        "Metallic gold/silver accents"
    } else {
        "Refined metallic details"
    };

    let prompt = format!(
        concat!(
            "Generate a premium cosmetic product packaging mockup with professional studio photography quality:\n",
            "\n",
            "PRODUCT DETAILS:\n",
            "- Product Name: {name}\n",
            "- Product Type: {kind}\n",
            "- Packaging Style: {styling}\n",
            "\n",
            "VISUAL SPECIFICATIONS:\n",
            "- Ultra-luxury cosmetic product packaging in professional product photography style\n",
            "- Clean white studio background with soft gradient lighting\n",
            "- Product positioned at elegant 3/4 angle showing depth and dimension\n",
            "- High-end department store aesthetic with premium materials\n",
            "- Sophisticated typography and minimalist design elements\n",
            "- Photo-realistic rendering with professional studio lighting\n",
            "\n",
            "COMPOSITION SETUP:\n",
            "- Main product container (bottle/jar) positioned prominently in center-left\n",
            "- Luxury retail packaging box positioned elegantly to the right of the product\n",
            "- Box should complement the product's design language and color scheme\n",
            "\n",
            "MATERIALS & DESIGN:\n",
            "- {container} with elegant proportions\n",
            "- {accents} on cap and label\n",
            "- Clean, modern label design with scientific yet approachable typography\n",
            "- Luxury retail box with embossed details, premium cardstock, and coordinated color palette\n",
            "- Professional lighting with soft reflections and dimensional shadows\n",
            "\n",
            "COMPOSITION & QUALITY:\n",
            "- High-resolution, commercial-grade image quality suitable for luxury brand marketing and e-commerce\n",
            "- Color palette that conveys scientific innovation and premium quality\n",
            "\n",
            "BRAND POSITIONING:\n",
            "- Convey luxury, efficacy, and scientific sophistication through both container and box\n",
            "- Medical-grade aesthetic combined with luxury retail appeal\n",
            "\n",
            "Create a stunning packaging mockup featuring both the product container and its luxury retail box ",
            "that communicates premium quality, scientific credibility, and luxury positioning.",
        ),
        name = details.product_name,
        kind = details.product_type(),
        styling = styling,
        container = container,
        accents = accents,
    );
    truncate_chars(&prompt, MAX_PROMPT_CHARS)
}

pub fn concise_image_prompt(details: &ImagePromptDetails<'_>) -> String {
    let accents = if details.tonal_styling.contains("gold") {
        "gold accents"
    } else {
        "metallic details"
    };
    let prompt = format!(
        concat!(
            "Premium {kind} packaging mockup: \"{name}\" with {styling} styling. ",
            "Professional product photography showing luxury cosmetic container with elegant label ",
            "alongside matching premium retail packaging box. Clean white background, studio lighting, ",
            "{accents}, high-end aesthetic, department store presentation.",
        ),
        kind = details.product_type(),
        name = details.product_name,
        styling = details.tonal_styling,
        accents = accents,
    );
    truncate_chars(&prompt, CONCISE_PROMPT_MAX_CHARS)
}

pub(crate) fn truncate_chars(value: &str, max_chars: usize) -> String {
    match value.char_indices().nth(max_chars) {
        Some((byte_index, _)) => value[..byte_index].to_string(),
        None => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PromptVariant;

    fn details<'a>(name: &'a str, styling: &'a str) -> ImagePromptDetails<'a> {
        ImagePromptDetails {
            product_name: name,
            tonal_styling: styling,
            product_type: None,
        }
    }

    #[test]
    fn thai_formula_prompt_uses_thai_template() {
        let prompt = formula_prompt("สร้างเซรั่มวิตามินซี", Language::Localized);
        assert!(prompt.starts_with("สร้างสูตรเครื่องสำอางระดับพรีเมียม"));
        assert!(prompt.contains("สร้างเซรั่มวิตามินซี"));
        assert!(!prompt.contains("REQUIREMENTS"));
    }

    #[test]
    fn ingredient_names_stay_english_in_both_languages() {
        let thai = formula_prompt("เซรั่ม", Language::Localized);
        assert!(thai.contains("ชื่อส่วนผสม (ingredients) ให้ใช้ภาษาอังกฤษ"));
        assert!(thai.contains("Active Ingredient (Scientific Name)"));

        let english = formula_prompt("serum", Language::Default);
        assert!(english.contains("standard English scientific (INCI) naming"));
        assert!(english.contains("Active Ingredient (Scientific Name)"));
    }

    #[test]
    fn english_formula_prompt_describes_schema() {
        let prompt = formula_prompt("A calming toner", Language::Default);
        for field in ["\"name\"", "\"description\"", "\"claims\"", "\"ingredients\"", "\"tonalStyling\""] {
            assert!(prompt.contains(field), "missing {field}");
        }
        assert!(prompt.contains("A calming toner"));
    }

    #[test]
    fn titan_gets_concise_prompt_within_limit() {
        let long_styling = "frosted glass with rose gold pump ".repeat(40);
        let prompt = image_prompt(ImageModel::TitanV1, &details("Glow Elixir", &long_styling));
        assert!(prompt.chars().count() <= CONCISE_PROMPT_MAX_CHARS);
        assert!(prompt.starts_with("Premium serum packaging mockup"));
    }

    #[test]
    fn concise_prompt_truncates_on_char_boundary() {
        let prompt = concise_image_prompt(&details("เซรั่ม", &"ขวดแก้วฝ้า ".repeat(80)));
        assert_eq!(prompt.chars().count(), CONCISE_PROMPT_MAX_CHARS);
    }

    #[test]
    fn nova_gets_detailed_prompt_with_material_hints() {
        let prompt = image_prompt(
            ImageModel::NovaCanvas,
            &ImagePromptDetails {
                product_name: "Radiance Drops",
                tonal_styling: "frosted glass with gold cap",
                product_type: Some("face oil"),
            },
        );
        assert!(prompt.contains("- Product Type: face oil"));
        assert!(prompt.contains("Frosted glass bottle"));
        assert!(prompt.contains("Metallic gold/silver accents"));
        assert!(prompt.chars().count() > CONCISE_PROMPT_MAX_CHARS);
    }

    #[test]
    fn detailed_prompt_fits_image_function_limit() {
        let long_name = "Radiance ".repeat(100);
        let prompt = detailed_image_prompt(&details(&long_name, "frosted glass"));
        assert_eq!(prompt.chars().count(), MAX_PROMPT_CHARS);

        let prompt = detailed_image_prompt(&details("Glow", "gold"));
        assert!(prompt.chars().count() < MAX_PROMPT_CHARS);
        assert!(prompt.ends_with("luxury positioning."));
    }

    #[test]
    fn each_model_gets_the_prompt_of_its_variant() {
        let details = details("Glow Elixir", "frosted glass");
        for model in ImageModel::ALL {
            let expected = match model.prompt_variant() {
                PromptVariant::Concise => concise_image_prompt(&details),
                PromptVariant::Detailed => detailed_image_prompt(&details),
                PromptVariant::Formula => panic!("{model} mapped to the formula variant"),
            };
            assert_eq!(image_prompt(model, &details), expected);
        }
    }

    #[test]
    fn blank_product_type_defaults_to_serum() {
        let details = ImagePromptDetails {
            product_name: "X",
            tonal_styling: "minimal",
            product_type: Some("  "),
        };
        assert_eq!(details.product_type(), "serum");
    }
}
