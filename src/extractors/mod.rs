//! Asset extraction modules
//!
//! Each module post-processes one signal class harvested from a rendered
//! page: image references, font provenance, color palettes.

mod color_extractor;
mod font_extractor;
mod image_extractor;

pub use color_extractor::*;
pub use font_extractor::*;
pub use image_extractor::*;

use serde::{Deserialize, Serialize};

/// One extraction request: a target URL plus the asset categories to pull.
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractionRequest {
    pub url: String,
    #[serde(default)]
    pub extract_images: bool,
    #[serde(default)]
    pub extract_fonts: bool,
    #[serde(default)]
    pub extract_colors: bool,
}

impl ExtractionRequest {
    pub fn wants_anything(&self) -> bool {
        self.extract_images || self.extract_fonts || self.extract_colors
    }
}

/// Provenance of a harvested font family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FontKind {
    System,
    /// Icon fonts are recognized so they can be dropped from the output.
    Icon,
    Google,
    MyfontsDirect,
    Adobe,
    MyfontsSearch,
}

/// One classified font family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FontResult {
    /// Name exactly as it appeared on the page (shortest colliding variant).
    pub display_name: String,
    /// Human-readable name with style suffixes and separators folded away.
    pub search_name: String,
    #[serde(rename = "type")]
    pub kind: FontKind,
    /// Canonical Google Fonts family name; only present for Google hits.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url_name: Option<String>,
}

/// Ranked color clusters, split into a primary and a secondary palette.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorPalette {
    #[serde(rename = "Primary Palette", default, skip_serializing_if = "Vec::is_empty")]
    pub primary: Vec<String>,
    #[serde(rename = "Secondary Colors", default, skip_serializing_if = "Vec::is_empty")]
    pub secondary: Vec<String>,
}

impl ColorPalette {
    pub fn is_empty(&self) -> bool {
        self.primary.is_empty() && self.secondary.is_empty()
    }
}

/// Successful extraction result; absent categories were either not requested
/// or yielded nothing.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExtractionResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fonts: Option<Vec<FontResult>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub colors: Option<ColorPalette>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults() {
        let req: ExtractionRequest = serde_json::from_str(r#"{"url": "example.com"}"#).unwrap();
        assert_eq!(req.url, "example.com");
        assert!(!req.extract_images);
        assert!(!req.wants_anything());

        let req: ExtractionRequest =
            serde_json::from_str(r#"{"url": "example.com", "extract_fonts": true}"#).unwrap();
        assert!(req.wants_anything());
    }

    #[test]
    fn test_font_result_serialization() {
        let font = FontResult {
            display_name: "Roboto".into(),
            search_name: "Roboto".into(),
            kind: FontKind::Google,
            url_name: Some("Roboto".into()),
        };
        let json = serde_json::to_value(&font).unwrap();
        assert_eq!(json["displayName"], "Roboto");
        assert_eq!(json["type"], "google");
        assert_eq!(json["urlName"], "Roboto");

        let font = FontResult {
            display_name: "Gotham".into(),
            search_name: "Gotham".into(),
            kind: FontKind::MyfontsDirect,
            url_name: None,
        };
        let json = serde_json::to_value(&font).unwrap();
        assert_eq!(json["type"], "myfonts_direct");
        assert!(json.get("urlName").is_none());
    }

    #[test]
    fn test_palette_serialization() {
        let palette = ColorPalette {
            primary: vec!["#FFFFFF".into()],
            secondary: vec![],
        };
        let json = serde_json::to_value(&palette).unwrap();
        assert_eq!(json["Primary Palette"][0], "#FFFFFF");
        assert!(json.get("Secondary Colors").is_none());
    }
}
