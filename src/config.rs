//! Pipeline configuration

use std::time::Duration;

use serde::Deserialize;

/// Tunables for the extraction pipeline.
///
/// The defaults match the production service; `from_env` additionally picks
/// up the Google Fonts API credential when one is configured.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Hard ceiling on navigation + quiescence wait.
    #[serde(with = "duration_secs")]
    pub navigation_timeout: Duration,
    /// Pause after the lazy-load scroll before capturing the final DOM.
    #[serde(with = "duration_secs")]
    pub settle_delay: Duration,
    /// Per-stylesheet fetch timeout during image harvesting.
    #[serde(with = "duration_secs")]
    pub stylesheet_timeout: Duration,
    /// Resolved image URLs at or above this length are rejected.
    pub max_url_len: usize,
    /// Euclidean RGB distance below which two colors merge into one cluster.
    pub cluster_threshold: f64,
    /// Extractions allowed per anonymous session.
    pub max_anonymous_uses: u32,
    /// Google Fonts API key; absent means the catalog stays empty.
    pub google_fonts_api_key: Option<String>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            navigation_timeout: Duration::from_secs(30),
            settle_delay: Duration::from_secs(2),
            stylesheet_timeout: Duration::from_secs(10),
            max_url_len: 2048,
            cluster_threshold: 45.0,
            max_anonymous_uses: 3,
            google_fonts_api_key: None,
        }
    }
}

impl ExtractorConfig {
    /// Defaults plus the `GOOGLE_FONTS_API_KEY` environment variable.
    pub fn from_env() -> Self {
        Self {
            google_fonts_api_key: std::env::var("GOOGLE_FONTS_API_KEY")
                .ok()
                .filter(|k| !k.is_empty()),
            ..Self::default()
        }
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
