//! Google Fonts catalog
//!
//! Process-wide map from lowercased family name to its canonical casing,
//! fetched from the Google webfonts API once per process lifetime. Without
//! an API key the catalog is permanently empty, which is not an error: fonts
//! simply fall through to the later classification rules.

use std::collections::HashMap;
use std::sync::OnceLock;
use std::time::Duration;

use serde::Deserialize;

const WEBFONTS_API: &str = "https://www.googleapis.com/webfonts/v1/webfonts";
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct WebfontsResponse {
    #[serde(default)]
    items: Vec<WebfontItem>,
}

#[derive(Debug, Deserialize)]
struct WebfontItem {
    family: String,
}

/// Lazily-populated catalog of Google-hosted font families.
///
/// Population races between concurrent first callers are harmless: the fetch
/// is idempotent and only one result map wins.
#[derive(Debug, Default)]
pub struct FontCatalog {
    api_key: Option<String>,
    families: OnceLock<HashMap<String, String>>,
}

impl FontCatalog {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key,
            families: OnceLock::new(),
        }
    }

    /// Catalog preloaded with canonical family names; used in tests and by
    /// embedders that bring their own font list.
    pub fn with_families<I: IntoIterator<Item = String>>(families: I) -> Self {
        let map = families
            .into_iter()
            .map(|f| (canonical_key(&f), f))
            .collect();
        let cell = OnceLock::new();
        let _ = cell.set(map);
        Self {
            api_key: None,
            families: cell,
        }
    }

    /// Canonical family name for a classification key, if Google hosts it.
    pub fn lookup(&self, key: &str) -> Option<&str> {
        self.families().get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.families().is_empty()
    }

    fn families(&self) -> &HashMap<String, String> {
        self.families.get_or_init(|| match &self.api_key {
            None => {
                tracing::debug!("no Google Fonts API key configured, catalog stays empty");
                HashMap::new()
            }
            Some(key) => match fetch_families(key) {
                Ok(map) => {
                    tracing::info!(count = map.len(), "loaded Google Fonts catalog");
                    map
                }
                Err(e) => {
                    tracing::warn!("failed to load Google Fonts catalog: {}", e);
                    HashMap::new()
                }
            },
        })
    }
}

/// Key under which families are stored: lowercased, whitespace and
/// hyphen/underscore stripped, matching the classifier's dedup key.
fn canonical_key(family: &str) -> String {
    family
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-' && *c != '_')
        .collect()
}

fn fetch_families(api_key: &str) -> Result<HashMap<String, String>, String> {
    let agent = ureq::Agent::new_with_config(
        ureq::Agent::config_builder()
            .timeout_global(Some(FETCH_TIMEOUT))
            .build(),
    );

    let api_url = format!("{}?key={}&sort=popularity", WEBFONTS_API, api_key);
    let body = match agent.get(&api_url).call() {
        Ok(resp) if resp.status().is_success() => resp
            .into_body()
            .read_to_string()
            .map_err(|e| format!("failed to read response: {}", e))?,
        Ok(resp) => return Err(format!("HTTP {}", resp.status())),
        Err(e) => return Err(format!("request failed: {}", e)),
    };

    let parsed: WebfontsResponse =
        serde_json::from_str(&body).map_err(|e| format!("invalid response JSON: {}", e))?;

    Ok(parsed
        .items
        .into_iter()
        .map(|item| (canonical_key(&item.family), item.family))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_key_means_empty_catalog() {
        let catalog = FontCatalog::new(None);
        assert!(catalog.is_empty());
        assert_eq!(catalog.lookup("roboto"), None);
    }

    #[test]
    fn test_preloaded_lookup() {
        let catalog = FontCatalog::with_families(vec![
            "Roboto".to_string(),
            "Open Sans".to_string(),
            "PT Serif".to_string(),
        ]);
        assert_eq!(catalog.lookup("roboto"), Some("Roboto"));
        // Keys fold whitespace away, values keep the canonical casing
        assert_eq!(catalog.lookup("opensans"), Some("Open Sans"));
        assert_eq!(catalog.lookup("ptserif"), Some("PT Serif"));
        assert_eq!(catalog.lookup("unknownfamily"), None);
    }

    #[test]
    fn test_webfonts_payload_parsing() {
        let body = r#"{"kind":"webfonts#webfontList","items":[
            {"family":"Roboto","variants":["regular","700"]},
            {"family":"Lato","variants":["regular"]}
        ]}"#;
        let parsed: WebfontsResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.items.len(), 2);
        assert_eq!(parsed.items[0].family, "Roboto");
    }
}
