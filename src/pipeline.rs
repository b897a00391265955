//! Extraction orchestrator
//!
//! Sequences quota enforcement, URL normalization, the headless render and
//! the per-category post-processing, and maps every internal failure onto
//! the public error taxonomy.

use std::collections::HashSet;
use std::sync::Arc;

use scraper::Html;
use url::Url;

use crate::catalog::FontCatalog;
use crate::config::ExtractorConfig;
use crate::error::ExtractError;
use crate::extractors::{
    classify_fonts, cluster_colors, detect_adobe_fonts, extract_google_link_fonts, harvest_images,
    ColorPalette, ExtractionRequest, ExtractionResponse, FontResult,
};
use crate::guard::ensure_public_target;
use crate::quota::{Caller, LogUsageSink, QuotaStore, UsageSink};
use crate::render::{CancelToken, ChromeRenderer, PageRenderer, RenderError, RenderOptions};

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// The asset extraction service.
pub struct Extractor {
    config: ExtractorConfig,
    renderer: Arc<dyn PageRenderer>,
    catalog: Arc<FontCatalog>,
    quota: QuotaStore,
    usage: Arc<dyn UsageSink>,
}

impl Extractor {
    /// Production wiring: headless Chrome renderer, log-backed usage sink.
    pub fn new(config: ExtractorConfig) -> Self {
        let renderer = Arc::new(ChromeRenderer::new(&config));
        Self::with_parts(config, renderer, Arc::new(LogUsageSink))
    }

    /// Explicit wiring for tests and embedders.
    pub fn with_parts(
        config: ExtractorConfig,
        renderer: Arc<dyn PageRenderer>,
        usage: Arc<dyn UsageSink>,
    ) -> Self {
        let catalog = Arc::new(FontCatalog::new(config.google_fonts_api_key.clone()));
        let quota = QuotaStore::new(config.max_anonymous_uses);
        Self {
            config,
            renderer,
            catalog,
            quota,
            usage,
        }
    }

    /// Run one extraction request end to end.
    ///
    /// The quota is consumed before any network activity; a failed render
    /// still counts against an anonymous session.
    pub async fn extract(
        &self,
        caller: &Caller,
        request: ExtractionRequest,
    ) -> Result<ExtractionResponse, ExtractError> {
        if !self.quota.check_and_increment(caller) {
            return Err(ExtractError::QuotaExceeded);
        }

        let url = normalize_url(&request.url)?;
        ensure_public_target(&url).map_err(|e| ExtractError::InvalidInput(e.to_string()))?;

        tracing::info!(%url, ?caller, "starting extraction");

        let renderer = Arc::clone(&self.renderer);
        let catalog = Arc::clone(&self.catalog);
        let config = self.config.clone();
        let cancel = CancelToken::new();
        let target = url.clone();
        let req = request.clone();

        let harvested = tokio::task::spawn_blocking(move || {
            run_pipeline(renderer.as_ref(), catalog.as_ref(), &config, &target, &req, &cancel)
        })
        .await
        .map_err(|e| ExtractError::Internal(format!("pipeline task failed: {}", e)))??;

        let response = assemble_response(&request, harvested);

        if request.wants_anything()
            && response.images.is_none()
            && response.fonts.is_none()
            && response.colors.is_none()
        {
            return Err(ExtractError::NoAssetsFound);
        }

        if matches!(caller, Caller::User { .. }) {
            self.usage
                .record(caller, "extractor", serde_json::json!({ "url": url.as_str() }));
        }

        tracing::info!(
            images = response.images.as_ref().map_or(0, Vec::len),
            fonts = response.fonts.as_ref().map_or(0, Vec::len),
            "extraction complete"
        );
        Ok(response)
    }
}

/// Ensure the raw URL carries a scheme, then parse it.
pub fn normalize_url(raw: &str) -> Result<Url, ExtractError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ExtractError::InvalidInput("a URL is required".to_string()));
    }
    let with_scheme = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };
    Url::parse(&with_scheme).map_err(|e| ExtractError::InvalidInput(format!("invalid URL: {}", e)))
}

#[derive(Debug, Default)]
struct HarvestedAssets {
    images: HashSet<String>,
    fonts: Vec<FontResult>,
    colors: ColorPalette,
}

/// Blocking part of the request: render, then post-process the requested
/// categories.
fn run_pipeline(
    renderer: &dyn PageRenderer,
    catalog: &FontCatalog,
    config: &ExtractorConfig,
    url: &Url,
    request: &ExtractionRequest,
    cancel: &CancelToken,
) -> Result<HarvestedAssets, ExtractError> {
    let options = RenderOptions {
        scroll_for_images: request.extract_images,
        sample_styles: request.extract_fonts || request.extract_colors,
    };

    let page = renderer.render(url, &options, cancel).map_err(map_render_error)?;

    let mut assets = HarvestedAssets::default();

    if request.extract_images {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.stylesheet_timeout)
            .user_agent(BROWSER_USER_AGENT)
            .build()
            .map_err(|e| ExtractError::Internal(format!("HTTP client setup failed: {}", e)))?;
        assets.images = harvest_images(&page.html, url, &client, config.max_url_len);
    }

    if request.extract_fonts {
        let document = Html::parse_document(&page.html);
        let google_link_fonts = extract_google_link_fonts(&document);
        let is_adobe_site = detect_adobe_fonts(&page.html);
        assets.fonts = classify_fonts(&page.font_stacks, &google_link_fonts, is_adobe_site, catalog);
    }

    if request.extract_colors {
        assets.colors = cluster_colors(&page.color_area, config.cluster_threshold);
    }

    Ok(assets)
}

fn map_render_error(err: RenderError) -> ExtractError {
    match err {
        RenderError::NameNotResolved => ExtractError::UpstreamUnreachable,
        RenderError::Timeout(_) => ExtractError::RenderTimeout,
        other => ExtractError::Internal(other.to_string()),
    }
}

/// Sort and attach each requested category; empty categories stay absent.
fn assemble_response(request: &ExtractionRequest, assets: HarvestedAssets) -> ExtractionResponse {
    let mut response = ExtractionResponse::default();

    if request.extract_images && !assets.images.is_empty() {
        let mut images: Vec<String> = assets.images.into_iter().collect();
        images.sort();
        response.images = Some(images);
    }

    if request.extract_fonts && !assets.fonts.is_empty() {
        let mut fonts = assets.fonts;
        fonts.sort_by(|a, b| a.display_name.cmp(&b.display_name));
        response.fonts = Some(fonts);
    }

    if request.extract_colors && !assets.colors.is_empty() {
        response.colors = Some(assets.colors);
    }

    response
}
