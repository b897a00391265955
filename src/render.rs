//! Headless page rendering
//!
//! One isolated browser process per request: no session reuse across
//! requests, so untrusted target pages cannot leak state into each other.
//! The render is a fixed sequence of phases; a cancellation token is checked
//! at every phase boundary and the browser process is torn down on all exit
//! paths (the Chrome child dies when the `Browser` handle drops).

use std::collections::HashMap;
use std::ffi::OsStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use headless_chrome::{Browser, LaunchOptions};
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::config::ExtractorConfig;

/// In-page auto-scroll: steps down the page on a fixed timer until the
/// scroll offset covers the full document height, so viewport-triggered
/// lazy loading fires for every image.
const SCROLL_SCRIPT: &str = r#"
(async () => {
    await new Promise((resolve) => {
        let total = 0;
        const step = 100;
        const timer = setInterval(() => {
            const height = document.body.scrollHeight;
            window.scrollBy(0, step);
            total += step;
            if (total >= height) {
                clearInterval(timer);
                resolve();
            }
        }, 100);
    });
})()
"#;

/// In-page style sampler: for every rendered element (scripts, styles,
/// links and metas excluded), records the computed font stack and
/// accumulates the element's rendered area under its text and background
/// colors. Fully transparent backgrounds are ignored, as are zero-area
/// elements. Returns a JSON string so the value survives the protocol
/// boundary unchanged.
const STYLE_SAMPLE_SCRIPT: &str = r#"
(() => {
    const elements = document.querySelectorAll('*:not(script):not(style):not(link):not(meta)');
    const fontFamilies = new Set();
    const colorsByArea = {};
    elements.forEach((el) => {
        const style = window.getComputedStyle(el);
        const rect = el.getBoundingClientRect();
        const area = rect.width * rect.height;
        if (area < 1) return;
        if (style.fontFamily) fontFamilies.add(style.fontFamily);
        for (const prop of ['color', 'backgroundColor']) {
            const c = style[prop];
            if (c && c !== 'rgba(0, 0, 0, 0)') {
                colorsByArea[c] = (colorsByArea[c] || 0) + area;
            }
        }
    });
    return JSON.stringify({ fonts: Array.from(fontFamilies), colors: colorsByArea });
})()
"#;

/// Which in-page work the render performs.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderOptions {
    /// Auto-scroll to trigger lazy-loaded images before capturing the DOM.
    pub scroll_for_images: bool,
    /// Run the computed-style sampler (fonts and color areas).
    pub sample_styles: bool,
}

/// Everything a render yields; exists only for the duration of one
/// extraction and is dropped after post-processing.
#[derive(Debug, Clone, Default)]
pub struct RenderedPage {
    pub html: String,
    pub font_stacks: Vec<String>,
    pub color_area: HashMap<String, f64>,
}

#[derive(Debug, Deserialize)]
struct StyleSample {
    #[serde(default)]
    fonts: Vec<String>,
    #[serde(default)]
    colors: HashMap<String, f64>,
}

/// Render lifecycle phases, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderPhase {
    Launching,
    Navigating,
    Scrolling,
    Settling,
    Evaluating,
    ClosingDown,
}

impl std::fmt::Display for RenderPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RenderPhase::Launching => "launching",
            RenderPhase::Navigating => "navigating",
            RenderPhase::Scrolling => "scrolling",
            RenderPhase::Settling => "settling",
            RenderPhase::Evaluating => "evaluating",
            RenderPhase::ClosingDown => "closing down",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("domain name could not be resolved")]
    NameNotResolved,
    #[error("render timed out while {0}")]
    Timeout(RenderPhase),
    #[error("render cancelled while {0}")]
    Cancelled(RenderPhase),
    #[error("render failed while {phase}: {message}")]
    Phase { phase: RenderPhase, message: String },
}

/// Cooperative cancellation flag, checked between render phases.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    fn gate(&self, phase: RenderPhase) -> Result<(), RenderError> {
        if self.is_cancelled() {
            Err(RenderError::Cancelled(phase))
        } else {
            Ok(())
        }
    }
}

/// Seam between the orchestrator and the browser; stubbed in tests.
pub trait PageRenderer: Send + Sync {
    fn render(
        &self,
        url: &Url,
        options: &RenderOptions,
        cancel: &CancelToken,
    ) -> Result<RenderedPage, RenderError>;
}

/// Production renderer backed by a per-request headless Chrome process.
#[derive(Debug, Clone)]
pub struct ChromeRenderer {
    navigation_timeout: Duration,
    settle_delay: Duration,
}

impl ChromeRenderer {
    pub fn new(config: &ExtractorConfig) -> Self {
        Self {
            navigation_timeout: config.navigation_timeout,
            settle_delay: config.settle_delay,
        }
    }
}

impl PageRenderer for ChromeRenderer {
    fn render(
        &self,
        url: &Url,
        options: &RenderOptions,
        cancel: &CancelToken,
    ) -> Result<RenderedPage, RenderError> {
        let mut phase = RenderPhase::Launching;
        cancel.gate(phase)?;
        tracing::debug!(%url, "launching browser");

        let launch_options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(false)
            .args(vec![
                OsStr::new("--disable-setuid-sandbox"),
                OsStr::new("--disable-dev-shm-usage"),
            ])
            .build()
            .map_err(|e| RenderError::Phase {
                phase,
                message: e.to_string(),
            })?;

        let browser = Browser::new(launch_options).map_err(|e| classify(phase, &e))?;
        let tab = browser.new_tab().map_err(|e| classify(phase, &e))?;
        tab.set_default_timeout(self.navigation_timeout);

        phase = RenderPhase::Navigating;
        cancel.gate(phase)?;
        tab.navigate_to(url.as_str())
            .and_then(|t| t.wait_until_navigated())
            .map_err(|e| classify(phase, &e))?;

        if options.scroll_for_images {
            phase = RenderPhase::Scrolling;
            cancel.gate(phase)?;
            tracing::debug!(%url, "scrolling to trigger lazy loading");
            tab.evaluate(SCROLL_SCRIPT, true)
                .map_err(|e| classify(phase, &e))?;

            phase = RenderPhase::Settling;
            cancel.gate(phase)?;
            std::thread::sleep(self.settle_delay);
        }

        phase = RenderPhase::Evaluating;
        cancel.gate(phase)?;
        let html = tab.get_content().map_err(|e| classify(phase, &e))?;

        let mut page = RenderedPage {
            html,
            ..Default::default()
        };

        if options.sample_styles {
            let evaluated = tab
                .evaluate(STYLE_SAMPLE_SCRIPT, false)
                .map_err(|e| classify(phase, &e))?;
            let payload = evaluated
                .value
                .as_ref()
                .and_then(|v| v.as_str())
                .ok_or_else(|| RenderError::Phase {
                    phase,
                    message: "style sampler returned no value".to_string(),
                })?;
            let sample: StyleSample =
                serde_json::from_str(payload).map_err(|e| RenderError::Phase {
                    phase,
                    message: format!("style sampler payload invalid: {}", e),
                })?;
            page.font_stacks = sample.fonts;
            page.color_area = sample.colors;
        }

        phase = RenderPhase::ClosingDown;
        tracing::debug!(%url, %phase, html_len = page.html.len(), "render complete");
        // browser (and its Chrome process) shuts down on drop
        Ok(page)
    }
}

fn classify(phase: RenderPhase, err: &anyhow::Error) -> RenderError {
    let message = err.to_string();
    if message.contains("ERR_NAME_NOT_RESOLVED") {
        return RenderError::NameNotResolved;
    }
    let lower = message.to_lowercase();
    if lower.contains("timeout") || lower.contains("timed out") {
        return RenderError::Timeout(phase);
    }
    RenderError::Phase { phase, message }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_token() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        assert!(token.gate(RenderPhase::Navigating).is_ok());

        let shared = token.clone();
        shared.cancel();
        assert!(token.is_cancelled());
        assert!(matches!(
            token.gate(RenderPhase::Scrolling),
            Err(RenderError::Cancelled(RenderPhase::Scrolling))
        ));
    }

    #[test]
    fn test_error_classification() {
        let err = anyhow::anyhow!("navigation failed: net::ERR_NAME_NOT_RESOLVED");
        assert!(matches!(
            classify(RenderPhase::Navigating, &err),
            RenderError::NameNotResolved
        ));

        let err = anyhow::anyhow!("The event waited for never came: Timeout");
        assert!(matches!(
            classify(RenderPhase::Navigating, &err),
            RenderError::Timeout(RenderPhase::Navigating)
        ));

        let err = anyhow::anyhow!("tab crashed");
        match classify(RenderPhase::Evaluating, &err) {
            RenderError::Phase { phase, message } => {
                assert_eq!(phase, RenderPhase::Evaluating);
                assert!(message.contains("tab crashed"));
            }
            other => panic!("unexpected classification: {:?}", other),
        }
    }

    #[test]
    fn test_style_sample_parsing() {
        let payload = r#"{
            "fonts": ["Roboto, sans-serif", "\"Open Sans\", Arial"],
            "colors": {"rgb(255, 255, 255)": 120000.5, "rgb(0, 0, 0)": 8000.0}
        }"#;
        let sample: StyleSample = serde_json::from_str(payload).unwrap();
        assert_eq!(sample.fonts.len(), 2);
        assert_eq!(sample.colors["rgb(255, 255, 255)"], 120000.5);

        // Missing fields default to empty
        let sample: StyleSample = serde_json::from_str("{}").unwrap();
        assert!(sample.fonts.is_empty());
        assert!(sample.colors.is_empty());
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(RenderPhase::ClosingDown.to_string(), "closing down");
        let err = RenderError::Timeout(RenderPhase::Navigating);
        assert_eq!(err.to_string(), "render timed out while navigating");
    }
}
