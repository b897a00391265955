//! Image URL harvesting
//!
//! Collects every candidate image reference from a rendered document:
//! `<img>`/`<picture>` elements (preferring the widest responsive
//! candidate), inline `background-image` declarations, and `url(...)`
//! occurrences inside linked stylesheets.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::guard::ensure_public_target;

fn css_url_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"url\((.*?)\)").unwrap())
}

/// Pick the widest candidate from a srcset-style declaration.
///
/// Each comma-separated entry is "URL, optional width descriptor"; entries
/// without a descriptor count as width 1. Returns None for empty input.
pub fn largest_from_srcset(srcset: &str) -> Option<String> {
    let mut best: Option<(u32, &str)> = None;

    for entry in srcset.split(',') {
        let mut parts = entry.split_whitespace();
        let Some(candidate_url) = parts.next() else {
            continue;
        };
        let width = match parts.next() {
            Some(descriptor) if descriptor.contains('w') => descriptor
                .chars()
                .filter(|c| c.is_ascii_digit())
                .collect::<String>()
                .parse::<u32>()
                .unwrap_or(1),
            _ => 1,
        };
        if best.map_or(true, |(w, _)| width > w) {
            best = Some((width, candidate_url));
        }
    }

    best.map(|(_, u)| u.to_string())
}

/// Harvest image URLs from `<img>` and `<picture>` elements.
pub fn harvest_dom_images(document: &Html, base_url: &Url, max_url_len: usize) -> HashSet<String> {
    let img_selector = Selector::parse("img").unwrap();
    let source_selector = Selector::parse("source[srcset]").unwrap();

    let mut image_urls = HashSet::new();

    for img in document.select(&img_selector) {
        let mut src_to_use: Option<String> = None;

        // Inside a responsive <picture>, the sibling <source> elements carry
        // the real candidates; the first one that yields a URL wins.
        if let Some(picture) = enclosing_picture(&img) {
            for source in picture.select(&source_selector) {
                if let Some(srcset) = source.value().attr("srcset") {
                    if let Some(chosen) = largest_from_srcset(srcset) {
                        src_to_use = Some(chosen);
                        break;
                    }
                }
            }
        }

        if src_to_use.is_none() {
            let attrs = img.value();
            src_to_use = attrs
                .attr("data-srcset")
                .and_then(largest_from_srcset)
                .or_else(|| attrs.attr("data-src").map(String::from))
                .or_else(|| attrs.attr("srcset").and_then(largest_from_srcset))
                .or_else(|| attrs.attr("src").map(String::from));
        }

        if let Some(src) = src_to_use {
            accept_candidate(&mut image_urls, &src, base_url, max_url_len);
        }
    }

    image_urls
}

fn enclosing_picture<'a>(img: &ElementRef<'a>) -> Option<ElementRef<'a>> {
    img.ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "picture")
}

fn accept_candidate(out: &mut HashSet<String>, src: &str, base_url: &Url, max_url_len: usize) {
    if src.starts_with("data:image") || src.starts_with("about:blank") {
        return;
    }
    if let Ok(resolved) = base_url.join(src) {
        let resolved = resolved.to_string();
        if resolved.len() < max_url_len {
            out.insert(resolved);
        }
    }
}

/// Harvest `background-image: url(...)` references from inline styles.
pub fn harvest_inline_background_images(
    document: &Html,
    base_url: &Url,
    max_url_len: usize,
) -> HashSet<String> {
    let selector = Selector::parse(r#"[style*="background-image"]"#).unwrap();
    let mut image_urls = HashSet::new();

    for element in document.select(&selector) {
        let Some(style) = element.value().attr("style") else {
            continue;
        };
        if let Some(caps) = css_url_pattern().captures(style) {
            let raw = caps[1].trim().trim_matches(|c| c == '\'' || c == '"');
            if !raw.is_empty() && !raw.starts_with("data:image") {
                accept_candidate(&mut image_urls, raw, base_url, max_url_len);
            }
        }
    }

    image_urls
}

/// Resolve the hrefs of every `<link rel="stylesheet">` in the document.
pub fn stylesheet_links(document: &Html, base_url: &Url) -> Vec<Url> {
    let selector = Selector::parse(r#"link[rel~="stylesheet"][href]"#).unwrap();
    document
        .select(&selector)
        .filter_map(|link| link.value().attr("href"))
        .filter_map(|href| base_url.join(href).ok())
        .collect()
}

/// Scan stylesheet text for `url(...)` references, excluding data URIs and
/// fragment-only references. Relative URLs resolve against the stylesheet's
/// own URL, not the page's.
pub fn scan_stylesheet_urls(css_text: &str, css_url: &Url, max_url_len: usize) -> HashSet<String> {
    let mut image_urls = HashSet::new();

    for caps in css_url_pattern().captures_iter(css_text) {
        let raw = caps[1].trim().trim_matches(|c| c == '\'' || c == '"');
        if raw.is_empty() || raw.starts_with("data:image") || raw.starts_with('#') {
            continue;
        }
        accept_candidate(&mut image_urls, raw, css_url, max_url_len);
    }

    image_urls
}

/// Full harvest over a rendered document: DOM images, inline backgrounds,
/// and linked stylesheets. Stylesheet fetches are best-effort: a failed or
/// guarded-off fetch is logged and skipped, never fatal.
pub fn harvest_images(
    html: &str,
    base_url: &Url,
    client: &reqwest::blocking::Client,
    max_url_len: usize,
) -> HashSet<String> {
    let document = Html::parse_document(html);

    let mut image_urls = harvest_dom_images(&document, base_url, max_url_len);
    image_urls.extend(harvest_inline_background_images(&document, base_url, max_url_len));

    for css_url in stylesheet_links(&document, base_url) {
        if let Err(reason) = ensure_public_target(&css_url) {
            tracing::warn!(%css_url, %reason, "skipping stylesheet");
            continue;
        }
        match fetch_stylesheet(client, &css_url) {
            Ok(css_text) => {
                image_urls.extend(scan_stylesheet_urls(&css_text, &css_url, max_url_len));
            }
            Err(reason) => {
                tracing::warn!(%css_url, %reason, "could not fetch stylesheet");
            }
        }
    }

    image_urls
}

fn fetch_stylesheet(client: &reqwest::blocking::Client, css_url: &Url) -> Result<String, String> {
    let response = client
        .get(css_url.clone())
        .send()
        .map_err(|e| format!("request failed: {}", e))?;

    if !response.status().is_success() {
        return Err(format!("HTTP {}", response.status()));
    }

    response.text().map_err(|e| format!("failed to read body: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://example.com/page/").unwrap()
    }

    #[test]
    fn test_largest_from_srcset() {
        assert_eq!(
            largest_from_srcset("a.jpg 400w, b.jpg 800w"),
            Some("b.jpg".to_string())
        );
        // Density descriptors carry no 'w', so they default to width 1
        assert_eq!(
            largest_from_srcset("small.jpg, big.jpg 2x"),
            Some("small.jpg".to_string())
        );
        assert_eq!(largest_from_srcset(""), None);
        assert_eq!(largest_from_srcset("single.jpg"), Some("single.jpg".to_string()));
    }

    #[test]
    fn test_picture_prefers_widest_source() {
        let html = r#"
        <picture>
            <source srcset="a.jpg 400w, b.jpg 800w" type="image/jpeg">
            <img src="fallback.jpg">
        </picture>
        "#;
        let document = Html::parse_document(html);
        let urls = harvest_dom_images(&document, &base(), 2048);
        assert!(urls.contains("https://example.com/page/b.jpg"));
        assert!(!urls.iter().any(|u| u.contains("fallback")));
    }

    #[test]
    fn test_lazy_attribute_priority() {
        let html = r#"<img data-srcset="lazy-a.jpg 100w, lazy-b.jpg 300w" srcset="eager.jpg 500w" src="plain.jpg">"#;
        let document = Html::parse_document(html);
        let urls = harvest_dom_images(&document, &base(), 2048);
        assert_eq!(urls.len(), 1);
        assert!(urls.contains("https://example.com/page/lazy-b.jpg"));

        let html = r#"<img data-src="lazy.jpg" src="plain.jpg">"#;
        let document = Html::parse_document(html);
        let urls = harvest_dom_images(&document, &base(), 2048);
        assert!(urls.contains("https://example.com/page/lazy.jpg"));

        let html = r#"<img src="plain.jpg">"#;
        let document = Html::parse_document(html);
        let urls = harvest_dom_images(&document, &base(), 2048);
        assert!(urls.contains("https://example.com/page/plain.jpg"));
    }

    #[test]
    fn test_rejects_data_uris_and_placeholders() {
        let html = r#"
        <img src="data:image/png;base64,iVBORw0KGgo=">
        <img src="about:blank">
        <img src="/real.png">
        "#;
        let document = Html::parse_document(html);
        let urls = harvest_dom_images(&document, &base(), 2048);
        assert_eq!(urls.len(), 1);
        assert!(urls.contains("https://example.com/real.png"));
    }

    #[test]
    fn test_rejects_overlong_urls() {
        let long_name = "a".repeat(3000);
        let html = format!(r#"<img src="/{}.jpg">"#, long_name);
        let document = Html::parse_document(&html);
        let urls = harvest_dom_images(&document, &base(), 2048);
        assert!(urls.is_empty());
    }

    #[test]
    fn test_duplicates_collapse() {
        let html = r#"<img src="/logo.png"><img src="logo.png"><div style="background-image: url('/logo.png')"></div>"#;
        let document = Html::parse_document(html);
        let base = Url::parse("https://example.com/").unwrap();
        let mut urls = harvest_dom_images(&document, &base, 2048);
        urls.extend(harvest_inline_background_images(&document, &base, 2048));
        assert_eq!(urls.len(), 1);
        assert!(urls.contains("https://example.com/logo.png"));
    }

    #[test]
    fn test_inline_background_image() {
        let html = r#"<div style="color: red; background-image: url('hero.webp')">x</div>"#;
        let document = Html::parse_document(html);
        let urls = harvest_inline_background_images(&document, &base(), 2048);
        assert!(urls.contains("https://example.com/page/hero.webp"));
    }

    #[test]
    fn test_scan_stylesheet_urls() {
        let css_url = Url::parse("https://cdn.example.com/assets/site.css").unwrap();
        let css = r#"
        .hero { background: url("../img/hero.jpg") no-repeat; }
        .icon { background-image: url(data:image/svg+xml;base64,abc); }
        .ref { fill: url(#gradient); }
        .abs { background: url('https://cdn.example.com/banner.png'); }
        "#;
        let urls = scan_stylesheet_urls(css, &css_url, 2048);
        assert_eq!(urls.len(), 2);
        assert!(urls.contains("https://cdn.example.com/img/hero.jpg"));
        assert!(urls.contains("https://cdn.example.com/banner.png"));
    }

    #[test]
    fn test_stylesheet_links_resolve() {
        let html = r#"
        <link rel="stylesheet" href="/css/main.css">
        <link rel="preload stylesheet" href="extra.css">
        <link rel="icon" href="/favicon.ico">
        "#;
        let document = Html::parse_document(html);
        let links = stylesheet_links(&document, &base());
        let links: Vec<String> = links.into_iter().map(|u| u.to_string()).collect();
        assert_eq!(links.len(), 2);
        assert!(links.contains(&"https://example.com/css/main.css".to_string()));
        assert!(links.contains(&"https://example.com/page/extra.css".to_string()));
    }
}
