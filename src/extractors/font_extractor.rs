//! Font harvesting and provenance classification
//!
//! Computed font stacks are noisy: they mix human-chosen families with
//! generic fallbacks, build-tool artifacts and style-suffixed aliases of the
//! same face. This module normalizes the raw names, deduplicates them by a
//! classification key, and assigns each surviving family a provenance.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::OnceLock;

use regex::Regex;
use scraper::{Html, Selector};

use super::{FontKind, FontResult};
use crate::catalog::FontCatalog;

/// Generic CSS fallback keywords, never treated as font candidates.
const GENERIC_FALLBACKS: &[&str] = &[
    "sans-serif",
    "serif",
    "monospace",
    "cursive",
    "fantasy",
    "system-ui",
    "ui-sans-serif",
    "ui-serif",
    "apple-system",
    "blinkmacsystemfont",
];

/// A classification key containing one of these is an icon font.
const ICON_FONT_TERMS: &[&str] = &["icon", "awesome", "glyph", "yootheme", "eicons"];

/// OS/browser default faces.
const SYSTEM_FONTS: &[&str] = &[
    "arial",
    "helvetica neue",
    "helvetica",
    "times new roman",
    "georgia",
    "verdana",
    "tahoma",
    "-apple-system",
    "segoe ui",
];

/// Families known to be distributed through MyFonts.
const MYFONTS_KNOWN: &[&str] = &[
    "circular std",
    "gt walsheim pro",
    "avenir next",
    "futura pt",
    "neue haas unica",
    "aktiv grotesk",
    "brandon grotesque",
    "gilroy",
    "gotham",
    "helvetica now",
    "din next",
];

fn canonical(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-' && *c != '_')
        .collect()
}

fn system_fonts_canonical() -> &'static HashSet<String> {
    static SET: OnceLock<HashSet<String>> = OnceLock::new();
    SET.get_or_init(|| SYSTEM_FONTS.iter().map(|s| canonical(s)).collect())
}

fn myfonts_canonical() -> &'static HashSet<String> {
    static SET: OnceLock<HashSet<String>> = OnceLock::new();
    SET.get_or_init(|| MYFONTS_KNOWN.iter().map(|s| canonical(s)).collect())
}

fn garbage_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(wf_|webfont-|var--|mktype-)|([a-f0-9]{8,})").unwrap())
}

fn suffix_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)[_\-\s]?(regular|italic|bold|medium|light|black|heavy|thin|condensed|expanded|oblique|book|roman|pro|std|w[0-9]{1,2}|[1-9]00|demi|semi|extra|cf)\b")
            .unwrap()
    })
}

fn prefix_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^(orig|original)[_\-\s]").unwrap())
}

/// True for machine-generated names: build-tool prefixes or an 8+ run of
/// hex digits anywhere in the name.
pub fn is_garbage_name(name: &str) -> bool {
    garbage_pattern().is_match(&name.to_lowercase())
}

/// Dedup/classification key: vendor prefix stripped, style suffixes stripped
/// to a fixed point (suffixes may stack), then case and separators folded.
pub fn classification_key(name: &str) -> String {
    let mut base = prefix_pattern().replace(name, "").to_string();
    loop {
        let stripped = suffix_pattern().replace_all(&base, "").trim().to_string();
        if stripped == base {
            break;
        }
        base = stripped;
    }
    canonical(&base)
}

/// Human-readable search name: one suffix/prefix pass over the display name,
/// separators folded to single spaces.
fn search_name(display_name: &str) -> String {
    static SEPARATORS: OnceLock<Regex> = OnceLock::new();
    let separators = SEPARATORS.get_or_init(|| Regex::new(r"[_\-]+").unwrap());

    let without_suffix = suffix_pattern().replace_all(display_name, "");
    let without_prefix = prefix_pattern().replace(without_suffix.trim(), "");
    separators
        .replace_all(without_prefix.trim(), " ")
        .trim()
        .to_string()
}

/// Assign a provenance to a classification key.
///
/// Rules run in a fixed priority order, first match wins:
/// system list, icon terms, Google catalog, MyFonts list, Adobe signal,
/// and the "search MyFonts" fallback.
pub fn classify_key(key: &str, catalog: &FontCatalog, is_adobe_site: bool) -> FontKind {
    if system_fonts_canonical().contains(key) {
        return FontKind::System;
    }
    if ICON_FONT_TERMS.iter().any(|term| key.contains(term)) {
        return FontKind::Icon;
    }
    if catalog.lookup(key).is_some() {
        return FontKind::Google;
    }
    if myfonts_canonical().contains(key) {
        return FontKind::MyfontsDirect;
    }
    if is_adobe_site {
        return FontKind::Adobe;
    }
    FontKind::MyfontsSearch
}

/// Families declared through Google Fonts `<link>` elements.
///
/// Handles the classic `css?family=A|B:400,700` form: repeated `family`
/// query parameters, `|`-separated families, `:`-suffixed variant lists.
pub fn extract_google_link_fonts(document: &Html) -> Vec<String> {
    let selector = Selector::parse("link[href]").unwrap();
    let mut found: BTreeSet<String> = BTreeSet::new();

    for link in document.select(&selector) {
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        if !href.contains("fonts.googleapis.com/css") {
            continue;
        }
        let Some((_, query)) = href.split_once('?') else {
            continue;
        };
        for (param, value) in url::form_urlencoded::parse(query.as_bytes()) {
            if param != "family" {
                continue;
            }
            for family_str in value.split('|') {
                let name = family_str
                    .split(':')
                    .next()
                    .unwrap_or("")
                    .replace('+', " ")
                    .trim()
                    .to_string();
                if !name.is_empty() {
                    found.insert(name);
                }
            }
        }
    }

    found.into_iter().collect()
}

/// Whether the page loads Adobe Fonts (typekit loader reference present).
pub fn detect_adobe_fonts(html: &str) -> bool {
    html.contains("use.typekit.net")
}

/// Classify the harvested font names into provenance-tagged results.
///
/// Icon fonts are recognized and dropped. The returned list is unordered;
/// the orchestrator sorts by display name.
pub fn classify_fonts(
    computed_stacks: &[String],
    google_link_fonts: &[String],
    is_adobe_site: bool,
    catalog: &FontCatalog,
) -> Vec<FontResult> {
    // Google-link families are declared by the site author and always
    // trusted as human-readable.
    let mut raw_names: BTreeSet<String> = google_link_fonts.iter().cloned().collect();

    for stack in computed_stacks {
        for entry in stack.split(',') {
            let font = entry.trim_matches(|c: char| c == '\'' || c == '"' || c == ' ');
            if font.is_empty() {
                continue;
            }
            let lower = font.to_lowercase();
            if GENERIC_FALLBACKS.contains(&lower.as_str()) {
                continue;
            }
            if lower.contains("emoji") || lower.contains("symbol") {
                continue;
            }
            raw_names.insert(font.to_string());
        }
    }

    // Shortest raw name wins per classification key.
    let mut font_map: BTreeMap<String, String> = BTreeMap::new();
    for name in raw_names {
        if is_garbage_name(&name) {
            continue;
        }
        let key = classification_key(&name);
        if key.is_empty() {
            continue;
        }
        match font_map.get(&key) {
            Some(existing) if name.len() >= existing.len() => {}
            _ => {
                font_map.insert(key, name);
            }
        }
    }

    let mut results = Vec::new();
    for (key, display_name) in font_map {
        let kind = classify_key(&key, catalog, is_adobe_site);
        if kind == FontKind::Icon {
            continue;
        }
        let url_name = match kind {
            FontKind::Google => Some(
                catalog
                    .lookup(&key)
                    .map(String::from)
                    .unwrap_or_else(|| display_name.clone()),
            ),
            _ => None,
        };
        results.push(FontResult {
            search_name: search_name(&display_name),
            display_name,
            kind,
            url_name,
        });
    }

    results
}
