//! Color palette extraction
//!
//! Turns the area-weighted map of computed CSS color strings into ranked
//! palettes. Clustering is a deterministic single-pass greedy merge in
//! score-descending order with first-fit assignment; downstream consumers
//! rely on this exact behavior, so it must not be swapped for a "better"
//! clustering algorithm.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

use super::ColorPalette;

const PRIMARY_COUNT: usize = 8;
const SECONDARY_COUNT: usize = 16;

fn numeric_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\d.]+").unwrap())
}

fn integer_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+").unwrap())
}

/// Parse a computed CSS color string into uppercase `#RRGGBB` hex.
///
/// `rgba(...)` values with alpha below 0.5 are visually insignificant and
/// dropped. Anything that does not carry three 0-255 components is skipped.
pub fn parse_css_color(color_str: &str) -> Option<String> {
    if color_str.contains("rgba") {
        let runs: Vec<&str> = numeric_runs()
            .find_iter(color_str)
            .map(|m| m.as_str())
            .collect();
        if runs.len() == 4 {
            let alpha: f64 = runs[3].parse().ok()?;
            if alpha < 0.5 {
                return None;
            }
        }
    }

    let mut components = integer_runs().find_iter(color_str);
    let r: u8 = components.next()?.as_str().parse().ok()?;
    let g: u8 = components.next()?.as_str().parse().ok()?;
    let b: u8 = components.next()?.as_str().parse().ok()?;

    Some(format!("#{:02X}{:02X}{:02X}", r, g, b))
}

fn hex_to_rgb(hex: &str) -> Option<(u8, u8, u8)> {
    let digits = hex.strip_prefix('#')?;
    if digits.len() != 6 {
        return None;
    }
    let r = u8::from_str_radix(&digits[0..2], 16).ok()?;
    let g = u8::from_str_radix(&digits[2..4], 16).ok()?;
    let b = u8::from_str_radix(&digits[4..6], 16).ok()?;
    Some((r, g, b))
}

fn distance(a: (u8, u8, u8), b: (u8, u8, u8)) -> f64 {
    let dr = a.0 as f64 - b.0 as f64;
    let dg = a.1 as f64 - b.1 as f64;
    let db = a.2 as f64 - b.2 as f64;
    (dr * dr + dg * dg + db * db).sqrt()
}

struct Cluster {
    /// Representative color: the highest-scored member, fixed at creation.
    hex: String,
    rgb: (u8, u8, u8),
    score: f64,
}

/// Cluster an area-weighted color map into primary and secondary palettes.
///
/// Exact hex collisions merge first; clusters then form greedily in
/// score-descending order (equal scores break by hex so runs are
/// deterministic), attaching each color to the first cluster whose
/// representative is within `threshold` Euclidean RGB distance.
pub fn cluster_colors(color_area: &HashMap<String, f64>, threshold: f64) -> ColorPalette {
    let mut hex_scores: HashMap<String, f64> = HashMap::new();
    for (color_str, score) in color_area {
        if let Some(hex) = parse_css_color(color_str) {
            *hex_scores.entry(hex).or_insert(0.0) += score;
        }
    }

    if hex_scores.is_empty() {
        return ColorPalette::default();
    }

    let mut ranked: Vec<(String, f64)> = hex_scores.into_iter().collect();
    ranked.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });

    let mut clusters: Vec<Cluster> = Vec::new();
    for (hex, score) in ranked {
        let Some(rgb) = hex_to_rgb(&hex) else {
            continue;
        };
        match clusters
            .iter_mut()
            .find(|cluster| distance(rgb, cluster.rgb) < threshold)
        {
            Some(cluster) => cluster.score += score,
            None => clusters.push(Cluster { hex, rgb, score }),
        }
    }

    clusters.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.hex.cmp(&b.hex))
    });

    let mut hexes = clusters.into_iter().map(|c| c.hex);
    ColorPalette {
        primary: hexes.by_ref().take(PRIMARY_COUNT).collect(),
        secondary: hexes.take(SECONDARY_COUNT).collect(),
    }
}
