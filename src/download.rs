//! Single-image download helper
//!
//! Fetches one harvested image URL on behalf of the user, with the page URL
//! as referer (many CDNs refuse referer-less requests). SVG and GIF payloads
//! pass through untouched; everything else is normalized to RGBA PNG.

use std::io::Cursor;

use thiserror::Error;
use url::Url;

use crate::guard::ensure_public_target;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("refused target: {0}")]
    Refused(String),
    #[error("fetch failed: {0}")]
    Fetch(String),
    #[error("unsupported or corrupt image payload: {0}")]
    Decode(String),
}

/// A fetched image ready to hand back to the caller.
#[derive(Debug, Clone)]
pub struct DownloadedImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub filename: String,
}

/// Fetch `image_url` (no retries) and normalize the payload.
pub fn download_image(
    client: &reqwest::blocking::Client,
    image_url: &Url,
    page_url: &Url,
) -> Result<DownloadedImage, DownloadError> {
    ensure_public_target(image_url).map_err(|e| DownloadError::Refused(e.to_string()))?;

    let response = client
        .get(image_url.clone())
        .header(reqwest::header::REFERER, page_url.as_str())
        .send()
        .map_err(|e| DownloadError::Fetch(e.to_string()))?;

    if !response.status().is_success() {
        return Err(DownloadError::Fetch(format!("HTTP {}", response.status())));
    }

    let mime_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();

    let bytes = response
        .bytes()
        .map_err(|e| DownloadError::Fetch(e.to_string()))?
        .to_vec();

    let extension = extension_for(&mime_type);
    let bytes = if extension == "png" {
        normalize_to_png(&bytes)?
    } else {
        bytes
    };

    let filename = format!("{}.{}", base_name(image_url), extension);

    Ok(DownloadedImage {
        bytes,
        mime_type,
        filename,
    })
}

fn extension_for(mime_type: &str) -> &'static str {
    if mime_type.contains("svg") {
        "svg"
    } else if mime_type.contains("gif") {
        "gif"
    } else {
        "png"
    }
}

/// Decode any raster payload and re-encode as RGBA PNG.
fn normalize_to_png(bytes: &[u8]) -> Result<Vec<u8>, DownloadError> {
    let decoded = image::load_from_memory(bytes).map_err(|e| DownloadError::Decode(e.to_string()))?;
    let rgba = image::DynamicImage::ImageRgba8(decoded.to_rgba8());

    let mut out = Vec::new();
    rgba.write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
        .map_err(|e| DownloadError::Decode(e.to_string()))?;
    Ok(out)
}

/// Filename stem derived from the URL's last path segment: query and
/// extension stripped, limited to safe characters, capped at 100 chars.
fn base_name(image_url: &Url) -> String {
    let last_segment = image_url
        .path_segments()
        .and_then(|mut s| s.next_back())
        .unwrap_or("");
    let stem = last_segment
        .split('?')
        .next()
        .unwrap_or("")
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(last_segment);

    let cleaned: String = stem
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .take(100)
        .collect();

    if cleaned.is_empty() {
        "image".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_name_sanitization() {
        let url = Url::parse("https://cdn.example.com/img/hero%20shot.jpg?v=3").unwrap();
        assert_eq!(base_name(&url), "hero20shot");

        let url = Url::parse("https://example.com/").unwrap();
        assert_eq!(base_name(&url), "image");

        let url = Url::parse("https://example.com/photos/logo.svg").unwrap();
        assert_eq!(base_name(&url), "logo");
    }

    #[test]
    fn test_extension_for_mime() {
        assert_eq!(extension_for("image/svg+xml"), "svg");
        assert_eq!(extension_for("image/gif"), "gif");
        assert_eq!(extension_for("image/jpeg"), "png");
        assert_eq!(extension_for("application/octet-stream"), "png");
    }

    #[test]
    fn test_normalize_round_trip() {
        // Encode a tiny image, then normalize it back through the decoder
        let mut source = image::RgbaImage::new(2, 2);
        source.put_pixel(0, 0, image::Rgba([255, 0, 0, 255]));
        let mut png = Vec::new();
        image::DynamicImage::ImageRgba8(source)
            .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();

        let normalized = normalize_to_png(&png).unwrap();
        let decoded = image::load_from_memory(&normalized).unwrap();
        assert_eq!(decoded.width(), 2);
        assert_eq!(decoded.height(), 2);
    }

    #[test]
    fn test_normalize_rejects_garbage() {
        assert!(matches!(
            normalize_to_png(b"definitely not an image"),
            Err(DownloadError::Decode(_))
        ));
    }
}
