//! Web asset extraction pipeline
//!
//! Renders an arbitrary public URL in a headless browser and harvests:
//! - image references (including lazy-loaded and responsive variants)
//! - font families, classified by provenance (system/Google/Adobe/...)
//! - an area-weighted color palette, clustered by perceptual distance
//!
//! Each request drives one isolated browser process; anonymous callers are
//! bounded by a per-session usage quota.

pub mod catalog;
pub mod config;
pub mod download;
pub mod error;
pub mod extractors;
pub mod guard;
pub mod pipeline;
pub mod quota;
pub mod render;

pub use catalog::FontCatalog;
pub use config::ExtractorConfig;
pub use download::{download_image, DownloadedImage};
pub use error::{ExtractError, StatusCategory};
pub use extractors::{
    ColorPalette, ExtractionRequest, ExtractionResponse, FontKind, FontResult,
};
pub use pipeline::Extractor;
pub use quota::{Caller, UsageSink};
pub use render::{CancelToken, PageRenderer, RenderOptions, RenderedPage};
