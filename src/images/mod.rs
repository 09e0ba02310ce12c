//! Thumbnail loading and caching.
//!
//! Thumbnails are downloaded, decoded straight to the row size and kept in a
//! cost-bounded LRU store. Concurrent requests for the same key share a single
//! transfer, and transfers can be cancelled per source URL.

mod cache;
pub mod downsample;
mod loader;

pub use cache::{CacheEntry, LruStore};
pub use downsample::decode_thumbnail;
pub use loader::{CacheStats, ImageCache, ImageCacheConfig};

use std::sync::Arc;

use image::DynamicImage;
use thiserror::Error;

use crate::models::scale_height;

/// Cache key: the source URL plus the size it was downsampled to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Source URL
    pub url: String,
    /// Target width in pixels
    pub width: u32,
    /// Target height in pixels
    pub height: u32,
}

impl CacheKey {
    /// Create a key
    pub fn new(url: &str, width: u32, height: u32) -> Self {
        Self {
            url: url.to_string(),
            width,
            height,
        }
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}x{}", self.url, self.width, self.height)
    }
}

/// Target size of a thumbnail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetSize {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

/// Size a photo of `original_width` x `original_height` is shown at when
/// `display_width` wide. A photo without a width becomes a square.
pub fn scale_to_width(original_width: u32, original_height: u32, display_width: u32) -> TargetSize {
    TargetSize {
        width: display_width,
        height: scale_height(original_width, original_height, display_width),
    }
}

/// A decoded, downsampled image
#[derive(Debug)]
pub struct Thumbnail {
    /// The decoded pixels
    pub image: DynamicImage,
    /// Approximate decoded size in bytes
    pub cost: usize,
}

impl Thumbnail {
    /// Wrap a decoded image, measuring its pixel buffer
    pub fn new(image: DynamicImage) -> Self {
        let cost = image.as_bytes().len();
        Self { image, cost }
    }

    /// Width in pixels
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Height in pixels
    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Shared handle to a cached thumbnail
pub type SharedThumbnail = Arc<Thumbnail>;

/// Failure of a single thumbnail request
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageError {
    /// Download failed before a response arrived
    #[error("network error: {0}")]
    Network(String),
    /// Server answered with a non-2xx status
    #[error("HTTP {0}")]
    Status(u16),
    /// Bytes could not be decoded into an image
    #[error("decode error: {0}")]
    Decode(String),
    /// The transfer was cancelled
    #[error("cancelled")]
    Cancelled,
}
