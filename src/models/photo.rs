//! Photo record model

use serde::{Deserialize, Serialize};

/// Host that serves resized renditions of a photo
pub const RESIZE_HOST: &str = "https://picsum.photos";

/// A photo listed by the API
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PhotoRecord {
    /// Photo ID (numeric string)
    pub id: String,
    /// Photographer name
    pub author: String,
    /// Intrinsic width in pixels
    pub width: u32,
    /// Intrinsic height in pixels
    pub height: u32,
    /// Page on the original listing site
    pub listing_url: String,
    /// Full-resolution download URL
    pub download_url: String,
}

impl PhotoRecord {
    /// Create a record with the given dimensions and derived URLs
    pub fn new(id: &str, author: &str, width: u32, height: u32) -> Self {
        Self {
            id: id.to_string(),
            author: author.to_string(),
            width,
            height,
            listing_url: String::new(),
            download_url: format!("{RESIZE_HOST}/id/{id}/{width}/{height}"),
        }
    }

    /// Height of a row showing this photo at `viewport_width`.
    ///
    /// A record with a zero side is shown as a square.
    pub fn row_height(&self, viewport_width: u32) -> u32 {
        scale_height(self.width, self.height, viewport_width)
    }

    /// URL of a rendition resized to `width`, keeping the aspect ratio
    pub fn resized_url(&self, width: u32) -> String {
        let height = self.row_height(width);
        format!("{RESIZE_HOST}/id/{}/{width}/{height}", self.id)
    }

    /// Width over height, or 1.0 when either side is zero
    pub fn aspect_ratio(&self) -> f64 {
        if self.width == 0 || self.height == 0 {
            1.0
        } else {
            f64::from(self.width) / f64::from(self.height)
        }
    }

    /// Caption shown under the photo
    pub fn size_label(&self) -> String {
        format!("Size: {} x {}", self.width, self.height)
    }
}

/// Height for `target_width` preserving the `width`:`height` ratio.
///
/// Falls back to `target_width` (a square) when either side is zero.
pub fn scale_height(width: u32, height: u32, target_width: u32) -> u32 {
    if width == 0 || height == 0 {
        return target_width;
    }
    let scaled = u64::from(height) * u64::from(target_width) / u64::from(width);
    u32::try_from(scaled).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PhotoRecord {
        PhotoRecord::new("0", "Alejandro Escamilla", 5000, 3333)
    }

    #[test]
    fn test_row_height_keeps_ratio() {
        assert_eq!(sample().row_height(500), 333);
        assert_eq!(sample().row_height(390), 259);
    }

    #[test]
    fn test_zero_width_is_square() {
        let photo = PhotoRecord::new("7", "Nobody", 0, 400);
        assert_eq!(photo.row_height(320), 320);
        assert_eq!(photo.resized_url(320), "https://picsum.photos/id/7/320/320");
        assert!((photo.aspect_ratio() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_zero_height_is_square() {
        let photo = PhotoRecord::new("5", "Nobody", 400, 0);
        assert_eq!(photo.row_height(320), 320);
        assert_eq!(photo.resized_url(320), "https://picsum.photos/id/5/320/320");
    }

    #[test]
    fn test_resized_url() {
        assert_eq!(
            sample().resized_url(500),
            "https://picsum.photos/id/0/500/333"
        );
    }

    #[test]
    fn test_size_label() {
        assert_eq!(sample().size_label(), "Size: 5000 x 3333");
    }
}
