//! Thumbnail decoding.
//!
//! The header is read first and the decoder's allocation budget is sized
//! from the source dimensions, so any photo up to [`MAX_SOURCE_DIMENSION`]
//! per side decodes while a forged header cannot make it allocate more.
//! Scaling uses integer box sampling (`thumbnail_exact`) rather than a
//! filtered resample of a full-resolution copy.

use std::io::Cursor;

use image::{DynamicImage, ImageReader, Limits, imageops::FilterType};

use super::{ImageError, TargetSize};

/// Largest source width or height accepted
pub const MAX_SOURCE_DIMENSION: u32 = 16_384;

/// Slack added on top of the pixel buffer for decoder scratch space
pub const MIN_DECODE_BUDGET: u64 = 16 * 1024 * 1024;

/// Widest pixel format a decoder may produce (RGBA, 16 bits per channel)
const MAX_BYTES_PER_PIXEL: u64 = 8;

/// Allocation budget for decoding a `width` x `height` source
pub fn decode_budget(width: u32, height: u32) -> u64 {
    (u64::from(width) * u64::from(height))
        .saturating_mul(MAX_BYTES_PER_PIXEL)
        .saturating_add(MIN_DECODE_BUDGET)
}

fn open_reader(bytes: &[u8]) -> Result<ImageReader<Cursor<&[u8]>>, ImageError> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| ImageError::Decode(e.to_string()))
}

/// Decode `bytes` into a bitmap of exactly `target` size.
///
/// Same bytes and target always produce the same pixels.
pub fn decode_thumbnail(bytes: &[u8], target: TargetSize) -> Result<DynamicImage, ImageError> {
    if target.width == 0 || target.height == 0 {
        return Err(ImageError::Decode(format!(
            "invalid target size {}x{}",
            target.width, target.height
        )));
    }

    let (source_width, source_height) = open_reader(bytes)?
        .into_dimensions()
        .map_err(|e| ImageError::Decode(e.to_string()))?;
    if source_width > MAX_SOURCE_DIMENSION || source_height > MAX_SOURCE_DIMENSION {
        return Err(ImageError::Decode(format!(
            "source too large: {source_width}x{source_height}"
        )));
    }

    let mut limits = Limits::default();
    limits.max_image_width = Some(source_width);
    limits.max_image_height = Some(source_height);
    limits.max_alloc = Some(decode_budget(source_width, source_height));

    let mut reader = open_reader(bytes)?;
    reader.limits(limits);
    let image = reader
        .decode()
        .map_err(|e| ImageError::Decode(e.to_string()))?;

    let (width, height) = (image.width(), image.height());
    let scaled = if width == target.width && height == target.height {
        image
    } else if width >= target.width && height >= target.height {
        image.thumbnail_exact(target.width, target.height)
    } else {
        image.resize_exact(target.width, target.height, FilterType::Triangle)
    };

    Ok(scaled)
}
