//! Data models for photofeed

mod photo;

pub use photo::{PhotoRecord, RESIZE_HOST, scale_height};
