//! # photofeed
//!
//! Client-side media pipeline for a paginated, searchable photo feed.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Presentation (CLI / UI)                    │
//! │   load_more · set_query · refresh · get thumbnail per row   │
//! └─────────────────────────────────────────────────────────────┘
//!                 │                               │
//!                 ▼                               ▼
//! ┌───────────────────────────────┐ ┌───────────────────────────┐
//! │          Feed                 │ │         Images            │
//! │                               │ │                           │
//! │ • Page cursor / has_more      │ │ • Cost-bounded LRU store  │
//! │ • Debounced search            │ │ • Request coalescing      │
//! │ • Snapshots to subscribers    │ │ • Cancellation            │
//! └───────────────────────────────┘ │ • Downsampling            │
//!                 │                 └───────────────────────────┘
//!                 ▼                               │
//! ┌───────────────────────────────┐               │
//! │           API                 │               │
//! │ • /v2/list pagination         │◀──────────────┘
//! │ • Retry + error classes       │   HttpTransport
//! └───────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`api`]: Photo list client and HTTP transport
//! - [`config`]: Configuration management
//! - [`feed`]: Paged photo feed state machine
//! - [`images`]: Thumbnail cache and downsampler
//! - [`models`]: Data models (`PhotoRecord`)
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use photofeed::api::{FetchClient, ReqwestTransport};
//! use photofeed::feed::{FeedConfig, PagedPhotoFeed};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let transport = Arc::new(ReqwestTransport::new(std::time::Duration::from_secs(30))?);
//! let client = FetchClient::new("https://picsum.photos", transport);
//! let feed = PagedPhotoFeed::new(Arc::new(client), FeedConfig::default());
//! feed.load_more().await;
//! println!("{} photos", feed.snapshot().visible_records.len());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::return_self_not_must_use)]

pub mod api;
pub mod config;
pub mod feed;
pub mod images;
pub mod models;
pub mod paths;

// Re-export main types for convenience
pub use api::{FetchClient, FetchError, PageSource, ReqwestTransport};
pub use config::Config;
pub use feed::{FeedSnapshot, LoadOutcome, PagedPhotoFeed};
pub use images::{ImageCache, ImageError};
pub use models::PhotoRecord;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
