//! Paginated, searchable photo feed.
//!
//! [`PagedPhotoFeed`] owns the page cursor, the fetched records and the
//! search filter. The presentation layer drives it (`load_more`, `set_query`,
//! `refresh`) and renders the [`FeedSnapshot`]s it publishes.

mod controller;
pub mod search;
mod state;

pub use controller::{FeedConfig, PagedPhotoFeed};
pub use search::sanitize_query;
pub use state::{FeedPhase, FeedSnapshot, FeedState, LoadOutcome};
