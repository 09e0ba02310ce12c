//! Feed state

use std::sync::Arc;

use crate::api::FetchError;
use crate::models::PhotoRecord;

use super::search;

/// Where the feed is in its load cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeedPhase {
    /// Nothing loading
    #[default]
    Idle,
    /// Loading the first page
    LoadingInitial,
    /// Loading a later page
    LoadingMore,
    /// Last load failed; `load_more` retries it
    Error,
}

/// Result of a `load_more` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// A load was already running, or the feed is exhausted
    Skipped,
    /// `count` records were appended
    Appended {
        /// Number of new records
        count: usize,
    },
    /// The server returned an empty page; the feed is exhausted
    Exhausted,
    /// The fetch failed
    Failed(FetchError),
    /// The feed was refreshed while the fetch was running
    Discarded,
}

/// Mutable state owned by a `PagedPhotoFeed`
#[derive(Debug, Clone)]
pub struct FeedState {
    /// Next page to fetch (1-based)
    pub page: u32,
    /// Records per page
    pub page_size: u32,
    /// Whether more pages may exist
    pub has_more: bool,
    /// Every fetched record, in fetch order
    pub all_records: Vec<PhotoRecord>,
    /// Active search text
    pub query: String,
    /// Records matching `query`
    pub visible_records: Vec<PhotoRecord>,
    /// Loading the first page
    pub is_loading_initial: bool,
    /// Loading a later page
    pub is_loading_more: bool,
    /// Error of the last failed load
    pub last_error: Option<FetchError>,
}

impl FeedState {
    /// Fresh state for a feed of `page_size` records per page
    pub fn new(page_size: u32) -> Self {
        Self {
            page: 1,
            page_size,
            has_more: true,
            all_records: Vec::new(),
            query: String::new(),
            visible_records: Vec::new(),
            is_loading_initial: false,
            is_loading_more: false,
            last_error: None,
        }
    }

    /// Whether a page fetch is running
    pub const fn is_loading(&self) -> bool {
        self.is_loading_initial || self.is_loading_more
    }

    /// Current phase
    pub const fn phase(&self) -> FeedPhase {
        if self.is_loading_initial {
            FeedPhase::LoadingInitial
        } else if self.is_loading_more {
            FeedPhase::LoadingMore
        } else if self.last_error.is_some() {
            FeedPhase::Error
        } else {
            FeedPhase::Idle
        }
    }

    /// Mark a fetch of the current page as started
    pub fn begin_load(&mut self) {
        if self.page == 1 {
            self.is_loading_initial = true;
        } else {
            self.is_loading_more = true;
        }
    }

    fn end_load(&mut self) {
        self.is_loading_initial = false;
        self.is_loading_more = false;
    }

    /// Apply a finished fetch of the current page
    pub fn apply_page(&mut self, result: Result<Vec<PhotoRecord>, FetchError>) -> LoadOutcome {
        self.end_load();

        match result {
            Ok(records) if records.is_empty() => {
                self.has_more = false;
                self.last_error = None;
                LoadOutcome::Exhausted
            }
            Ok(records) => {
                let count = records.len();
                self.all_records.extend(records);
                self.page += 1;
                self.last_error = None;
                self.recompute_visible();
                LoadOutcome::Appended { count }
            }
            Err(err) => {
                self.last_error = Some(err.clone());
                LoadOutcome::Failed(err)
            }
        }
    }

    /// Replace the query and recompute the visible records
    pub fn set_query(&mut self, query: &str) {
        query.clone_into(&mut self.query);
        self.recompute_visible();
    }

    fn recompute_visible(&mut self) {
        self.visible_records = search::filter_records(&self.all_records, &self.query);
    }

    /// Back to the first page with no records, keeping the query
    pub fn reset(&mut self) {
        self.page = 1;
        self.has_more = true;
        self.all_records.clear();
        self.visible_records.clear();
        self.last_error = None;
        self.end_load();
    }

    /// Immutable copy for rendering
    pub fn snapshot(&self) -> FeedSnapshot {
        FeedSnapshot {
            phase: self.phase(),
            page: self.page,
            has_more: self.has_more,
            query: self.query.clone(),
            total_records: self.all_records.len(),
            visible_records: Arc::new(self.visible_records.clone()),
            is_loading_initial: self.is_loading_initial,
            is_loading_more: self.is_loading_more,
            last_error: self.last_error.clone(),
        }
    }
}

/// Read-only view of the feed handed to the presentation layer
#[derive(Debug, Clone, PartialEq)]
pub struct FeedSnapshot {
    /// Current phase
    pub phase: FeedPhase,
    /// Next page to fetch
    pub page: u32,
    /// Whether more pages may exist
    pub has_more: bool,
    /// Active search text
    pub query: String,
    /// Number of fetched records
    pub total_records: usize,
    /// Records to render
    pub visible_records: Arc<Vec<PhotoRecord>>,
    /// Loading the first page
    pub is_loading_initial: bool,
    /// Loading a later page
    pub is_loading_more: bool,
    /// Error of the last failed load
    pub last_error: Option<FetchError>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(ids: &[&str]) -> Vec<PhotoRecord> {
        ids.iter()
            .map(|id| PhotoRecord::new(id, "Alejandro Escamilla", 5000, 3333))
            .collect()
    }

    #[test]
    fn test_initial_state() {
        let state = FeedState::new(10);
        assert_eq!(state.page, 1);
        assert!(state.has_more);
        assert_eq!(state.phase(), FeedPhase::Idle);
    }

    #[test]
    fn test_begin_load_picks_flag_by_page() {
        let mut state = FeedState::new(2);
        state.begin_load();
        assert_eq!(state.phase(), FeedPhase::LoadingInitial);

        state.apply_page(Ok(page(&["0", "1"])));
        state.begin_load();
        assert_eq!(state.phase(), FeedPhase::LoadingMore);
    }

    #[test]
    fn test_failure_keeps_cursor() {
        let mut state = FeedState::new(2);
        state.begin_load();
        let outcome = state.apply_page(Err(FetchError::Timeout));

        assert_eq!(outcome, LoadOutcome::Failed(FetchError::Timeout));
        assert_eq!(state.page, 1);
        assert!(state.has_more);
        assert_eq!(state.phase(), FeedPhase::Error);
    }

    #[test]
    fn test_query_filters_appended_pages() {
        let mut state = FeedState::new(2);
        state.set_query("1");
        state.apply_page(Ok(page(&["0", "1"])));
        state.apply_page(Ok(page(&["10", "2"])));

        let ids: Vec<&str> = state.visible_records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "10"]);
        assert_eq!(state.page, 3);
    }

    #[test]
    fn test_reset_keeps_query() {
        let mut state = FeedState::new(2);
        state.apply_page(Ok(page(&["0", "1"])));
        state.set_query("1");
        state.apply_page(Ok(Vec::new()));
        state.reset();

        assert_eq!(state.page, 1);
        assert!(state.has_more);
        assert!(state.all_records.is_empty());
        assert!(state.visible_records.is_empty());
        assert_eq!(state.query, "1");
    }
}
