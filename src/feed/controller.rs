//! Paged, searchable photo feed.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::AbortHandle;
use tracing::{debug, info, trace, warn};

use crate::api::{FetchError, PageSource};
use crate::models::PhotoRecord;

use super::state::{FeedSnapshot, FeedState, LoadOutcome};

/// Snapshots buffered per subscriber before it starts lagging
const SNAPSHOT_BUFFER: usize = 64;

/// Feed tuning
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Records requested per page
    pub page_size: u32,
    /// Extra attempts for transport failures
    pub max_retries: u32,
    /// Quiet period before a search query is applied
    pub debounce: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            page_size: 100,
            max_retries: 2,
            debounce: Duration::from_millis(500),
        }
    }
}

struct FeedInner {
    state: FeedState,
    /// Bumped by every refresh; fetches from an older cycle are discarded
    cycle: u64,
    fetch: Option<AbortHandle>,
    /// Bumped by every query change; only the latest debounce timer applies
    query_seq: u64,
    debounce: Option<AbortHandle>,
}

struct FeedShared {
    source: Arc<dyn PageSource>,
    config: FeedConfig,
    inner: Mutex<FeedInner>,
    events: broadcast::Sender<FeedSnapshot>,
}

impl FeedShared {
    fn publish(&self, state: &FeedState) {
        // No subscribers is fine
        let _ = self.events.send(state.snapshot());
    }

    fn finish_load(&self, cycle: u64, result: Result<Vec<PhotoRecord>, FetchError>) -> LoadOutcome {
        let mut inner = self.inner.lock();
        if inner.cycle != cycle {
            debug!(cycle, current = inner.cycle, "Discarding page fetched before refresh");
            return LoadOutcome::Discarded;
        }

        inner.fetch = None;
        let page = inner.state.page;
        let outcome = inner.state.apply_page(result);
        match &outcome {
            LoadOutcome::Appended { count } => {
                debug!(page, count, total = inner.state.all_records.len(), "Appended page");
            }
            LoadOutcome::Exhausted => info!(page, "Reached the end of the feed"),
            LoadOutcome::Failed(err) => warn!(page, error = %err, "Page load failed"),
            LoadOutcome::Skipped | LoadOutcome::Discarded => {}
        }

        self.publish(&inner.state);
        outcome
    }
}

/// Paginated photo feed with live search.
///
/// All state lives behind one lock; page fetches and debounce timers run as
/// spawned tasks, so methods must be called within a Tokio runtime. Cloning
/// shares the same feed.
#[derive(Clone)]
pub struct PagedPhotoFeed {
    shared: Arc<FeedShared>,
}

impl PagedPhotoFeed {
    /// Create a feed reading pages from `source`
    pub fn new(source: Arc<dyn PageSource>, config: FeedConfig) -> Self {
        let (events, _) = broadcast::channel(SNAPSHOT_BUFFER);
        let inner = FeedInner {
            state: FeedState::new(config.page_size),
            cycle: 0,
            fetch: None,
            query_seq: 0,
            debounce: None,
        };

        Self {
            shared: Arc::new(FeedShared {
                source,
                config,
                inner: Mutex::new(inner),
                events,
            }),
        }
    }

    /// Fetch the next page.
    ///
    /// Does nothing while a load is running or after the feed is exhausted.
    /// The fetch keeps going if the returned future is dropped; only
    /// [`refresh`](Self::refresh) stops it.
    pub async fn load_more(&self) -> LoadOutcome {
        let (task, cycle) = {
            let mut inner = self.shared.inner.lock();
            if inner.state.is_loading() || !inner.state.has_more {
                trace!(
                    loading = inner.state.is_loading(),
                    has_more = inner.state.has_more,
                    "Skipping load_more"
                );
                return LoadOutcome::Skipped;
            }

            inner.state.begin_load();
            let page = inner.state.page;
            let cycle = inner.cycle;
            debug!(page, cycle, "Loading page");

            let shared = Arc::clone(&self.shared);
            let task = tokio::spawn(async move {
                let result = shared
                    .source
                    .fetch_page(page, shared.config.page_size, shared.config.max_retries)
                    .await;
                shared.finish_load(cycle, result)
            });
            inner.fetch = Some(task.abort_handle());

            self.shared.publish(&inner.state);
            (task, cycle)
        };

        match task.await {
            Ok(outcome) => outcome,
            Err(e) if e.is_cancelled() => LoadOutcome::Discarded,
            Err(e) => self
                .shared
                .finish_load(cycle, Err(FetchError::Unknown(format!("fetch task failed: {e}")))),
        }
    }

    /// Change the search text.
    ///
    /// Applied once no further call arrives for the debounce period; only the
    /// latest text is used.
    pub fn set_query(&self, text: &str) {
        let mut inner = self.shared.inner.lock();
        inner.query_seq += 1;
        let seq = inner.query_seq;
        if let Some(previous) = inner.debounce.take() {
            previous.abort();
        }

        let shared = Arc::clone(&self.shared);
        let text = text.to_string();
        let task = tokio::spawn(async move {
            tokio::time::sleep(shared.config.debounce).await;
            let mut inner = shared.inner.lock();
            if inner.query_seq != seq {
                return;
            }
            inner.debounce = None;
            debug!(query = %text, "Applying search query");
            inner.state.set_query(&text);
            shared.publish(&inner.state);
        });
        inner.debounce = Some(task.abort_handle());
    }

    /// Apply a search text right away, dropping any pending debounced one
    pub fn apply_query(&self, text: &str) {
        let mut inner = self.shared.inner.lock();
        inner.query_seq += 1;
        if let Some(pending) = inner.debounce.take() {
            pending.abort();
        }
        inner.state.set_query(text);
        self.shared.publish(&inner.state);
    }

    /// Stop any running page fetch and go back to an empty first page.
    ///
    /// Keeps the search text. Does not start a new load.
    pub fn refresh(&self) {
        let mut inner = self.shared.inner.lock();
        inner.cycle += 1;
        if let Some(fetch) = inner.fetch.take() {
            fetch.abort();
            debug!(cycle = inner.cycle, "Cancelled in-flight page fetch");
        }
        inner.state.reset();
        info!("Feed refreshed");
        self.shared.publish(&inner.state);
    }

    /// Current state
    pub fn snapshot(&self) -> FeedSnapshot {
        self.shared.inner.lock().state.snapshot()
    }

    /// Receive a snapshot after every state change, in order
    pub fn subscribe(&self) -> broadcast::Receiver<FeedSnapshot> {
        self.shared.events.subscribe()
    }

    /// Feed tuning
    pub fn config(&self) -> &FeedConfig {
        &self.shared.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::FeedPhase;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use tokio::sync::Semaphore;

    /// Serves scripted pages, optionally holding each response until the
    /// gate opens; an exhausted script yields empty pages
    struct FakePages {
        script: Mutex<VecDeque<Result<Vec<PhotoRecord>, FetchError>>>,
        calls: Mutex<Vec<(u32, u32, u32)>>,
        gate: Option<Arc<Semaphore>>,
    }

    impl FakePages {
        fn new(script: Vec<Result<Vec<PhotoRecord>, FetchError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                calls: Mutex::new(Vec::new()),
                gate: None,
            })
        }

        fn gated(script: Vec<Result<Vec<PhotoRecord>, FetchError>>, gate: &Arc<Semaphore>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                calls: Mutex::new(Vec::new()),
                gate: Some(Arc::clone(gate)),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.lock().len()
        }
    }

    #[async_trait]
    impl PageSource for FakePages {
        async fn fetch_page(
            &self,
            page: u32,
            limit: u32,
            max_retries: u32,
        ) -> Result<Vec<PhotoRecord>, FetchError> {
            self.calls.lock().push((page, limit, max_retries));
            let response = self.script.lock().pop_front().unwrap_or(Ok(Vec::new()));
            if let Some(gate) = &self.gate {
                let _permit = gate
                    .acquire()
                    .await
                    .map_err(|e| FetchError::Unknown(e.to_string()))?;
            }
            response
        }
    }

    fn records(ids: &[&str]) -> Vec<PhotoRecord> {
        ids.iter()
            .map(|id| PhotoRecord::new(id, "Alejandro Escamilla", 5000, 3333))
            .collect()
    }

    fn feed(source: &Arc<FakePages>, page_size: u32) -> PagedPhotoFeed {
        let config = FeedConfig {
            page_size,
            ..FeedConfig::default()
        };
        PagedPhotoFeed::new(source.clone(), config)
    }

    fn visible_ids(feed: &PagedPhotoFeed) -> Vec<String> {
        feed.snapshot()
            .visible_records
            .iter()
            .map(|r| r.id.clone())
            .collect()
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        for _ in 0..2000 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        panic!("condition not reached");
    }

    #[tokio::test]
    async fn test_pages_until_empty() {
        let source = FakePages::new(vec![
            Ok(records(&["0", "1"])),
            Ok(records(&["2", "3"])),
            Ok(Vec::new()),
        ]);
        let feed = feed(&source, 2);

        assert_eq!(feed.load_more().await, LoadOutcome::Appended { count: 2 });
        assert_eq!(feed.load_more().await, LoadOutcome::Appended { count: 2 });
        assert_eq!(feed.load_more().await, LoadOutcome::Exhausted);
        assert_eq!(feed.load_more().await, LoadOutcome::Skipped);

        let snapshot = feed.snapshot();
        assert!(!snapshot.has_more);
        assert_eq!(snapshot.page, 3);
        assert_eq!(snapshot.total_records, 4);
        assert_eq!(visible_ids(&feed), vec!["0", "1", "2", "3"]);
        assert_eq!(
            source.calls.lock().as_slice(),
            [(1, 2, 2), (2, 2, 2), (3, 2, 2)]
        );
    }

    #[tokio::test]
    async fn test_overlapping_load_is_noop() {
        let gate = Arc::new(Semaphore::new(0));
        let source = FakePages::gated(vec![Ok(records(&["0", "1"]))], &gate);
        let feed = feed(&source, 2);

        let first = {
            let feed = feed.clone();
            tokio::spawn(async move { feed.load_more().await })
        };
        wait_until(|| source.call_count() == 1).await;

        assert_eq!(feed.snapshot().phase, FeedPhase::LoadingInitial);
        assert_eq!(feed.load_more().await, LoadOutcome::Skipped);

        gate.add_permits(8);
        assert_eq!(first.await.unwrap(), LoadOutcome::Appended { count: 2 });
        assert_eq!(source.call_count(), 1);
        assert_eq!(feed.snapshot().page, 2);
    }

    #[tokio::test]
    async fn test_failure_is_retryable() {
        let source = FakePages::new(vec![
            Err(FetchError::Timeout),
            Ok(records(&["0"])),
        ]);
        let feed = feed(&source, 1);

        assert_eq!(
            feed.load_more().await,
            LoadOutcome::Failed(FetchError::Timeout)
        );
        let snapshot = feed.snapshot();
        assert_eq!(snapshot.phase, FeedPhase::Error);
        assert_eq!(snapshot.last_error, Some(FetchError::Timeout));
        assert_eq!(snapshot.page, 1);
        assert!(snapshot.has_more);

        assert_eq!(feed.load_more().await, LoadOutcome::Appended { count: 1 });
        let snapshot = feed.snapshot();
        assert_eq!(snapshot.phase, FeedPhase::Idle);
        assert_eq!(snapshot.last_error, None);
        assert_eq!(source.calls.lock()[1].0, 1);
    }

    #[tokio::test]
    async fn test_search_by_id_and_reset() {
        let source = FakePages::new(vec![Ok(records(&["0", "1"]))]);
        let feed = feed(&source, 2);
        feed.load_more().await;

        feed.apply_query("1");
        assert_eq!(visible_ids(&feed), vec!["1"]);

        feed.apply_query("");
        assert_eq!(visible_ids(&feed), vec!["0", "1"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_query_debounces() {
        let source = FakePages::new(vec![Ok(records(&["0", "1"]))]);
        let feed = feed(&source, 2);
        feed.load_more().await;
        let mut events = feed.subscribe();

        feed.set_query("A");
        feed.set_query("Ale");
        feed.set_query("1");

        tokio::time::sleep(Duration::from_millis(499)).await;
        assert_eq!(feed.snapshot().query, "");

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(feed.snapshot().query, "1");
        assert_eq!(visible_ids(&feed), vec!["1"]);

        let published = events.try_recv().unwrap();
        assert_eq!(published.query, "1");
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_refresh_cancels_inflight_load() {
        let gate = Arc::new(Semaphore::new(0));
        let source = FakePages::gated(
            vec![Ok(records(&["stale"])), Ok(records(&["fresh"]))],
            &gate,
        );
        let feed = feed(&source, 1);

        let pending = {
            let feed = feed.clone();
            tokio::spawn(async move { feed.load_more().await })
        };
        wait_until(|| source.call_count() == 1).await;

        feed.refresh();
        assert_eq!(pending.await.unwrap(), LoadOutcome::Discarded);

        gate.add_permits(8);
        tokio::time::sleep(Duration::from_millis(10)).await;
        let snapshot = feed.snapshot();
        assert_eq!(snapshot.total_records, 0);
        assert_eq!(snapshot.page, 1);
        assert_eq!(snapshot.phase, FeedPhase::Idle);

        assert_eq!(feed.load_more().await, LoadOutcome::Appended { count: 1 });
        assert_eq!(visible_ids(&feed), vec!["fresh"]);
    }

    #[tokio::test]
    async fn test_refresh_resets_exhausted_feed() {
        let source = FakePages::new(vec![Ok(records(&["0"])), Ok(Vec::new())]);
        let feed = feed(&source, 1);
        feed.load_more().await;
        feed.load_more().await;
        assert!(!feed.snapshot().has_more);

        feed.refresh();

        let snapshot = feed.snapshot();
        assert!(snapshot.has_more);
        assert_eq!(snapshot.page, 1);
        assert!(snapshot.visible_records.is_empty());
    }

    #[tokio::test]
    async fn test_snapshots_follow_transitions() {
        let source = FakePages::new(vec![Ok(records(&["0"]))]);
        let feed = feed(&source, 1);
        let mut events = feed.subscribe();

        feed.load_more().await;

        let loading = events.try_recv().unwrap();
        assert!(loading.is_loading_initial);
        let loaded = events.try_recv().unwrap();
        assert_eq!(loaded.phase, FeedPhase::Idle);
        assert_eq!(loaded.visible_records.len(), 1);
    }
}
