//! BookmarkStore, the incremental index controller.
//!
//! Owns the current snapshot, the debounce timer, persistence, and the
//! broadcast channel. Mutation notifications arm a single cancellable
//! window; a burst of mutations collapses into one sync, run after the
//! last notification plus the quiet period. Manual sync bypasses the
//! window but never overlaps an in-flight sync.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::database::{Database, DatabaseError};
use crate::flatten;
use crate::history::HistoryLog;
use crate::models::{IndexSnapshot, Settings};
use crate::ranking::{self, RankedRecord};
use crate::search::MatchStrategy;
use crate::source::{SourceError, TreeSource};

/// Quiet period after the last tree mutation before a sync runs.
pub const DEBOUNCE_DELAY: Duration = Duration::from_millis(500);

/// Broadcast channel capacity; slow subscribers lag rather than block.
const EVENT_CAPACITY: usize = 16;

/// Global fallback Tokio runtime for when store methods are called outside
/// any runtime context; host threads are not required to run Tokio.
static FALLBACK_RUNTIME: Lazy<tokio::runtime::Runtime> = Lazy::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to create fallback tokio runtime")
});

/// Current runtime if inside one, otherwise the shared fallback.
fn runtime_handle() -> tokio::runtime::Handle {
    tokio::runtime::Handle::try_current().unwrap_or_else(|_| FALLBACK_RUNTIME.handle().clone())
}

#[derive(Error, Debug)]
pub enum StoreError {
    /// A manual sync was requested while another sync is in flight.
    #[error("a sync is already in progress")]
    SyncInFlight,
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Published after every completed sync. Fire-and-forget: nobody listening
/// is not an error.
#[derive(Debug, Clone)]
pub struct SyncEvent {
    pub snapshot: Arc<IndexSnapshot>,
}

/// How [`BookmarkStore::search`] interprets a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    /// Fuzzy ranking with the given strategy.
    Fuzzy(MatchStrategy),
    /// `/pattern/flags` filtering. Queries not of that shape fall back to
    /// fuzzy ranking with the given strategy.
    Pattern(MatchStrategy),
}

struct Inner {
    db: Database,
    source: Arc<dyn TreeSource>,
    snapshot: RwLock<Arc<IndexSnapshot>>,
    history: Mutex<HistoryLog>,
    settings: RwLock<Settings>,
    /// Single-slot debounce window; re-arming cancels the previous token.
    pending: Mutex<Option<CancellationToken>>,
    /// Held for the duration of every sync; the "no two syncs run
    /// concurrently" invariant lives here.
    sync_gate: tokio::sync::Mutex<()>,
    events: broadcast::Sender<SyncEvent>,
    debounce: Duration,
}

/// Facade over the flattened bookmark index: syncing, searching, settings,
/// and history. One instance per process; constructed at startup with its
/// live-sync flag restored from persisted settings.
pub struct BookmarkStore {
    inner: Arc<Inner>,
}

impl BookmarkStore {
    /// Open a store at `path`, restoring settings, history, and the last
    /// snapshot from disk.
    pub fn open<P: AsRef<std::path::Path>>(
        path: P,
        source: Arc<dyn TreeSource>,
    ) -> Result<Self, StoreError> {
        Self::open_with_debounce(path, source, DEBOUNCE_DELAY)
    }

    /// [`BookmarkStore::open`] with a caller-chosen debounce window.
    pub fn open_with_debounce<P: AsRef<std::path::Path>>(
        path: P,
        source: Arc<dyn TreeSource>,
        debounce: Duration,
    ) -> Result<Self, StoreError> {
        Self::from_database(Database::open(path)?, source, debounce)
    }

    /// In-memory store (for testing).
    #[cfg(test)]
    fn new_in_memory(source: Arc<dyn TreeSource>, debounce: Duration) -> Result<Self, StoreError> {
        Self::from_database(Database::open_in_memory()?, source, debounce)
    }

    fn from_database(
        db: Database,
        source: Arc<dyn TreeSource>,
        debounce: Duration,
    ) -> Result<Self, StoreError> {
        let settings = db.load_settings()?;
        let history = db.load_history()?;
        let snapshot = db.load_snapshot()?.unwrap_or_else(IndexSnapshot::empty);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(Self {
            inner: Arc::new(Inner {
                db,
                source,
                snapshot: RwLock::new(Arc::new(snapshot)),
                history: Mutex::new(history),
                settings: RwLock::new(settings),
                pending: Mutex::new(None),
                sync_gate: tokio::sync::Mutex::new(()),
                events,
                debounce,
            }),
        })
    }

    // ── Snapshot & events ────────────────────────────────────────

    /// The current flattened snapshot.
    pub fn snapshot(&self) -> Arc<IndexSnapshot> {
        self.inner.snapshot.read().clone()
    }

    /// Subscribe to sync completions.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.inner.events.subscribe()
    }

    // ── Settings ─────────────────────────────────────────────────

    pub fn settings(&self) -> Settings {
        self.inner.settings.read().clone()
    }

    /// Toggle live sync. Takes effect on the next mutation notification;
    /// persists immediately.
    pub fn set_live_sync(&self, enabled: bool) -> Result<(), StoreError> {
        let updated = {
            let mut settings = self.inner.settings.write();
            settings.realtime = enabled;
            settings.clone()
        };
        self.inner.db.save_settings(&updated)?;
        Ok(())
    }

    /// Set the title weight (clamped to the slider range); persists
    /// immediately.
    pub fn set_title_weight(&self, weight: u8) -> Result<(), StoreError> {
        let updated = {
            let mut settings = self.inner.settings.write();
            settings.title_weight = ranking::clamp_title_weight(weight);
            settings.clone()
        };
        self.inner.db.save_settings(&updated)?;
        Ok(())
    }

    // ── Mutation handling (debounced) ────────────────────────────

    /// Host notification that the bookmark tree changed. Ignored while live
    /// sync is disabled; otherwise (re)arms the debounce window so N rapid
    /// mutations trigger exactly one sync, scheduled after the last one.
    pub fn handle_mutation(&self) {
        if !self.inner.settings.read().realtime {
            return;
        }
        let token = CancellationToken::new();
        {
            let mut pending = self.inner.pending.lock();
            if let Some(prev) = pending.replace(token.clone()) {
                prev.cancel();
            }
        }
        let inner = Arc::clone(&self.inner);
        runtime_handle().spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(inner.debounce) => {
                    // Serialize behind any in-flight manual sync rather
                    // than dropping the window
                    let _gate = inner.sync_gate.lock().await;
                    if let Err(err) = run_sync(&inner).await {
                        warn!("debounced sync failed: {err}");
                    }
                }
            }
        });
    }

    // ── Manual sync ──────────────────────────────────────────────

    /// Run a full sync immediately, bypassing the debounce window. Rejected
    /// with [`StoreError::SyncInFlight`] while another sync is running.
    pub async fn sync_now(&self) -> Result<Arc<IndexSnapshot>, StoreError> {
        let _gate = self
            .inner
            .sync_gate
            .try_lock()
            .map_err(|_| StoreError::SyncInFlight)?;
        run_sync(&self.inner).await
    }

    // ── Search facade ────────────────────────────────────────────

    /// Rank the current snapshot against `query`. Non-empty fuzzy queries
    /// are recorded into history.
    pub fn search(&self, query: &str, mode: SearchMode) -> Result<Vec<RankedRecord>, StoreError> {
        let query = query.trim();
        let snapshot = self.snapshot();
        let strategy = match mode {
            SearchMode::Fuzzy(strategy) => strategy,
            SearchMode::Pattern(strategy) => {
                if ranking::is_pattern_query(query) {
                    let hits = match ranking::parse_pattern_query(query) {
                        Some(pattern) => ranking::filter_pattern(snapshot.records(), &pattern),
                        // Malformed pattern: zero results, not an error
                        None => Vec::new(),
                    };
                    return Ok(hits.into_iter().map(RankedRecord::unscored).collect());
                }
                strategy
            }
        };

        let weight = self.inner.settings.read().title_weight;
        let results = ranking::rank(snapshot.records(), query, strategy, weight);
        if !query.is_empty() {
            self.record_query(query)?;
        }
        Ok(results)
    }

    // ── History ──────────────────────────────────────────────────

    /// Push a query into history (dedup, move-to-front, bounded) and
    /// persist the result.
    pub fn record_query(&self, query: &str) -> Result<(), StoreError> {
        let updated = {
            let mut history = self.inner.history.lock();
            history.push(query);
            history.clone()
        };
        self.inner.db.save_history(&updated)?;
        Ok(())
    }

    /// Past queries, most recent first.
    pub fn history(&self) -> Vec<String> {
        self.inner.history.lock().entries().to_vec()
    }

    pub fn clear_history(&self) -> Result<(), StoreError> {
        self.inner.history.lock().clear();
        self.inner.db.save_history(&HistoryLog::new())?;
        Ok(())
    }
}

impl Drop for BookmarkStore {
    fn drop(&mut self) {
        // A pending debounce window must not outlive its store
        if let Some(token) = self.inner.pending.lock().take() {
            token.cancel();
        }
    }
}

/// One full sync cycle: fetch → flatten → persist → swap → broadcast.
/// Callers must hold the sync gate.
async fn run_sync(inner: &Arc<Inner>) -> Result<Arc<IndexSnapshot>, StoreError> {
    #[cfg(feature = "perf-log")]
    let t0 = std::time::Instant::now();

    let tree = inner.source.fetch_tree().await?;
    let records = flatten::flatten(&tree);
    let snapshot = Arc::new(IndexSnapshot::new(records));
    inner.db.save_snapshot(&snapshot)?;
    *inner.snapshot.write() = Arc::clone(&snapshot);
    let _ = inner.events.send(SyncEvent {
        snapshot: Arc::clone(&snapshot),
    });
    debug!("synced {} records", snapshot.count());

    #[cfg(feature = "perf-log")]
    eprintln!(
        "[perf] sync={:.1}ms records={}",
        t0.elapsed().as_secs_f64() * 1000.0,
        snapshot.count(),
    );

    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BookmarkNode;
    use crate::source::StaticTreeSource;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Tree source that counts fetches and can simulate slow hosts.
    struct CountingSource {
        tree: RwLock<Vec<BookmarkNode>>,
        fetches: AtomicUsize,
        delay: Duration,
    }

    impl CountingSource {
        fn new(tree: Vec<BookmarkNode>) -> Self {
            Self::with_delay(tree, Duration::ZERO)
        }

        fn with_delay(tree: Vec<BookmarkNode>, delay: Duration) -> Self {
            Self {
                tree: RwLock::new(tree),
                fetches: AtomicUsize::new(0),
                delay,
            }
        }

        fn fetch_count(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TreeSource for CountingSource {
        async fn fetch_tree(&self) -> Result<Vec<BookmarkNode>, SourceError> {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(self.tree.read().clone())
        }
    }

    /// Tree source whose host is down.
    struct FailingSource;

    #[async_trait]
    impl TreeSource for FailingSource {
        async fn fetch_tree(&self) -> Result<Vec<BookmarkNode>, SourceError> {
            Err(SourceError::Unavailable("host gone".into()))
        }
    }

    fn sample_tree() -> Vec<BookmarkNode> {
        vec![
            BookmarkNode::folder(
                "f1",
                "Dev",
                vec![
                    BookmarkNode::leaf("a", "GitHub", "https://github.com"),
                    BookmarkNode::leaf("b", "Rust docs", "https://doc.rust-lang.org"),
                ],
            ),
            BookmarkNode::leaf("c", "News", "https://news.example.com"),
        ]
    }

    fn store_with(source: Arc<dyn TreeSource>) -> BookmarkStore {
        BookmarkStore::new_in_memory(source, Duration::from_millis(50)).unwrap()
    }

    // ── Sync ─────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_manual_sync_populates_snapshot() {
        let store = store_with(Arc::new(StaticTreeSource::new(sample_tree())));
        assert_eq!(store.snapshot().count(), 0);

        let snapshot = store.sync_now().await.unwrap();
        assert_eq!(snapshot.count(), 3);
        let ids: Vec<&str> = snapshot.records().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"], "flattener pre-order");
        assert_eq!(store.snapshot().records(), snapshot.records());
    }

    #[tokio::test]
    async fn test_sync_broadcasts_event() {
        let store = store_with(Arc::new(StaticTreeSource::new(sample_tree())));
        let mut events = store.subscribe();

        store.sync_now().await.unwrap();
        let event = events.try_recv().unwrap();
        assert_eq!(event.snapshot.count(), 3);
    }

    #[tokio::test]
    async fn test_sync_without_subscribers_is_fine() {
        let store = store_with(Arc::new(StaticTreeSource::new(sample_tree())));
        assert!(store.sync_now().await.is_ok());
    }

    #[tokio::test]
    async fn test_resync_of_unchanged_tree_is_idempotent() {
        let store = store_with(Arc::new(StaticTreeSource::new(sample_tree())));
        let first = store.sync_now().await.unwrap();
        let second = store.sync_now().await.unwrap();
        assert_eq!(first.records(), second.records());
    }

    #[tokio::test]
    async fn test_concurrent_manual_sync_rejected() {
        let source = Arc::new(CountingSource::with_delay(
            sample_tree(),
            Duration::from_millis(150),
        ));
        let store = Arc::new(store_with(source.clone()));

        let background = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.sync_now().await })
        };
        tokio::time::sleep(Duration::from_millis(30)).await;

        let err = store.sync_now().await.unwrap_err();
        assert!(matches!(err, StoreError::SyncInFlight));

        let snapshot = background.await.unwrap().unwrap();
        assert_eq!(snapshot.count(), 3);
        assert_eq!(source.fetch_count(), 1, "rejected sync never fetched");
    }

    #[tokio::test]
    async fn test_sync_failure_reported_to_caller() {
        let store = store_with(Arc::new(FailingSource));
        let err = store.sync_now().await.unwrap_err();
        assert!(matches!(err, StoreError::Source(_)));
        assert_eq!(store.snapshot().count(), 0, "snapshot untouched on failure");
    }

    // ── Debounce ─────────────────────────────────────────────────

    #[tokio::test]
    async fn test_mutations_collapse_into_one_sync() {
        let source = Arc::new(CountingSource::new(sample_tree()));
        let store = store_with(source.clone());
        store.set_live_sync(true).unwrap();

        for _ in 0..5 {
            store.handle_mutation();
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        tokio::time::sleep(Duration::from_millis(400)).await;

        assert_eq!(source.fetch_count(), 1, "burst collapsed into one sync");
        assert_eq!(store.snapshot().count(), 3);
    }

    #[tokio::test]
    async fn test_mutation_ignored_when_live_sync_disabled() {
        let source = Arc::new(CountingSource::new(sample_tree()));
        let store = store_with(source.clone());

        store.handle_mutation();
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(source.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_separate_bursts_sync_separately() {
        let source = Arc::new(CountingSource::new(sample_tree()));
        let store = store_with(source.clone());
        store.set_live_sync(true).unwrap();

        store.handle_mutation();
        tokio::time::sleep(Duration::from_millis(250)).await;
        store.handle_mutation();
        tokio::time::sleep(Duration::from_millis(250)).await;

        assert_eq!(source.fetch_count(), 2);
    }

    // ── Settings ─────────────────────────────────────────────────

    #[tokio::test]
    async fn test_settings_update_and_clamp() {
        let store = store_with(Arc::new(StaticTreeSource::default()));
        assert!(!store.settings().realtime);

        store.set_live_sync(true).unwrap();
        assert!(store.settings().realtime);

        store.set_title_weight(99).unwrap();
        assert_eq!(store.settings().title_weight, 5);
    }

    // ── Search facade ────────────────────────────────────────────

    #[tokio::test]
    async fn test_search_ranks_and_records_history() {
        let store = store_with(Arc::new(StaticTreeSource::new(sample_tree())));
        store.sync_now().await.unwrap();

        let results = store
            .search("github", SearchMode::Fuzzy(MatchStrategy::Subsequence))
            .unwrap();
        assert!(!results.is_empty());
        assert_eq!(results[0].record.title, "GitHub");
        assert_eq!(store.history(), vec!["github".to_string()]);
    }

    #[tokio::test]
    async fn test_search_empty_query_passes_all_through() {
        let store = store_with(Arc::new(StaticTreeSource::new(sample_tree())));
        store.sync_now().await.unwrap();

        let results = store
            .search("", SearchMode::Fuzzy(MatchStrategy::TokenAware))
            .unwrap();
        assert_eq!(results.len(), 3);
        let ids: Vec<&str> = results.iter().map(|r| r.record.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"], "snapshot order preserved");
        assert!(store.history().is_empty(), "empty query not recorded");
    }

    #[tokio::test]
    async fn test_search_pattern_mode() {
        let store = store_with(Arc::new(StaticTreeSource::new(sample_tree())));
        store.sync_now().await.unwrap();

        let hits = store
            .search("/^GitHub$/", SearchMode::Pattern(MatchStrategy::Subsequence))
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].record.id, "a");

        // Malformed pattern: zero results, no error
        let none = store
            .search("/[/", SearchMode::Pattern(MatchStrategy::Subsequence))
            .unwrap();
        assert!(none.is_empty());

        // Not /pattern/flags shaped: falls back to fuzzy
        let fuzzy = store
            .search("rust docs", SearchMode::Pattern(MatchStrategy::TokenAware))
            .unwrap();
        assert!(!fuzzy.is_empty());
        assert_eq!(fuzzy[0].record.id, "b");

        assert!(
            !store.history().iter().any(|q| q.starts_with('/')),
            "pattern queries stay out of history"
        );
    }

    #[tokio::test]
    async fn test_history_clear() {
        let store = store_with(Arc::new(StaticTreeSource::new(sample_tree())));
        store.record_query("a").unwrap();
        store.record_query("b").unwrap();
        assert_eq!(store.history(), vec!["b".to_string(), "a".to_string()]);

        store.clear_history().unwrap();
        assert!(store.history().is_empty());
    }
}
