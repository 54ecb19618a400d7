//! Async ingestion orchestrator.
//!
//! This module is available with the `async` feature.
//!
//! A [`Loader`] runs one load per [`LoadRequest`]: per-book fetches run
//! concurrently (bounded by a semaphore, each under a timeout), results are
//! merged single-threaded once every fetch has settled, and the fallback
//! document fills gaps. The outcome is published as a whole-value swap of
//! [`LoadState`] on a watch channel.
//!
//! A newer request supersedes older ones: outstanding fetches of the older
//! load are aborted and its result is never published.
//!
//! ```rust,no_run
//! use osis_bible::canon::Language;
//! use osis_bible::ingest::LoadRequest;
//! use osis_bible::loader::Loader;
//! use osis_bible::source::DirectorySource;
//!
//! # async fn example() -> Result<(), osis_bible::OsisError> {
//! let loader = Loader::new(DirectorySource::new("assets/bibles"));
//! let loaded = loader.load(LoadRequest::new("kjv", Language::English)).await?;
//! let hits = loaded.document.search_verses("beginning", None);
//! # Ok(())
//! # }
//! ```

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;

use crate::document::BibleDocument;
use crate::error::OsisError;
use crate::ingest::{finish, LoadRequest, LoadedBible, PassOutcome};
use crate::model::Book;
use crate::osis::{parse_book_xml, parse_osis_document};
use crate::source::BookSource;

/// Default per-fetch timeout
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Default number of per-book fetches in flight
pub const DEFAULT_MAX_CONCURRENT_FETCHES: usize = 8;

/// Loader configuration
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoadOptions {
    /// Timeout applied to each fetch; expiry is an ordinary per-book failure.
    ///
    /// When `None`, fetches may take arbitrarily long.
    pub fetch_timeout: Option<Duration>,
    /// Upper bound on concurrent per-book fetches (at least 1 is used)
    pub max_concurrent_fetches: usize,
    /// Yield to the scheduler after each book is parsed
    pub cooperative_yield: bool,
    /// Consult the monolithic fallback document for missing books
    pub use_fallback: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            fetch_timeout: Some(DEFAULT_FETCH_TIMEOUT),
            max_concurrent_fetches: DEFAULT_MAX_CONCURRENT_FETCHES,
            cooperative_yield: true,
            use_fallback: true,
        }
    }
}

/// Builder for a configured [`Loader`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct LoaderBuilder {
    options: LoadOptions,
}

impl LoaderBuilder {
    /// Create a builder with default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-fetch timeout
    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.options.fetch_timeout = Some(timeout);
        self
    }

    /// Disable the per-fetch timeout
    pub fn no_fetch_timeout(mut self) -> Self {
        self.options.fetch_timeout = None;
        self
    }

    /// Bound the number of concurrent per-book fetches
    pub fn max_concurrent_fetches(mut self, limit: usize) -> Self {
        self.options.max_concurrent_fetches = limit;
        self
    }

    /// Enable or disable the per-book cooperative yield
    pub fn cooperative_yield(mut self, enabled: bool) -> Self {
        self.options.cooperative_yield = enabled;
        self
    }

    /// Enable or disable the fallback document
    pub fn use_fallback(mut self, enabled: bool) -> Self {
        self.options.use_fallback = enabled;
        self
    }

    /// Build a loader over a source
    pub fn build<S: BookSource>(self, source: S) -> Loader<S> {
        Loader::with_options(source, self.options)
    }
}

/// Lifecycle of the loader: `Idle -> Loading -> {Loaded, Failed}`
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoadState {
    /// No load requested yet
    Idle,
    /// A load is in flight
    Loading {
        /// Generation of the in-flight request
        generation: u64,
        /// The in-flight request
        request: LoadRequest,
        /// Last successful load, still readable until replaced
        previous: Option<LoadedBible>,
    },
    /// The latest request completed with at least one book
    Loaded(LoadedBible),
    /// The latest request produced no books
    Failed {
        /// The failed request
        request: LoadRequest,
        /// Why it failed
        error: OsisError,
    },
}

impl LoadState {
    /// The last successful load visible in this state
    fn last_loaded(&self) -> Option<LoadedBible> {
        match self {
            LoadState::Loaded(loaded) => Some(loaded.clone()),
            LoadState::Loading { previous, .. } => previous.clone(),
            LoadState::Idle | LoadState::Failed { .. } => None,
        }
    }

    /// The readable document in this state, if any
    pub fn document(&self) -> Option<Arc<BibleDocument>> {
        match self {
            LoadState::Loaded(loaded) => Some(Arc::clone(&loaded.document)),
            LoadState::Loading { previous, .. } => {
                previous.as_ref().map(|loaded| Arc::clone(&loaded.document))
            }
            LoadState::Idle | LoadState::Failed { .. } => None,
        }
    }
}

/// Async orchestrator owning the published [`BibleDocument`]
pub struct Loader<S: BookSource> {
    source: Arc<S>,
    options: LoadOptions,
    state: watch::Sender<LoadState>,
    generation: watch::Sender<u64>,
}

impl<S: BookSource> Loader<S> {
    /// Create a loader with default options
    pub fn new(source: S) -> Self {
        Self::with_options(source, LoadOptions::default())
    }

    /// Create a loader with explicit options
    pub fn with_options(source: S, options: LoadOptions) -> Self {
        let (state, _) = watch::channel(LoadState::Idle);
        let (generation, _) = watch::channel(0);
        Self {
            source: Arc::new(source),
            options,
            state,
            generation,
        }
    }

    /// Active options
    pub fn options(&self) -> &LoadOptions {
        &self.options
    }

    /// Snapshot of the current state
    pub fn state(&self) -> LoadState {
        self.state.borrow().clone()
    }

    /// Observe state changes
    pub fn subscribe(&self) -> watch::Receiver<LoadState> {
        self.state.subscribe()
    }

    /// The currently readable document, if any
    pub fn document(&self) -> Option<Arc<BibleDocument>> {
        self.state.borrow().document()
    }

    /// Load a version, superseding any load in flight.
    ///
    /// Per-book failures are logged and reported in
    /// [`LoadReport`](crate::ingest::LoadReport); the call fails only with
    /// [`OsisError::NoBooksLoaded`], or [`OsisError::Superseded`] when a newer
    /// request replaced this one.
    ///
    /// Dropping the returned future before it completes puts the state back
    /// to the last successful load (or `Idle`), unless a newer request has
    /// started meanwhile.
    pub async fn load(&self, request: LoadRequest) -> Result<LoadedBible, OsisError> {
        let mut generation = 0;
        let mut previous = None;
        self.state.send_modify(|state| {
            self.generation.send_modify(|g| {
                *g += 1;
                generation = *g;
            });
            previous = state.last_loaded();
            *state = LoadState::Loading {
                generation,
                request: request.clone(),
                previous: previous.clone(),
            };
        });
        let mut pending = PendingLoad {
            state: &self.state,
            generation_tx: &self.generation,
            generation,
            restore: Some(previous),
        };
        log::info!(
            "Loading '{}' ({} books expected, request {})",
            request.version,
            request.order.len(),
            generation
        );

        let mut superseded = self.generation.subscribe();
        let result = self.run(&request, generation, &mut superseded).await;
        pending.disarm();

        if matches!(result, Err(OsisError::Superseded { .. })) {
            log::debug!("Discarded superseded load {} of '{}'", generation, request.version);
            return result;
        }
        let next = match &result {
            Ok(loaded) => LoadState::Loaded(loaded.clone()),
            Err(err) => LoadState::Failed {
                request: request.clone(),
                error: err.clone(),
            },
        };

        if publish(&self.state, &self.generation, generation, next) {
            result
        } else {
            log::debug!("Discarded superseded load {} of '{}'", generation, request.version);
            Err(OsisError::Superseded { generation })
        }
    }

    async fn run(
        &self,
        request: &LoadRequest,
        generation: u64,
        superseded: &mut watch::Receiver<u64>,
    ) -> Result<LoadedBible, OsisError> {
        let options = request.parse_options();
        let permits = Arc::new(Semaphore::new(self.options.max_concurrent_fetches.max(1)));
        let fetch_timeout = self.options.fetch_timeout;
        let cooperative_yield = self.options.cooperative_yield;

        // Dropping the set aborts outstanding fetches
        let mut tasks = JoinSet::new();
        for (idx, book_id) in request.order.iter().enumerate() {
            let source = Arc::clone(&self.source);
            let permits = Arc::clone(&permits);
            let version = request.version.clone();
            let book_id = book_id.clone();
            tasks.spawn(async move {
                let result = {
                    let _permit = permits.acquire().await.ok();
                    let fetch = source.fetch_book(&version, &book_id);
                    fetch_with_timeout(&book_id, fetch_timeout, fetch)
                        .await
                        .and_then(|xml| parse_book_xml(&xml, &options))
                };
                if cooperative_yield {
                    tokio::task::yield_now().await;
                }
                (idx, book_id, result)
            });
        }

        let mut settled: Vec<(usize, String, Result<Book, OsisError>)> =
            Vec::with_capacity(request.order.len());
        loop {
            tokio::select! {
                joined = tasks.join_next() => match joined {
                    Some(Ok(item)) => settled.push(item),
                    Some(Err(err)) => log::debug!("Book task ended abnormally: {}", err),
                    None => break,
                },
                _ = wait_superseded(superseded, generation) => {
                    return Err(OsisError::Superseded { generation });
                }
            }
        }

        // Slots whose task panicked still count as one failure each
        if settled.len() < request.order.len() {
            let done: HashSet<usize> = settled.iter().map(|(idx, _, _)| *idx).collect();
            for (idx, book_id) in request.order.iter().enumerate() {
                if !done.contains(&idx) {
                    let err =
                        OsisError::Io(format!("fetch task for '{}' did not complete", book_id));
                    settled.push((idx, book_id.clone(), Err(err)));
                }
            }
        }

        settled.sort_by_key(|(idx, _, _)| *idx);
        let pass = PassOutcome::collect(
            &request.order,
            settled.into_iter().map(|(_, id, result)| (id, result)),
        );

        let fallback = if self.options.use_fallback && pass.needs_fallback(&request.order) {
            log::debug!(
                "Consulting fallback document for '{}' ({} missing)",
                request.version,
                pass.missing(&request.order).len()
            );
            let fetch = fetch_with_timeout(
                "fallback",
                fetch_timeout,
                self.source.fetch_fallback(&request.version),
            );
            let xml = tokio::select! {
                xml = fetch => xml,
                _ = wait_superseded(superseded, generation) => {
                    return Err(OsisError::Superseded { generation });
                }
            };
            let parsed = match xml {
                Ok(xml) => {
                    // Whole-Bible documents are large; parse off the runtime threads
                    let parse = tokio::task::spawn_blocking(move || {
                        parse_osis_document(&xml, &options)
                    });
                    tokio::select! {
                        joined = parse => joined.unwrap_or_else(|err| {
                            let msg = format!("fallback parse did not complete: {}", err);
                            Err(OsisError::Io(msg))
                        }),
                        _ = wait_superseded(superseded, generation) => {
                            return Err(OsisError::Superseded { generation });
                        }
                    }
                }
                Err(err) => Err(err),
            };
            Some(parsed)
        } else {
            None
        };

        finish(request, pass, fallback)
    }
}

/// Swap in a terminal state unless a newer request has started
fn publish(
    state: &watch::Sender<LoadState>,
    generation_tx: &watch::Sender<u64>,
    generation: u64,
    next: LoadState,
) -> bool {
    state.send_if_modified(|state| {
        if *generation_tx.borrow() != generation {
            return false;
        }
        *state = next;
        true
    })
}

/// Restores the pre-load state if a load is dropped before it settles
struct PendingLoad<'a> {
    state: &'a watch::Sender<LoadState>,
    generation_tx: &'a watch::Sender<u64>,
    generation: u64,
    restore: Option<Option<LoadedBible>>,
}

impl PendingLoad<'_> {
    fn disarm(&mut self) {
        self.restore = None;
    }
}

impl Drop for PendingLoad<'_> {
    fn drop(&mut self) {
        let Some(previous) = self.restore.take() else {
            return;
        };
        let next = match previous {
            Some(loaded) => LoadState::Loaded(loaded),
            None => LoadState::Idle,
        };
        if publish(self.state, self.generation_tx, self.generation, next) {
            log::debug!("Load {} abandoned; previous state restored", self.generation);
        }
    }
}

/// Resolve once the generation moves past `generation`
async fn wait_superseded(rx: &mut watch::Receiver<u64>, generation: u64) {
    loop {
        if *rx.borrow_and_update() != generation {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

async fn fetch_with_timeout<F>(
    resource: &str,
    limit: Option<Duration>,
    fetch: F,
) -> Result<String, OsisError>
where
    F: Future<Output = Result<String, OsisError>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, fetch)
            .await
            .unwrap_or_else(|_| {
                Err(OsisError::Timeout {
                    resource: resource.to_string(),
                    millis: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                })
            }),
        None => fetch.await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canon::Language;
    use crate::source::MemorySource;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn book_xml(id: &str, text: &str) -> String {
        format!(
            r#"<div type="book" osisID="{id}"><chapter osisID="{id}.1"><verse osisID="{id}.1.1">{text}</verse></chapter></div>"#
        )
    }

    fn request(version: &str, ids: &[&str]) -> LoadRequest {
        LoadRequest::new(version, Language::English).with_order(ids.iter().copied())
    }

    /// Never answers for version "slow"; serves Gen for every other version.
    struct StallingSource;

    impl BookSource for StallingSource {
        async fn fetch_book(&self, version: &str, book_id: &str) -> Result<String, OsisError> {
            if version == "slow" {
                std::future::pending::<()>().await;
            }
            Ok(book_xml(book_id, version))
        }

        async fn fetch_fallback(&self, version: &str) -> Result<String, OsisError> {
            Err(OsisError::NotFound {
                resource: version.to_string(),
            })
        }
    }

    struct DropCounter(Arc<AtomicUsize>);

    impl Drop for DropCounter {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Stalls every fetch of version "slow", counting fetches started and dropped.
    #[derive(Default)]
    struct CountingSource {
        started: Arc<AtomicUsize>,
        dropped: Arc<AtomicUsize>,
    }

    impl BookSource for CountingSource {
        async fn fetch_book(&self, version: &str, book_id: &str) -> Result<String, OsisError> {
            if version == "slow" {
                let _counter = DropCounter(Arc::clone(&self.dropped));
                self.started.fetch_add(1, Ordering::SeqCst);
                std::future::pending::<()>().await;
            }
            Ok(book_xml(book_id, version))
        }

        async fn fetch_fallback(&self, version: &str) -> Result<String, OsisError> {
            Err(OsisError::NotFound {
                resource: version.to_string(),
            })
        }
    }

    /// Answers Obad only after a long delay.
    struct SlowObadSource;

    impl BookSource for SlowObadSource {
        async fn fetch_book(&self, _version: &str, book_id: &str) -> Result<String, OsisError> {
            if book_id == "Obad" {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
            Ok(book_xml(book_id, "per-book"))
        }

        async fn fetch_fallback(&self, _version: &str) -> Result<String, OsisError> {
            Ok(format!(
                "<osis><osisText>{}</osisText></osis>",
                book_xml("Obad", "fallback")
            ))
        }
    }

    #[test]
    fn test_builder_options() {
        let options = LoaderBuilder::new()
            .no_fetch_timeout()
            .max_concurrent_fetches(2)
            .cooperative_yield(false)
            .use_fallback(false)
            .options;
        assert_eq!(options.fetch_timeout, None);
        assert_eq!(options.max_concurrent_fetches, 2);
        assert!(!options.cooperative_yield);
        assert!(!options.use_fallback);
        assert_eq!(LoadOptions::default().fetch_timeout, Some(DEFAULT_FETCH_TIMEOUT));
    }

    #[tokio::test]
    async fn test_state_moves_to_loaded() {
        let source = MemorySource::new()
            .with_book("kjv", "Gen", book_xml("Gen", "a"))
            .with_book("kjv", "Exod", book_xml("Exod", "b"));
        let loader = Loader::new(source);
        assert_eq!(loader.state(), LoadState::Idle);
        assert!(loader.document().is_none());

        let mut rx = loader.subscribe();
        let loaded = loader.load(request("kjv", &["Gen", "Exod"])).await.unwrap();
        assert_eq!(loaded.document.stats().total_books, 2);

        assert!(rx.has_changed().unwrap());
        assert!(matches!(&*rx.borrow_and_update(), LoadState::Loaded(_)));
        assert_eq!(loader.document().map(|d| d.stats().total_books), Some(2));
    }

    #[tokio::test]
    async fn test_state_moves_to_failed() {
        let loader = Loader::new(MemorySource::new());
        let err = loader.load(request("kjv", &["Gen"])).await.unwrap_err();
        assert!(matches!(err, OsisError::NoBooksLoaded { .. }));
        match loader.state() {
            LoadState::Failed { request, error } => {
                assert_eq!(request.version, "kjv");
                assert_eq!(error, err);
            }
            other => panic!("unexpected state: {:?}", other),
        }
        assert!(loader.document().is_none());
    }

    #[tokio::test]
    async fn test_fallback_disabled() {
        let source = MemorySource::new()
            .with_book("kjv", "Gen", book_xml("Gen", "a"))
            .with_fallback(
                "kjv",
                format!("<osis><osisText>{}</osisText></osis>", book_xml("Exod", "b")),
            );
        let loader = LoaderBuilder::new().use_fallback(false).build(source);
        let loaded = loader.load(request("kjv", &["Gen", "Exod"])).await.unwrap();
        assert_eq!(loaded.document.stats().total_books, 1);
        assert!(loaded.report.filled_from_fallback.is_empty());
    }

    #[tokio::test]
    async fn test_timeout_is_a_per_book_failure() {
        let loader = LoaderBuilder::new()
            .fetch_timeout(Duration::from_millis(50))
            .build(SlowObadSource);
        let loaded = loader.load(request("kjv", &["Jonah", "Obad"])).await.unwrap();

        assert_eq!(loaded.report.failures.len(), 1);
        assert!(matches!(
            loaded.report.failures[0],
            (ref id, OsisError::Timeout { .. }) if id == "Obad"
        ));
        let ids: Vec<&str> = loaded.document.books().iter().map(Book::id).collect();
        assert_eq!(ids, vec!["Jonah", "Obad"]);
        assert_eq!(
            loaded.document.get_verse("Obad", 1, 1).map(|v| v.text.as_str()),
            Some("fallback")
        );
    }

    #[tokio::test]
    async fn test_newer_request_wins() {
        let loader = Arc::new(Loader::new(StallingSource));
        let mut rx = loader.subscribe();

        let slow = {
            let loader = Arc::clone(&loader);
            tokio::spawn(async move { loader.load(request("slow", &["Gen"])).await })
        };
        rx.wait_for(|state| matches!(state, LoadState::Loading { .. }))
            .await
            .unwrap();

        let fast = loader.load(request("fast", &["Gen"])).await.unwrap();
        assert_eq!(fast.document.version(), "fast");

        let slow_result = slow.await.unwrap();
        assert!(matches!(slow_result, Err(OsisError::Superseded { generation: 1 })));
        assert_eq!(loader.document().map(|d| d.version().to_string()), Some("fast".into()));
    }

    #[tokio::test]
    async fn test_previous_document_readable_while_loading() {
        let loader = Arc::new(Loader::new(StallingSource));
        loader.load(request("first", &["Gen"])).await.unwrap();

        let mut rx = loader.subscribe();
        let pending = {
            let loader = Arc::clone(&loader);
            tokio::spawn(async move { loader.load(request("slow", &["Gen"])).await })
        };
        rx.wait_for(|state| matches!(state, LoadState::Loading { .. }))
            .await
            .unwrap();

        assert_eq!(loader.document().map(|d| d.version().to_string()), Some("first".into()));
        pending.abort();
    }

    #[tokio::test]
    async fn test_superseded_load_aborts_outstanding_fetches() {
        let source = CountingSource::default();
        let started = Arc::clone(&source.started);
        let dropped = Arc::clone(&source.dropped);
        let loader = Arc::new(Loader::new(source));

        let slow = {
            let loader = Arc::clone(&loader);
            let slow = request("slow", &["Gen", "Exod", "Lev"]);
            tokio::spawn(async move { loader.load(slow).await })
        };
        while started.load(Ordering::SeqCst) < 3 {
            tokio::task::yield_now().await;
        }
        assert_eq!(dropped.load(Ordering::SeqCst), 0);

        loader.load(request("fast", &["Gen"])).await.unwrap();
        assert!(matches!(slow.await.unwrap(), Err(OsisError::Superseded { .. })));

        for _ in 0..100 {
            if dropped.load(Ordering::SeqCst) == 3 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(dropped.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_aborted_load_restores_previous_document() {
        let loader = Arc::new(Loader::new(StallingSource));
        let first = loader.load(request("first", &["Gen"])).await.unwrap();

        let mut rx = loader.subscribe();
        let pending = {
            let loader = Arc::clone(&loader);
            tokio::spawn(async move { loader.load(request("slow", &["Gen"])).await })
        };
        rx.wait_for(|state| matches!(state, LoadState::Loading { .. }))
            .await
            .unwrap();

        pending.abort();
        assert!(pending.await.unwrap_err().is_cancelled());
        assert_eq!(loader.state(), LoadState::Loaded(first));
    }

    #[tokio::test]
    async fn test_dropped_first_load_returns_to_idle() {
        let loader = Loader::new(StallingSource);
        let abandoned = tokio::time::timeout(
            Duration::from_millis(20),
            loader.load(request("slow", &["Gen"])),
        )
        .await;
        assert!(abandoned.is_err());
        assert_eq!(loader.state(), LoadState::Idle);
        assert!(loader.document().is_none());
    }

    #[tokio::test]
    async fn test_dropped_load_keeps_newer_request() {
        let loader = Arc::new(Loader::new(StallingSource));
        let mut rx = loader.subscribe();
        let stale = {
            let loader = Arc::clone(&loader);
            tokio::spawn(async move { loader.load(request("slow", &["Gen"])).await })
        };
        rx.wait_for(|state| matches!(state, LoadState::Loading { generation: 1, .. }))
            .await
            .unwrap();

        let newer = {
            let loader = Arc::clone(&loader);
            tokio::spawn(async move { loader.load(request("slow", &["Exod"])).await })
        };
        rx.wait_for(|state| matches!(state, LoadState::Loading { generation: 2, .. }))
            .await
            .unwrap();

        stale.abort();
        let _ = stale.await;
        assert!(matches!(loader.state(), LoadState::Loading { generation: 2, .. }));
        newer.abort();
    }
}
