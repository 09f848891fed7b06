//! Paged loading with a bounded cache and in-flight request sharing.

use crate::config::PerformanceConfig;
use crate::data::dataset::Dataset;
use crate::data::record::Record;
use crate::error::LakeError;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type PageResult<T> = Result<Arc<Vec<T>>, String>;
type SharedPage<T> = Shared<BoxFuture<'static, PageResult<T>>>;
type FetchFn<T> = Arc<dyn Fn(usize, usize) -> BoxFuture<'static, anyhow::Result<Vec<T>>> + Send + Sync>;

struct State<T> {
    cache: BTreeMap<usize, Arc<Vec<T>>>,
    in_flight: HashMap<usize, SharedPage<T>>,
    current: usize,
}

struct Inner<T> {
    fetch: FetchFn<T>,
    page_size: usize,
    window: usize,
    prefetch: bool,
    fetches: AtomicUsize,
    state: Mutex<State<T>>,
}

/// Wraps a page-fetch function with a cache that keeps only pages near the
/// current one.
///
/// Concurrent requests for a page that is still being fetched wait on the
/// same fetch. After each successful [`load_page`](Self::load_page) the
/// cache is trimmed to `current ± window` and the neighbours are prefetched
/// in the background; prefetch failures are logged and dropped.
pub struct PagedLoader<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for PagedLoader<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> std::fmt::Debug for PagedLoader<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PagedLoader")
            .field("page_size", &self.inner.page_size)
            .field("window", &self.inner.window)
            .field("prefetch", &self.inner.prefetch)
            .finish_non_exhaustive()
    }
}

impl<T: Send + Sync + 'static> PagedLoader<T> {
    /// `fetch(page, page_size)` returns the items of one zero-based page.
    pub fn new<F, Fut>(page_size: usize, fetch: F) -> Self
    where
        F: Fn(usize, usize) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Vec<T>>> + Send + 'static,
    {
        let fetch: FetchFn<T> = Arc::new(move |page, size| fetch(page, size).boxed());
        Self {
            inner: Arc::new(Inner {
                fetch,
                page_size: page_size.max(1),
                window: 1,
                prefetch: true,
                fetches: AtomicUsize::new(0),
                state: Mutex::new(State {
                    cache: BTreeMap::new(),
                    in_flight: HashMap::new(),
                    current: 0,
                }),
            }),
        }
    }

    /// Pages kept on each side of the current page.
    pub fn with_window(self, window: usize) -> Self {
        self.reconfigure(|inner| inner.window = window)
    }

    pub fn with_prefetch(self, prefetch: bool) -> Self {
        self.reconfigure(|inner| inner.prefetch = prefetch)
    }

    fn reconfigure(self, apply: impl FnOnce(&mut Inner<T>)) -> Self {
        match Arc::try_unwrap(self.inner) {
            Ok(mut inner) => {
                apply(&mut inner);
                Self {
                    inner: Arc::new(inner),
                }
            }
            // Already shared; settings are fixed once clones exist.
            Err(inner) => Self { inner },
        }
    }

    pub fn page_size(&self) -> usize {
        self.inner.page_size
    }

    /// Number of underlying fetches started so far.
    pub fn fetch_count(&self) -> usize {
        self.inner.fetches.load(Ordering::SeqCst)
    }

    pub fn current_page(&self) -> usize {
        self.lock().current
    }

    pub fn cached_pages(&self) -> Vec<usize> {
        self.lock().cache.keys().copied().collect()
    }

    pub fn is_cached(&self, page: usize) -> bool {
        self.lock().cache.contains_key(&page)
    }

    pub fn clear(&self) {
        self.lock().cache.clear();
    }

    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make `page` current and return its items.
    pub async fn load_page(&self, page: usize) -> Result<Arc<Vec<T>>, LakeError> {
        self.lock().current = page;
        let items = self.fetch_page(page).await?;
        self.evict_outside_window();

        if self.inner.prefetch {
            for neighbour in [page.checked_sub(1), page.checked_add(1)].into_iter().flatten() {
                self.spawn_prefetch(neighbour);
            }
        }
        Ok(items)
    }

    fn within_window(&self, state: &State<T>, page: usize) -> bool {
        page.abs_diff(state.current) <= self.inner.window
    }

    fn evict_outside_window(&self) {
        let mut state = self.lock();
        let current = state.current;
        let window = self.inner.window;
        let before = state.cache.len();
        state.cache.retain(|page, _| page.abs_diff(current) <= window);
        let evicted = before - state.cache.len();
        if evicted > 0 {
            tracing::debug!(current, evicted, "Evicted cached pages");
        }
    }

    fn spawn_prefetch(&self, page: usize) {
        if self.is_cached(page) {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let loader = self.clone();
        handle.spawn(async move {
            if let Err(e) = loader.fetch_page(page).await {
                tracing::warn!(page, error = %e, "Prefetch failed");
            }
        });
    }

    /// Return a page from cache, join its in-flight fetch, or start one.
    /// Does not move the current page.
    async fn fetch_page(&self, page: usize) -> Result<Arc<Vec<T>>, LakeError> {
        let shared = {
            let mut state = self.lock();
            if let Some(hit) = state.cache.get(&page) {
                tracing::debug!(page, "Page cache hit");
                return Ok(Arc::clone(hit));
            }
            match state.in_flight.get(&page) {
                Some(pending) => pending.clone(),
                None => {
                    self.inner.fetches.fetch_add(1, Ordering::SeqCst);
                    let fetch = Arc::clone(&self.inner.fetch);
                    let size = self.inner.page_size;
                    let pending: SharedPage<T> = async move {
                        fetch(page, size)
                            .await
                            .map(Arc::new)
                            .map_err(|e| format!("{e:#}"))
                    }
                    .boxed()
                    .shared();
                    state.in_flight.insert(page, pending.clone());
                    pending
                }
            }
        };

        let result = shared.clone().await;

        let mut state = self.lock();
        if state.in_flight.get(&page).is_some_and(|p| p.ptr_eq(&shared)) {
            state.in_flight.remove(&page);
        }
        match result {
            Ok(items) => {
                if self.within_window(&state, page) {
                    state.cache.insert(page, Arc::clone(&items));
                }
                Ok(items)
            }
            Err(message) => Err(LakeError::PageFetch { page, message }),
        }
    }
}

/// A loader serving pages of a dataset's rows.
pub fn dataset_pages(dataset: Arc<Dataset>, config: &PerformanceConfig) -> PagedLoader<Record> {
    PagedLoader::new(config.page_size, move |page, size| {
        let dataset = Arc::clone(&dataset);
        async move {
            let start = page.saturating_mul(size).min(dataset.rows.len());
            let end = start.saturating_add(size).min(dataset.rows.len());
            Ok::<_, anyhow::Error>(dataset.rows[start..end].to_vec())
        }
    })
    .with_window(config.cache_window)
    .with_prefetch(config.prefetch)
}
