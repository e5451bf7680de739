//! Keyed query cache with in-flight request sharing.
//!
//! Each `QueryKey` owns one cache slot. Reads within the staleness window are
//! served from the slot; concurrent reads of a stale slot wait on a per-key
//! gate so only one fetch runs, and the waiters take its outcome.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

type Shared = Arc<dyn Any + Send + Sync>;

/// Operation name plus its arguments, e.g. `weather/51.5--0.12`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey(Vec<String>);

impl QueryKey {
    pub fn new(operation: &str) -> Self {
        Self(vec![operation.to_string()])
    }

    pub fn with(mut self, part: impl fmt::Display) -> Self {
        self.0.push(part.to_string());
        self
    }

    pub fn parts(&self) -> &[String] {
        &self.0
    }

    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("/"))
    }
}

/// How long a successful result stays fresh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaleTime {
    /// Fresh until invalidated
    Infinite,
    After(Duration),
}

impl StaleTime {
    fn is_expired(&self, updated_at: Instant) -> bool {
        match self {
            StaleTime::Infinite => false,
            StaleTime::After(window) => updated_at.elapsed() >= *window,
        }
    }
}

impl From<Duration> for StaleTime {
    fn from(window: Duration) -> Self {
        StaleTime::After(window)
    }
}

/// Snapshot of one slot for presentation code
#[derive(Debug, Clone)]
pub struct QueryState<T, E> {
    pub data: Option<Arc<T>>,
    pub error: Option<E>,
    pub is_fetching: bool,
    /// No data yet, or invalidated since the last fetch
    pub is_invalidated: bool,
    pub updated_at: Option<Instant>,
}

impl<T, E> QueryState<T, E> {
    pub fn is_loading(&self) -> bool {
        self.data.is_none() && self.is_fetching
    }
}

#[derive(Default)]
struct Entry {
    data: Option<Shared>,
    error: Option<Shared>,
    updated_at: Option<Instant>,
    invalidated: bool,
    /// Bumped on every invalidation; a load that started under an older
    /// version must not clear `invalidated`
    version: u64,
    fetching: usize,
    /// Number of finished fetches; lets waiters detect a result landed while they queued
    completed: u64,
    gate: Arc<tokio::sync::Mutex<()>>,
}

impl Entry {
    fn fresh<T: Send + Sync + 'static>(&self, stale_time: StaleTime) -> Option<Arc<T>> {
        if self.invalidated || self.error.is_some() {
            return None;
        }
        let updated_at = self.updated_at?;
        if stale_time.is_expired(updated_at) {
            return None;
        }
        self.data.clone()?.downcast::<T>().ok()
    }

    fn outcome<T, E>(&self) -> Option<Result<Arc<T>, E>>
    where
        T: Send + Sync + 'static,
        E: Clone + Send + Sync + 'static,
    {
        if let Some(error) = &self.error {
            return error.downcast_ref::<E>().cloned().map(Err);
        }
        self.data.clone()?.downcast::<T>().ok().map(Ok)
    }
}

/// Decrements the in-flight counter even if the fetch future is dropped
struct InFlight<'a> {
    cache: &'a QueryCache,
    key: &'a QueryKey,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if let Some(entry) = self.cache.entries.lock().get_mut(self.key) {
            entry.fetching = entry.fetching.saturating_sub(1);
        }
    }
}

/// Explicit, shareable query cache; pass an `Arc<QueryCache>` to every
/// component that reads or invalidates queries.
#[derive(Default)]
pub struct QueryCache {
    entries: Mutex<HashMap<QueryKey, Entry>>,
}

impl fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryCache")
            .field("entries", &self.entries.lock().len())
            .finish()
    }
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return fresh cached data or run `fetcher`, sharing one fetch between
    /// concurrent callers of the same key.
    pub async fn fetch<T, E, F, Fut>(
        &self,
        key: &QueryKey,
        stale_time: StaleTime,
        fetcher: F,
    ) -> Result<Arc<T>, E>
    where
        T: Send + Sync + 'static,
        E: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(data) = self.fresh::<T>(key, stale_time) {
            tracing::debug!(%key, "Query cache hit");
            return Ok(data);
        }
        self.run(key, Some(stale_time), fetcher).await
    }

    /// Fetch regardless of freshness. A fetch already in flight for `key` is
    /// joined instead of duplicated.
    pub async fn refetch<T, E, F, Fut>(&self, key: &QueryKey, fetcher: F) -> Result<Arc<T>, E>
    where
        T: Send + Sync + 'static,
        E: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.run(key, None, fetcher).await
    }

    async fn run<T, E, F, Fut>(
        &self,
        key: &QueryKey,
        stale_time: Option<StaleTime>,
        fetcher: F,
    ) -> Result<Arc<T>, E>
    where
        T: Send + Sync + 'static,
        E: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let (gate, seen) = {
            let mut entries = self.entries.lock();
            let entry = entries.entry(key.clone()).or_default();
            (entry.gate.clone(), entry.completed)
        };

        let _permit = gate.lock().await;

        {
            let entries = self.entries.lock();
            if let Some(entry) = entries.get(key) {
                if entry.completed != seen {
                    if let Some(outcome) = entry.outcome::<T, E>() {
                        tracing::debug!(%key, "Joined in-flight query");
                        return outcome;
                    }
                }
                if let Some(data) = stale_time.and_then(|s| entry.fresh::<T>(s)) {
                    return Ok(data);
                }
            }
        }

        let version = self.begin(key);
        let _in_flight = InFlight { cache: self, key };

        tracing::debug!(%key, "Fetching query");
        let result = fetcher().await.map(Arc::new);
        self.finish(key, version, &result);
        result
    }

    /// Mark a fetch in flight and return the version it started under
    fn begin(&self, key: &QueryKey) -> u64 {
        let mut entries = self.entries.lock();
        let entry = entries.entry(key.clone()).or_default();
        entry.fetching += 1;
        entry.version
    }

    fn finish<T, E>(&self, key: &QueryKey, version: u64, result: &Result<Arc<T>, E>)
    where
        T: Send + Sync + 'static,
        E: Clone + Send + Sync + 'static,
    {
        let mut entries = self.entries.lock();
        let entry = entries.entry(key.clone()).or_default();
        match result {
            Ok(data) => {
                let shared: Shared = data.clone();
                entry.data = Some(shared);
                entry.error = None;
                entry.updated_at = Some(Instant::now());
                entry.invalidated = entry.version != version;
            }
            // Previous data is kept so callers can still show something
            Err(error) => {
                entry.error = Some(Arc::new(error.clone()));
            }
        }
        entry.completed += 1;
    }

    /// Synchronous read-through for local loaders (favorites, history)
    pub fn ensure<T, F>(&self, key: &QueryKey, stale_time: StaleTime, loader: F) -> Arc<T>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> T,
    {
        if let Some(data) = self.fresh::<T>(key, stale_time) {
            return data;
        }

        let version = self
            .entries
            .lock()
            .get(key)
            .map_or(0, |entry| entry.version);

        let data = Arc::new(loader());
        let mut entries = self.entries.lock();
        let entry = entries.entry(key.clone()).or_default();
        let shared: Shared = data.clone();
        entry.data = Some(shared);
        entry.error = None;
        entry.updated_at = Some(Instant::now());
        entry.invalidated = entry.version != version;
        entry.completed += 1;
        data
    }

    fn fresh<T: Send + Sync + 'static>(&self, key: &QueryKey, stale_time: StaleTime) -> Option<Arc<T>> {
        self.entries.lock().get(key)?.fresh::<T>(stale_time)
    }

    /// Cached data regardless of freshness
    pub fn get_data<T: Send + Sync + 'static>(&self, key: &QueryKey) -> Option<Arc<T>> {
        self.entries.lock().get(key)?.data.clone()?.downcast::<T>().ok()
    }

    /// Mark `key` stale; the next read fetches again.
    ///
    /// A load or fetch already running for `key` still stores its result, but
    /// the slot stays stale so the next read does not serve it.
    pub fn invalidate(&self, key: &QueryKey) {
        let mut entries = self.entries.lock();
        let entry = entries.entry(key.clone()).or_default();
        tracing::debug!(%key, "Invalidated query");
        entry.invalidated = true;
        entry.version += 1;
    }

    /// Mark every key starting with `prefix` stale
    pub fn invalidate_prefix(&self, prefix: &QueryKey) {
        let mut entries = self.entries.lock();
        for (key, entry) in entries.iter_mut() {
            if key.starts_with(prefix) {
                entry.invalidated = true;
                entry.version += 1;
            }
        }
    }

    /// Drop every slot under `prefix`. Fetches still running for those keys
    /// recreate their slot when they finish.
    pub fn remove_prefix(&self, prefix: &QueryKey) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        let removed = before - entries.len();
        tracing::debug!(%prefix, removed, "Removed queries");
        removed
    }

    /// Number of cached slots
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn state<T, E>(&self, key: &QueryKey) -> QueryState<T, E>
    where
        T: Send + Sync + 'static,
        E: Clone + Send + Sync + 'static,
    {
        let entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) => QueryState {
                data: entry.data.clone().and_then(|d| d.downcast::<T>().ok()),
                error: entry
                    .error
                    .as_ref()
                    .and_then(|e| e.downcast_ref::<E>().cloned()),
                is_fetching: entry.fetching > 0,
                is_invalidated: entry.invalidated || entry.data.is_none(),
                updated_at: entry.updated_at,
            },
            None => QueryState {
                data: None,
                error: None,
                is_fetching: false,
                is_invalidated: true,
                updated_at: None,
            },
        }
    }
}
