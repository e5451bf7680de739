//! Recent location searches, most recent first.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::query::{QueryCache, QueryKey, StaleTime};
use crate::storage::{KeyValueStore, LocalStore};
use crate::types::{location_key, HistoryItem, NewHistoryEntry};

/// Storage key of the persisted JSON array
pub const HISTORY_STORAGE_KEY: &str = "search-history";
pub const DEFAULT_HISTORY_LIMIT: usize = 10;

/// Cache key for `list()` reads
pub fn history_key() -> QueryKey {
    QueryKey::new("search-history")
}

/// Locations picked from search results, newest first.
///
/// Every mutation returns the list as it stands afterwards.
pub trait HistoryRepository: Send + Sync {
    /// Entries, most recent first
    fn list(&self) -> Vec<HistoryItem>;

    /// Record a search. A location already in the history moves to the front
    /// with the new query and timestamp.
    ///
    /// # Arguments
    /// * `entry` - The query typed and the location picked for it
    fn add(&self, entry: NewHistoryEntry) -> Vec<HistoryItem>;

    /// Drop the entry with `id` (`"{lat}-{lon}"`)
    fn remove(&self, id: &str) -> Vec<HistoryItem>;

    /// Forget every search; always returns an empty list
    fn clear(&self) -> Vec<HistoryItem>;
}

/// Search history held in memory, mirrored to a `KeyValueStore` on every change
pub struct SearchHistoryStore<S> {
    storage: LocalStore<S>,
    cache: Arc<QueryCache>,
    items: RwLock<Vec<HistoryItem>>,
    limit: usize,
}

impl<S: KeyValueStore> SearchHistoryStore<S> {
    pub fn new(backend: S, cache: Arc<QueryCache>) -> Self {
        Self::with_limit(backend, cache, DEFAULT_HISTORY_LIMIT)
    }

    pub fn with_limit(backend: S, cache: Arc<QueryCache>, limit: usize) -> Self {
        let storage = LocalStore::new(backend);
        let items = storage.read(HISTORY_STORAGE_KEY, Vec::new());
        Self {
            storage,
            cache,
            items: RwLock::new(items),
            limit: limit.max(1),
        }
    }

    fn mutate<F>(&self, update: F) -> Vec<HistoryItem>
    where
        F: FnOnce(&mut Vec<HistoryItem>),
    {
        let mut items = self.items.write();
        update(&mut items);
        self.storage.write(HISTORY_STORAGE_KEY, &*items);
        self.cache.invalidate(&history_key());
        items.clone()
    }
}

impl<S: KeyValueStore> HistoryRepository for SearchHistoryStore<S> {
    fn list(&self) -> Vec<HistoryItem> {
        let cached = self
            .cache
            .ensure(&history_key(), StaleTime::Infinite, || self.items.read().clone());
        cached.as_ref().clone()
    }

    fn add(&self, entry: NewHistoryEntry) -> Vec<HistoryItem> {
        let id = location_key(entry.lat, entry.lon);
        let limit = self.limit;
        self.mutate(|items| {
            items.retain(|item| item.id != id);
            tracing::debug!(%id, query = %entry.query, "Recording search");
            items.insert(
                0,
                HistoryItem {
                    id,
                    query: entry.query,
                    name: entry.name,
                    lat: entry.lat,
                    lon: entry.lon,
                    country: entry.country,
                    state: entry.state,
                    searched_at: chrono::Utc::now().timestamp_millis(),
                },
            );
            items.truncate(limit);
        })
    }

    fn remove(&self, id: &str) -> Vec<HistoryItem> {
        self.mutate(|items| items.retain(|item| item.id != id))
    }

    fn clear(&self) -> Vec<HistoryItem> {
        tracing::info!("Clearing search history");
        self.mutate(Vec::clear)
    }
}
