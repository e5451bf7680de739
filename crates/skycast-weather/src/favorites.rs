//! Favorite cities, persisted under the `favorites` key.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::query::{QueryCache, QueryKey, StaleTime};
use crate::storage::{KeyValueStore, LocalStore};
use crate::types::{location_key, FavoriteCityItem, NewFavorite};

/// Storage key of the persisted JSON array
pub const FAVORITES_STORAGE_KEY: &str = "favorites";
/// Favorites kept before the oldest is evicted
pub const DEFAULT_FAVORITES_LIMIT: usize = 10;

/// Cache key for `list()` reads
pub fn favorites_key() -> QueryKey {
    QueryKey::new("favorites")
}

/// Favorite cities, keyed by their coordinate id.
///
/// Every mutation returns the list as it stands afterwards.
pub trait FavoriteRepository: Send + Sync {
    /// Favorites in insertion order, consistent with the last mutation
    fn list(&self) -> Vec<FavoriteCityItem>;

    /// Add a city and return the resulting list.
    ///
    /// Adding a city already present is a no-op. Past the limit the oldest
    /// entry is evicted.
    ///
    /// # Arguments
    /// * `city` - Name and coordinates; id and `added_at` are derived
    fn add(&self, city: NewFavorite) -> Vec<FavoriteCityItem>;

    /// Remove the favorite with `id` (`"{lat}-{lon}"`); unknown ids are ignored
    fn remove(&self, id: &str) -> Vec<FavoriteCityItem>;

    /// Remove every favorite
    fn clear(&self) -> Vec<FavoriteCityItem>;

    /// Whether a favorite sits at exactly these coordinates
    fn is_favorite(&self, lat: f64, lon: f64) -> bool;
}

/// Favorites held in memory, mirrored to a `KeyValueStore` on every change
pub struct FavoritesStore<S> {
    storage: LocalStore<S>,
    cache: Arc<QueryCache>,
    items: RwLock<Vec<FavoriteCityItem>>,
    limit: usize,
}

impl<S: KeyValueStore> FavoritesStore<S> {
    /// Load persisted favorites from `backend` with the default limit
    pub fn new(backend: S, cache: Arc<QueryCache>) -> Self {
        Self::with_limit(backend, cache, DEFAULT_FAVORITES_LIMIT)
    }

    /// Load persisted favorites, keeping at most `limit` (minimum 1)
    pub fn with_limit(backend: S, cache: Arc<QueryCache>, limit: usize) -> Self {
        let storage = LocalStore::new(backend);
        let items = storage.read(FAVORITES_STORAGE_KEY, Vec::new());
        Self {
            storage,
            cache,
            items: RwLock::new(items),
            limit: limit.max(1),
        }
    }

    /// Apply `update` to the list, persist it and invalidate cached reads
    fn mutate<F>(&self, update: F) -> Vec<FavoriteCityItem>
    where
        F: FnOnce(&mut Vec<FavoriteCityItem>) -> bool,
    {
        let mut items = self.items.write();
        if !update(&mut items) {
            return items.clone();
        }
        self.storage.write(FAVORITES_STORAGE_KEY, &*items);
        self.cache.invalidate(&favorites_key());
        items.clone()
    }
}

impl<S: KeyValueStore> FavoriteRepository for FavoritesStore<S> {
    fn list(&self) -> Vec<FavoriteCityItem> {
        let cached = self
            .cache
            .ensure(&favorites_key(), StaleTime::Infinite, || self.items.read().clone());
        cached.as_ref().clone()
    }

    fn add(&self, city: NewFavorite) -> Vec<FavoriteCityItem> {
        let id = location_key(city.lat, city.lon);
        let limit = self.limit;
        self.mutate(|items| {
            if items.iter().any(|fav| fav.id == id) {
                tracing::debug!(%id, "Already a favorite");
                return false;
            }

            tracing::info!(%id, name = %city.name, "Adding favorite");
            items.push(FavoriteCityItem {
                id,
                name: city.name,
                lat: city.lat,
                lon: city.lon,
                country: city.country,
                state: city.state,
                added_at: chrono::Utc::now().timestamp_millis(),
            });
            if items.len() > limit {
                let overflow = items.len() - limit;
                items.drain(..overflow);
            }
            true
        })
    }

    fn remove(&self, id: &str) -> Vec<FavoriteCityItem> {
        self.mutate(|items| {
            let before = items.len();
            items.retain(|fav| fav.id != id);
            tracing::info!(id, removed = before - items.len(), "Removing favorite");
            true
        })
    }

    fn clear(&self) -> Vec<FavoriteCityItem> {
        self.mutate(|items| {
            items.clear();
            true
        })
    }

    fn is_favorite(&self, lat: f64, lon: f64) -> bool {
        self.items
            .read()
            .iter()
            .any(|fav| fav.lat == lat && fav.lon == lon)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn city(n: u32) -> NewFavorite {
        NewFavorite {
            name: format!("City {}", n),
            lat: f64::from(n),
            lon: f64::from(n) + 0.5,
            country: "XX".to_string(),
            state: None,
        }
    }

    fn store() -> FavoritesStore<Arc<MemoryStore>> {
        FavoritesStore::new(Arc::new(MemoryStore::new()), Arc::new(QueryCache::new()))
    }

    #[test]
    fn test_duplicate_add_is_noop() {
        let favorites = store();
        favorites.add(city(1));
        let list = favorites.add(city(1));

        assert_eq!(list.len(), 1);
        assert_eq!(list[0].id, "1-1.5");
        assert_eq!(favorites.list().len(), 1);
    }

    #[test]
    fn test_eleventh_favorite_evicts_oldest() {
        let favorites = store();
        for n in 0..11 {
            favorites.add(city(n));
        }

        let list = favorites.list();
        assert_eq!(list.len(), 10);
        assert_eq!(list[0].name, "City 1");
        assert_eq!(list[9].name, "City 10");
        assert!(!favorites.is_favorite(0.0, 0.5));
    }

    #[test]
    fn test_is_favorite_follows_add_and_remove() {
        let favorites = store();
        assert!(!favorites.is_favorite(3.0, 3.5));

        favorites.add(city(3));
        assert!(favorites.is_favorite(3.0, 3.5));

        let list = favorites.remove("3-3.5");
        assert!(list.is_empty());
        assert!(!favorites.is_favorite(3.0, 3.5));
    }

    #[test]
    fn test_negative_zero_coordinate_can_be_removed() {
        let favorites = store();
        favorites.add(NewFavorite {
            name: "Null Island".to_string(),
            lat: -0.0,
            lon: 0.0,
            country: String::new(),
            state: None,
        });
        assert!(favorites.is_favorite(0.0, 0.0));

        assert!(favorites.remove("0-0").is_empty());
        assert!(!favorites.is_favorite(0.0, 0.0));
    }

    #[test]
    fn test_list_sees_add_made_during_first_load() {
        let cache = Arc::new(QueryCache::new());
        let favorites = FavoritesStore::new(MemoryStore::new(), cache.clone());

        // A write lands after the loader read the list but before it was cached
        let stale = cache.ensure(&favorites_key(), StaleTime::Infinite, || {
            let snapshot = favorites.items.read().clone();
            favorites.add(city(1));
            snapshot
        });
        assert!(stale.is_empty());

        assert_eq!(favorites.list().len(), 1);
    }

    #[test]
    fn test_list_reflects_last_write() {
        let favorites = store();
        assert!(favorites.list().is_empty());

        favorites.add(city(1));
        favorites.add(city(2));
        let names: Vec<_> = favorites.list().into_iter().map(|f| f.name).collect();
        assert_eq!(names, vec!["City 1", "City 2"]);

        favorites.clear();
        assert!(favorites.list().is_empty());
    }

    #[test]
    fn test_persisted_list_round_trips() {
        let backend = Arc::new(MemoryStore::new());
        let cache = Arc::new(QueryCache::new());
        let written = {
            let favorites = FavoritesStore::new(backend.clone(), cache.clone());
            favorites.add(city(5));
            favorites.add(city(2));
            favorites.list()
        };

        let reopened = FavoritesStore::new(backend, Arc::new(QueryCache::new()));
        assert_eq!(reopened.list(), written);
    }

    #[test]
    fn test_mutation_invalidates_cached_list() {
        let cache = Arc::new(QueryCache::new());
        let favorites = FavoritesStore::new(Arc::new(MemoryStore::new()), cache.clone());

        favorites.list();
        assert!(!cache
            .state::<Vec<FavoriteCityItem>, ()>(&favorites_key())
            .is_invalidated);

        favorites.add(city(1));
        assert!(cache
            .state::<Vec<FavoriteCityItem>, ()>(&favorites_key())
            .is_invalidated);
    }

    #[test]
    fn test_corrupt_storage_starts_empty() {
        let backend = MemoryStore::new().with_item(FAVORITES_STORAGE_KEY, "[{\"id\":");
        let favorites = FavoritesStore::new(backend, Arc::new(QueryCache::new()));
        assert!(favorites.list().is_empty());
    }
}
