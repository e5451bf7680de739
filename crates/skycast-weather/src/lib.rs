//! Weather dashboard core
//!
//! OpenWeatherMap client, a keyed query cache with request de-duplication,
//! and persisted favorites and search history.

pub mod client;
pub mod dashboard;
pub mod favorites;
pub mod forecast;
pub mod history;
pub mod location;
pub mod queries;
pub mod query;
pub mod storage;
pub mod types;

pub use client::WeatherApi;
pub use dashboard::{Dashboard, DashboardSnapshot, DashboardState, FavoriteToggle};
pub use favorites::{FavoriteRepository, FavoritesStore};
pub use history::{HistoryRepository, SearchHistoryStore};
pub use location::{FixedLocation, LocationProvider};
pub use queries::WeatherQueries;
pub use query::{QueryCache, QueryKey, QueryState, StaleTime};
pub use storage::{FileStore, KeyValueStore, LocalStore, MemoryStore};
pub use types::*;
