//! Cached accessors over `WeatherApi`.

use std::sync::Arc;

use crate::client::WeatherApi;
use crate::query::{QueryCache, QueryKey, QueryState, StaleTime};
use crate::types::{Coordinates, FetchError, ForecastData, GeocodingResponse, WeatherData};

/// Shortest query sent to `/direct`
pub const MIN_SEARCH_LEN: usize = 3;

pub fn weather_key(coords: Coordinates) -> QueryKey {
    QueryKey::new("weather").with(coords.key())
}

pub fn forecast_key(coords: Coordinates) -> QueryKey {
    QueryKey::new("forecast").with(coords.key())
}

pub fn place_key(coords: Coordinates) -> QueryKey {
    QueryKey::new("location").with(coords.key())
}

pub fn search_prefix() -> QueryKey {
    QueryKey::new("location-search")
}

/// One slot per distinct query; slots stay until `clear_searches`
pub fn search_key(query: &str) -> QueryKey {
    search_prefix().with(query)
}

#[derive(Debug, Clone)]
pub struct WeatherQueries {
    api: WeatherApi,
    cache: Arc<QueryCache>,
    stale_time: StaleTime,
}

impl WeatherQueries {
    pub fn new(api: WeatherApi, cache: Arc<QueryCache>, stale_time: StaleTime) -> Self {
        Self {
            api,
            cache,
            stale_time,
        }
    }

    pub fn api(&self) -> &WeatherApi {
        &self.api
    }

    pub fn cache(&self) -> &Arc<QueryCache> {
        &self.cache
    }

    pub async fn weather(&self, coords: Coordinates) -> Result<Arc<WeatherData>, FetchError> {
        self.cache
            .fetch(&weather_key(coords), self.stale_time, || {
                self.api.get_current_weather(coords)
            })
            .await
    }

    pub async fn forecast(&self, coords: Coordinates) -> Result<Arc<ForecastData>, FetchError> {
        self.cache
            .fetch(&forecast_key(coords), self.stale_time, || {
                self.api.get_forecast(coords)
            })
            .await
    }

    pub async fn reverse_geocode(
        &self,
        coords: Coordinates,
    ) -> Result<Arc<Vec<GeocodingResponse>>, FetchError> {
        self.cache
            .fetch(&place_key(coords), self.stale_time, || {
                self.api.reverse_geocode(coords)
            })
            .await
    }

    /// Search by name. Queries shorter than `MIN_SEARCH_LEN` are not sent
    /// and yield `Ok(None)`.
    pub async fn location_search(
        &self,
        query: &str,
    ) -> Result<Option<Arc<Vec<GeocodingResponse>>>, FetchError> {
        let query = query.trim();
        if query.chars().count() < MIN_SEARCH_LEN {
            return Ok(None);
        }
        self.cache
            .fetch(&search_key(query), self.stale_time, || {
                self.api.search_locations(query)
            })
            .await
            .map(Some)
    }

    pub async fn refetch_weather(&self, coords: Coordinates) -> Result<Arc<WeatherData>, FetchError> {
        self.cache
            .refetch(&weather_key(coords), || self.api.get_current_weather(coords))
            .await
    }

    pub async fn refetch_forecast(
        &self,
        coords: Coordinates,
    ) -> Result<Arc<ForecastData>, FetchError> {
        self.cache
            .refetch(&forecast_key(coords), || self.api.get_forecast(coords))
            .await
    }

    pub async fn refetch_reverse_geocode(
        &self,
        coords: Coordinates,
    ) -> Result<Arc<Vec<GeocodingResponse>>, FetchError> {
        self.cache
            .refetch(&place_key(coords), || self.api.reverse_geocode(coords))
            .await
    }

    pub fn weather_state(&self, coords: Coordinates) -> QueryState<WeatherData, FetchError> {
        self.cache.state(&weather_key(coords))
    }

    pub fn forecast_state(&self, coords: Coordinates) -> QueryState<ForecastData, FetchError> {
        self.cache.state(&forecast_key(coords))
    }

    /// Drop every cached search result. Long-running callers that search
    /// often should call this periodically, since each distinct query keeps
    /// its own slot.
    pub fn clear_searches(&self) -> usize {
        self.cache.remove_prefix(&search_prefix())
    }

    /// Mark weather, forecast and place name for `coords` stale
    pub fn invalidate_location(&self, coords: Coordinates) {
        self.cache.invalidate(&weather_key(coords));
        self.cache.invalidate(&forecast_key(coords));
        self.cache.invalidate(&place_key(coords));
    }
}
