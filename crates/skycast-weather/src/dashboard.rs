//! Dashboard controller: ties location, weather queries, favorites and
//! search history together.

use std::sync::Arc;

use crate::favorites::FavoriteRepository;
use crate::forecast::{self, DailyForecast, HourlyTemperature};
use crate::history::HistoryRepository;
use crate::location::LocationProvider;
use crate::queries::WeatherQueries;
use crate::types::{
    Coordinates, FetchError, ForecastData, GeocodingResponse, HistoryItem, LocationError,
    NewFavorite, NewHistoryEntry, WeatherData,
};

/// Everything needed to render a location's weather
#[derive(Debug, Clone)]
pub struct DashboardSnapshot {
    pub coordinates: Coordinates,
    pub weather: Arc<WeatherData>,
    pub forecast: Arc<ForecastData>,
    /// Reverse-geocoded place; absent if that lookup failed
    pub place: Option<GeocodingResponse>,
    pub is_favorite: bool,
}

impl DashboardSnapshot {
    pub fn display_name(&self) -> String {
        match &self.place {
            Some(place) => place.display_name(),
            None if !self.weather.name.is_empty() => self.weather.name.clone(),
            None => format!("{:.4}, {:.4}", self.coordinates.lat, self.coordinates.lon),
        }
    }

    pub fn next_days(&self) -> Vec<DailyForecast> {
        forecast::next_days(&self.forecast)
    }

    pub fn hourly(&self) -> Vec<HourlyTemperature> {
        forecast::hourly_temperatures(&self.forecast)
    }
}

#[derive(Debug, Clone)]
pub enum DashboardState {
    /// Location lookup failed with a reason to show
    LocationError(String),
    /// No location available; the user has to provide one
    LocationRequired,
    /// Weather or forecast could not be fetched
    FetchFailed(FetchError),
    Ready(DashboardSnapshot),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FavoriteToggle {
    Added,
    Removed,
}

pub struct Dashboard {
    queries: WeatherQueries,
    favorites: Arc<dyn FavoriteRepository>,
    history: Arc<dyn HistoryRepository>,
}

impl Dashboard {
    pub fn new(
        queries: WeatherQueries,
        favorites: Arc<dyn FavoriteRepository>,
        history: Arc<dyn HistoryRepository>,
    ) -> Self {
        Self {
            queries,
            favorites,
            history,
        }
    }

    pub fn queries(&self) -> &WeatherQueries {
        &self.queries
    }

    pub fn favorites(&self) -> &dyn FavoriteRepository {
        self.favorites.as_ref()
    }

    pub fn history(&self) -> &dyn HistoryRepository {
        self.history.as_ref()
    }

    /// Weather for the user's own location
    pub async fn load(&self, location: &dyn LocationProvider) -> DashboardState {
        match locate(location) {
            Ok(coords) => self.snapshot(coords, false).await,
            Err(state) => state,
        }
    }

    /// Re-locate, then refetch everything regardless of freshness
    pub async fn refresh(&self, location: &dyn LocationProvider) -> DashboardState {
        match locate(location) {
            Ok(coords) => self.snapshot(coords, true).await,
            Err(state) => state,
        }
    }

    /// Weather for a chosen city
    pub async fn city(&self, coords: Coordinates) -> DashboardState {
        self.snapshot(coords, false).await
    }

    async fn snapshot(&self, coords: Coordinates, force: bool) -> DashboardState {
        let (weather, forecast, place) = if force {
            tokio::join!(
                self.queries.refetch_weather(coords),
                self.queries.refetch_forecast(coords),
                self.queries.refetch_reverse_geocode(coords),
            )
        } else {
            tokio::join!(
                self.queries.weather(coords),
                self.queries.forecast(coords),
                self.queries.reverse_geocode(coords),
            )
        };

        let (weather, forecast) = match (weather, forecast) {
            (Ok(weather), Ok(forecast)) => (weather, forecast),
            (Err(e), _) | (_, Err(e)) => return DashboardState::FetchFailed(e),
        };

        let place = match place {
            Ok(places) => places.first().cloned(),
            Err(e) => {
                tracing::warn!(error = %e, "Reverse geocoding failed; showing provider name");
                None
            }
        };

        DashboardState::Ready(DashboardSnapshot {
            coordinates: coords,
            is_favorite: self.favorites.is_favorite(weather.coord.lat, weather.coord.lon),
            weather,
            forecast,
            place,
        })
    }

    /// Star or un-star the city a weather reading belongs to
    pub fn toggle_favorite(&self, weather: &WeatherData) -> FavoriteToggle {
        let (lat, lon) = (weather.coord.lat, weather.coord.lon);
        if self.favorites.is_favorite(lat, lon) {
            self.favorites.remove(&weather.coord.key());
            FavoriteToggle::Removed
        } else {
            self.favorites.add(NewFavorite::from(weather));
            FavoriteToggle::Added
        }
    }

    /// Search locations by name; `None` for queries too short to send
    pub async fn search(
        &self,
        query: &str,
    ) -> Result<Option<Arc<Vec<GeocodingResponse>>>, FetchError> {
        self.queries.location_search(query).await
    }

    /// Record a picked search result and return where to navigate
    pub fn select_location(&self, query: &str, place: &GeocodingResponse) -> Coordinates {
        self.history.add(NewHistoryEntry {
            query: query.to_string(),
            name: place.name.clone(),
            lat: place.lat,
            lon: place.lon,
            country: Some(place.country.clone()).filter(|c| !c.is_empty()),
            state: place.state.clone(),
        });
        place.coordinates()
    }

    pub fn recent_searches(&self) -> Vec<HistoryItem> {
        self.history.list()
    }

    pub fn clear_history(&self) -> Vec<HistoryItem> {
        self.history.clear()
    }
}

fn locate(location: &dyn LocationProvider) -> Result<Coordinates, DashboardState> {
    location.locate().map_err(|e| match e {
        LocationError::Unavailable => DashboardState::LocationRequired,
        other => DashboardState::LocationError(other.to_string()),
    })
}
