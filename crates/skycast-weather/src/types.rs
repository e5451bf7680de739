use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use skycast_core::{AppError, NetworkError, WeatherError};

/// Geographic coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Coordinate-derived id, e.g. `51.5074--0.1278`
    pub fn key(&self) -> String {
        location_key(self.lat, self.lon)
    }
}

/// Key used to dedup favorites and history entries.
///
/// Floats render in their shortest round-trip form, so `40.0` becomes `40`,
/// and `-0.0` renders as `0`.
pub fn location_key(lat: f64, lon: f64) -> String {
    format!("{}-{}", unsigned_zero(lat), unsigned_zero(lon))
}

fn unsigned_zero(value: f64) -> f64 {
    if value == 0.0 {
        0.0
    } else {
        value
    }
}

/// One `weather[]` element of a provider response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherCondition {
    pub id: u32,
    pub main: String,
    pub description: String,
    pub icon: String,
}

/// `main` block shared by current weather and forecast entries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MainReadings {
    pub temp: f64,
    pub feels_like: f64,
    pub temp_min: f64,
    pub temp_max: f64,
    #[serde(default)]
    pub pressure: f64,
    pub humidity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wind {
    pub speed: f64,
    #[serde(default)]
    pub deg: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemInfo {
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub sunrise: i64,
    #[serde(default)]
    pub sunset: i64,
}

/// Current weather (`/weather`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherData {
    pub coord: Coordinates,
    pub weather: Vec<WeatherCondition>,
    pub main: MainReadings,
    pub wind: Wind,
    #[serde(default)]
    pub sys: SystemInfo,
    #[serde(default)]
    pub name: String,
    pub dt: i64,
    /// Shift in seconds from UTC
    #[serde(default)]
    pub timezone: i32,
}

impl WeatherData {
    /// Primary condition, if the provider sent one
    pub fn condition(&self) -> Option<&WeatherCondition> {
        self.weather.first()
    }
}

/// One 3-hour slot of `/forecast`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastEntry {
    pub dt: i64,
    pub main: MainReadings,
    pub weather: Vec<WeatherCondition>,
    pub wind: Wind,
    #[serde(default)]
    pub dt_txt: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForecastCity {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub sunrise: i64,
    #[serde(default)]
    pub sunset: i64,
    /// Shift in seconds from UTC
    #[serde(default)]
    pub timezone: i32,
}

/// 5 day / 3 hour forecast (`/forecast`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastData {
    pub list: Vec<ForecastEntry>,
    #[serde(default)]
    pub city: ForecastCity,
}

/// Element of `/direct` and `/reverse` geocoding responses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodingResponse {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_names: Option<BTreeMap<String, String>>,
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

impl GeocodingResponse {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.lat, self.lon)
    }

    /// `Name, State, Country` with empty parts skipped
    pub fn display_name(&self) -> String {
        let mut parts = vec![self.name.as_str()];
        if let Some(state) = self.state.as_deref().filter(|s| !s.is_empty()) {
            parts.push(state);
        }
        if !self.country.is_empty() {
            parts.push(&self.country);
        }
        parts.join(", ")
    }
}

/// Persisted favorite city
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteCityItem {
    pub id: String,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    /// Epoch milliseconds
    pub added_at: i64,
}

/// Input for adding a favorite; id and timestamp are derived
#[derive(Debug, Clone, PartialEq)]
pub struct NewFavorite {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub country: String,
    pub state: Option<String>,
}

impl From<&WeatherData> for NewFavorite {
    fn from(data: &WeatherData) -> Self {
        Self {
            name: data.name.clone(),
            lat: data.coord.lat,
            lon: data.coord.lon,
            country: data.sys.country.clone(),
            state: None,
        }
    }
}

/// Persisted search history entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryItem {
    pub id: String,
    pub query: String,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    /// Epoch milliseconds
    pub searched_at: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewHistoryEntry {
    pub query: String,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub country: Option<String>,
    pub state: Option<String>,
}

/// Location service errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LocationError {
    #[error("Location permission denied. Please enable location access.")]
    PermissionDenied,
    #[error("Location information is unavailable.")]
    Unavailable,
    #[error("Location request timed out.")]
    Timeout,
    #[error("{0}")]
    Other(String),
}

/// Failure of any weather provider request.
///
/// The message is always the same; the cause (transport, status, decode)
/// is kept in `kind()` for logging and tests.
#[derive(Debug, Clone, thiserror::Error)]
#[error("Failed to fetch weather data.")]
pub struct FetchError {
    #[source]
    kind: NetworkError,
}

impl FetchError {
    pub fn new(kind: NetworkError) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> &NetworkError {
        &self.kind
    }
}

impl From<FetchError> for AppError {
    fn from(_: FetchError) -> Self {
        AppError::Weather(WeatherError::FetchFailed)
    }
}

impl From<LocationError> for AppError {
    fn from(e: LocationError) -> Self {
        AppError::Weather(WeatherError::Location(e.to_string()))
    }
}
