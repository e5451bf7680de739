//! OpenWeatherMap HTTP client.

use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use skycast_core::{ApiConfig, AppError, ConfigError, NetworkError, ReqwestErrorExt, Units};
use tracing::instrument;
use url::Url;

use crate::types::{Coordinates, FetchError, ForecastData, GeocodingResponse, WeatherData};

/// Results requested from `/reverse`
const REVERSE_GEOCODE_LIMIT: u32 = 1;
/// Results requested from `/direct`
const SEARCH_LIMIT: u32 = 5;

#[derive(Debug, Clone)]
pub struct WeatherApi {
    client: Client,
    api_key: String,
    base_url: String,
    geo_url: String,
    units: Units,
}

impl WeatherApi {
    pub fn new(config: &ApiConfig) -> Result<Self, AppError> {
        for (field, value) in [("api.base_url", &config.base_url), ("api.geo_url", &config.geo_url)] {
            Url::parse(value)
                .map_err(|e| ConfigError::Invalid(format!("{}: {}", field, e)))?;
        }

        let mut builder = Client::builder();
        if config.request_timeout_secs > 0 {
            builder = builder.timeout(Duration::from_secs(config.request_timeout_secs));
        }
        let client = builder.build().map_err(|e| e.into_network_error())?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            geo_url: config.geo_url.trim_end_matches('/').to_string(),
            units: config.units,
        })
    }

    pub fn units(&self) -> Units {
        self.units
    }

    /// Build `<base>/<endpoint>?appid=...&<params>` with every value URL-encoded
    fn create_url(
        &self,
        base: &str,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<Url, FetchError> {
        let pairs = std::iter::once(("appid", self.api_key.as_str()))
            .chain(params.iter().map(|(k, v)| (*k, v.as_str())));

        Url::parse_with_params(&format!("{}/{}", base, endpoint), pairs)
            .map_err(|e| FetchError::new(NetworkError::InvalidResponse(e.to_string())))
    }

    fn coordinate_params(&self, coords: Coordinates) -> Vec<(&'static str, String)> {
        vec![("lat", coords.lat.to_string()), ("lon", coords.lon.to_string())]
    }

    /// GET and decode; the cause is logged here and only the generic error escapes
    async fn fetch_data<T: DeserializeOwned>(&self, url: Url) -> Result<T, FetchError> {
        match self.try_fetch(url).await {
            Ok(data) => Ok(data),
            Err(kind) => {
                tracing::error!(error = %kind, "Weather API request failed");
                Err(FetchError::new(kind))
            }
        }
    }

    async fn try_fetch<T: DeserializeOwned>(&self, url: Url) -> Result<T, NetworkError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| e.into_network_error())?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NetworkError::ServerError {
                status: status.as_u16(),
                message: format!("Weather API Error : {}", body),
            });
        }

        let bytes = response.bytes().await.map_err(|e| e.into_network_error())?;
        serde_json::from_slice(&bytes).map_err(|e| NetworkError::InvalidResponse(e.to_string()))
    }

    #[instrument(skip(self), level = "info")]
    pub async fn get_current_weather(&self, coords: Coordinates) -> Result<WeatherData, FetchError> {
        let mut params = self.coordinate_params(coords);
        params.push(("units", self.units.as_str().to_string()));
        let url = self.create_url(&self.base_url, "weather", &params)?;
        self.fetch_data(url).await
    }

    #[instrument(skip(self), level = "info")]
    pub async fn get_forecast(&self, coords: Coordinates) -> Result<ForecastData, FetchError> {
        let mut params = self.coordinate_params(coords);
        params.push(("units", self.units.as_str().to_string()));
        let url = self.create_url(&self.base_url, "forecast", &params)?;
        self.fetch_data(url).await
    }

    #[instrument(skip(self), level = "info")]
    pub async fn reverse_geocode(
        &self,
        coords: Coordinates,
    ) -> Result<Vec<GeocodingResponse>, FetchError> {
        let mut params = self.coordinate_params(coords);
        params.push(("limit", REVERSE_GEOCODE_LIMIT.to_string()));
        let url = self.create_url(&self.geo_url, "reverse", &params)?;
        self.fetch_data(url).await
    }

    #[instrument(skip(self), level = "info")]
    pub async fn search_locations(&self, query: &str) -> Result<Vec<GeocodingResponse>, FetchError> {
        let params = [
            ("q", query.to_string()),
            ("limit", SEARCH_LIMIT.to_string()),
        ];
        let url = self.create_url(&self.geo_url, "direct", &params)?;
        self.fetch_data(url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api() -> WeatherApi {
        WeatherApi::new(&ApiConfig {
            api_key: "k3y".to_string(),
            base_url: "https://api.example.com/data/2.5/".to_string(),
            ..ApiConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_create_url_injects_appid_first() {
        let api = api();
        let url = api
            .create_url(&api.base_url, "weather", &[("lat", "1.5".to_string())])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.example.com/data/2.5/weather?appid=k3y&lat=1.5"
        );
    }

    #[test]
    fn test_create_url_encodes_query() {
        let api = api();
        let url = api
            .create_url(&api.geo_url, "direct", &[("q", "São Paulo & co".to_string())])
            .unwrap();
        let q = url
            .query_pairs()
            .find(|(k, _)| k == "q")
            .map(|(_, v)| v.into_owned());
        assert_eq!(q.as_deref(), Some("São Paulo & co"));
        assert!(!url.as_str().contains(' '));
    }

    #[test]
    fn test_invalid_base_url_is_config_error() {
        let result = WeatherApi::new(&ApiConfig {
            base_url: "::nope".to_string(),
            ..ApiConfig::default()
        });
        assert!(matches!(result, Err(AppError::Config(ConfigError::Invalid(_)))));
    }
}
