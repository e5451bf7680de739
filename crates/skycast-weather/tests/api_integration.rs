//! Integration tests for WeatherApi using wiremock.

use skycast_core::{ApiConfig, NetworkError, Units};
use skycast_weather::{Coordinates, WeatherApi};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config(server: &MockServer) -> ApiConfig {
    ApiConfig {
        api_key: "test-key".to_string(),
        base_url: format!("{}/data/2.5", server.uri()),
        geo_url: format!("{}/geo/1.0", server.uri()),
        units: Units::Metric,
        request_timeout_secs: 5,
    }
}

fn london() -> Coordinates {
    Coordinates::new(51.5074, -0.1278)
}

fn current_weather() -> serde_json::Value {
    serde_json::json!({
        "coord": { "lat": 51.5074, "lon": -0.1278 },
        "weather": [{ "id": 803, "main": "Clouds", "description": "broken clouds", "icon": "04d" }],
        "main": {
            "temp": 14.3, "feels_like": 13.6, "temp_min": 12.9, "temp_max": 15.8,
            "pressure": 1015, "humidity": 72
        },
        "wind": { "speed": 5.1, "deg": 240 },
        "sys": { "country": "GB", "sunrise": 1709275525, "sunset": 1709315420 },
        "timezone": 0,
        "name": "London",
        "dt": 1709301600
    })
}

fn geocode(name: &str, lat: f64, lon: f64, country: &str) -> serde_json::Value {
    serde_json::json!({
        "name": name,
        "local_names": { "en": name },
        "lat": lat,
        "lon": lon,
        "country": country
    })
}

#[tokio::test]
async fn test_current_weather_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .and(query_param("appid", "test-key"))
        .and(query_param("lat", "51.5074"))
        .and(query_param("lon", "-0.1278"))
        .and(query_param("units", "metric"))
        .respond_with(ResponseTemplate::new(200).set_body_json(current_weather()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let api = WeatherApi::new(&test_config(&mock_server)).unwrap();
    let weather = api.get_current_weather(london()).await.unwrap();

    assert_eq!(weather.name, "London");
    assert_eq!(weather.sys.country, "GB");
    assert_eq!(weather.main.humidity, 72.0);
    assert_eq!(weather.condition().map(|c| c.main.as_str()), Some("Clouds"));
}

#[tokio::test]
async fn test_forecast_success() {
    let mock_server = MockServer::start().await;

    let slot = |dt: i64, temp: f64| {
        serde_json::json!({
            "dt": dt,
            "main": { "temp": temp, "feels_like": temp, "temp_min": temp - 1.0, "temp_max": temp + 1.0, "humidity": 60 },
            "weather": [{ "id": 500, "main": "Rain", "description": "light rain", "icon": "10d" }],
            "wind": { "speed": 3.2 },
            "dt_txt": ""
        })
    };

    Mock::given(method("GET"))
        .and(path("/data/2.5/forecast"))
        .and(query_param("units", "metric"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "list": [slot(1709301600, 10.0), slot(1709312400, 12.0)],
            "city": { "name": "London", "country": "GB", "timezone": 0 }
        })))
        .mount(&mock_server)
        .await;

    let api = WeatherApi::new(&test_config(&mock_server)).unwrap();
    let forecast = api.get_forecast(london()).await.unwrap();

    assert_eq!(forecast.list.len(), 2);
    assert_eq!(forecast.city.name, "London");
    assert_eq!(forecast.list[1].main.temp_max, 13.0);
}

#[tokio::test]
async fn test_reverse_geocode_requests_single_result() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/geo/1.0/reverse"))
        .and(query_param("limit", "1"))
        .and(query_param("appid", "test-key"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!([geocode("London", 51.5073, -0.1276, "GB")])),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let api = WeatherApi::new(&test_config(&mock_server)).unwrap();
    let places = api.reverse_geocode(london()).await.unwrap();

    assert_eq!(places.len(), 1);
    assert_eq!(places[0].display_name(), "London, GB");
}

#[tokio::test]
async fn test_search_sends_query_and_limit() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/geo/1.0/direct"))
        .and(query_param("q", "San José"))
        .and(query_param("limit", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            geocode("San José", 9.9325, -84.0796, "CR"),
            geocode("San Jose", 37.3362, -121.8906, "US"),
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let api = WeatherApi::new(&test_config(&mock_server)).unwrap();
    let places = api.search_locations("San José").await.unwrap();

    assert_eq!(places.len(), 2);
    assert_eq!(places[1].country, "US");
}

#[tokio::test]
async fn test_error_status_yields_generic_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Invalid API key"))
        .mount(&mock_server)
        .await;

    let api = WeatherApi::new(&test_config(&mock_server)).unwrap();
    let err = api.get_current_weather(london()).await.unwrap_err();

    assert_eq!(err.to_string(), "Failed to fetch weather data.");
    match err.kind() {
        NetworkError::ServerError { status, message } => {
            assert_eq!(*status, 401);
            assert!(message.contains("Invalid API key"));
        }
        other => panic!("unexpected error kind: {:?}", other),
    }
}

#[tokio::test]
async fn test_malformed_body_yields_generic_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data/2.5/forecast"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&mock_server)
        .await;

    let api = WeatherApi::new(&test_config(&mock_server)).unwrap();
    let err = api.get_forecast(london()).await.unwrap_err();

    assert_eq!(err.to_string(), "Failed to fetch weather data.");
    assert!(matches!(err.kind(), NetworkError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_unreachable_server_yields_generic_error() {
    let config = ApiConfig {
        base_url: "http://127.0.0.1:9/data/2.5".to_string(),
        ..ApiConfig::default()
    };

    let api = WeatherApi::new(&config).unwrap();
    let err = api.get_current_weather(london()).await.unwrap_err();

    assert_eq!(err.to_string(), "Failed to fetch weather data.");
}
