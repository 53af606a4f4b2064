//! Tests for the OpenWeatherMap client against a mock HTTP server.

use std::time::Duration;

use time::macros::date;
use weathernews_core::{Error, ForecastSource, OpenWeatherClient, ProviderConfig};
use weathernews_types::{Coordinates, Location};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const FORECAST_PATH: &str = "/data/2.5/forecast/daily";

fn daily_response(days: usize) -> serde_json::Value {
    let list: Vec<_> = (0..days)
        .map(|i| {
            serde_json::json!({
                "dt": 1_714_564_800 + i * 86_400,
                "temp": {"day": 11.0, "min": 4.0 + i as f64, "max": 12.0 + i as f64},
                "pressure": 1009.5,
                "humidity": 72,
                "weather": [{"id": 500, "main": "Rain", "description": "light rain"}],
                "speed": 5.1,
                "deg": 240
            })
        })
        .collect();
    serde_json::json!({
        "city": {"name": "Bergen", "country": "NO"},
        "cod": "200",
        "message": 0.05,
        "cnt": days,
        "list": list
    })
}

fn client(server: &MockServer) -> OpenWeatherClient {
    let config = ProviderConfig::new("test-key")
        .with_base_url(server.uri())
        .with_timeout(Duration::from_secs(5));
    OpenWeatherClient::new(config).expect("Failed to create client")
}

#[tokio::test]
async fn test_fetch_by_place_sends_expected_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(FORECAST_PATH))
        .and(query_param("q", "Bergen,NO"))
        .and(query_param("mode", "json"))
        .and(query_param("units", "metric"))
        .and(query_param("cnt", "14"))
        .and(query_param("appid", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(daily_response(14)))
        .expect(1)
        .mount(&server)
        .await;

    let forecasts = client(&server)
        .fetch_forecasts(&Location::place("Bergen,NO"), date!(2024 - 05 - 01))
        .await
        .unwrap();

    assert_eq!(forecasts.len(), 14);
    assert_eq!(forecasts[0].date, date!(2024 - 05 - 01));
    assert_eq!(forecasts[13].date, date!(2024 - 05 - 14));
    assert_eq!(forecasts[2].min_temp, 6.0);
    assert_eq!(forecasts[2].max_temp, 14.0);
    assert_eq!(forecasts[0].condition_id, 500);
}

#[tokio::test]
async fn test_fetch_by_coordinates_uses_lat_lon() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(FORECAST_PATH))
        .and(query_param("lat", "60.39"))
        .and(query_param("lon", "5.32"))
        .respond_with(ResponseTemplate::new(200).set_body_json(daily_response(2)))
        .expect(1)
        .mount(&server)
        .await;

    let location = Location::Coordinates(Coordinates::new(60.39, 5.32).unwrap());
    let forecasts = client(&server)
        .fetch_forecasts(&location, date!(2024 - 05 - 01))
        .await
        .unwrap();
    assert_eq!(forecasts.len(), 2);
}

#[tokio::test]
async fn test_not_found_maps_to_provider_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(FORECAST_PATH))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_json(serde_json::json!({"cod": "404", "message": "city not found"})),
        )
        .mount(&server)
        .await;

    let err = client(&server)
        .fetch_forecasts(&Location::place("Atlantis"), date!(2024 - 05 - 01))
        .await
        .unwrap_err();

    match err {
        Error::Provider { code, message } => {
            assert_eq!(code, 404);
            assert_eq!(message, "city not found");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_error_cod_in_ok_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(FORECAST_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"cod": 401, "message": "Invalid API key"})),
        )
        .mount(&server)
        .await;

    let err = client(&server)
        .fetch_forecasts(&Location::place("Bergen,NO"), date!(2024 - 05 - 01))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Provider { code: 401, .. }));
}

#[tokio::test]
async fn test_server_error_is_fetch_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(FORECAST_PATH))
        .respond_with(ResponseTemplate::new(503).set_body_string("Service Unavailable"))
        .mount(&server)
        .await;

    let err = client(&server)
        .fetch_forecasts(&Location::place("Bergen,NO"), date!(2024 - 05 - 01))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Provider { code: 503, .. }));
    assert!(err.is_fetch_failure());
}

#[tokio::test]
async fn test_malformed_body_is_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(FORECAST_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = client(&server)
        .fetch_forecasts(&Location::place("Bergen,NO"), date!(2024 - 05 - 01))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Decode(_)));
}

#[tokio::test]
async fn test_timeout_is_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(FORECAST_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(daily_response(1))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let config = ProviderConfig::new("test-key")
        .with_base_url(server.uri())
        .with_timeout(Duration::from_millis(200));
    let err = OpenWeatherClient::new(config)
        .unwrap()
        .fetch_forecasts(&Location::place("Bergen,NO"), date!(2024 - 05 - 01))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Transport(_)));
}
