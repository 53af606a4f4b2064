//! OpenWeatherMap daily forecast source.
//!
//! # Example
//!
//! ```no_run
//! use weathernews_core::provider::{OpenWeatherClient, ProviderConfig};
//! use weathernews_core::ForecastSource;
//! use weathernews_types::{Location, dates};
//!
//! # async fn example() -> weathernews_core::Result<()> {
//! let client = OpenWeatherClient::new(ProviderConfig::new("my-api-key"))?;
//! let forecasts = client
//!     .fetch_forecasts(&Location::place("Dhaka,BD"), dates::today_utc())
//!     .await?;
//! println!("{} days", forecasts.len());
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use time::Date;
use tracing::debug;

use weathernews_types::{ForecastRecord, Location, NUM_DAYS, dates};

use crate::error::{Error, Result};
use crate::traits::ForecastSource;

/// Default API host.
pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org";

const DAILY_FORECAST_PATH: &str = "/data/2.5/forecast/daily";

/// Connection settings for [`OpenWeatherClient`].
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    /// Scheme and host, without a trailing slash.
    pub base_url: String,
    /// OpenWeatherMap API key.
    pub api_key: String,
    /// Transport timeout for one request.
    pub timeout: Duration,
    /// Number of days to request.
    pub days: u32,
}

impl ProviderConfig {
    /// Defaults for the public API with the given key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            timeout: Duration::from_secs(30),
            days: NUM_DAYS,
        }
    }

    /// Use a different API host.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Use a different request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// HTTP client for the OpenWeatherMap daily forecast endpoint.
#[derive(Debug, Clone)]
pub struct OpenWeatherClient {
    client: Client,
    config: ProviderConfig,
}

impl OpenWeatherClient {
    /// Create a client. Fails if the base URL is not http(s).
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Self::with_client(config, client)
    }

    /// Create a client around an existing reqwest client.
    pub fn with_client(mut config: ProviderConfig, client: Client) -> Result<Self> {
        config.base_url = config.base_url.trim_end_matches('/').to_string();
        if !config.base_url.starts_with("http://") && !config.base_url.starts_with("https://") {
            return Err(Error::invalid_config(format!(
                "provider URL must start with http:// or https://, got: {}",
                config.base_url
            )));
        }
        Ok(Self { client, config })
    }

    /// The endpoint URL, without query parameters.
    pub fn forecast_url(&self) -> String {
        format!("{}{}", self.config.base_url, DAILY_FORECAST_PATH)
    }

    /// Query parameters for `location`.
    ///
    /// Coordinates are sent as `lat`/`lon`, place names as `q`.
    pub fn query_params(&self, location: &Location) -> Vec<(&'static str, String)> {
        let mut params = match location {
            Location::Coordinates(c) => vec![
                ("lat", c.latitude.to_string()),
                ("lon", c.longitude.to_string()),
            ],
            Location::Place { name } => vec![("q", name.clone())],
        };
        params.extend([
            ("mode", "json".to_string()),
            ("units", "metric".to_string()),
            ("cnt", self.config.days.to_string()),
            ("appid", self.config.api_key.clone()),
        ]);
        params
    }
}

#[async_trait]
impl ForecastSource for OpenWeatherClient {
    async fn fetch_forecasts(&self, location: &Location, today: Date) -> Result<Vec<ForecastRecord>> {
        let url = self.forecast_url();
        debug!(url = %url, location = %location, "Fetching daily forecast");

        let response = self
            .client
            .get(&url)
            .query(&self.query_params(location))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = provider_message(&body).unwrap_or_else(|| status.to_string());
            return Err(Error::provider(i64::from(status.as_u16()), message));
        }

        decode_daily_forecast(&body, today)
    }
}

#[derive(Debug, Deserialize)]
struct DailyResponse {
    #[serde(default)]
    cod: Option<Value>,
    #[serde(default)]
    message: Option<Value>,
    #[serde(default)]
    list: Option<Vec<DailyEntry>>,
}

#[derive(Debug, Deserialize)]
struct DailyEntry {
    temp: Temperature,
    pressure: f64,
    humidity: f64,
    speed: f64,
    deg: f64,
    weather: Vec<WeatherEntry>,
}

#[derive(Debug, Deserialize)]
struct Temperature {
    min: f64,
    max: f64,
}

#[derive(Debug, Deserialize)]
struct WeatherEntry {
    id: i32,
}

/// Decode a daily forecast response body.
///
/// Entry *i* of `list` becomes the record for `today + i` days. A `cod`
/// other than 200 is a provider error.
pub fn decode_daily_forecast(body: &str, today: Date) -> Result<Vec<ForecastRecord>> {
    let response: DailyResponse = serde_json::from_str(body)?;

    if let Some(code) = response.cod.as_ref() {
        let code = parse_code(code)?;
        if code != 200 {
            let message = response
                .message
                .as_ref()
                .map(value_text)
                .unwrap_or_default();
            return Err(Error::provider(code, message));
        }
    }

    let list = response
        .list
        .ok_or_else(|| Error::decode("response has no `list`"))?;

    list.into_iter()
        .enumerate()
        .map(|(i, entry)| {
            let date = dates::add_days(today, i as i64).map_err(|e| Error::decode(e.to_string()))?;
            let condition_id = entry
                .weather
                .first()
                .map(|w| w.id)
                .ok_or_else(|| Error::decode(format!("entry {} has no weather", i)))?;

            Ok(
                ForecastRecord::new(date, condition_id, entry.temp.min, entry.temp.max)
                    .with_conditions(entry.humidity, entry.pressure, entry.speed, entry.deg),
            )
        })
        .collect()
}

// `cod` arrives as a number or a numeric string depending on the endpoint.
fn parse_code(value: &Value) -> Result<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| Error::decode(format!("invalid cod: {}", n))),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| Error::decode(format!("invalid cod: {:?}", s))),
        other => Err(Error::decode(format!("invalid cod: {}", other))),
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn provider_message(body: &str) -> Option<String> {
    let response: DailyResponse = serde_json::from_str(body).ok()?;
    response.message.as_ref().map(value_text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;
    use weathernews_types::Coordinates;

    fn entry(min: f64, max: f64, id: i32) -> Value {
        serde_json::json!({
            "dt": 1_714_564_800,
            "temp": {"day": 12.0, "min": min, "max": max, "night": 8.0},
            "pressure": 1013.0,
            "humidity": 81,
            "weather": [{"id": id, "main": "Rain", "description": "light rain", "icon": "10d"}],
            "speed": 4.6,
            "deg": 210,
            "clouds": 40
        })
    }

    #[test]
    fn test_decode_dates_entries_from_today() {
        let body = serde_json::json!({
            "cod": "200",
            "cnt": 3,
            "list": [entry(7.0, 14.0, 500), entry(6.5, 12.0, 800), entry(5.0, 11.0, 802)]
        })
        .to_string();

        let records = decode_daily_forecast(&body, date!(2024 - 02 - 28)).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].date, date!(2024 - 02 - 28));
        assert_eq!(records[1].date, date!(2024 - 02 - 29));
        assert_eq!(records[2].date, date!(2024 - 03 - 01));
        assert_eq!(records[0].condition_id, 500);
        assert_eq!(records[0].max_temp, 14.0);
        assert_eq!(records[0].min_temp, 7.0);
        assert_eq!(records[0].humidity, 81.0);
        assert_eq!(records[0].wind_direction_degrees, 210.0);
    }

    #[test]
    fn test_decode_numeric_cod() {
        let body = serde_json::json!({"cod": 200, "list": [entry(1.0, 2.0, 800)]}).to_string();
        assert_eq!(decode_daily_forecast(&body, date!(2024 - 01 - 01)).unwrap().len(), 1);
    }

    #[test]
    fn test_decode_error_cod() {
        let body = r#"{"cod":"404","message":"city not found"}"#;
        let err = decode_daily_forecast(body, date!(2024 - 01 - 01)).unwrap_err();
        match err {
            Error::Provider { code, message } => {
                assert_eq!(code, 404);
                assert_eq!(message, "city not found");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_decode_empty_list_is_ok_and_empty() {
        let body = r#"{"cod":"200","cnt":0,"list":[]}"#;
        assert!(decode_daily_forecast(body, date!(2024 - 01 - 01)).unwrap().is_empty());
    }

    #[test]
    fn test_decode_missing_fields() {
        let body = r#"{"cod":"200","list":[{"temp":{"min":1.0}}]}"#;
        let err = decode_daily_forecast(body, date!(2024 - 01 - 01)).unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn test_decode_missing_weather_entry() {
        let mut e = entry(1.0, 2.0, 800);
        e["weather"] = serde_json::json!([]);
        let body = serde_json::json!({"cod": "200", "list": [e]}).to_string();
        let err = decode_daily_forecast(&body, date!(2024 - 01 - 01)).unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn test_decode_garbage() {
        let err = decode_daily_forecast("<html>", date!(2024 - 01 - 01)).unwrap_err();
        assert!(err.is_fetch_failure());
    }

    #[test]
    fn test_query_params_for_place() {
        let client = OpenWeatherClient::new(ProviderConfig::new("key")).unwrap();
        let params = client.query_params(&Location::place("Dhaka,BD"));
        assert_eq!(
            params,
            vec![
                ("q", "Dhaka,BD".to_string()),
                ("mode", "json".to_string()),
                ("units", "metric".to_string()),
                ("cnt", "14".to_string()),
                ("appid", "key".to_string()),
            ]
        );
    }

    #[test]
    fn test_query_params_for_coordinates() {
        let client = OpenWeatherClient::new(ProviderConfig::new("key")).unwrap();
        let location = Location::Coordinates(Coordinates::new(23.81, 90.41).unwrap());
        let params = client.query_params(&location);
        assert_eq!(params[0], ("lat", "23.81".to_string()));
        assert_eq!(params[1], ("lon", "90.41".to_string()));
        assert!(params.iter().all(|(k, _)| *k != "q"));
    }

    #[test]
    fn test_forecast_url_trims_trailing_slash() {
        let config = ProviderConfig::new("key").with_base_url("http://localhost:8080/");
        let client = OpenWeatherClient::new(config).unwrap();
        assert_eq!(client.forecast_url(), "http://localhost:8080/data/2.5/forecast/daily");
    }

    #[test]
    fn test_rejects_non_http_url() {
        let config = ProviderConfig::new("key").with_base_url("ftp://example.com");
        let err = OpenWeatherClient::new(config).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }
}
