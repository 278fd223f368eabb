//! Weather forecast integration (Open-Meteo)
//!
//! The forecast endpoint supplies daily and hourly land data at the spot; the
//! marine endpoint supplies sea-surface temperature at the nearest sea cell.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::WeatherConfig;
use crate::domain::{DailyWeather, HourlyWeather, SeaSurfaceSample, WeatherObservation};

const DAILY_FIELDS: &str =
    "cloud_cover_mean,temperature_2m_max,wind_speed_10m_max,wind_direction_10m_dominant";
const HOURLY_FIELDS: &str = "temperature_2m,cloud_cover,wind_speed_10m,wind_direction_10m,\
relative_humidity_2m,surface_pressure,precipitation_probability";
const MARINE_FIELDS: &str = "sea_surface_temperature";

/// Provider timestamps are local and carry no seconds
const HOURLY_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M";

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    /// Weather for every date in `[start, end]`
    async fn fetch(&self, start: NaiveDate, end: NaiveDate) -> Result<WeatherObservation>;
}

pub struct OpenMeteoClient {
    client: Client,
    config: WeatherConfig,
}

impl OpenMeteoClient {
    pub fn new(config: WeatherConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_seconds))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client, config })
    }

    async fn fetch_forecast(&self, start: NaiveDate, end: NaiveDate) -> Result<ForecastResponse> {
        let query = [
            ("latitude", self.config.latitude.to_string()),
            ("longitude", self.config.longitude.to_string()),
            ("daily", DAILY_FIELDS.to_string()),
            ("hourly", HOURLY_FIELDS.to_string()),
            ("timezone", self.config.timezone.clone()),
            ("start_date", start.to_string()),
            ("end_date", end.to_string()),
        ];
        debug!(url = %self.config.forecast_url, %start, %end, "fetching forecast");

        let response = self
            .client
            .get(&self.config.forecast_url)
            .query(&query)
            .send()
            .await
            .context("Failed to send request to forecast API")?;

        if !response.status().is_success() {
            error!(status = %response.status(), "forecast API returned error status");
            anyhow::bail!("Forecast API error: {}", response.status());
        }

        response
            .json()
            .await
            .context("Failed to parse forecast response")
    }

    async fn fetch_marine(&self, start: NaiveDate, end: NaiveDate) -> Result<MarineResponse> {
        let query = [
            ("latitude", self.config.sea_latitude.to_string()),
            ("longitude", self.config.sea_longitude.to_string()),
            ("hourly", MARINE_FIELDS.to_string()),
            ("timezone", self.config.timezone.clone()),
            ("start_date", start.to_string()),
            ("end_date", end.to_string()),
        ];

        let response = self
            .client
            .get(&self.config.marine_url)
            .query(&query)
            .send()
            .await
            .context("Failed to send request to marine API")?;

        if !response.status().is_success() {
            anyhow::bail!("Marine API error: {}", response.status());
        }

        response
            .json()
            .await
            .context("Failed to parse marine response")
    }
}

#[async_trait]
impl WeatherProvider for OpenMeteoClient {
    async fn fetch(&self, start: NaiveDate, end: NaiveDate) -> Result<WeatherObservation> {
        let (forecast, marine) =
            tokio::join!(self.fetch_forecast(start, end), self.fetch_marine(start, end));

        let mut observation = parse_forecast(forecast?)?;
        // Scoring falls back to a default sea temperature, so marine data is optional
        match marine.and_then(parse_marine) {
            Ok(samples) => observation.sea_surface = samples,
            Err(e) => warn!(error = %e, "sea surface temperature unavailable"),
        }

        info!(
            days = observation.daily.len(),
            hours = observation.hourly.len(),
            sea_samples = observation.sea_surface.len(),
            "fetched weather"
        );
        Ok(observation)
    }
}

// Open-Meteo response structures (columnar)
#[derive(Debug, Deserialize)]
pub(crate) struct ForecastResponse {
    daily: DailyColumns,
    #[serde(default)]
    hourly: HourlyColumns,
}

#[derive(Debug, Deserialize)]
struct DailyColumns {
    time: Vec<NaiveDate>,
    #[serde(default)]
    cloud_cover_mean: Vec<Option<f64>>,
    #[serde(default)]
    temperature_2m_max: Vec<Option<f64>>,
    #[serde(default)]
    wind_speed_10m_max: Vec<Option<f64>>,
    #[serde(default)]
    wind_direction_10m_dominant: Vec<Option<f64>>,
}

#[derive(Debug, Default, Deserialize)]
struct HourlyColumns {
    #[serde(default)]
    time: Vec<String>,
    #[serde(default)]
    temperature_2m: Vec<Option<f64>>,
    #[serde(default)]
    cloud_cover: Vec<Option<f64>>,
    #[serde(default)]
    wind_speed_10m: Vec<Option<f64>>,
    #[serde(default)]
    wind_direction_10m: Vec<Option<f64>>,
    #[serde(default)]
    relative_humidity_2m: Vec<Option<f64>>,
    #[serde(default)]
    surface_pressure: Vec<Option<f64>>,
    #[serde(default)]
    precipitation_probability: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MarineResponse {
    hourly: MarineColumns,
}

#[derive(Debug, Deserialize)]
struct MarineColumns {
    time: Vec<String>,
    #[serde(default)]
    sea_surface_temperature: Vec<Option<f64>>,
}

/// Missing trailing values in a column read as gaps
fn at(column: &[Option<f64>], i: usize) -> Option<f64> {
    column.get(i).copied().flatten()
}

fn parse_time(raw: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, HOURLY_TIME_FORMAT)
        .with_context(|| format!("Invalid hourly timestamp '{raw}'"))
}

pub(crate) fn parse_forecast(response: ForecastResponse) -> Result<WeatherObservation> {
    let d = response.daily;
    let daily = d
        .time
        .iter()
        .enumerate()
        .map(|(i, date)| DailyWeather {
            date: *date,
            cloud_cover_mean: at(&d.cloud_cover_mean, i),
            temperature_max: at(&d.temperature_2m_max, i),
            wind_speed_max: at(&d.wind_speed_10m_max, i),
            wind_direction_dominant: at(&d.wind_direction_10m_dominant, i),
        })
        .collect();

    let h = response.hourly;
    let hourly = h
        .time
        .iter()
        .enumerate()
        .map(|(i, raw)| {
            Ok(HourlyWeather {
                time: parse_time(raw)?,
                temperature: at(&h.temperature_2m, i),
                cloud_cover: at(&h.cloud_cover, i),
                wind_speed: at(&h.wind_speed_10m, i),
                wind_direction: at(&h.wind_direction_10m, i),
                humidity: at(&h.relative_humidity_2m, i),
                pressure: at(&h.surface_pressure, i),
                precipitation_probability: at(&h.precipitation_probability, i),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(WeatherObservation {
        daily,
        hourly,
        sea_surface: Vec::new(),
    })
}

pub(crate) fn parse_marine(response: MarineResponse) -> Result<Vec<SeaSurfaceSample>> {
    let m = response.hourly;
    m.time
        .iter()
        .enumerate()
        .map(|(i, raw)| {
            Ok(SeaSurfaceSample {
                time: parse_time(raw)?,
                temperature: at(&m.sea_surface_temperature, i),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const FORECAST_JSON: &str = r#"{
        "latitude": 38.86,
        "longitude": 22.76,
        "timezone": "Europe/Athens",
        "daily": {
            "time": ["2025-07-14", "2025-07-15"],
            "cloud_cover_mean": [12, null],
            "temperature_2m_max": [33.1, 31.4],
            "wind_speed_10m_max": [24.5, 18.0],
            "wind_direction_10m_dominant": [128, 95]
        },
        "hourly": {
            "time": ["2025-07-14T13:00", "2025-07-14T14:00"],
            "temperature_2m": [31.0, 32.2],
            "cloud_cover": [10, 5],
            "wind_speed_10m": [14.2, null],
            "wind_direction_10m": [130, 135],
            "relative_humidity_2m": [48, 45],
            "surface_pressure": [1009.1, 1008.7]
        }
    }"#;

    const MARINE_JSON: &str = r#"{
        "hourly": {
            "time": ["2025-07-14T12:00", "2025-07-14T13:00"],
            "sea_surface_temperature": [25.9, null]
        }
    }"#;

    #[test]
    fn test_parse_forecast_columns() {
        let response: ForecastResponse = serde_json::from_str(FORECAST_JSON).unwrap();
        let weather = parse_forecast(response).unwrap();

        assert_eq!(weather.daily.len(), 2);
        assert_eq!(weather.daily[0].cloud_cover_mean, Some(12.0));
        assert_eq!(weather.daily[1].cloud_cover_mean, None);
        assert_eq!(weather.daily[1].wind_direction_dominant, Some(95.0));

        assert_eq!(weather.hourly.len(), 2);
        assert_eq!(weather.hourly[0].hour(), 13);
        assert_eq!(weather.hourly[1].wind_speed, None);
        // Column absent from the response
        assert_eq!(weather.hourly[0].precipitation_probability, None);
    }

    #[test]
    fn test_parse_marine_keeps_gaps() {
        let response: MarineResponse = serde_json::from_str(MARINE_JSON).unwrap();
        let samples = parse_marine(response).unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].temperature, Some(25.9));
        assert_eq!(samples[1].temperature, None);
    }

    #[test]
    fn test_rejects_malformed_timestamp() {
        let json = r#"{"hourly": {"time": ["14/07/2025 13:00"], "sea_surface_temperature": [25.0]}}"#;
        let response: MarineResponse = serde_json::from_str(json).unwrap();
        assert!(parse_marine(response).is_err());
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn test_fetch_live() {
        let client = OpenMeteoClient::new(WeatherConfig::default()).unwrap();
        let today = chrono::Local::now().date_naive();
        let weather = client.fetch(today, today).await.unwrap();
        assert_eq!(weather.daily.len(), 1);
    }
}
