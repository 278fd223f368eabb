//! Raw weather input as delivered by the forecast provider.
//!
//! Every numeric field is optional because providers emit `null` for gaps.
//! Scoring coerces gaps to neutral values instead of rejecting the day.

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

/// Daily aggregates for one calendar date
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DailyWeather {
    pub date: NaiveDate,
    /// Mean cloud cover over the day (%)
    pub cloud_cover_mean: Option<f64>,
    /// Maximum 2 m air temperature (°C)
    pub temperature_max: Option<f64>,
    /// Maximum 10 m wind speed (km/h)
    pub wind_speed_max: Option<f64>,
    /// Dominant 10 m wind direction (degrees)
    pub wind_direction_dominant: Option<f64>,
}

/// One hourly forecast sample, in the location's local time
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HourlyWeather {
    pub time: NaiveDateTime,
    pub temperature: Option<f64>,
    pub cloud_cover: Option<f64>,
    /// km/h
    pub wind_speed: Option<f64>,
    /// degrees
    pub wind_direction: Option<f64>,
    /// relative humidity (%)
    pub humidity: Option<f64>,
    /// surface pressure (hPa)
    pub pressure: Option<f64>,
    /// precipitation probability (%)
    pub precipitation_probability: Option<f64>,
}

impl HourlyWeather {
    pub fn date(&self) -> NaiveDate {
        self.time.date()
    }

    pub fn hour(&self) -> u32 {
        self.time.hour()
    }
}

/// Hourly sea-surface temperature sample from the marine provider
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeaSurfaceSample {
    pub time: NaiveDateTime,
    pub temperature: Option<f64>,
}

/// Weather for a date range: daily rows, hourly rows and marine samples
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WeatherObservation {
    pub daily: Vec<DailyWeather>,
    pub hourly: Vec<HourlyWeather>,
    pub sea_surface: Vec<SeaSurfaceSample>,
}

impl WeatherObservation {
    /// Hourly samples belonging to `date`
    pub fn hours_of(&self, date: NaiveDate) -> impl Iterator<Item = &HourlyWeather> {
        self.hourly.iter().filter(move |h| h.date() == date)
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.daily.iter().map(|d| d.date).collect()
    }
}
