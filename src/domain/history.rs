//! Forecast-vs-actual history documents and their upsert rules.

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

use super::FeatureScoreSet;

/// A predicted wind range in knots
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WindRange {
    pub min_knots: f64,
    pub max_knots: f64,
}

impl WindRange {
    pub fn new(min_knots: f64, max_knots: f64) -> Self {
        Self {
            min_knots,
            max_knots,
        }
    }

    pub fn average(&self) -> f64 {
        (self.min_knots + self.max_knots) / 2.0
    }

    pub fn spread(&self) -> f64 {
        self.max_knots - self.min_knots
    }

    pub fn half_spread(&self) -> f64 {
        self.spread() / 2.0
    }
}

impl std::fmt::Display for WindRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.0}-{:.0} kn", self.min_knots, self.max_knots)
    }
}

/// What was forecast for one date, with enough provenance to retrain later
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ForecastHistoryRecord {
    pub date: NaiveDate,
    pub scores: FeatureScoreSet,
    /// Table-only prediction, before any learned correction
    pub baseline_range: WindRange,
    pub corrected_range: WindRange,
    pub raw_average_knots: f64,
    pub corrected_average_knots: f64,
    #[serde(default)]
    pub correction_knots: f64,
    /// Version tag of the correction model used, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
}

/// Observed daily peak wind at the spot
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RealWindRecord {
    pub date: NaiveDate,
    /// Time of the peak sample, in the station's offset
    pub timestamp: DateTime<FixedOffset>,
    pub wind_speed_knots: f64,
    #[serde(default)]
    pub wind_gust_knots: f64,
    /// Mean speed from 15 min before to 60 min after the peak
    #[serde(default)]
    pub avg_wind_speed_around_peak: f64,
}

/// One raw station sample (5-minute cadence upstream)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StationObservation {
    pub timestamp: DateTime<FixedOffset>,
    pub wind_speed_knots: f64,
    #[serde(default)]
    pub wind_gust_knots: f64,
}

/// Insert or replace the record for `record.date`, keeping ascending date order.
pub fn upsert_forecast(history: &mut Vec<ForecastHistoryRecord>, record: ForecastHistoryRecord) {
    match history.binary_search_by_key(&record.date, |r| r.date) {
        Ok(idx) => history[idx] = record,
        Err(idx) => history.insert(idx, record),
    }
}

/// Merge a daily peak into the real-wind history.
///
/// A stored date is only replaced by a strictly stronger peak. Returns `true`
/// when the history changed.
pub fn merge_real_wind(history: &mut Vec<RealWindRecord>, record: RealWindRecord) -> bool {
    match history.binary_search_by_key(&record.date, |r| r.date) {
        Ok(idx) => {
            if record.wind_speed_knots > history[idx].wind_speed_knots {
                history[idx] = record;
                true
            } else {
                false
            }
        }
        Err(idx) => {
            history.insert(idx, record);
            true
        }
    }
}

/// Restore the one-per-date ascending invariant on a document read from a store.
/// Duplicate dates keep the last occurrence.
pub fn normalize_forecasts(records: Vec<ForecastHistoryRecord>) -> Vec<ForecastHistoryRecord> {
    let mut out = Vec::with_capacity(records.len());
    for record in records {
        upsert_forecast(&mut out, record);
    }
    out
}

/// Same as [`normalize_forecasts`], but duplicate dates keep the strongest peak.
pub fn normalize_real_wind(records: Vec<RealWindRecord>) -> Vec<RealWindRecord> {
    let mut out = Vec::with_capacity(records.len());
    for record in records {
        merge_real_wind(&mut out, record);
    }
    out
}
