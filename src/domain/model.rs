//! Persisted model documents.
//!
//! The correction model schema changed over time (bucket-average deltas, then
//! linear coefficients, then ridge coefficients over more features). Each
//! generation is one variant of [`CorrectionModel`], tagged by `version` in
//! the stored JSON.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, IntoEnumIterator};

use super::{Feature, FeatureScoreSet};

pub const BUCKET_AVERAGE_VERSION: &str = "bucket-average-v3";
pub const LINEAR_VERSION: &str = "linear-v4";
pub const RIDGE_VERSION: &str = "ridge-v5";
pub const PEAK_TIME_VERSION: &str = "3.2-monthly-robust";

/// Intercept plus one weight per feature; absent weights read as 0
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Coefficients {
    pub intercept: f64,
    #[serde(flatten)]
    pub weights: BTreeMap<Feature, f64>,
}

impl Coefficients {
    /// Build from a solved vector laid out as `[intercept, f1 .. fk]`
    pub fn from_solution(solution: &[f64]) -> Self {
        let intercept = solution.first().copied().unwrap_or(0.0);
        let weights = Feature::iter()
            .zip(solution.iter().skip(1).copied())
            .collect();
        Self { intercept, weights }
    }

    pub fn weight(&self, feature: Feature) -> f64 {
        self.weights.get(&feature).copied().unwrap_or(0.0)
    }

    /// `intercept + Σ weight_i × feature_i`
    pub fn evaluate(&self, scores: &FeatureScoreSet) -> f64 {
        Feature::iter()
            .zip(scores.feature_vector())
            .map(|(f, x)| self.weight(f) * x)
            .sum::<f64>()
            + self.intercept
    }
}

/// Linear or ridge regression over the residual
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RegressionModel {
    pub last_updated: DateTime<Utc>,
    pub coefficients: Coefficients,
    pub records_analyzed: usize,
    /// Regularization used during training (0 for plain least squares)
    #[serde(default)]
    pub lambda: f64,
}

/// Factors grouped by the legacy bucket-average model
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Display, EnumIter,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum BucketFactor {
    TempDiff,
    CloudCover,
    SuckEffect,
    WindSpeed,
    WindDirection,
}

impl BucketFactor {
    /// Group label of a scored day for this factor
    pub fn group(&self, scores: &FeatureScoreSet) -> &'static str {
        let raw = &scores.raw;
        match self {
            BucketFactor::TempDiff => match raw.temp_diff {
                v if v >= 6.0 => "high",
                v if v < 3.0 => "low",
                _ => "medium",
            },
            BucketFactor::CloudCover => match raw.cloud_cover {
                v if v <= 30.0 => "low",
                v if v > 70.0 => "high",
                _ => "medium",
            },
            BucketFactor::SuckEffect => match scores.suck_effect_score {
                v if v >= 1.0 => "high",
                v if v < 0.5 => "low",
                _ => "medium",
            },
            BucketFactor::WindSpeed => match raw.wind_speed {
                v if v >= 30.0 => "high",
                v if v < 15.0 => "low",
                _ => "medium",
            },
            BucketFactor::WindDirection => match raw.wind_direction {
                v if (45.0..=115.0).contains(&v) => "ideal",
                v if v > 115.0 && v < 225.0 => "bad",
                _ => "other",
            },
        }
    }
}

/// Legacy model: average residual per factor group plus a spread scale
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BucketAverageModel {
    pub last_updated: DateTime<Utc>,
    pub scaling_factor: f64,
    pub weights: BTreeMap<BucketFactor, BTreeMap<String, f64>>,
    pub records_analyzed: usize,
}

impl BucketAverageModel {
    /// Mean of the group deltas matching `scores`, or 0 when no group matches
    pub fn correction_for(&self, scores: &FeatureScoreSet) -> f64 {
        let deltas: Vec<f64> = self
            .weights
            .iter()
            .filter_map(|(factor, groups)| groups.get(factor.group(scores)).copied())
            .collect();
        if deltas.is_empty() {
            0.0
        } else {
            deltas.iter().sum::<f64>() / deltas.len() as f64
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "version")]
pub enum CorrectionModel {
    #[serde(rename = "bucket-average-v3")]
    BucketAverage(BucketAverageModel),
    #[serde(rename = "linear-v4")]
    Linear(RegressionModel),
    #[serde(rename = "ridge-v5")]
    Ridge(RegressionModel),
}

impl CorrectionModel {
    pub fn version(&self) -> &'static str {
        match self {
            CorrectionModel::BucketAverage(_) => BUCKET_AVERAGE_VERSION,
            CorrectionModel::Linear(_) => LINEAR_VERSION,
            CorrectionModel::Ridge(_) => RIDGE_VERSION,
        }
    }

    pub fn last_updated(&self) -> DateTime<Utc> {
        match self {
            CorrectionModel::BucketAverage(m) => m.last_updated,
            CorrectionModel::Linear(m) | CorrectionModel::Ridge(m) => m.last_updated,
        }
    }

    pub fn records_analyzed(&self) -> usize {
        match self {
            CorrectionModel::BucketAverage(m) => m.records_analyzed,
            CorrectionModel::Linear(m) | CorrectionModel::Ridge(m) => m.records_analyzed,
        }
    }

    pub fn coefficients(&self) -> Option<&Coefficients> {
        match self {
            CorrectionModel::BucketAverage(_) => None,
            CorrectionModel::Linear(m) | CorrectionModel::Ridge(m) => Some(&m.coefficients),
        }
    }
}

/// Average time of the daily wind peak per calendar month
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PeakTimeModel {
    pub version: String,
    pub last_updated: DateTime<Utc>,
    /// Month (1-12) to fractional hour of day
    #[serde(rename = "monthly_avg_peak_hour")]
    pub monthly_avg_peak_hour: BTreeMap<u32, f64>,
    pub records_analyzed: usize,
}

impl PeakTimeModel {
    pub fn peak_hour_for_month(&self, month: u32) -> Option<f64> {
        self.monthly_avg_peak_hour.get(&month).copied()
    }
}

/// Format a fractional hour as `HH:MM`
pub fn format_hour(hour: f64) -> String {
    let total_minutes = (hour.rem_euclid(24.0) * 60.0).round() as u32 % (24 * 60);
    format!("{:02}:{:02}", total_minutes / 60, total_minutes % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coefficients_from_solution() {
        let c = Coefficients::from_solution(&[1.0, 2.0, 3.0, 0.0, 0.0, 0.0, 0.0, 0.0, -1.0]);
        assert_eq!(c.intercept, 1.0);
        assert_eq!(c.weight(Feature::CloudCover), 2.0);
        assert_eq!(c.weight(Feature::TempDiff), 3.0);
        assert_eq!(c.weight(Feature::Precipitation), -1.0);

        let scores = FeatureScoreSet {
            cloud_cover_score: 1.0,
            temp_diff_score: 2.0,
            precipitation_score: 1.0,
            ..Default::default()
        };
        assert_eq!(c.evaluate(&scores), 1.0 + 2.0 + 6.0 - 1.0);
    }

    #[test]
    fn test_correction_model_is_tagged_by_version() {
        let model = CorrectionModel::Ridge(RegressionModel {
            last_updated: Utc::now(),
            coefficients: Coefficients::from_solution(&[0.5, 0.1]),
            records_analyzed: 12,
            lambda: 0.1,
        });
        let json = serde_json::to_value(&model).unwrap();
        assert_eq!(json["version"], RIDGE_VERSION);
        assert_eq!(json["coefficients"]["cloud_cover"], 0.1);

        let back: CorrectionModel = serde_json::from_value(json).unwrap();
        assert_eq!(back, model);
    }

    #[test]
    fn test_linear_model_without_lambda_deserializes() {
        let json = serde_json::json!({
            "version": "linear-v4",
            "lastUpdated": "2025-08-20T02:00:00Z",
            "coefficients": { "intercept": 1.2, "temp_diff": 0.3 },
            "recordsAnalyzed": 40
        });
        let model: CorrectionModel = serde_json::from_value(json).unwrap();
        assert_eq!(model.version(), LINEAR_VERSION);
        let c = model.coefficients().unwrap();
        assert_eq!(c.weight(Feature::TempDiff), 0.3);
        assert_eq!(c.weight(Feature::Humidity), 0.0);
    }

    #[test]
    fn test_bucket_correction_averages_matching_groups() {
        let mut weights = BTreeMap::new();
        weights.insert(
            BucketFactor::TempDiff,
            BTreeMap::from([("high".to_string(), 2.0), ("low".to_string(), -3.0)]),
        );
        weights.insert(
            BucketFactor::CloudCover,
            BTreeMap::from([("low".to_string(), 1.0)]),
        );
        let model = BucketAverageModel {
            last_updated: Utc::now(),
            scaling_factor: 1.0,
            weights,
            records_analyzed: 5,
        };

        let mut scores = FeatureScoreSet::default();
        scores.raw.temp_diff = 7.0;
        scores.raw.cloud_cover = 10.0;
        assert_eq!(model.correction_for(&scores), 1.5);

        scores.raw.cloud_cover = 50.0;
        assert_eq!(model.correction_for(&scores), 2.0);
    }

    #[test]
    fn test_format_hour() {
        assert_eq!(format_hour(15.5), "15:30");
        assert_eq!(format_hour(14.0), "14:00");
        assert_eq!(format_hour(23.999), "00:00");
    }
}
