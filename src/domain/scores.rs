use serde::{Deserialize, Serialize};
use strum::{Display, EnumCount, EnumIter, IntoEnumIterator};

/// Scored weather factors, in design-matrix column order
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumIter,
    EnumCount,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Feature {
    CloudCover,
    TempDiff,
    WindSpeed,
    WindDirection,
    SuckEffect,
    PressureDrop,
    Humidity,
    Precipitation,
}

/// Raw inputs behind the scores, kept for display and bucket-average models
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct RawFeatureValues {
    /// Daytime mean cloud cover (%)
    pub cloud_cover: f64,
    pub air_temperature: f64,
    pub sea_temperature: f64,
    /// Land minus sea temperature (°C)
    pub temp_diff: f64,
    /// Daily max wind speed (km/h)
    pub wind_speed: f64,
    /// Afternoon vector-mean direction (degrees, 0..360)
    pub wind_direction: f64,
    /// Afternoon minus morning max wind speed (km/h)
    pub wind_increase: f64,
    /// Morning minus afternoon mean pressure (hPa)
    pub pressure_drop: f64,
    /// Afternoon mean relative humidity (%)
    pub humidity: f64,
    /// Max precipitation probability over the day (%)
    pub precipitation_probability: f64,
}

/// Per-date factor scores; the sum of the eight sub-scores is the aggregate
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct FeatureScoreSet {
    pub cloud_cover_score: f64,
    pub temp_diff_score: f64,
    pub wind_speed_score: f64,
    pub wind_direction_score: f64,
    pub suck_effect_score: f64,
    pub pressure_drop_score: f64,
    pub humidity_score: f64,
    pub precipitation_score: f64,
    pub aggregate_score: f64,
    pub raw: RawFeatureValues,
}

impl FeatureScoreSet {
    pub fn score(&self, feature: Feature) -> f64 {
        match feature {
            Feature::CloudCover => self.cloud_cover_score,
            Feature::TempDiff => self.temp_diff_score,
            Feature::WindSpeed => self.wind_speed_score,
            Feature::WindDirection => self.wind_direction_score,
            Feature::SuckEffect => self.suck_effect_score,
            Feature::PressureDrop => self.pressure_drop_score,
            Feature::Humidity => self.humidity_score,
            Feature::Precipitation => self.precipitation_score,
        }
    }

    pub fn set_score(&mut self, feature: Feature, value: f64) {
        let slot = match feature {
            Feature::CloudCover => &mut self.cloud_cover_score,
            Feature::TempDiff => &mut self.temp_diff_score,
            Feature::WindSpeed => &mut self.wind_speed_score,
            Feature::WindDirection => &mut self.wind_direction_score,
            Feature::SuckEffect => &mut self.suck_effect_score,
            Feature::PressureDrop => &mut self.pressure_drop_score,
            Feature::Humidity => &mut self.humidity_score,
            Feature::Precipitation => &mut self.precipitation_score,
        };
        *slot = value;
    }

    /// Sub-scores in [`Feature`] order, non-finite values coerced to 0
    pub fn feature_vector(&self) -> Vec<f64> {
        Feature::iter()
            .map(|f| {
                let v = self.score(f);
                if v.is_finite() {
                    v
                } else {
                    0.0
                }
            })
            .collect()
    }

    /// Recompute `aggregate_score` from the sub-scores
    pub fn recompute_aggregate(&mut self) {
        self.aggregate_score = self.feature_vector().iter().sum();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_order_matches_vector() {
        let mut scores = FeatureScoreSet::default();
        for (i, feature) in Feature::iter().enumerate() {
            scores.set_score(feature, i as f64);
        }
        assert_eq!(
            scores.feature_vector(),
            vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]
        );
        assert_eq!(Feature::COUNT, 8);
    }

    #[test]
    fn test_aggregate_ignores_non_finite() {
        let mut scores = FeatureScoreSet {
            cloud_cover_score: 5.0,
            temp_diff_score: f64::NAN,
            wind_direction_score: -8.0,
            ..Default::default()
        };
        scores.recompute_aggregate();
        assert_eq!(scores.aggregate_score, -3.0);
    }

    #[test]
    fn test_feature_names() {
        assert_eq!(Feature::SuckEffect.to_string(), "suck_effect");
        assert_eq!(
            serde_json::to_string(&Feature::PressureDrop).unwrap(),
            "\"pressure_drop\""
        );
    }

    #[test]
    fn test_missing_fields_deserialize_as_zero() {
        let scores: FeatureScoreSet =
            serde_json::from_str(r#"{"cloudCoverScore": 4.5, "aggregateScore": 4.5}"#).unwrap();
        assert_eq!(scores.cloud_cover_score, 4.5);
        assert_eq!(scores.humidity_score, 0.0);
    }
}
