//! Monthly peak-time estimation
//!
//! Learns at what time of day the thermal peaks, per calendar month, from the
//! observed daily maxima.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use tracing::{debug, info, warn};

use crate::config::PeakTimeConfig;
use crate::domain::{format_hour, PeakTimeModel, RealWindRecord, PEAK_TIME_VERSION};

/// Fractional hour of day in the timestamp's own offset
pub fn peak_hour(timestamp: &DateTime<FixedOffset>) -> f64 {
    timestamp.hour() as f64 + timestamp.minute() as f64 / 60.0
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

#[derive(Debug, Clone, PartialEq)]
pub enum PeakTimeOutcome {
    /// Nothing to learn from; no model should be written
    NoData,
    Trained(PeakTimeModel),
}

/// Predicted time of the daily peak for a given date
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PredictedPeak {
    pub month: u32,
    pub hour: f64,
    /// `HH:MM`
    pub time: String,
}

impl PeakTimeModel {
    pub fn predicted_peak(&self, date: NaiveDate) -> Option<PredictedPeak> {
        let month = date.month();
        self.peak_hour_for_month(month).map(|hour| PredictedPeak {
            month,
            hour,
            time: format_hour(hour),
        })
    }
}

pub struct PeakTimeEstimator {
    config: PeakTimeConfig,
}

impl PeakTimeEstimator {
    pub fn new(config: PeakTimeConfig) -> Self {
        Self { config }
    }

    pub fn fit(&self, records: &[RealWindRecord]) -> PeakTimeOutcome {
        if records.is_empty() {
            warn!("no real wind history, peak-time model not trained");
            return PeakTimeOutcome::NoData;
        }

        let mut by_month: BTreeMap<u32, Vec<f64>> = BTreeMap::new();
        for record in records {
            by_month
                .entry(record.timestamp.month())
                .or_default()
                .push(peak_hour(&record.timestamp));
        }

        let monthly_avg_peak_hour = by_month
            .into_iter()
            .map(|(month, hours)| {
                let avg = round4(self.filtered_mean(&hours));
                debug!(month, samples = hours.len(), avg, "monthly peak hour");
                (month, avg)
            })
            .collect::<BTreeMap<_, _>>();

        info!(
            months = monthly_avg_peak_hour.len(),
            records = records.len(),
            "peak-time model trained"
        );

        PeakTimeOutcome::Trained(PeakTimeModel {
            version: PEAK_TIME_VERSION.to_string(),
            last_updated: Utc::now(),
            monthly_avg_peak_hour,
            records_analyzed: records.len(),
        })
    }

    /// Mean of `hours` after discarding points more than `outlier_sigma`
    /// standard deviations from the mean.
    ///
    /// Each point is tested against the mean and standard deviation of the
    /// other points in the sample, so a single outlier cannot widen its own
    /// acceptance band. The deviation is floored at `min_sigma_hours`. Small
    /// samples, or a filter that would discard everything, give the plain mean.
    pub fn filtered_mean(&self, hours: &[f64]) -> f64 {
        let plain = hours.mean();
        if hours.len() < self.config.min_samples_for_filter {
            return plain;
        }

        let kept: Vec<f64> = hours
            .iter()
            .enumerate()
            .filter(|&(i, &hour)| self.is_inlier(hour, hours, i))
            .map(|(_, &hour)| hour)
            .collect();
        if kept.len() < hours.len() {
            debug!(
                discarded = hours.len() - kept.len(),
                samples = hours.len(),
                "discarded peak-time outliers"
            );
        }

        if kept.is_empty() {
            plain
        } else {
            kept.mean()
        }
    }

    fn is_inlier(&self, hour: f64, hours: &[f64], index: usize) -> bool {
        let others: Vec<f64> = hours
            .iter()
            .enumerate()
            .filter(|&(j, _)| j != index)
            .map(|(_, &h)| h)
            .collect();
        let centre = others.iter().mean();
        // NaN for a single remaining point; `max` then yields the floor
        let sigma = others.iter().std_dev().max(self.config.min_sigma_hours);
        if !(sigma > 0.0) {
            return true;
        }
        (hour - centre).abs() <= self.config.outlier_sigma * sigma
    }
}

impl Default for PeakTimeEstimator {
    fn default() -> Self {
        Self::new(PeakTimeConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn record(date: &str, time: &str) -> RealWindRecord {
        RealWindRecord {
            date: date.parse().unwrap(),
            timestamp: DateTime::parse_from_rfc3339(&format!("{date}T{time}:00+03:00")).unwrap(),
            wind_speed_knots: 20.0,
            wind_gust_knots: 0.0,
            avg_wind_speed_around_peak: 0.0,
        }
    }

    #[test]
    fn test_outlier_is_excluded() {
        let estimator = PeakTimeEstimator::default();
        let hours = [13.0, 14.0, 14.0, 15.0, 3.0];
        let mean = estimator.filtered_mean(&hours);
        assert!((mean - 14.0).abs() < 1e-12);
        // Naive mean would be 11.8
        assert!((hours.mean() - 11.8).abs() < 1e-12);
    }

    #[test]
    fn test_late_peak_in_tight_cluster_is_kept() {
        let estimator = PeakTimeEstimator::default();
        // 14:00, 14:00, 14:05, 14:05, 16:00
        let hours = [14.0, 14.0, 14.0 + 5.0 / 60.0, 14.0 + 5.0 / 60.0, 16.0];
        let mean = estimator.filtered_mean(&hours);
        assert!((mean - hours.mean()).abs() < 1e-12);
        assert!((round4(mean) - 14.4333).abs() < 1e-12);
    }

    #[test]
    fn test_zero_sigma_floor_filters_on_raw_spread() {
        let estimator = PeakTimeEstimator::new(PeakTimeConfig {
            min_sigma_hours: 0.0,
            ..PeakTimeConfig::default()
        });
        let hours = [14.0, 14.0, 14.0 + 5.0 / 60.0, 14.0 + 5.0 / 60.0, 16.0];
        let mean = estimator.filtered_mean(&hours);
        assert!((mean - (14.0 + 2.5 / 60.0)).abs() < 1e-9);
    }

    #[rstest]
    #[case(&[14.0], 14.0)]
    #[case(&[13.0, 16.0], 14.5)]
    #[case(&[15.0, 15.0, 15.0], 15.0)]
    fn test_small_or_flat_samples_use_plain_mean(#[case] hours: &[f64], #[case] expected: f64) {
        let mean = PeakTimeEstimator::default().filtered_mean(hours);
        assert!((mean - expected).abs() < 1e-12);
    }

    #[test]
    fn test_fit_groups_by_month_in_local_offset() {
        let records = vec![
            record("2025-07-01", "14:30"),
            record("2025-07-02", "15:30"),
            record("2024-07-03", "14:00"),
            record("2025-08-01", "16:20"),
        ];
        let PeakTimeOutcome::Trained(model) = PeakTimeEstimator::default().fit(&records) else {
            panic!("expected a model");
        };

        assert_eq!(model.records_analyzed, 4);
        assert_eq!(model.version, PEAK_TIME_VERSION);
        assert!((model.monthly_avg_peak_hour[&7] - 14.6667).abs() < 1e-12);
        assert!((model.monthly_avg_peak_hour[&8] - 16.3333).abs() < 1e-12);
        assert!(model.peak_hour_for_month(1).is_none());

        let peak = model
            .predicted_peak(NaiveDate::from_ymd_opt(2026, 8, 15).unwrap())
            .unwrap();
        assert_eq!(peak.time, "16:20");
    }

    #[test]
    fn test_empty_history_is_no_data() {
        assert_eq!(PeakTimeEstimator::default().fit(&[]), PeakTimeOutcome::NoData);
    }

    #[test]
    fn test_model_json_shape() {
        let PeakTimeOutcome::Trained(model) =
            PeakTimeEstimator::default().fit(&[record("2025-07-01", "14:30")])
        else {
            panic!("expected a model");
        };
        let json = serde_json::to_value(&model).unwrap();
        assert_eq!(json["monthly_avg_peak_hour"]["7"], 14.5);
        assert_eq!(json["recordsAnalyzed"], 1);

        let back: PeakTimeModel = serde_json::from_value(json).unwrap();
        assert_eq!(back, model);
    }
}
