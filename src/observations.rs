//! Reduction of raw station samples to one peak record per day

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use serde::Serialize;
use tracing::{debug, info};

use crate::config::PeakTimeConfig;
use crate::domain::{RealWindRecord, StationObservation};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeSummary {
    pub added: usize,
    pub updated: usize,
    pub unchanged: usize,
}

impl MergeSummary {
    pub fn changed(&self) -> bool {
        self.added + self.updated > 0
    }
}

pub struct ObservationAggregator {
    before: Duration,
    after: Duration,
}

impl ObservationAggregator {
    pub fn new(before: Duration, after: Duration) -> Self {
        Self { before, after }
    }

    pub fn from_config(cfg: &PeakTimeConfig) -> Self {
        Self::new(
            Duration::minutes(cfg.window_before_minutes),
            Duration::minutes(cfg.window_after_minutes),
        )
    }

    /// Strongest sample per local calendar date, ascending by date.
    ///
    /// Ties keep the earliest sample seen. Samples with a non-finite speed are
    /// ignored.
    pub fn daily_maxima(&self, observations: &[StationObservation]) -> Vec<RealWindRecord> {
        let mut by_date: BTreeMap<NaiveDate, Vec<&StationObservation>> = BTreeMap::new();
        for obs in observations.iter().filter(|o| o.wind_speed_knots.is_finite()) {
            by_date.entry(obs.timestamp.date_naive()).or_default().push(obs);
        }

        by_date
            .into_iter()
            .filter_map(|(date, samples)| {
                let peak = samples.iter().copied().reduce(|max, current| {
                    if current.wind_speed_knots > max.wind_speed_knots {
                        current
                    } else {
                        max
                    }
                })?;

                let start = peak.timestamp - self.before;
                let end = peak.timestamp + self.after;
                let around: Vec<f64> = samples
                    .iter()
                    .filter(|o| o.timestamp >= start && o.timestamp <= end)
                    .map(|o| o.wind_speed_knots)
                    .collect();
                let avg = if around.is_empty() {
                    peak.wind_speed_knots
                } else {
                    around.iter().sum::<f64>() / around.len() as f64
                };

                debug!(%date, peak = peak.wind_speed_knots, samples = samples.len(), "daily maximum");
                Some(RealWindRecord {
                    date,
                    timestamp: peak.timestamp,
                    wind_speed_knots: peak.wind_speed_knots,
                    wind_gust_knots: peak.wind_gust_knots,
                    avg_wind_speed_around_peak: (avg * 100.0).round() / 100.0,
                })
            })
            .collect()
    }
}

impl Default for ObservationAggregator {
    fn default() -> Self {
        Self::from_config(&PeakTimeConfig::default())
    }
}

/// Merge daily records into `history` under the strictly-stronger rule
pub fn merge_into(history: &mut Vec<RealWindRecord>, records: Vec<RealWindRecord>) -> MergeSummary {
    let mut summary = MergeSummary::default();
    for record in records {
        let existed = history
            .binary_search_by_key(&record.date, |r| r.date)
            .is_ok();
        match (crate::domain::merge_real_wind(history, record), existed) {
            (true, false) => summary.added += 1,
            (true, true) => summary.updated += 1,
            (false, _) => summary.unchanged += 1,
        }
    }
    info!(
        added = summary.added,
        updated = summary.updated,
        unchanged = summary.unchanged,
        "merged daily maxima"
    );
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    fn obs(ts: &str, knots: f64) -> StationObservation {
        StationObservation {
            timestamp: DateTime::parse_from_rfc3339(ts).unwrap(),
            wind_speed_knots: knots,
            wind_gust_knots: knots + 3.0,
        }
    }

    #[test]
    fn test_daily_maximum_and_window_average() {
        let observations = vec![
            obs("2025-08-16T13:40:00+03:00", 19.0),
            obs("2025-08-16T13:45:00+03:00", 18.0),
            obs("2025-08-16T14:00:00+03:00", 22.0),
            obs("2025-08-16T14:30:00+03:00", 20.0),
            obs("2025-08-16T15:00:00+03:00", 17.0),
            obs("2025-08-16T15:05:00+03:00", 10.0),
            obs("2025-08-17T12:00:00+03:00", 11.0),
        ];
        let records = ObservationAggregator::default().daily_maxima(&observations);

        assert_eq!(records.len(), 2);
        let first = &records[0];
        assert_eq!(first.date.to_string(), "2025-08-16");
        assert_eq!(first.wind_speed_knots, 22.0);
        assert_eq!(first.wind_gust_knots, 25.0);
        // 13:45 .. 15:00 inclusive: 18, 22, 20, 17
        assert_eq!(first.avg_wind_speed_around_peak, 19.25);
        assert_eq!(records[1].avg_wind_speed_around_peak, 11.0);
    }

    #[test]
    fn test_empty_window_falls_back_to_peak_speed() {
        // A window that starts after the peak cannot contain it
        let aggregator = ObservationAggregator::new(Duration::minutes(-30), Duration::minutes(60));
        let records = aggregator.daily_maxima(&[
            obs("2025-08-16T14:00:00+03:00", 22.0),
            obs("2025-08-16T14:10:00+03:00", 18.0),
        ]);
        assert_eq!(records[0].avg_wind_speed_around_peak, 22.0);

        let json = serde_json::to_value(&records).unwrap();
        let back: Vec<RealWindRecord> = serde_json::from_value(json).unwrap();
        assert_eq!(back, records);
    }

    #[test]
    fn test_tie_keeps_first_sample() {
        let observations = vec![
            obs("2025-08-16T14:00:00+03:00", 20.0),
            obs("2025-08-16T16:00:00+03:00", 20.0),
        ];
        let records = ObservationAggregator::default().daily_maxima(&observations);
        assert_eq!(records[0].timestamp.to_rfc3339(), "2025-08-16T14:00:00+03:00");
    }

    #[test]
    fn test_groups_by_local_date() {
        // 01:30 local is still the previous day in UTC
        let observations = vec![obs("2025-08-17T01:30:00+03:00", 9.0)];
        let records = ObservationAggregator::default().daily_maxima(&observations);
        assert_eq!(records[0].date.to_string(), "2025-08-17");
    }

    #[test]
    fn test_merge_summary() {
        let aggregator = ObservationAggregator::default();
        let mut history = aggregator.daily_maxima(&[obs("2025-08-16T14:00:00+03:00", 20.0)]);

        let incoming = aggregator.daily_maxima(&[
            obs("2025-08-16T15:00:00+03:00", 18.0),
            obs("2025-08-17T15:00:00+03:00", 14.0),
        ]);
        let summary = merge_into(&mut history, incoming);
        assert_eq!(summary, MergeSummary { added: 1, updated: 0, unchanged: 1 });
        assert!(summary.changed());

        let incoming = aggregator.daily_maxima(&[obs("2025-08-17T16:00:00+03:00", 24.0)]);
        let summary = merge_into(&mut history, incoming);
        assert_eq!(summary.updated, 1);
        assert_eq!(history[1].wind_speed_knots, 24.0);

        let summary = merge_into(&mut history, Vec::new());
        assert!(!summary.changed());
    }
}
