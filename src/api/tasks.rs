//! Task entry points: each call returns a [`TaskResponse`], never panics on
//! bad data, and only writes to the store when it has something new.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::response::TaskResponse;
use crate::config::Config;
use crate::domain::{PeakTimeModel, RealWindRecord, StationObservation};
use crate::error::{CoreError, CoreResult};
use crate::forecast::{
    BaselinePredictor, CorrectionApplier, DailyForecast, FeatureScorer, ForecastEngine,
    WeatherProvider,
};
use crate::ml::{
    ModelTrainer, PeakTimeEstimator, PeakTimeOutcome, TrainingDataset, TrainingOutcome,
    TrainingReport,
};
use crate::observations::{merge_into, MergeSummary, ObservationAggregator};
use crate::repo::Repositories;

/// Which correction model generation to train
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum CorrectionKind {
    #[default]
    Ridge,
    BucketAverage,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    #[serde(flatten)]
    pub summary: MergeSummary,
    pub records: Vec<RealWindRecord>,
}

/// Sub-results of a nightly run, in execution order
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NightlyReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ingest: Option<TaskResponse<IngestReport>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correction: Option<TaskResponse<TrainingReport>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peak_time: Option<TaskResponse<PeakTimeModel>>,
}

pub struct TaskService {
    repos: Repositories,
    engine: ForecastEngine,
    trainer: ModelTrainer,
    peak_time: PeakTimeEstimator,
    aggregator: ObservationAggregator,
    correction_kind: CorrectionKind,
}

impl TaskService {
    pub fn new(
        config: &Config,
        repos: Repositories,
        provider: Arc<dyn WeatherProvider>,
    ) -> CoreResult<Self> {
        config
            .check()
            .map_err(|e| CoreError::InvalidConfig(format!("{e:#}")))?;
        let baseline = BaselinePredictor::new(config.baseline.table.clone())?;
        let engine = ForecastEngine::new(
            provider,
            FeatureScorer::new(config.scoring.clone()),
            CorrectionApplier::new(baseline, config.correction.clone()),
            repos.clone(),
        );
        Ok(Self {
            repos,
            engine,
            trainer: ModelTrainer::new(config.correction.clone()),
            peak_time: PeakTimeEstimator::new(config.peak_time.clone()),
            aggregator: ObservationAggregator::from_config(&config.peak_time),
            correction_kind: CorrectionKind::default(),
        })
    }

    /// Model generation trained by [`Self::run_nightly`]
    pub fn with_correction_kind(mut self, kind: CorrectionKind) -> Self {
        self.correction_kind = kind;
        self
    }

    pub async fn train_correction_model(&self, kind: CorrectionKind) -> TaskResponse<TrainingReport> {
        self.try_train_correction(kind)
            .await
            .unwrap_or_else(|e| {
                error!(error = %e, ?kind, "correction model training failed");
                TaskResponse::failure("Correction model training failed", e)
            })
    }

    pub async fn train_peak_time_model(&self) -> TaskResponse<PeakTimeModel> {
        self.try_train_peak_time().await.unwrap_or_else(|e| {
            error!(error = %e, "peak-time model training failed");
            TaskResponse::failure("Peak-time model training failed", e)
        })
    }

    pub async fn score_and_predict(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> TaskResponse<Vec<DailyForecast>> {
        match self.engine.score_and_predict(start, end).await {
            Ok(forecasts) => TaskResponse::success(
                format!("Forecast recorded for {} day(s)", forecasts.len()),
                forecasts,
            ),
            Err(e) => {
                error!(error = %e, %start, %end, "forecast failed");
                TaskResponse::failure("Forecast failed", e)
            }
        }
    }

    pub async fn ingest_observations(
        &self,
        observations: Vec<StationObservation>,
    ) -> TaskResponse<IngestReport> {
        self.try_ingest(observations).await.unwrap_or_else(|e| {
            error!(error = %e, "observation ingest failed");
            TaskResponse::failure("Observation ingest failed", e)
        })
    }

    /// Drop the most recent observed day, e.g. a bad station reading
    pub async fn delete_last_real_wind(&self) -> TaskResponse<RealWindRecord> {
        self.try_delete_last_real_wind().await.unwrap_or_else(|e| {
            error!(error = %e, "deleting last real wind record failed");
            TaskResponse::failure("Deleting the last real wind record failed", e)
        })
    }

    /// Ingest (when observations are supplied), retrain the correction model,
    /// then retrain the peak-time model. Stops at the first hard failure and
    /// returns what completed so far.
    pub async fn run_nightly(
        &self,
        observations: Option<Vec<StationObservation>>,
    ) -> TaskResponse<NightlyReport> {
        info!("starting nightly tasks");
        let mut report = NightlyReport::default();

        if let Some(observations) = observations {
            let ingest = self.ingest_observations(observations).await;
            let ok = ingest.success;
            report.ingest = Some(ingest);
            if !ok {
                return TaskResponse::failure("Nightly tasks aborted", "observation ingest failed")
                    .with_data(report);
            }
        }

        let correction = self.train_correction_model(self.correction_kind).await;
        let ok = correction.success;
        report.correction = Some(correction);
        if !ok {
            return TaskResponse::failure("Nightly tasks aborted", "correction training failed")
                .with_data(report);
        }

        match self.try_train_peak_time().await {
            // An unsuccessful response here only means there is no history yet
            Ok(peak_time) => report.peak_time = Some(peak_time),
            Err(e) => {
                error!(error = %e, "peak-time model training failed");
                report.peak_time = Some(TaskResponse::failure("Peak-time model training failed", &e));
                return TaskResponse::failure("Nightly tasks aborted", e).with_data(report);
            }
        }

        info!("nightly tasks completed");
        TaskResponse::success("All nightly tasks completed", report)
    }

    async fn try_train_correction(
        &self,
        kind: CorrectionKind,
    ) -> CoreResult<TaskResponse<TrainingReport>> {
        let forecasts = self.repos.forecast_history().await?;
        let real_wind = self.repos.real_wind().await?;
        let dataset = TrainingDataset::join(&forecasts, &real_wind);

        let outcome = match kind {
            CorrectionKind::Ridge => self.trainer.train_ridge(&dataset)?,
            CorrectionKind::BucketAverage => self.trainer.train_bucket_average(&dataset),
        };

        match outcome {
            TrainingOutcome::Insufficient { matched, required } => {
                Ok(TaskResponse::no_op(format!(
                    "Not enough matched days to train ({matched} of {required} required); model unchanged"
                )))
            }
            TrainingOutcome::Trained(report) => {
                self.repos.save_correction_model(&report.model).await?;
                Ok(TaskResponse::success(
                    format!(
                        "Correction model {} trained on {} day(s)",
                        report.model.version(),
                        report.matched
                    ),
                    *report,
                ))
            }
        }
    }

    async fn try_train_peak_time(&self) -> CoreResult<TaskResponse<PeakTimeModel>> {
        let real_wind = self.repos.real_wind().await?;
        match self.peak_time.fit(&real_wind) {
            PeakTimeOutcome::NoData => Ok(TaskResponse::failure(
                "No real wind history available to train the peak-time model",
                "no data",
            )),
            PeakTimeOutcome::Trained(model) => {
                self.repos.save_peak_time_model(&model).await?;
                Ok(TaskResponse::success(
                    format!(
                        "Peak-time model trained on {} record(s)",
                        model.records_analyzed
                    ),
                    model,
                ))
            }
        }
    }

    async fn try_delete_last_real_wind(&self) -> CoreResult<TaskResponse<RealWindRecord>> {
        // Read back in ascending date order
        let mut history = self.repos.real_wind().await?;
        let Some(removed) = history.pop() else {
            return Ok(TaskResponse::no_op("No records to delete."));
        };
        self.repos.save_real_wind(&history).await?;

        info!(date = %removed.date, remaining = history.len(), "deleted last real wind record");
        Ok(TaskResponse::success(
            format!("Successfully deleted the last entry for date: {}", removed.date),
            removed,
        ))
    }

    async fn try_ingest(
        &self,
        observations: Vec<StationObservation>,
    ) -> CoreResult<TaskResponse<IngestReport>> {
        let records = self.aggregator.daily_maxima(&observations);
        if records.is_empty() {
            warn!(samples = observations.len(), "no usable observations");
            return Ok(TaskResponse::no_op("No new records found"));
        }

        let mut history = self.repos.real_wind().await?;
        let summary = merge_into(&mut history, records.clone());
        if summary.changed() {
            self.repos.save_real_wind(&history).await?;
        }

        Ok(TaskResponse::success(
            format!(
                "Processing finished. {} record(s) added, {} updated",
                summary.added, summary.updated
            ),
            IngestReport { summary, records },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::domain::{Feature, FeatureScoreSet, ForecastHistoryRecord, WindRange};
    use crate::forecast::weather::MockWeatherProvider;
    use crate::repo::{DocumentStore, MemoryStore, MockDocumentStore};
    use chrono::{DateTime, Duration};
    use serde_json::Value;
    use strum::IntoEnumIterator;

    fn date(i: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 7, 1).unwrap() + Duration::days(i)
    }

    fn forecast(i: i64, scores: FeatureScoreSet) -> ForecastHistoryRecord {
        ForecastHistoryRecord {
            date: date(i),
            scores,
            baseline_range: WindRange::new(10.5, 13.5),
            corrected_range: WindRange::new(10.5, 13.5),
            raw_average_knots: 12.0,
            corrected_average_knots: 12.0,
            correction_knots: 0.0,
            model_version: None,
        }
    }

    fn real(i: i64, knots: f64) -> RealWindRecord {
        let d = date(i);
        RealWindRecord {
            date: d,
            timestamp: DateTime::parse_from_rfc3339(&format!("{d}T15:00:00+03:00")).unwrap(),
            wind_speed_knots: knots,
            wind_gust_knots: 0.0,
            avg_wind_speed_around_peak: 0.0,
        }
    }

    fn service_with(store: Arc<dyn DocumentStore>, config: &Config) -> TaskService {
        let repos = Repositories::with_store(store, StoreConfig::default());
        TaskService::new(config, repos, Arc::new(MockWeatherProvider::new())).unwrap()
    }

    fn mock_store(forecasts: Vec<ForecastHistoryRecord>, real_wind: Vec<RealWindRecord>) -> MockDocumentStore {
        let keys = StoreConfig::default();
        let forecasts = serde_json::to_value(forecasts).unwrap();
        let real_wind = serde_json::to_value(real_wind).unwrap();
        let mut store = MockDocumentStore::new();
        store.expect_get().returning(move |key| {
            Ok(if key == keys.forecast_history_key {
                Some(forecasts.clone())
            } else if key == keys.real_wind_key {
                Some(real_wind.clone())
            } else {
                None
            })
        });
        store
    }

    #[tokio::test]
    async fn test_insufficient_data_succeeds_without_writing() {
        let forecasts = (0..5).map(|i| forecast(i, FeatureScoreSet::default())).collect();
        let real_wind = (0..5).map(|i| real(i, 15.0)).collect();
        let mut store = mock_store(forecasts, real_wind);
        store.expect_set().times(0);

        let service = service_with(Arc::new(store), &Config::default());
        let response = service.train_correction_model(CorrectionKind::Ridge).await;

        assert!(response.success);
        assert!(response.data.is_none());
        assert!(response.message.contains("5 of 9"));
    }

    #[tokio::test]
    async fn test_collinear_data_fails_without_writing() {
        // Every day has identical scores, so all feature columns are constant
        let forecasts = (0..12).map(|i| forecast(i, FeatureScoreSet::default())).collect();
        let real_wind = (0..12).map(|i| real(i, 12.0 + i as f64)).collect();
        let mut store = mock_store(forecasts, real_wind);
        store.expect_set().times(0);

        let mut config = Config::default();
        config.correction.ridge_lambda = 0.0;
        let service = service_with(Arc::new(store), &config);
        let response = service.train_correction_model(CorrectionKind::Ridge).await;

        assert!(!response.success);
        assert!(response.error.unwrap().contains("data collinear"));
    }

    #[tokio::test]
    async fn test_trained_model_is_written_once() {
        let forecasts = (0..12)
            .map(|i| {
                let mut scores = FeatureScoreSet::default();
                for (j, f) in Feature::iter().enumerate() {
                    scores.set_score(f, ((i * 7 + j as i64 * 3) % 5) as f64 + (i * j as i64) as f64 * 0.01);
                }
                forecast(i, scores)
            })
            .collect();
        let real_wind = (0..12).map(|i| real(i, 12.0 + (i % 4) as f64)).collect();
        let mut store = mock_store(forecasts, real_wind);
        store
            .expect_set()
            .withf(|key, value| key.to_string() == "prediction_model_v5" && value["version"] == "ridge-v5")
            .times(1)
            .returning(|_, _| Ok(()));

        let service = service_with(Arc::new(store), &Config::default());
        let response = service.train_correction_model(CorrectionKind::Ridge).await;
        assert!(response.success, "{:?}", response.error);
        assert_eq!(response.data.unwrap().matched, 12);
    }

    #[tokio::test]
    async fn test_store_failure_is_reported() {
        let mut store = MockDocumentStore::new();
        store
            .expect_get()
            .returning(|_| Err(anyhow::anyhow!("connection refused")));
        let service = service_with(Arc::new(store), &Config::default());

        let response = service.train_peak_time_model().await;
        assert!(!response.success);
        assert!(response.error.unwrap().contains("connection refused"));
    }

    #[tokio::test]
    async fn test_peak_time_without_history_is_no_data() {
        let store = Arc::new(MemoryStore::new());
        let service = service_with(store.clone(), &Config::default());

        let response = service.train_peak_time_model().await;
        assert!(!response.success);
        assert_eq!(response.error.as_deref(), Some("no data"));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_delete_last_real_wind_on_empty_history_writes_nothing() {
        let mut store = mock_store(Vec::new(), Vec::new());
        store.expect_set().times(0);
        let service = service_with(Arc::new(store), &Config::default());

        let response = service.delete_last_real_wind().await;
        assert!(response.success);
        assert_eq!(response.message, "No records to delete.");
        assert!(response.data.is_none());
    }

    #[tokio::test]
    async fn test_delete_last_real_wind_removes_latest_date() {
        let store = Arc::new(MemoryStore::new());
        let service = service_with(store.clone(), &Config::default());
        let repos = Repositories::with_store(store.clone(), StoreConfig::default());
        // Stored out of order; the latest date is removed regardless
        repos
            .save_real_wind(&[real(2, 14.0), real(5, 19.0), real(3, 16.0)])
            .await
            .unwrap();

        let response = service.delete_last_real_wind().await;
        assert!(response.success);
        assert_eq!(response.data.unwrap().date, date(5));
        assert!(response.message.ends_with("2025-07-06"));

        let remaining = repos.real_wind().await.unwrap();
        assert_eq!(
            remaining.iter().map(|r| r.date).collect::<Vec<_>>(),
            vec![date(2), date(3)]
        );
    }

    #[test]
    fn test_rejects_config_that_fails_checks() {
        let mut config = Config::default();
        config.correction.min_scaling = 2.0;
        config.correction.max_scaling = 1.0;
        let repos = Repositories::with_store(Arc::new(MemoryStore::new()), StoreConfig::default());
        let result = TaskService::new(&config, repos, Arc::new(MockWeatherProvider::new()));
        assert!(matches!(result, Err(CoreError::InvalidConfig(_))));

        let mut config = Config::default();
        config.correction.max_correction_knots = f64::NAN;
        let repos = Repositories::with_store(Arc::new(MemoryStore::new()), StoreConfig::default());
        let result = TaskService::new(&config, repos, Arc::new(MockWeatherProvider::new()));
        assert!(matches!(result, Err(CoreError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_nightly_ingests_then_trains() {
        let store = Arc::new(MemoryStore::new());
        let service = service_with(store.clone(), &Config::default());
        let observations = vec![
            StationObservation {
                timestamp: DateTime::parse_from_rfc3339("2025-07-02T14:00:00+03:00").unwrap(),
                wind_speed_knots: 18.0,
                wind_gust_knots: 22.0,
            },
            StationObservation {
                timestamp: DateTime::parse_from_rfc3339("2025-07-02T15:30:00+03:00").unwrap(),
                wind_speed_knots: 21.0,
                wind_gust_knots: 26.0,
            },
        ];

        let response = service.run_nightly(Some(observations)).await;
        assert!(response.success);
        let report = response.data.unwrap();
        assert_eq!(report.ingest.unwrap().data.unwrap().summary.added, 1);
        // One observed day and no forecasts: nothing to train the correction on
        assert!(report.correction.unwrap().data.is_none());
        let peak = report.peak_time.unwrap().data.unwrap();
        assert_eq!(peak.peak_hour_for_month(7), Some(15.5));

        let stored: Value = store.get("max_wind_history").await.unwrap().unwrap();
        assert_eq!(stored.as_array().unwrap().len(), 1);
        assert!(store.get("prediction_model_v5").await.unwrap().is_none());
    }
}
