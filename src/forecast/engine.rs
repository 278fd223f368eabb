use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, warn};

use super::correction::{CorrectedPrediction, CorrectionApplier};
use super::features::{FeatureScorer, Suitability};
use super::weather::WeatherProvider;
use crate::domain::{upsert_forecast, FeatureScoreSet, ForecastHistoryRecord};
use crate::error::{CoreError, CoreResult};
use crate::ml::PredictedPeak;
use crate::repo::Repositories;

/// Scored and corrected forecast for one date
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyForecast {
    pub date: NaiveDate,
    pub scores: FeatureScoreSet,
    pub prediction: CorrectedPrediction,
    pub suitability: Suitability,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peak: Option<PredictedPeak>,
}

impl DailyForecast {
    fn history_record(&self) -> ForecastHistoryRecord {
        ForecastHistoryRecord {
            date: self.date,
            scores: self.scores.clone(),
            baseline_range: self.prediction.baseline,
            corrected_range: self.prediction.corrected,
            raw_average_knots: self.prediction.baseline_average,
            corrected_average_knots: self.prediction.corrected_average,
            correction_knots: self.prediction.correction,
            model_version: self.prediction.model_version.map(str::to_string),
        }
    }
}

pub struct ForecastEngine {
    provider: Arc<dyn WeatherProvider>,
    scorer: FeatureScorer,
    applier: CorrectionApplier,
    repos: Repositories,
}

impl ForecastEngine {
    pub fn new(
        provider: Arc<dyn WeatherProvider>,
        scorer: FeatureScorer,
        applier: CorrectionApplier,
        repos: Repositories,
    ) -> Self {
        Self {
            provider,
            scorer,
            applier,
            repos,
        }
    }

    /// Score, correct and record every date in `[start, end]`
    pub async fn score_and_predict(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> CoreResult<Vec<DailyForecast>> {
        if end < start {
            return Err(CoreError::InvalidRange { start, end });
        }

        let weather = self
            .provider
            .fetch(start, end)
            .await
            .map_err(CoreError::Provider)?;
        let model = self.repos.correction_model().await?;
        if model.is_none() {
            warn!("no correction model stored, using the baseline only");
        }
        let peak_model = self.repos.peak_time_model().await?;

        let labels = &self.scorer.config().labels;
        let forecasts: Vec<DailyForecast> = self
            .scorer
            .score_all(&weather)
            .into_iter()
            .filter(|(date, _)| (start..=end).contains(date))
            .map(|(date, scores)| {
                let prediction = self.applier.apply(&scores, model.as_ref());
                let suitability = labels.label(scores.aggregate_score, prediction.corrected.max_knots);
                let peak = peak_model.as_ref().and_then(|m| m.predicted_peak(date));
                DailyForecast {
                    date,
                    scores,
                    prediction,
                    suitability,
                    peak,
                }
            })
            .collect();

        if !forecasts.is_empty() {
            let mut history = self.repos.forecast_history().await?;
            for forecast in &forecasts {
                upsert_forecast(&mut history, forecast.history_record());
            }
            self.repos.save_forecast_history(&history).await?;
        }

        info!(
            %start,
            %end,
            days = forecasts.len(),
            model = model.as_ref().map(|m| m.version()),
            "forecast recorded"
        );
        Ok(forecasts)
    }
}
