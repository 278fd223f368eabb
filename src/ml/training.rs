//! Correction model training
//!
//! Joins forecast history with observed peaks and fits the residual
//! `real - raw baseline average` against the eight factor scores.

use std::collections::BTreeMap;

use chrono::{NaiveDate, Utc};
use nalgebra::{DMatrix, DVector};
use serde::Serialize;
use strum::EnumCount;
use tracing::{debug, info, warn};

use super::linalg::solve_regularized_normal_equations;
use crate::config::CorrectionConfig;
use crate::domain::{
    Coefficients, CorrectionModel, Feature, FeatureScoreSet, ForecastHistoryRecord,
    RealWindRecord, RegressionModel,
};
use crate::error::CoreResult;
use crate::forecast::metrics::ForecastMetrics;

/// One matched day
#[derive(Debug, Clone)]
pub struct TrainingPair {
    pub date: NaiveDate,
    pub scores: FeatureScoreSet,
    /// Uncorrected baseline average that was forecast for the day
    pub baseline_average: f64,
    pub baseline_spread: f64,
    pub real_knots: f64,
}

impl TrainingPair {
    pub fn residual(&self) -> f64 {
        self.real_knots - self.baseline_average
    }
}

/// Matched pairs ordered by date, plus join bookkeeping
#[derive(Debug, Clone, Default)]
pub struct TrainingDataset {
    pub pairs: Vec<TrainingPair>,
    /// Observed days with no forecast on record
    pub unmatched_observations: usize,
    /// Forecast days still waiting for an observation
    pub pending_forecasts: usize,
}

impl TrainingDataset {
    /// Join by date. The order of either input does not affect the result.
    pub fn join(forecasts: &[ForecastHistoryRecord], real_wind: &[RealWindRecord]) -> Self {
        let mut real: BTreeMap<NaiveDate, f64> = BTreeMap::new();
        for r in real_wind.iter().filter(|r| r.wind_speed_knots.is_finite()) {
            let entry = real.entry(r.date).or_insert(r.wind_speed_knots);
            *entry = entry.max(r.wind_speed_knots);
        }

        let mut by_date: BTreeMap<NaiveDate, &ForecastHistoryRecord> = BTreeMap::new();
        for f in forecasts {
            by_date.insert(f.date, f);
        }

        let mut pairs = Vec::new();
        let mut pending_forecasts = 0;
        for (date, forecast) in &by_date {
            match real.get(date) {
                Some(&real_knots) => pairs.push(TrainingPair {
                    date: *date,
                    scores: forecast.scores.clone(),
                    baseline_average: forecast.raw_average_knots,
                    baseline_spread: forecast.baseline_range.spread(),
                    real_knots,
                }),
                None => pending_forecasts += 1,
            }
        }
        let unmatched_observations = real.keys().filter(|d| !by_date.contains_key(d)).count();

        Self {
            pairs,
            unmatched_observations,
            pending_forecasts,
        }
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn residuals(&self) -> Vec<f64> {
        self.pairs.iter().map(TrainingPair::residual).collect()
    }

    /// Rows `[1, f1 .. fk]` and the residual target
    pub fn design(&self) -> (DMatrix<f64>, DVector<f64>) {
        let cols = Feature::COUNT + 1;
        let rows: Vec<Vec<f64>> = self.pairs.iter().map(|p| p.scores.feature_vector()).collect();
        let x = DMatrix::from_fn(self.len(), cols, |r, c| {
            if c == 0 {
                1.0
            } else {
                rows[r][c - 1]
            }
        });
        let y = DVector::from_vec(self.residuals());
        (x, y)
    }
}

/// Baseline vs corrected accuracy on the training set
#[derive(Debug, Clone, Serialize)]
pub struct TrainingMetrics {
    pub baseline: ForecastMetrics,
    pub corrected: ForecastMetrics,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingReport {
    pub model: CorrectionModel,
    pub matched: usize,
    pub unmatched_observations: usize,
    pub pending_forecasts: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<TrainingMetrics>,
}

#[derive(Debug, Clone)]
pub enum TrainingOutcome {
    /// Not enough matched days; nothing should be persisted
    Insufficient { matched: usize, required: usize },
    Trained(Box<TrainingReport>),
}

pub struct ModelTrainer {
    config: CorrectionConfig,
}

impl ModelTrainer {
    pub fn new(config: CorrectionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CorrectionConfig {
        &self.config
    }

    /// Minimum matched days for the regression: one per coefficient
    pub fn required_samples() -> usize {
        Feature::COUNT + 1
    }

    /// Fit a ridge correction model over the residuals
    pub fn train_ridge(&self, dataset: &TrainingDataset) -> CoreResult<TrainingOutcome> {
        let required = Self::required_samples();
        if dataset.len() < required {
            info!(
                matched = dataset.len(),
                required, "not enough matched days for the correction model"
            );
            return Ok(TrainingOutcome::Insufficient {
                matched: dataset.len(),
                required,
            });
        }

        let (x, y) = dataset.design();
        let solution = solve_regularized_normal_equations(&x, &y, self.config.ridge_lambda)
            .map_err(|e| {
                warn!(error = %e, matched = dataset.len(), "correction training failed");
                e
            })?;

        let coefficients = Coefficients::from_solution(solution.as_slice());
        debug!(?coefficients, "solved correction coefficients");

        let model = CorrectionModel::Ridge(RegressionModel {
            last_updated: Utc::now(),
            coefficients,
            records_analyzed: dataset.len(),
            lambda: self.config.ridge_lambda,
        });

        let metrics = self.in_sample_metrics(dataset, |scores| {
            model
                .coefficients()
                .map_or(0.0, |c| c.evaluate(scores))
        });

        info!(
            matched = dataset.len(),
            unmatched = dataset.unmatched_observations,
            pending = dataset.pending_forecasts,
            "correction model trained"
        );

        Ok(TrainingOutcome::Trained(Box::new(TrainingReport {
            model,
            matched: dataset.len(),
            unmatched_observations: dataset.unmatched_observations,
            pending_forecasts: dataset.pending_forecasts,
            metrics,
        })))
    }

    /// Compare raw baseline and clamped-corrected averages against observations
    pub(crate) fn in_sample_metrics(
        &self,
        dataset: &TrainingDataset,
        correction: impl Fn(&FeatureScoreSet) -> f64,
    ) -> Option<TrainingMetrics> {
        let bound = self.config.max_correction_knots;
        let actual: Vec<f64> = dataset.pairs.iter().map(|p| p.real_knots).collect();
        let baseline: Vec<f64> = dataset.pairs.iter().map(|p| p.baseline_average).collect();
        let corrected: Vec<f64> = dataset
            .pairs
            .iter()
            .map(|p| {
                let c = correction(&p.scores);
                let c = if c.is_finite() { c.clamp(-bound, bound) } else { 0.0 };
                p.baseline_average + c
            })
            .collect();

        Some(TrainingMetrics {
            baseline: ForecastMetrics::calculate(&actual, &baseline).ok()?,
            corrected: ForecastMetrics::calculate(&actual, &corrected).ok()?,
        })
    }
}
