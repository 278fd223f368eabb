//! Bucket-average correction model
//!
//! The first generation of correction: residuals are grouped per factor
//! (e.g. temperature difference high/medium/low) and each group stores its
//! mean residual. A scaling factor widens or narrows the baseline spread
//! according to how scattered the residuals are.

use std::collections::BTreeMap;

use chrono::Utc;
use itertools::Itertools;
use statrs::statistics::Statistics;
use strum::IntoEnumIterator;
use tracing::info;

use super::training::{ModelTrainer, TrainingDataset, TrainingOutcome, TrainingReport};
use crate::domain::{BucketAverageModel, BucketFactor, CorrectionModel};

/// Residual scatter is considered ideal at a quarter of the baseline spread
const IDEAL_SPREAD_RATIO: f64 = 4.0;

impl ModelTrainer {
    pub fn train_bucket_average(&self, dataset: &TrainingDataset) -> TrainingOutcome {
        let required = self.config().min_bucket_samples;
        if dataset.len() < required {
            info!(matched = dataset.len(), required, "not enough matched days for bucket model");
            return TrainingOutcome::Insufficient {
                matched: dataset.len(),
                required,
            };
        }

        let residuals = dataset.residuals();
        let scaling_factor = self.scaling_factor(dataset, &residuals);

        let weights = BucketFactor::iter()
            .map(|factor| {
                let averages: BTreeMap<String, f64> = dataset
                    .pairs
                    .iter()
                    .zip(&residuals)
                    .into_group_map_by(|(pair, _)| factor.group(&pair.scores).to_string())
                    .into_iter()
                    .map(|(group, members)| {
                        let avg = members.iter().map(|(_, r)| **r).sum::<f64>() / members.len() as f64;
                        (group, avg)
                    })
                    .collect();
                (factor, averages)
            })
            .collect();

        let model = BucketAverageModel {
            last_updated: Utc::now(),
            scaling_factor,
            weights,
            records_analyzed: dataset.len(),
        };
        let metrics = self.in_sample_metrics(dataset, |scores| model.correction_for(scores));

        info!(matched = dataset.len(), scaling_factor, "bucket-average model trained");

        TrainingOutcome::Trained(Box::new(TrainingReport {
            model: CorrectionModel::BucketAverage(model),
            matched: dataset.len(),
            unmatched_observations: dataset.unmatched_observations,
            pending_forecasts: dataset.pending_forecasts,
            metrics,
        }))
    }

    fn scaling_factor(&self, dataset: &TrainingDataset, residuals: &[f64]) -> f64 {
        let cfg = self.config();
        let average_spread = dataset
            .pairs
            .iter()
            .map(|p| p.baseline_spread)
            .collect::<Vec<_>>()
            .mean();
        let std_dev = residuals.std_dev();
        let ideal = average_spread / IDEAL_SPREAD_RATIO;

        let raw = if std_dev.is_finite() && std_dev > 0.0 && ideal.is_finite() && ideal > 0.0 {
            std_dev / ideal
        } else {
            1.0
        };
        raw.clamp(cfg.min_scaling, cfg.max_scaling)
    }
}
