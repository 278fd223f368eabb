//! Applies a learned correction on top of the table baseline.

use serde::Serialize;
use tracing::{debug, warn};

use super::baseline::BaselinePredictor;
use crate::config::CorrectionConfig;
use crate::domain::{CorrectionModel, FeatureScoreSet, WindRange};

/// Corrected range together with the values it was derived from
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrectedPrediction {
    pub baseline: WindRange,
    pub corrected: WindRange,
    pub baseline_average: f64,
    /// Correction actually applied, after clamping
    pub correction: f64,
    pub corrected_average: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_version: Option<&'static str>,
}

pub struct CorrectionApplier {
    baseline: BaselinePredictor,
    config: CorrectionConfig,
}

impl CorrectionApplier {
    pub fn new(baseline: BaselinePredictor, config: CorrectionConfig) -> Self {
        Self { baseline, config }
    }

    pub fn baseline(&self) -> &BaselinePredictor {
        &self.baseline
    }

    pub fn apply(
        &self,
        scores: &FeatureScoreSet,
        model: Option<&CorrectionModel>,
    ) -> CorrectedPrediction {
        let baseline = self.baseline.predict(scores.aggregate_score);
        let baseline_average = baseline.average();

        let Some(model) = model else {
            return CorrectedPrediction {
                baseline,
                corrected: baseline,
                baseline_average,
                correction: 0.0,
                corrected_average: baseline_average,
                model_version: None,
            };
        };

        let (raw_correction, half_spread) = match model {
            CorrectionModel::Linear(m) | CorrectionModel::Ridge(m) => (
                m.coefficients.evaluate(scores),
                self.config.half_spread_knots,
            ),
            CorrectionModel::BucketAverage(m) => {
                let scaling = if m.scaling_factor.is_finite() {
                    m.scaling_factor
                        .clamp(self.config.min_scaling, self.config.max_scaling)
                } else {
                    1.0
                };
                (m.correction_for(scores), baseline.half_spread() * scaling)
            }
        };

        let correction = self.clamp_correction(raw_correction);
        let corrected_average = baseline_average + correction;
        let min_knots = (corrected_average - half_spread).max(0.0);
        let corrected = WindRange::new(min_knots, min_knots + 2.0 * half_spread);

        debug!(
            version = model.version(),
            raw_correction, correction, %baseline, %corrected, "applied correction"
        );

        CorrectedPrediction {
            baseline,
            corrected,
            baseline_average,
            correction,
            corrected_average,
            model_version: Some(model.version()),
        }
    }

    fn clamp_correction(&self, correction: f64) -> f64 {
        if !correction.is_finite() {
            warn!(correction, "non-finite correction ignored");
            return 0.0;
        }
        let bound = self.config.max_correction_knots;
        correction.clamp(-bound, bound)
    }
}

impl Default for CorrectionApplier {
    fn default() -> Self {
        Self::new(BaselinePredictor::default(), CorrectionConfig::default())
    }
}
