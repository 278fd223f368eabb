//! Learned components
//!
//! - Ridge regression over the feature scores, predicting how far the table
//!   baseline misses the observed peak
//! - Legacy bucket-average correction
//! - Monthly peak-time estimation

pub mod bucket;
pub mod linalg;
pub mod peak_time;
pub mod training;

pub use linalg::solve_regularized_normal_equations;
pub use peak_time::{peak_hour, PeakTimeEstimator, PeakTimeOutcome, PredictedPeak};
pub use training::{
    ModelTrainer, TrainingDataset, TrainingMetrics, TrainingOutcome, TrainingPair, TrainingReport,
};
