pub mod baseline;
pub mod correction;
pub mod engine;
pub mod features;
pub mod metrics;
pub mod weather;

pub use baseline::{BaselinePredictor, ControlPoint};
pub use correction::{CorrectedPrediction, CorrectionApplier};
pub use engine::{DailyForecast, ForecastEngine};
pub use features::{FeatureScorer, ScoringConfig, Suitability};
pub use metrics::ForecastMetrics;
pub use weather::{OpenMeteoClient, WeatherProvider};
