use chrono::NaiveDate;
use thiserror::Error;

/// Failures of the forecast core.
///
/// Insufficient training data is not an error: trainers report it as an
/// outcome so callers can return success without persisting anything.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("training failed - data collinear (condition number {condition:.3e})")]
    Collinear { condition: f64 },

    #[error("training failed - non-finite value in design matrix or target")]
    NonFiniteInput,

    #[error("invalid baseline table: {0}")]
    InvalidTable(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid date range: {end} is before {start}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("store error on '{key}': {source}")]
    Store {
        key: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("malformed document '{key}': {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("weather provider error: {0}")]
    Provider(#[source] anyhow::Error),
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;
