//! Typed access to the stored documents

use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::{Config, StoreConfig};
use crate::domain::{
    normalize_forecasts, normalize_real_wind, CorrectionModel, ForecastHistoryRecord,
    PeakTimeModel, RealWindRecord,
};
use crate::error::{CoreError, CoreResult};

pub mod store;

pub use store::{DocumentStore, FileStore, MemoryStore};

#[cfg(test)]
pub use store::MockDocumentStore;

#[derive(Clone)]
pub struct Repositories {
    store: Arc<dyn DocumentStore>,
    keys: StoreConfig,
}

impl Repositories {
    /// File-backed repositories under `store.data_dir`
    pub fn new(cfg: &Config) -> Self {
        Self::with_store(Arc::new(FileStore::new(&cfg.store.data_dir)), cfg.store.clone())
    }

    pub fn with_store(store: Arc<dyn DocumentStore>, keys: StoreConfig) -> Self {
        Self { store, keys }
    }

    pub fn keys(&self) -> &StoreConfig {
        &self.keys
    }

    pub async fn forecast_history(&self) -> CoreResult<Vec<ForecastHistoryRecord>> {
        let records = self.load_list(&self.keys.forecast_history_key).await?;
        Ok(normalize_forecasts(records))
    }

    pub async fn save_forecast_history(&self, records: &[ForecastHistoryRecord]) -> CoreResult<()> {
        self.save(&self.keys.forecast_history_key, records).await
    }

    pub async fn real_wind(&self) -> CoreResult<Vec<RealWindRecord>> {
        let records = self.load_list(&self.keys.real_wind_key).await?;
        Ok(normalize_real_wind(records))
    }

    pub async fn save_real_wind(&self, records: &[RealWindRecord]) -> CoreResult<()> {
        self.save(&self.keys.real_wind_key, records).await
    }

    /// `None` until a model has been trained
    pub async fn correction_model(&self) -> CoreResult<Option<CorrectionModel>> {
        self.load(&self.keys.correction_model_key).await
    }

    pub async fn save_correction_model(&self, model: &CorrectionModel) -> CoreResult<()> {
        self.save(&self.keys.correction_model_key, model).await
    }

    pub async fn peak_time_model(&self) -> CoreResult<Option<PeakTimeModel>> {
        self.load(&self.keys.peak_time_model_key).await
    }

    pub async fn save_peak_time_model(&self, model: &PeakTimeModel) -> CoreResult<()> {
        self.save(&self.keys.peak_time_model_key, model).await
    }

    async fn raw(&self, key: &str) -> CoreResult<Option<Value>> {
        let value = self.store.get(key).await.map_err(|source| CoreError::Store {
            key: key.to_string(),
            source,
        })?;
        Ok(value.map(unwrap_encoded))
    }

    async fn load<T: DeserializeOwned>(&self, key: &str) -> CoreResult<Option<T>> {
        match self.raw(key).await? {
            None | Some(Value::Null) => {
                debug!(key, "document not found");
                Ok(None)
            }
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|source| CoreError::Decode {
                    key: key.to_string(),
                    source,
                }),
        }
    }

    /// A list document; a lone object is read as a one-element list
    async fn load_list<T: DeserializeOwned>(&self, key: &str) -> CoreResult<Vec<T>> {
        let value = match self.raw(key).await? {
            None | Some(Value::Null) => return Ok(Vec::new()),
            Some(Value::Array(items)) => Value::Array(items),
            Some(other) => {
                warn!(key, "list document stored as a single value");
                Value::Array(vec![other])
            }
        };
        serde_json::from_value(value).map_err(|source| CoreError::Decode {
            key: key.to_string(),
            source,
        })
    }

    async fn save<T: Serialize + ?Sized>(&self, key: &str, document: &T) -> CoreResult<()> {
        let value = serde_json::to_value(document).map_err(|source| CoreError::Decode {
            key: key.to_string(),
            source,
        })?;
        self.store
            .set(key, value)
            .await
            .map_err(|source| CoreError::Store {
                key: key.to_string(),
                source,
            })
    }
}

/// Older writers stored documents as JSON-encoded strings
fn unwrap_encoded(value: Value) -> Value {
    match value {
        Value::String(s) => serde_json::from_str(&s).unwrap_or(Value::String(s)),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FeatureScoreSet, WindRange};
    use chrono::NaiveDate;
    use serde_json::json;

    fn repos() -> (Arc<MemoryStore>, Repositories) {
        let store = Arc::new(MemoryStore::new());
        let repos = Repositories::with_store(store.clone(), StoreConfig::default());
        (store, repos)
    }

    #[tokio::test]
    async fn test_missing_documents() {
        let (_, repos) = repos();
        assert!(repos.correction_model().await.unwrap().is_none());
        assert!(repos.peak_time_model().await.unwrap().is_none());
        assert!(repos.forecast_history().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_history_is_normalized_on_read() {
        let (store, repos) = repos();
        let record = |d: u32, avg: f64| ForecastHistoryRecord {
            date: NaiveDate::from_ymd_opt(2025, 8, d).unwrap(),
            scores: FeatureScoreSet::default(),
            baseline_range: WindRange::new(avg - 1.5, avg + 1.5),
            corrected_range: WindRange::new(avg - 1.5, avg + 1.5),
            raw_average_knots: avg,
            corrected_average_knots: avg,
            correction_knots: 0.0,
            model_version: None,
        };
        let docs = vec![record(3, 10.0), record(1, 12.0), record(3, 14.0)];
        store
            .set("rachesForecastHistory", serde_json::to_value(&docs).unwrap())
            .await
            .unwrap();

        let history = repos.forecast_history().await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].date.to_string(), "2025-08-01");
        assert_eq!(history[1].raw_average_knots, 14.0);
    }

    #[tokio::test]
    async fn test_string_encoded_model_is_read() {
        let (store, repos) = repos();
        let encoded = json!({
            "version": "linear-v4",
            "lastUpdated": "2025-08-20T02:00:00Z",
            "coefficients": { "intercept": 1.0 },
            "recordsAnalyzed": 9
        })
        .to_string();
        store
            .set("prediction_model_v5", Value::String(encoded))
            .await
            .unwrap();

        let model = repos.correction_model().await.unwrap().unwrap();
        assert_eq!(model.records_analyzed(), 9);
    }

    #[tokio::test]
    async fn test_malformed_model_is_a_decode_error() {
        let (store, repos) = repos();
        store
            .set("prediction_model_v5", json!({"version": "nope"}))
            .await
            .unwrap();
        assert!(matches!(
            repos.correction_model().await,
            Err(CoreError::Decode { .. })
        ));
    }
}
