use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::forecast::baseline::{default_table, BaselinePredictor, ControlPoint};
use crate::forecast::features::ScoringConfig;

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Config {
    #[validate(nested)]
    pub store: StoreConfig,
    #[validate(nested)]
    pub weather: WeatherConfig,
    pub scoring: ScoringConfig,
    pub baseline: BaselineConfig,
    #[validate(nested)]
    pub correction: CorrectionConfig,
    #[validate(nested)]
    pub peak_time: PeakTimeConfig,
}

/// Document keys, kept compatible with the existing key-value store layout
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct StoreConfig {
    pub data_dir: PathBuf,
    #[validate(length(min = 1))]
    pub forecast_history_key: String,
    #[validate(length(min = 1))]
    pub real_wind_key: String,
    #[validate(length(min = 1))]
    pub correction_model_key: String,
    #[validate(length(min = 1))]
    pub peak_time_model_key: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            forecast_history_key: "rachesForecastHistory".into(),
            real_wind_key: "max_wind_history".into(),
            correction_model_key: "prediction_model_v5".into(),
            peak_time_model_key: "peak_wind_model_v3_monthly_avg".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct WeatherConfig {
    #[validate(url)]
    pub forecast_url: String,
    #[validate(url)]
    pub marine_url: String,
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,
    /// The marine grid has no cell at the spot itself
    #[validate(range(min = -90.0, max = 90.0))]
    pub sea_latitude: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub sea_longitude: f64,
    pub timezone: String,
    #[validate(range(min = 1))]
    pub http_timeout_seconds: u64,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            forecast_url: "https://api.open-meteo.com/v1/forecast".into(),
            marine_url: "https://marine-api.open-meteo.com/v1/marine".into(),
            latitude: 38.867085,
            longitude: 22.759371,
            sea_latitude: 38.9534,
            sea_longitude: 22.9668,
            timezone: "Europe/Athens".into(),
            http_timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BaselineConfig {
    pub table: Vec<ControlPoint>,
}

impl Default for BaselineConfig {
    fn default() -> Self {
        Self {
            table: default_table(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct CorrectionConfig {
    /// Ridge penalty; 0 degenerates to ordinary least squares
    #[validate(range(min = 0.0))]
    pub ridge_lambda: f64,
    /// Applied correction is clamped to ± this many knots
    #[validate(range(min = 0.0))]
    pub max_correction_knots: f64,
    /// Corrected range is `avg ± half_spread_knots`
    #[validate(range(min = 0.0))]
    pub half_spread_knots: f64,
    #[validate(range(min = 0.0))]
    pub min_scaling: f64,
    #[validate(range(min = 0.0))]
    pub max_scaling: f64,
    #[validate(range(min = 1))]
    pub min_bucket_samples: usize,
}

impl Default for CorrectionConfig {
    fn default() -> Self {
        Self {
            ridge_lambda: 0.1,
            max_correction_knots: 4.0,
            half_spread_knots: 1.5,
            min_scaling: 0.5,
            max_scaling: 1.5,
            min_bucket_samples: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct PeakTimeConfig {
    /// Observations further than this many standard deviations from the mean
    /// of the month's other peak hours are discarded
    #[validate(range(min = 0.0))]
    pub outlier_sigma: f64,
    /// Lower bound on that standard deviation, in hours
    #[validate(range(min = 0.0))]
    pub min_sigma_hours: f64,
    /// Months with fewer samples are averaged without filtering
    #[validate(range(min = 1))]
    pub min_samples_for_filter: usize,
    /// Observation window around the daily peak, minutes before and after
    #[validate(range(min = 0))]
    pub window_before_minutes: i64,
    #[validate(range(min = 0))]
    pub window_after_minutes: i64,
}

impl Default for PeakTimeConfig {
    fn default() -> Self {
        Self {
            outlier_sigma: 3.0,
            min_sigma_hours: 1.0,
            min_samples_for_filter: 3,
            window_before_minutes: 15,
            window_after_minutes: 60,
        }
    }
}

impl Config {
    /// Defaults, then the TOML file (if present), then `WIND__*` env vars
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH));
        let figment = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("WIND__").split("__"));
        let config: Config = figment
            .extract()
            .with_context(|| format!("failed to load config from {}", path.display()))?;
        config.check()?;
        Ok(config)
    }

    /// Field ranges plus the cross-field rules the derive cannot express
    pub fn check(&self) -> Result<()> {
        self.validate().context("invalid configuration")?;
        let c = &self.correction;
        for (name, value) in [
            ("ridge_lambda", c.ridge_lambda),
            ("max_correction_knots", c.max_correction_knots),
            ("half_spread_knots", c.half_spread_knots),
            ("min_scaling", c.min_scaling),
            ("max_scaling", c.max_scaling),
        ] {
            if !value.is_finite() {
                anyhow::bail!("correction.{name} must be finite, got {value}");
            }
        }
        let p = &self.peak_time;
        if !p.outlier_sigma.is_finite() || !p.min_sigma_hours.is_finite() {
            anyhow::bail!("peak_time sigma settings must be finite");
        }
        if self.correction.min_scaling > self.correction.max_scaling {
            anyhow::bail!(
                "correction.min_scaling ({}) exceeds correction.max_scaling ({})",
                self.correction.min_scaling,
                self.correction.max_scaling
            );
        }
        BaselinePredictor::new(self.baseline.table.clone())?;
        Ok(())
    }
}
