//! Thermal wind forecast core
//!
//! Scores forecast weather per day, maps the score to a baseline wind range,
//! and corrects that baseline with a model learned from observed peaks.

pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod forecast;
pub mod ml;
pub mod observations;
pub mod repo;
pub mod telemetry;

pub use error::{CoreError, CoreResult};
