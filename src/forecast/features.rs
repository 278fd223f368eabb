//! Feature scoring for thermal wind days
//!
//! Turns one date of raw provider data into per-factor scores. Each factor is
//! a step function over a raw value; the step tables are configuration because
//! they have been retuned between product iterations.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{DailyWeather, FeatureScoreSet, RawFeatureValues, WeatherObservation};

/// One step of a score table; bounds are inclusive, `None` is unbounded
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Band {
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    pub score: f64,
}

impl Band {
    pub const fn at_most(max: f64, score: f64) -> Self {
        Self {
            min: None,
            max: Some(max),
            score,
        }
    }

    pub const fn at_least(min: f64, score: f64) -> Self {
        Self {
            min: Some(min),
            max: None,
            score,
        }
    }

    pub const fn between(min: f64, max: f64, score: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
            score,
        }
    }

    fn contains(&self, value: f64) -> bool {
        self.min.map_or(true, |m| value >= m) && self.max.map_or(true, |m| value <= m)
    }
}

/// Ordered bands, first match wins, `fallback` when nothing matches
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoreBands {
    pub bands: Vec<Band>,
    pub fallback: f64,
}

impl ScoreBands {
    pub fn new(bands: Vec<Band>, fallback: f64) -> Self {
        Self { bands, fallback }
    }

    pub fn score(&self, value: f64) -> f64 {
        self.bands
            .iter()
            .find(|b| b.contains(value))
            .map_or(self.fallback, |b| b.score)
    }
}

/// Inclusive hour-of-day window
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct HourWindow {
    pub start: u32,
    pub end: u32,
}

impl HourWindow {
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, hour: u32) -> bool {
        (self.start..=self.end).contains(&hour)
    }
}

/// Thresholds used to label a scored day
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LabelThresholds {
    pub high_score: f64,
    pub medium_score: f64,
    /// Below this predicted max the day is not rideable regardless of score
    pub kiting_min_knots: f64,
}

impl Default for LabelThresholds {
    fn default() -> Self {
        Self {
            high_score: 10.0,
            medium_score: 5.0,
            kiting_min_knots: 16.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScoringConfig {
    pub cloud_cover: ScoreBands,
    pub temp_diff: ScoreBands,
    pub wind_speed: ScoreBands,
    pub wind_direction: ScoreBands,
    pub suck_effect: ScoreBands,
    pub pressure_drop: ScoreBands,
    pub humidity: ScoreBands,
    pub precipitation: ScoreBands,
    pub morning_hours: HourWindow,
    pub afternoon_hours: HourWindow,
    pub direction_hours: HourWindow,
    pub daytime_cloud_hours: HourWindow,
    /// Hour whose sea-surface sample represents the day
    pub sea_temperature_hour: u32,
    /// Used when the marine provider has no sample for the whole range
    pub default_sea_temperature: f64,
    pub labels: LabelThresholds,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            cloud_cover: ScoreBands::new(
                vec![
                    Band::at_most(5.0, 5.0),
                    Band::at_most(10.0, 4.5),
                    Band::at_most(20.0, 4.0),
                    Band::at_most(30.0, 3.5),
                    Band::at_most(40.0, 3.0),
                    Band::at_most(50.0, 2.0),
                    Band::at_most(60.0, 1.0),
                    Band::at_most(70.0, 0.0),
                    Band::at_most(80.0, -1.0),
                    Band::at_most(90.0, -1.5),
                ],
                -2.0,
            ),
            temp_diff: ScoreBands::new(
                vec![
                    Band::at_least(8.0, 5.25),
                    Band::at_least(7.0, 4.75),
                    Band::at_least(6.0, 4.25),
                    Band::at_least(5.0, 3.75),
                    Band::at_least(4.0, 3.0),
                    Band::at_least(3.0, 2.75),
                    Band::at_least(2.0, 2.25),
                    Band::at_least(1.0, 1.25),
                ],
                -1.5,
            ),
            wind_speed: ScoreBands::new(
                vec![
                    Band::between(15.0, 30.0, 2.0),
                    Band::between(30.0, 40.0, 1.0),
                    Band::between(5.0, 15.0, 0.0),
                    Band::at_most(5.0, -1.0),
                ],
                -2.0,
            ),
            wind_direction: ScoreBands::new(
                vec![
                    Band::between(115.0, 155.0, 2.0),
                    Band::between(75.0, 115.0, 1.25),
                    Band::between(155.0, 190.0, 1.25),
                    Band::between(225.0, 330.0, -8.0),
                ],
                0.0,
            ),
            suck_effect: ScoreBands::new(
                vec![
                    Band::at_least(15.0, 3.0),
                    Band::at_least(10.0, 2.0),
                    Band::at_least(5.0, 1.0),
                ],
                0.0,
            ),
            pressure_drop: ScoreBands::new(
                vec![
                    Band::at_least(3.0, 2.0),
                    Band::at_least(1.5, 1.0),
                    Band::at_least(0.0, 0.0),
                ],
                -1.0,
            ),
            humidity: ScoreBands::new(
                vec![
                    Band::at_most(50.0, 1.0),
                    Band::at_most(65.0, 0.5),
                    Band::at_most(80.0, 0.0),
                ],
                -1.0,
            ),
            precipitation: ScoreBands::new(
                vec![
                    Band::at_most(10.0, 1.0),
                    Band::at_most(30.0, 0.0),
                    Band::at_most(60.0, -1.0),
                ],
                -2.0,
            ),
            morning_hours: HourWindow::new(9, 11),
            afternoon_hours: HourWindow::new(15, 17),
            direction_hours: HourWindow::new(13, 17),
            daytime_cloud_hours: HourWindow::new(1, 20),
            sea_temperature_hour: 13,
            default_sea_temperature: 26.0,
            labels: LabelThresholds::default(),
        }
    }
}

/// Suitability label for a scored and predicted day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Suitability {
    High,
    Medium,
    Low,
    Bad,
    NotSuitableForKiting,
}

impl LabelThresholds {
    pub fn label(&self, aggregate_score: f64, predicted_max_knots: f64) -> Suitability {
        if predicted_max_knots > 0.0 && predicted_max_knots < self.kiting_min_knots {
            return Suitability::NotSuitableForKiting;
        }
        if aggregate_score > self.high_score {
            Suitability::High
        } else if aggregate_score >= self.medium_score {
            Suitability::Medium
        } else if aggregate_score >= 0.0 {
            Suitability::Low
        } else {
            Suitability::Bad
        }
    }
}

fn value(v: Option<f64>) -> f64 {
    v.filter(|x| x.is_finite()).unwrap_or(0.0)
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Vector mean of compass directions in degrees, normalized to [0, 360)
pub fn circular_mean_degrees(degrees: &[f64]) -> Option<f64> {
    if degrees.is_empty() {
        return None;
    }
    let (sin, cos) = degrees.iter().fold((0.0, 0.0), |(s, c), d| {
        let r = d.to_radians();
        (s + r.sin(), c + r.cos())
    });
    if sin.abs() < 1e-12 && cos.abs() < 1e-12 {
        // Opposing directions cancel; there is no meaningful mean
        return None;
    }
    Some(sin.atan2(cos).to_degrees().rem_euclid(360.0))
}

/// Scores every date of a [`WeatherObservation`]
pub struct FeatureScorer {
    config: ScoringConfig,
}

impl FeatureScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Score all daily rows, in provider order
    pub fn score_all(&self, weather: &WeatherObservation) -> Vec<(NaiveDate, FeatureScoreSet)> {
        let sea = self.sea_temperatures(weather);
        weather
            .daily
            .iter()
            .zip(sea)
            .map(|(day, sea_temp)| (day.date, self.score_day(day, weather, sea_temp)))
            .collect()
    }

    /// Sea temperature per daily row: the configured hour's sample, carried
    /// forward over gaps and seeded by the first known value in the range
    pub fn sea_temperatures(&self, weather: &WeatherObservation) -> Vec<f64> {
        let per_day: Vec<Option<f64>> = weather
            .daily
            .iter()
            .map(|day| {
                weather
                    .sea_surface
                    .iter()
                    .find(|s| {
                        s.time.date() == day.date
                            && chrono::Timelike::hour(&s.time) == self.config.sea_temperature_hour
                    })
                    .and_then(|s| s.temperature)
                    .filter(|t| t.is_finite())
            })
            .collect();

        let mut last_known = per_day
            .iter()
            .flatten()
            .next()
            .copied()
            .unwrap_or(self.config.default_sea_temperature);

        per_day
            .into_iter()
            .map(|t| {
                if let Some(t) = t {
                    last_known = t;
                }
                last_known
            })
            .collect()
    }

    /// Score one day given its already-resolved sea temperature
    pub fn score_day(
        &self,
        day: &DailyWeather,
        weather: &WeatherObservation,
        sea_temperature: f64,
    ) -> FeatureScoreSet {
        let cfg = &self.config;
        let hours: Vec<_> = weather.hours_of(day.date).collect();

        let window_max = |window: HourWindow| {
            hours
                .iter()
                .filter(|h| window.contains(h.hour()))
                .filter_map(|h| h.wind_speed.filter(|v| v.is_finite()))
                .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))))
        };
        let wind_increase = match (
            window_max(cfg.morning_hours),
            window_max(cfg.afternoon_hours),
        ) {
            (Some(morning), Some(afternoon)) => Some(afternoon - morning),
            _ => None,
        };
        let suck_effect_score = wind_increase.map_or(0.0, |inc| cfg.suck_effect.score(inc));

        let cloud_cover = mean(
            hours
                .iter()
                .filter(|h| cfg.daytime_cloud_hours.contains(h.hour()))
                .filter_map(|h| h.cloud_cover.filter(|v| v.is_finite())),
        )
        .unwrap_or_else(|| value(day.cloud_cover_mean));

        let air_temperature = value(day.temperature_max);
        let temp_diff = air_temperature - sea_temperature;
        let wind_speed = value(day.wind_speed_max);

        let afternoon_dirs: Vec<f64> = hours
            .iter()
            .filter(|h| cfg.direction_hours.contains(h.hour()))
            .filter_map(|h| h.wind_direction.filter(|v| v.is_finite()))
            .collect();
        let wind_direction = circular_mean_degrees(&afternoon_dirs)
            .unwrap_or_else(|| value(day.wind_direction_dominant).rem_euclid(360.0))
            .round();

        let window_mean = |window: HourWindow, pick: fn(&crate::domain::HourlyWeather) -> Option<f64>| {
            mean(
                hours
                    .iter()
                    .filter(|h| window.contains(h.hour()))
                    .filter_map(|h| pick(h).filter(|v| v.is_finite())),
            )
        };
        let pressure_drop = match (
            window_mean(cfg.morning_hours, |h| h.pressure),
            window_mean(cfg.afternoon_hours, |h| h.pressure),
        ) {
            (Some(morning), Some(afternoon)) => morning - afternoon,
            _ => 0.0,
        };
        let humidity = window_mean(cfg.afternoon_hours, |h| h.humidity);
        let precipitation_probability = hours
            .iter()
            .filter_map(|h| h.precipitation_probability.filter(|v| v.is_finite()))
            .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))));

        let mut scores = FeatureScoreSet {
            cloud_cover_score: cfg.cloud_cover.score(cloud_cover),
            temp_diff_score: cfg.temp_diff.score(temp_diff),
            wind_speed_score: cfg.wind_speed.score(wind_speed),
            wind_direction_score: cfg.wind_direction.score(wind_direction),
            suck_effect_score,
            pressure_drop_score: cfg.pressure_drop.score(pressure_drop),
            humidity_score: humidity.map_or(0.0, |v| cfg.humidity.score(v)),
            precipitation_score: precipitation_probability
                .map_or(0.0, |v| cfg.precipitation.score(v)),
            aggregate_score: 0.0,
            raw: RawFeatureValues {
                cloud_cover: cloud_cover.round(),
                air_temperature,
                sea_temperature,
                temp_diff,
                wind_speed,
                wind_direction,
                wind_increase: wind_increase.unwrap_or(0.0),
                pressure_drop,
                humidity: humidity.unwrap_or(0.0),
                precipitation_probability: precipitation_probability.unwrap_or(0.0),
            },
        };
        scores.recompute_aggregate();

        debug!(date = %day.date, score = scores.aggregate_score, "scored day");
        scores
    }
}

impl Default for FeatureScorer {
    fn default() -> Self {
        Self::new(ScoringConfig::default())
    }
}
