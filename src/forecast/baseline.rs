//! Table-driven baseline wind range
//!
//! Maps an aggregate score to a knot range by piecewise-linear interpolation
//! between control points. No learned correction is involved here.

use serde::{Deserialize, Serialize};

use crate::domain::WindRange;
use crate::error::{CoreError, CoreResult};

/// `(score, min_knots, max_knots)` control point
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ControlPoint {
    pub score: f64,
    pub min_knots: f64,
    pub max_knots: f64,
}

impl ControlPoint {
    pub const fn new(score: f64, min_knots: f64, max_knots: f64) -> Self {
        Self {
            score,
            min_knots,
            max_knots,
        }
    }
}

pub fn default_table() -> Vec<ControlPoint> {
    vec![
        ControlPoint::new(-15.0, 0.0, 3.0),
        ControlPoint::new(-12.0, 1.0, 4.0),
        ControlPoint::new(-9.0, 2.0, 5.0),
        ControlPoint::new(-6.0, 3.0, 6.0),
        ControlPoint::new(-3.0, 4.0, 7.0),
        ControlPoint::new(0.0, 5.0, 8.0),
        ControlPoint::new(3.0, 7.0, 10.0),
        ControlPoint::new(6.0, 9.0, 12.0),
        ControlPoint::new(9.0, 11.0, 14.0),
        ControlPoint::new(12.0, 14.0, 17.0),
        ControlPoint::new(15.0, 17.0, 20.0),
        ControlPoint::new(18.0, 20.0, 23.0),
        ControlPoint::new(21.0, 22.0, 25.0),
    ]
}

#[derive(Debug, Clone)]
pub struct BaselinePredictor {
    table: Vec<ControlPoint>,
}

impl BaselinePredictor {
    /// Validates that scores strictly increase and both knot columns never decrease
    pub fn new(table: Vec<ControlPoint>) -> CoreResult<Self> {
        if table.is_empty() {
            return Err(CoreError::InvalidTable("table is empty".into()));
        }
        if let Some(p) = table
            .iter()
            .find(|p| !(p.score.is_finite() && p.min_knots.is_finite() && p.max_knots.is_finite()))
        {
            return Err(CoreError::InvalidTable(format!(
                "non-finite control point {:?}",
                p
            )));
        }
        if let Some(p) = table.iter().find(|p| p.min_knots > p.max_knots) {
            return Err(CoreError::InvalidTable(format!(
                "min above max at score {}",
                p.score
            )));
        }
        for pair in table.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if b.score <= a.score {
                return Err(CoreError::InvalidTable(format!(
                    "scores must strictly increase ({} then {})",
                    a.score, b.score
                )));
            }
            if b.min_knots < a.min_knots || b.max_knots < a.max_knots {
                return Err(CoreError::InvalidTable(format!(
                    "knots decrease between scores {} and {}",
                    a.score, b.score
                )));
            }
        }
        Ok(Self { table })
    }

    pub fn table(&self) -> &[ControlPoint] {
        &self.table
    }

    pub fn predict(&self, score: f64) -> WindRange {
        let first = self.table[0];
        let last = self.table[self.table.len() - 1];

        // NaN scores read as the bottom of the table
        if score.is_nan() || score <= first.score {
            return WindRange::new(first.min_knots, first.max_knots);
        }
        if score >= last.score {
            return WindRange::new(last.min_knots, last.max_knots);
        }

        let upper = self.table.partition_point(|p| p.score <= score);
        let (p1, p2) = (self.table[upper - 1], self.table[upper]);
        let t = (score - p1.score) / (p2.score - p1.score);

        WindRange::new(
            p1.min_knots + (p2.min_knots - p1.min_knots) * t,
            p1.max_knots + (p2.max_knots - p1.max_knots) * t,
        )
    }
}

impl Default for BaselinePredictor {
    fn default() -> Self {
        Self {
            table: default_table(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[test]
    fn test_exact_at_control_points() {
        let predictor = BaselinePredictor::default();
        for p in default_table() {
            let range = predictor.predict(p.score);
            assert_eq!(range.min_knots, p.min_knots, "score {}", p.score);
            assert_eq!(range.max_knots, p.max_knots, "score {}", p.score);
        }
    }

    #[rstest]
    #[case(1.5, 6.0, 9.0)]
    #[case(10.5, 12.5, 15.5)]
    #[case(-100.0, 0.0, 3.0)]
    #[case(100.0, 22.0, 25.0)]
    fn test_interpolates_and_clamps(#[case] score: f64, #[case] min: f64, #[case] max: f64) {
        let range = BaselinePredictor::default().predict(score);
        assert!((range.min_knots - min).abs() < 1e-12);
        assert!((range.max_knots - max).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_non_monotonic_table() {
        let table = vec![
            ControlPoint::new(0.0, 5.0, 8.0),
            ControlPoint::new(3.0, 4.0, 9.0),
        ];
        assert!(matches!(
            BaselinePredictor::new(table),
            Err(CoreError::InvalidTable(_))
        ));

        let table = vec![
            ControlPoint::new(3.0, 5.0, 8.0),
            ControlPoint::new(3.0, 6.0, 9.0),
        ];
        assert!(BaselinePredictor::new(table).is_err());
        assert!(BaselinePredictor::new(vec![]).is_err());
    }

    #[test]
    fn test_nan_score_clamps_low() {
        let range = BaselinePredictor::default().predict(f64::NAN);
        assert_eq!(range, WindRange::new(0.0, 3.0));
    }

    proptest! {
        #[test]
        fn prop_monotonic_in_score(a in -30.0f64..30.0, b in -30.0f64..30.0) {
            let predictor = BaselinePredictor::default();
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            let r_lo = predictor.predict(lo);
            let r_hi = predictor.predict(hi);
            prop_assert!(r_hi.max_knots >= r_lo.max_knots - 1e-12);
            prop_assert!(r_hi.min_knots >= r_lo.min_knots - 1e-12);
        }
    }
}
