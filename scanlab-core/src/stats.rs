//! Robust reducers for baseline aggregation.
//!
//! The baseline at each slot reduces the per-day cumulative-volume samples
//! with one of these methods. Trimmed mean is the default: halts and
//! pre-market spikes in a handful of history days would otherwise drag the
//! whole curve.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How per-slot history samples reduce to a single baseline value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaselineMethod {
    Mean,
    Median,
    TrimmedMean,
}

impl fmt::Display for BaselineMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BaselineMethod::Mean => write!(f, "mean"),
            BaselineMethod::Median => write!(f, "median"),
            BaselineMethod::TrimmedMean => write!(f, "trimmed_mean"),
        }
    }
}

/// Arithmetic mean. `None` on an empty sample.
pub fn mean(vals: &[f64]) -> Option<f64> {
    if vals.is_empty() {
        return None;
    }
    Some(vals.iter().sum::<f64>() / vals.len() as f64)
}

/// Median; average of the two middle values on even counts.
pub fn median(vals: &[f64]) -> Option<f64> {
    if vals.is_empty() {
        return None;
    }
    let mut ordered = vals.to_vec();
    ordered.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = ordered.len() / 2;
    if ordered.len() % 2 == 1 {
        Some(ordered[mid])
    } else {
        Some((ordered[mid - 1] + ordered[mid]) / 2.0)
    }
}

/// Symmetric trimmed mean.
///
/// The trim fraction is clamped to `[0, 0.49]`. If trimming would remove the
/// whole sample, falls back to the plain mean of the full sample.
pub fn trimmed_mean(vals: &[f64], trim_pct: f64) -> Option<f64> {
    if vals.is_empty() {
        return None;
    }
    let pct = trim_pct.clamp(0.0, 0.49);
    let mut ordered = vals.to_vec();
    ordered.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let trim = (ordered.len() as f64 * pct) as usize;
    if trim * 2 >= ordered.len() {
        return mean(&ordered);
    }
    mean(&ordered[trim..ordered.len() - trim])
}

/// Reduce a sample with the configured method.
pub fn reduce(method: BaselineMethod, vals: &[f64], trim_pct: f64) -> Option<f64> {
    match method {
        BaselineMethod::Mean => mean(vals),
        BaselineMethod::Median => median(vals),
        BaselineMethod::TrimmedMean => trimmed_mean(vals, trim_pct),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn mean_of_empty_is_none() {
        assert_eq!(mean(&[]), None);
        assert_eq!(median(&[]), None);
        assert_eq!(trimmed_mean(&[], 0.1), None);
    }

    #[test]
    fn median_odd_and_even() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), Some(2.5));
    }

    #[test]
    fn trimmed_mean_drops_tails() {
        let vals = [1.0, 2.0, 100.0, 101.0, 102.0];
        let tm = trimmed_mean(&vals, 0.2).unwrap();
        assert!((tm - (2.0 + 100.0 + 101.0) / 3.0).abs() < 1e-9);
    }

    #[test]
    fn zero_trim_equals_mean() {
        let vals = [5.0, 7.0, 9.0, 400.0];
        assert_eq!(trimmed_mean(&vals, 0.0), mean(&vals));
    }

    #[test]
    fn degenerate_trim_falls_back_to_mean() {
        let vals = [5.0, 7.0, 9.0];
        assert_eq!(trimmed_mean(&vals, 0.49), mean(&vals));
        // Out-of-range trim is clamped, not an error.
        assert_eq!(trimmed_mean(&vals, 2.0), mean(&vals));
    }

    #[test]
    fn reduce_dispatches() {
        let vals = [1.0, 2.0, 3.0];
        assert_eq!(reduce(BaselineMethod::Mean, &vals, 0.0), Some(2.0));
        assert_eq!(reduce(BaselineMethod::Median, &vals, 0.0), Some(2.0));
        assert_eq!(reduce(BaselineMethod::TrimmedMean, &vals, 0.0), Some(2.0));
    }

    #[test]
    fn method_serde_names() {
        assert_eq!(
            serde_json::to_string(&BaselineMethod::TrimmedMean).unwrap(),
            "\"trimmed_mean\""
        );
    }

    proptest! {
        /// Trimmed mean always lies within the sample's min/max.
        #[test]
        fn trimmed_mean_within_bounds(
            vals in prop::collection::vec(0.0f64..1e9, 1..40),
            pct in 0.0f64..1.0,
        ) {
            let tm = trimmed_mean(&vals, pct).unwrap();
            let lo = vals.iter().cloned().fold(f64::INFINITY, f64::min);
            let hi = vals.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            prop_assert!(tm >= lo - 1e-6 && tm <= hi + 1e-6);
        }

        /// Median is permutation-invariant.
        #[test]
        fn median_permutation_invariant(mut vals in prop::collection::vec(0.0f64..1e9, 1..20)) {
            let m1 = median(&vals);
            vals.reverse();
            let m2 = median(&vals);
            prop_assert_eq!(m1, m2);
        }
    }
}
