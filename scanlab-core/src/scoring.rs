//! Composite score and letter grade for ranked candidates.
//!
//! The score is a weighted blend of normalized sub-scores in [0, 1]; the
//! grade is a coarse bucket from hard thresholds. Both read the metrics
//! accumulator after every enrichment stage has run, and both are written
//! back into it.

use serde::{Deserialize, Serialize};

use crate::domain::{CandidateMetrics, Grade};
use crate::funnel::FilterLimits;

/// Blend weights for the composite score. The five stage weights sum to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub change: f64,
    pub rvol: f64,
    pub volume: f64,
    pub float_shares: f64,
    pub spread: f64,
    /// Volume at which the volume sub-score saturates.
    pub volume_norm: f64,
    pub catalyst_bonus: f64,
    pub suspect_penalty: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            change: 0.30,
            rvol: 0.30,
            volume: 0.20,
            float_shares: 0.15,
            spread: 0.05,
            volume_norm: 5_000_000.0,
            catalyst_bonus: 0.05,
            suspect_penalty: 0.10,
        }
    }
}

/// Hard cutoffs for the letter grades. A candidate takes the best grade
/// whose every condition it meets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradeThresholds {
    pub a_change_pct: f64,
    pub a_rvol: f64,
    pub a_volume: u64,
    pub b_change_pct: f64,
    pub b_rvol: f64,
    pub b_volume: u64,
    /// B tolerates a spread this many times the strict ceiling.
    pub b_spread_mult: f64,
    pub c_change_pct: f64,
    pub c_rvol: f64,
}

impl Default for GradeThresholds {
    fn default() -> Self {
        Self {
            a_change_pct: 15.0,
            a_rvol: 5.0,
            a_volume: 1_000_000,
            b_change_pct: 10.0,
            b_rvol: 3.0,
            b_volume: 500_000,
            b_spread_mult: 1.5,
            c_change_pct: 7.0,
            c_rvol: 2.0,
        }
    }
}

/// Log-scaled RVOL sub-score in [0, 1].
///
/// Linear normalization saturates far too early when the raw ratio can run
/// into the hundreds; log10 against the cap keeps a 20x and a 150x day
/// distinguishable.
pub fn log_rvol_score(rvol_raw: f64, cap: Option<f64>) -> f64 {
    let cap_for_score = match cap {
        Some(c) if c > 1.0 => c,
        _ => 200.0,
    };
    let num = rvol_raw.max(1.0).log10();
    let den = cap_for_score.log10();
    (num / den).min(1.0)
}

/// The spread ceiling the A grade holds candidates to: the absolute ceiling
/// when configured, otherwise the percentage ceiling scaled by last price.
fn strict_spread_max(limits: &FilterLimits, last: f64) -> f64 {
    if limits.spread_abs_max > 0.0 {
        limits.spread_abs_max
    } else {
        limits.spread_pct_max * last
    }
}

fn spread_within(spread: Option<f64>, ceiling: f64) -> bool {
    if ceiling <= 0.0 {
        return true;
    }
    matches!(spread, Some(s) if s <= ceiling)
}

/// Compute the composite score and letter grade and write them into the
/// metrics. Suspect candidates are capped at grade C and penalized in score.
pub fn grade_and_score(
    metrics: &mut CandidateMetrics,
    limits: &FilterLimits,
    weights: &ScoreWeights,
    thresholds: &GradeThresholds,
) {
    let change = metrics.change_pct.unwrap_or(0.0);
    let rvol = metrics.rvol.unwrap_or(0.0);
    let volume = metrics.volume_today.unwrap_or(0);
    let last = metrics.last.unwrap_or(0.0);

    let s_change = change.clamp(0.0, 50.0) / 50.0;
    let s_rvol = match metrics.rvol_score {
        Some(s) => s,
        None => rvol.clamp(0.0, 10.0) / 10.0,
    };
    let s_volume = (volume as f64 / weights.volume_norm).min(1.0);
    // Unknown float scores as if ten times the cap.
    let float_for_score = metrics
        .float_shares
        .unwrap_or(limits.float_max.saturating_mul(10))
        .max(1);
    let s_float = (limits.float_max as f64 / float_for_score as f64).min(1.0);
    let strict_max = strict_spread_max(limits, last);
    let s_spread = match (metrics.spread, strict_max) {
        (Some(sp), m) if m > 0.0 => (1.0 - sp / m).max(0.0),
        _ => 0.0,
    };

    let mut score = weights.change * s_change
        + weights.rvol * s_rvol
        + weights.volume * s_volume
        + weights.float_shares * s_float
        + weights.spread * s_spread;

    if metrics.has_catalyst == Some(true) {
        score += weights.catalyst_bonus;
    }
    if metrics.suspect_corporate_action {
        score -= weights.suspect_penalty;
    }
    if metrics.suspect_data {
        score -= weights.suspect_penalty;
    }

    let float_ok = metrics
        .float_shares
        .is_some_and(|fs| fs <= limits.float_max);

    let mut grade = if change >= thresholds.a_change_pct
        && rvol >= thresholds.a_rvol
        && volume >= thresholds.a_volume
        && float_ok
        && spread_within(metrics.spread, strict_max)
    {
        Grade::A
    } else if change >= thresholds.b_change_pct
        && rvol >= thresholds.b_rvol
        && volume >= thresholds.b_volume
        && spread_within(metrics.spread, strict_max * thresholds.b_spread_mult)
    {
        Grade::B
    } else if change >= thresholds.c_change_pct && rvol >= thresholds.c_rvol {
        Grade::C
    } else {
        Grade::D
    };

    if metrics.suspect_corporate_action || metrics.suspect_data {
        grade = grade.at_worst(Grade::C);
    }

    metrics.grade = Some(grade);
    metrics.score = Some(score.clamp(0.0, 1.0));
}
