//! Per-candidate metrics accumulator and letter grades.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Letter grade. Variant order is rank order: `A < B < C < D`, so results
/// sort ascending by grade and descending by score within a grade.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Grade {
    A,
    B,
    C,
    D,
}

impl Grade {
    pub fn rank(self) -> u8 {
        self as u8
    }

    /// Worst of two grades; used to cap suspect candidates at "C".
    pub fn at_worst(self, floor: Grade) -> Grade {
        self.max(floor)
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Grade::A => write!(f, "A"),
            Grade::B => write!(f, "B"),
            Grade::C => write!(f, "C"),
            Grade::D => write!(f, "D"),
        }
    }
}

/// Mutable accumulator spanning the whole pipeline.
///
/// Created at snapshot time, enriched by each stage (float, RVOL, news,
/// sanity, scoring), consumed by the output serializer, then discarded.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CandidateMetrics {
    pub symbol: String,
    pub exchange: Option<String>,

    // Quote fields
    pub last: Option<f64>,
    pub prev_close: Option<f64>,
    pub change_pct: Option<f64>,
    pub volume_today: Option<u64>,
    pub bid: Option<f64>,
    pub ask: Option<f64>,
    pub spread: Option<f64>,
    pub spread_pct: Option<f64>,

    // Float
    pub float_shares: Option<u64>,

    // RVOL
    pub rvol: Option<f64>,
    pub rvol_raw: Option<f64>,
    pub rvol_cumvol_today: Option<u64>,
    pub rvol_baseline: Option<f64>,
    pub rvol_minute_index: Option<usize>,
    pub rvol_days_valid: Option<u32>,
    pub rvol_cap_applied: Option<bool>,
    pub rvol_baseline_low: Option<bool>,
    pub rvol_insufficient_history: Option<bool>,
    pub rvol_session_mismatch: Option<bool>,
    /// Log-scaled RVOL score in [0, 1], for the scorer.
    pub rvol_score: Option<f64>,

    // Catalyst
    pub has_catalyst: Option<bool>,
    /// Resolved catalyst text: a headline, or a placeholder explaining why
    /// none is available.
    pub catalyst: Option<String>,
    /// Provider the catalyst came from.
    pub catalyst_source: Option<String>,
    /// Why no catalyst answer exists, when the lookup did not succeed.
    pub catalyst_error: Option<String>,

    // Suspicion flags
    pub suspect_corporate_action: bool,
    pub suspect_data: bool,

    // Final
    pub grade: Option<Grade>,
    pub score: Option<f64>,
}

impl CandidateMetrics {
    pub fn new(symbol: impl Into<String>, exchange: Option<String>) -> Self {
        Self {
            symbol: symbol.into(),
            exchange,
            ..Default::default()
        }
    }
}
