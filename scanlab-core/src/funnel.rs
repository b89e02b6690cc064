//! Ordered candidate filter funnel with per-stage accounting.
//!
//! Cheap, purely numeric checks run first to shrink the set before anything
//! that costs an API call; RVOL and spread eliminations come last and apply
//! only to the survivors. Every elimination increments a named counter so a
//! run can always explain where its candidates went.

use serde::{Deserialize, Serialize};

use crate::domain::QuoteSnapshot;

/// Numeric limits for the funnel stages.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterLimits {
    pub price_min: f64,
    pub price_max: f64,
    pub change_min_pct: f64,
    pub volume_min: u64,
    pub rvol_min: f64,
    pub float_max: u64,
    /// Absolute spread ceiling in dollars; 0 disables the check.
    pub spread_abs_max: f64,
    /// Spread ceiling as a fraction of last price; 0 disables the check.
    pub spread_pct_max: f64,
    /// Scanner row cap.
    pub max_candidates: usize,
    /// Top-K cap on RVOL computation — the admission-control device bounding
    /// historical-bar fetches per run.
    pub max_rvol_symbols: usize,
}

impl Default for FilterLimits {
    fn default() -> Self {
        Self {
            price_min: 2.0,
            price_max: 20.0,
            change_min_pct: 10.0,
            volume_min: 200_000,
            rvol_min: 3.0,
            float_max: 10_000_000,
            spread_abs_max: 0.0,
            spread_pct_max: 0.05,
            max_candidates: 50,
            max_rvol_symbols: 15,
        }
    }
}

/// Why a candidate fell out of the basic-filter stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    InvalidLast,
    PriceOutOfRange,
    MissingPrevClose,
    ChangeBelowMin,
    MissingVolume,
    VolumeBelowMin,
}

/// Named counters for the basic-filter stages.
///
/// Invariant: the counters sum to exactly `scan_count - prelim_count`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DropReasons {
    pub invalid_last: u64,
    pub price_out_of_range: u64,
    pub missing_prev_close: u64,
    pub change_below_min: u64,
    pub missing_volume: u64,
    pub volume_below_min: u64,
}

impl DropReasons {
    pub fn record(&mut self, reason: DropReason) {
        match reason {
            DropReason::InvalidLast => self.invalid_last += 1,
            DropReason::PriceOutOfRange => self.price_out_of_range += 1,
            DropReason::MissingPrevClose => self.missing_prev_close += 1,
            DropReason::ChangeBelowMin => self.change_below_min += 1,
            DropReason::MissingVolume => self.missing_volume += 1,
            DropReason::VolumeBelowMin => self.volume_below_min += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.invalid_last
            + self.price_out_of_range
            + self.missing_prev_close
            + self.change_below_min
            + self.missing_volume
            + self.volume_below_min
    }
}

/// Quote that survived the basic filters, with derived fields filled in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdmittedQuote {
    pub last: f64,
    pub prev_close: f64,
    pub change_pct: f64,
    pub volume_today: u64,
    pub bid: Option<f64>,
    pub ask: Option<f64>,
    pub spread: Option<f64>,
    pub spread_pct: Option<f64>,
}

/// Run the basic-filter stages (§stages 1–5) over one snapshot, in order.
pub fn admit_snapshot(
    quote: &QuoteSnapshot,
    limits: &FilterLimits,
) -> Result<AdmittedQuote, DropReason> {
    let last = match quote.last {
        Some(v) if v > 0.0 => v,
        _ => return Err(DropReason::InvalidLast),
    };
    if last < limits.price_min || last > limits.price_max {
        return Err(DropReason::PriceOutOfRange);
    }
    let prev_close = match quote.prev_close {
        Some(v) if v > 0.0 => v,
        _ => return Err(DropReason::MissingPrevClose),
    };
    let change_pct = (last - prev_close) / prev_close * 100.0;
    if change_pct < limits.change_min_pct {
        return Err(DropReason::ChangeBelowMin);
    }
    let volume_today = match quote.volume_today {
        Some(v) => v,
        None => return Err(DropReason::MissingVolume),
    };
    if volume_today < limits.volume_min {
        return Err(DropReason::VolumeBelowMin);
    }

    Ok(AdmittedQuote {
        last,
        prev_close,
        change_pct,
        volume_today,
        bid: quote.bid,
        ask: quote.ask,
        spread: quote.spread(),
        spread_pct: quote.spread_pct(),
    })
}

/// Float stage: unknown float passes; a float above the cap does not.
pub fn float_passes(float_shares: Option<u64>, limits: &FilterLimits) -> bool {
    match float_shares {
        Some(fs) => fs <= limits.float_max,
        None => true,
    }
}

/// RVOL stage. `required = false` is the permissive path: a missing ratio
/// does not eliminate the candidate, but a known ratio below the minimum
/// always does.
pub fn rvol_passes(rvol: Option<f64>, limits: &FilterLimits, required: bool) -> bool {
    match rvol {
        Some(r) => r >= limits.rvol_min,
        None => !required,
    }
}

/// Spread stage: each configured ceiling requires a present, in-bounds value.
pub fn spread_passes(spread: Option<f64>, spread_pct: Option<f64>, limits: &FilterLimits) -> bool {
    if limits.spread_abs_max > 0.0 {
        match spread {
            Some(s) if s <= limits.spread_abs_max => {}
            _ => return false,
        }
    }
    if limits.spread_pct_max > 0.0 {
        match spread_pct {
            Some(p) if p <= limits.spread_pct_max => {}
            _ => return false,
        }
    }
    true
}

/// Candidate counts at each funnel boundary.
///
/// Invariant: `final_count <= filtered <= prelim <= scan`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FunnelCounts {
    /// Rows the scanner returned after universe exclusions.
    pub scan: u64,
    /// Survivors of the basic filters.
    pub prelim: u64,
    /// Survivors of the float filter.
    pub filtered: u64,
    /// Survivors of the RVOL and spread filters.
    #[serde(rename = "final")]
    pub final_count: u64,
}

impl FunnelCounts {
    pub fn invariant_holds(&self) -> bool {
        self.final_count <= self.filtered && self.filtered <= self.prelim && self.prelim <= self.scan
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quote(last: f64, prev: f64, vol: u64) -> QuoteSnapshot {
        QuoteSnapshot {
            last: Some(last),
            prev_close: Some(prev),
            volume_today: Some(vol),
            bid: None,
            ask: None,
        }
    }

    #[test]
    fn admits_a_clean_quote() {
        let q = quote(11.0, 9.0, 500_000);
        let a = admit_snapshot(&q, &FilterLimits::default()).unwrap();
        assert!((a.change_pct - (11.0 - 9.0) / 9.0 * 100.0).abs() < 1e-9);
        assert_eq!(a.volume_today, 500_000);
    }

    #[test]
    fn stage_order_is_fixed() {
        let limits = FilterLimits::default();
        // Missing last trumps everything else being wrong too.
        let q = QuoteSnapshot::default();
        assert_eq!(admit_snapshot(&q, &limits), Err(DropReason::InvalidLast));
        // Price range is checked before prev close.
        let q = QuoteSnapshot {
            last: Some(100.0),
            ..Default::default()
        };
        assert_eq!(admit_snapshot(&q, &limits), Err(DropReason::PriceOutOfRange));
        // Prev close before change.
        let q = QuoteSnapshot {
            last: Some(10.0),
            ..Default::default()
        };
        assert_eq!(
            admit_snapshot(&q, &limits),
            Err(DropReason::MissingPrevClose)
        );
        // Change below min.
        let q = quote(10.0, 9.9, 500_000);
        assert_eq!(admit_snapshot(&q, &limits), Err(DropReason::ChangeBelowMin));
        // Volume missing, then below min.
        let q = QuoteSnapshot {
            last: Some(11.0),
            prev_close: Some(9.0),
            ..Default::default()
        };
        assert_eq!(admit_snapshot(&q, &limits), Err(DropReason::MissingVolume));
        let q = quote(11.0, 9.0, 10_000);
        assert_eq!(admit_snapshot(&q, &limits), Err(DropReason::VolumeBelowMin));
    }

    #[test]
    fn negative_last_is_invalid() {
        let q = QuoteSnapshot {
            last: Some(-1.0),
            ..Default::default()
        };
        assert_eq!(
            admit_snapshot(&q, &FilterLimits::default()),
            Err(DropReason::InvalidLast)
        );
    }

    #[test]
    fn drop_reasons_sum() {
        let mut reasons = DropReasons::default();
        reasons.record(DropReason::InvalidLast);
        reasons.record(DropReason::InvalidLast);
        reasons.record(DropReason::VolumeBelowMin);
        assert_eq!(reasons.total(), 3);
        assert_eq!(reasons.invalid_last, 2);
    }

    #[test]
    fn float_stage() {
        let limits = FilterLimits::default();
        assert!(float_passes(None, &limits));
        assert!(float_passes(Some(10_000_000), &limits));
        assert!(!float_passes(Some(10_000_001), &limits));
    }

    #[test]
    fn rvol_stage_required_vs_permissive() {
        let limits = FilterLimits::default(); // rvol_min = 3
        assert!(rvol_passes(Some(3.0), &limits, true));
        assert!(!rvol_passes(Some(2.9), &limits, true));
        assert!(!rvol_passes(None, &limits, true));
        // Permissive: missing passes, known-bad still fails.
        assert!(rvol_passes(None, &limits, false));
        assert!(!rvol_passes(Some(2.9), &limits, false));
    }

    #[test]
    fn spread_stage_abs_and_pct() {
        // bid 9.90 / ask 10.10 against last 10.10: spread 0.20, pct 0.0198.
        let q = QuoteSnapshot {
            last: Some(10.10),
            bid: Some(9.90),
            ask: Some(10.10),
            ..Default::default()
        };
        let spread = q.spread();
        let spread_pct = q.spread_pct();
        assert!((spread.unwrap() - 0.20).abs() < 1e-9);
        assert!((spread_pct.unwrap() - 0.0198).abs() < 1e-3);

        let mut limits = FilterLimits {
            spread_abs_max: 0.0,
            spread_pct_max: 0.05,
            ..Default::default()
        };
        assert!(spread_passes(spread, spread_pct, &limits));

        limits.spread_abs_max = 0.10;
        assert!(!spread_passes(spread, spread_pct, &limits));
    }

    #[test]
    fn configured_ceiling_requires_present_value() {
        let limits = FilterLimits {
            spread_pct_max: 0.05,
            ..Default::default()
        };
        assert!(!spread_passes(None, None, &limits));
        let off = FilterLimits {
            spread_abs_max: 0.0,
            spread_pct_max: 0.0,
            ..Default::default()
        };
        assert!(spread_passes(None, None, &off));
    }

    #[test]
    fn funnel_counts_invariant() {
        let ok = FunnelCounts {
            scan: 50,
            prelim: 20,
            filtered: 12,
            final_count: 5,
        };
        assert!(ok.invariant_holds());
        let bad = FunnelCounts {
            scan: 10,
            prelim: 20,
            filtered: 5,
            final_count: 5,
        };
        assert!(!bad.invariant_holds());
    }
}
