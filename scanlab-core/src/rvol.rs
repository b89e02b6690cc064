//! Live time-of-day RVOL against a baseline curve.
//!
//! RVOL(t) = cumVol_today(t) / baseline_cumvol(t), where t is the slot of
//! "now" within the session. The computation never divides by a missing or
//! non-positive baseline; it reports null ratio fields with flags instead.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::baseline::day_volume_series;
use crate::domain::{BaselineCurve, RvolReading};
use crate::session::{to_exchange_local, Session};

/// Parameters for a live RVOL read.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RvolParams {
    pub session: Session,
    pub bar_minutes: u32,
    pub min_history_days: u32,
    pub min_baseline: u64,
    /// Uncapped when `None` or non-positive.
    pub cap: Option<f64>,
}

/// Compute the RVOL reading for a symbol at `now`.
///
/// Outside the session window the result carries `session_mismatch = true`
/// and no slot or ratio — a distinct state, never zero volume.
pub fn compute_rvol_time_of_day(
    symbol: &str,
    todays_bars: &[(DateTime<Utc>, u64)],
    curve: Option<&BaselineCurve>,
    now: DateTime<Utc>,
    params: &RvolParams,
) -> RvolReading {
    let local = to_exchange_local(now);
    let history_days_used = curve.map(|c| c.history_days_used).unwrap_or(0);
    let min_history = params.min_history_days.max(1);

    let Some(slot) = params.session.slot_index(local, params.bar_minutes) else {
        return RvolReading {
            symbol: symbol.to_string(),
            minute_index: None,
            cumvol_today: None,
            baseline_cumvol: None,
            rvol_raw: None,
            rvol: None,
            history_days_used,
            baseline_low: false,
            insufficient_history: history_days_used < min_history,
            session_mismatch: true,
            cap_applied: false,
        };
    };

    let today = local.date();
    let today_series = day_volume_series(todays_bars, today, params.session, params.bar_minutes);
    // 0 when the session has started but no bars printed yet.
    let cumvol_today = match &today_series {
        Some(series) => series.cumvol_at(slot),
        None => Some(0),
    };

    let baseline_val = curve.and_then(|c| c.value_at(slot));

    let mut rvol_raw = None;
    let mut rvol = None;
    let mut cap_applied = false;
    if let (Some(base), Some(cum)) = (baseline_val, cumvol_today) {
        if base > 0.0 {
            let raw = cum as f64 / base;
            rvol_raw = Some(raw);
            rvol = Some(raw);
            if let Some(cap) = params.cap {
                if cap > 0.0 && raw > cap {
                    rvol = Some(cap);
                    cap_applied = true;
                }
            }
        }
    }

    RvolReading {
        symbol: symbol.to_string(),
        minute_index: Some(slot),
        cumvol_today,
        baseline_cumvol: baseline_val,
        rvol_raw,
        rvol,
        history_days_used,
        baseline_low: baseline_val.is_some_and(|b| b <= params.min_baseline as f64),
        insufficient_history: history_days_used < min_history,
        session_mismatch: false,
        cap_applied,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::BaselineKey;
    use crate::stats::BaselineMethod;
    use chrono::TimeZone;
    use chrono_tz::US::Eastern;

    fn curve_of(values: Vec<f64>, history_days: u32) -> BaselineCurve {
        BaselineCurve {
            key: BaselineKey {
                symbol: "TEST".into(),
                session: Session::Rth,
                bar_minutes: 1,
                lookback_days: 10,
                method: BaselineMethod::Mean,
                trim_pct: 0.0,
            },
            updated_at: Utc::now(),
            baseline_cumvol: values,
            history_days_used: history_days,
            notes: None,
        }
    }

    fn at_eastern(h: u32, m: u32) -> DateTime<Utc> {
        Eastern
            .with_ymd_and_hms(2024, 6, 5, h, m, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    fn params() -> RvolParams {
        RvolParams {
            session: Session::Rth,
            bar_minutes: 1,
            min_history_days: 5,
            min_baseline: 100,
            cap: None,
        }
    }

    #[test]
    fn ratio_at_slot() {
        let bars = vec![(at_eastern(9, 30), 400u64), (at_eastern(9, 31), 400u64)];
        let curve = curve_of(vec![400.0; 390], 10);
        let r = compute_rvol_time_of_day("TEST", &bars, Some(&curve), at_eastern(9, 31), &params());
        assert_eq!(r.minute_index, Some(1));
        assert_eq!(r.cumvol_today, Some(800));
        assert_eq!(r.rvol_raw, Some(2.0));
        assert_eq!(r.rvol, Some(2.0));
        assert!(!r.cap_applied);
        assert!(!r.baseline_low);
        assert!(!r.insufficient_history);
        assert!(!r.session_mismatch);
    }

    #[test]
    fn outside_session_is_mismatch_not_zero() {
        let r = compute_rvol_time_of_day("TEST", &[], None, at_eastern(8, 0), &params());
        assert!(r.session_mismatch);
        assert_eq!(r.minute_index, None);
        assert_eq!(r.rvol_raw, None);
        assert_eq!(r.cumvol_today, None);
        assert!(r.insufficient_history);
    }

    #[test]
    fn zero_baseline_yields_null_ratio() {
        let bars = vec![(at_eastern(9, 30), 500u64)];
        let curve = curve_of(vec![0.0; 390], 10);
        let r = compute_rvol_time_of_day("TEST", &bars, Some(&curve), at_eastern(9, 30), &params());
        assert_eq!(r.rvol_raw, None);
        assert_eq!(r.rvol, None);
        assert!(!r.cap_applied);
        // Zero baseline is at or below the floor.
        assert!(r.baseline_low);
    }

    #[test]
    fn missing_curve_yields_null_ratio() {
        let bars = vec![(at_eastern(9, 30), 500u64)];
        let r = compute_rvol_time_of_day("TEST", &bars, None, at_eastern(9, 30), &params());
        assert_eq!(r.rvol_raw, None);
        assert_eq!(r.baseline_cumvol, None);
        assert!(!r.baseline_low);
        assert!(r.insufficient_history);
    }

    #[test]
    fn no_bars_yet_reads_zero_volume() {
        let curve = curve_of(vec![1_000.0; 390], 10);
        let r = compute_rvol_time_of_day("TEST", &[], Some(&curve), at_eastern(9, 30), &params());
        assert_eq!(r.cumvol_today, Some(0));
        assert_eq!(r.rvol_raw, Some(0.0));
    }

    #[test]
    fn cap_applies_only_above_cap() {
        let bars = vec![(at_eastern(9, 30), 5_000u64)];
        let curve = curve_of(vec![1_000.0; 390], 10);
        let mut p = params();
        p.cap = Some(3.0);
        let r = compute_rvol_time_of_day("TEST", &bars, Some(&curve), at_eastern(9, 30), &p);
        assert_eq!(r.rvol_raw, Some(5.0));
        assert_eq!(r.rvol, Some(3.0));
        assert!(r.cap_applied);

        p.cap = Some(10.0);
        let r = compute_rvol_time_of_day("TEST", &bars, Some(&curve), at_eastern(9, 30), &p);
        assert_eq!(r.rvol, Some(5.0));
        assert!(!r.cap_applied);
    }

    #[test]
    fn non_positive_cap_is_uncapped() {
        let bars = vec![(at_eastern(9, 30), 5_000u64)];
        let curve = curve_of(vec![10.0; 390], 10);
        let mut p = params();
        p.min_baseline = 0;
        p.cap = Some(0.0);
        let r = compute_rvol_time_of_day("TEST", &bars, Some(&curve), at_eastern(9, 30), &p);
        assert_eq!(r.rvol, r.rvol_raw);
        assert!(!r.cap_applied);
    }

    #[test]
    fn baseline_low_flag_at_floor() {
        let bars = vec![(at_eastern(9, 30), 100u64)];
        let curve = curve_of(vec![100.0; 390], 10);
        let r = compute_rvol_time_of_day("TEST", &bars, Some(&curve), at_eastern(9, 30), &params());
        // baseline == min_baseline counts as low.
        assert!(r.baseline_low);
        assert_eq!(r.rvol_raw, Some(1.0));
    }

    #[test]
    fn insufficient_history_is_independent_of_ratio() {
        let bars = vec![(at_eastern(9, 30), 400u64)];
        let curve = curve_of(vec![200.0; 390], 2);
        let r = compute_rvol_time_of_day("TEST", &bars, Some(&curve), at_eastern(9, 30), &params());
        assert!(r.insufficient_history);
        assert_eq!(r.rvol_raw, Some(2.0));
    }

    #[test]
    fn slot_beyond_curve_bounds() {
        // Curve shorter than the session (corrupt cache entry): null ratio.
        let bars = vec![(at_eastern(10, 0), 400u64)];
        let curve = curve_of(vec![100.0; 10], 10);
        let r = compute_rvol_time_of_day("TEST", &bars, Some(&curve), at_eastern(10, 0), &params());
        assert_eq!(r.baseline_cumvol, None);
        assert_eq!(r.rvol_raw, None);
    }
}
