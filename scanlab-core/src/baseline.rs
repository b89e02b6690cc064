//! Time-of-day cumulative-volume baseline builder.
//!
//! For each of the N prior trading days, the day's bars are bucketed into
//! session-aligned slots; the per-slot cumulative volumes are then reduced
//! across days into a single curve. Days with no bars inside the session
//! window are excluded entirely rather than counted as zero-volume days.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::calendar::TradingCalendar;
use crate::domain::{BaselineCurve, BaselineKey, DayVolumeSeries};
use crate::session::{to_exchange_local, Session};
use crate::stats::{reduce, BaselineMethod};

/// Parameters of a baseline build. These are identity fields: two curves
/// built with different parameters are different cache entries.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BaselineParams {
    pub session: Session,
    pub bar_minutes: u32,
    pub lookback_days: u32,
    pub method: BaselineMethod,
    pub trim_pct: f64,
    /// Below this many usable history days the curve is flagged.
    pub min_history_days: u32,
    /// Data-quality floor for per-slot baseline values, not a statistical
    /// estimate: a near-zero denominator would make RVOL explode.
    pub min_baseline: u64,
}

impl BaselineParams {
    pub fn key_for(&self, symbol: &str) -> BaselineKey {
        BaselineKey {
            symbol: symbol.to_string(),
            session: self.session,
            bar_minutes: self.bar_minutes,
            lookback_days: self.lookback_days,
            method: self.method,
            trim_pct: self.trim_pct,
        }
    }
}

/// Bucket one exchange-local day's bars into session slots.
///
/// Returns `None` when the day has no bars inside the session window at all
/// — such days must not contribute zeros to the baseline.
pub fn day_volume_series(
    bars: &[(DateTime<Utc>, u64)],
    date: NaiveDate,
    session: Session,
    bar_minutes: u32,
) -> Option<DayVolumeSeries> {
    let expected = session.bar_count(bar_minutes);
    let mut vol = vec![0u64; expected];
    let mut counts = vec![0u32; expected];
    let mut found_any = false;

    for &(ts, v) in bars {
        let local = to_exchange_local(ts);
        if local.date() != date {
            continue;
        }
        let Some(slot) = session.slot_index(local, bar_minutes) else {
            continue;
        };
        if slot < expected {
            found_any = true;
            vol[slot] += v;
            counts[slot] += 1;
        }
    }

    if !found_any {
        return None;
    }

    let missing_bars = counts.iter().filter(|&&c| c == 0).count() as u32;
    let mut cumvol = Vec::with_capacity(expected);
    let mut running = 0u64;
    for &v in &vol {
        running += v;
        cumvol.push(running);
    }

    Some(DayVolumeSeries {
        date,
        vol,
        cumvol,
        missing_bars,
    })
}

/// Build a baseline curve for a symbol from its historical bars.
///
/// `bars` may span any range; only the prior trading days resolved from the
/// calendar contribute. "Today" is always excluded so a partially elapsed
/// session cannot drag the curve down.
pub fn build_baseline_curve(
    symbol: &str,
    bars: &[(DateTime<Utc>, u64)],
    now: DateTime<Utc>,
    params: &BaselineParams,
    calendar: &dyn TradingCalendar,
) -> BaselineCurve {
    let today = to_exchange_local(now).date();
    let days = calendar.previous_trading_days(today, params.lookback_days as usize);

    let mut series_list = Vec::with_capacity(days.len());
    let mut missing_total = 0u32;
    for day in days {
        if let Some(series) = day_volume_series(bars, day, params.session, params.bar_minutes) {
            missing_total += series.missing_bars;
            series_list.push(series);
        }
    }

    let history_days_used = series_list.len() as u32;
    let expected = params.session.bar_count(params.bar_minutes);
    let floor = params.min_baseline as f64;

    let mut baseline_cumvol = Vec::with_capacity(expected);
    for slot in 0..expected {
        let samples: Vec<f64> = series_list
            .iter()
            .filter_map(|s| s.cumvol_at(slot))
            .map(|v| v as f64)
            .collect();
        let base = reduce(params.method, &samples, params.trim_pct).unwrap_or(0.0);
        baseline_cumvol.push(base.max(floor));
    }

    let mut notes = Vec::new();
    if history_days_used < params.min_history_days.max(1) {
        notes.push("insufficient_history".to_string());
    }
    if missing_total > 0 {
        notes.push(format!("missing_bars={missing_total}"));
    }
    if history_days_used == 0 {
        notes.push("no_history".to_string());
    }

    BaselineCurve {
        key: params.key_for(symbol),
        updated_at: now,
        baseline_cumvol,
        history_days_used,
        notes: if notes.is_empty() {
            None
        } else {
            Some(notes.join(";"))
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::UsEquityCalendar;
    use chrono::{NaiveDate, TimeZone};
    use chrono_tz::US::Eastern;

    fn params(method: BaselineMethod, min_baseline: u64) -> BaselineParams {
        BaselineParams {
            session: Session::Rth,
            bar_minutes: 1,
            lookback_days: 3,
            method,
            trim_pct: 0.0,
            min_history_days: 1,
            min_baseline,
        }
    }

    /// Bar at Eastern wall-clock time, returned as UTC.
    fn bar(date: NaiveDate, h: u32, m: u32, vol: u64) -> (DateTime<Utc>, u64) {
        use chrono::Datelike;
        let local = Eastern
            .with_ymd_and_hms(date.year(), date.month(), date.day(), h, m, 0)
            .unwrap();
        (local.with_timezone(&Utc), vol)
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn day_series_buckets_and_accumulates() {
        let date = d(2024, 6, 4);
        let bars = vec![bar(date, 9, 30, 100), bar(date, 9, 31, 50)];
        let series = day_volume_series(&bars, date, Session::Rth, 1).unwrap();
        assert_eq!(series.vol.len(), 390);
        assert_eq!(series.vol[0], 100);
        assert_eq!(series.cumvol[1], 150);
        assert_eq!(series.missing_bars, 388);
    }

    #[test]
    fn day_series_none_without_session_bars() {
        let date = d(2024, 6, 4);
        // 08:00 Eastern is outside RTH.
        let bars = vec![bar(date, 8, 0, 1_000)];
        assert!(day_volume_series(&bars, date, Session::Rth, 1).is_none());
        // But inside RTH+PRE.
        assert!(day_volume_series(&bars, date, Session::RthPre, 1).is_some());
    }

    #[test]
    fn curve_length_matches_session() {
        let now = Eastern
            .with_ymd_and_hms(2024, 6, 5, 10, 0, 0)
            .unwrap()
            .with_timezone(&Utc);
        let curve = build_baseline_curve(
            "TEST",
            &[],
            now,
            &params(BaselineMethod::Mean, 0),
            &UsEquityCalendar,
        );
        assert_eq!(curve.baseline_cumvol.len(), 390);
        assert_eq!(curve.history_days_used, 0);
        assert!(curve.notes.as_deref().unwrap().contains("no_history"));
    }

    #[test]
    fn mean_curve_over_three_days() {
        // Prior trading days of Wed 2024-06-05: 06-04, 06-03, 05-31.
        let mut bars = Vec::new();
        for (date, v) in [(d(2024, 6, 4), 100), (d(2024, 6, 3), 200), (d(2024, 5, 31), 300)] {
            bars.push(bar(date, 9, 30, v));
            bars.push(bar(date, 9, 31, v));
        }
        let now = Eastern
            .with_ymd_and_hms(2024, 6, 5, 10, 0, 0)
            .unwrap()
            .with_timezone(&Utc);
        let curve = build_baseline_curve(
            "TEST",
            &bars,
            now,
            &params(BaselineMethod::Mean, 0),
            &UsEquityCalendar,
        );
        assert_eq!(curve.history_days_used, 3);
        assert!((curve.baseline_cumvol[0] - 200.0).abs() < 1e-9);
        assert!((curve.baseline_cumvol[1] - 400.0).abs() < 1e-9);
    }

    #[test]
    fn two_day_mean_scenario() {
        // Two prior days each with cumulative volume 400 at slot 1.
        let mut bars = Vec::new();
        for date in [d(2024, 6, 4), d(2024, 6, 3)] {
            bars.push(bar(date, 9, 30, 150));
            bars.push(bar(date, 9, 31, 250));
        }
        let now = Eastern
            .with_ymd_and_hms(2024, 6, 5, 9, 45, 0)
            .unwrap()
            .with_timezone(&Utc);
        let mut p = params(BaselineMethod::Mean, 0);
        p.lookback_days = 2;
        let curve = build_baseline_curve("TEST", &bars, now, &p, &UsEquityCalendar);
        assert!((curve.baseline_cumvol[1] - 400.0).abs() < 1e-9);
    }

    #[test]
    fn floor_applies_per_slot() {
        let date = d(2024, 6, 4);
        let bars = vec![bar(date, 9, 30, 10)];
        let now = Eastern
            .with_ymd_and_hms(2024, 6, 5, 10, 0, 0)
            .unwrap()
            .with_timezone(&Utc);
        let curve = build_baseline_curve(
            "TEST",
            &bars,
            now,
            &params(BaselineMethod::Mean, 500),
            &UsEquityCalendar,
        );
        // Raw mean at slot 0 is 10, floored to 500; empty slots floor too.
        assert!(curve.baseline_cumvol.iter().all(|&v| v >= 500.0));
    }

    #[test]
    fn todays_bars_do_not_contribute() {
        let today = d(2024, 6, 5);
        let bars = vec![bar(today, 9, 30, 1_000_000)];
        let now = Eastern
            .with_ymd_and_hms(2024, 6, 5, 10, 0, 0)
            .unwrap()
            .with_timezone(&Utc);
        let curve = build_baseline_curve(
            "TEST",
            &bars,
            now,
            &params(BaselineMethod::Mean, 0),
            &UsEquityCalendar,
        );
        assert_eq!(curve.history_days_used, 0);
        assert!(curve.baseline_cumvol.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn insufficient_history_noted() {
        let date = d(2024, 6, 4);
        let bars = vec![bar(date, 9, 30, 100)];
        let now = Eastern
            .with_ymd_and_hms(2024, 6, 5, 10, 0, 0)
            .unwrap()
            .with_timezone(&Utc);
        let mut p = params(BaselineMethod::Mean, 0);
        p.min_history_days = 5;
        let curve = build_baseline_curve("TEST", &bars, now, &p, &UsEquityCalendar);
        assert!(curve
            .notes
            .as_deref()
            .unwrap()
            .contains("insufficient_history"));
    }
}
