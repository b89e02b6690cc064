//! Baseline curves and RVOL readings.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::session::{to_exchange_local, Session};
use crate::stats::BaselineMethod;

/// Identity key of a baseline curve.
///
/// Two curves with the same key are interchangeable; the cache stores at most
/// one curve per key and replaces on write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineKey {
    pub symbol: String,
    pub session: Session,
    pub bar_minutes: u32,
    pub lookback_days: u32,
    pub method: BaselineMethod,
    pub trim_pct: f64,
}

impl BaselineKey {
    /// Content-addressable cache key (blake3 of the serialized identity).
    ///
    /// Same idea as run-id hashing: identical keys collapse to one cache
    /// entry regardless of how the lookup was constructed.
    pub fn cache_key(&self) -> String {
        let json = serde_json::to_string(self).expect("BaselineKey serialization failed");
        blake3::hash(json.as_bytes()).to_hex().to_string()
    }

    /// Expected slot count for this key's session/bar-size pair.
    pub fn expected_bars(&self) -> usize {
        self.session.bar_count(self.bar_minutes)
    }
}

/// Per-symbol expected cumulative volume at each slot of a trading session,
/// derived from recent historical sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineCurve {
    pub key: BaselineKey,
    /// When the curve was built (UTC). Staleness is judged on the exchange-
    /// local calendar date of this timestamp.
    pub updated_at: DateTime<Utc>,
    /// One value per session slot; length is fixed per (session, bar_size).
    pub baseline_cumvol: Vec<f64>,
    pub history_days_used: u32,
    pub notes: Option<String>,
}

impl BaselineCurve {
    /// A curve is stale once its build date (exchange-local) is not today.
    ///
    /// Same-day lookups reuse the curve unchanged; the next trading day
    /// forces a rebuild. At most one rebuild per symbol per trading day.
    pub fn is_stale(&self, today_local: NaiveDate) -> bool {
        to_exchange_local(self.updated_at).date() != today_local
    }

    /// Baseline value at a slot, if within bounds.
    pub fn value_at(&self, slot: usize) -> Option<f64> {
        self.baseline_cumvol.get(slot).copied()
    }
}

/// Transient per-(symbol, date) volume series inside a session window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayVolumeSeries {
    pub date: NaiveDate,
    /// Per-slot volume.
    pub vol: Vec<u64>,
    /// Running cumulative volume, same length as `vol`.
    pub cumvol: Vec<u64>,
    /// Slots with no bars at all.
    pub missing_bars: u32,
}

impl DayVolumeSeries {
    pub fn cumvol_at(&self, slot: usize) -> Option<u64> {
        self.cumvol.get(slot).copied()
    }
}

/// Output of a live RVOL computation, with explicit quality flags.
///
/// Ratio fields are `None` rather than zero whenever they cannot be computed;
/// a session mismatch is a distinct state, never treated as zero volume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RvolReading {
    pub symbol: String,
    /// Slot of "now" within the session, `None` outside the window.
    pub minute_index: Option<usize>,
    pub cumvol_today: Option<u64>,
    pub baseline_cumvol: Option<f64>,
    /// Uncapped ratio.
    pub rvol_raw: Option<f64>,
    /// Capped ratio (equals `rvol_raw` unless the cap applied).
    pub rvol: Option<f64>,
    pub history_days_used: u32,
    pub baseline_low: bool,
    pub insufficient_history: bool,
    pub session_mismatch: bool,
    pub cap_applied: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn key() -> BaselineKey {
        BaselineKey {
            symbol: "ABCD".into(),
            session: Session::Rth,
            bar_minutes: 1,
            lookback_days: 20,
            method: BaselineMethod::TrimmedMean,
            trim_pct: 0.1,
        }
    }

    #[test]
    fn cache_key_is_deterministic() {
        assert_eq!(key().cache_key(), key().cache_key());
    }

    #[test]
    fn cache_key_changes_with_params() {
        let mut other = key();
        other.lookback_days = 30;
        assert_ne!(key().cache_key(), other.cache_key());
    }

    #[test]
    fn staleness_is_exchange_local_date() {
        // Built 2024-06-04 20:00 Eastern == 2024-06-05 00:00 UTC.
        let curve = BaselineCurve {
            key: key(),
            updated_at: Utc.with_ymd_and_hms(2024, 6, 5, 0, 0, 0).unwrap(),
            baseline_cumvol: vec![0.0; 390],
            history_days_used: 20,
            notes: None,
        };
        let june4 = NaiveDate::from_ymd_opt(2024, 6, 4).unwrap();
        let june5 = NaiveDate::from_ymd_opt(2024, 6, 5).unwrap();
        assert!(!curve.is_stale(june4));
        assert!(curve.is_stale(june5));
    }

    #[test]
    fn value_at_bounds() {
        let curve = BaselineCurve {
            key: key(),
            updated_at: Utc::now(),
            baseline_cumvol: vec![1.0, 2.0],
            history_days_used: 5,
            notes: None,
        };
        assert_eq!(curve.value_at(1), Some(2.0));
        assert_eq!(curve.value_at(2), None);
    }
}
