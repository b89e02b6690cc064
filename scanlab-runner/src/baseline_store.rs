//! Day-scoped baseline curve reuse.
//!
//! A curve built earlier today (exchange-local) answers every later run of
//! the day; a curve from a previous day is rebuilt once, on first touch.
//! That gives at most one rebuild per symbol per trading day.

use chrono::{DateTime, Utc};

use scanlab_core::baseline::{build_baseline_curve, BaselineParams};
use scanlab_core::calendar::TradingCalendar;
use scanlab_core::domain::BaselineCurve;
use scanlab_core::session::to_exchange_local;

use crate::bar_cache::{BarCache, StorageError};

/// Whether a curve came from the cache or was rebuilt this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurveOrigin {
    Reused,
    Rebuilt,
}

/// Fetch the symbol's curve, rebuilding from `bars` only when the cached
/// entry is from a previous exchange-local day (or absent).
pub fn get_or_build(
    cache: &BarCache,
    symbol: &str,
    bars: &[(DateTime<Utc>, u64)],
    now: DateTime<Utc>,
    params: &BaselineParams,
    calendar: &dyn TradingCalendar,
) -> Result<(BaselineCurve, CurveOrigin), StorageError> {
    let key = params.key_for(symbol);
    let today = to_exchange_local(now).date();

    if let Some(curve) = cache.curve_for(&key)? {
        if !curve.is_stale(today) {
            return Ok((curve, CurveOrigin::Reused));
        }
    }

    let curve = build_baseline_curve(symbol, bars, now, params, calendar);
    cache.put_curve(&curve)?;
    Ok((curve, CurveOrigin::Rebuilt))
}
