//! Closed-market fallback.
//!
//! When the market is closed or the scan produces nothing usable, the run
//! still emits a payload: either an empty one with a reason, or, in
//! `last_ok`/`research` mode, the previous genuine results re-tagged as a
//! fallback. A re-emitted payload always carries `fallback_used = true` so
//! nothing downstream can mistake it for live output.

use chrono::{DateTime, Utc};

use crate::config::{FallbackConfig, FallbackMode};
use crate::payload::{SymbolRow, WatchlistPayload};

/// What the fallback decided to emit.
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackResult {
    pub symbols: Vec<SymbolRow>,
    pub tv_symbols: Vec<String>,
    /// Base reason, possibly suffixed `_stale` or `_no_last`.
    pub reason: String,
    /// Run id of the re-emitted payload, when one was reused.
    pub reused_run_id: Option<String>,
}

impl FallbackResult {
    fn empty(reason: String) -> Self {
        Self {
            symbols: Vec::new(),
            tv_symbols: Vec::new(),
            reason,
            reused_run_id: None,
        }
    }
}

/// Decide what to emit for a run that cannot produce genuine results.
///
/// `last` is the previous genuine payload, if any (the caller checks the
/// output file first, then the run history).
pub fn resolve_fallback(
    base_reason: &str,
    now: DateTime<Utc>,
    config: &FallbackConfig,
    last: Option<&WatchlistPayload>,
) -> FallbackResult {
    if config.mode == FallbackMode::Empty {
        return FallbackResult::empty(base_reason.to_string());
    }

    let Some(last) = last else {
        return FallbackResult::empty(format!("{base_reason}_no_last"));
    };

    // Only last_ok applies the staleness window; research mode reuses
    // whatever exists, however old.
    if config.mode == FallbackMode::LastOk {
        let age = now.signed_duration_since(last.generated_utc);
        let max_age = chrono::Duration::hours(config.stale_max_hours as i64);
        if age > max_age || age < chrono::Duration::zero() {
            return FallbackResult::empty(format!("{base_reason}_stale"));
        }
    }

    FallbackResult {
        symbols: last.symbols.clone(),
        tv_symbols: last.tv_symbols.clone(),
        reason: base_reason.to_string(),
        reused_run_id: Some(last.run_id.clone()),
    }
}
