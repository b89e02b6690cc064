//! The watchlist output document.
//!
//! Top-level bookkeeping uses snake_case; per-symbol rows use camelCase for
//! the downstream chart tooling that consumes them. Rows are ordered by
//! grade, best first, then score descending within a grade.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use scanlab_core::domain::{CandidateMetrics, Grade};
use scanlab_core::funnel::{DropReasons, FilterLimits, FunnelCounts};
use scanlab_core::session::{to_exchange_local, Session};
use scanlab_core::symbols::tv_symbol;

use crate::config::{Profile, ResolvedConfig, RvolConfig};
use crate::providers::news::NewsOutcome;

/// Funnel accounting for the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanSummary {
    /// Rows the scan returned, including unparseable ones.
    pub raw_candidates: u64,
    pub parse_errors: u64,
    pub excluded_otc_pink: u64,
    #[serde(flatten)]
    pub counts: FunnelCounts,
    pub drop_reasons: DropReasons,
}

/// How the news feature fared this run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsEcho {
    pub enabled: bool,
    pub provider: Option<String>,
    pub lookback_hours: u32,
    /// "ok", "disabled", "restricted", or "failed".
    pub status: String,
    pub reason: Option<String>,
}

impl NewsEcho {
    pub fn from_outcome(outcome: &NewsOutcome, lookback_hours: u32) -> Self {
        match outcome {
            NewsOutcome::Ok(report) => Self {
                enabled: true,
                provider: Some(report.provider.clone()),
                lookback_hours,
                status: "ok".to_string(),
                reason: None,
            },
            NewsOutcome::Disabled { reason } => Self {
                enabled: false,
                provider: None,
                lookback_hours,
                status: "disabled".to_string(),
                reason: Some(reason.clone()),
            },
            NewsOutcome::Restricted { provider, status } => Self {
                enabled: true,
                provider: Some(provider.clone()),
                lookback_hours,
                status: "restricted".to_string(),
                reason: Some(format!("HTTP {status}")),
            },
            NewsOutcome::Failed { error } => Self {
                enabled: true,
                provider: None,
                lookback_hours,
                status: "failed".to_string(),
                reason: Some(error.clone()),
            },
        }
    }
}

/// Echo of the knobs the run executed against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigEcho {
    pub profile: Profile,
    pub session: Session,
    pub scanner: FilterLimits,
    pub rvol: RvolConfig,
}

/// RVOL quality flags on one row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RvolFlags {
    pub baseline_low: bool,
    pub insufficient_history: bool,
    pub session_mismatch: bool,
    pub cap_applied: bool,
}

/// One ranked symbol, shaped for downstream consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolRow {
    pub symbol: String,
    pub tv_symbol: String,
    pub exchange: Option<String>,
    pub last: Option<f64>,
    pub prev_close: Option<f64>,
    pub change_pct: Option<f64>,
    pub volume: Option<u64>,
    pub bid: Option<f64>,
    pub ask: Option<f64>,
    pub spread: Option<f64>,
    pub spread_pct: Option<f64>,
    pub float_shares: Option<u64>,
    pub rvol: Option<f64>,
    pub rvol_raw: Option<f64>,
    pub rvol_cum_vol: Option<u64>,
    pub rvol_baseline: Option<f64>,
    pub rvol_minute_index: Option<usize>,
    pub rvol_days_valid: Option<u32>,
    pub rvol_score: Option<f64>,
    pub rvol_flags: RvolFlags,
    pub has_catalyst: Option<bool>,
    pub catalyst: Option<String>,
    pub catalyst_source: Option<String>,
    pub catalyst_error: Option<String>,
    pub suspect_corporate_action: bool,
    pub suspect_data: bool,
    pub grade: Option<Grade>,
    pub score: Option<f64>,
}

impl SymbolRow {
    pub fn from_metrics(m: &CandidateMetrics) -> Self {
        Self {
            tv_symbol: tv_symbol(&m.symbol, m.exchange.as_deref()),
            symbol: m.symbol.clone(),
            exchange: m.exchange.clone(),
            last: m.last,
            prev_close: m.prev_close,
            change_pct: m.change_pct,
            volume: m.volume_today,
            bid: m.bid,
            ask: m.ask,
            spread: m.spread,
            spread_pct: m.spread_pct,
            float_shares: m.float_shares,
            rvol: m.rvol,
            rvol_raw: m.rvol_raw,
            rvol_cum_vol: m.rvol_cumvol_today,
            rvol_baseline: m.rvol_baseline,
            rvol_minute_index: m.rvol_minute_index,
            rvol_days_valid: m.rvol_days_valid,
            rvol_score: m.rvol_score,
            rvol_flags: RvolFlags {
                baseline_low: m.rvol_baseline_low.unwrap_or(false),
                insufficient_history: m.rvol_insufficient_history.unwrap_or(false),
                session_mismatch: m.rvol_session_mismatch.unwrap_or(false),
                cap_applied: m.rvol_cap_applied.unwrap_or(false),
            },
            has_catalyst: m.has_catalyst,
            catalyst: m.catalyst.clone(),
            catalyst_source: m.catalyst_source.clone(),
            catalyst_error: m.catalyst_error.clone(),
            suspect_corporate_action: m.suspect_corporate_action,
            suspect_data: m.suspect_data,
            grade: m.grade,
            score: m.score,
        }
    }
}

/// The full run output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchlistPayload {
    pub run_id: String,
    pub generated_utc: DateTime<Utc>,
    /// Exchange-local wall clock, for humans reading the file.
    pub generated_exchange_local: String,
    pub market_phase: String,
    pub fallback_used: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub fallback_reason: Option<String>,
    pub config: ConfigEcho,
    pub scan: ScanSummary,
    pub news: NewsEcho,
    pub symbols: Vec<SymbolRow>,
    /// Comma-joinable import list, in row order.
    pub tv_symbols: Vec<String>,
}

/// Content-hash run id: the resolved config plus the generation instant.
pub fn make_run_id(config: &ResolvedConfig, generated_utc: DateTime<Utc>) -> String {
    let mut hasher = blake3::Hasher::new();
    let config_json =
        serde_json::to_string(config).unwrap_or_else(|_| config.profile.to_string());
    hasher.update(config_json.as_bytes());
    hasher.update(generated_utc.to_rfc3339().as_bytes());
    hasher.finalize().to_hex().to_string()
}

/// Exchange-local timestamp string for the payload header.
pub fn exchange_local_stamp(now: DateTime<Utc>) -> String {
    to_exchange_local(now).format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Order metrics by grade (best first), then score descending, then symbol
/// for a stable tiebreak.
pub fn rank(metrics: &mut [CandidateMetrics]) {
    metrics.sort_by(|a, b| {
        let ga = a.grade.unwrap_or(Grade::D);
        let gb = b.grade.unwrap_or(Grade::D);
        ga.cmp(&gb)
            .then_with(|| {
                let sa = a.score.unwrap_or(0.0);
                let sb = b.score.unwrap_or(0.0);
                sb.partial_cmp(&sa).unwrap_or(std::cmp::Ordering::Equal)
            })
            .then_with(|| a.symbol.cmp(&b.symbol))
    });
}
