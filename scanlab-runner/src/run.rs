//! Top-level run driver: build, fall back if the market is closed, write.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use crate::config::ResolvedConfig;
use crate::fallback::resolve_fallback;
use crate::history::RunHistory;
use crate::output;
use crate::payload::WatchlistPayload;
use crate::pipeline::{build_watchlist, PipelineEnv};

/// What a completed run produced and where it landed.
pub struct RunOutcome {
    pub payload: WatchlistPayload,
    pub json_path: PathBuf,
    pub txt_path: PathBuf,
}

/// Build the watchlist, apply the closed-market fallback when warranted,
/// and write the output artifacts and history record.
pub fn execute(
    config: &ResolvedConfig,
    env: &PipelineEnv<'_>,
    now: DateTime<Utc>,
    out_dir: &Path,
) -> Result<RunOutcome> {
    let mut payload = build_watchlist(config, env, now)?;

    if payload.market_phase == "CLOSED" {
        if let Some(base_reason) = closed_reason(config, &payload) {
            let history = RunHistory::in_dir(out_dir);
            // The last output file is the fast path; the history backs it
            // up when the file is gone or was itself a fallback.
            let last = output::load_last(out_dir)
                .filter(|p| !p.fallback_used)
                .or(history.last_genuine().unwrap_or(None));
            let result = resolve_fallback(base_reason, now, &config.fallback, last.as_ref());

            payload.fallback_used = true;
            payload.fallback_reason = Some(result.reason);
            payload.symbols = result.symbols;
            payload.tv_symbols = result.tv_symbols;
        }
    }

    let json_path = output::write_json(out_dir, &payload)?;
    let txt_path = output::write_tradingview_txt(out_dir, &payload)?;
    RunHistory::in_dir(out_dir)
        .append(&payload)
        .context("failed to append run history")?;

    Ok(RunOutcome {
        payload,
        json_path,
        txt_path,
    })
}

/// Why a closed-market run cannot stand on its own, or `None` when its
/// genuine results should publish as-is.
///
/// A non-empty result during closed hours is kept; the fallback engages
/// only for an empty scan, a funnel that eliminated everyone, or, with
/// `require_active_data` set, a scan where every quote lacked a valid
/// last price.
fn closed_reason(config: &ResolvedConfig, payload: &WatchlistPayload) -> Option<&'static str> {
    let counts = payload.scan.counts;
    let all_invalid =
        counts.scan > 0 && payload.scan.drop_reasons.invalid_last >= counts.scan;
    if counts.scan == 0 {
        Some("market_closed_no_candidates")
    } else if config.fallback.require_active_data && all_invalid {
        Some("market_closed_no_active_data")
    } else if counts.final_count == 0 {
        Some("market_closed_filtered_empty")
    } else {
        None
    }
}
