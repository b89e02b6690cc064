//! The watchlist pipeline: scan, filter, enrich, rank, emit.
//!
//! One run is strictly sequential: scan rows in, basic filters, float
//! lookups, RVOL for the top movers, sanity checks, news, scoring, output.
//! Storage failures abort the run; a single symbol's provider hiccup only
//! costs that symbol its enrichment.

use std::time::Duration as StdDuration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use scanlab_core::baseline::BaselineParams;
use scanlab_core::calendar::{market_phase, MarketPhase, TradingCalendar};
use scanlab_core::domain::{CandidateMetrics, MinuteBar};
use scanlab_core::funnel::{
    admit_snapshot, float_passes, rvol_passes, spread_passes, DropReasons, FunnelCounts,
};
use scanlab_core::rvol::{compute_rvol_time_of_day, RvolParams};
use scanlab_core::sanity::run_sanity_checks;
use scanlab_core::scoring::{grade_and_score, log_rvol_score};
use scanlab_core::session::to_exchange_local;

use crate::bar_cache::BarCache;
use crate::baseline_store;
use crate::config::{Profile, ProfileRequest, ResolvedConfig};
use crate::payload::{
    exchange_local_stamp, make_run_id, ConfigEcho, NewsEcho, ScanSummary, SymbolRow,
    WatchlistPayload,
};
use crate::providers::float::FloatProvider;
use crate::providers::news::{NewsOutcome, NewsProvider};
use crate::providers::{MarketDataSource, ProviderError};

/// Everything a run needs from the outside world.
pub struct PipelineEnv<'a> {
    pub market: &'a dyn MarketDataSource,
    pub float_provider: Option<&'a dyn FloatProvider>,
    pub news_provider: Option<&'a dyn NewsProvider>,
    pub cache: &'a BarCache,
    pub calendar: &'a dyn TradingCalendar,
}

/// Pick the profile for a run. `auto` follows the market phase: the open
/// profile during regular hours, the pre-market profile everywhere else.
pub fn select_profile(request: ProfileRequest, phase: MarketPhase) -> Profile {
    match request {
        ProfileRequest::Fixed(p) => p,
        ProfileRequest::Auto => match phase {
            MarketPhase::Open => Profile::Open,
            _ => Profile::Pre,
        },
    }
}

/// Build the watchlist payload for `now`. Pure with respect to the output
/// directory; fallback and file writing live in the caller.
pub fn build_watchlist(
    config: &ResolvedConfig,
    env: &PipelineEnv<'_>,
    now: DateTime<Utc>,
) -> Result<WatchlistPayload> {
    let phase = market_phase(now, env.calendar);
    let today = to_exchange_local(now).date();

    // ── Scan ─────────────────────────────────────────────────────────
    let page = env.market.scan().context("scan failed")?;
    let raw_candidates = page.rows.len() as u64 + page.parse_errors;

    let mut rows = page.rows;
    let mut excluded_otc_pink = 0u64;
    if config.exclude_otc_pink {
        let before = rows.len();
        rows.retain(|r| !r.candidate.is_otc_pink());
        excluded_otc_pink = (before - rows.len()) as u64;
    }
    rows.truncate(config.filters.max_candidates);

    let seen: Vec<(String, Option<String>)> = rows
        .iter()
        .map(|r| (r.candidate.symbol.clone(), r.candidate.exchange.clone()))
        .collect();
    env.cache
        .record_symbols(&seen, today)
        .context("symbol registry write failed")?;

    let mut counts = FunnelCounts {
        scan: rows.len() as u64,
        ..Default::default()
    };
    let mut drop_reasons = DropReasons::default();

    // ── Basic filters ────────────────────────────────────────────────
    let mut candidates: Vec<CandidateMetrics> = Vec::new();
    for row in &rows {
        match admit_snapshot(&row.quote, &config.filters) {
            Ok(admitted) => {
                let mut m = CandidateMetrics::new(
                    row.candidate.symbol.clone(),
                    row.candidate.exchange.clone(),
                );
                m.last = Some(admitted.last);
                m.prev_close = Some(admitted.prev_close);
                m.change_pct = Some(admitted.change_pct);
                m.volume_today = Some(admitted.volume_today);
                m.bid = admitted.bid;
                m.ask = admitted.ask;
                m.spread = admitted.spread;
                m.spread_pct = admitted.spread_pct;
                candidates.push(m);
            }
            Err(reason) => drop_reasons.record(reason),
        }
    }
    counts.prelim = candidates.len() as u64;

    // ── Float ────────────────────────────────────────────────────────
    // The cache can answer even without a configured provider.
    let mut float_enabled = config.float.enabled;
    for m in &mut candidates {
        if !float_enabled {
            break;
        }
        match resolve_float(config, env, &m.symbol, today) {
            FloatResolution::Known(shares) => m.float_shares = Some(shares),
            FloatResolution::Unknown => {}
            FloatResolution::FeatureDisabled => float_enabled = false,
        }
    }
    candidates.retain(|m| float_passes(m.float_shares, &config.filters));
    counts.filtered = candidates.len() as u64;

    // ── RVOL for the top movers ──────────────────────────────────────
    candidates.sort_by(|a, b| {
        let ca = a.change_pct.unwrap_or(0.0);
        let cb = b.change_pct.unwrap_or(0.0);
        cb.partial_cmp(&ca).unwrap_or(std::cmp::Ordering::Equal)
    });

    let top_k = config.filters.max_rvol_symbols.min(candidates.len());
    for m in candidates.iter_mut().take(top_k) {
        compute_symbol_rvol(config, env, m, now)?;
    }

    // Live feeds demand a ratio; delayed feeds may waive a missing one.
    let rvol_required = !(config.rvol.permissive_when_delayed && !env.market.live());
    candidates.retain(|m| {
        let rvol_for_filter = m.rvol_raw.or(m.rvol);
        rvol_passes(rvol_for_filter, &config.filters, rvol_required)
    });

    // ── Spread ───────────────────────────────────────────────────────
    candidates.retain(|m| spread_passes(m.spread, m.spread_pct, &config.filters));
    counts.final_count = candidates.len() as u64;
    debug_assert!(counts.invariant_holds());

    // ── Sanity ───────────────────────────────────────────────────────
    for m in &mut candidates {
        let flags = run_sanity_checks(
            m.last,
            m.prev_close,
            m.change_pct,
            m.spread_pct,
            m.volume_today,
            &config.sanity,
        );
        m.suspect_corporate_action = flags.suspect_corporate_action;
        m.suspect_data = flags.suspect_data;
    }

    // ── News ─────────────────────────────────────────────────────────
    let outcome = fetch_news(config, env, &candidates, now);
    apply_news(&mut candidates, &outcome);

    // ── Score and rank ───────────────────────────────────────────────
    for m in &mut candidates {
        grade_and_score(m, &config.filters, &config.weights, &config.grades);
    }
    crate::payload::rank(&mut candidates);

    let symbols: Vec<SymbolRow> = candidates.iter().map(SymbolRow::from_metrics).collect();
    let tv_symbols: Vec<String> = symbols.iter().map(|r| r.tv_symbol.clone()).collect();

    Ok(WatchlistPayload {
        run_id: make_run_id(config, now),
        generated_utc: now,
        generated_exchange_local: exchange_local_stamp(now),
        market_phase: phase.as_str().to_string(),
        fallback_used: false,
        fallback_reason: None,
        config: ConfigEcho {
            profile: config.profile,
            session: config.rvol.session,
            scanner: config.filters,
            rvol: config.rvol,
        },
        scan: ScanSummary {
            raw_candidates,
            parse_errors: page.parse_errors,
            excluded_otc_pink,
            counts,
            drop_reasons,
        },
        news: NewsEcho::from_outcome(&outcome, config.news.lookback_hours),
        symbols,
        tv_symbols,
    })
}

enum FloatResolution {
    Known(u64),
    Unknown,
    /// HTTP 402: the plan does not cover the endpoint; stop asking.
    FeatureDisabled,
}

/// Day cache first, then any snapshot inside the stale window, then the
/// provider. The network is the last resort.
fn resolve_float(
    config: &ResolvedConfig,
    env: &PipelineEnv<'_>,
    symbol: &str,
    today: chrono::NaiveDate,
) -> FloatResolution {
    let cache_hit = |days: u32| env.cache.float_for(symbol, today, days).ok().flatten();

    if let Some(snap) = cache_hit(0) {
        return FloatResolution::Known(snap.float_shares);
    }
    if let Some(snap) = cache_hit(config.float.allow_stale_days) {
        return FloatResolution::Known(snap.float_shares);
    }
    let Some(provider) = env.float_provider else {
        return FloatResolution::Unknown;
    };
    match provider.fetch_float(symbol, today) {
        Ok(snap) => {
            let _ = env.cache.put_float(&snap);
            FloatResolution::Known(snap.float_shares)
        }
        Err(ProviderError::PaymentRequired) => FloatResolution::FeatureDisabled,
        Err(_) => FloatResolution::Unknown,
    }
}

/// Fill one candidate's RVOL fields. Provider trouble for the symbol leaves
/// the fields empty; storage trouble aborts the run.
fn compute_symbol_rvol(
    config: &ResolvedConfig,
    env: &PipelineEnv<'_>,
    m: &mut CandidateMetrics,
    now: DateTime<Utc>,
) -> Result<()> {
    let rvol_cfg = &config.rvol;
    let expected_per_day = rvol_cfg.session.bar_count(rvol_cfg.bar_minutes);
    let want = expected_per_day * rvol_cfg.min_history_days.max(1) as usize;

    let mut bars = env
        .cache
        .bars_for(&m.symbol)
        .with_context(|| format!("bar cache read failed for {}", m.symbol))?;

    if bars.len() < want {
        // Pad the window a week so weekends and holidays still yield the
        // full lookback in trading days.
        let duration_days = rvol_cfg.lookback_days + 7;
        match env
            .market
            .historical_bars(&m.symbol, duration_days, rvol_cfg.bar_minutes)
        {
            Ok(fetched) => {
                env.cache
                    .upsert_bars(&m.symbol, &fetched)
                    .with_context(|| format!("bar cache write failed for {}", m.symbol))?;
                bars = env
                    .cache
                    .bars_for(&m.symbol)
                    .with_context(|| format!("bar cache re-read failed for {}", m.symbol))?;
                if rvol_cfg.throttle_ms > 0 {
                    std::thread::sleep(StdDuration::from_millis(rvol_cfg.throttle_ms));
                }
            }
            // Timeouts and provider hiccups cost this symbol its RVOL,
            // never the run.
            Err(_) => return Ok(()),
        }
    }

    let vol_bars: Vec<(DateTime<Utc>, u64)> =
        bars.iter().map(|b: &MinuteBar| (b.ts, b.volume)).collect();

    let params = BaselineParams {
        session: rvol_cfg.session,
        bar_minutes: rvol_cfg.bar_minutes,
        lookback_days: rvol_cfg.lookback_days,
        method: rvol_cfg.method,
        trim_pct: rvol_cfg.trim_pct,
        min_history_days: rvol_cfg.min_history_days,
        min_baseline: rvol_cfg.min_baseline,
    };
    let (curve, _) = baseline_store::get_or_build(
        env.cache,
        &m.symbol,
        &vol_bars,
        now,
        &params,
        env.calendar,
    )
    .with_context(|| format!("baseline store failed for {}", m.symbol))?;

    let cap = (rvol_cfg.cap > 0.0).then_some(rvol_cfg.cap);
    let reading = compute_rvol_time_of_day(
        &m.symbol,
        &vol_bars,
        Some(&curve),
        now,
        &RvolParams {
            session: rvol_cfg.session,
            bar_minutes: rvol_cfg.bar_minutes,
            min_history_days: rvol_cfg.min_history_days,
            min_baseline: rvol_cfg.min_baseline,
            cap,
        },
    );

    m.rvol = reading.rvol;
    m.rvol_raw = reading.rvol_raw;
    m.rvol_cumvol_today = reading.cumvol_today;
    m.rvol_baseline = reading.baseline_cumvol;
    m.rvol_minute_index = reading.minute_index;
    m.rvol_days_valid = Some(reading.history_days_used);
    m.rvol_cap_applied = Some(reading.cap_applied);
    m.rvol_baseline_low = Some(reading.baseline_low);
    m.rvol_insufficient_history = Some(reading.insufficient_history);
    m.rvol_session_mismatch = Some(reading.session_mismatch);
    m.rvol_score = reading.rvol_raw.map(|r| log_rvol_score(r, cap));
    Ok(())
}

fn fetch_news(
    config: &ResolvedConfig,
    env: &PipelineEnv<'_>,
    candidates: &[CandidateMetrics],
    now: DateTime<Utc>,
) -> NewsOutcome {
    if !config.news.enabled {
        return NewsOutcome::Disabled {
            reason: "disabled in config".to_string(),
        };
    }
    let Some(provider) = env.news_provider else {
        return NewsOutcome::Disabled {
            reason: format!("no API key ({} unset)", config.news.api_key_env),
        };
    };
    let symbols: Vec<String> = candidates.iter().map(|m| m.symbol.clone()).collect();
    provider.fetch(&symbols, now, config.news.lookback_hours)
}

/// Set catalyst fields from the news outcome. An unanswerable question is
/// `has_catalyst = None` with an explanatory placeholder, never `false`.
fn apply_news(candidates: &mut [CandidateMetrics], outcome: &NewsOutcome) {
    match outcome {
        NewsOutcome::Ok(report) => {
            for m in candidates {
                let has = report.has_catalyst(&m.symbol);
                m.has_catalyst = Some(has);
                m.catalyst = if has {
                    Some(
                        report
                            .catalyst_text(&m.symbol)
                            .unwrap_or_else(|| "news".to_string()),
                    )
                } else if m.suspect_corporate_action {
                    Some("corporate_action_suspect".to_string())
                } else {
                    None
                };
                m.catalyst_source = has.then(|| report.provider.clone());
                m.catalyst_error = None;
            }
        }
        NewsOutcome::Disabled { reason } => {
            for m in candidates {
                m.has_catalyst = None;
                m.catalyst = Some("unavailable".to_string());
                m.catalyst_source = None;
                m.catalyst_error = Some(reason.clone());
            }
        }
        NewsOutcome::Restricted { status, .. } => {
            for m in candidates {
                m.has_catalyst = None;
                m.catalyst = Some("unavailable".to_string());
                m.catalyst_source = None;
                m.catalyst_error = Some(format!("HTTP {status}"));
            }
        }
        NewsOutcome::Failed { error } => {
            for m in candidates {
                m.has_catalyst = None;
                m.catalyst = Some("unknown".to_string());
                m.catalyst_source = None;
                m.catalyst_error = Some(error.clone());
            }
        }
    }
}
