//! Output artifacts: the JSON payload and the TradingView import list.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::payload::WatchlistPayload;

pub const WATCHLIST_FILE: &str = "watchlist.json";
pub const TRADINGVIEW_FILE: &str = "tradingview_import.txt";

pub fn watchlist_path(out_dir: &Path) -> PathBuf {
    out_dir.join(WATCHLIST_FILE)
}

/// Write the payload as pretty JSON, creating the directory if needed.
pub fn write_json(out_dir: &Path, payload: &WatchlistPayload) -> Result<PathBuf> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create output dir {}", out_dir.display()))?;
    let path = watchlist_path(out_dir);
    let json = serde_json::to_string_pretty(payload).context("failed to serialize watchlist")?;
    std::fs::write(&path, json)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

/// Write the comma-joined TradingView import list, in payload row order.
pub fn write_tradingview_txt(out_dir: &Path, payload: &WatchlistPayload) -> Result<PathBuf> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create output dir {}", out_dir.display()))?;
    let path = out_dir.join(TRADINGVIEW_FILE);
    let line = payload.tv_symbols.join(",");
    std::fs::write(&path, line)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

/// The previous run's payload from the output directory, if readable.
/// A missing or corrupt file is simply "no previous output".
pub fn load_last(out_dir: &Path) -> Option<WatchlistPayload> {
    let path = watchlist_path(out_dir);
    let text = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&text).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Profile, ResolvedConfig};
    use crate::payload::{ConfigEcho, NewsEcho, ScanSummary};
    use chrono::Utc;

    fn payload(run_id: &str) -> WatchlistPayload {
        let cfg = ResolvedConfig::resolve(None, Profile::Open).unwrap();
        WatchlistPayload {
            run_id: run_id.to_string(),
            generated_utc: Utc::now(),
            generated_exchange_local: "2024-06-05 10:00:00".into(),
            market_phase: "OPEN".into(),
            fallback_used: false,
            fallback_reason: None,
            config: ConfigEcho {
                profile: cfg.profile,
                session: cfg.rvol.session,
                scanner: cfg.filters,
                rvol: cfg.rvol,
            },
            scan: ScanSummary::default(),
            news: NewsEcho {
                enabled: false,
                provider: None,
                lookback_hours: 24,
                status: "disabled".into(),
                reason: Some("test".into()),
            },
            symbols: Vec::new(),
            tv_symbols: vec!["NASDAQ:ABCD".into(), "NYSE:WXYZ".into()],
        }
    }

    #[test]
    fn json_roundtrip_via_load_last() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(load_last(tmp.path()).is_none());

        let p = payload("run-1");
        write_json(tmp.path(), &p).unwrap();
        let loaded = load_last(tmp.path()).unwrap();
        assert_eq!(loaded.run_id, "run-1");
        assert_eq!(loaded.tv_symbols, p.tv_symbols);
    }

    #[test]
    fn tradingview_txt_is_comma_joined() {
        let tmp = tempfile::tempdir().unwrap();
        let p = payload("run-2");
        let path = write_tradingview_txt(tmp.path(), &p).unwrap();
        let text = std::fs::read_to_string(path).unwrap();
        assert_eq!(text, "NASDAQ:ABCD,NYSE:WXYZ");
    }

    #[test]
    fn corrupt_previous_output_is_ignored() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(watchlist_path(tmp.path()), "{not json").unwrap();
        assert!(load_last(tmp.path()).is_none());
    }
}
