//! Run history — JSONL append-only persistence.
//!
//! One payload per line. The history backs the closed-market fallback when
//! the last output file is missing, and gives a day-over-day record of what
//! the scanner produced.

use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use crate::payload::WatchlistPayload;

pub const HISTORY_FILE: &str = "run_history.jsonl";

/// JSONL history file manager.
pub struct RunHistory {
    path: PathBuf,
}

impl RunHistory {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(HISTORY_FILE))
    }

    /// Append a run to the history file.
    pub fn append(&self, payload: &WatchlistPayload) -> io::Result<()> {
        let json = serde_json::to_string(payload)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{json}")?;
        file.flush()?;
        Ok(())
    }

    /// All recorded runs, oldest first. Malformed lines are skipped.
    pub fn read_all(&self) -> io::Result<Vec<WatchlistPayload>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let file = fs::File::open(&self.path)?;
        let reader = io::BufReader::new(file);
        let mut entries = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<WatchlistPayload>(&line) {
                Ok(entry) => entries.push(entry),
                Err(_) => continue,
            }
        }
        Ok(entries)
    }

    /// The most recent run that produced genuine results (not itself a
    /// fallback re-emission).
    pub fn last_genuine(&self) -> io::Result<Option<WatchlistPayload>> {
        let entries = self.read_all()?;
        Ok(entries.into_iter().rev().find(|p| !p.fallback_used))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Profile, ResolvedConfig};
    use crate::payload::{ConfigEcho, NewsEcho, ScanSummary};
    use chrono::Utc;
    use tempfile::TempDir;

    fn payload(run_id: &str, fallback_used: bool) -> WatchlistPayload {
        let cfg = ResolvedConfig::resolve(None, Profile::Open).unwrap();
        WatchlistPayload {
            run_id: run_id.to_string(),
            generated_utc: Utc::now(),
            generated_exchange_local: "2024-06-05 10:00:00".into(),
            market_phase: "OPEN".into(),
            fallback_used,
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
                reason: None,
            },
            symbols: Vec::new(),
            tv_symbols: Vec::new(),
        }
    }

    #[test]
    fn append_and_read_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let history = RunHistory::in_dir(tmp.path());

        history.append(&payload("run-1", false)).unwrap();
        history.append(&payload("run-2", false)).unwrap();

        let entries = history.read_all().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].run_id, "run-1");
        assert_eq!(entries[1].run_id, "run-2");
    }

    #[test]
    fn last_genuine_skips_fallback_runs() {
        let tmp = TempDir::new().unwrap();
        let history = RunHistory::in_dir(tmp.path());

        history.append(&payload("real", false)).unwrap();
        history.append(&payload("fallback", true)).unwrap();

        let last = history.last_genuine().unwrap().unwrap();
        assert_eq!(last.run_id, "real");
    }

    #[test]
    fn missing_file_reads_empty() {
        let tmp = TempDir::new().unwrap();
        let history = RunHistory::in_dir(tmp.path());
        assert!(history.read_all().unwrap().is_empty());
        assert!(history.last_genuine().unwrap().is_none());
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let tmp = TempDir::new().unwrap();
        let history = RunHistory::in_dir(tmp.path());
        history.append(&payload("good", false)).unwrap();
        std::fs::OpenOptions::new()
            .append(true)
            .open(history.path())
            .map(|mut f| writeln!(f, "{{broken").unwrap())
            .unwrap();
        history.append(&payload("also-good", false)).unwrap();

        let entries = history.read_all().unwrap();
        assert_eq!(entries.len(), 2);
    }
}
