//! On-disk cache for minute bars, baseline curves, and float snapshots.
//!
//! Plain JSON files under one root directory:
//!   bars/{SYMBOL}.json    sorted minute bars, upserted by timestamp
//!   curves/{key}.json     baseline curves keyed by content hash
//!   floats/{SYMBOL}.json  dated float snapshots, newest usable wins
//!   registry.json         symbols seen in scans, with exchange and date
//!
//! Storage failures are fatal to the run. Silently recomputing baselines on
//! every run because the cache cannot be written would look like a working
//! system with pathological provider load.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use scanlab_core::domain::{BaselineCurve, BaselineKey, FloatSnapshot, MinuteBar};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("cache I/O failed at {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("cache entry at {path} is corrupt: {source}")]
    Corrupt {
        path: String,
        source: serde_json::Error,
    },
}

fn io_err(path: &Path, source: std::io::Error) -> StorageError {
    StorageError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// File-backed cache. Cloneable handle; all state is on disk.
#[derive(Clone)]
pub struct BarCache {
    root: PathBuf,
}

/// Counts for `cache status`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStatus {
    pub bar_files: usize,
    pub curve_files: usize,
    pub float_files: usize,
    pub symbols_seen: usize,
    pub total_bytes: u64,
}

/// Registry entry: what we know about a symbol across runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolInfo {
    pub exchange: Option<String>,
    pub last_seen: NaiveDate,
}

impl BarCache {
    pub fn open(root: impl AsRef<Path>) -> Result<Self, StorageError> {
        let root = root.as_ref().to_path_buf();
        for sub in ["bars", "curves", "floats"] {
            let dir = root.join(sub);
            std::fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    // ── Minute bars ──────────────────────────────────────────────────

    /// All cached bars for a symbol, sorted by timestamp. Empty when the
    /// symbol has never been cached.
    pub fn bars_for(&self, symbol: &str) -> Result<Vec<MinuteBar>, StorageError> {
        let path = self.bars_path(symbol);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let text = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
        serde_json::from_str(&text).map_err(|source| StorageError::Corrupt {
            path: path.display().to_string(),
            source,
        })
    }

    /// Merge new bars into the symbol's file. A bar replaces any cached bar
    /// at the same timestamp, so re-fetching a window is idempotent.
    pub fn upsert_bars(&self, symbol: &str, bars: &[MinuteBar]) -> Result<(), StorageError> {
        if bars.is_empty() {
            return Ok(());
        }
        let mut by_ts: BTreeMap<_, MinuteBar> = self
            .bars_for(symbol)?
            .into_iter()
            .map(|b| (b.ts, b))
            .collect();
        for bar in bars {
            by_ts.insert(bar.ts, bar.clone());
        }
        let merged: Vec<&MinuteBar> = by_ts.values().collect();
        self.write_json(&self.bars_path(symbol), &merged)
    }

    // ── Baseline curves ──────────────────────────────────────────────

    pub fn curve_for(&self, key: &BaselineKey) -> Result<Option<BaselineCurve>, StorageError> {
        let path = self.curve_path(key);
        if !path.exists() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
        let curve = serde_json::from_str(&text).map_err(|source| StorageError::Corrupt {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Some(curve))
    }

    pub fn put_curve(&self, curve: &BaselineCurve) -> Result<(), StorageError> {
        self.write_json(&self.curve_path(&curve.key), curve)
    }

    // ── Float snapshots ──────────────────────────────────────────────

    /// The freshest cached float no older than `allow_stale_days` before
    /// `today`. An exact-date snapshot always wins.
    pub fn float_for(
        &self,
        symbol: &str,
        today: NaiveDate,
        allow_stale_days: u32,
    ) -> Result<Option<FloatSnapshot>, StorageError> {
        let snapshots = self.float_snapshots(symbol)?;
        let oldest_ok = today - Duration::days(allow_stale_days as i64);
        Ok(snapshots
            .into_iter()
            .filter(|s| s.as_of <= today && s.as_of >= oldest_ok)
            .max_by_key(|s| s.as_of))
    }

    pub fn put_float(&self, snapshot: &FloatSnapshot) -> Result<(), StorageError> {
        let mut snapshots = self.float_snapshots(&snapshot.symbol)?;
        snapshots.retain(|s| s.as_of != snapshot.as_of);
        snapshots.push(snapshot.clone());
        snapshots.sort_by_key(|s| s.as_of);
        self.write_json(&self.floats_path(&snapshot.symbol), &snapshots)
    }

    fn float_snapshots(&self, symbol: &str) -> Result<Vec<FloatSnapshot>, StorageError> {
        let path = self.floats_path(symbol);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let text = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
        serde_json::from_str(&text).map_err(|source| StorageError::Corrupt {
            path: path.display().to_string(),
            source,
        })
    }

    // ── Symbol registry ──────────────────────────────────────────────

    /// Everything the registry knows, keyed by symbol.
    pub fn registry(&self) -> Result<BTreeMap<String, SymbolInfo>, StorageError> {
        let path = self.registry_path();
        if !path.exists() {
            return Ok(BTreeMap::new());
        }
        let text = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
        serde_json::from_str(&text).map_err(|source| StorageError::Corrupt {
            path: path.display().to_string(),
            source,
        })
    }

    /// Record symbols seen in a scan. A later sighting updates `last_seen`
    /// and fills in an exchange the registry did not have yet.
    pub fn record_symbols(
        &self,
        seen: &[(String, Option<String>)],
        date: NaiveDate,
    ) -> Result<(), StorageError> {
        if seen.is_empty() {
            return Ok(());
        }
        let mut registry = self.registry()?;
        for (symbol, exchange) in seen {
            let entry = registry
                .entry(symbol.clone())
                .or_insert_with(|| SymbolInfo {
                    exchange: exchange.clone(),
                    last_seen: date,
                });
            if entry.exchange.is_none() {
                entry.exchange = exchange.clone();
            }
            if date > entry.last_seen {
                entry.last_seen = date;
            }
        }
        self.write_json(&self.registry_path(), &registry)
    }

    // ── Maintenance ──────────────────────────────────────────────────

    pub fn status(&self) -> Result<CacheStatus, StorageError> {
        let mut status = CacheStatus::default();
        status.bar_files = self.count_dir("bars", &mut status.total_bytes)?;
        status.curve_files = self.count_dir("curves", &mut status.total_bytes)?;
        status.float_files = self.count_dir("floats", &mut status.total_bytes)?;
        status.symbols_seen = self.registry()?.len();
        Ok(status)
    }

    fn count_dir(&self, sub: &str, total_bytes: &mut u64) -> Result<usize, StorageError> {
        let dir = self.root.join(sub);
        let mut count = 0;
        for entry in std::fs::read_dir(&dir).map_err(|e| io_err(&dir, e))? {
            let entry = entry.map_err(|e| io_err(&dir, e))?;
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) == Some("json") {
                count += 1;
                let meta = entry.metadata().map_err(|e| io_err(&path, e))?;
                *total_bytes += meta.len();
            }
        }
        Ok(count)
    }

    /// Remove every cached file, leaving the directory layout in place.
    pub fn clear(&self) -> Result<(), StorageError> {
        for sub in ["bars", "curves", "floats"] {
            let dir = self.root.join(sub);
            for entry in std::fs::read_dir(&dir).map_err(|e| io_err(&dir, e))? {
                let entry = entry.map_err(|e| io_err(&dir, e))?;
                let path = entry.path();
                if path.is_file() {
                    std::fs::remove_file(&path).map_err(|e| io_err(&path, e))?;
                }
            }
        }
        let registry = self.registry_path();
        if registry.exists() {
            std::fs::remove_file(&registry).map_err(|e| io_err(&registry, e))?;
        }
        Ok(())
    }

    // ── Paths ────────────────────────────────────────────────────────

    fn bars_path(&self, symbol: &str) -> PathBuf {
        self.root
            .join("bars")
            .join(format!("{}.json", safe_name(symbol)))
    }

    fn curve_path(&self, key: &BaselineKey) -> PathBuf {
        self.root
            .join("curves")
            .join(format!("{}.json", key.cache_key()))
    }

    fn floats_path(&self, symbol: &str) -> PathBuf {
        self.root
            .join("floats")
            .join(format!("{}.json", safe_name(symbol)))
    }

    fn registry_path(&self) -> PathBuf {
        self.root.join("registry.json")
    }

    fn write_json<T: serde::Serialize>(&self, path: &Path, value: &T) -> Result<(), StorageError> {
        let json = serde_json::to_string_pretty(value).map_err(|source| StorageError::Corrupt {
            path: path.display().to_string(),
            source,
        })?;
        std::fs::write(path, json).map_err(|e| io_err(path, e))
    }
}

/// Symbols can carry slashes and dots (BRK.B, tickers with share classes);
/// map anything outside [A-Za-z0-9_-] to '_' for the filename.
fn safe_name(symbol: &str) -> String {
    symbol
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}
