//! JSON fixture market-data source for tests and offline runs.
//!
//! Fixture shape:
//! ```json
//! {
//!   "live": false,
//!   "scan": [ { "symbol": "ABCD", "last": 11.0, ... }, ... ],
//!   "bars": { "ABCD": [ { "symbol": "ABCD", "ts": "...", ... }, ... ] }
//! }
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use scanlab_core::domain::{MinuteBar, QuoteSnapshot};

use super::{parse_scan_rows, MarketDataSource, ProviderError, ScanPage};

#[derive(Debug, Deserialize)]
struct FixtureFile {
    #[serde(default)]
    live: bool,
    #[serde(default)]
    scan: Vec<Value>,
    #[serde(default)]
    bars: HashMap<String, Vec<MinuteBar>>,
}

/// Replays a recorded scan and bar set from one JSON file.
pub struct FixtureSource {
    live: bool,
    page: ScanPage,
    bars: HashMap<String, Vec<MinuteBar>>,
}

impl FixtureSource {
    pub fn load(path: &Path) -> Result<Self, ProviderError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ProviderError::Network(format!("{}: {e}", path.display())))?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ProviderError> {
        let file: FixtureFile =
            serde_json::from_str(text).map_err(|e| ProviderError::BadResponse(e.to_string()))?;
        let mut bars = file.bars;
        for list in bars.values_mut() {
            list.sort_by_key(|b| b.ts);
        }
        Ok(Self {
            live: file.live,
            page: parse_scan_rows(&file.scan),
            bars,
        })
    }
}

impl MarketDataSource for FixtureSource {
    fn live(&self) -> bool {
        self.live
    }

    fn scan(&self) -> Result<ScanPage, ProviderError> {
        Ok(self.page.clone())
    }

    fn snapshot(&self, symbol: &str) -> Result<QuoteSnapshot, ProviderError> {
        self.page
            .rows
            .iter()
            .find(|r| r.candidate.symbol == symbol)
            .map(|r| r.quote)
            .ok_or_else(|| ProviderError::NoData(symbol.to_string()))
    }

    fn historical_bars(
        &self,
        symbol: &str,
        _duration_days: u32,
        _bar_minutes: u32,
    ) -> Result<Vec<MinuteBar>, ProviderError> {
        Ok(self.bars.get(symbol).cloned().unwrap_or_default())
    }
}
