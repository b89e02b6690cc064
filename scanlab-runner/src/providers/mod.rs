//! Market data, float, and news providers.
//!
//! The pipeline talks to one [`MarketDataSource`] for scans, quotes, and
//! historical bars. The JSON fixture source backs tests and offline runs;
//! a broker-gateway source plugs in behind the same trait.

pub mod fixture;
pub mod float;
pub mod news;

use serde_json::Value;
use thiserror::Error;

use scanlab_core::domain::{MinuteBar, QuoteSnapshot, ScanCandidate};

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("network error: {0}")]
    Network(String),
    #[error("request for {symbol} timed out")]
    Timeout { symbol: String },
    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },
    #[error("endpoint not covered by the provider plan (HTTP 402)")]
    PaymentRequired,
    #[error("unexpected response: {0}")]
    BadResponse(String),
    #[error("no data for symbol {0}")]
    NoData(String),
}

/// One parsed scan row: the candidate identity plus its quote fields.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanRow {
    pub candidate: ScanCandidate,
    pub quote: QuoteSnapshot,
}

/// A full scan response. Rows the source could not parse are counted, not
/// silently dropped; the count surfaces in the run output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanPage {
    pub rows: Vec<ScanRow>,
    pub parse_errors: u64,
}

/// Live/delayed market data behind one seam.
pub trait MarketDataSource {
    /// True when quotes stream live; false for delayed or frozen feeds.
    /// Drives the permissive-RVOL decision.
    fn live(&self) -> bool;

    /// Run the momentum scan and return parsed candidate rows.
    fn scan(&self) -> Result<ScanPage, ProviderError>;

    /// Point-in-time quote for one symbol.
    fn snapshot(&self, symbol: &str) -> Result<QuoteSnapshot, ProviderError>;

    /// Historical minute bars covering the last `duration_days` calendar
    /// days, oldest first.
    fn historical_bars(
        &self,
        symbol: &str,
        duration_days: u32,
        bar_minutes: u32,
    ) -> Result<Vec<MinuteBar>, ProviderError>;
}

/// Parse one raw scan row. Rows are JSON objects with at least a symbol;
/// every quote field is optional.
pub fn parse_scan_row(value: &Value) -> Result<ScanRow, String> {
    let obj = value
        .as_object()
        .ok_or_else(|| "scan row is not an object".to_string())?;
    let symbol = obj
        .get("symbol")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| "scan row has no symbol".to_string())?
        .to_string();
    let exchange = obj
        .get("exchange")
        .and_then(Value::as_str)
        .map(str::to_string);

    let f = |key: &str| obj.get(key).and_then(Value::as_f64);
    let quote = QuoteSnapshot {
        last: f("last"),
        prev_close: f("prevClose"),
        volume_today: obj.get("volume").and_then(Value::as_u64),
        bid: f("bid"),
        ask: f("ask"),
    };

    Ok(ScanRow {
        candidate: ScanCandidate { symbol, exchange },
        quote,
    })
}

/// Parse a raw scan array, counting unparseable rows.
pub fn parse_scan_rows(values: &[Value]) -> ScanPage {
    let mut page = ScanPage::default();
    for value in values {
        match parse_scan_row(value) {
            Ok(row) => page.rows.push(row),
            Err(_) => page.parse_errors += 1,
        }
    }
    page
}
