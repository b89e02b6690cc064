//! Scan candidates, quote snapshots, and float snapshots.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One row from the momentum scan: a symbol worth a closer look.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanCandidate {
    pub symbol: String,
    /// Primary listing exchange as reported by the source, if known.
    pub exchange: Option<String>,
}

impl ScanCandidate {
    /// OTC / pink-sheet listings are excluded from the major-exchange
    /// universe when the config says so.
    pub fn is_otc_pink(&self) -> bool {
        match &self.exchange {
            Some(ex) => {
                let ex = ex.to_ascii_uppercase();
                ex.contains("PINK") || ex.contains("OTC")
            }
            None => false,
        }
    }
}

/// Point-in-time quote fields for a candidate. Any field may be missing;
/// the funnel turns missing fields into named drop reasons.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct QuoteSnapshot {
    pub last: Option<f64>,
    pub prev_close: Option<f64>,
    pub volume_today: Option<u64>,
    pub bid: Option<f64>,
    pub ask: Option<f64>,
}

impl QuoteSnapshot {
    /// Quoted spread, when both sides are present and positive.
    pub fn spread(&self) -> Option<f64> {
        match (self.bid, self.ask) {
            (Some(bid), Some(ask)) if bid > 0.0 && ask > 0.0 => Some(ask - bid),
            _ => None,
        }
    }

    /// Spread as a fraction of the last price.
    pub fn spread_pct(&self) -> Option<f64> {
        match (self.spread(), self.last) {
            (Some(spread), Some(last)) if last > 0.0 => Some(spread / last),
            _ => None,
        }
    }
}

/// Float share count as of a calendar date; cached per day and reusable
/// across runs on the same date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FloatSnapshot {
    pub symbol: String,
    pub as_of: NaiveDate,
    pub float_shares: u64,
    pub source: String,
}
