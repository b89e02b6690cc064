//! Domain types: bars, baseline curves, quotes, per-candidate metrics.

pub mod bar;
pub mod curve;
pub mod metrics;
pub mod quote;

pub use bar::MinuteBar;
pub use curve::{BaselineCurve, BaselineKey, DayVolumeSeries, RvolReading};
pub use metrics::{CandidateMetrics, Grade};
pub use quote::{FloatSnapshot, QuoteSnapshot, ScanCandidate};
