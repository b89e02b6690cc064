//! ScanLab Core — session math, baseline curves, RVOL, filter funnel, scoring.
//!
//! This crate contains the heart of the watchlist ranker:
//! - Domain types (minute bars, baseline curves, quote snapshots, metrics)
//! - Trading-session clock math and the NYSE trading calendar
//! - Time-of-day cumulative-volume baseline builder
//! - Live RVOL computation with explicit data-quality flags
//! - Ordered candidate filter funnel with per-stage accounting
//! - Heuristic grade/score and sanity checks
//!
//! Everything here is pure: no I/O, no network, no clocks. The runner crate
//! supplies storage, providers, and "now".

pub mod baseline;
pub mod calendar;
pub mod domain;
pub mod funnel;
pub mod rvol;
pub mod sanity;
pub mod scoring;
pub mod session;
pub mod stats;
pub mod symbols;

pub use baseline::{build_baseline_curve, day_volume_series, BaselineParams};
pub use calendar::{MarketPhase, TradingCalendar, UsEquityCalendar};
pub use domain::{
    BaselineCurve, BaselineKey, CandidateMetrics, DayVolumeSeries, FloatSnapshot, Grade,
    MinuteBar, QuoteSnapshot, RvolReading, ScanCandidate,
};
pub use funnel::{DropReason, DropReasons, FilterLimits, FunnelCounts};
pub use rvol::{compute_rvol_time_of_day, RvolParams};
pub use sanity::{run_sanity_checks, SanityFlags, SanityLimits};
pub use scoring::{grade_and_score, GradeThresholds, ScoreWeights};
pub use session::Session;
pub use stats::BaselineMethod;
pub use symbols::tv_symbol;
