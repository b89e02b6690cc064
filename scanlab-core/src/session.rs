//! Trading-session clock math in exchange-local time.
//!
//! A session is the clock window over which volume is bucketed. RVOL aligns
//! "today" against history by slot offset from the session start, so every
//! session/bar-size pair has a fixed expected bar count that never varies
//! across rebuilds.

use chrono::{DateTime, NaiveDateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Exchange timezone for all session math. US equities trade on Eastern time.
pub const EXCHANGE_TZ: Tz = chrono_tz::US::Eastern;

/// Convert a UTC timestamp to exchange-local wall-clock time.
pub fn to_exchange_local(ts: DateTime<Utc>) -> NaiveDateTime {
    ts.with_timezone(&EXCHANGE_TZ).naive_local()
}

/// The clock window volume is bucketed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Session {
    /// Regular trading hours: 09:30–16:00.
    #[serde(rename = "RTH")]
    Rth,
    /// Pre-market plus regular hours: 04:00–16:00.
    #[serde(rename = "RTH+PRE")]
    RthPre,
}

impl Session {
    pub fn start(self) -> NaiveTime {
        match self {
            Session::Rth => NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
            Session::RthPre => NaiveTime::from_hms_opt(4, 0, 0).unwrap(),
        }
    }

    pub fn end(self) -> NaiveTime {
        NaiveTime::from_hms_opt(16, 0, 0).unwrap()
    }

    /// Session length in minutes.
    pub fn minutes(self) -> u32 {
        self.end()
            .signed_duration_since(self.start())
            .num_minutes() as u32
    }

    /// Expected number of slots for a given bar width. Always at least 1.
    pub fn bar_count(self, bar_minutes: u32) -> usize {
        (self.minutes() / bar_minutes.max(1)).max(1) as usize
    }

    /// True if the wall-clock time falls inside `[start, end)`.
    pub fn contains(self, t: NaiveTime) -> bool {
        t >= self.start() && t < self.end()
    }

    /// Minute offset of a local timestamp from session start, or `None`
    /// when the timestamp is outside the session window.
    pub fn minute_index(self, local: NaiveDateTime) -> Option<u32> {
        let t = local.time();
        if !self.contains(t) {
            return None;
        }
        Some(t.signed_duration_since(self.start()).num_minutes() as u32)
    }

    /// Slot index of a local timestamp for a given bar width.
    pub fn slot_index(self, local: NaiveDateTime, bar_minutes: u32) -> Option<usize> {
        self.minute_index(local)
            .map(|m| (m / bar_minutes.max(1)) as usize)
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Session::Rth => write!(f, "RTH"),
            Session::RthPre => write!(f, "RTH+PRE"),
        }
    }
}
