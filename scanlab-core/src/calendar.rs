//! Exchange trading calendar and market phase.
//!
//! The baseline builder needs "the N prior trading days", which means
//! weekends and full-day NYSE holidays have to be excluded — a Monday
//! baseline built from Saturday/Sunday "days" would be all zeros.
//!
//! Only full-day closures are modeled. Half days (early closes) still count
//! as trading days; their truncated sessions show up as missing bars in the
//! day series, which the curve notes record.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::session::to_exchange_local;

/// Calendar abstraction so tests can pin a deterministic schedule.
pub trait TradingCalendar {
    /// True if the exchange holds a regular session on this date.
    fn is_trading_day(&self, date: NaiveDate) -> bool;

    /// The prior trading days before (not including) `today`,
    /// most-recent-first, capped at `lookback`.
    fn previous_trading_days(&self, today: NaiveDate, lookback: usize) -> Vec<NaiveDate> {
        let mut days = Vec::with_capacity(lookback);
        let mut d = today;
        // Bounded scan: lookback trading days never span more than
        // ~2x calendar days plus holiday slack.
        for _ in 0..(lookback * 2 + 30) {
            if days.len() >= lookback {
                break;
            }
            d -= Duration::days(1);
            if self.is_trading_day(d) {
                days.push(d);
            }
        }
        days
    }
}

/// NYSE-style US equity calendar: weekends plus the nine full-day holidays.
#[derive(Debug, Clone, Copy, Default)]
pub struct UsEquityCalendar;

impl TradingCalendar for UsEquityCalendar {
    fn is_trading_day(&self, date: NaiveDate) -> bool {
        !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) && !is_us_market_holiday(date)
    }
}

/// Full-day NYSE holidays for a given date.
pub fn is_us_market_holiday(date: NaiveDate) -> bool {
    let year = date.year();
    let holidays = [
        observed(NaiveDate::from_ymd_opt(year, 1, 1).unwrap()), // New Year's Day
        nth_weekday(year, 1, Weekday::Mon, 3),                  // MLK Day
        nth_weekday(year, 2, Weekday::Mon, 3),                  // Presidents' Day
        easter_sunday(year) - Duration::days(2),                // Good Friday
        last_weekday(year, 5, Weekday::Mon),                    // Memorial Day
        observed(NaiveDate::from_ymd_opt(year, 6, 19).unwrap()), // Juneteenth
        observed(NaiveDate::from_ymd_opt(year, 7, 4).unwrap()), // Independence Day
        nth_weekday(year, 9, Weekday::Mon, 1),                  // Labor Day
        nth_weekday(year, 11, Weekday::Thu, 4),                 // Thanksgiving
        observed(NaiveDate::from_ymd_opt(year, 12, 25).unwrap()), // Christmas
    ];
    holidays.contains(&date)
}

/// Saturday holidays are observed Friday; Sunday holidays Monday.
fn observed(date: NaiveDate) -> NaiveDate {
    match date.weekday() {
        Weekday::Sat => date - Duration::days(1),
        Weekday::Sun => date + Duration::days(1),
        _ => date,
    }
}

fn nth_weekday(year: i32, month: u32, weekday: Weekday, n: u32) -> NaiveDate {
    let first = NaiveDate::from_ymd_opt(year, month, 1).unwrap();
    let offset = (7 + weekday.num_days_from_monday() - first.weekday().num_days_from_monday()) % 7;
    first + Duration::days((offset + 7 * (n - 1)) as i64)
}

fn last_weekday(year: i32, month: u32, weekday: Weekday) -> NaiveDate {
    let first_next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1).unwrap()
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1).unwrap()
    };
    let mut d = first_next - Duration::days(1);
    while d.weekday() != weekday {
        d -= Duration::days(1);
    }
    d
}

/// Gregorian Easter (anonymous computus).
fn easter_sunday(year: i32) -> NaiveDate {
    let a = year % 19;
    let b = year / 100;
    let c = year % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = ((h + l - 7 * m + 114) % 31) + 1;
    NaiveDate::from_ymd_opt(year, month as u32, day as u32).unwrap()
}

/// Where "now" falls in the exchange day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarketPhase {
    Premarket,
    Open,
    Post,
    Closed,
}

impl MarketPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            MarketPhase::Premarket => "PREMARKET",
            MarketPhase::Open => "OPEN",
            MarketPhase::Post => "POST",
            MarketPhase::Closed => "CLOSED",
        }
    }
}

/// Resolve the market phase at a UTC instant.
///
/// Pre-market 04:00–09:30, regular 09:30–16:00, post 16:00–20:00 Eastern;
/// everything else (and any non-trading day) is closed.
pub fn market_phase(now: DateTime<Utc>, calendar: &dyn TradingCalendar) -> MarketPhase {
    let local = to_exchange_local(now);
    if !calendar.is_trading_day(local.date()) {
        return MarketPhase::Closed;
    }
    let t = local.time();
    let hm = |h, m| chrono::NaiveTime::from_hms_opt(h, m, 0).unwrap();
    if t < hm(4, 0) {
        MarketPhase::Closed
    } else if t < hm(9, 30) {
        MarketPhase::Premarket
    } else if t < hm(16, 0) {
        MarketPhase::Open
    } else if t < hm(20, 0) {
        MarketPhase::Post
    } else {
        MarketPhase::Closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn weekends_are_closed() {
        let cal = UsEquityCalendar;
        assert!(!cal.is_trading_day(d(2024, 6, 1))); // Saturday
        assert!(!cal.is_trading_day(d(2024, 6, 2))); // Sunday
        assert!(cal.is_trading_day(d(2024, 6, 3))); // Monday
    }

    #[test]
    fn known_2024_holidays() {
        assert!(is_us_market_holiday(d(2024, 1, 1))); // New Year's
        assert!(is_us_market_holiday(d(2024, 1, 15))); // MLK
        assert!(is_us_market_holiday(d(2024, 2, 19))); // Presidents'
        assert!(is_us_market_holiday(d(2024, 3, 29))); // Good Friday
        assert!(is_us_market_holiday(d(2024, 5, 27))); // Memorial
        assert!(is_us_market_holiday(d(2024, 6, 19))); // Juneteenth
        assert!(is_us_market_holiday(d(2024, 7, 4))); // Independence
        assert!(is_us_market_holiday(d(2024, 9, 2))); // Labor
        assert!(is_us_market_holiday(d(2024, 11, 28))); // Thanksgiving
        assert!(is_us_market_holiday(d(2024, 12, 25))); // Christmas
        assert!(!is_us_market_holiday(d(2024, 6, 5)));
    }

    #[test]
    fn observed_shifts() {
        // July 4 2026 is a Saturday; observed Friday July 3.
        assert!(is_us_market_holiday(d(2026, 7, 3)));
        // Jan 1 2023 is a Sunday; observed Monday Jan 2.
        assert!(is_us_market_holiday(d(2023, 1, 2)));
    }

    #[test]
    fn previous_trading_days_skip_weekend_and_holiday() {
        let cal = UsEquityCalendar;
        // Wednesday 2024-06-05; Juneteenth not in range here.
        let days = cal.previous_trading_days(d(2024, 6, 5), 3);
        assert_eq!(days, vec![d(2024, 6, 4), d(2024, 6, 3), d(2024, 5, 31)]);
    }

    #[test]
    fn previous_trading_days_excludes_today() {
        let cal = UsEquityCalendar;
        let days = cal.previous_trading_days(d(2024, 6, 5), 5);
        assert!(!days.contains(&d(2024, 6, 5)));
        assert_eq!(days.len(), 5);
    }

    #[test]
    fn phase_transitions() {
        let cal = UsEquityCalendar;
        // 2024-06-05 is a Wednesday. Eastern is UTC-4 in June.
        let at = |h, m| Utc.with_ymd_and_hms(2024, 6, 5, h, m, 0).unwrap();
        assert_eq!(market_phase(at(7, 0), &cal), MarketPhase::Closed); // 03:00 ET
        assert_eq!(market_phase(at(9, 0), &cal), MarketPhase::Premarket); // 05:00 ET
        assert_eq!(market_phase(at(14, 0), &cal), MarketPhase::Open); // 10:00 ET
        assert_eq!(market_phase(at(21, 0), &cal), MarketPhase::Post); // 17:00 ET
        assert_eq!(market_phase(at(23, 59), &cal), MarketPhase::Post); // 19:59 ET
        // 21:00 ET the same evening is past the post session.
        let late = Utc.with_ymd_and_hms(2024, 6, 6, 1, 0, 0).unwrap();
        assert_eq!(market_phase(late, &cal), MarketPhase::Closed);
    }

    #[test]
    fn weekend_phase_is_closed() {
        let cal = UsEquityCalendar;
        let sat = Utc.with_ymd_and_hms(2024, 6, 1, 14, 0, 0).unwrap();
        assert_eq!(market_phase(sat, &cal), MarketPhase::Closed);
    }

    #[test]
    fn phase_serde_names() {
        assert_eq!(
            serde_json::to_string(&MarketPhase::Premarket).unwrap(),
            "\"PREMARKET\""
        );
    }
}
