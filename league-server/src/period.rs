//! Period identity
//!
//! A period is one ISO-8601 week (Monday 00:00 UTC to the next Monday). Its
//! identity is a pure function of wall-clock time, rendered as `YYYY-Www`.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One league period (ISO week)
///
/// Ordering follows time: `2025-W52 < 2026-W01`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct PeriodId {
    /// Monday that opens the week
    monday: NaiveDate,
}

impl PeriodId {
    /// Period containing the given instant
    pub fn containing(instant: DateTime<Utc>) -> Self {
        let date = instant.date_naive();
        let offset = date.weekday().num_days_from_monday() as i64;
        Self {
            monday: date - Duration::days(offset),
        }
    }

    /// Period for an ISO year/week pair, if that week exists
    pub fn from_iso_week(year: i32, week: u32) -> Option<Self> {
        NaiveDate::from_isoywd_opt(year, week, Weekday::Mon).map(|monday| Self { monday })
    }

    pub fn iso_year(&self) -> i32 {
        self.monday.iso_week().year()
    }

    pub fn iso_week(&self) -> u32 {
        self.monday.iso_week().week()
    }

    /// Instant the period opens
    pub fn starts_at(&self) -> DateTime<Utc> {
        self.monday.and_time(NaiveTime::MIN).and_utc()
    }

    /// Instant the period closes (start of the next period)
    pub fn ends_at(&self) -> DateTime<Utc> {
        self.next().starts_at()
    }

    pub fn next(&self) -> Self {
        Self {
            monday: self.monday + Duration::days(7),
        }
    }
}

impl fmt::Display for PeriodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-W{:02}", self.iso_year(), self.iso_week())
    }
}

/// Error parsing a `YYYY-Www` period string
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid period id '{0}' (expected YYYY-Www)")]
pub struct ParsePeriodError(String);

impl FromStr for PeriodId {
    type Err = ParsePeriodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParsePeriodError(s.to_string());
        let (year, week) = s.split_once("-W").ok_or_else(invalid)?;
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let week: u32 = week.parse().map_err(|_| invalid())?;
        Self::from_iso_week(year, week).ok_or_else(invalid)
    }
}

impl From<PeriodId> for String {
    fn from(period: PeriodId) -> Self {
        period.to_string()
    }
}

impl TryFrom<String> for PeriodId {
    type Error = ParsePeriodError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_containing_maps_whole_week_to_same_period() {
        // 2026-10-12 is a Monday
        let monday = Utc.with_ymd_and_hms(2026, 10, 12, 0, 0, 0).unwrap();
        let sunday_night = Utc.with_ymd_and_hms(2026, 10, 18, 23, 59, 59).unwrap();

        let a = PeriodId::containing(monday);
        let b = PeriodId::containing(sunday_night);
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "2026-W42");
        assert_eq!(a.starts_at(), monday);
        assert_eq!(a.ends_at(), Utc.with_ymd_and_hms(2026, 10, 19, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_iso_year_boundary() {
        // 2027-01-01 is a Friday belonging to ISO week 2026-W53
        let new_year = Utc.with_ymd_and_hms(2027, 1, 1, 12, 0, 0).unwrap();
        let period = PeriodId::containing(new_year);
        assert_eq!(period.to_string(), "2026-W53");
        assert_eq!(period.next().to_string(), "2027-W01");
        assert!(period < period.next());
    }

    #[test]
    fn test_parse_round_trip_and_rejects_garbage() {
        let period: PeriodId = "2026-W07".parse().unwrap();
        assert_eq!(period.iso_year(), 2026);
        assert_eq!(period.iso_week(), 7);
        assert_eq!(period.next().to_string(), "2026-W08");

        assert!("2026-07".parse::<PeriodId>().is_err());
        assert!("2025-W53".parse::<PeriodId>().is_err()); // 2025 has 52 ISO weeks
        assert!("abcd-W01".parse::<PeriodId>().is_err());
    }

    #[test]
    fn test_serde_as_string() {
        let period: PeriodId = "2026-W42".parse().unwrap();
        let json = serde_json::to_string(&period).unwrap();
        assert_eq!(json, "\"2026-W42\"");
        let back: PeriodId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, period);
    }
}
