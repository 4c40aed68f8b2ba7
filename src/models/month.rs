//! Calendar month used for spending tracking
//!
//! Spending targets and tracking snapshots are bucketed by calendar month.
//! A month serializes as `"YYYY-MM"` both in JSON bodies and URL paths.

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A calendar month (e.g., "2025-01")
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Month {
    year: i32,
    month: u32,
}

impl Month {
    /// Create a month, validating the month number
    pub fn new(year: i32, month: u32) -> Result<Self, MonthParseError> {
        if !(1..=12).contains(&month) {
            return Err(MonthParseError::InvalidMonth(month));
        }
        Ok(Self { year, month })
    }

    /// The month containing the given date
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// The current month (local time)
    pub fn current() -> Self {
        Self::of(chrono::Local::now().date_naive())
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// First day of the month
    pub fn start_date(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    /// Last day of the month (inclusive)
    pub fn end_date(&self) -> NaiveDate {
        self.next().start_date() - Duration::days(1)
    }

    /// Number of days in the month
    pub fn days(&self) -> i64 {
        (self.end_date() - self.start_date()).num_days() + 1
    }

    /// Check if a date falls within this month
    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }

    /// The following month
    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// The preceding month
    pub fn prev(&self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    /// Whole months from `self` until `other` (negative if `other` is earlier)
    pub fn months_until(&self, other: Month) -> i32 {
        (other.year - self.year) * 12 + other.month as i32 - self.month as i32
    }

    /// The `count` months ending at (and including) this month, oldest first
    pub fn trailing(&self, count: usize) -> Vec<Month> {
        let mut months = Vec::with_capacity(count);
        let mut current = *self;
        for _ in 0..count {
            months.push(current);
            current = current.prev();
        }
        months.reverse();
        months
    }

    /// Parse a `YYYY-MM` string
    pub fn parse(s: &str) -> Result<Self, MonthParseError> {
        let s = s.trim();
        let (year, month) = s
            .split_once('-')
            .ok_or_else(|| MonthParseError::InvalidFormat(s.to_string()))?;
        let year: i32 = year
            .parse()
            .map_err(|_| MonthParseError::InvalidFormat(s.to_string()))?;
        let month: u32 = month
            .parse()
            .map_err(|_| MonthParseError::InvalidFormat(s.to_string()))?;
        Self::new(year, month)
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl TryFrom<String> for Month {
    type Error = MonthParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Month> for String {
    fn from(month: Month) -> Self {
        month.to_string()
    }
}

/// Error type for month parsing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonthParseError {
    InvalidFormat(String),
    InvalidMonth(u32),
}

impl fmt::Display for MonthParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonthParseError::InvalidFormat(s) => {
                write!(f, "Invalid month format (expected YYYY-MM): {}", s)
            }
            MonthParseError::InvalidMonth(m) => write!(f, "Invalid month: {}", m),
        }
    }
}

impl std::error::Error for MonthParseError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn month(y: i32, m: u32) -> Month {
        Month::new(y, m).unwrap()
    }

    #[test]
    fn test_bounds() {
        let jan = month(2025, 1);
        assert_eq!(jan.start_date(), NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        assert_eq!(jan.end_date(), NaiveDate::from_ymd_opt(2025, 1, 31).unwrap());

        let feb_leap = month(2024, 2);
        assert_eq!(feb_leap.days(), 29);
    }

    #[test]
    fn test_navigation_across_years() {
        assert_eq!(month(2024, 12).next(), month(2025, 1));
        assert_eq!(month(2025, 1).prev(), month(2024, 12));
        assert_eq!(month(2024, 11).months_until(month(2025, 2)), 3);
        assert_eq!(month(2025, 2).months_until(month(2024, 11)), -3);
    }

    #[test]
    fn test_trailing() {
        let months = month(2025, 2).trailing(3);
        assert_eq!(months, vec![month(2024, 12), month(2025, 1), month(2025, 2)]);
    }

    #[test]
    fn test_contains() {
        let jan = month(2025, 1);
        assert!(jan.contains(NaiveDate::from_ymd_opt(2025, 1, 15).unwrap()));
        assert!(!jan.contains(NaiveDate::from_ymd_opt(2025, 2, 1).unwrap()));
    }

    #[test]
    fn test_parse() {
        assert_eq!(Month::parse("2025-03").unwrap(), month(2025, 3));
        assert_eq!(Month::parse("2025-13"), Err(MonthParseError::InvalidMonth(13)));
        assert!(Month::parse("March").is_err());
    }

    #[test]
    fn test_serializes_as_string() {
        let json = serde_json::to_string(&month(2025, 7)).unwrap();
        assert_eq!(json, "\"2025-07\"");
        let back: Month = serde_json::from_str(&json).unwrap();
        assert_eq!(back, month(2025, 7));
        assert!(serde_json::from_str::<Month>("\"2025-00\"").is_err());
    }
}
