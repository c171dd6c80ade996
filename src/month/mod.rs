//! `YYYYMM` month tokens and the quarter-end sequence that drives each run.
//!
//! FISIS publishes quarterly statistics keyed by the quarter-end month
//! (March, June, September, December). A run checks every quarter-end month
//! strictly after the stored watermark, up to and including the current month.

use chrono::{Datelike, NaiveDate};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const QUARTER_END_MONTHS: [u32; 4] = [3, 6, 9, 12];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MonthParseError {
    #[error("expected 6 digits (YYYYMM), got {0:?}")]
    Format(String),
    #[error("month out of range in {0:?}")]
    MonthRange(String),
    #[error("year 0000 is not a valid year in {0:?}")]
    YearRange(String),
}

/// A calendar month, rendered as `YYYYMM`.
///
/// Field order gives chronological `Ord`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    year: i32,
    month: u32,
}

/// Order in which candidate months are visited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SequenceOrder {
    /// Oldest first.
    #[default]
    Ascending,
    /// Newest first.
    Descending,
}

impl YearMonth {
    /// Returns `None` unless `month` is 1..=12.
    pub fn new(year: i32, month: u32) -> Option<Self> {
        if (1..=12).contains(&month) {
            Some(Self { year, month })
        } else {
            None
        }
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn is_quarter_end(&self) -> bool {
        QUARTER_END_MONTHS.contains(&self.month)
    }

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

    pub fn minus_months(&self, n: u32) -> Self {
        let index = self.index() - i64::from(n);
        Self::from_index(index)
    }

    /// Latest quarter-end month that is not after `self`.
    pub fn quarter_end_at_or_before(&self) -> Self {
        let back = self.month % 3;
        self.minus_months(back)
    }

    // Months since year 0.
    fn index(&self) -> i64 {
        i64::from(self.year) * 12 + i64::from(self.month) - 1
    }

    fn from_index(index: i64) -> Self {
        Self {
            year: index.div_euclid(12) as i32,
            month: index.rem_euclid(12) as u32 + 1,
        }
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = MonthParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.len() != 6 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(MonthParseError::Format(s.to_string()));
        }
        let year: i32 = s[..4]
            .parse()
            .map_err(|_| MonthParseError::Format(s.to_string()))?;
        if year == 0 {
            return Err(MonthParseError::YearRange(s.to_string()));
        }
        let month: u32 = s[4..]
            .parse()
            .map_err(|_| MonthParseError::Format(s.to_string()))?;
        Self::new(year, month).ok_or_else(|| MonthParseError::MonthRange(s.to_string()))
    }
}

/// Quarter-end months strictly after `watermark`, up to and including `current`.
///
/// Empty when `watermark >= current`. A non-quarter watermark still works as a
/// lower bound but is never emitted itself.
pub fn quarter_months(
    watermark: YearMonth,
    current: YearMonth,
    order: SequenceOrder,
) -> Vec<YearMonth> {
    let mut months = Vec::new();
    if watermark >= current {
        return months;
    }

    let mut cursor = watermark.next();
    while cursor <= current {
        if cursor.is_quarter_end() {
            months.push(cursor);
        }
        cursor = cursor.next();
    }

    if order == SequenceOrder::Descending {
        months.reverse();
    }
    months
}

/// Watermark used when nothing usable is stored: the latest quarter-end month
/// at least `lookback_months` before `current`.
pub fn fallback_watermark(current: YearMonth, lookback_months: u32) -> YearMonth {
    current
        .minus_months(lookback_months)
        .quarter_end_at_or_before()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ym(s: &str) -> YearMonth {
        s.parse().unwrap()
    }

    fn render(months: &[YearMonth]) -> Vec<String> {
        months.iter().map(|m| m.to_string()).collect()
    }

    #[test]
    fn test_parse_and_display() {
        let m = ym("202409");
        assert_eq!(m.year(), 2024);
        assert_eq!(m.month(), 9);
        assert_eq!(m.to_string(), "202409");
        assert_eq!(ym(" 202401\n").to_string(), "202401");

        assert!(matches!("2024".parse::<YearMonth>(), Err(MonthParseError::Format(_))));
        assert!(matches!("2024-9".parse::<YearMonth>(), Err(MonthParseError::Format(_))));
        assert!(matches!("".parse::<YearMonth>(), Err(MonthParseError::Format(_))));
        assert!(matches!("202413".parse::<YearMonth>(), Err(MonthParseError::MonthRange(_))));
        assert!(matches!("202400".parse::<YearMonth>(), Err(MonthParseError::MonthRange(_))));
    }

    #[test]
    fn test_year_zero_is_rejected() {
        assert!(matches!("000001".parse::<YearMonth>(), Err(MonthParseError::YearRange(_))));
        assert!(matches!("000012".parse::<YearMonth>(), Err(MonthParseError::YearRange(_))));
        assert_eq!(ym("000101").to_string(), "000101");
    }

    #[test]
    fn test_month_arithmetic_crosses_years() {
        assert_eq!(ym("202412").next(), ym("202501"));
        assert_eq!(ym("202401").minus_months(1), ym("202312"));
        assert_eq!(ym("202406").minus_months(18), ym("202212"));
        assert_eq!(ym("202402").quarter_end_at_or_before(), ym("202312"));
        assert_eq!(ym("202405").quarter_end_at_or_before(), ym("202403"));
        assert_eq!(ym("202409").quarter_end_at_or_before(), ym("202409"));
    }

    #[test]
    fn test_quarter_months_window() {
        let months = quarter_months(ym("202403"), ym("202412"), SequenceOrder::Ascending);
        assert_eq!(render(&months), vec!["202406", "202409", "202412"]);

        let months = quarter_months(ym("202403"), ym("202412"), SequenceOrder::Descending);
        assert_eq!(render(&months), vec!["202412", "202409", "202406"]);
    }

    #[test]
    fn test_quarter_months_non_quarter_bounds() {
        // Non-quarter watermark is a lower bound only; current month need not be a quarter end.
        let months = quarter_months(ym("202304"), ym("202402"), SequenceOrder::Ascending);
        assert_eq!(render(&months), vec!["202306", "202309", "202312"]);

        let months = quarter_months(ym("202302"), ym("202303"), SequenceOrder::Ascending);
        assert_eq!(render(&months), vec!["202303"]);
    }

    #[test]
    fn test_quarter_months_empty_cases() {
        // Watermark in the future.
        assert!(quarter_months(ym("202506"), ym("202412"), SequenceOrder::Ascending).is_empty());
        // Watermark equal to current.
        assert!(quarter_months(ym("202409"), ym("202409"), SequenceOrder::Ascending).is_empty());
        // No quarter elapsed since the watermark.
        assert!(quarter_months(ym("202409"), ym("202411"), SequenceOrder::Ascending).is_empty());
    }

    #[test]
    fn test_quarter_months_properties() {
        let current = ym("202612");
        let mut watermark = ym("201801");
        while watermark <= current {
            let months = quarter_months(watermark, current, SequenceOrder::Ascending);
            assert!(months.iter().all(|m| m.is_quarter_end()));
            assert!(months.windows(2).all(|w| w[0] < w[1]));
            if let Some(first) = months.first() {
                assert!(*first > watermark);
                assert!(first.minus_months(3) <= watermark);
            }
            if let Some(last) = months.last() {
                assert_eq!(*last, current.quarter_end_at_or_before());
            }
            watermark = watermark.next();
        }
    }

    #[test]
    fn test_fallback_watermark() {
        assert_eq!(fallback_watermark(ym("202410"), 12), ym("202309"));
        assert_eq!(fallback_watermark(ym("202412"), 12), ym("202312"));
        assert_eq!(fallback_watermark(ym("202402"), 6), ym("202306"));
    }
}
