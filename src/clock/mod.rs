//! Date source for the monitor.
//!
//! The time-zone offset is explicit so the month boundary does not depend on
//! the host's local time (the scheduler usually runs in UTC while FISIS
//! publishes on Korean dates).

use chrono::{FixedOffset, NaiveDate, Utc};

use crate::config::ClockConfig;
use crate::month::YearMonth;

pub trait Clock {
    fn today(&self) -> NaiveDate;

    fn current_month(&self) -> YearMonth {
        YearMonth::from_date(self.today())
    }
}

/// Wall clock shifted to a fixed UTC offset.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    offset: FixedOffset,
}

impl SystemClock {
    /// Returns `None` if the offset is out of chrono's range (±24h).
    pub fn new(utc_offset_hours: i32) -> Option<Self> {
        FixedOffset::east_opt(utc_offset_hours * 3600).map(|offset| Self { offset })
    }

    pub fn from_config(config: &ClockConfig) -> Option<Self> {
        Self::new(config.utc_offset_hours)
    }
}

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.offset).date_naive()
    }
}

/// A clock pinned to one date.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_fixed_clock_month() {
        let clock = FixedClock(NaiveDate::from_ymd_opt(2024, 12, 31).unwrap());
        assert_eq!(clock.current_month().to_string(), "202412");
    }

    #[test]
    fn test_offset_moves_month_boundary() {
        // 2024-09-30 20:00 UTC is already October in KST.
        let instant = Utc.with_ymd_and_hms(2024, 9, 30, 20, 0, 0).unwrap();
        let kst = FixedOffset::east_opt(9 * 3600).unwrap();
        let utc = FixedOffset::east_opt(0).unwrap();
        assert_eq!(
            YearMonth::from_date(instant.with_timezone(&kst).date_naive()).to_string(),
            "202410"
        );
        assert_eq!(
            YearMonth::from_date(instant.with_timezone(&utc).date_naive()).to_string(),
            "202409"
        );
    }

    #[test]
    fn test_system_clock_tracks_offset() {
        let clock = SystemClock::new(9).unwrap();
        let expected = (Utc::now() + Duration::hours(9)).date_naive();
        // Allow for a date rollover between the two reads.
        let today = clock.today();
        assert!(today == expected || today == expected + Duration::days(1));
    }

    #[test]
    fn test_system_clock_rejects_out_of_range_offset() {
        assert!(SystemClock::new(24).is_none());
        assert!(SystemClock::new(-9).is_some());
    }
}
