//! Time and timestamp helpers.
//!
//! Windows are matched against the *local* wall clock, so the scheduler
//! works with [`LocalTime`] (naive local date and time) rather than UTC.

use chrono::{Datelike, Local, NaiveDateTime, NaiveTime, Timelike};

/// Local wall-clock date and time used for window matching.
pub type LocalTime = NaiveDateTime;

/// Return the current local wall-clock time.
#[must_use]
pub fn now_local() -> LocalTime {
    Local::now().naive_local()
}

/// ISO weekday number of `at`: Monday = 1 … Sunday = 7.
#[must_use]
pub fn iso_weekday(at: &LocalTime) -> u8 {
    // number_from_monday is always within 1..=7
    u8::try_from(at.weekday().number_from_monday()).unwrap_or(1)
}

/// Parse `HH:MM` or `HH:MM:SS`.
#[must_use]
pub fn parse_time_of_day(input: &str) -> Option<NaiveTime> {
    let input = input.trim();
    NaiveTime::parse_from_str(input, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(input, "%H:%M"))
        .ok()
}

/// Seconds elapsed since midnight.
#[must_use]
pub fn seconds_of_day(time: NaiveTime) -> u32 {
    time.num_seconds_from_midnight()
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    #[test]
    fn should_number_monday_as_one_and_sunday_as_seven() {
        // 2026-01-05 is a Monday
        let monday = NaiveDate::from_ymd_opt(2026, 1, 5)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        let sunday = NaiveDate::from_ymd_opt(2026, 1, 11)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        assert_eq!(iso_weekday(&monday), 1);
        assert_eq!(iso_weekday(&sunday), 7);
    }

    #[test]
    fn should_parse_hours_minutes_and_optional_seconds() {
        assert_eq!(
            parse_time_of_day("07:30"),
            NaiveTime::from_hms_opt(7, 30, 0)
        );
        assert_eq!(
            parse_time_of_day("19:30:15"),
            NaiveTime::from_hms_opt(19, 30, 15)
        );
    }

    #[test]
    fn should_reject_malformed_time() {
        assert!(parse_time_of_day("25:00").is_none());
        assert!(parse_time_of_day("noon").is_none());
    }
}
