//! Time windows — `[start, end)` on a set of ISO weekdays.
//!
//! A window whose `end` is not after its `start` wraps past midnight and
//! covers `[start, 24:00) ∪ [00:00, end)`; its weekday constraint applies to
//! the day the window *started*. `start == end` therefore covers a full day.

use std::fmt;
use std::str::FromStr;

use chrono::{Days, NaiveTime};

use crate::error::ConfigError;
use crate::time::{LocalTime, iso_weekday, parse_time_of_day};

/// A set of ISO weekdays (Monday = 1 … Sunday = 7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Weekdays(u8);

impl Weekdays {
    const ALL_BITS: u8 = 0b1111_1110;

    /// Every day of the week.
    #[must_use]
    pub fn all() -> Self {
        Self(Self::ALL_BITS)
    }

    /// Build a set from ISO day numbers. Numbers outside `1..=7` are ignored.
    #[must_use]
    pub fn from_days(days: impl IntoIterator<Item = u8>) -> Self {
        let bits = days
            .into_iter()
            .filter(|day| (1..=7).contains(day))
            .fold(0, |bits, day| bits | (1 << day));
        Self(bits)
    }

    /// Whether `day` (ISO number) is in the set.
    #[must_use]
    pub fn contains(self, day: u8) -> bool {
        (1..=7).contains(&day) && self.0 & (1 << day) != 0
    }

    /// Whether every day is in the set.
    #[must_use]
    pub fn is_all(self) -> bool {
        self.0 == Self::ALL_BITS
    }

    /// The ISO day numbers in ascending order.
    pub fn days(self) -> impl Iterator<Item = u8> {
        (1..=7).filter(move |day| self.contains(*day))
    }
}

impl Default for Weekdays {
    fn default() -> Self {
        Self::all()
    }
}

impl FromStr for Weekdays {
    type Err = ConfigError;

    /// Parse a comma-separated list of days and inclusive spans, e.g.
    /// `1-5`, `6,7` or `6-2` (a span wrapping from Saturday to Tuesday).
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let invalid = |reason| ConfigError::InvalidWeekdays {
            input: input.to_string(),
            reason,
        };
        let parse_day = |text: &str| -> Result<u8, ConfigError> {
            match text.trim().parse::<u8>() {
                Ok(day) if (1..=7).contains(&day) => Ok(day),
                _ => Err(invalid("days must be numbers from 1 (Monday) to 7 (Sunday)")),
            }
        };

        if input.trim().is_empty() {
            return Err(invalid("empty weekday list"));
        }

        let mut days = Vec::new();
        for part in input.split(',') {
            if let Some((from, to)) = part.split_once('-') {
                let from = parse_day(from)?;
                let to = parse_day(to)?;
                let mut day = from;
                loop {
                    days.push(day);
                    if day == to {
                        break;
                    }
                    day = day % 7 + 1;
                }
            } else {
                days.push(parse_day(part)?);
            }
        }
        Ok(Self::from_days(days))
    }
}

impl fmt::Display for Weekdays {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let days: Vec<String> = self.days().map(|day| day.to_string()).collect();
        f.write_str(&days.join(","))
    }
}

/// A daily time window restricted to a set of weekdays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    start: NaiveTime,
    end: NaiveTime,
    weekdays: Weekdays,
}

impl Default for TimeWindow {
    fn default() -> Self {
        Self::new(NaiveTime::MIN, NaiveTime::MIN, Weekdays::all())
    }
}

impl TimeWindow {
    #[must_use]
    pub fn new(start: NaiveTime, end: NaiveTime, weekdays: Weekdays) -> Self {
        Self {
            start,
            end,
            weekdays,
        }
    }

    /// Build a window from its configured text; missing parts default to
    /// midnight and all weekdays.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidTime`] or [`ConfigError::InvalidWeekdays`]
    /// for malformed input.
    pub fn parse(
        start: Option<&str>,
        end: Option<&str>,
        weekdays: Option<&str>,
    ) -> Result<Self, ConfigError> {
        let time = |input: Option<&str>| match input {
            None => Ok(NaiveTime::MIN),
            Some(text) => parse_time_of_day(text).ok_or_else(|| ConfigError::InvalidTime {
                input: text.to_string(),
            }),
        };
        let weekdays = match weekdays {
            None => Weekdays::all(),
            Some(text) => text.parse()?,
        };
        Ok(Self::new(time(start)?, time(end)?, weekdays))
    }

    #[must_use]
    pub fn start(&self) -> NaiveTime {
        self.start
    }

    #[must_use]
    pub fn end(&self) -> NaiveTime {
        self.end
    }

    #[must_use]
    pub fn weekdays(&self) -> Weekdays {
        self.weekdays
    }

    /// Whether the window crosses midnight.
    #[must_use]
    pub fn wraps(&self) -> bool {
        self.end <= self.start
    }

    /// Whether `now` lies inside the window.
    #[must_use]
    pub fn matches(&self, now: &LocalTime) -> bool {
        let time = now.time();
        let today = iso_weekday(now);

        if !self.wraps() {
            return self.start <= time && time < self.end && self.weekdays.contains(today);
        }

        if time >= self.start {
            self.weekdays.contains(today)
        } else if time < self.end {
            self.weekdays.contains(previous_day(today))
        } else {
            false
        }
    }

    /// The next instant strictly after `now` at which this window opens or
    /// closes, or `None` for a window that is always open.
    #[must_use]
    pub fn next_boundary(&self, now: &LocalTime) -> Option<LocalTime> {
        if self.start == self.end && self.weekdays.is_all() {
            return None;
        }

        let mut best: Option<LocalTime> = None;
        for offset in 0..=7u64 {
            let Some(date) = now.date().checked_add_days(Days::new(offset)) else {
                continue;
            };
            let day = iso_weekday(&date.and_time(NaiveTime::MIN));

            let opens = self.weekdays.contains(day).then(|| date.and_time(self.start));
            let closes_for = if self.wraps() { previous_day(day) } else { day };
            let closes = self
                .weekdays
                .contains(closes_for)
                .then(|| date.and_time(self.end));

            for candidate in [opens, closes].into_iter().flatten() {
                if candidate > *now && best.is_none_or(|current| candidate < current) {
                    best = Some(candidate);
                }
            }
            if best.is_some() {
                break;
            }
        }
        best
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{} on {}",
            self.start.format("%H:%M"),
            self.end.format("%H:%M"),
            self.weekdays
        )
    }
}

fn previous_day(day: u8) -> u8 {
    if day <= 1 { 7 } else { day - 1 }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    /// 2026-01-05 is a Monday; `day` 0 is that Monday.
    fn at(day: u32, hour: u32, minute: u32) -> LocalTime {
        NaiveDate::from_ymd_opt(2026, 1, 5 + day)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn window(start: &str, end: &str, weekdays: &str) -> TimeWindow {
        TimeWindow::parse(Some(start), Some(end), Some(weekdays)).unwrap()
    }

    #[test]
    fn should_parse_inclusive_span() {
        let days: Weekdays = "1-4".parse().unwrap();
        assert_eq!(days.days().collect::<Vec<_>>(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn should_parse_wrapping_span_as_cyclic_range() {
        for from in 1..=7u8 {
            for to in 1..from {
                let days: Weekdays = format!("{from}-{to}").parse().unwrap();
                let mut expected = Vec::new();
                let mut day = from;
                loop {
                    expected.push(day);
                    if day == to {
                        break;
                    }
                    day = day % 7 + 1;
                }
                for day in 1..=7 {
                    assert_eq!(days.contains(day), expected.contains(&day), "{from}-{to} {day}");
                }
            }
        }
    }

    #[test]
    fn should_parse_mixed_list() {
        let days: Weekdays = "1-3, 6".parse().unwrap();
        assert_eq!(days.to_string(), "1,2,3,6");
    }

    #[test]
    fn should_reject_out_of_range_day() {
        assert!(matches!(
            "0-5".parse::<Weekdays>(),
            Err(ConfigError::InvalidWeekdays { .. })
        ));
        assert!("8".parse::<Weekdays>().is_err());
        assert!("".parse::<Weekdays>().is_err());
        assert!("mon".parse::<Weekdays>().is_err());
    }

    #[test]
    fn should_match_same_day_window_half_open() {
        let w = window("07:00", "22:00", "1-5");
        assert!(w.matches(&at(0, 7, 0)));
        assert!(w.matches(&at(0, 21, 59)));
        assert!(!w.matches(&at(0, 22, 0)));
        assert!(!w.matches(&at(0, 6, 59)));
        // Saturday
        assert!(!w.matches(&at(5, 10, 0)));
    }

    #[test]
    fn should_match_overnight_window_on_both_sides_of_midnight() {
        let w = window("19:30", "07:00", "1-7");
        assert!(w.matches(&at(1, 23, 0)));
        assert!(w.matches(&at(1, 3, 0)));
        assert!(!w.matches(&at(1, 12, 0)));
    }

    #[test]
    fn should_apply_weekday_of_window_start_after_midnight() {
        // Friday night only
        let w = window("19:30", "07:00", "5");
        assert!(w.matches(&at(4, 23, 0)));
        // Saturday 03:00 still belongs to Friday's window
        assert!(w.matches(&at(5, 3, 0)));
        // Friday 03:00 belongs to Thursday's window
        assert!(!w.matches(&at(4, 3, 0)));
    }

    #[test]
    fn should_cover_full_day_when_start_equals_end() {
        let w = TimeWindow::parse(None, None, Some("1")).unwrap();
        assert!(w.matches(&at(0, 0, 0)));
        assert!(w.matches(&at(0, 23, 59)));
        assert!(!w.matches(&at(1, 0, 0)));
    }

    #[test]
    fn should_reject_malformed_time() {
        assert!(matches!(
            TimeWindow::parse(Some("7am"), None, None),
            Err(ConfigError::InvalidTime { .. })
        ));
    }

    #[test]
    fn should_find_next_boundary_later_today() {
        let w = window("07:00", "22:00", "1-5");
        assert_eq!(w.next_boundary(&at(0, 10, 0)), Some(at(0, 22, 0)));
        assert_eq!(w.next_boundary(&at(0, 6, 0)), Some(at(0, 7, 0)));
    }

    #[test]
    fn should_skip_weekend_when_finding_next_boundary() {
        let w = window("07:00", "22:00", "1-5");
        // Friday 23:00 -> Monday 07:00
        assert_eq!(w.next_boundary(&at(4, 23, 0)), Some(at(7, 7, 0)));
    }

    #[test]
    fn should_close_overnight_window_on_following_day() {
        let w = window("19:30", "07:00", "5");
        assert_eq!(w.next_boundary(&at(4, 23, 0)), Some(at(5, 7, 0)));
    }

    #[test]
    fn should_have_no_boundary_when_always_open() {
        assert!(TimeWindow::default().next_boundary(&at(0, 12, 0)).is_none());
    }
}
