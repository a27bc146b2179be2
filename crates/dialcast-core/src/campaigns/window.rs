//! Call Window - Weekly dialing window evaluation
//!
//! Campaigns only dial inside a configured daily time range on selected
//! weekdays. All evaluation happens in UTC; the window a user configures
//! is taken as-is without time zone conversion.

use chrono::{DateTime, Datelike, NaiveTime, Utc};
use thiserror::Error;

/// Call window validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WindowError {
    #[error("Invalid time '{0}': expected HH:MM")]
    InvalidTime(String),

    #[error("Window start must be before window end")]
    StartNotBeforeEnd,

    #[error("At least one weekday is required")]
    NoDays,

    #[error("Invalid weekday {0}: expected 0 (Sunday) through 6 (Saturday)")]
    InvalidDay(i32),
}

/// A validated weekly dialing window.
///
/// The time range is half-open: a call may start at `start` but not at
/// `end`, so adjacent windows never overlap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallWindow {
    start: NaiveTime,
    end: NaiveTime,
    // Indexed by days-from-Sunday, so days[0] is Sunday
    days: [bool; 7],
}

impl CallWindow {
    /// Parse and validate window fields as stored on a campaign
    pub fn parse(start: &str, end: &str, days: &[i32]) -> Result<Self, WindowError> {
        let start = parse_time(start)?;
        let end = parse_time(end)?;

        if start >= end {
            return Err(WindowError::StartNotBeforeEnd);
        }

        if days.is_empty() {
            return Err(WindowError::NoDays);
        }

        let mut day_set = [false; 7];
        for &day in days {
            if !(0..=6).contains(&day) {
                return Err(WindowError::InvalidDay(day));
            }
            day_set[day as usize] = true;
        }

        Ok(Self {
            start,
            end,
            days: day_set,
        })
    }

    /// Whether the given instant falls inside the window
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        let day = at.weekday().num_days_from_sunday() as usize;
        if !self.days[day] {
            return false;
        }

        let time = at.time();
        self.start <= time && time < self.end
    }
}

fn parse_time(value: &str) -> Result<NaiveTime, WindowError> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .map_err(|_| WindowError::InvalidTime(value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn test_parse_valid_window() {
        let window = CallWindow::parse("09:00", "17:30", &[1, 2, 3, 4, 5]).unwrap();
        // 2024-01-01 is a Monday
        assert!(window.contains(utc(2024, 1, 1, 12, 0)));
    }

    #[test]
    fn test_parse_rejects_bad_time() {
        assert_eq!(
            CallWindow::parse("9am", "17:00", &[1]),
            Err(WindowError::InvalidTime("9am".to_string()))
        );
        assert_eq!(
            CallWindow::parse("09:00", "25:00", &[1]),
            Err(WindowError::InvalidTime("25:00".to_string()))
        );
    }

    #[test]
    fn test_parse_rejects_inverted_range() {
        assert_eq!(
            CallWindow::parse("17:00", "09:00", &[1]),
            Err(WindowError::StartNotBeforeEnd)
        );
        assert_eq!(
            CallWindow::parse("09:00", "09:00", &[1]),
            Err(WindowError::StartNotBeforeEnd)
        );
    }

    #[test]
    fn test_parse_rejects_bad_days() {
        assert_eq!(
            CallWindow::parse("09:00", "17:00", &[]),
            Err(WindowError::NoDays)
        );
        assert_eq!(
            CallWindow::parse("09:00", "17:00", &[7]),
            Err(WindowError::InvalidDay(7))
        );
        assert_eq!(
            CallWindow::parse("09:00", "17:00", &[-1]),
            Err(WindowError::InvalidDay(-1))
        );
    }

    #[test]
    fn test_excluded_weekday() {
        // Weekdays only; 2024-01-06 is a Saturday, 2024-01-07 a Sunday
        let window = CallWindow::parse("09:00", "17:00", &[1, 2, 3, 4, 5]).unwrap();
        assert!(!window.contains(utc(2024, 1, 6, 12, 0)));
        assert!(!window.contains(utc(2024, 1, 7, 12, 0)));
        assert!(window.contains(utc(2024, 1, 8, 12, 0)));
    }

    #[test]
    fn test_sunday_is_day_zero() {
        let window = CallWindow::parse("09:00", "17:00", &[0]).unwrap();
        assert!(window.contains(utc(2024, 1, 7, 12, 0)));
        assert!(!window.contains(utc(2024, 1, 8, 12, 0)));
    }

    #[test]
    fn test_half_open_boundaries() {
        let window = CallWindow::parse("09:00", "17:00", &[1]).unwrap();
        assert!(window.contains(utc(2024, 1, 1, 9, 0)));
        assert!(window.contains(utc(2024, 1, 1, 16, 59)));
        assert!(!window.contains(utc(2024, 1, 1, 17, 0)));
        assert!(!window.contains(utc(2024, 1, 1, 8, 59)));
    }
}
