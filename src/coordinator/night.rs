//! Day/night classification of wall-clock times.

use chrono::NaiveTime;

use super::ScheduleError;

pub const DEFAULT_NIGHT_START: &str = "22:00";
pub const DEFAULT_NIGHT_END: &str = "06:00";

/// The part of the day during which night intervals apply, as `[start, end)`.
///
/// A window whose start is after its end wraps around midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NightWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl Default for NightWindow {
    fn default() -> Self {
        Self {
            start: NaiveTime::from_hms_opt(22, 0, 0).unwrap_or_default(),
            end: NaiveTime::from_hms_opt(6, 0, 0).unwrap_or_default(),
        }
    }
}

impl NightWindow {
    /// Parse a window from `HH:MM` (or `HH:MM:SS`) strings.
    pub fn parse(start: &str, end: &str) -> Result<Self, ScheduleError> {
        Ok(Self {
            start: parse_time_of_day(start)?,
            end: parse_time_of_day(end)?,
        })
    }

    /// Parse a window, falling back to the default 22:00-06:00 window when
    /// either bound is malformed.
    pub fn parse_or_default(start: &str, end: &str) -> Self {
        match Self::parse(start, end) {
            Ok(window) => window,
            Err(e) => {
                tracing::warn!(
                    "Invalid night window {}-{} ({}), using {}-{}",
                    start,
                    end,
                    e,
                    DEFAULT_NIGHT_START,
                    DEFAULT_NIGHT_END
                );
                Self::default()
            }
        }
    }

    pub fn crosses_midnight(&self) -> bool {
        self.start > self.end
    }
}

/// Parse a time of day in `HH:MM` or `HH:MM:SS` form.
pub fn parse_time_of_day(s: &str) -> Result<NaiveTime, ScheduleError> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .map_err(|_| ScheduleError::InvalidTimeOfDay(s.to_string()))
}

/// Whether `now` falls inside the night window.
pub fn is_night(now: NaiveTime, window: &NightWindow) -> bool {
    if window.crosses_midnight() {
        now >= window.start || now < window.end
    } else {
        window.start <= now && now < window.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_window_crossing_midnight() {
        let window = NightWindow::parse("22:00", "06:00").unwrap();
        assert!(window.crosses_midnight());

        assert!(is_night(t(23, 30), &window));
        assert!(is_night(t(5, 0), &window));
        assert!(is_night(t(22, 0), &window));
        assert!(is_night(t(0, 0), &window));
        assert!(!is_night(t(12, 0), &window));
        assert!(!is_night(t(6, 0), &window));
    }

    #[test]
    fn test_same_day_window() {
        let window = NightWindow::parse("01:00", "05:00").unwrap();
        assert!(!window.crosses_midnight());

        assert!(is_night(t(3, 0), &window));
        assert!(is_night(t(1, 0), &window));
        assert!(!is_night(t(5, 0), &window));
        assert!(!is_night(t(6, 0), &window));
        assert!(!is_night(t(23, 0), &window));
    }

    #[test]
    fn test_empty_window_is_never_night() {
        let window = NightWindow::parse("04:00", "04:00").unwrap();
        assert!(!is_night(t(4, 0), &window));
        assert!(!is_night(t(16, 0), &window));
    }

    #[test]
    fn test_parse_accepts_seconds() {
        let window = NightWindow::parse("21:30:00", "07:15:00").unwrap();
        assert_eq!(window.start, t(21, 30));
        assert_eq!(window.end, t(7, 15));
    }

    #[test]
    fn test_malformed_window_falls_back_to_default() {
        let window = NightWindow::parse_or_default("late", "06:00");
        assert_eq!(window, NightWindow::default());
        assert_eq!(window.start, t(22, 0));
        assert_eq!(window.end, t(6, 0));

        assert_eq!(
            NightWindow::parse("25:00", "06:00"),
            Err(ScheduleError::InvalidTimeOfDay("25:00".to_string()))
        );
    }
}
