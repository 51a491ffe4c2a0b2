//! Refresh intervals and per-endpoint staleness checks.

use chrono::{DateTime, Duration, Local};
use serde::{Deserialize, Serialize};

use super::{is_night, EndpointCache, EndpointKind, EndpointState, NightWindow, ScheduleError};

pub const MIN_INTERVAL_MINUTES: u32 = 1;
pub const MAX_INTERVAL_MINUTES: u32 = 1440;

/// Day and night refresh intervals of one endpoint, in minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntervalPolicy {
    pub day_minutes: u32,
    pub night_minutes: u32,
}

impl IntervalPolicy {
    #[cfg(test)]
    pub fn new(day_minutes: u32, night_minutes: u32) -> Result<Self, ScheduleError> {
        validate_interval(day_minutes)?;
        validate_interval(night_minutes)?;
        Ok(Self {
            day_minutes,
            night_minutes,
        })
    }

    /// The interval that applies right now.
    pub fn interval(&self, night: bool) -> Duration {
        let minutes = if night {
            self.night_minutes
        } else {
            self.day_minutes
        };
        Duration::minutes(i64::from(minutes))
    }
}

/// Check that an interval is within 1..=1440 minutes.
pub fn validate_interval(minutes: u32) -> Result<(), ScheduleError> {
    if !(MIN_INTERVAL_MINUTES..=MAX_INTERVAL_MINUTES).contains(&minutes) {
        return Err(ScheduleError::IntervalOutOfRange(minutes));
    }
    Ok(())
}

/// Interval policies for all four endpoints.
///
/// Defaults keep a single location at roughly 7,700 calls a month, under the
/// 10,000 free-tier limit with a 22:00-06:00 night.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntervalTable {
    pub current: IntervalPolicy,
    pub daily: IntervalPolicy,
    pub hourly: IntervalPolicy,
    pub alerts: IntervalPolicy,
}

impl Default for IntervalTable {
    fn default() -> Self {
        Self {
            current: IntervalPolicy { day_minutes: 15, night_minutes: 30 },
            daily: IntervalPolicy { day_minutes: 30, night_minutes: 60 },
            hourly: IntervalPolicy { day_minutes: 20, night_minutes: 60 },
            alerts: IntervalPolicy { day_minutes: 15, night_minutes: 30 },
        }
    }
}

impl IntervalTable {
    pub fn get(&self, endpoint: EndpointKind) -> &IntervalPolicy {
        match endpoint {
            EndpointKind::Current => &self.current,
            EndpointKind::Daily => &self.daily,
            EndpointKind::Hourly => &self.hourly,
            EndpointKind::Alerts => &self.alerts,
        }
    }

    pub fn get_mut(&mut self, endpoint: EndpointKind) -> &mut IntervalPolicy {
        match endpoint {
            EndpointKind::Current => &mut self.current,
            EndpointKind::Daily => &mut self.daily,
            EndpointKind::Hourly => &mut self.hourly,
            EndpointKind::Alerts => &mut self.alerts,
        }
    }
}

/// Whether an endpoint is due for a refresh at `now`.
///
/// An endpoint that has never been fetched is always due.
pub fn should_refresh(
    endpoint: EndpointKind,
    state: &EndpointState,
    now: DateTime<Local>,
    window: &NightWindow,
    intervals: &IntervalTable,
) -> bool {
    let Some(last_fetch) = state.last_fetch else {
        return true;
    };

    let night = is_night(now.time(), window);
    let interval = intervals.get(endpoint).interval(night);

    now - last_fetch >= interval
}

/// All endpoints due at `now`, in fetch order.
pub fn due_endpoints(
    cache: &EndpointCache,
    now: DateTime<Local>,
    window: &NightWindow,
    intervals: &IntervalTable,
) -> Vec<EndpointKind> {
    EndpointKind::ALL
        .into_iter()
        .filter(|endpoint| should_refresh(*endpoint, &cache.state(*endpoint), now, window, intervals))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::PartialPayloads;
    use chrono::TimeZone;
    use serde_json::json;

    fn at(h: u32, m: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 6, 15, h, m, 0).unwrap()
    }

    fn fetched_at(time: DateTime<Local>) -> EndpointState {
        EndpointState {
            last_fetch: Some(time),
            payload: Some(json!({})),
        }
    }

    #[test]
    fn test_never_fetched_is_always_due() {
        let window = NightWindow::default();
        let mut intervals = IntervalTable::default();
        for endpoint in EndpointKind::ALL {
            *intervals.get_mut(endpoint) = IntervalPolicy::new(1440, 1440).unwrap();
        }

        for endpoint in EndpointKind::ALL {
            for now in [at(3, 0), at(12, 0), at(23, 59)] {
                assert!(should_refresh(
                    endpoint,
                    &EndpointState::default(),
                    now,
                    &window,
                    &intervals
                ));
            }
        }
    }

    #[test]
    fn test_day_interval_boundary() {
        let window = NightWindow::default();
        let mut intervals = IntervalTable::default();
        intervals.current = IntervalPolicy::new(15, 30).unwrap();

        let last = at(12, 0);
        let state = fetched_at(last);

        let early = last + Duration::minutes(14);
        let due = last + Duration::minutes(15);
        assert!(!should_refresh(EndpointKind::Current, &state, early, &window, &intervals));
        assert!(should_refresh(EndpointKind::Current, &state, due, &window, &intervals));
    }

    #[test]
    fn test_night_interval_applies_at_night() {
        let window = NightWindow::default();
        let mut intervals = IntervalTable::default();
        intervals.current = IntervalPolicy::new(15, 30).unwrap();

        let last = at(23, 0);
        let state = fetched_at(last);

        assert!(!should_refresh(
            EndpointKind::Current,
            &state,
            last + Duration::minutes(20),
            &window,
            &intervals
        ));
        assert!(should_refresh(
            EndpointKind::Current,
            &state,
            last + Duration::minutes(30),
            &window,
            &intervals
        ));
    }

    #[test]
    fn test_endpoints_are_independent() {
        let window = NightWindow::default();
        let intervals = IntervalTable::default();

        let mut cache = EndpointCache::new();
        let mut fresh = PartialPayloads::new();
        for endpoint in EndpointKind::ALL {
            fresh.insert(endpoint, json!([]));
        }
        cache.reconcile(fresh, at(12, 0));

        // Current and alerts refresh every 15 minutes by day, hourly every 20, daily every 30.
        assert_eq!(
            due_endpoints(&cache, at(12, 15), &window, &intervals),
            vec![EndpointKind::Current, EndpointKind::Alerts]
        );
        assert_eq!(
            due_endpoints(&cache, at(12, 20), &window, &intervals),
            vec![EndpointKind::Current, EndpointKind::Hourly, EndpointKind::Alerts]
        );
        assert_eq!(due_endpoints(&cache, at(12, 30), &window, &intervals).len(), 4);
        assert!(due_endpoints(&cache, at(12, 10), &window, &intervals).is_empty());
    }

    #[test]
    fn test_interval_bounds() {
        assert_eq!(IntervalPolicy::new(0, 30), Err(ScheduleError::IntervalOutOfRange(0)));
        assert!(IntervalPolicy::new(15, 1441).is_err());
        assert!(IntervalPolicy::new(1, 1440).is_ok());
    }
}
