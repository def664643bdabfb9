//! Quota windows and the clock they are measured against.

use chrono::{DateTime, Datelike, Local, TimeDelta, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Mutex, PoisonError};

/// How often a provider's usage counter starts over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResetPeriod {
    /// First instant of the calendar month, in the clock's time zone.
    #[default]
    Monthly,
    /// Fixed number of days counted from the last reset.
    ///
    /// Deprecated: kept so counters written by older deployments that used a
    /// 30-day interval keep their meaning. Prefer `Monthly`.
    Rolling { days: u32 },
}

impl ResetPeriod {
    /// Start of the window that contains `now`.
    ///
    /// For `Rolling`, windows are anchored at `last_reset` and advance in whole
    /// periods, so a provider idle for several periods lands on the current
    /// one. A `last_reset` in the future is returned unchanged.
    pub fn window_start<Tz: TimeZone>(
        &self,
        now: &DateTime<Tz>,
        last_reset: DateTime<Utc>,
    ) -> DateTime<Utc> {
        match *self {
            ResetPeriod::Monthly => start_of_month(now),
            ResetPeriod::Rolling { days } => {
                let now = now.with_timezone(&Utc);
                let period = TimeDelta::days(i64::from(days.max(1)));
                if now <= last_reset {
                    return last_reset;
                }
                let elapsed = (now - last_reset).num_seconds();
                let whole = elapsed / period.num_seconds();
                last_reset + TimeDelta::seconds(whole * period.num_seconds())
            }
        }
    }
}

impl fmt::Display for ResetPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResetPeriod::Monthly => write!(f, "monthly"),
            ResetPeriod::Rolling { days } => write!(f, "every {days} days"),
        }
    }
}

fn start_of_month<Tz: TimeZone>(now: &DateTime<Tz>) -> DateTime<Utc> {
    let tz = now.timezone();
    let midnight = now
        .date_naive()
        .with_day(1)
        .and_then(|first| first.and_hms_opt(0, 0, 0));

    match midnight {
        // Midnight can be skipped by a DST jump; fall back to the same wall
        // time read as UTC, which still lies within the first day.
        Some(naive) => tz
            .from_local_datetime(&naive)
            .earliest()
            .unwrap_or_else(|| tz.from_utc_datetime(&naive))
            .with_timezone(&Utc),
        None => now.with_timezone(&Utc),
    }
}

/// Source of "now" for window calculations.
pub trait Clock: Send + Sync + 'static {
    type Tz: TimeZone;

    fn now(&self) -> DateTime<Self::Tz>;
}

/// Wall clock in the machine's local time zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    type Tz = Local;

    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// A clock that only moves when told to. Windows are computed in UTC.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = now;
    }
}

impl Clock for ManualClock {
    type Tz = Utc;

    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    fn utc(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn test_monthly_window_starts_on_first_of_month() {
        let now = utc(2026, 3, 17, 14);
        let start = ResetPeriod::Monthly.window_start(&now, utc(2026, 1, 1, 0));
        assert_eq!(start, utc(2026, 3, 1, 0));
    }

    #[test]
    fn test_monthly_window_uses_clock_time_zone() {
        // 2026-04-01 01:30 in UTC+05:00 is still March 31st in UTC.
        let tz = FixedOffset::east_opt(5 * 3600).unwrap();
        let now = tz.with_ymd_and_hms(2026, 4, 1, 1, 30, 0).unwrap();
        let start = ResetPeriod::Monthly.window_start(&now, utc(2026, 1, 1, 0));
        assert_eq!(start, utc(2026, 3, 31, 19));
    }

    #[test]
    fn test_monthly_window_ignores_last_reset() {
        let now = utc(2026, 12, 31, 23);
        let a = ResetPeriod::Monthly.window_start(&now, utc(2020, 5, 1, 0));
        let b = ResetPeriod::Monthly.window_start(&now, utc(2026, 12, 1, 0));
        assert_eq!(a, b);
        assert_eq!(a, utc(2026, 12, 1, 0));
    }

    #[test]
    fn test_rolling_window_advances_whole_periods() {
        let period = ResetPeriod::Rolling { days: 30 };
        let last_reset = utc(2026, 1, 1, 0);

        // Inside the first period: unchanged.
        let start = period.window_start(&utc(2026, 1, 20, 0), last_reset);
        assert_eq!(start, last_reset);

        // Two and a bit periods later: lands on the start of the third.
        let start = period.window_start(&utc(2026, 3, 5, 0), last_reset);
        assert_eq!(start, last_reset + TimeDelta::days(60));
    }

    #[test]
    fn test_rolling_window_with_future_last_reset() {
        let period = ResetPeriod::Rolling { days: 30 };
        let last_reset = utc(2026, 6, 1, 0);
        let start = period.window_start(&utc(2026, 5, 1, 0), last_reset);
        assert_eq!(start, last_reset);
    }

    #[test]
    fn test_reset_period_serde() {
        let monthly: ResetPeriod = serde_yaml::from_str("monthly").unwrap();
        assert_eq!(monthly, ResetPeriod::Monthly);

        let rolling: ResetPeriod = serde_yaml::from_str("rolling:\n  days: 30").unwrap();
        assert_eq!(rolling, ResetPeriod::Rolling { days: 30 });

        let json = serde_json::to_string(&ResetPeriod::Rolling { days: 7 }).unwrap();
        assert_eq!(json, r#"{"rolling":{"days":7}}"#);
    }

    #[test]
    fn test_manual_clock_moves_on_set() {
        let clock = ManualClock::new(utc(2026, 1, 15, 0));
        assert_eq!(clock.now(), utc(2026, 1, 15, 0));
        clock.set(utc(2026, 2, 2, 0));
        assert_eq!(clock.now(), utc(2026, 2, 2, 0));
    }
}
