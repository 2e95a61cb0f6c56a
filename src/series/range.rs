//! Time windows and local wall-clock conversion.

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Default zone for the greenhouse deployment (UTC+7, no DST).
pub const DEFAULT_TIME_ZONE: Tz = chrono_tz::Asia::Bangkok;

/// A closed time interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// The window of `length` ending at `now`.
    pub fn trailing(now: DateTime<Utc>, length: Duration) -> Self {
        Self {
            start: now - length,
            end: now,
        }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant <= self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

/// Preset windows offered by the exploration tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuickRange {
    LastHour,
    Last6Hours,
    Last24Hours,
    Last3Days,
    Last7Days,
}

impl QuickRange {
    pub fn duration(&self) -> Duration {
        match self {
            QuickRange::LastHour => Duration::hours(1),
            QuickRange::Last6Hours => Duration::hours(6),
            QuickRange::Last24Hours => Duration::days(1),
            QuickRange::Last3Days => Duration::days(3),
            QuickRange::Last7Days => Duration::days(7),
        }
    }

    pub fn resolve(&self, now: DateTime<Utc>) -> TimeRange {
        TimeRange::trailing(now, self.duration())
    }
}

impl FromStr for QuickRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "1h" => Ok(QuickRange::LastHour),
            "6h" => Ok(QuickRange::Last6Hours),
            "24h" | "1d" => Ok(QuickRange::Last24Hours),
            "3d" => Ok(QuickRange::Last3Days),
            "7d" | "1w" => Ok(QuickRange::Last7Days),
            other => Err(format!(
                "Unknown range '{other}' (expected 1h, 6h, 24h, 3d or 7d)"
            )),
        }
    }
}

/// Convert a UTC instant to wall-clock time in `tz`.
pub fn to_local(instant: DateTime<Utc>, tz: Tz) -> DateTime<Tz> {
    instant.with_timezone(&tz)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    #[test]
    fn test_quick_range_parsing() {
        assert_eq!("1h".parse::<QuickRange>(), Ok(QuickRange::LastHour));
        assert_eq!("24H".parse::<QuickRange>(), Ok(QuickRange::Last24Hours));
        assert_eq!("7d".parse::<QuickRange>(), Ok(QuickRange::Last7Days));
        assert!("2y".parse::<QuickRange>().is_err());
    }

    #[test]
    fn test_resolve_trailing_window() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let range = QuickRange::Last6Hours.resolve(now);
        assert_eq!(range.end, now);
        assert_eq!(range.duration(), Duration::hours(6));
        assert!(range.contains(now));
        assert!(range.contains(range.start));
        assert!(!range.contains(now + Duration::seconds(1)));
    }

    #[test]
    fn test_bangkok_offset() {
        let utc = Utc.with_ymd_and_hms(2024, 5, 1, 20, 30, 0).unwrap();
        let local = to_local(utc, DEFAULT_TIME_ZONE);
        assert_eq!(local.hour(), 3);
        assert_eq!(local.minute(), 30);
    }
}
