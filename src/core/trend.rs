//! Trend derivatives: rolling means, percent change, calendar bins and
//! time aggregation.

use crate::core::statistics::quantile;
use crate::series::{to_local, Reading, Series};
use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::collections::BTreeMap;

/// Window sizes used when the caller does not pick any.
pub const DEFAULT_MOVING_AVERAGE_WINDOWS: [usize; 3] = [5, 10, 20];

/// Column name for a moving average of `variable` over `window` rows.
pub fn moving_average_column(variable: &str, window: usize) -> String {
    format!("{variable}_ma{window}")
}

/// Copy of `series` with one `{variable}_ma{w}` column per window.
///
/// Each value is the mean of the present samples among the last `w` rows,
/// so leading rows average over fewer points instead of being empty. A row
/// whose whole window is missing stays missing.
pub fn moving_averages(series: &Series, variable: &str, windows: &[usize]) -> Series {
    let column = series.column(variable);
    let mut out = series.clone();

    for &window in windows {
        if window == 0 {
            tracing::warn!(variable, "ignoring moving average window of 0");
            continue;
        }
        let averages = (0..column.len()).map(|i| {
            let start = (i + 1).saturating_sub(window);
            let present: Vec<f64> = column[start..=i].iter().flatten().copied().collect();
            if present.is_empty() {
                None
            } else {
                Some(present.iter().sum::<f64>() / present.len() as f64)
            }
        });
        out.set_column(&moving_average_column(variable, window), averages);
    }

    out
}

/// Percent change of `variable` relative to `period` rows earlier.
///
/// NaN for the first `period` rows, where either sample is missing, and
/// where the earlier value is zero.
pub fn rate_of_change(series: &Series, variable: &str, period: usize) -> Vec<f64> {
    let column = series.column(variable);
    (0..column.len())
        .map(|i| {
            if i < period {
                return f64::NAN;
            }
            match (column[i], column[i - period]) {
                (Some(current), Some(previous)) if previous != 0.0 => {
                    (current - previous) / previous * 100.0
                }
                _ => f64::NAN,
            }
        })
        .collect()
}

/// Part of the day a local hour falls into. Intervals are half-open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimePeriod {
    /// [6, 12)
    Morning,
    /// [12, 18)
    Afternoon,
    /// [18, 24)
    Evening,
    /// [0, 6)
    Night,
}

impl TimePeriod {
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            6..=11 => TimePeriod::Morning,
            12..=17 => TimePeriod::Afternoon,
            18..=23 => TimePeriod::Evening,
            _ => TimePeriod::Night,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TimePeriod::Morning => "Morning",
            TimePeriod::Afternoon => "Afternoon",
            TimePeriod::Evening => "Evening",
            TimePeriod::Night => "Night",
        }
    }
}

/// Calendar attributes of one row in local time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimeBin {
    pub hour: u32,
    /// Monday = 0
    pub day_of_week: u32,
    pub day_name: String,
    pub is_weekend: bool,
    pub period: TimePeriod,
}

impl TimeBin {
    pub fn from_instant(instant: DateTime<Utc>, tz: Tz) -> Self {
        let local = to_local(instant, tz);
        let hour = local.hour();
        let day_of_week = local.weekday().num_days_from_monday();
        Self {
            hour,
            day_of_week,
            day_name: local.format("%A").to_string(),
            is_weekend: day_of_week >= 5,
            period: TimePeriod::from_hour(hour),
        }
    }
}

/// Calendar bins for every row, aligned with the series.
pub fn create_time_bins(series: &Series, tz: Tz) -> Vec<TimeBin> {
    series
        .readings()
        .iter()
        .map(|r| TimeBin::from_instant(r.timestamp, tz))
        .collect()
}

/// Bucket width for time aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggregationInterval {
    OneMinute,
    FiveMinutes,
    FifteenMinutes,
    ThirtyMinutes,
    OneHour,
    OneDay,
}

impl AggregationInterval {
    pub fn seconds(&self) -> i64 {
        match self {
            AggregationInterval::OneMinute => 60,
            AggregationInterval::FiveMinutes => 5 * 60,
            AggregationInterval::FifteenMinutes => 15 * 60,
            AggregationInterval::ThirtyMinutes => 30 * 60,
            AggregationInterval::OneHour => 60 * 60,
            AggregationInterval::OneDay => 24 * 60 * 60,
        }
    }
}

impl std::str::FromStr for AggregationInterval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "1min" => Ok(AggregationInterval::OneMinute),
            "5min" => Ok(AggregationInterval::FiveMinutes),
            "15min" => Ok(AggregationInterval::FifteenMinutes),
            "30min" => Ok(AggregationInterval::ThirtyMinutes),
            "1h" => Ok(AggregationInterval::OneHour),
            "1d" => Ok(AggregationInterval::OneDay),
            other => Err(format!(
                "Unknown interval '{other}' (expected 1min, 5min, 15min, 30min, 1H or 1D)"
            )),
        }
    }
}

/// Reducer applied to each bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationFn {
    #[default]
    Mean,
    Sum,
    Max,
    Min,
    Median,
    Std,
}

impl AggregationFn {
    /// Reduce present values. `None` when nothing was present.
    pub fn apply(&self, values: &[f64]) -> Option<f64> {
        if values.is_empty() {
            return None;
        }
        let result = match self {
            AggregationFn::Mean => values.iter().mean(),
            AggregationFn::Sum => values.iter().sum(),
            AggregationFn::Max => Statistics::max(values.iter()),
            AggregationFn::Min => Statistics::min(values.iter()),
            AggregationFn::Median => quantile(values, 0.5),
            AggregationFn::Std => values.iter().std_dev(),
        };
        Some(result).filter(|v| v.is_finite())
    }
}

impl std::str::FromStr for AggregationFn {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mean" => Ok(AggregationFn::Mean),
            "sum" => Ok(AggregationFn::Sum),
            "max" => Ok(AggregationFn::Max),
            "min" => Ok(AggregationFn::Min),
            "median" => Ok(AggregationFn::Median),
            "std" => Ok(AggregationFn::Std),
            other => Err(format!("Unknown aggregation function '{other}'")),
        }
    }
}

/// Aggregate every column of `series` into fixed-width buckets.
///
/// Buckets are aligned to local wall-clock time in `tz` (so `OneDay` starts
/// at local midnight). One row is emitted per bucket from the first to the
/// last occupied bucket; empty buckets carry no values. Each row is stamped
/// with the instant its bucket starts, so local day starts stay at midnight
/// across daylight-saving changes. Empty buckets whose local start time is
/// skipped by a clock change are omitted.
pub fn resample(
    series: &Series,
    interval: AggregationInterval,
    func: AggregationFn,
    tz: Tz,
) -> Series {
    let step = interval.seconds();
    let mut buckets: BTreeMap<i64, Vec<&Reading>> = BTreeMap::new();

    for reading in series.readings() {
        let local_secs = to_local(reading.timestamp, tz)
            .naive_local()
            .and_utc()
            .timestamp();
        let floored = local_secs.div_euclid(step) * step;
        buckets.entry(floored).or_default().push(reading);
    }

    let mut out = Series::new(series.device_id());
    let (Some(&first), Some(&last)) = (buckets.keys().next(), buckets.keys().next_back()) else {
        return out;
    };

    let columns = series.numeric_columns();
    let mut key = first;
    while key <= last {
        let occupied = buckets.get(&key);
        let Some(timestamp) = bucket_start(key, tz, occupied.is_some()) else {
            key += step;
            continue;
        };
        let mut row = Reading::new(series.device_id(), timestamp);
        if let Some(readings) = occupied {
            for column in &columns {
                let values: Vec<f64> = readings.iter().filter_map(|r| r.value(column)).collect();
                row.set(column.as_str(), func.apply(&values));
            }
        }
        // device ids match by construction
        let _ = out.push(row);
        key += step;
    }

    out
}

/// Instant at which the local wall-clock time `local_secs` begins in `tz`.
///
/// Ambiguous times take the earlier instant. A time skipped by a forward
/// jump has no start unless the bucket is `occupied`, in which case it is
/// read with the offset in force just before the jump.
fn bucket_start(local_secs: i64, tz: Tz, occupied: bool) -> Option<DateTime<Utc>> {
    let naive = DateTime::<Utc>::from_timestamp(local_secs, 0)?.naive_utc();
    let local = match tz.from_local_datetime(&naive).earliest() {
        Some(local) => local,
        None if occupied => {
            tz.from_local_datetime(&(naive - Duration::hours(1))).earliest()? + Duration::hours(1)
        }
        None => return None,
    };
    Some(local.with_timezone(&Utc))
}
