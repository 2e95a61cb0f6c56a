//! Readings and per-device series.
//!
//! A metric that a sensor did not report is simply absent from the reading.
//! Non-finite values are treated the same way, so nothing downstream ever
//! mistakes a dropout for a real zero.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One sensor or host sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Instant the device took the sample
    pub timestamp: DateTime<Utc>,
    /// Identity of the reporting device
    pub device_id: String,
    /// Metric values keyed by field name; absent means "no value"
    pub metrics: BTreeMap<String, f64>,
}

impl Reading {
    /// Create a reading with no metrics.
    pub fn new(device_id: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            device_id: device_id.into(),
            metrics: BTreeMap::new(),
        }
    }

    /// Builder-style metric insertion.
    pub fn with_metric(mut self, name: impl Into<String>, value: f64) -> Self {
        self.set(name, Some(value));
        self
    }

    /// Set or clear a metric. Non-finite values clear it.
    pub fn set(&mut self, name: impl Into<String>, value: Option<f64>) {
        let name = name.into();
        match value.filter(|v| v.is_finite()) {
            Some(v) => {
                self.metrics.insert(name, v);
            }
            None => {
                self.metrics.remove(&name);
            }
        }
    }

    /// Value of a metric, or `None` when the sensor did not report it.
    pub fn value(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).copied().filter(|v| v.is_finite())
    }
}

/// Errors raised while assembling a series.
#[derive(Debug, Clone, PartialEq)]
pub enum SeriesError {
    DeviceMismatch { expected: String, found: String },
}

impl std::fmt::Display for SeriesError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SeriesError::DeviceMismatch { expected, found } => {
                write!(f, "Reading from device '{found}' cannot join series for '{expected}'")
            }
        }
    }
}

impl std::error::Error for SeriesError {}

/// Ordered readings from a single device.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    device_id: String,
    readings: Vec<Reading>,
}

impl Series {
    /// Create an empty series for a device.
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            readings: Vec::new(),
        }
    }

    /// Build a series, rejecting readings from any other device.
    pub fn from_readings(
        device_id: impl Into<String>,
        readings: impl IntoIterator<Item = Reading>,
    ) -> Result<Self, SeriesError> {
        let mut series = Self::new(device_id);
        for reading in readings {
            series.push(reading)?;
        }
        Ok(series)
    }

    /// Append a reading.
    pub fn push(&mut self, reading: Reading) -> Result<(), SeriesError> {
        if reading.device_id != self.device_id {
            return Err(SeriesError::DeviceMismatch {
                expected: self.device_id.clone(),
                found: reading.device_id,
            });
        }
        self.readings.push(reading);
        Ok(())
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn readings(&self) -> &[Reading] {
        &self.readings
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    /// Values of one metric, aligned with the rows.
    pub fn column(&self, name: &str) -> Vec<Option<f64>> {
        self.readings.iter().map(|r| r.value(name)).collect()
    }

    /// Only the values that are present, in row order.
    pub fn present_values(&self, name: &str) -> Vec<f64> {
        self.readings.iter().filter_map(|r| r.value(name)).collect()
    }

    /// Whether any row carries a value for this metric.
    pub fn has_column(&self, name: &str) -> bool {
        self.readings.iter().any(|r| r.value(name).is_some())
    }

    /// Every metric name seen in the series, sorted.
    pub fn numeric_columns(&self) -> Vec<String> {
        let names: BTreeSet<&String> = self
            .readings
            .iter()
            .flat_map(|r| r.metrics.keys())
            .collect();
        names.into_iter().cloned().collect()
    }

    /// The most recent reading by timestamp.
    pub fn latest(&self) -> Option<&Reading> {
        self.readings.iter().max_by_key(|r| r.timestamp)
    }

    /// Sort rows by timestamp. Stable, so equal timestamps keep arrival order.
    pub fn sort_by_time(&mut self) {
        self.readings.sort_by_key(|r| r.timestamp);
    }

    /// Rows with `start <= timestamp <= end`.
    pub fn between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Series {
        self.filter(|r| r.timestamp >= start && r.timestamp <= end)
    }

    /// Rows strictly after `instant`.
    pub fn since(&self, instant: DateTime<Utc>) -> Series {
        self.filter(|r| r.timestamp > instant)
    }

    fn filter(&self, keep: impl Fn(&Reading) -> bool) -> Series {
        Series {
            device_id: self.device_id.clone(),
            readings: self.readings.iter().filter(|r| keep(r)).cloned().collect(),
        }
    }

    /// Attach a computed column. Rows beyond the supplied values are left untouched.
    pub(crate) fn set_column(
        &mut self,
        name: &str,
        values: impl IntoIterator<Item = Option<f64>>,
    ) {
        for (reading, value) in self.readings.iter_mut().zip(values) {
            reading.set(name, value);
        }
    }
}
