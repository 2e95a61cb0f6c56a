//! In-memory data source.

use crate::series::{Reading, Series};
use crate::source::{DataSource, SourceError};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::RwLock;

/// Readings held in memory, keyed by device.
#[derive(Debug, Default)]
pub struct MemorySource {
    readings: RwLock<HashMap<String, Vec<Reading>>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a source pre-filled with readings.
    pub fn with_readings(readings: impl IntoIterator<Item = Reading>) -> Self {
        let source = Self::new();
        source.extend(readings);
        source
    }

    /// Add one reading.
    pub fn insert(&self, reading: Reading) {
        self.extend(std::iter::once(reading));
    }

    /// Add several readings.
    pub fn extend(&self, readings: impl IntoIterator<Item = Reading>) {
        let mut map = match self.readings.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        for reading in readings {
            map.entry(reading.device_id.clone()).or_default().push(reading);
        }
    }

    /// Total number of stored readings across devices.
    pub fn len(&self) -> usize {
        self.readings
            .read()
            .map(|map| map.values().map(Vec::len).sum())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DataSource for MemorySource {
    fn fetch_readings(
        &self,
        device: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Series, SourceError> {
        let map = self
            .readings
            .read()
            .map_err(|_| SourceError::Unavailable("reading store lock poisoned".to_string()))?;

        let rows = map
            .get(device)
            .into_iter()
            .flatten()
            .filter(|r| r.timestamp >= start && r.timestamp < end)
            .cloned();

        let mut series = Series::from_readings(device, rows)
            .map_err(|e| SourceError::Parse(e.to_string()))?;
        series.sort_by_time();
        Ok(series)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(minute: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap() + Duration::minutes(minute)
    }

    #[test]
    fn test_fetch_filters_device_and_half_open_range() {
        let source = MemorySource::with_readings(vec![
            Reading::new("SmartFarm", at(2)).with_metric("temperature", 2.0),
            Reading::new("SmartFarm", at(0)).with_metric("temperature", 0.0),
            Reading::new("SmartFarm", at(1)).with_metric("temperature", 1.0),
            Reading::new("raspberry_pi_status", at(1)).with_metric("cpu_temp", 50.0),
        ]);
        assert_eq!(source.len(), 4);

        let series = source.fetch_readings("SmartFarm", at(0), at(2)).unwrap();
        assert_eq!(series.device_id(), "SmartFarm");
        assert_eq!(series.present_values("temperature"), vec![0.0, 1.0]);
    }

    #[test]
    fn test_unknown_device_is_empty() {
        let source = MemorySource::new();
        let series = source.fetch_readings("nobody", at(0), at(10)).unwrap();
        assert!(series.is_empty());
        assert!(source.is_empty());
    }
}
