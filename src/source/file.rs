//! Data source backed by exported telemetry documents on disk.
//!
//! Each collection is a file in the data directory, either
//! `{collection}.jsonl` with one document per line or `{collection}.json`
//! holding an array. Documents look like:
//!
//! ```json
//! {"_id": "...", "deviceName": "SmartFarm", "timestamp_utc": "2024-05-01T03:00:00",
//!  "temperature": 27.5, "humidity": 68.0, "soil_raw_1": 512}
//! ```

use crate::series::{Reading, Series};
use crate::source::{DataSource, SourceError};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Field holding the device identity.
pub const DEVICE_FIELD: &str = "deviceName";

/// Field holding the UTC timestamp.
pub const TIMESTAMP_FIELD: &str = "timestamp_utc";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Where a collection lives on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub data_dir: PathBuf,
    pub collection: String,
}

/// Reads one collection from the data directory on every fetch.
#[derive(Debug, Clone)]
pub struct FileSource {
    config: SourceConfig,
}

impl FileSource {
    pub fn new(config: SourceConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    /// The file backing this collection, preferring JSON lines.
    pub fn resolve_path(&self) -> Option<PathBuf> {
        ["jsonl", "json"]
            .iter()
            .map(|ext| {
                self.config
                    .data_dir
                    .join(format!("{}.{ext}", self.config.collection))
            })
            .find(|p| p.exists())
    }

    fn read_documents(&self, path: &Path) -> Result<Vec<Value>, SourceError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SourceError::Io(format!("{}: {e}", path.display())))?;

        if path.extension().is_some_and(|ext| ext == "jsonl") {
            let mut documents = Vec::new();
            for (number, line) in content.lines().enumerate() {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match serde_json::from_str::<Value>(line) {
                    Ok(doc) => documents.push(doc),
                    Err(e) => tracing::warn!(
                        file = %path.display(),
                        line = number + 1,
                        error = %e,
                        "skipping malformed document"
                    ),
                }
            }
            Ok(documents)
        } else {
            match serde_json::from_str::<Value>(&content)
                .map_err(|e| SourceError::Parse(format!("{}: {e}", path.display())))?
            {
                Value::Array(documents) => Ok(documents),
                _ => Err(SourceError::Parse(format!(
                    "{}: expected an array of documents",
                    path.display()
                ))),
            }
        }
    }
}

impl DataSource for FileSource {
    fn fetch_readings(
        &self,
        device: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Series, SourceError> {
        let path = self.resolve_path().ok_or_else(|| {
            SourceError::Unavailable(format!(
                "collection '{}' not found in {}",
                self.config.collection,
                self.config.data_dir.display()
            ))
        })?;

        let mut series = Series::new(device);
        let mut skipped = 0usize;

        for doc in self.read_documents(&path)? {
            let Value::Object(fields) = doc else {
                skipped += 1;
                continue;
            };
            if fields.get(DEVICE_FIELD).and_then(Value::as_str) != Some(device) {
                continue;
            }
            match parse_document(&fields) {
                Ok(reading) if reading.timestamp >= start && reading.timestamp < end => {
                    series
                        .push(reading)
                        .map_err(|e| SourceError::Parse(e.to_string()))?;
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(collection = %self.config.collection, error = %e, "skipping document");
                    skipped += 1;
                }
            }
        }

        if skipped > 0 {
            tracing::debug!(skipped, collection = %self.config.collection, "documents skipped");
        }

        series.sort_by_time();
        Ok(series)
    }
}

/// Turn one telemetry document into a reading.
///
/// Numeric fields become metrics; `_id`, the device and timestamp fields,
/// nulls and any non-numeric value are ignored.
pub fn parse_document(fields: &Map<String, Value>) -> Result<Reading, SourceError> {
    let device = fields
        .get(DEVICE_FIELD)
        .and_then(Value::as_str)
        .ok_or_else(|| SourceError::Parse(format!("missing '{DEVICE_FIELD}'")))?;

    let raw_ts = fields
        .get(TIMESTAMP_FIELD)
        .and_then(Value::as_str)
        .ok_or_else(|| SourceError::Parse(format!("missing '{TIMESTAMP_FIELD}'")))?;

    let mut reading = Reading::new(device, parse_timestamp(raw_ts)?);
    for (name, value) in fields {
        if name == "_id" || name == DEVICE_FIELD || name == TIMESTAMP_FIELD {
            continue;
        }
        if let Some(v) = value.as_f64() {
            reading.set(name.as_str(), Some(v));
        }
    }

    Ok(reading)
}

/// Parse a naive UTC timestamp, falling back to RFC 3339.
fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, SourceError> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .or_else(|_| DateTime::parse_from_rfc3339(raw).map(|dt| dt.with_timezone(&Utc)))
        .map_err(|e| SourceError::Parse(format!("bad timestamp '{raw}': {e}")))
}
