//! Data sources feeding the engine.
//!
//! A source answers one question: which readings did a device report in a
//! time range. The engine never fetches on its own; callers pull a
//! [`Series`] from a source (directly or through the background
//! [`Poller`]) and hand it to the `core` functions.

pub mod file;
pub mod memory;
pub mod poller;

use crate::series::Series;
use chrono::{DateTime, Utc};

pub use file::{parse_document, FileSource, SourceConfig};
pub use memory::MemorySource;
pub use poller::{PollEvent, PollTarget, Poller, PollerConfig, PollerError};

/// Something that can return a device's readings for a time range.
///
/// Implementations return rows with `start <= timestamp < end`, sorted by
/// time. An empty series is a valid answer, not an error.
pub trait DataSource: Send + Sync {
    fn fetch_readings(
        &self,
        device: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Series, SourceError>;
}

/// Errors a data source can report.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceError {
    Io(String),
    Parse(String),
    Unavailable(String),
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceError::Io(e) => write!(f, "IO error: {e}"),
            SourceError::Parse(e) => write!(f, "Parse error: {e}"),
            SourceError::Unavailable(e) => write!(f, "Source unavailable: {e}"),
        }
    }
}

impl std::error::Error for SourceError {}
