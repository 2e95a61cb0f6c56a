//! Tabular time-series model consumed by the metrics engine.
//!
//! This module contains:
//! - Readings and single-device series with sparse, nullable metric columns
//! - Time ranges and presets for the exploration tool
//! - Local wall-clock conversion

pub mod range;
pub mod types;

// Re-export commonly used types
pub use range::{to_local, QuickRange, TimeRange, DEFAULT_TIME_ZONE};
pub use types::{Reading, Series, SeriesError};
