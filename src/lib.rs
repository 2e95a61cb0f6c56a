//! SmartFarm Telemetry - metrics engine for greenhouse and edge-host readings.
//!
//! This library turns raw time series from a greenhouse controller
//! (temperature, humidity, soil moisture) and its edge host (CPU, memory,
//! disk, network) into the numbers a monitoring dashboard shows.
//!
//! # Guarantees
//!
//! - **Pure engine**: everything in [`core`] is a function of its inputs,
//!   with no I/O and no shared state
//! - **No zero-fill**: a metric the sensor did not report stays missing
//! - **Permissive**: sensor noise yields numbers or documented fallbacks,
//!   never a panic mid-pipeline
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    SmartFarm Telemetry                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐       │
//! │  │ DataSource  │──▶│   Poller    │──▶│   Series    │       │
//! │  │ (file/mem)  │   │ (interval)  │   │ (per device)│       │
//! │  └─────────────┘   └─────────────┘   └─────────────┘       │
//! │         │                                    │              │
//! │         ▼                                    ▼              │
//! │  ┌─────────────┐                     ┌─────────────┐       │
//! │  │  Activity   │                     │    Core     │       │
//! │  │    Log      │                     │  (engine)   │       │
//! │  └─────────────┘                     └─────────────┘       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use chrono::Utc;
//! use smartfarm_telemetry::core::{calculate_statistics, vapor_pressure_deficit, Statistic};
//! use smartfarm_telemetry::series::{Reading, Series};
//!
//! let series = Series::from_readings(
//!     "SmartFarm",
//!     (1..=5).map(|i| Reading::new("SmartFarm", Utc::now()).with_metric("x", i as f64)),
//! )
//! .unwrap();
//!
//! let report = calculate_statistics(&series, &["x"]);
//! assert_eq!(report.get("x", Statistic::Mean), Some(3.0));
//!
//! assert_eq!(vapor_pressure_deficit(Some(25.0), None), 0.0);
//! ```

pub mod activity;
pub mod config;
pub mod core;
pub mod series;
pub mod source;

// Re-export key types at crate root for convenience
pub use activity::{ActivityLog, ActivityStats, SharedActivityLog};
pub use config::{Config, ConfigError};
pub use core::{DashboardSnapshot, StatisticsReport, SummaryBuilder};
pub use series::{QuickRange, Reading, Series, SeriesError, TimeRange};
pub use source::{DataSource, FileSource, MemorySource, Poller, SourceError};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
