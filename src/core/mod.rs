//! The telemetry metrics engine.
//!
//! Every function here is pure: it takes caller-supplied series and
//! parameters and returns fresh values, with no I/O and no shared state.
//! - Physical quantities derived from temperature and humidity
//! - Descriptive statistics and correlation
//! - Outlier flags
//! - Trend derivatives and time aggregation
//! - Threshold bands and host health limits
//! - Summary-card snapshots

pub mod anomaly;
pub mod physics;
pub mod statistics;
pub mod summary;
pub mod thresholds;
pub mod trend;

// Re-export commonly used types
pub use anomaly::{detect_anomalies, AnomalyFlags, AnomalyMethod, DEFAULT_IQR_THRESHOLD};
pub use physics::{
    dew_point, heat_index, soil_moisture_percent, try_vapor_pressure_deficit,
    vapor_pressure_deficit, vpd_status, with_derived_metrics, DerivedMetric, VpdStatus,
};
pub use statistics::{
    calculate_statistics, correlation_matrix, CorrelationMatrix, Orientation, ReportTable,
    Statistic, StatisticsReport, Summary,
};
pub use summary::{DashboardSnapshot, FarmSummary, HostSummary, SummaryBuilder};
pub use thresholds::{
    check_host_health, classify_against_thresholds, HealthIssue, HealthLimits, ThresholdLevel,
    ThresholdSet, ThresholdStatus,
};
pub use trend::{
    create_time_bins, moving_average_column, moving_averages, rate_of_change, resample,
    AggregationFn, AggregationInterval, TimeBin, TimePeriod,
};
