//! Band classification and host health limits.

use crate::series::Reading;
use serde::{Deserialize, Serialize};

/// Closed `(min, max)` intervals per band. Bands left as `None` are not checked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ThresholdSet {
    pub critical: Option<(f64, f64)>,
    pub warning: Option<(f64, f64)>,
    pub normal: Option<(f64, f64)>,
}

impl ThresholdSet {
    pub fn with_critical(mut self, min: f64, max: f64) -> Self {
        self.critical = Some((min, max));
        self
    }

    pub fn with_warning(mut self, min: f64, max: f64) -> Self {
        self.warning = Some((min, max));
        self
    }

    pub fn with_normal(mut self, min: f64, max: f64) -> Self {
        self.normal = Some((min, max));
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdLevel {
    Critical,
    Warning,
    Normal,
    Unknown,
}

impl ThresholdLevel {
    pub fn name(&self) -> &'static str {
        match self {
            ThresholdLevel::Critical => "critical",
            ThresholdLevel::Warning => "warning",
            ThresholdLevel::Normal => "normal",
            ThresholdLevel::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ThresholdLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of classifying one value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThresholdStatus {
    pub level: ThresholdLevel,
    pub message: String,
}

/// Classify `value` against the supplied bands.
///
/// Bands are tried in the order critical, warning, normal and the first one
/// whose closed interval contains the value wins. A value no supplied band
/// contains is `Unknown`.
pub fn classify_against_thresholds(
    value: f64,
    thresholds: &ThresholdSet,
    parameter: &str,
) -> ThresholdStatus {
    let bands = [
        (ThresholdLevel::Critical, thresholds.critical),
        (ThresholdLevel::Warning, thresholds.warning),
        (ThresholdLevel::Normal, thresholds.normal),
    ];

    let level = bands
        .into_iter()
        .find_map(|(level, band)| {
            let (min, max) = band?;
            (min..=max).contains(&value).then_some(level)
        })
        .unwrap_or(ThresholdLevel::Unknown);

    let message = match level {
        ThresholdLevel::Critical => format!("{parameter} is at a critical level"),
        ThresholdLevel::Warning => format!("{parameter} needs attention"),
        ThresholdLevel::Normal => format!("{parameter} is within the normal range"),
        ThresholdLevel::Unknown => format!("{parameter} cannot be assessed"),
    };

    ThresholdStatus { level, message }
}

/// Upper limits for the host health card. A metric strictly above its limit
/// is reported.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthLimits {
    pub cpu_temp_c: f64,
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub disk_percent: f64,
    pub network_latency_ms: f64,
}

impl Default for HealthLimits {
    fn default() -> Self {
        Self {
            cpu_temp_c: 70.0,
            cpu_percent: 80.0,
            memory_percent: 80.0,
            disk_percent: 90.0,
            network_latency_ms: 200.0,
        }
    }
}

/// Host metric names as reported by the device.
pub mod host_metrics {
    pub const CPU_TEMP: &str = "cpu_temp";
    pub const CPU_PERCENT: &str = "cpu_percent";
    pub const MEMORY_PERCENT: &str = "memory_percent";
    pub const DISK_PERCENT: &str = "disk_percent";
    pub const NETWORK_LATENCY_MS: &str = "network_latency_ms";
}

/// One host metric over its limit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthIssue {
    pub metric: String,
    pub value: f64,
    pub limit: f64,
    pub message: String,
}

/// Check a host reading against `limits`. Metrics the reading lacks are skipped.
pub fn check_host_health(reading: &Reading, limits: &HealthLimits) -> Vec<HealthIssue> {
    use host_metrics::*;

    let checks = [
        (CPU_TEMP, limits.cpu_temp_c, "CPU running hot"),
        (CPU_PERCENT, limits.cpu_percent, "CPU usage high"),
        (MEMORY_PERCENT, limits.memory_percent, "Memory nearly full"),
        (DISK_PERCENT, limits.disk_percent, "Storage nearly full"),
        (NETWORK_LATENCY_MS, limits.network_latency_ms, "Network latency high"),
    ];

    checks
        .into_iter()
        .filter_map(|(metric, limit, message)| {
            let value = reading.value(metric)?;
            (value > limit).then(|| HealthIssue {
                metric: metric.to_string(),
                value,
                limit,
                message: message.to_string(),
            })
        })
        .collect()
}
