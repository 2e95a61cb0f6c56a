//! Summary-card snapshots for the real-time dashboard.
//!
//! A snapshot condenses the polled farm and host series into the values the
//! status cards show: the latest reading, how far it sits from the window
//! mean, VPD status, soil channels and host health.

use crate::core::physics::{
    soil_moisture_percent, try_vapor_pressure_deficit, vpd_status, VpdStatus, HUMIDITY,
    TEMPERATURE,
};
use crate::core::thresholds::{check_host_health, host_metrics, HealthIssue, HealthLimits};
use crate::series::{to_local, Series};
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use statrs::statistics::Statistics;
use uuid::Uuid;

/// The current snapshot format version.
pub const SNAPSHOT_VERSION: &str = "1.0";

/// The name of this producer.
pub const PRODUCER_NAME: &str = "smartfarm-telemetry";

/// Width of the "recent trend" window behind the cards.
pub const RECENT_WINDOW_HOURS: i64 = 3;

/// Air temperature above which the temperature card is highlighted.
pub const HOT_TEMPERATURE_C: f64 = 35.0;

/// Soil moisture ADC channels on the farm controller.
pub const SOIL_CHANNELS: [&str; 4] = ["soil_raw_1", "soil_raw_2", "soil_raw_3", "soil_raw_4"];

/// Snapshot producer metadata
#[derive(Debug, Clone, Serialize)]
pub struct Producer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// Latest value of a metric and its distance from the window mean.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricCard {
    pub value: Option<f64>,
    pub delta_from_mean: Option<f64>,
}

impl MetricCard {
    fn from_series(series: &Series, latest: Option<f64>, metric: &str) -> Self {
        let present = series.present_values(metric);
        let delta_from_mean = match latest {
            Some(value) if !present.is_empty() => Some(value - present.iter().mean()),
            _ => None,
        };
        Self {
            value: latest,
            delta_from_mean,
        }
    }
}

/// One soil moisture channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SoilChannel {
    pub channel: String,
    pub raw: Option<f64>,
    pub percent: Option<f64>,
}

/// Farm status card values.
#[derive(Debug, Clone, Serialize)]
pub struct FarmSummary {
    pub device_id: String,
    /// Timestamp of the latest reading in the configured zone (RFC3339)
    pub latest_local: String,
    pub temperature: MetricCard,
    pub temperature_alert: bool,
    pub humidity: MetricCard,
    /// kPa, absent when temperature or humidity is missing
    pub vpd: Option<f64>,
    pub vpd_status: Option<VpdStatus>,
    pub soil: Vec<SoilChannel>,
    /// Rows in the trailing recent window
    pub recent_rows: usize,
}

/// Host status card values.
#[derive(Debug, Clone, Serialize)]
pub struct HostSummary {
    pub device_id: String,
    pub latest_local: String,
    pub cpu_temp: Option<f64>,
    pub cpu_percent: Option<f64>,
    pub memory_percent: Option<f64>,
    pub disk_percent: Option<f64>,
    pub network_latency_ms: Option<f64>,
    pub issues: Vec<HealthIssue>,
    pub recent_rows: usize,
}

impl HostSummary {
    pub fn is_healthy(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Everything the status page needs for one refresh.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardSnapshot {
    pub snapshot_version: String,
    pub snapshot_id: String,
    pub producer: Producer,
    pub computed_at_utc: DateTime<Utc>,
    pub time_zone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub farm: Option<FarmSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<HostSummary>,
}

/// Builder for dashboard snapshots.
pub struct SummaryBuilder {
    instance_id: Uuid,
    tz: Tz,
    limits: HealthLimits,
}

impl SummaryBuilder {
    /// Create a builder with a unique instance ID and default health limits.
    pub fn new(tz: Tz) -> Self {
        Self {
            instance_id: Uuid::new_v4(),
            tz,
            limits: HealthLimits::default(),
        }
    }

    pub fn with_health_limits(mut self, limits: HealthLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    /// Build a snapshot as of now.
    pub fn build(&self, farm: &Series, host: &Series) -> DashboardSnapshot {
        self.build_at(farm, host, Utc::now())
    }

    /// Build a snapshot with the recent window ending at `now`.
    pub fn build_at(&self, farm: &Series, host: &Series, now: DateTime<Utc>) -> DashboardSnapshot {
        let recent_since = now - Duration::hours(RECENT_WINDOW_HOURS);

        DashboardSnapshot {
            snapshot_version: SNAPSHOT_VERSION.to_string(),
            snapshot_id: Uuid::new_v4().to_string(),
            producer: Producer {
                name: PRODUCER_NAME.to_string(),
                version: crate::VERSION.to_string(),
                instance_id: self.instance_id.to_string(),
            },
            computed_at_utc: now,
            time_zone: self.tz.name().to_string(),
            farm: self.farm_summary(farm, recent_since),
            host: self.host_summary(host, recent_since),
        }
    }

    /// Farm card values, or `None` for an empty series.
    pub fn farm_summary(&self, series: &Series, recent_since: DateTime<Utc>) -> Option<FarmSummary> {
        let latest = series.latest()?;

        let temperature = latest.value(TEMPERATURE);
        let humidity = latest.value(HUMIDITY);
        let vpd = try_vapor_pressure_deficit(temperature, humidity);

        let soil = SOIL_CHANNELS
            .iter()
            .map(|&channel| {
                let raw = latest.value(channel);
                SoilChannel {
                    channel: channel.to_string(),
                    raw,
                    percent: raw.map(soil_moisture_percent),
                }
            })
            .collect();

        Some(FarmSummary {
            device_id: series.device_id().to_string(),
            latest_local: to_local(latest.timestamp, self.tz).to_rfc3339(),
            temperature: MetricCard::from_series(series, temperature, TEMPERATURE),
            temperature_alert: temperature.map_or(false, |t| t > HOT_TEMPERATURE_C),
            humidity: MetricCard::from_series(series, humidity, HUMIDITY),
            vpd,
            vpd_status: vpd.map(vpd_status),
            soil,
            recent_rows: series.since(recent_since).len(),
        })
    }

    /// Host card values, or `None` for an empty series.
    pub fn host_summary(&self, series: &Series, recent_since: DateTime<Utc>) -> Option<HostSummary> {
        let latest = series.latest()?;

        Some(HostSummary {
            device_id: series.device_id().to_string(),
            latest_local: to_local(latest.timestamp, self.tz).to_rfc3339(),
            cpu_temp: latest.value(host_metrics::CPU_TEMP),
            cpu_percent: latest.value(host_metrics::CPU_PERCENT),
            memory_percent: latest.value(host_metrics::MEMORY_PERCENT),
            disk_percent: latest.value(host_metrics::DISK_PERCENT),
            network_latency_ms: latest.value(host_metrics::NETWORK_LATENCY_MS),
            issues: check_host_health(latest, &self.limits),
            recent_rows: series.since(recent_since).len(),
        })
    }
}
