//! Configuration for the dashboard process.
//!
//! The engine in [`crate::core`] takes no configuration; everything here is
//! consumed by the CLI and the poller when they call into it.

use crate::core::anomaly::{AnomalyMethod, DEFAULT_IQR_THRESHOLD};
use crate::core::thresholds::HealthLimits;
use crate::core::trend::DEFAULT_MOVING_AVERAGE_WINDOWS;
use crate::series::DEFAULT_TIME_ZONE;
use crate::source::SourceConfig;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Time between dashboard refreshes
    #[serde(with = "duration_serde")]
    pub refresh_interval: Duration,

    /// Days of history fetched on each refresh
    pub lookback_days: u32,

    /// IANA zone used for local timestamps and calendar bins
    pub timezone: String,

    /// Directory holding the exported telemetry collections
    pub data_dir: PathBuf,

    /// Path for exporting dashboard snapshots
    pub export_path: PathBuf,

    /// Greenhouse controller feed
    pub farm: DeviceSource,

    /// Edge host health feed
    pub host: DeviceSource,

    pub analysis: AnalysisDefaults,

    pub health: HealthLimits,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("smartfarm-telemetry");

        Self {
            refresh_interval: Duration::from_secs(5),
            lookback_days: 1,
            timezone: DEFAULT_TIME_ZONE.name().to_string(),
            data_dir: data_dir.join("data"),
            export_path: data_dir.join("exports"),
            farm: DeviceSource {
                collection: "telemetry_data_clean".to_string(),
                device: "SmartFarm".to_string(),
            },
            host: DeviceSource {
                collection: "raspberry_pi_telemetry_clean".to_string(),
                device: "raspberry_pi_status".to_string(),
            },
            analysis: AnalysisDefaults::default(),
            health: HealthLimits::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, falling back to defaults when it is absent.
    pub fn load_from(path: &std::path::Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content =
                std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
            let config: Config = serde_json::from_str(&content)
                .map_err(|e| ConfigError::ParseError(e.to_string()))?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("smartfarm-telemetry")
            .join("config.json")
    }

    /// Path of the persisted activity counters.
    pub fn activity_path(&self) -> PathBuf {
        self.export_path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
            .join("activity.json")
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.export_path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        std::fs::create_dir_all(&self.data_dir)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Ok(())
    }

    /// Check settings serde cannot reject on its own.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.refresh_interval.is_zero() {
            return Err(ConfigError::InvalidRefreshInterval);
        }
        self.time_zone()?;
        Ok(())
    }

    /// The configured zone.
    pub fn time_zone(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| ConfigError::InvalidTimeZone(self.timezone.clone()))
    }

    /// Lookback as a chrono duration.
    pub fn lookback(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.lookback_days))
    }

    /// File source settings for a device feed.
    pub fn source_for(&self, device: &DeviceSource) -> SourceConfig {
        SourceConfig {
            data_dir: self.data_dir.clone(),
            collection: device.collection.clone(),
        }
    }
}

/// Which collection a device's readings live in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceSource {
    pub collection: String,
    pub device: String,
}

/// Per-call parameters the CLI passes into the engine unless overridden.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisDefaults {
    pub anomaly_method: AnomalyMethod,
    pub anomaly_threshold: f64,
    pub moving_average_windows: Vec<usize>,
    pub rate_of_change_period: usize,
}

impl Default for AnalysisDefaults {
    fn default() -> Self {
        Self {
            anomaly_method: AnomalyMethod::default(),
            anomaly_threshold: DEFAULT_IQR_THRESHOLD,
            moving_average_windows: DEFAULT_MOVING_AVERAGE_WINDOWS.to_vec(),
            rate_of_change_period: 1,
        }
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
    InvalidTimeZone(String),
    InvalidRefreshInterval,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
            ConfigError::InvalidTimeZone(tz) => write!(f, "Unknown time zone '{tz}'"),
            ConfigError::InvalidRefreshInterval => {
                write!(f, "refresh_interval must be at least one second")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Serde support for Duration.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.refresh_interval, Duration::from_secs(5));
        assert_eq!(config.lookback_days, 1);
        assert_eq!(config.time_zone().unwrap(), chrono_tz::Asia::Bangkok);
        assert_eq!(config.farm.device, "SmartFarm");
        assert_eq!(config.host.collection, "raspberry_pi_telemetry_clean");
        assert_eq!(config.analysis.moving_average_windows, vec![5, 10, 20]);
        assert_eq!(config.analysis.anomaly_method, AnomalyMethod::Iqr);
        assert_eq!(config.health.disk_percent, 90.0);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"refresh_interval": 30, "analysis": {"anomaly_method": "zscore"}}"#)
                .unwrap();
        assert_eq!(config.refresh_interval, Duration::from_secs(30));
        assert_eq!(config.analysis.anomaly_method, AnomalyMethod::Zscore);
        assert_eq!(config.analysis.anomaly_threshold, 1.5);
        assert_eq!(config.timezone, "Asia/Bangkok");
    }

    #[test]
    fn test_unknown_anomaly_method_falls_back_to_iqr() {
        let config: Config =
            serde_json::from_str(r#"{"analysis": {"anomaly_method": "isolation_forest"}}"#)
                .unwrap();
        assert_eq!(config.analysis.anomaly_method, AnomalyMethod::Iqr);

        let config: Config =
            serde_json::from_str(r#"{"analysis": {"anomaly_method": "Z_Score"}}"#).unwrap();
        assert_eq!(config.analysis.anomaly_method, AnomalyMethod::Zscore);
        assert_eq!(
            serde_json::to_string(&config.analysis.anomaly_method).unwrap(),
            r#""zscore""#
        );
    }

    #[test]
    fn test_zero_refresh_interval_is_rejected() {
        let path = std::env::temp_dir()
            .join(format!("smartfarm-config-{}", uuid::Uuid::new_v4()))
            .join("config.json");
        let config = Config {
            refresh_interval: Duration::ZERO,
            ..Config::default()
        };
        config.save_to(&path).unwrap();

        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::InvalidRefreshInterval)
        ));

        if let Some(dir) = path.parent() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }

    #[test]
    fn test_invalid_time_zone() {
        let config = Config {
            timezone: "Mars/Olympus_Mons".to_string(),
            ..Config::default()
        };
        assert!(matches!(
            config.time_zone(),
            Err(ConfigError::InvalidTimeZone(_))
        ));
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir()
            .join(format!("smartfarm-config-{}", uuid::Uuid::new_v4()))
            .join("config.json");

        let config = Config {
            lookback_days: 7,
            ..Config::default()
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.lookback_days, 7);
        assert_eq!(loaded.lookback(), chrono::Duration::days(7));

        if let Some(dir) = path.parent() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }
}
