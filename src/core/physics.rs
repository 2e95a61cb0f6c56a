//! Agronomic quantities derived from air temperature and relative humidity.
//!
//! All inputs are degrees Celsius and relative humidity in percent (0-100).
//! None of these functions validate their inputs: out-of-range sensor noise
//! yields a number rather than an error so a polling pipeline never stops on a
//! bad sample.

use crate::series::{Reading, Series};
use serde::{Deserialize, Serialize};

/// Lower bound of the optimal VPD band (kPa, inclusive).
pub const VPD_OPTIMAL_MIN: f64 = 0.5;

/// Upper bound of the optimal VPD band (kPa, inclusive).
pub const VPD_OPTIMAL_MAX: f64 = 1.5;

/// Full-scale value of the 10-bit soil moisture ADC.
pub const SOIL_ADC_MAX: f64 = 1023.0;

/// Metric names the derived quantities read from.
pub const TEMPERATURE: &str = "temperature";
pub const HUMIDITY: &str = "humidity";

/// Vapor pressure deficit in kPa, or `None` when either input is missing.
pub fn try_vapor_pressure_deficit(
    temperature_c: Option<f64>,
    humidity_pct: Option<f64>,
) -> Option<f64> {
    let t = temperature_c.filter(|v| !v.is_nan())?;
    let rh = humidity_pct.filter(|v| !v.is_nan())?;

    let svp = 0.61078 * ((17.27 * t) / (t + 237.3)).exp();
    let avp = svp * (rh / 100.0);
    Some(svp - avp)
}

/// Vapor pressure deficit in kPa.
///
/// Returns `0.0` when either input is missing or NaN. Callers must read that
/// as "unknown", not as saturated air; new code should prefer
/// [`try_vapor_pressure_deficit`].
pub fn vapor_pressure_deficit(temperature_c: Option<f64>, humidity_pct: Option<f64>) -> f64 {
    try_vapor_pressure_deficit(temperature_c, humidity_pct).unwrap_or(0.0)
}

/// Three-way VPD classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VpdStatus {
    /// 0.5 to 1.5 kPa inclusive
    Optimal,
    /// Below 0.5 kPa
    TooHumid,
    /// Above 1.5 kPa
    TooDry,
}

impl VpdStatus {
    pub fn label(&self) -> &'static str {
        match self {
            VpdStatus::Optimal => "optimal",
            VpdStatus::TooHumid => "too humid",
            VpdStatus::TooDry => "too dry",
        }
    }

    /// Severity color used by the dashboard cards.
    pub fn color(&self) -> &'static str {
        match self {
            VpdStatus::Optimal => "green",
            VpdStatus::TooHumid => "orange",
            VpdStatus::TooDry => "red",
        }
    }

    pub fn is_warning(&self) -> bool {
        !matches!(self, VpdStatus::Optimal)
    }
}

impl std::fmt::Display for VpdStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Classify a VPD value. NaN falls into `TooDry`, matching the plain
/// comparison chain.
pub fn vpd_status(vpd: f64) -> VpdStatus {
    if (VPD_OPTIMAL_MIN..=VPD_OPTIMAL_MAX).contains(&vpd) {
        VpdStatus::Optimal
    } else if vpd < VPD_OPTIMAL_MIN {
        VpdStatus::TooHumid
    } else {
        VpdStatus::TooDry
    }
}

/// Dew point in degrees Celsius (Magnus approximation).
///
/// Humidity at or below zero puts the logarithm out of its domain and the
/// result is non-finite. Callers filter such samples upstream.
pub fn dew_point(temperature_c: f64, humidity_pct: f64) -> f64 {
    const A: f64 = 17.27;
    const B: f64 = 237.7;

    let alpha = (A * temperature_c) / (B + temperature_c) + (humidity_pct / 100.0).ln();
    (B * alpha) / (A - alpha)
}

/// Heat index in degrees Celsius using the NOAA Rothfusz regression.
///
/// The regression was fitted for roughly T >= 27 °C and RH >= 40 %. Outside
/// that envelope the value is still returned but should not be trusted.
pub fn heat_index(temperature_c: f64, humidity_pct: f64) -> f64 {
    let t = temperature_c * 9.0 / 5.0 + 32.0;
    let rh = humidity_pct;

    let hi = -42.379 + 2.04901523 * t + 10.14333127 * rh
        - 0.22475541 * t * rh
        - 0.00683783 * t * t
        - 0.05481717 * rh * rh
        + 0.00122874 * t * t * rh
        + 0.00085282 * t * rh * rh
        - 0.00000199 * t * t * rh * rh;

    (hi - 32.0) * 5.0 / 9.0
}

/// Raw soil ADC count as a percentage of full scale.
pub fn soil_moisture_percent(raw: f64) -> f64 {
    raw / SOIL_ADC_MAX * 100.0
}

/// Engine-computed per-reading quantities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DerivedMetric {
    Vpd,
    DewPoint,
    HeatIndex,
}

impl DerivedMetric {
    pub const ALL: [DerivedMetric; 3] = [
        DerivedMetric::Vpd,
        DerivedMetric::DewPoint,
        DerivedMetric::HeatIndex,
    ];

    /// Column name the metric is attached under.
    pub fn name(&self) -> &'static str {
        match self {
            DerivedMetric::Vpd => "vpd",
            DerivedMetric::DewPoint => "dew_point",
            DerivedMetric::HeatIndex => "heat_index",
        }
    }

    /// Compute for one reading. `None` when temperature or humidity is missing.
    pub fn compute(&self, reading: &Reading) -> Option<f64> {
        let t = reading.value(TEMPERATURE)?;
        let rh = reading.value(HUMIDITY)?;
        Some(match self {
            DerivedMetric::Vpd => vapor_pressure_deficit(Some(t), Some(rh)),
            DerivedMetric::DewPoint => dew_point(t, rh),
            DerivedMetric::HeatIndex => heat_index(t, rh),
        })
    }
}

impl std::str::FromStr for DerivedMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DerivedMetric::ALL
            .into_iter()
            .find(|m| m.name() == s.trim())
            .ok_or_else(|| format!("Unknown derived metric '{s}'"))
    }
}

/// Copy of `series` with the requested derived columns attached.
///
/// Non-finite results (dew point at 0 % humidity) are stored as missing.
pub fn with_derived_metrics(series: &Series, metrics: &[DerivedMetric]) -> Series {
    let mut out = series.clone();
    for metric in metrics {
        let values: Vec<Option<f64>> = series
            .readings()
            .iter()
            .map(|r| metric.compute(r))
            .collect();
        out.set_column(metric.name(), values);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_vpd_non_negative_and_zero_at_saturation() {
        for t in (-20..=60).step_by(5) {
            for h in (0..=100).step_by(10) {
                let vpd = vapor_pressure_deficit(Some(t as f64), Some(h as f64));
                assert!(vpd >= 0.0, "negative VPD at T={t} H={h}: {vpd}");
            }
            assert_eq!(vapor_pressure_deficit(Some(t as f64), Some(100.0)), 0.0);
        }
    }

    #[test]
    fn test_vpd_known_value() {
        // 25 °C at 50 % RH: SVP ~3.168 kPa, VPD ~1.584 kPa
        let vpd = vapor_pressure_deficit(Some(25.0), Some(50.0));
        assert!((vpd - 1.584).abs() < 0.01, "got {vpd}");
    }

    #[test]
    fn test_vpd_missing_inputs() {
        assert_eq!(vapor_pressure_deficit(None, Some(50.0)), 0.0);
        assert_eq!(vapor_pressure_deficit(Some(25.0), None), 0.0);
        assert_eq!(vapor_pressure_deficit(Some(f64::NAN), Some(50.0)), 0.0);
        assert_eq!(try_vapor_pressure_deficit(None, Some(50.0)), None);
        assert!(try_vapor_pressure_deficit(Some(25.0), Some(50.0)).is_some());
    }

    #[test]
    fn test_vpd_out_of_range_humidity_still_numeric() {
        let vpd = vapor_pressure_deficit(Some(25.0), Some(120.0));
        assert!(vpd.is_finite());
        assert!(vpd < 0.0);
    }

    #[test]
    fn test_vpd_status_boundaries() {
        assert_eq!(vpd_status(0.5), VpdStatus::Optimal);
        assert_eq!(vpd_status(1.5), VpdStatus::Optimal);
        assert_eq!(vpd_status(0.49), VpdStatus::TooHumid);
        assert_eq!(vpd_status(1.51), VpdStatus::TooDry);
        assert_eq!(vpd_status(0.49).color(), "orange");
        assert_eq!(vpd_status(1.51).color(), "red");
        assert!(!vpd_status(1.0).is_warning());
    }

    #[test]
    fn test_dew_point() {
        // At saturation the dew point equals the air temperature
        assert!((dew_point(20.0, 100.0) - 20.0).abs() < 1e-9);
        // 25 °C at 60 % RH is roughly 16.7 °C
        assert!((dew_point(25.0, 60.0) - 16.7).abs() < 0.2);
        assert!(!dew_point(25.0, 0.0).is_finite());
        assert!(dew_point(25.0, -5.0).is_nan());
    }

    #[test]
    fn test_heat_index() {
        // 32 °C at 70 % RH is roughly 40.5 °C on the NOAA chart
        let hi = heat_index(32.0, 70.0);
        assert!((hi - 40.5).abs() < 1.0, "got {hi}");
    }

    #[test]
    fn test_soil_percent() {
        assert_eq!(soil_moisture_percent(0.0), 0.0);
        assert!((soil_moisture_percent(1023.0) - 100.0).abs() < 1e-12);
    }

    #[test]
    fn test_with_derived_metrics() {
        let now = Utc::now();
        let series = Series::from_readings(
            "SmartFarm",
            vec![
                Reading::new("SmartFarm", now)
                    .with_metric(TEMPERATURE, 25.0)
                    .with_metric(HUMIDITY, 50.0),
                Reading::new("SmartFarm", now).with_metric(TEMPERATURE, 25.0),
                Reading::new("SmartFarm", now)
                    .with_metric(TEMPERATURE, 25.0)
                    .with_metric(HUMIDITY, 0.0),
            ],
        )
        .unwrap();

        let derived = with_derived_metrics(&series, &DerivedMetric::ALL);
        let vpd = derived.column("vpd");
        assert!(vpd[0].is_some());
        assert_eq!(vpd[1], None);
        assert_eq!(derived.column("dew_point")[2], None);
        assert!(derived.column("heat_index")[0].is_some());
        // source series untouched
        assert!(!series.has_column("vpd"));
    }
}
