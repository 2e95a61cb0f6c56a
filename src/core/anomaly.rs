//! Per-row outlier flags for a single variable.

use crate::core::statistics::quantile;
use crate::series::Series;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// Default fence multiplier for the IQR method.
pub const DEFAULT_IQR_THRESHOLD: f64 = 1.5;

/// Outlier classification method.
///
/// Deserializes leniently: unknown names become [`AnomalyMethod::Iqr`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum AnomalyMethod {
    /// Tukey fences around the interquartile range
    #[default]
    Iqr,
    /// Distance from the mean in sample standard deviations
    Zscore,
}

impl From<String> for AnomalyMethod {
    fn from(name: String) -> Self {
        AnomalyMethod::parse_or_default(&name)
    }
}

impl AnomalyMethod {
    /// Parse a method name, falling back to IQR for anything unrecognized.
    pub fn parse_or_default(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "iqr" => AnomalyMethod::Iqr,
            "zscore" | "z_score" | "z-score" => AnomalyMethod::Zscore,
            other => {
                tracing::debug!(method = other, "unrecognized anomaly method, using iqr");
                AnomalyMethod::Iqr
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AnomalyMethod::Iqr => "iqr",
            AnomalyMethod::Zscore => "zscore",
        }
    }
}

impl std::fmt::Display for AnomalyMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One flag per row of the analysed series, in row order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AnomalyFlags {
    flags: Vec<bool>,
}

impl AnomalyFlags {
    pub fn flags(&self) -> &[bool] {
        &self.flags
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    /// Number of flagged rows.
    pub fn count(&self) -> usize {
        self.flags.iter().filter(|&&f| f).count()
    }

    /// Row indices that were flagged.
    pub fn indices(&self) -> Vec<usize> {
        self.flags
            .iter()
            .enumerate()
            .filter_map(|(i, &f)| f.then_some(i))
            .collect()
    }
}

/// Flag outliers in `variable`.
///
/// Rows without a value are never flagged. A variable the series does not
/// carry yields empty flags.
pub fn detect_anomalies(
    series: &Series,
    variable: &str,
    method: AnomalyMethod,
    threshold: f64,
) -> AnomalyFlags {
    if !series.has_column(variable) {
        tracing::debug!(variable, device = series.device_id(), "no values to check");
        return AnomalyFlags::default();
    }

    let column = series.column(variable);
    let present = series.present_values(variable);

    let is_outlier: Box<dyn Fn(f64) -> bool> = match method {
        AnomalyMethod::Iqr => {
            let q1 = quantile(&present, 0.25);
            let q3 = quantile(&present, 0.75);
            let iqr = q3 - q1;
            let lower = q1 - threshold * iqr;
            let upper = q3 + threshold * iqr;
            Box::new(move |v| v < lower || v > upper)
        }
        AnomalyMethod::Zscore => {
            let mean = present.iter().mean();
            let std = present.iter().std_dev();
            Box::new(move |v| ((v - mean) / std).abs() > threshold)
        }
    };

    AnomalyFlags {
        flags: column
            .into_iter()
            .map(|v| v.map_or(false, |x| is_outlier(x)))
            .collect(),
    }
}
