//! Descriptive statistics and correlation over a selected series window.
//!
//! Every statistic is computed per variable over the values present in the
//! selected rows; missing samples are dropped, never counted as zero.

use crate::series::Series;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// The fixed set of statistics a report can carry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Statistic {
    #[serde(rename = "count")]
    Count,
    #[serde(rename = "mean")]
    Mean,
    #[serde(rename = "std")]
    Std,
    #[serde(rename = "min")]
    Min,
    #[serde(rename = "25%")]
    Q25,
    #[serde(rename = "50%")]
    Median,
    #[serde(rename = "75%")]
    Q75,
    #[serde(rename = "max")]
    Max,
    #[serde(rename = "variance")]
    Variance,
    #[serde(rename = "skewness")]
    Skewness,
    #[serde(rename = "kurtosis")]
    Kurtosis,
    #[serde(rename = "cv")]
    Cv,
}

impl Statistic {
    pub const ALL: [Statistic; 12] = [
        Statistic::Count,
        Statistic::Mean,
        Statistic::Std,
        Statistic::Min,
        Statistic::Q25,
        Statistic::Median,
        Statistic::Q75,
        Statistic::Max,
        Statistic::Variance,
        Statistic::Skewness,
        Statistic::Kurtosis,
        Statistic::Cv,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Statistic::Count => "count",
            Statistic::Mean => "mean",
            Statistic::Std => "std",
            Statistic::Min => "min",
            Statistic::Q25 => "25%",
            Statistic::Median => "50%",
            Statistic::Q75 => "75%",
            Statistic::Max => "max",
            Statistic::Variance => "variance",
            Statistic::Skewness => "skewness",
            Statistic::Kurtosis => "kurtosis",
            Statistic::Cv => "cv",
        }
    }
}

impl std::fmt::Display for Statistic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Statistic {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("median") {
            return Ok(Statistic::Median);
        }
        Statistic::ALL
            .into_iter()
            .find(|stat| stat.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unknown statistic '{s}'"))
    }
}

/// All statistics for one variable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Summary {
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub q25: f64,
    pub median: f64,
    pub q75: f64,
    pub max: f64,
    pub variance: f64,
    pub skewness: f64,
    pub kurtosis: f64,
    pub cv: f64,
}

impl Summary {
    /// Summarize a set of present values.
    ///
    /// Statistics that need more samples than are available come out NaN:
    /// std/variance below 2 values, skewness below 3, kurtosis below 4.
    pub fn from_values(values: &[f64]) -> Self {
        let mean = values.iter().mean();
        let variance = values.iter().variance();
        let std = values.iter().std_dev();

        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        Self {
            count: values.len(),
            mean,
            std,
            min: Statistics::min(values.iter()),
            q25: quantile_sorted(&sorted, 0.25),
            median: quantile_sorted(&sorted, 0.5),
            q75: quantile_sorted(&sorted, 0.75),
            max: Statistics::max(values.iter()),
            variance,
            skewness: skewness(values, mean),
            kurtosis: excess_kurtosis(values, mean),
            cv: std / mean * 100.0,
        }
    }

    pub fn get(&self, statistic: Statistic) -> f64 {
        match statistic {
            Statistic::Count => self.count as f64,
            Statistic::Mean => self.mean,
            Statistic::Std => self.std,
            Statistic::Min => self.min,
            Statistic::Q25 => self.q25,
            Statistic::Median => self.median,
            Statistic::Q75 => self.q75,
            Statistic::Max => self.max,
            Statistic::Variance => self.variance,
            Statistic::Skewness => self.skewness,
            Statistic::Kurtosis => self.kurtosis,
            Statistic::Cv => self.cv,
        }
    }
}

/// Quantile of already sorted values with linear interpolation between
/// order statistics. NaN for an empty slice.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let position = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
}

/// Quantile of unsorted values.
pub fn quantile(values: &[f64], q: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    quantile_sorted(&sorted, q)
}

fn central_moment_sums(values: &[f64], mean: f64) -> (f64, f64, f64) {
    values.iter().fold((0.0, 0.0, 0.0), |(m2, m3, m4), &v| {
        let d = v - mean;
        let d2 = d * d;
        (m2 + d2, m3 + d2 * d, m4 + d2 * d2)
    })
}

/// Adjusted Fisher-Pearson sample skewness (G1).
fn skewness(values: &[f64], mean: f64) -> f64 {
    let n = values.len() as f64;
    if values.len() < 3 {
        return f64::NAN;
    }
    let (m2, m3, _) = central_moment_sums(values, mean);
    if m2 == 0.0 {
        return 0.0;
    }
    (n * (n - 1.0).sqrt() / (n - 2.0)) * (m3 / m2.powf(1.5))
}

/// Bias-corrected sample excess kurtosis (G2).
fn excess_kurtosis(values: &[f64], mean: f64) -> f64 {
    let n = values.len() as f64;
    if values.len() < 4 {
        return f64::NAN;
    }
    let (m2, _, m4) = central_moment_sums(values, mean);
    if m2 == 0.0 {
        return 0.0;
    }
    let numerator = n * (n + 1.0) * (n - 1.0) * m4;
    let denominator = (n - 2.0) * (n - 3.0) * m2 * m2;
    let adjustment = 3.0 * (n - 1.0).powi(2) / ((n - 2.0) * (n - 3.0));
    numerator / denominator - adjustment
}

/// Summary for one variable of a report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariableSummary {
    pub variable: String,
    pub summary: Summary,
}

/// Statistics for the selected variables, in the order they were requested.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatisticsReport {
    rows: Vec<VariableSummary>,
}

/// Which axis the rows of a [`ReportTable`] run along.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    /// One row per variable, one column per statistic
    VariableMajor,
    /// One row per statistic, one column per variable
    StatisticMajor,
}

/// A report laid out as a labelled grid.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportTable {
    pub row_labels: Vec<String>,
    pub column_labels: Vec<String>,
    pub cells: Vec<Vec<f64>>,
}

impl ReportTable {
    /// Swap rows and columns.
    pub fn transpose(&self) -> ReportTable {
        let cells = (0..self.column_labels.len())
            .map(|c| self.cells.iter().map(|row| row[c]).collect())
            .collect();
        ReportTable {
            row_labels: self.column_labels.clone(),
            column_labels: self.row_labels.clone(),
            cells,
        }
    }

    pub fn cell(&self, row: &str, column: &str) -> Option<f64> {
        let r = self.row_labels.iter().position(|l| l == row)?;
        let c = self.column_labels.iter().position(|l| l == column)?;
        Some(self.cells[r][c])
    }
}

impl StatisticsReport {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn variables(&self) -> Vec<&str> {
        self.rows.iter().map(|r| r.variable.as_str()).collect()
    }

    pub fn summary(&self, variable: &str) -> Option<&Summary> {
        self.rows
            .iter()
            .find(|r| r.variable == variable)
            .map(|r| &r.summary)
    }

    pub fn get(&self, variable: &str, statistic: Statistic) -> Option<f64> {
        self.summary(variable).map(|s| s.get(statistic))
    }

    /// Lay the report out with only the chosen statistics.
    pub fn table(&self, orientation: Orientation, statistics: &[Statistic]) -> ReportTable {
        let table = ReportTable {
            row_labels: self.rows.iter().map(|r| r.variable.clone()).collect(),
            column_labels: statistics.iter().map(|s| s.name().to_string()).collect(),
            cells: self
                .rows
                .iter()
                .map(|r| statistics.iter().map(|&s| r.summary.get(s)).collect())
                .collect(),
        };
        match orientation {
            Orientation::VariableMajor => table,
            Orientation::StatisticMajor => table.transpose(),
        }
    }

    /// Every statistic, one row per variable.
    pub fn by_variable(&self) -> ReportTable {
        self.table(Orientation::VariableMajor, &Statistic::ALL)
    }

    /// Every statistic, one row per statistic.
    pub fn by_statistic(&self) -> ReportTable {
        self.table(Orientation::StatisticMajor, &Statistic::ALL)
    }
}

/// Build a statistics report for `variables` over `series`.
///
/// Variables with no values in the series are skipped.
pub fn calculate_statistics(series: &Series, variables: &[&str]) -> StatisticsReport {
    let rows = variables
        .iter()
        .filter(|&&variable| {
            let present = series.has_column(variable);
            if !present {
                tracing::debug!(variable, device = series.device_id(), "skipping absent variable");
            }
            present
        })
        .map(|&variable| VariableSummary {
            variable: variable.to_string(),
            summary: Summary::from_values(&series.present_values(variable)),
        })
        .collect();

    StatisticsReport { rows }
}

/// Strength bucket for a notable correlation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationStrength {
    /// |r| above 0.8
    Strong,
    Moderate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationDirection {
    Positive,
    Negative,
}

/// A pair of variables whose correlation exceeded the cutoff.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationPair {
    pub first: String,
    pub second: String,
    pub coefficient: f64,
    pub strength: CorrelationStrength,
    pub direction: CorrelationDirection,
}

/// Cutoff used by the exploration tool for highlighting pairs.
pub const NOTABLE_CORRELATION: f64 = 0.7;

const STRONG_CORRELATION: f64 = 0.8;

/// Pairwise Pearson correlation matrix.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CorrelationMatrix {
    pub variables: Vec<String>,
    pub coefficients: Vec<Vec<f64>>,
}

impl CorrelationMatrix {
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.variables.iter().position(|v| v == a)?;
        let j = self.variables.iter().position(|v| v == b)?;
        Some(self.coefficients[i][j])
    }

    /// Upper-triangle pairs with |r| strictly above `cutoff`.
    pub fn notable_pairs(&self, cutoff: f64) -> Vec<CorrelationPair> {
        let mut pairs = Vec::new();
        for i in 0..self.variables.len() {
            for j in (i + 1)..self.variables.len() {
                let r = self.coefficients[i][j];
                if r.abs() > cutoff {
                    pairs.push(CorrelationPair {
                        first: self.variables[i].clone(),
                        second: self.variables[j].clone(),
                        coefficient: r,
                        strength: if r.abs() > STRONG_CORRELATION {
                            CorrelationStrength::Strong
                        } else {
                            CorrelationStrength::Moderate
                        },
                        direction: if r > 0.0 {
                            CorrelationDirection::Positive
                        } else {
                            CorrelationDirection::Negative
                        },
                    });
                }
            }
        }
        pairs
    }
}

/// Pearson r over rows where both variables are present.
fn pearson(xs: &[f64], ys: &[f64]) -> f64 {
    if xs.len() < 2 {
        return f64::NAN;
    }
    let covariance = xs.iter().covariance(ys.iter());
    let r = covariance / (xs.iter().std_dev() * ys.iter().std_dev());
    if r.is_finite() {
        r.clamp(-1.0, 1.0)
    } else {
        f64::NAN
    }
}

/// Correlation matrix for the variables present in `series`.
pub fn correlation_matrix(series: &Series, variables: &[&str]) -> CorrelationMatrix {
    let present: Vec<&str> = variables
        .iter()
        .copied()
        .filter(|v| series.has_column(v))
        .collect();
    let columns: Vec<Vec<Option<f64>>> = present.iter().map(|v| series.column(v)).collect();

    let coefficients = (0..present.len())
        .map(|i| {
            (0..present.len())
                .map(|j| {
                    let (xs, ys): (Vec<f64>, Vec<f64>) = columns[i]
                        .iter()
                        .zip(&columns[j])
                        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
                        .unzip();
                    let r = pearson(&xs, &ys);
                    if i == j && r.is_finite() {
                        1.0
                    } else {
                        r
                    }
                })
                .collect()
        })
        .collect();

    CorrelationMatrix {
        variables: present.iter().map(|v| v.to_string()).collect(),
        coefficients,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::Reading;
    use chrono::{Duration, TimeZone, Utc};

    fn series_of(columns: &[(&str, &[Option<f64>])]) -> Series {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let rows = columns[0].1.len();
        let readings = (0..rows).map(|i| {
            let mut reading = Reading::new("SmartFarm", start + Duration::minutes(i as i64));
            for (name, values) in columns {
                reading.set(*name, values[i]);
            }
            reading
        });
        Series::from_readings("SmartFarm", readings).unwrap()
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_basic_summary() {
        let s = Summary::from_values(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(s.count, 5);
        assert!(close(s.mean, 3.0));
        assert!(close(s.min, 1.0));
        assert!(close(s.max, 5.0));
        assert!(close(s.median, 3.0));
        assert!(close(s.q25, 2.0));
        assert!(close(s.q75, 4.0));
        assert!(close(s.variance, 2.5));
        assert!(close(s.std, 2.5f64.sqrt()));
        assert!(close(s.skewness, 0.0));
        assert!(close(s.kurtosis, -1.2));
        assert!(close(s.cv, 2.5f64.sqrt() / 3.0 * 100.0));
    }

    #[test]
    fn test_interpolated_quantiles() {
        assert!(close(quantile(&[4.0, 1.0, 3.0, 2.0], 0.25), 1.75));
        assert!(close(quantile(&[4.0, 1.0, 3.0, 2.0], 0.5), 2.5));
        assert!(quantile(&[], 0.5).is_nan());
    }

    #[test]
    fn test_skewness_sign() {
        let s = Summary::from_values(&[1.0, 2.0, 3.0, 4.0, 100.0]);
        assert!(s.skewness > 2.0);
        let flat = Summary::from_values(&[7.0, 7.0, 7.0, 7.0]);
        assert_eq!(flat.skewness, 0.0);
        assert_eq!(flat.kurtosis, 0.0);
    }

    #[test]
    fn test_small_samples_are_nan() {
        let s = Summary::from_values(&[4.0]);
        assert_eq!(s.count, 1);
        assert!(s.std.is_nan());
        assert!(s.skewness.is_nan());
        assert!(s.kurtosis.is_nan());

        let empty = Summary::from_values(&[]);
        assert_eq!(empty.count, 0);
        assert!(empty.mean.is_nan());
        assert!(empty.median.is_nan());
    }

    #[test]
    fn test_cv_with_zero_mean() {
        let s = Summary::from_values(&[-1.0, 1.0]);
        assert!(!s.cv.is_finite());
    }

    #[test]
    fn test_report_skips_absent_and_ignores_missing() {
        let series = series_of(&[
            ("temperature", &[Some(20.0), None, Some(22.0)]),
            ("humidity", &[Some(60.0), Some(70.0), Some(80.0)]),
        ]);

        let report = calculate_statistics(&series, &["temperature", "cpu_temp", "humidity"]);
        assert_eq!(report.variables(), vec!["temperature", "humidity"]);
        assert_eq!(report.get("temperature", Statistic::Count), Some(2.0));
        assert_eq!(report.get("temperature", Statistic::Mean), Some(21.0));
        assert_eq!(report.get("cpu_temp", Statistic::Mean), None);

        assert!(calculate_statistics(&series, &[]).is_empty());
    }

    #[test]
    fn test_table_orientations() {
        let series = series_of(&[
            ("a", &[Some(1.0), Some(2.0), Some(3.0)]),
            ("b", &[Some(10.0), Some(20.0), Some(30.0)]),
        ]);
        let report = calculate_statistics(&series, &["a", "b"]);

        let by_var = report.by_variable();
        assert_eq!(by_var.row_labels, vec!["a", "b"]);
        assert_eq!(by_var.column_labels.len(), Statistic::ALL.len());

        let by_stat = report.by_statistic();
        assert_eq!(by_stat.row_labels[0], "count");
        assert_eq!(by_stat.cell("mean", "b"), Some(20.0));
        // kurtosis is NaN for three samples, so compare structure and a cell
        let round_trip = by_stat.transpose();
        assert_eq!(round_trip.row_labels, by_var.row_labels);
        assert_eq!(round_trip.column_labels, by_var.column_labels);
        assert_eq!(round_trip.cell("b", "max"), Some(30.0));

        let selected = report.table(
            Orientation::StatisticMajor,
            &[Statistic::Mean, Statistic::Max],
        );
        assert_eq!(selected.row_labels, vec!["mean", "max"]);
        assert_eq!(selected.cell("max", "a"), Some(3.0));
    }

    #[test]
    fn test_statistic_parsing() {
        assert_eq!("25%".parse::<Statistic>(), Ok(Statistic::Q25));
        assert_eq!("median".parse::<Statistic>(), Ok(Statistic::Median));
        assert_eq!("CV".parse::<Statistic>(), Ok(Statistic::Cv));
        assert!("mode".parse::<Statistic>().is_err());
    }

    #[test]
    fn test_correlation_matrix() {
        let series = series_of(&[
            ("cpu_percent", &[Some(10.0), Some(20.0), Some(30.0), Some(40.0)]),
            ("cpu_temp", &[Some(40.0), Some(45.0), Some(50.0), Some(55.0)]),
            ("free", &[Some(4.0), Some(3.0), Some(2.0), None]),
        ]);

        let matrix = correlation_matrix(&series, &["cpu_percent", "cpu_temp", "free", "absent"]);
        assert_eq!(matrix.variables, vec!["cpu_percent", "cpu_temp", "free"]);
        assert_eq!(matrix.get("cpu_percent", "cpu_percent"), Some(1.0));
        assert!(close(matrix.get("cpu_percent", "cpu_temp").unwrap(), 1.0));
        assert!(close(matrix.get("cpu_percent", "free").unwrap(), -1.0));

        let pairs = matrix.notable_pairs(NOTABLE_CORRELATION);
        assert_eq!(pairs.len(), 3);
        let negative = pairs.iter().find(|p| p.second == "free").unwrap();
        assert_eq!(negative.direction, CorrelationDirection::Negative);
        assert_eq!(negative.strength, CorrelationStrength::Strong);
    }

    #[test]
    fn test_constant_column_correlation_is_nan() {
        let series = series_of(&[
            ("a", &[Some(1.0), Some(2.0), Some(3.0)]),
            ("flat", &[Some(5.0), Some(5.0), Some(5.0)]),
        ]);
        let matrix = correlation_matrix(&series, &["a", "flat"]);
        assert!(matrix.get("a", "flat").unwrap().is_nan());
        assert!(matrix.get("flat", "flat").unwrap().is_nan());
        assert!(matrix.notable_pairs(0.7).is_empty());
    }
}
