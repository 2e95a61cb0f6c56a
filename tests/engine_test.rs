//! Integration tests for the metrics engine through the public API

use chrono::{DateTime, Duration, TimeZone, Utc};
use smartfarm_telemetry::core::{
    calculate_statistics, correlation_matrix, create_time_bins, detect_anomalies,
    moving_averages, rate_of_change, resample, vapor_pressure_deficit, vpd_status,
    with_derived_metrics, AggregationFn, AggregationInterval, AnomalyMethod, DerivedMetric,
    Orientation, Statistic, ThresholdLevel, ThresholdSet, VpdStatus,
};
use smartfarm_telemetry::core::thresholds::classify_against_thresholds;
use smartfarm_telemetry::series::{Reading, Series, DEFAULT_TIME_ZONE};

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()
}

fn series_of(variable: &str, values: &[f64]) -> Series {
    Series::from_readings(
        "SmartFarm",
        values.iter().enumerate().map(|(i, &v)| {
            Reading::new("SmartFarm", start() + Duration::minutes(i as i64)).with_metric(variable, v)
        }),
    )
    .unwrap()
}

fn greenhouse_day() -> Series {
    Series::from_readings(
        "SmartFarm",
        (0..48).map(|i| {
            let hour = i as f64 / 2.0;
            let temperature = 22.0 + 8.0 * ((hour - 8.0) / 24.0 * std::f64::consts::TAU).sin();
            let humidity = 95.0 - 2.0 * temperature;
            Reading::new("SmartFarm", start() + Duration::minutes(30 * i))
                .with_metric("temperature", temperature)
                .with_metric("humidity", humidity)
                .with_metric("soil_raw_1", 600.0 - i as f64)
        }),
    )
    .unwrap()
}

#[test]
fn test_vpd_properties() {
    for t in -20..=60 {
        for h in 0..=100 {
            let vpd = vapor_pressure_deficit(Some(t as f64), Some(h as f64));
            assert!(vpd >= 0.0);
        }
        assert_eq!(vapor_pressure_deficit(Some(t as f64), Some(100.0)), 0.0);
    }
    assert_eq!(vapor_pressure_deficit(None, Some(60.0)), 0.0);
    assert_eq!(vapor_pressure_deficit(Some(25.0), None), 0.0);
}

#[test]
fn test_vpd_status_boundaries() {
    assert_eq!(vpd_status(0.5), VpdStatus::Optimal);
    assert_eq!(vpd_status(1.5), VpdStatus::Optimal);
    assert_eq!(vpd_status(0.49), VpdStatus::TooHumid);
    assert_eq!(vpd_status(1.51), VpdStatus::TooDry);
}

#[test]
fn test_moving_average_window_one_is_identity() {
    let series = greenhouse_day();
    let out = moving_averages(&series, "temperature", &[1]);
    assert_eq!(out.column("temperature_ma1"), series.column("temperature"));
}

#[test]
fn test_statistics_on_one_to_five() {
    let series = series_of("x", &[1.0, 2.0, 3.0, 4.0, 5.0]);
    let report = calculate_statistics(&series, &["x", "not_there"]);

    assert_eq!(report.variables(), vec!["x"]);
    assert_eq!(report.get("x", Statistic::Count), Some(5.0));
    assert_eq!(report.get("x", Statistic::Mean), Some(3.0));
    assert_eq!(report.get("x", Statistic::Min), Some(1.0));
    assert_eq!(report.get("x", Statistic::Max), Some(5.0));
    assert_eq!(report.get("x", Statistic::Median), Some(3.0));
    assert_eq!(report.get("x", Statistic::Q25), Some(2.0));

    let by_stat = report.table(Orientation::StatisticMajor, &[Statistic::Mean, Statistic::Max]);
    assert_eq!(by_stat.row_labels, vec!["mean", "max"]);
    assert_eq!(by_stat.cell("max", "x"), Some(5.0));
}

#[test]
fn test_empty_variable_list_gives_empty_report() {
    let series = greenhouse_day();
    assert!(calculate_statistics(&series, &[]).is_empty());
    assert!(calculate_statistics(&Series::new("SmartFarm"), &["temperature"]).is_empty());
}

#[test]
fn test_iqr_flags_only_hundred() {
    let series = series_of("x", &[1.0, 2.0, 3.0, 4.0, 100.0]);
    let flags = detect_anomalies(&series, "x", AnomalyMethod::parse_or_default("iqr"), 1.5);
    assert_eq!(flags.flags(), &[false, false, false, false, true]);

    let fallback = detect_anomalies(&series, "x", AnomalyMethod::parse_or_default("bogus"), 1.5);
    assert_eq!(fallback, flags);
}

#[test]
fn test_rate_of_change_example() {
    let series = series_of("x", &[10.0, 20.0, 15.0]);
    let roc = rate_of_change(&series, "x", 1);
    assert!(roc[0].is_nan());
    assert_eq!(&roc[1..], &[100.0, -25.0]);
}

#[test]
fn test_threshold_only_normal_band() {
    let set = ThresholdSet {
        normal: Some((0.0, 10.0)),
        ..ThresholdSet::default()
    };
    assert_eq!(
        classify_against_thresholds(5.0, &set, "x").level,
        ThresholdLevel::Normal
    );
    assert_eq!(
        classify_against_thresholds(20.0, &set, "x").level,
        ThresholdLevel::Unknown
    );
}

#[test]
fn test_engine_is_idempotent() {
    let series = greenhouse_day();
    let variables = ["temperature", "humidity", "soil_raw_1"];

    // NaN entries (e.g. kurtosis of tiny samples) would break PartialEq, so
    // compare the serialized form.
    let stats = |s: &Series| serde_json::to_string(&calculate_statistics(s, &variables)).unwrap();
    assert_eq!(stats(&series), stats(&series));

    assert_eq!(
        detect_anomalies(&series, "temperature", AnomalyMethod::Zscore, 1.0),
        detect_anomalies(&series, "temperature", AnomalyMethod::Zscore, 1.0)
    );
    assert_eq!(
        moving_averages(&series, "humidity", &[3, 5]),
        moving_averages(&series, "humidity", &[3, 5])
    );

    let roc_a = rate_of_change(&series, "soil_raw_1", 2);
    let roc_b = rate_of_change(&series, "soil_raw_1", 2);
    assert_eq!(roc_a.len(), roc_b.len());
    assert!(roc_a
        .iter()
        .zip(&roc_b)
        .all(|(a, b)| a.to_bits() == b.to_bits()));

    assert_eq!(
        create_time_bins(&series, DEFAULT_TIME_ZONE),
        create_time_bins(&series, DEFAULT_TIME_ZONE)
    );
    assert_eq!(
        with_derived_metrics(&series, &DerivedMetric::ALL),
        with_derived_metrics(&series, &DerivedMetric::ALL)
    );
    assert_eq!(
        resample(&series, AggregationInterval::OneHour, AggregationFn::Mean, DEFAULT_TIME_ZONE),
        resample(&series, AggregationInterval::OneHour, AggregationFn::Mean, DEFAULT_TIME_ZONE)
    );
}

#[test]
fn test_correlated_greenhouse_variables() {
    let series = greenhouse_day();
    let matrix = correlation_matrix(&series, &["temperature", "humidity"]);

    let r = matrix.get("temperature", "humidity").unwrap();
    assert!((r + 1.0).abs() < 1e-9, "humidity is a linear function of temperature, got {r}");

    let pairs = matrix.notable_pairs(0.7);
    assert_eq!(pairs.len(), 1);
}

#[test]
fn test_hourly_resample_halves_rows() {
    let series = greenhouse_day();
    let hourly = resample(
        &series,
        AggregationInterval::OneHour,
        AggregationFn::Mean,
        DEFAULT_TIME_ZONE,
    );
    assert_eq!(hourly.len(), 24);
    assert_eq!(hourly.present_values("soil_raw_1")[0], 599.5);
}
