//! Demonstration of the SmartFarm telemetry engine.
//!
//! This example shows how to:
//! 1. Fill an in-memory source with a day of synthetic readings
//! 2. Poll it in the background like the dashboard does
//! 3. Build the status-card snapshot
//! 4. Run statistics, anomaly detection and trend analysis on the series
//!
//! Run with: cargo run --example dashboard_demo

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use smartfarm_telemetry::{
    activity::ActivityLog,
    core::{
        calculate_statistics, detect_anomalies, moving_averages, rate_of_change, resample,
        with_derived_metrics, AggregationFn, AggregationInterval, AnomalyMethod, DerivedMetric,
        Statistic, SummaryBuilder, DEFAULT_IQR_THRESHOLD,
    },
    series::{Reading, Series, DEFAULT_TIME_ZONE},
    source::{MemorySource, PollEvent, PollTarget, Poller, PollerConfig},
};

fn synthetic_readings() -> Vec<Reading> {
    let now = Utc::now();
    let mut readings = Vec::new();

    for i in 0..288 {
        let ts = now - chrono::Duration::minutes(5 * (288 - i));
        let phase = i as f64 / 288.0 * std::f64::consts::TAU;

        let mut farm = Reading::new("SmartFarm", ts)
            .with_metric("temperature", 26.0 + 6.0 * phase.sin())
            .with_metric("humidity", 70.0 - 15.0 * phase.sin());
        for channel in 1..=4 {
            farm.set(
                format!("soil_raw_{channel}"),
                Some(400.0 + 40.0 * channel as f64 - i as f64 * 0.3),
            );
        }
        // A sensor glitch the anomaly check should catch
        if i == 200 {
            farm.set("temperature", Some(85.0));
        }
        readings.push(farm);

        readings.push(
            Reading::new("raspberry_pi_status", ts)
                .with_metric("cpu_temp", 55.0 + 10.0 * phase.cos())
                .with_metric("cpu_percent", 35.0 + (i % 7) as f64 * 5.0)
                .with_metric("memory_percent", 62.0)
                .with_metric("disk_percent", 47.0)
                .with_metric("network_latency_ms", 40.0 + (i % 11) as f64),
        );
    }

    readings
}

fn main() {
    println!("SmartFarm Telemetry - Dashboard Demo");
    println!("====================================");
    println!();

    let source = Arc::new(MemorySource::with_readings(synthetic_readings()));
    let activity = ActivityLog::new();

    let mut poller = Poller::new(
        source,
        vec![
            PollTarget::new("farm", "SmartFarm"),
            PollTarget::new("host", "raspberry_pi_status"),
        ],
        PollerConfig {
            interval: Duration::from_secs(1),
            ..PollerConfig::default()
        },
    );

    if let Err(e) = poller.start() {
        eprintln!("Error starting poller: {e}");
        return;
    }

    let mut farm = Series::new("SmartFarm");
    let mut host = Series::new("raspberry_pi_status");
    for _ in 0..2 {
        match poller.receiver().recv_timeout(Duration::from_secs(5)) {
            Ok(PollEvent::Fetched { label, series }) => {
                activity.record_readings(series.len() as u64);
                println!("Fetched {} rows for {label}", series.len());
                if label == "farm" {
                    farm = series;
                } else {
                    host = series;
                }
            }
            Ok(PollEvent::Failed { label, error }) => {
                activity.record_fetch_failure();
                eprintln!("Fetch failed for {label}: {error}");
            }
            Err(e) => {
                eprintln!("No poll result: {e}");
                break;
            }
        }
    }
    activity.record_poll();
    poller.stop();
    println!();

    // Status cards
    let snapshot = SummaryBuilder::new(DEFAULT_TIME_ZONE).build(&farm, &host);
    match serde_json::to_string_pretty(&snapshot) {
        Ok(json) => println!("Snapshot:\n{json}"),
        Err(e) => eprintln!("Error serializing snapshot: {e}"),
    }
    println!();

    // Exploration
    let enriched = with_derived_metrics(&farm, &DerivedMetric::ALL);
    let report = calculate_statistics(&enriched, &["temperature", "humidity", "vpd"]);
    for variable in report.variables() {
        println!(
            "{variable:>12}: mean {:.2}, std {:.2}, median {:.2}",
            report.get(variable, Statistic::Mean).unwrap_or(f64::NAN),
            report.get(variable, Statistic::Std).unwrap_or(f64::NAN),
            report.get(variable, Statistic::Median).unwrap_or(f64::NAN),
        );
    }
    println!();

    let flags = detect_anomalies(
        &farm,
        "temperature",
        AnomalyMethod::Iqr,
        DEFAULT_IQR_THRESHOLD,
    );
    println!("Temperature anomalies at rows {:?}", flags.indices());

    let smoothed = moving_averages(&farm, "temperature", &[5, 20]);
    let roc = rate_of_change(&farm, "humidity", 1);
    if let Some(last) = smoothed.latest() {
        println!(
            "Latest temperature MA5 {:.2}, MA20 {:.2}, humidity change {:.2}%",
            last.value("temperature_ma5").unwrap_or(f64::NAN),
            last.value("temperature_ma20").unwrap_or(f64::NAN),
            roc.last().copied().unwrap_or(f64::NAN),
        );
    }

    let hourly = resample(
        &host,
        AggregationInterval::OneHour,
        AggregationFn::Max,
        DEFAULT_TIME_ZONE,
    );
    println!("Hourly max CPU temperature over {} buckets", hourly.len());
    println!();

    println!("{}", activity.summary());
}
