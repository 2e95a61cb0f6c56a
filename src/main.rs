//! SmartFarm Telemetry CLI
//!
//! Real-time status cards and exploratory analysis over greenhouse and
//! edge-host telemetry.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand, ValueEnum};
use crossbeam_channel::{select, Receiver};
use smartfarm_telemetry::{
    activity::{create_shared_log_with_persistence, SharedActivityLog},
    config::{Config, DeviceSource},
    core::{
        calculate_statistics, correlation_matrix, create_time_bins, detect_anomalies, dew_point,
        heat_index, moving_average_column, moving_averages, rate_of_change, resample,
        try_vapor_pressure_deficit, vpd_status, with_derived_metrics, AggregationFn,
        AggregationInterval, AnomalyMethod, DashboardSnapshot, DerivedMetric, Orientation,
        ReportTable, Statistic, SummaryBuilder,
    },
    series::{to_local, QuickRange, Series},
    source::{DataSource, FileSource, PollEvent, PollTarget, Poller, PollerConfig},
    VERSION,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "smartfarm")]
#[command(version = VERSION)]
#[command(about = "Telemetry dashboard and analysis for greenhouse sensors", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Which device feed a command reads.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Feed {
    Farm,
    Host,
}

impl Feed {
    fn device_source(self, config: &Config) -> &DeviceSource {
        match self {
            Feed::Farm => &config.farm,
            Feed::Host => &config.host,
        }
    }
}

#[derive(Debug, Args)]
struct DataArgs {
    /// Device feed to analyse
    #[arg(long, value_enum, default_value = "farm")]
    source: Feed,

    /// Time window ending now (1h, 6h, 24h, 3d, 7d)
    #[arg(long, default_value = "24h")]
    range: QuickRange,

    /// Attach VPD, dew point and heat index columns before analysis
    #[arg(long)]
    derived: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll both feeds and print the status cards on every refresh
    Watch {
        /// Print a single refresh and exit
        #[arg(long)]
        once: bool,
    },

    /// Descriptive statistics per variable
    Stats {
        #[command(flatten)]
        data: DataArgs,

        /// Variables to summarise (defaults to every numeric column)
        #[arg(long, value_delimiter = ',')]
        variables: Vec<String>,

        /// Statistics to show (defaults to all)
        #[arg(long, value_delimiter = ',')]
        statistics: Vec<Statistic>,

        /// One row per statistic instead of one row per variable
        #[arg(long)]
        transpose: bool,
    },

    /// Flag outliers in one variable
    Anomalies {
        #[command(flatten)]
        data: DataArgs,

        #[arg(long)]
        variable: String,

        /// iqr or zscore; anything else falls back to iqr
        #[arg(long)]
        method: Option<String>,

        #[arg(long)]
        threshold: Option<f64>,
    },

    /// Moving averages, rate of change and time-of-day bins
    Trend {
        #[command(flatten)]
        data: DataArgs,

        #[arg(long)]
        variable: String,

        /// Moving average window sizes
        #[arg(long, value_delimiter = ',')]
        windows: Vec<usize>,

        /// Rate of change period in rows
        #[arg(long)]
        period: Option<usize>,

        /// Number of trailing rows to print
        #[arg(long, default_value = "10")]
        tail: usize,
    },

    /// Pairwise correlation between variables
    Correlate {
        #[command(flatten)]
        data: DataArgs,

        #[arg(long, value_delimiter = ',')]
        variables: Vec<String>,

        /// Minimum |r| for a pair to be listed
        #[arg(long, default_value = "0.7")]
        cutoff: f64,
    },

    /// Aggregate readings into fixed time buckets
    Aggregate {
        #[command(flatten)]
        data: DataArgs,

        /// Bucket width (1min, 5min, 15min, 30min, 1H, 1D)
        #[arg(long, default_value = "1H")]
        interval: AggregationInterval,

        /// mean, sum, max, min, median or std
        #[arg(long, default_value = "mean")]
        func: AggregationFn,

        #[arg(long, value_delimiter = ',')]
        variables: Vec<String>,
    },

    /// Compute VPD, dew point and heat index for one temperature/humidity pair
    Derive {
        /// Air temperature in °C
        #[arg(long, allow_hyphen_values = true)]
        temperature: f64,

        /// Relative humidity in percent
        #[arg(long)]
        humidity: f64,
    },

    /// Show data source availability and activity counters
    Status,

    /// Show configuration
    Config {
        /// Write the current (or default) configuration to the config file
        #[arg(long)]
        init: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load().context("Failed to load configuration")?;

    match cli.command {
        Commands::Watch { once } => cmd_watch(&config, once),
        Commands::Stats {
            data,
            variables,
            statistics,
            transpose,
        } => cmd_stats(&config, &data, &variables, &statistics, transpose),
        Commands::Anomalies {
            data,
            variable,
            method,
            threshold,
        } => cmd_anomalies(&config, &data, &variable, method.as_deref(), threshold),
        Commands::Trend {
            data,
            variable,
            windows,
            period,
            tail,
        } => cmd_trend(&config, &data, &variable, &windows, period, tail),
        Commands::Correlate {
            data,
            variables,
            cutoff,
        } => cmd_correlate(&config, &data, &variables, cutoff),
        Commands::Aggregate {
            data,
            interval,
            func,
            variables,
        } => cmd_aggregate(&config, &data, interval, func, &variables),
        Commands::Derive {
            temperature,
            humidity,
        } => {
            cmd_derive(temperature, humidity);
            Ok(())
        }
        Commands::Status => cmd_status(&config),
        Commands::Config { init } => cmd_config(&config, init),
    }
}

fn cmd_watch(config: &Config, once: bool) -> Result<()> {
    config
        .ensure_directories()
        .context("Failed to create data directories")?;
    let tz = config.time_zone()?;
    let activity = create_shared_log_with_persistence(config.activity_path());
    let builder = SummaryBuilder::new(tz).with_health_limits(config.health);

    let poller_config = PollerConfig {
        interval: config.refresh_interval,
        lookback: config.lookback(),
        ..PollerConfig::default()
    };
    let mut farm_poller = Poller::new(
        Arc::new(FileSource::new(config.source_for(&config.farm))),
        vec![PollTarget::new("farm", config.farm.device.as_str())],
        poller_config.clone(),
    );
    let mut host_poller = Poller::new(
        Arc::new(FileSource::new(config.source_for(&config.host))),
        vec![PollTarget::new("host", config.host.device.as_str())],
        poller_config,
    );

    let mut farm = Series::new(config.farm.device.as_str());
    let mut host = Series::new(config.host.device.as_str());
    let mut snapshots: Vec<DashboardSnapshot> = Vec::new();

    if once {
        for event in farm_poller.poll_now().into_iter().chain(host_poller.poll_now()) {
            apply_event(event, &mut farm, &mut host, &activity);
        }
        activity.record_poll();
        let snapshot = builder.build(&farm, &host);
        print_snapshot(&snapshot);
        snapshots.push(snapshot);
    } else {
        println!(
            "Watching {} and {} every {}s (Ctrl+C to stop)",
            config.farm.device,
            config.host.device,
            config.refresh_interval.as_secs()
        );
        println!();

        let running = Arc::new(AtomicBool::new(true));
        ctrlc_handler(running.clone())?;

        farm_poller.start()?;
        host_poller.start()?;
        let farm_rx: Receiver<PollEvent> = farm_poller.receiver().clone();
        let host_rx: Receiver<PollEvent> = host_poller.receiver().clone();

        while running.load(Ordering::SeqCst) {
            let event = select! {
                recv(farm_rx) -> event => event.ok(),
                recv(host_rx) -> event => event.ok(),
                default(Duration::from_millis(100)) => None,
            };
            let Some(event) = event else {
                continue;
            };

            let was_host = event.label() == "host";
            apply_event(event, &mut farm, &mut host, &activity);

            // One snapshot per full refresh, after the host feed reports
            if was_host {
                activity.record_poll();
                let snapshot = builder.build(&farm, &host);
                print_snapshot(&snapshot);
                snapshots.push(snapshot);
            }
        }

        println!();
        println!("Stopping...");
        farm_poller.stop();
        host_poller.stop();
    }

    export_snapshots(config, &snapshots, &activity);

    if let Err(e) = activity.save() {
        tracing::warn!(error = %e, "could not save activity log");
    }

    Ok(())
}

fn apply_event(event: PollEvent, farm: &mut Series, host: &mut Series, activity: &SharedActivityLog) {
    match event {
        PollEvent::Fetched { label, series } => {
            activity.record_readings(series.len() as u64);
            if label == "farm" {
                *farm = series;
            } else {
                *host = series;
            }
        }
        PollEvent::Failed { label, error } => {
            activity.record_fetch_failure();
            eprintln!("Could not refresh {label}: {error}");
        }
    }
}

fn print_snapshot(snapshot: &DashboardSnapshot) {
    println!(
        "── {} ──",
        snapshot.computed_at_utc.format("%Y-%m-%d %H:%M:%S UTC")
    );

    match &snapshot.farm {
        Some(farm) => {
            println!("Farm ({}) @ {}", farm.device_id, farm.latest_local);
            println!(
                "  Temperature: {} ({})",
                fmt_value(farm.temperature.value, "°C"),
                fmt_delta(farm.temperature.delta_from_mean)
            );
            println!(
                "  Humidity:    {} ({})",
                fmt_value(farm.humidity.value, "%"),
                fmt_delta(farm.humidity.delta_from_mean)
            );
            match (farm.vpd, farm.vpd_status) {
                (Some(vpd), Some(status)) => println!("  VPD:         {vpd:.2} kPa ({status})"),
                _ => println!("  VPD:         unknown"),
            }
            let soil: Vec<String> = farm
                .soil
                .iter()
                .map(|c| match (c.percent, c.raw) {
                    (Some(pct), Some(raw)) => format!("{}={pct:.0}% ({raw:.0})", c.channel),
                    _ => format!("{}=-", c.channel),
                })
                .collect();
            println!("  Soil:        {}", soil.join("  "));
            println!("  Rows in last 3h: {}", farm.recent_rows);
        }
        None => println!("Farm: no data"),
    }

    match &snapshot.host {
        Some(host) => {
            println!("Host ({}) @ {}", host.device_id, host.latest_local);
            println!(
                "  CPU temp {}  CPU {}  Memory {}  Disk {}  Latency {}",
                fmt_value(host.cpu_temp, "°C"),
                fmt_value(host.cpu_percent, "%"),
                fmt_value(host.memory_percent, "%"),
                fmt_value(host.disk_percent, "%"),
                fmt_value(host.network_latency_ms, "ms"),
            );
            if host.is_healthy() {
                println!("  Health: ok");
            } else {
                let issues: Vec<&str> = host.issues.iter().map(|i| i.message.as_str()).collect();
                println!("  Health: {}", issues.join(" | "));
            }
        }
        None => println!("Host: no data"),
    }
    println!();
}

fn export_snapshots(config: &Config, snapshots: &[DashboardSnapshot], activity: &SharedActivityLog) {
    if snapshots.is_empty() {
        return;
    }

    let export_path = config.export_path.join(format!(
        "snapshots_{}.json",
        Utc::now().format("%Y%m%d_%H%M%S")
    ));

    match serde_json::to_string_pretty(snapshots) {
        Ok(json) => {
            if let Err(e) = std::fs::write(&export_path, json) {
                eprintln!("Error writing snapshots: {e}");
            } else {
                for _ in snapshots {
                    activity.record_snapshot_exported();
                }
                println!("Exported {} snapshots to {:?}", snapshots.len(), export_path);
            }
        }
        Err(e) => eprintln!("Error serializing snapshots: {e}"),
    }
}

/// Fetch the requested feed and window from the configured data directory.
fn load_series(config: &Config, data: &DataArgs) -> Result<Series> {
    let feed = data.source.device_source(config);
    let source = FileSource::new(config.source_for(feed));
    let range = data.range.resolve(Utc::now());

    let series = source
        .fetch_readings(&feed.device, range.start, range.end)
        .with_context(|| format!("Failed to load readings for {}", feed.device))?;

    if series.is_empty() {
        println!("No readings for {} in the selected range.", feed.device);
    }

    Ok(if data.derived {
        with_derived_metrics(&series, &DerivedMetric::ALL)
    } else {
        series
    })
}

/// The requested variables, or every numeric column when none were given.
fn resolve_variables(series: &Series, requested: &[String]) -> Vec<String> {
    if requested.is_empty() {
        series.numeric_columns()
    } else {
        requested.to_vec()
    }
}

fn cmd_stats(
    config: &Config,
    data: &DataArgs,
    variables: &[String],
    statistics: &[Statistic],
    transpose: bool,
) -> Result<()> {
    let series = load_series(config, data)?;
    let variables = resolve_variables(&series, variables);
    let names: Vec<&str> = variables.iter().map(String::as_str).collect();

    let report = calculate_statistics(&series, &names);
    if report.is_empty() {
        println!("No matching variables.");
        return Ok(());
    }

    let statistics = if statistics.is_empty() {
        Statistic::ALL.to_vec()
    } else {
        statistics.to_vec()
    };
    let orientation = if transpose {
        Orientation::StatisticMajor
    } else {
        Orientation::VariableMajor
    };

    print_table(&report.table(orientation, &statistics));
    Ok(())
}

fn cmd_anomalies(
    config: &Config,
    data: &DataArgs,
    variable: &str,
    method: Option<&str>,
    threshold: Option<f64>,
) -> Result<()> {
    let series = load_series(config, data)?;
    let method = method
        .map(AnomalyMethod::parse_or_default)
        .unwrap_or(config.analysis.anomaly_method);
    let threshold = threshold.unwrap_or(config.analysis.anomaly_threshold);
    if threshold <= 0.0 {
        bail!("Threshold must be positive, got {threshold}");
    }

    let flags = detect_anomalies(&series, variable, method, threshold);
    if flags.is_empty() {
        println!("No values for '{variable}'.");
        return Ok(());
    }

    let tz = config.time_zone()?;
    println!(
        "{} of {} rows flagged ({method}, threshold {threshold})",
        flags.count(),
        flags.len()
    );
    for index in flags.indices() {
        let reading = &series.readings()[index];
        println!(
            "  {}  {:.2}",
            to_local(reading.timestamp, tz).format("%Y-%m-%d %H:%M:%S"),
            reading.value(variable).unwrap_or(f64::NAN)
        );
    }
    Ok(())
}

fn cmd_trend(
    config: &Config,
    data: &DataArgs,
    variable: &str,
    windows: &[usize],
    period: Option<usize>,
    tail: usize,
) -> Result<()> {
    let series = load_series(config, data)?;
    if !series.has_column(variable) {
        println!("No values for '{variable}'.");
        return Ok(());
    }

    let tz = config.time_zone()?;
    let windows = if windows.is_empty() {
        config.analysis.moving_average_windows.clone()
    } else {
        windows.to_vec()
    };
    let period = period.unwrap_or(config.analysis.rate_of_change_period);

    let smoothed = moving_averages(&series, variable, &windows);
    let roc = rate_of_change(&series, variable, period);
    let bins = create_time_bins(&series, tz);

    let ma_columns: Vec<String> = windows
        .iter()
        .filter(|&&w| w > 0)
        .map(|&w| moving_average_column(variable, w))
        .collect();

    print!("{:<20} {:>10}", "time", variable);
    for column in &ma_columns {
        print!(" {column:>16}");
    }
    println!(" {:>10} {:>10}", format!("roc{period}%"), "period");

    let start = smoothed.len().saturating_sub(tail);
    for (i, reading) in smoothed.readings().iter().enumerate().skip(start) {
        print!(
            "{:<20} {:>10}",
            to_local(reading.timestamp, tz).format("%m-%d %H:%M:%S"),
            fmt_cell(reading.value(variable))
        );
        for column in &ma_columns {
            print!(" {:>16}", fmt_cell(reading.value(column)));
        }
        println!(
            " {:>10} {:>10}",
            fmt_cell(Some(roc[i]).filter(|v| v.is_finite())),
            bins[i].period.name()
        );
    }
    Ok(())
}

fn cmd_correlate(config: &Config, data: &DataArgs, variables: &[String], cutoff: f64) -> Result<()> {
    let series = load_series(config, data)?;
    let variables = resolve_variables(&series, variables);
    let names: Vec<&str> = variables.iter().map(String::as_str).collect();

    let matrix = correlation_matrix(&series, &names);
    if matrix.variables.len() < 2 {
        println!("Need at least two variables with values.");
        return Ok(());
    }

    print_table(&ReportTable {
        row_labels: matrix.variables.clone(),
        column_labels: matrix.variables.clone(),
        cells: matrix.coefficients.clone(),
    });

    let pairs = matrix.notable_pairs(cutoff);
    println!();
    if pairs.is_empty() {
        println!("No pairs with |r| > {cutoff}.");
    }
    for pair in pairs {
        println!(
            "  {} ~ {}: r = {:.3} ({:?}, {:?})",
            pair.first, pair.second, pair.coefficient, pair.strength, pair.direction
        );
    }
    Ok(())
}

fn cmd_aggregate(
    config: &Config,
    data: &DataArgs,
    interval: AggregationInterval,
    func: AggregationFn,
    variables: &[String],
) -> Result<()> {
    let series = load_series(config, data)?;
    let tz = config.time_zone()?;
    let buckets = resample(&series, interval, func, tz);
    let variables = resolve_variables(&buckets, variables);

    print!("{:<20}", "bucket");
    for v in &variables {
        print!(" {v:>14}");
    }
    println!();
    for reading in buckets.readings() {
        print!("{:<20}", to_local(reading.timestamp, tz).format("%Y-%m-%d %H:%M"));
        for v in &variables {
            print!(" {:>14}", fmt_cell(reading.value(v)));
        }
        println!();
    }
    Ok(())
}

fn cmd_derive(temperature: f64, humidity: f64) {
    println!("Temperature: {temperature:.1} °C, humidity: {humidity:.1} %");
    match try_vapor_pressure_deficit(Some(temperature), Some(humidity)) {
        Some(vpd) => println!("VPD:         {vpd:.3} kPa ({})", vpd_status(vpd)),
        None => println!("VPD:         unknown"),
    }
    println!("Dew point:   {:.2} °C", dew_point(temperature, humidity));
    println!("Heat index:  {:.2} °C", heat_index(temperature, humidity));
}

fn cmd_status(config: &Config) -> Result<()> {
    println!("SmartFarm Telemetry Status");
    println!("==========================");
    println!();

    println!("Configuration:");
    println!("  Data directory: {:?}", config.data_dir);
    println!("  Refresh interval: {}s", config.refresh_interval.as_secs());
    println!("  Lookback: {} day(s)", config.lookback_days);
    println!("  Time zone: {}", config.time_zone()?);
    println!();

    println!("Sources:");
    for (label, feed) in [("farm", &config.farm), ("host", &config.host)] {
        let source = FileSource::new(config.source_for(feed));
        match source.resolve_path() {
            Some(path) => println!("  {label}: {} -> {:?}", feed.device, path),
            None => println!("  {label}: {} -> missing ({})", feed.device, feed.collection),
        }
    }
    println!();

    let activity_path = config.activity_path();
    if activity_path.exists() {
        let log = create_shared_log_with_persistence(activity_path);
        println!("{}", log.summary());
    } else {
        println!("No previous activity found.");
    }
    Ok(())
}

fn cmd_config(config: &Config, init: bool) -> Result<()> {
    if init {
        config.save().context("Failed to save configuration")?;
        println!("Wrote {:?}", Config::config_path());
        return Ok(());
    }

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}

fn print_table(table: &ReportTable) {
    let label_width = table
        .row_labels
        .iter()
        .map(String::len)
        .max()
        .unwrap_or(0)
        .max(8);

    print!("{:<label_width$}", "");
    for column in &table.column_labels {
        print!(" {column:>14}");
    }
    println!();
    for (label, row) in table.row_labels.iter().zip(&table.cells) {
        print!("{label:<label_width$}");
        for value in row {
            print!(" {:>14}", fmt_cell(Some(*value).filter(|v| !v.is_nan())));
        }
        println!();
    }
}

fn fmt_cell(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.3}"))
}

fn fmt_value(value: Option<f64>, unit: &str) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.1}{unit}"))
}

fn fmt_delta(delta: Option<f64>) -> String {
    delta.map_or_else(|| "no trend".to_string(), |d| format!("{d:+.1} vs mean"))
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(running: Arc<AtomicBool>) -> Result<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .context("Error setting Ctrl+C handler")
}
