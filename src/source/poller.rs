//! Background polling of a data source.
//!
//! The poller fetches the trailing lookback window for each target on a
//! fixed interval and forwards the results over a bounded channel, so the
//! consumer (the dashboard loop) never blocks on I/O.

use crate::series::Series;
use crate::source::{DataSource, SourceError};
use chrono::Utc;
use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Granularity at which the polling thread checks for shutdown.
const SHUTDOWN_CHECK: Duration = Duration::from_millis(50);

/// A device to poll and the label its results are reported under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollTarget {
    pub label: String,
    pub device: String,
}

impl PollTarget {
    pub fn new(label: impl Into<String>, device: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            device: device.into(),
        }
    }
}

/// Poller timing.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Time between polls
    pub interval: Duration,
    /// Width of the trailing window fetched on each poll
    pub lookback: chrono::Duration,
    /// Capacity of the event channel
    pub channel_capacity: usize,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            lookback: chrono::Duration::days(1),
            channel_capacity: 64,
        }
    }
}

/// Outcome of one fetch.
#[derive(Debug, Clone)]
pub enum PollEvent {
    Fetched { label: String, series: Series },
    Failed { label: String, error: SourceError },
}

impl PollEvent {
    pub fn label(&self) -> &str {
        match self {
            PollEvent::Fetched { label, .. } | PollEvent::Failed { label, .. } => label,
        }
    }
}

/// Errors that can occur while controlling the poller.
#[derive(Debug)]
pub enum PollerError {
    AlreadyRunning,
    NoTargets,
}

impl std::fmt::Display for PollerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PollerError::AlreadyRunning => write!(f, "Poller is already running"),
            PollerError::NoTargets => write!(f, "Poller has no targets to fetch"),
        }
    }
}

impl std::error::Error for PollerError {}

/// Periodically fetches every target from a shared source.
pub struct Poller {
    source: Arc<dyn DataSource>,
    targets: Vec<PollTarget>,
    config: PollerConfig,
    sender: Sender<PollEvent>,
    receiver: Receiver<PollEvent>,
    running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl Poller {
    /// Create a poller. Nothing is fetched until [`Poller::start`].
    pub fn new(source: Arc<dyn DataSource>, targets: Vec<PollTarget>, config: PollerConfig) -> Self {
        // Bounded so a stalled consumer cannot grow memory without limit
        let (sender, receiver) = bounded(config.channel_capacity.max(1));

        Self {
            source,
            targets,
            config,
            sender,
            receiver,
            running: Arc::new(AtomicBool::new(false)),
            thread_handle: None,
        }
    }

    /// Start polling in a background thread. The first poll happens immediately.
    pub fn start(&mut self) -> Result<(), PollerError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(PollerError::AlreadyRunning);
        }
        if self.targets.is_empty() {
            return Err(PollerError::NoTargets);
        }

        self.running.store(true, Ordering::SeqCst);

        let source = Arc::clone(&self.source);
        let targets = self.targets.clone();
        let config = self.config.clone();
        let sender = self.sender.clone();
        let running = self.running.clone();

        let handle = thread::spawn(move || {
            tracing::debug!(targets = targets.len(), "poller started");
            while running.load(Ordering::SeqCst) {
                let started = Instant::now();
                poll_once(source.as_ref(), &targets, &config, &sender);

                while running.load(Ordering::SeqCst) && started.elapsed() < config.interval {
                    thread::sleep(SHUTDOWN_CHECK.min(config.interval));
                }
            }
            tracing::debug!("poller stopped");
        });

        self.thread_handle = Some(handle);
        Ok(())
    }

    /// Stop polling and wait for the thread to exit.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Get the receiver for poll events.
    pub fn receiver(&self) -> &Receiver<PollEvent> {
        &self.receiver
    }

    /// Try to receive an event without blocking.
    pub fn try_recv(&self) -> Option<PollEvent> {
        self.receiver.try_recv().ok()
    }

    /// Fetch every target once on the calling thread.
    pub fn poll_now(&self) -> Vec<PollEvent> {
        let now = Utc::now();
        self.targets
            .iter()
            .map(|target| fetch_target(self.source.as_ref(), target, &self.config, now))
            .collect()
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.stop();
    }
}

fn fetch_target(
    source: &dyn DataSource,
    target: &PollTarget,
    config: &PollerConfig,
    now: chrono::DateTime<Utc>,
) -> PollEvent {
    match source.fetch_readings(&target.device, now - config.lookback, now) {
        Ok(series) => {
            tracing::debug!(label = %target.label, rows = series.len(), "fetched readings");
            PollEvent::Fetched {
                label: target.label.clone(),
                series,
            }
        }
        Err(error) => {
            tracing::error!(label = %target.label, device = %target.device, %error, "fetch failed");
            PollEvent::Failed {
                label: target.label.clone(),
                error,
            }
        }
    }
}

fn poll_once(
    source: &dyn DataSource,
    targets: &[PollTarget],
    config: &PollerConfig,
    sender: &Sender<PollEvent>,
) {
    let now = Utc::now();
    for target in targets {
        let event = fetch_target(source, target, config, now);
        // Don't block if the consumer is behind - just drop the event
        if sender.try_send(event).is_err() {
            tracing::warn!(label = %target.label, "poll event dropped, channel full");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::Reading;
    use crate::source::MemorySource;

    struct FailingSource;

    impl DataSource for FailingSource {
        fn fetch_readings(
            &self,
            _device: &str,
            _start: chrono::DateTime<Utc>,
            _end: chrono::DateTime<Utc>,
        ) -> Result<Series, SourceError> {
            Err(SourceError::Unavailable("offline".to_string()))
        }
    }

    fn fast_config() -> PollerConfig {
        PollerConfig {
            interval: Duration::from_millis(20),
            lookback: chrono::Duration::hours(1),
            channel_capacity: 16,
        }
    }

    #[test]
    fn test_poller_delivers_series() {
        let source = Arc::new(MemorySource::with_readings(vec![Reading::new(
            "SmartFarm",
            Utc::now() - chrono::Duration::minutes(5),
        )
        .with_metric("temperature", 25.0)]));

        let mut poller = Poller::new(
            source,
            vec![PollTarget::new("farm", "SmartFarm")],
            fast_config(),
        );
        poller.start().unwrap();
        assert!(poller.is_running());
        assert!(matches!(poller.start(), Err(PollerError::AlreadyRunning)));

        let event = poller
            .receiver()
            .recv_timeout(Duration::from_secs(2))
            .unwrap();
        poller.stop();
        assert!(!poller.is_running());

        match event {
            PollEvent::Fetched { label, series } => {
                assert_eq!(label, "farm");
                assert_eq!(series.present_values("temperature"), vec![25.0]);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_poller_reports_failures() {
        let poller = Poller::new(
            Arc::new(FailingSource),
            vec![PollTarget::new("host", "raspberry_pi_status")],
            fast_config(),
        );
        let events = poller.poll_now();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].label(), "host");
        assert!(matches!(
            &events[0],
            PollEvent::Failed { error: SourceError::Unavailable(_), .. }
        ));
    }

    #[test]
    fn test_poller_requires_targets() {
        let mut poller = Poller::new(Arc::new(MemorySource::new()), Vec::new(), fast_config());
        assert!(matches!(poller.start(), Err(PollerError::NoTargets)));
    }
}
