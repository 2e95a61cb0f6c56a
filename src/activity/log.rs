//! Poll and export counters with optional persistence.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Counters for the current process, optionally carried across runs.
#[derive(Debug)]
pub struct ActivityLog {
    /// Poll passes completed
    polls: AtomicU64,
    /// Readings received across all fetches
    readings_received: AtomicU64,
    /// Fetches that returned an error
    fetch_failures: AtomicU64,
    /// Dashboard snapshots written to disk
    snapshots_exported: AtomicU64,
    session_start: DateTime<Utc>,
    persist_path: Option<PathBuf>,
}

impl ActivityLog {
    pub fn new() -> Self {
        Self {
            polls: AtomicU64::new(0),
            readings_received: AtomicU64::new(0),
            fetch_failures: AtomicU64::new(0),
            snapshots_exported: AtomicU64::new(0),
            session_start: Utc::now(),
            persist_path: None,
        }
    }

    /// Create a log that loads previous totals from `path` and saves back to it.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut log = Self::new();
        log.persist_path = Some(path);

        if let Err(e) = log.load() {
            tracing::warn!(error = %e, "could not load previous activity stats");
        }

        log
    }

    pub fn record_poll(&self) {
        self.polls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_readings(&self, count: u64) {
        self.readings_received.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_fetch_failure(&self) {
        self.fetch_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_snapshot_exported(&self) {
        self.snapshots_exported.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stats(&self) -> ActivityStats {
        ActivityStats {
            polls: self.polls.load(Ordering::Relaxed),
            readings_received: self.readings_received.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
            snapshots_exported: self.snapshots_exported.load(Ordering::Relaxed),
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
        }
    }

    /// Human-readable summary for the `status` command.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Activity:\n\
             - Polls completed: {}\n\
             - Readings received: {}\n\
             - Fetch failures: {}\n\
             - Snapshots exported: {}\n\
             - Session duration: {} seconds",
            stats.polls,
            stats.readings_received,
            stats.fetch_failures,
            stats.snapshots_exported,
            stats.session_duration_secs
        )
    }

    /// Save totals to disk. No-op without a persistence path.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let stats = self.stats();
            let persisted = PersistedStats {
                polls: stats.polls,
                readings_received: stats.readings_received,
                fetch_failures: stats.fetch_failures,
                snapshots_exported: stats.snapshots_exported,
                last_updated: Utc::now(),
            };

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;
            std::fs::write(path, json)?;
        }
        Ok(())
    }

    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                let persisted: PersistedStats =
                    serde_json::from_str(&content).map_err(std::io::Error::other)?;

                self.polls.store(persisted.polls, Ordering::Relaxed);
                self.readings_received
                    .store(persisted.readings_received, Ordering::Relaxed);
                self.fetch_failures
                    .store(persisted.fetch_failures, Ordering::Relaxed);
                self.snapshots_exported
                    .store(persisted.snapshots_exported, Ordering::Relaxed);
            }
        }
        Ok(())
    }

    pub fn reset(&self) {
        self.polls.store(0, Ordering::Relaxed);
        self.readings_received.store(0, Ordering::Relaxed);
        self.fetch_failures.store(0, Ordering::Relaxed);
        self.snapshots_exported.store(0, Ordering::Relaxed);
    }
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityStats {
    pub polls: u64,
    pub readings_received: u64,
    pub fetch_failures: u64,
    pub snapshots_exported: u64,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedStats {
    polls: u64,
    readings_received: u64,
    fetch_failures: u64,
    snapshots_exported: u64,
    last_updated: DateTime<Utc>,
}

pub type SharedActivityLog = Arc<ActivityLog>;

pub fn create_shared_log() -> SharedActivityLog {
    Arc::new(ActivityLog::new())
}

pub fn create_shared_log_with_persistence(path: PathBuf) -> SharedActivityLog {
    Arc::new(ActivityLog::with_persistence(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counting() {
        let log = ActivityLog::new();
        log.record_poll();
        log.record_poll();
        log.record_readings(120);
        log.record_fetch_failure();

        let stats = log.stats();
        assert_eq!(stats.polls, 2);
        assert_eq!(stats.readings_received, 120);
        assert_eq!(stats.fetch_failures, 1);
        assert_eq!(stats.snapshots_exported, 0);
    }

    #[test]
    fn test_reset() {
        let log = ActivityLog::new();
        log.record_readings(50);
        log.record_snapshot_exported();
        log.reset();

        let stats = log.stats();
        assert_eq!(stats.readings_received, 0);
        assert_eq!(stats.snapshots_exported, 0);
    }

    #[test]
    fn test_persistence_round_trip() {
        let path = std::env::temp_dir()
            .join(format!("smartfarm-activity-{}", uuid::Uuid::new_v4()))
            .join("activity.json");

        let log = ActivityLog::with_persistence(path.clone());
        log.record_poll();
        log.record_readings(7);
        log.save().unwrap();

        let reloaded = ActivityLog::with_persistence(path.clone());
        assert_eq!(reloaded.stats().polls, 1);
        assert_eq!(reloaded.stats().readings_received, 7);

        if let Some(dir) = path.parent() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }

    #[test]
    fn test_summary_format() {
        let summary = ActivityLog::new().summary();
        assert!(summary.contains("Polls completed"));
        assert!(summary.contains("Fetch failures"));
    }
}
