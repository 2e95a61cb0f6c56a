//! Activity accounting for the dashboard process.
//!
//! Tracks how often the sources were polled, how many readings came back,
//! how many fetches failed and how many snapshots were written, so an
//! operator can see at a glance whether the feed is healthy.

pub mod log;

// Re-export commonly used types
pub use log::{
    create_shared_log, create_shared_log_with_persistence, ActivityLog, ActivityStats,
    SharedActivityLog,
};
