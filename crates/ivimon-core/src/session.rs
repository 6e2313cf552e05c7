//! Session lifecycle vocabulary shared between the engine and its clients

use std::path::PathBuf;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::record::LogRecord;

/// Monitoring session lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// No session; ready to start
    #[default]
    Idle,
    /// Pre-start adb calls and process spawn in flight
    Starting,
    /// Logcat stream is being ingested
    Running,
    /// Stop requested; waiting for the worker to wind down
    Stopping,
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionPhase::Idle => write!(f, "idle"),
            SessionPhase::Starting => write!(f, "starting"),
            SessionPhase::Running => write!(f, "running"),
            SessionPhase::Stopping => write!(f, "stopping"),
        }
    }
}

/// Running totals for one session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SessionCounters {
    /// Raw lines taken off the stream
    pub lines_received: u64,
    /// Records accepted by the filter into the live view
    pub lines_displayed: u64,
    /// Lines the parser rejected
    pub parse_failures: u64,
    /// Lines that matched an anomaly marker
    pub anomalies_detected: u64,
}

impl SessionCounters {
    /// One-line human summary for session teardown output
    pub fn summary(&self) -> String {
        format!(
            "{} lines received, {} displayed, {} parse failures, {} anomalies",
            self.lines_received, self.lines_displayed, self.parse_failures, self.anomalies_detected
        )
    }
}

/// Immutable point-in-time copy of a session's state
///
/// Built by the ingest worker on request; `records` holds the live view
/// oldest to newest.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub device_id: String,
    pub is_running: bool,
    pub started_at: Option<DateTime<Local>>,
    pub counters: SessionCounters,
    pub current_archive_file: Option<PathBuf>,
    pub archive_part_index: u32,
    pub records: Vec<LogRecord>,
}

impl SessionSnapshot {
    /// Number of records in the live view
    pub fn record_count(&self) -> usize {
        self.records.len()
    }
}
