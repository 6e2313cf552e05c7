//! Side-channel events emitted by a monitoring session
//!
//! Events flow from the ingest worker to whoever is driving the session
//! (the CLI, a test harness). Emission never blocks ingestion.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::anomaly::AnomalyKind;
use crate::record::LogRecord;
use crate::session::SessionCounters;

/// One session event, serializable as NDJSON for machine consumers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MonitorEvent {
    /// Logcat process spawned and ingestion began
    SessionStarted {
        device_id: String,
        pid: Option<u32>,
    },
    /// Session could not start; the controller stayed idle
    StartFailed { device_id: String, reason: String },
    /// A record accepted by the live-view filter
    Record { record: LogRecord },
    /// A raw line matched a crash/ANR marker
    Anomaly {
        kind: AnomalyKind,
        marker: String,
        line: String,
    },
    /// The archive rolled over to a new part file
    ArchiveRotated { path: PathBuf, part_index: u32 },
    /// Archiving failed; the session keeps running without losing the stream
    ArchiveError { reason: String },
    /// A line the producer wrote to stderr
    ProducerStderr { line: String },
    /// The logcat process ended without a stop request
    ProducerExited { code: Option<i32> },
    /// Session wound down; final counters attached
    SessionStopped {
        device_id: String,
        counters: SessionCounters,
    },
}

impl MonitorEvent {
    pub fn session_started(device_id: impl Into<String>, pid: Option<u32>) -> Self {
        Self::SessionStarted {
            device_id: device_id.into(),
            pid,
        }
    }

    pub fn start_failed(device_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::StartFailed {
            device_id: device_id.into(),
            reason: reason.into(),
        }
    }

    pub fn record(record: LogRecord) -> Self {
        Self::Record { record }
    }

    pub fn anomaly(kind: AnomalyKind, marker: impl Into<String>, line: impl Into<String>) -> Self {
        Self::Anomaly {
            kind,
            marker: marker.into(),
            line: line.into(),
        }
    }

    pub fn archive_rotated(path: impl Into<PathBuf>, part_index: u32) -> Self {
        Self::ArchiveRotated {
            path: path.into(),
            part_index,
        }
    }

    pub fn archive_error(reason: impl Into<String>) -> Self {
        Self::ArchiveError {
            reason: reason.into(),
        }
    }

    pub fn producer_stderr(line: impl Into<String>) -> Self {
        Self::ProducerStderr { line: line.into() }
    }

    pub fn producer_exited(code: Option<i32>) -> Self {
        Self::ProducerExited { code }
    }

    pub fn session_stopped(device_id: impl Into<String>, counters: SessionCounters) -> Self {
        Self::SessionStopped {
            device_id: device_id.into(),
            counters,
        }
    }

    /// Device this event belongs to, when the payload carries one
    pub fn device_id(&self) -> Option<&str> {
        match self {
            MonitorEvent::SessionStarted { device_id, .. }
            | MonitorEvent::StartFailed { device_id, .. }
            | MonitorEvent::SessionStopped { device_id, .. } => Some(device_id),
            _ => None,
        }
    }

    /// Whether this event reports a failure of some session service
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            MonitorEvent::StartFailed { .. }
                | MonitorEvent::ArchiveError { .. }
                | MonitorEvent::ProducerExited { .. }
        )
    }

    /// Whether this event ends the session's event stream
    pub fn is_terminal(&self) -> bool {
        matches!(self, MonitorEvent::SessionStopped { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_started_serialization() {
        let event = MonitorEvent::session_started("emulator-5554", Some(4242));
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "session_started");
        assert_eq!(value["device_id"], "emulator-5554");
        assert_eq!(value["pid"], 4242);
    }

    #[test]
    fn test_anomaly_serialization() {
        let event = MonitorEvent::anomaly(
            AnomalyKind::Crash,
            "FATAL EXCEPTION",
            "E AndroidRuntime: FATAL EXCEPTION: main",
        );
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "anomaly");
        assert_eq!(value["kind"], "crash");
        assert_eq!(value["marker"], "FATAL EXCEPTION");
    }

    #[test]
    fn test_session_stopped_carries_counters() {
        let counters = SessionCounters {
            lines_received: 10,
            lines_displayed: 4,
            parse_failures: 1,
            anomalies_detected: 0,
        };
        let event = MonitorEvent::session_stopped("dev1", counters);
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "session_stopped");
        assert_eq!(value["counters"]["lines_received"], 10);
        assert_eq!(value["counters"]["lines_displayed"], 4);
    }

    #[test]
    fn test_round_trip_through_json() {
        let event = MonitorEvent::producer_exited(Some(137));
        let json = serde_json::to_string(&event).unwrap();
        let back: MonitorEvent = serde_json::from_str(&json).unwrap();
        match back {
            MonitorEvent::ProducerExited { code } => assert_eq!(code, Some(137)),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_device_id_helper() {
        assert_eq!(
            MonitorEvent::start_failed("dev1", "spawn failed").device_id(),
            Some("dev1")
        );
        assert_eq!(MonitorEvent::producer_exited(None).device_id(), None);
    }

    #[test]
    fn test_error_and_terminal_classification() {
        assert!(MonitorEvent::start_failed("d", "r").is_error());
        assert!(MonitorEvent::archive_error("disk full").is_error());
        assert!(MonitorEvent::producer_exited(Some(1)).is_error());
        assert!(!MonitorEvent::producer_stderr("noise").is_error());

        assert!(MonitorEvent::session_stopped("d", SessionCounters::default()).is_terminal());
        assert!(!MonitorEvent::producer_exited(None).is_terminal());
    }
}
