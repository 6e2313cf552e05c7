//! Crash and ANR marker scanning
//!
//! Scanning runs on every raw line, before parsing and independent of the
//! live-view filter. A crash whose line parses as INFO is still a crash.

use serde::{Deserialize, Serialize};

/// Marker substrings scanned for in every raw logcat line (case-sensitive)
pub const ANOMALY_MARKERS: [&str; 5] = [
    "FATAL EXCEPTION",
    "ANR in",
    "Native crash",
    "SIGSEGV",
    "SIGABRT",
];

/// Classification of a flagged line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    /// Java/ART fatal exception or native fault
    Crash,
    /// Application Not Responding
    Anr,
}

impl AnomalyKind {
    pub fn label(&self) -> &'static str {
        match self {
            AnomalyKind::Crash => "CRASH",
            AnomalyKind::Anr => "ANR",
        }
    }
}

impl std::fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Scan a raw line for anomaly markers
///
/// Returns the classification and the marker that fired, checking markers
/// in declaration order and stopping at the first hit.
pub fn scan(line: &str) -> Option<(AnomalyKind, &'static str)> {
    for marker in ANOMALY_MARKERS {
        if line.contains(marker) {
            let kind = if marker == "ANR in" {
                AnomalyKind::Anr
            } else {
                AnomalyKind::Crash
            };
            return Some((kind, marker));
        }
    }
    None
}
