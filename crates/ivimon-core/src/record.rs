//! Structured logcat records and severity levels

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Sentinel pid/tid for records built from lines the parser could not read
pub const UNPARSED_PID: i32 = -1;

/// Logcat severity levels, ordered least to most severe
///
/// `Unknown` covers level letters outside the documented set and records
/// built from unparseable lines. It sits below `Verbose` so that any
/// explicit severity floor excludes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    #[default]
    Unknown,
    Verbose,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl LogLevel {
    /// Map a logcat level letter to a level
    ///
    /// Letters outside `{V,D,I,W,E,F}` map to `Unknown`; they are valid
    /// input, not a parse failure.
    pub fn from_code(code: char) -> Self {
        match code {
            'V' => LogLevel::Verbose,
            'D' => LogLevel::Debug,
            'I' => LogLevel::Info,
            'W' => LogLevel::Warn,
            'E' => LogLevel::Error,
            'F' => LogLevel::Fatal,
            _ => LogLevel::Unknown,
        }
    }

    /// The single-letter logcat code for this level
    pub fn code(&self) -> char {
        match self {
            LogLevel::Unknown => 'U',
            LogLevel::Verbose => 'V',
            LogLevel::Debug => 'D',
            LogLevel::Info => 'I',
            LogLevel::Warn => 'W',
            LogLevel::Error => 'E',
            LogLevel::Fatal => 'F',
        }
    }

    /// Full display name
    pub fn label(&self) -> &'static str {
        match self {
            LogLevel::Unknown => "UNKNOWN",
            LogLevel::Verbose => "VERBOSE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Fatal => "FATAL",
        }
    }

    /// Get numeric severity value for comparison
    /// Higher values indicate more severe levels
    pub fn severity(&self) -> u8 {
        match self {
            LogLevel::Unknown => 0,
            LogLevel::Verbose => 1,
            LogLevel::Debug => 2,
            LogLevel::Info => 3,
            LogLevel::Warn => 4,
            LogLevel::Error => 5,
            LogLevel::Fatal => 6,
        }
    }

    /// Check whether this level clears a minimum-severity floor
    ///
    /// Comparison is by severity ordinal, never by level letter.
    pub fn at_least(&self, floor: LogLevel) -> bool {
        self.severity() >= floor.severity()
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl std::str::FromStr for LogLevel {
    type Err = Error;

    /// Accepts the logcat letter or the full name, case-insensitively
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "V" | "VERBOSE" => Ok(LogLevel::Verbose),
            "D" | "DEBUG" => Ok(LogLevel::Debug),
            "I" | "INFO" => Ok(LogLevel::Info),
            "W" | "WARN" | "WARNING" => Ok(LogLevel::Warn),
            "E" | "ERROR" => Ok(LogLevel::Error),
            "F" | "FATAL" => Ok(LogLevel::Fatal),
            "U" | "UNKNOWN" => Ok(LogLevel::Unknown),
            other => Err(Error::filter(format!("unknown log level: {}", other))),
        }
    }
}

/// One parsed logcat line
///
/// `timestamp` is device-local wall clock time. Logcat lines carry no year,
/// so the parser fills it in from its reference year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub timestamp: NaiveDateTime,
    pub level: LogLevel,
    pub pid: i32,
    pub tid: i32,
    pub tag: String,
    pub message: String,
    /// The line exactly as it arrived, before any trimming of tag/message
    pub raw_line: String,
}

impl LogRecord {
    /// Build the retention record for a line the parser rejected
    ///
    /// Such records keep the raw text as their message, carry sentinel
    /// pid/tid values, and are timestamped with their arrival time.
    pub fn unparsed(raw: impl Into<String>, received_at: NaiveDateTime) -> Self {
        let raw = raw.into();
        Self {
            timestamp: received_at,
            level: LogLevel::Unknown,
            pid: UNPARSED_PID,
            tid: UNPARSED_PID,
            tag: String::new(),
            message: raw.trim().to_string(),
            raw_line: raw,
        }
    }

    /// Format timestamp for display
    pub fn formatted_time(&self) -> String {
        self.timestamp.format("%m-%d %H:%M:%S%.3f").to_string()
    }

    /// Render one display line in the threadtime column layout
    pub fn display_line(&self) -> String {
        format!(
            "{} {:>5} {:>5} {} {}: {}",
            self.formatted_time(),
            self.pid,
            self.tid,
            self.level.code(),
            self.tag,
            self.message
        )
    }

    /// Check if this is an error-level or worse entry
    pub fn is_error(&self) -> bool {
        self.level.at_least(LogLevel::Error)
    }
}
