//! Workspace error types and result helpers

use std::path::PathBuf;
use thiserror::Error;

/// Shorthand result used throughout the workspace
pub type Result<T> = std::result::Result<T, Error>;

/// Monitor errors grouped by subsystem
#[derive(Debug, Error)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────
    // Infrastructure Errors
    // ─────────────────────────────────────────────────────────────
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // ─────────────────────────────────────────────────────────────
    // Adb/Device Errors
    // ─────────────────────────────────────────────────────────────
    #[error("adb not found at '{path}'. Ensure the Android platform tools are installed.")]
    AdbNotFound { path: String },

    #[error("Device not found: {device_id}")]
    DeviceNotFound { device_id: String },

    #[error("No connected devices in the 'device' state")]
    NoDevices,

    #[error("Multiple devices connected ({}), select one with --device", .serials.join(", "))]
    MultipleDevices { serials: Vec<String> },

    #[error("adb command failed: {command}: {stderr}")]
    CommandFailed { command: String, stderr: String },

    // ─────────────────────────────────────────────────────────────
    // Logcat Process Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Logcat process error: {message}")]
    Process { message: String },

    #[error("Failed to spawn logcat process: {reason}")]
    ProcessSpawn { reason: String },

    #[error("Logcat process still alive {timeout_secs}s after kill")]
    TerminationTimeout { timeout_secs: u64 },

    // ─────────────────────────────────────────────────────────────
    // Parsing/Filtering Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Unparseable logcat line: {line}")]
    Parse { line: String },

    #[error("Invalid filter: {message}")]
    Filter { message: String },

    // ─────────────────────────────────────────────────────────────
    // Archive Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Archive failure at {}: {source}", .path.display())]
    Archive {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ─────────────────────────────────────────────────────────────
    // Session Errors
    // ─────────────────────────────────────────────────────────────
    #[error("No monitoring session is running")]
    SessionNotRunning,

    // ─────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ─────────────────────────────────────────────────────────────
    // Channel Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Channel send error: {message}")]
    ChannelSend { message: String },

    #[error("Channel closed unexpectedly")]
    ChannelClosed,
}

// ─────────────────────────────────────────────────────────────────
// Convenience Constructors
// ─────────────────────────────────────────────────────────────────

impl Error {
    pub fn adb_not_found(path: impl Into<String>) -> Self {
        Self::AdbNotFound { path: path.into() }
    }

    pub fn device_not_found(device_id: impl Into<String>) -> Self {
        Self::DeviceNotFound {
            device_id: device_id.into(),
        }
    }

    pub fn command_failed(command: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self::CommandFailed {
            command: command.into(),
            stderr: stderr.into(),
        }
    }

    pub fn process(message: impl Into<String>) -> Self {
        Self::Process {
            message: message.into(),
        }
    }

    pub fn spawn(reason: impl Into<String>) -> Self {
        Self::ProcessSpawn {
            reason: reason.into(),
        }
    }

    pub fn parse(line: impl Into<String>) -> Self {
        Self::Parse { line: line.into() }
    }

    pub fn filter(message: impl Into<String>) -> Self {
        Self::Filter {
            message: message.into(),
        }
    }

    pub fn archive(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Archive {
            path: path.into(),
            source,
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn channel_send(message: impl Into<String>) -> Self {
        Self::ChannelSend {
            message: message.into(),
        }
    }

    /// Whether this error degrades a single line or session service while
    /// the monitoring loop keeps running
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Parse { .. }
                | Error::Archive { .. }
                | Error::CommandFailed { .. }
                | Error::ChannelSend { .. }
                | Error::SessionNotRunning
                | Error::TerminationTimeout { .. }
        )
    }

    /// Whether this error should abort the command
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::AdbNotFound { .. }
                | Error::NoDevices
                | Error::DeviceNotFound { .. }
                | Error::MultipleDevices { .. }
                | Error::ProcessSpawn { .. }
        )
    }
}

// ─────────────────────────────────────────────────────────────────
// Result Context Extensions
// ─────────────────────────────────────────────────────────────────

/// Context helpers that log through `tracing` as they attach
pub trait ResultExt<T> {
    /// Log the error under `context` and pass it on unchanged
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Like [`ResultExt::context`], building the label only on the error path
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let err = e.into();
            tracing::error!("{}: {:?}", context.into(), err);
            err
        })
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let err = e.into();
            tracing::error!("{}: {:?}", f(), err);
            err
        })
    }
}
