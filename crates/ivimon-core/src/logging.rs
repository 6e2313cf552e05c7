//! File-backed tracing setup
//!
//! All diagnostics go to a rolling file. Stdout belongs to the record and
//! event stream and stderr to session status, so neither gets a log layer.

use std::path::PathBuf;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::error::Result;

/// Install the global tracing subscriber
///
/// Logs are written to `~/.local/share/ivimon/logs/`, rolled daily. Log
/// level is controlled by the `IVIMON_LOG` environment variable.
///
/// # Examples
/// ```bash
/// IVIMON_LOG=debug ivimon monitor
/// IVIMON_LOG=ivimon_engine=trace ivimon monitor
/// ```
pub fn init() -> Result<()> {
    let log_dir = get_log_directory();
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, "ivimon.log");

    // Workspace crates default to info, everything else to warn; IVIMON_LOG
    // overrides the whole filter.
    let env_filter = EnvFilter::try_from_env("IVIMON_LOG").unwrap_or_else(|_| {
        EnvFilter::new("ivimon=info,ivimon_core=info,ivimon_adb=info,ivimon_engine=info,warn")
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(file_appender)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(true)
                .with_line_number(true)
                .with_timer(fmt::time::ChronoLocal::new(
                    "%Y-%m-%d %H:%M:%S%.3f".to_string(),
                )),
        )
        .init();

    tracing::debug!("Log directory: {}", log_dir.display());
    Ok(())
}

/// The directory the rolling logs live in
pub fn get_log_directory() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    base.join("ivimon").join("logs")
}

/// The log file path for the current day
///
/// The daily roller suffixes the base name with the date.
pub fn get_current_log_file() -> PathBuf {
    get_log_directory().join(format!(
        "ivimon.log.{}",
        chrono::Local::now().format("%Y-%m-%d")
    ))
}
