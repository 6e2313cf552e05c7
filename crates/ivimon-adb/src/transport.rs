//! One-shot adb commands scoped to a single device

use std::process::Output;
use std::time::Duration;

use tokio::process::Command;
use tokio::time::timeout;

use ivimon_core::prelude::*;

/// Timeout for the pre-session `logcat -c` flush
pub const CLEAR_TIMEOUT: Duration = Duration::from_secs(5);

/// Timeout for other quick one-shot commands
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

async fn run_adb(
    adb_path: &str,
    serial: &str,
    args: &[&str],
    duration: Duration,
) -> Result<Output> {
    let output = timeout(
        duration,
        Command::new(adb_path)
            .arg("-s")
            .arg(serial)
            .args(args)
            .output(),
    )
    .await
    .map_err(|_| {
        Error::process(format!(
            "adb {} timed out after {:?}",
            args.join(" "),
            duration
        ))
    })?
    .map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::adb_not_found(adb_path),
        _ => Error::process(format!("Failed to run adb: {}", e)),
    })?;

    Ok(output)
}

/// Flush the device-side log buffer
///
/// Callers treat a failure here as advisory: the only cost is that the
/// first reads of the session may include lines that predate it.
pub async fn clear_log_buffer(adb_path: &str, serial: &str) -> Result<()> {
    let output = run_adb(adb_path, serial, &["logcat", "-c"], CLEAR_TIMEOUT).await?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::command_failed("logcat -c", stderr.trim()));
    }
    debug!("Cleared log buffer on {}", serial);
    Ok(())
}

/// Resize the device-side log buffer (`logcat -G`), size like "16M"
pub async fn set_log_buffer_size(adb_path: &str, serial: &str, size: &str) -> Result<()> {
    let output = run_adb(adb_path, serial, &["logcat", "-G", size], COMMAND_TIMEOUT).await?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::command_failed(
            format!("logcat -G {}", size),
            stderr.trim(),
        ));
    }
    info!("Set log buffer size to {} on {}", size, serial);
    Ok(())
}
