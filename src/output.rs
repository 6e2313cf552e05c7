//! Event rendering for the CLI
//!
//! Two modes: human text (records on stdout, session status on stderr) and
//! NDJSON (every event on stdout, one JSON object per line). JSON output is
//! meant for scripts, so each line is flushed as soon as it is written.

use std::io::{self, Write};

use chrono::Utc;
use serde::Serialize;
use tracing::error;

use ivimon_adb::Device;
use ivimon_core::MonitorEvent;

/// NDJSON wrapper: the event payload plus an emission timestamp in millis
#[derive(Serialize)]
struct Envelope<'a> {
    timestamp: i64,
    #[serde(flatten)]
    event: &'a MonitorEvent,
}

/// Emit one event as a JSON line on stdout
pub fn emit_json(event: &MonitorEvent) {
    let envelope = Envelope {
        timestamp: Utc::now().timestamp_millis(),
        event,
    };
    let json = match serde_json::to_string(&envelope) {
        Ok(json) => json,
        Err(e) => {
            error!("Failed to serialize event: {}", e);
            return;
        }
    };

    let mut stdout = io::stdout().lock();
    if let Err(e) = writeln!(stdout, "{}", json) {
        error!("Failed to write event to stdout: {}", e);
        return;
    }
    if let Err(e) = stdout.flush() {
        error!("Failed to flush stdout: {}", e);
    }
}

/// Emit one event for a human reader
///
/// Accepted records go to stdout so the stream can be piped; everything else
/// is session status and goes to stderr.
pub fn emit_text(event: &MonitorEvent) {
    match event {
        MonitorEvent::SessionStarted { device_id, pid } => match pid {
            Some(pid) => eprintln!("Monitoring {} (logcat pid {})", device_id, pid),
            None => eprintln!("Monitoring {}", device_id),
        },
        MonitorEvent::StartFailed { device_id, reason } => {
            eprintln!("Failed to start on {}: {}", device_id, reason);
        }
        MonitorEvent::Record { record } => {
            println!("{}", record.display_line());
        }
        MonitorEvent::Anomaly { kind, line, .. } => {
            eprintln!("!! {} detected: {}", kind, line);
        }
        MonitorEvent::ArchiveRotated { path, part_index } => {
            eprintln!("Archive rotated to part {}: {}", part_index, path.display());
        }
        MonitorEvent::ArchiveError { reason } => {
            eprintln!("Archive error: {}", reason);
        }
        MonitorEvent::ProducerStderr { line } => {
            eprintln!("adb: {}", line);
        }
        MonitorEvent::ProducerExited { code } => match code {
            Some(code) => eprintln!("logcat exited with code {}", code),
            None => eprintln!("logcat was killed"),
        },
        MonitorEvent::SessionStopped {
            device_id,
            counters,
        } => {
            eprintln!("Session on {} stopped: {}", device_id, counters.summary());
        }
    }
}

pub fn emit(event: &MonitorEvent, json: bool) {
    if json {
        emit_json(event);
    } else {
        emit_text(event);
    }
}

/// Print a device listing
pub fn print_devices(devices: &[Device], json: bool) -> io::Result<()> {
    let mut stdout = io::stdout().lock();
    if json {
        let line = serde_json::to_string(devices)?;
        writeln!(stdout, "{}", line)?;
    } else if devices.is_empty() {
        writeln!(stdout, "No devices connected.")?;
    } else {
        for device in devices {
            let ready = if device.state.is_ready() {
                ""
            } else {
                "  [not ready]"
            };
            writeln!(
                stdout,
                "{:<24} {:<12} {}{}",
                device.serial,
                device.state,
                device.display_name(),
                ready
            )?;
        }
    }
    stdout.flush()
}
