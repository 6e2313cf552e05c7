//! CLI command implementations
//!
//! Each entry point installs error reporting and file logging, runs the
//! command, and logs the outcome before handing the result back to `main`.

use std::path::PathBuf;

use tokio::sync::mpsc;

use ivimon_adb::{list_devices, resolve_device};
use ivimon_core::prelude::*;
use ivimon_core::{FilterCriteria, LogLevel, MonitorEvent};
use ivimon_engine::{SessionController, Settings};

use crate::output;

pub struct MonitorOptions {
    pub device: Option<String>,
    pub min_level: Option<LogLevel>,
    pub tag: Option<String>,
    pub message: Option<String>,
    pub pid_tid: Vec<i32>,
    pub archive_dir: Option<PathBuf>,
    pub clear: bool,
    pub no_clear: bool,
    pub buffer_size: Option<String>,
    pub json: bool,
}

/// List connected devices
pub async fn run_devices(json: bool) -> Result<()> {
    color_eyre::install().map_err(|e| Error::config(e.to_string()))?;
    ivimon_core::logging::init()?;

    let settings = Settings::load();
    let discovery = list_devices(&settings.adb_path).await?;

    if let Some(warning) = &discovery.warning {
        warn!("adb devices: {}", warning);
    }
    info!(
        "Found {} device(s) in {:?}",
        discovery.devices.len(),
        discovery.elapsed
    );

    output::print_devices(&discovery.devices, json)?;
    Ok(())
}

/// Monitor one device until Ctrl-C or the stream dies
pub async fn run_monitor(opts: MonitorOptions) -> Result<()> {
    color_eyre::install().map_err(|e| Error::config(e.to_string()))?;
    ivimon_core::logging::init()?;

    info!("═══════════════════════════════════════════════════════");
    info!("IVI Monitor starting");
    info!("═══════════════════════════════════════════════════════");

    let result = monitor(opts).await;

    if let Err(ref e) = result {
        error!("Monitor error: {:?}", e);
    }
    info!("IVI Monitor exiting");
    result
}

async fn monitor(opts: MonitorOptions) -> Result<()> {
    let criteria = build_criteria(&opts)?;

    let mut settings = Settings::load();
    if let Some(dir) = opts.archive_dir {
        settings.archive.directory = Some(dir);
    }
    if opts.clear {
        settings.logcat.clear_on_start = true;
    }
    if opts.no_clear {
        settings.logcat.clear_on_start = false;
    }
    if let Some(size) = opts.buffer_size {
        settings.logcat.buffer_size = Some(size);
    }

    let discovery = list_devices(&settings.adb_path).await?;
    if let Some(warning) = &discovery.warning {
        warn!("adb devices: {}", warning);
    }
    let device = resolve_device(&discovery.devices, opts.device.as_deref())?;
    info!("Selected device: {}", device.display_name());

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let mut controller = SessionController::new(settings, event_tx);
    controller.apply_filter(criteria)?;

    if let Err(e) = controller.start_session(&device.serial).await {
        // Surface whatever the failed start managed to report.
        while let Ok(event) = event_rx.try_recv() {
            output::emit(&event, opts.json);
        }
        return Err(e);
    }

    loop {
        tokio::select! {
            event = event_rx.recv() => {
                let Some(event) = event else { break };
                let terminal = event.is_terminal();
                output::emit(&event, opts.json);

                // A dead producer ends the session; reap the worker so the
                // stopped event can flow out behind it.
                if matches!(event, MonitorEvent::ProducerExited { .. }) {
                    controller.stop_session().await?;
                }
                if terminal {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupt received, stopping session");
                controller.stop_session().await?;
            }
        }
    }

    Ok(())
}

fn build_criteria(opts: &MonitorOptions) -> Result<FilterCriteria> {
    let mut criteria = FilterCriteria::new();
    if let Some(level) = opts.min_level {
        criteria = criteria.with_min_level(level);
    }
    if !opts.pid_tid.is_empty() {
        criteria = criteria.with_pid_tid(opts.pid_tid.iter().copied());
    }
    if let Some(tag) = &opts.tag {
        criteria = criteria.with_tag_pattern(tag)?;
    }
    if let Some(message) = &opts.message {
        criteria = criteria.with_msg_pattern(message)?;
    }
    Ok(criteria)
}
