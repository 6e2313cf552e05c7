//! Session lifecycle controller
//!
//! Owns the settings, the persistent filter, and the handle to the active
//! worker. Sessions move idle -> starting -> running -> stopping -> idle; a
//! failed spawn lands back at idle, and a producer death is observed through
//! the worker's finished flag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;

use ivimon_adb::{
    clear_log_buffer, logcat_command, set_log_buffer_size, LogcatProcess,
    STREAM_CHANNEL_CAPACITY,
};
use ivimon_core::prelude::*;
use ivimon_core::{FilterCriteria, MonitorEvent, SessionPhase, SessionSnapshot};

use crate::archive::ArchiveWriter;
use crate::config::Settings;
use crate::worker::{ControlMsg, IngestWorker, WorkerParams};

/// How long `stop_session` waits for the worker before aborting it
const STOP_JOIN_TIMEOUT: Duration = Duration::from_secs(10);

/// How long `snapshot` waits for the worker to reply
const SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(2);

struct ActiveSession {
    device_id: String,
    control_tx: mpsc::UnboundedSender<ControlMsg>,
    worker: tokio::task::JoinHandle<()>,
    finished: Arc<AtomicBool>,
}

pub struct SessionController {
    settings: Settings,
    /// Persists across sessions; a new session starts with the last filter
    criteria: FilterCriteria,
    events: mpsc::UnboundedSender<MonitorEvent>,
    active: Option<ActiveSession>,
    phase: SessionPhase,
}

impl SessionController {
    pub fn new(settings: Settings, events: mpsc::UnboundedSender<MonitorEvent>) -> Self {
        Self {
            settings,
            criteria: FilterCriteria::new(),
            events,
            active: None,
            phase: SessionPhase::Idle,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn criteria(&self) -> &FilterCriteria {
        &self.criteria
    }

    /// Device of the active session, if any
    pub fn device_id(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.device_id.as_str())
    }

    /// Current lifecycle phase
    ///
    /// A worker that tore itself down after a producer death reads as idle
    /// even before `stop_session` reaps it.
    pub fn phase(&self) -> SessionPhase {
        if let Some(active) = &self.active {
            if active.finished.load(Ordering::Acquire) {
                return SessionPhase::Idle;
            }
        }
        self.phase
    }

    pub fn is_running(&self) -> bool {
        self.phase() == SessionPhase::Running
    }

    /// Start monitoring `device_id`
    ///
    /// Re-entrant calls while a session is running are a warning no-op. A
    /// spawn failure emits `StartFailed`, returns the error, and leaves the
    /// controller idle.
    pub async fn start_session(&mut self, device_id: &str) -> Result<()> {
        if self.is_running() {
            warn!(
                "Session already running on {}, ignoring start request",
                self.device_id().unwrap_or("?")
            );
            return Ok(());
        }
        self.reap_finished().await;

        self.phase = SessionPhase::Starting;
        info!("Starting session on {}", device_id);

        // Best effort: a failure here only means stale lines lead the stream.
        if self.settings.logcat.clear_on_start {
            if let Err(e) = clear_log_buffer(&self.settings.adb_path, device_id).await {
                debug!("Could not clear the log buffer: {}", e);
            }
        }
        if let Some(size) = &self.settings.logcat.buffer_size {
            if let Err(e) = set_log_buffer_size(&self.settings.adb_path, device_id, size).await {
                debug!("Could not resize the log buffer: {}", e);
            }
        }

        let started_at = Local::now();

        // Archival failures never block the session.
        let archive = match &self.settings.archive.directory {
            Some(dir) => match ArchiveWriter::create(
                dir,
                device_id,
                started_at,
                self.settings.archive.rotate_bytes(),
            ) {
                Ok(writer) => Some(writer),
                Err(e) => {
                    warn!("Archive unavailable for this session: {}", e);
                    let _ = self.events.send(MonitorEvent::archive_error(e.to_string()));
                    None
                }
            },
            None => None,
        };

        let (stream_tx, stream_rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
        let command = logcat_command(&self.settings.adb_path, device_id);
        let process = match LogcatProcess::spawn(command, stream_tx) {
            Ok(process) => process,
            Err(e) => {
                self.phase = SessionPhase::Idle;
                let _ = self
                    .events
                    .send(MonitorEvent::start_failed(device_id, e.to_string()));
                return Err(e);
            }
        };
        let pid = process.id();

        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let finished = Arc::new(AtomicBool::new(false));

        let worker = IngestWorker::new(WorkerParams {
            device_id: device_id.to_string(),
            started_at,
            capacity: self.settings.live_view.capacity,
            keep_unparsed: self.settings.live_view.keep_unparsed,
            criteria: self.criteria.clone(),
            archive,
            process,
            stream_rx,
            control_rx,
            events: self.events.clone(),
            finished: Arc::clone(&finished),
        });
        let handle = tokio::spawn(worker.run());

        self.active = Some(ActiveSession {
            device_id: device_id.to_string(),
            control_tx,
            worker: handle,
            finished,
        });
        self.phase = SessionPhase::Running;
        let _ = self
            .events
            .send(MonitorEvent::session_started(device_id, pid));
        info!("Session running on {} (logcat pid {:?})", device_id, pid);
        Ok(())
    }

    /// Stop the running session
    ///
    /// Idempotent: stopping when idle is a no-op.
    pub async fn stop_session(&mut self) -> Result<()> {
        let Some(active) = self.active.take() else {
            debug!("No session to stop");
            self.phase = SessionPhase::Idle;
            return Ok(());
        };

        self.phase = SessionPhase::Stopping;
        info!("Stopping session on {}", active.device_id);

        // The worker may already be gone after a producer death; a failed
        // send just means there is nothing left to tell.
        let _ = active.control_tx.send(ControlMsg::Stop);

        let mut worker = active.worker;
        match timeout(STOP_JOIN_TIMEOUT, &mut worker).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Worker task ended abnormally: {}", e),
            Err(_) => {
                warn!(
                    "Worker did not stop within {:?}, aborting it",
                    STOP_JOIN_TIMEOUT
                );
                worker.abort();
            }
        }

        self.phase = SessionPhase::Idle;
        Ok(())
    }

    /// Set the filter
    ///
    /// The criteria persist across sessions and are pushed to the running
    /// worker immediately; already-buffered records are not re-filtered.
    pub fn apply_filter(&mut self, criteria: FilterCriteria) -> Result<()> {
        self.criteria = criteria.clone();
        if let Some(active) = &self.active {
            if !active.finished.load(Ordering::Acquire) {
                active
                    .control_tx
                    .send(ControlMsg::ApplyFilter(criteria))
                    .map_err(|_| Error::channel_send("worker control channel closed"))?;
            }
        }
        Ok(())
    }

    /// Empty the live buffer of the running session; counters keep counting
    pub fn clear_view(&mut self) -> Result<()> {
        if let Some(active) = &self.active {
            if !active.finished.load(Ordering::Acquire) {
                active
                    .control_tx
                    .send(ControlMsg::ClearView)
                    .map_err(|_| Error::channel_send("worker control channel closed"))?;
            }
        }
        Ok(())
    }

    /// Point-in-time view of the running session
    pub async fn snapshot(&self) -> Result<SessionSnapshot> {
        let Some(active) = &self.active else {
            return Err(Error::SessionNotRunning);
        };
        if active.finished.load(Ordering::Acquire) {
            return Err(Error::SessionNotRunning);
        }

        let (tx, rx) = oneshot::channel();
        active
            .control_tx
            .send(ControlMsg::Snapshot(tx))
            .map_err(|_| Error::SessionNotRunning)?;

        match timeout(SNAPSHOT_TIMEOUT, rx).await {
            Ok(Ok(snapshot)) => Ok(snapshot),
            Ok(Err(_)) => Err(Error::SessionNotRunning),
            Err(_) => Err(Error::process("Timed out waiting for a session snapshot")),
        }
    }

    /// Drop the bookkeeping for a worker that already tore itself down
    async fn reap_finished(&mut self) {
        let done = self
            .active
            .as_ref()
            .is_some_and(|a| a.finished.load(Ordering::Acquire));
        if done {
            if let Some(active) = self.active.take() {
                let _ = active.worker.await;
                debug!("Reaped finished session on {}", active.device_id);
            }
        }
    }
}
