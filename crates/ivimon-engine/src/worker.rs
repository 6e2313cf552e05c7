//! Per-session ingest worker
//!
//! Owns the logcat child process and every piece of per-session state: the
//! live ring buffer, counters, parser, filter, and archive writer. One line
//! moves through the stages in a fixed order: count, anomaly scan, archive,
//! parse, filter, display.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Datelike, Local};
use tokio::sync::{mpsc, oneshot};

use ivimon_adb::{LineParser, LogcatProcess, StreamEvent, GRACEFUL_STOP_TIMEOUT};
use ivimon_core::prelude::*;
use ivimon_core::{
    scan, FilterCriteria, LogRecord, MonitorEvent, RingBuffer, SessionCounters, SessionSnapshot,
};

use crate::archive::ArchiveWriter;

/// Deadline for draining reader tasks after the process was told to stop
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Control messages from the session controller to the worker
#[derive(Debug)]
pub enum ControlMsg {
    /// Replace the filter; applies to subsequent lines only
    ApplyFilter(FilterCriteria),
    /// Empty the live buffer; counters keep their totals
    ClearView,
    /// Reply with a point-in-time view of the session
    Snapshot(oneshot::Sender<SessionSnapshot>),
    Stop,
}

/// Everything a worker needs to run one session
pub struct WorkerParams {
    pub device_id: String,
    pub started_at: DateTime<Local>,
    /// Live buffer capacity
    pub capacity: usize,
    /// Keep unparseable lines as UNKNOWN records instead of dropping them
    pub keep_unparsed: bool,
    pub criteria: FilterCriteria,
    pub archive: Option<ArchiveWriter>,
    pub process: LogcatProcess,
    pub stream_rx: mpsc::Receiver<StreamEvent>,
    pub control_rx: mpsc::UnboundedReceiver<ControlMsg>,
    pub events: mpsc::UnboundedSender<MonitorEvent>,
    /// Set once the worker has fully torn down
    pub finished: Arc<AtomicBool>,
}

pub struct IngestWorker {
    device_id: String,
    started_at: DateTime<Local>,
    buffer: RingBuffer<LogRecord>,
    counters: SessionCounters,
    parser: LineParser,
    criteria: FilterCriteria,
    keep_unparsed: bool,
    archive: Option<ArchiveWriter>,
    /// True while archive appends are failing; gates the error event so one
    /// failure streak produces one event
    archive_failing: bool,
    process: LogcatProcess,
    stream_rx: mpsc::Receiver<StreamEvent>,
    control_rx: mpsc::UnboundedReceiver<ControlMsg>,
    events: mpsc::UnboundedSender<MonitorEvent>,
    finished: Arc<AtomicBool>,
}

impl IngestWorker {
    pub fn new(params: WorkerParams) -> Self {
        Self {
            parser: LineParser::new(params.started_at.year()),
            device_id: params.device_id,
            started_at: params.started_at,
            buffer: RingBuffer::new(params.capacity),
            counters: SessionCounters::default(),
            criteria: params.criteria,
            keep_unparsed: params.keep_unparsed,
            archive: params.archive,
            archive_failing: false,
            process: params.process,
            stream_rx: params.stream_rx,
            control_rx: params.control_rx,
            events: params.events,
            finished: params.finished,
        }
    }

    /// Main loop: runs until a stop is requested or the producer dies
    pub async fn run(mut self) {
        debug!("Ingest worker started for {}", self.device_id);

        let mut stop_requested = false;
        let mut producer_exit: Option<Option<i32>> = None;

        loop {
            tokio::select! {
                msg = self.control_rx.recv() => {
                    match msg {
                        Some(ControlMsg::ApplyFilter(criteria)) => self.apply_filter(criteria),
                        Some(ControlMsg::ClearView) => {
                            debug!("Clearing live view ({} records)", self.buffer.len());
                            self.buffer.clear();
                        }
                        Some(ControlMsg::Snapshot(reply)) => {
                            let _ = reply.send(self.snapshot());
                        }
                        Some(ControlMsg::Stop) => {
                            stop_requested = true;
                            break;
                        }
                        // Controller gone; treat as a stop request.
                        None => {
                            stop_requested = true;
                            break;
                        }
                    }
                }
                event = self.stream_rx.recv() => {
                    match event {
                        Some(StreamEvent::Line(line)) => self.handle_line(&line),
                        Some(StreamEvent::Stderr(line)) => self.handle_stderr(line),
                        Some(StreamEvent::Exited { code }) => {
                            warn!("logcat exited unexpectedly with code {:?}", code);
                            producer_exit = Some(code);
                            break;
                        }
                        None => {
                            producer_exit = Some(None);
                            break;
                        }
                    }
                }
            }
        }

        self.teardown(stop_requested, producer_exit).await;
    }

    /// One raw line through the pipeline: count, anomaly scan, archive,
    /// parse, filter, display
    fn handle_line(&mut self, raw: &str) {
        if raw.trim().is_empty() {
            return;
        }

        self.counters.lines_received += 1;

        // Anomaly markers match on the raw line, before parsing or filtering.
        if let Some((kind, marker)) = scan(raw) {
            self.counters.anomalies_detected += 1;
            warn!("{} marker in logcat output: {}", kind.label(), raw);
            let _ = self.events.send(MonitorEvent::anomaly(kind, marker, raw));
        }

        self.archive_line(raw);

        let record = match self.parser.parse(raw) {
            Ok(record) => record,
            Err(_) => {
                self.counters.parse_failures += 1;
                if !self.keep_unparsed {
                    return;
                }
                LogRecord::unparsed(raw, Local::now().naive_local())
            }
        };

        if !self.criteria.matches(&record) {
            return;
        }

        self.counters.lines_displayed += 1;
        let _ = self.events.send(MonitorEvent::record(record.clone()));
        self.buffer.push(record);
    }

    fn archive_line(&mut self, raw: &str) {
        let Some(writer) = self.archive.as_mut() else {
            return;
        };

        match writer.append(raw) {
            Ok(Some(rotation)) => {
                self.archive_failing = false;
                let _ = self
                    .events
                    .send(MonitorEvent::archive_rotated(rotation.path, rotation.part_index));
            }
            Ok(None) => {
                self.archive_failing = false;
            }
            Err(e) => {
                warn!("Archive write failed: {}", e);
                if !self.archive_failing {
                    self.archive_failing = true;
                    let _ = self.events.send(MonitorEvent::archive_error(e.to_string()));
                }
            }
        }
    }

    fn handle_stderr(&mut self, line: String) {
        debug!("logcat stderr: {}", line);
        let _ = self.events.send(MonitorEvent::producer_stderr(line));
    }

    fn apply_filter(&mut self, criteria: FilterCriteria) {
        info!("Filter updated: active={}", criteria.is_active());
        self.criteria = criteria;
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            device_id: self.device_id.clone(),
            is_running: true,
            started_at: Some(self.started_at),
            counters: self.counters,
            current_archive_file: self
                .archive
                .as_ref()
                .map(|w| w.current_path().to_path_buf()),
            archive_part_index: self.archive.as_ref().map(|w| w.part_index()).unwrap_or(0),
            records: self.buffer.to_vec(),
        }
    }

    async fn teardown(mut self, stop_requested: bool, producer_exit: Option<Option<i32>>) {
        debug!("Ingest worker stopping for {}", self.device_id);

        if producer_exit.is_none() {
            // Stop path: the process is still alive.
            if let Err(e) = self.process.shutdown(GRACEFUL_STOP_TIMEOUT).await {
                warn!("logcat did not terminate cleanly: {}", e);
            }
        }

        // Either way the readers may still hold tail lines; collect them so
        // the archive sees the full stream.
        self.drain_stream().await;

        if let Some(code) = producer_exit {
            if !stop_requested {
                let _ = self.events.send(MonitorEvent::producer_exited(code));
            }
        }

        if let Some(writer) = self.archive.take() {
            match writer.finalize() {
                Ok(path) => debug!("Archive finalized at {:?}", path),
                Err(e) => warn!("Failed to finalize archive: {}", e),
            }
        }

        self.finished.store(true, Ordering::Release);
        let _ = self.events.send(MonitorEvent::session_stopped(
            self.device_id.clone(),
            self.counters,
        ));

        info!(
            "Session on {} stopped: {}",
            self.device_id,
            self.counters.summary()
        );
    }

    /// Consume the stream until all reader tasks hang up
    async fn drain_stream(&mut self) {
        let deadline = tokio::time::sleep(DRAIN_TIMEOUT);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                event = self.stream_rx.recv() => {
                    match event {
                        Some(StreamEvent::Line(line)) => self.handle_line(&line),
                        Some(StreamEvent::Stderr(line)) => self.handle_stderr(line),
                        // Already shutting down; the code was requested by us.
                        Some(StreamEvent::Exited { .. }) => {}
                        None => break,
                    }
                }
                _ = &mut deadline => {
                    warn!("Timed out draining the log stream");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ivimon_core::{AnomalyKind, LogLevel};
    use ivimon_adb::STREAM_CHANNEL_CAPACITY;
    use tokio::process::Command;
    use tokio::time::timeout;

    struct Harness {
        events: mpsc::UnboundedReceiver<MonitorEvent>,
        control: mpsc::UnboundedSender<ControlMsg>,
        finished: Arc<AtomicBool>,
        handle: tokio::task::JoinHandle<()>,
    }

    fn spawn_worker(
        script: &str,
        criteria: FilterCriteria,
        keep_unparsed: bool,
        archive: Option<ArchiveWriter>,
    ) -> Harness {
        let (stream_tx, stream_rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
        let mut cmd = Command::new("sh");
        cmd.args(["-c", script]);
        let process = LogcatProcess::spawn(cmd, stream_tx).expect("sh must be available");

        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let finished = Arc::new(AtomicBool::new(false));

        let worker = IngestWorker::new(WorkerParams {
            device_id: "test-device".to_string(),
            started_at: Local::now(),
            capacity: 100,
            keep_unparsed,
            criteria,
            archive,
            process,
            stream_rx,
            control_rx,
            events: event_tx,
            finished: Arc::clone(&finished),
        });

        let handle = tokio::spawn(worker.run());
        Harness {
            events: event_rx,
            control: control_tx,
            finished,
            handle,
        }
    }

    /// Poll snapshots until `pred` holds or the attempts run out.
    async fn snapshot_when(
        harness: &Harness,
        pred: impl Fn(&SessionSnapshot) -> bool,
    ) -> SessionSnapshot {
        for _ in 0..100 {
            let (tx, rx) = oneshot::channel();
            harness
                .control
                .send(ControlMsg::Snapshot(tx))
                .expect("worker should be alive");
            if let Ok(snapshot) = rx.await {
                if pred(&snapshot) {
                    return snapshot;
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("snapshot condition never reached");
    }

    async fn stop(harness: Harness) -> Vec<MonitorEvent> {
        harness.control.send(ControlMsg::Stop).ok();
        timeout(Duration::from_secs(10), harness.handle)
            .await
            .expect("worker should stop in time")
            .expect("worker task should not panic");
        assert!(harness.finished.load(Ordering::Acquire));

        let mut events = Vec::new();
        let mut rx = harness.events;
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    const SCRIPT_MIXED: &str = r#"printf '%s\n' \
        '03-14 09:26:53.123  1234  5678 I ActivityManager: Start proc com.example.app' \
        '03-14 09:26:54.456  1234  5678 E AndroidRuntime: request failed' \
        '--------- beginning of main'; sleep 60"#;

    #[tokio::test]
    async fn test_lines_flow_into_buffer_and_counters() {
        let harness = spawn_worker(SCRIPT_MIXED, FilterCriteria::new(), true, None);

        let snapshot = snapshot_when(&harness, |s| s.counters.lines_received >= 3).await;
        assert_eq!(snapshot.counters.lines_received, 3);
        assert_eq!(snapshot.counters.lines_displayed, 3);
        assert_eq!(snapshot.counters.parse_failures, 1);
        assert_eq!(snapshot.records.len(), 3);
        assert!(snapshot.is_running);
        assert_eq!(snapshot.device_id, "test-device");

        // The unparseable divider is retained as an UNKNOWN record.
        assert_eq!(snapshot.records[2].level, LogLevel::Unknown);
        assert_eq!(snapshot.records[2].raw_line, "--------- beginning of main");

        let events = stop(harness).await;
        assert!(matches!(
            events.last(),
            Some(MonitorEvent::SessionStopped { .. })
        ));
    }

    #[tokio::test]
    async fn test_unparsed_lines_dropped_when_disabled() {
        let harness = spawn_worker(SCRIPT_MIXED, FilterCriteria::new(), false, None);

        let snapshot = snapshot_when(&harness, |s| s.counters.lines_received >= 3).await;
        assert_eq!(snapshot.counters.parse_failures, 1);
        assert_eq!(snapshot.counters.lines_displayed, 2);
        assert_eq!(snapshot.records.len(), 2);

        stop(harness).await;
    }

    #[tokio::test]
    async fn test_initial_filter_gates_display() {
        let criteria = FilterCriteria::new().with_min_level(LogLevel::Error);
        let harness = spawn_worker(SCRIPT_MIXED, criteria, true, None);

        let snapshot = snapshot_when(&harness, |s| s.counters.lines_received >= 3).await;
        // Only the E line passes; the I line and the UNKNOWN divider do not.
        assert_eq!(snapshot.counters.lines_displayed, 1);
        assert_eq!(snapshot.records.len(), 1);
        assert_eq!(snapshot.records[0].level, LogLevel::Error);
        // Received and parse-failure counters are filter-independent.
        assert_eq!(snapshot.counters.lines_received, 3);
        assert_eq!(snapshot.counters.parse_failures, 1);

        stop(harness).await;
    }

    #[tokio::test]
    async fn test_apply_filter_affects_subsequent_lines_only() {
        let harness = spawn_worker(SCRIPT_MIXED, FilterCriteria::new(), true, None);

        let snapshot = snapshot_when(&harness, |s| s.counters.lines_received >= 3).await;
        assert_eq!(snapshot.records.len(), 3);

        harness
            .control
            .send(ControlMsg::ApplyFilter(
                FilterCriteria::new().with_min_level(LogLevel::Fatal),
            ))
            .unwrap();

        // Already-buffered records stay.
        let snapshot = snapshot_when(&harness, |s| s.counters.lines_received >= 3).await;
        assert_eq!(snapshot.records.len(), 3);

        stop(harness).await;
    }

    #[tokio::test]
    async fn test_clear_view_empties_buffer_keeps_counters() {
        let harness = spawn_worker(SCRIPT_MIXED, FilterCriteria::new(), true, None);

        snapshot_when(&harness, |s| s.counters.lines_received >= 3).await;
        harness.control.send(ControlMsg::ClearView).unwrap();

        let snapshot = snapshot_when(&harness, |s| s.records.is_empty()).await;
        assert_eq!(snapshot.counters.lines_received, 3);
        assert_eq!(snapshot.counters.lines_displayed, 3);

        stop(harness).await;
    }

    #[tokio::test]
    async fn test_anomaly_marker_emits_event() {
        let script = r#"printf '%s\n' \
            '03-14 09:26:53.123  1234  5678 E AndroidRuntime: FATAL EXCEPTION: main' \
            '03-14 09:26:53.200  1234  5678 E ActivityManager: ANR in com.example.app'; sleep 60"#;
        let harness = spawn_worker(script, FilterCriteria::new(), true, None);

        let snapshot = snapshot_when(&harness, |s| s.counters.anomalies_detected >= 2).await;
        assert_eq!(snapshot.counters.anomalies_detected, 2);

        let events = stop(harness).await;
        let anomalies: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                MonitorEvent::Anomaly { kind, marker, .. } => Some((*kind, marker.as_str())),
                _ => None,
            })
            .collect();
        assert_eq!(
            anomalies,
            [
                (AnomalyKind::Crash, "FATAL EXCEPTION"),
                (AnomalyKind::Anr, "ANR in"),
            ]
        );
    }

    #[tokio::test]
    async fn test_producer_death_reported_and_tail_kept() {
        let script = r#"printf '%s\n' \
            '03-14 09:26:53.123  1234  5678 I ActivityManager: Start proc'; exit 3"#;
        let harness = spawn_worker(script, FilterCriteria::new(), true, None);

        timeout(Duration::from_secs(10), harness.handle)
            .await
            .expect("worker should notice the exit")
            .expect("worker task should not panic");
        assert!(harness.finished.load(Ordering::Acquire));

        let mut events = Vec::new();
        let mut rx = harness.events;
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }

        let record_idx = events
            .iter()
            .position(|e| matches!(e, MonitorEvent::Record { .. }))
            .expect("tail line should still reach the view");
        let exited_idx = events
            .iter()
            .position(|e| matches!(e, MonitorEvent::ProducerExited { code: Some(3) }))
            .expect("producer exit should be reported");
        let stopped_idx = events
            .iter()
            .position(|e| matches!(e, MonitorEvent::SessionStopped { .. }))
            .expect("session stop should be reported");

        assert!(record_idx < exited_idx);
        assert!(exited_idx < stopped_idx);
    }

    #[tokio::test]
    async fn test_stderr_forwarded() {
        let script = "echo 'adb: device offline' >&2; sleep 60";
        let harness = spawn_worker(script, FilterCriteria::new(), true, None);

        // Give the reader a moment to deliver stderr.
        tokio::time::sleep(Duration::from_millis(300)).await;

        let events = stop(harness).await;
        assert!(events.iter().any(|e| matches!(
            e,
            MonitorEvent::ProducerStderr { line } if line == "adb: device offline"
        )));
    }

    #[tokio::test]
    async fn test_archive_receives_raw_lines_and_rotates() {
        let temp = tempfile::tempdir().unwrap();
        let writer =
            ArchiveWriter::create(temp.path(), "test-device", Local::now(), 120).unwrap();

        let script = r#"i=0; while [ $i -lt 6 ]; do
            printf '03-14 09:26:53.123  1234  5678 I ActivityManager: padding padding\n'
            i=$((i+1))
        done; sleep 60"#;
        let harness = spawn_worker(script, FilterCriteria::new(), true, Some(writer));

        let snapshot = snapshot_when(&harness, |s| s.counters.lines_received >= 6).await;
        assert!(snapshot.archive_part_index >= 2, "rotation should have happened");
        assert!(snapshot.current_archive_file.is_some());

        let events = stop(harness).await;
        assert!(events
            .iter()
            .any(|e| matches!(e, MonitorEvent::ArchiveRotated { part_index: 2, .. })));

        // Concatenated parts hold every raw line.
        let mut parts: Vec<_> = std::fs::read_dir(temp.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        parts.sort();
        let mut combined = String::new();
        for part in parts {
            combined.push_str(&std::fs::read_to_string(part).unwrap());
        }
        assert_eq!(combined.lines().count(), 6);
        assert!(combined
            .lines()
            .all(|l| l == "03-14 09:26:53.123  1234  5678 I ActivityManager: padding padding"));
    }
}
