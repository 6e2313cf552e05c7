//! Streaming logcat process management

use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot, Notify};
use tokio::time::timeout;

use ivimon_core::prelude::*;

/// Grace period between asking logcat to stop and force-killing it
pub const GRACEFUL_STOP_TIMEOUT: Duration = Duration::from_secs(3);

/// Extra wait after a force kill before the process is declared stuck
const KILL_WAIT_TIMEOUT: Duration = Duration::from_secs(1);

/// Capacity of the raw stream channel between the readers and the consumer
pub const STREAM_CHANNEL_CAPACITY: usize = 1024;

/// Raw output of a streaming logcat process
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// One line of stdout, newline (and trailing `\r`) stripped
    Line(String),
    /// One line of stderr
    Stderr(String),
    /// Process exited; `code` is `None` when it died to a signal
    Exited { code: Option<i32> },
}

/// Build the streaming command: `adb -s <serial> logcat -v threadtime`
///
/// [`LogcatProcess::spawn`] configures stdio itself, so the returned command
/// only carries the program and arguments.
pub fn logcat_command(adb_path: &str, serial: &str) -> Command {
    let mut cmd = Command::new(adb_path);
    cmd.args(["-s", serial, "logcat", "-v", "threadtime"]);
    cmd
}

/// Manages a streaming logcat child process.
///
/// The `Child` handle is moved into a dedicated `wait_for_exit` background
/// task that calls `child.wait()`, so the real exit code is captured and
/// emitted as `StreamEvent::Exited { code: Some(N) }` rather than always
/// `None`.
///
/// `LogcatProcess` retains a kill channel ([`kill_tx`]) to request a
/// force-kill, an atomic flag ([`exited`]) for synchronous `has_exited()`
/// checks, and a [`Notify`] handle so `shutdown()` can await exit without
/// holding a lock across `.await`.
pub struct LogcatProcess {
    /// Process ID for signalling and logging
    pid: Option<u32>,
    /// Asks the wait task to kill the child; gone after the first use
    kill_tx: Option<oneshot::Sender<()>>,
    /// Flipped by the wait task once the child is reaped
    exited: Arc<AtomicBool>,
    /// Fired by the wait task right after `exited` flips
    exit_notify: Arc<Notify>,
}

impl LogcatProcess {
    /// Spawn the streaming process and wire its output into `event_tx`
    ///
    /// Stdio is configured here: stdin null, stdout/stderr piped to reader
    /// tasks, `kill_on_drop` as the final cleanup net.
    pub fn spawn(mut command: Command, event_tx: mpsc::Sender<StreamEvent>) -> Result<Self> {
        let program = command
            .as_std()
            .get_program()
            .to_string_lossy()
            .into_owned();

        let mut child = command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => Error::adb_not_found(program),
                _ => Error::spawn(e.to_string()),
            })?;

        let pid = child.id();
        info!("logcat process started with PID: {:?}", pid);

        let stdout = child.stdout.take().expect("stdout was configured");
        tokio::spawn(Self::stdout_reader(stdout, event_tx.clone()));

        let stderr = child.stderr.take().expect("stderr was configured");
        tokio::spawn(Self::stderr_reader(stderr, event_tx.clone()));

        // Exit state shared with the wait task
        let exited = Arc::new(AtomicBool::new(false));
        let exit_notify = Arc::new(Notify::new());

        // Kill channel: LogcatProcess holds the sender, wait task the receiver.
        let (kill_tx, kill_rx) = oneshot::channel::<()>();

        // The wait task takes ownership of `child`.
        tokio::spawn(Self::wait_for_exit(
            child,
            kill_rx,
            event_tx,
            Arc::clone(&exited),
            Arc::clone(&exit_notify),
        ));

        Ok(Self {
            pid,
            kill_tx: Some(kill_tx),
            exited,
            exit_notify,
        })
    }

    /// Background task: owns `child`, waits for it to exit, emits `Exited`.
    ///
    /// Ends either when the process exits on its own (or to SIGTERM) and
    /// `child.wait()` resolves, or when `kill_rx` fires and the child is
    /// killed first, then reaped.
    async fn wait_for_exit(
        mut child: Child,
        kill_rx: oneshot::Receiver<()>,
        event_tx: mpsc::Sender<StreamEvent>,
        exited: Arc<AtomicBool>,
        exit_notify: Arc<Notify>,
    ) {
        let code: Option<i32> = tokio::select! {
            result = child.wait() => {
                match result {
                    Ok(status) => {
                        info!("logcat process exited with status: {:?}", status);
                        status.code()
                    }
                    Err(e) => {
                        error!("Error waiting for logcat process: {}", e);
                        None
                    }
                }
            }
            _ = kill_rx => {
                info!("Kill signal received, force-killing logcat process");
                if let Err(e) = child.kill().await {
                    error!("Failed to kill logcat process: {}", e);
                }
                match child.wait().await {
                    Ok(status) => {
                        info!("logcat process killed, exit status: {:?}", status);
                        status.code()
                    }
                    Err(e) => {
                        error!("Error waiting after kill: {}", e);
                        None
                    }
                }
            }
        };

        // Mark the process as exited and wake waiters before sending the
        // event, so `has_exited()` is true before consumers observe `Exited`.
        exited.store(true, Ordering::Release);
        exit_notify.notify_waiters();

        debug!("Sending StreamEvent::Exited {{ code: {:?} }}", code);
        let _ = event_tx.send(StreamEvent::Exited { code }).await;
    }

    /// Read lines from stdout and send as `StreamEvent::Line`.
    ///
    /// Does NOT emit `Exited`; that is the wait task's job, which captures
    /// the real exit code.
    async fn stdout_reader(stdout: tokio::process::ChildStdout, tx: mpsc::Sender<StreamEvent>) {
        let mut reader = BufReader::new(stdout);
        let mut buf = Vec::with_capacity(256);

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) => {
                    debug!("stdout read error: {}", e);
                    break;
                }
            }
            let line = lossy_line(&buf);
            trace!("stdout: {}", line);

            if tx.send(StreamEvent::Line(line)).await.is_err() {
                debug!("stream channel closed");
                break;
            }
        }

        debug!("stdout reader finished");
    }

    /// Read lines from stderr and send as `StreamEvent::Stderr`
    async fn stderr_reader(stderr: tokio::process::ChildStderr, tx: mpsc::Sender<StreamEvent>) {
        let mut reader = BufReader::new(stderr);
        let mut buf = Vec::with_capacity(256);

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) => {
                    debug!("stderr read error: {}", e);
                    break;
                }
            }
            let line = lossy_line(&buf);
            trace!("stderr: {}", line);

            if tx.send(StreamEvent::Stderr(line)).await.is_err() {
                debug!("stream channel closed");
                break;
            }
        }

        debug!("stderr reader finished");
    }

    /// Gracefully shut down the logcat process.
    ///
    /// 1. Early exit if the process is already dead (atomic check)
    /// 2. Deliver SIGTERM and wait up to `grace` via `exit_notify`
    /// 3. Force-kill and wait one more second if the signal was ignored
    ///
    /// Returns `Err(TerminationTimeout)` only if the process is still alive
    /// after all of that.
    pub async fn shutdown(&mut self, grace: Duration) -> Result<()> {
        // Fast path: already exited.
        if self.has_exited() {
            debug!("logcat process already exited, skipping shutdown");
            return Ok(());
        }

        info!("Stopping logcat stream (grace {:?})", grace);

        // Race-free pattern: create the `notified()` future BEFORE the
        // `has_exited()` check, so an exit that lands between the check and
        // the await cannot be missed.
        let exit_notify = Arc::clone(&self.exit_notify);
        let notified = exit_notify.notified();

        if !self.request_termination() {
            warn!("Graceful termination unavailable, force killing logcat");
            self.force_kill();
        }

        if self.has_exited() {
            return Ok(());
        }

        match timeout(grace, notified).await {
            Ok(()) => {
                debug!("logcat exited within the grace period");
                return Ok(());
            }
            Err(_) => {
                warn!("logcat did not stop within {:?}, force killing", grace);
            }
        }

        let exit_notify = Arc::clone(&self.exit_notify);
        let notified = exit_notify.notified();
        self.force_kill();

        if self.has_exited() {
            return Ok(());
        }

        match timeout(KILL_WAIT_TIMEOUT, notified).await {
            Ok(()) => Ok(()),
            Err(_) => Err(Error::TerminationTimeout {
                timeout_secs: KILL_WAIT_TIMEOUT.as_secs(),
            }),
        }
    }

    /// Ask the process to stop with SIGTERM.
    ///
    /// Returns `false` when the signal could not be delivered (no pid, the
    /// process is already gone, or a non-unix host).
    fn request_termination(&self) -> bool {
        #[cfg(unix)]
        {
            let Some(pid) = self.pid else { return false };
            match nix::sys::signal::kill(
                nix::unistd::Pid::from_raw(pid as i32),
                nix::sys::signal::Signal::SIGTERM,
            ) {
                Ok(()) => {
                    debug!("Sent SIGTERM to logcat (pid {})", pid);
                    true
                }
                Err(e) => {
                    debug!("SIGTERM delivery failed (pid {}): {}", pid, e);
                    false
                }
            }
        }
        #[cfg(not(unix))]
        {
            false
        }
    }

    /// Kill the child through the wait task's kill channel.
    ///
    /// The wait task runs `child.kill()` then `child.wait()`, so the OS reaps
    /// the process before `Exited` goes out.
    fn force_kill(&mut self) {
        if let Some(tx) = self.kill_tx.take() {
            // A send error only means the wait task already finished.
            let _ = tx.send(());
        }
    }

    /// Non-blocking check backed by the atomic flag set by the wait task
    pub fn has_exited(&self) -> bool {
        self.exited.load(Ordering::Acquire)
    }

    pub fn is_running(&self) -> bool {
        !self.has_exited()
    }

    /// Get the process ID
    pub fn id(&self) -> Option<u32> {
        self.pid
    }
}

/// Decode one raw line, replacing malformed byte sequences.
///
/// logcat payloads are not guaranteed to be valid UTF-8, and adb on some
/// hosts emits CRLF line endings; both the trailing newline and `\r` are
/// stripped.
fn lossy_line(buf: &[u8]) -> String {
    let mut line = String::from_utf8_lossy(buf).into_owned();
    if line.ends_with('\n') {
        line.pop();
    }
    if line.ends_with('\r') {
        line.pop();
    }
    line
}

impl Drop for LogcatProcess {
    fn drop(&mut self) {
        if !self.has_exited() {
            warn!("LogcatProcess dropped while the process may still be running");
            // shutdown() may have consumed kill_tx already; then there is
            // nothing left to signal.
            if let Some(tx) = self.kill_tx.take() {
                let _ = tx.send(());
            }
        }
        // The Child itself carries kill_on_drop(true) in case the wait task
        // never gets to act on the signal.
        debug!("LogcatProcess dropped");
    }
}
