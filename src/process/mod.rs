//! External process supervision
//!
//! This module handles:
//! - Spawning one process, or a pipeline of processes wired stdout → stdin
//! - Enforcing a wall-clock timeout with graceful-then-forced termination
//! - Capturing stdout lines when the caller needs to parse output
//! - Tracking spawned pids so an owner can kill exactly its own helpers
//!
//! Everything here blocks the calling thread. Callers that must stay
//! responsive run it on a worker thread.

mod tracker;

pub use tracker::{ProcessTracker, kill_leaked_by_name};

use std::fmt;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info, warn};

/// How often a waiting runner polls its children
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// How long a drained stdout may stay silent once the pipeline is gone
const READER_IDLE_TIMEOUT: Duration = Duration::from_millis(250);

/// Upper bound on draining stdout once the pipeline is gone
const READER_DRAIN_LIMIT: Duration = Duration::from_secs(5);

/// Default delay between the graceful stop signal and the forced kill
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(2);

/// Failures of the runner itself (not of the process it ran)
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to start '{program}': {reason}")]
    StartFailed { program: String, reason: String },

    #[error("interrupted while waiting for '{program}'")]
    Interrupted { program: String },

    #[error("failed while waiting for '{program}': {reason}")]
    WaitFailed { program: String, reason: String },

    #[error("no process to run")]
    EmptyPipeline,
}

/// What happens to the standard streams of the last pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Share the parent's stdio (only the exit status matters)
    Inherit,
    /// Pipe stdout back to the caller as lines
    Capture,
}

/// Which environment variables reach the child
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvPolicy {
    /// Child sees the full parent environment
    Inherit,
    /// Child starts from an empty environment plus the named parent variables
    AllowList(Vec<String>),
}

/// Bytes written to a child's stdin, kept out of `Debug` output
#[derive(Clone, PartialEq, Eq)]
struct StdinPayload(Vec<u8>);

impl fmt::Debug for StdinPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} bytes>", self.0.len())
    }
}

/// Description of one process to run
#[derive(Debug, Clone)]
pub struct ProcessSpec {
    program: String,
    args: Vec<String>,
    current_dir: Option<PathBuf>,
    env_policy: EnvPolicy,
    env: Vec<(String, String)>,
    output: OutputMode,
    redacted: bool,
    stdin: Option<StdinPayload>,
}

impl ProcessSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
            env_policy: EnvPolicy::Inherit,
            env: Vec::new(),
            output: OutputMode::Inherit,
            redacted: false,
            stdin: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Set an explicit variable on top of whatever the env policy passes through
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Start from an empty environment and copy only these parent variables
    pub fn pass_env<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.env_policy = EnvPolicy::AllowList(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn capture_stdout(mut self) -> Self {
        self.output = OutputMode::Capture;
        self
    }

    pub fn inherit_io(mut self) -> Self {
        self.output = OutputMode::Inherit;
        self
    }

    /// Feed `payload` to stdin, then close it; only the first pipeline
    /// stage reads it. Secrets go here rather than on the command line.
    pub fn stdin_payload(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(StdinPayload(payload.into()));
        self
    }

    /// Keep the arguments out of log lines
    pub fn redacted(mut self) -> Self {
        self.redacted = true;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    pub fn output_mode(&self) -> OutputMode {
        self.output
    }

    pub fn env_policy(&self) -> &EnvPolicy {
        &self.env_policy
    }

    /// Command line as it may appear in logs
    pub fn display(&self) -> String {
        if self.redacted {
            format!("{} <redacted>", self.program)
        } else if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(dir) = &self.current_dir {
            cmd.current_dir(dir);
        }
        if let EnvPolicy::AllowList(names) = &self.env_policy {
            cmd.env_clear();
            for name in names {
                if let Some(value) = std::env::var_os(name) {
                    cmd.env(name, value);
                }
            }
        }
        cmd.envs(self.env.iter().map(|(k, v)| (k, v)));
        cmd
    }
}

/// Result of a completed (or timed out) run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutcome {
    /// Exit code of the last stage; `None` when it died from a signal
    pub exit_code: Option<i32>,
    /// Whether the timeout fired and the pipeline was terminated
    pub timed_out: bool,
    /// Captured stdout of the last stage (empty in `Inherit` mode)
    pub stdout_lines: Vec<String>,
    /// Whether captured stdout was read to EOF; `false` when a process that
    /// outlived the pipeline kept the pipe open past the drain limit
    pub stdout_complete: bool,
}

impl ProcessOutcome {
    pub fn is_success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

/// Shared interruption flag
///
/// Raising it makes any runner waiting on a process abandon the wait,
/// terminate its children and return [`ProcessError::Interrupted`]. The
/// flag stays raised so that callers further up see the interruption too.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Runs processes with a timeout and escalating termination
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    timeout: Duration,
    grace_period: Duration,
    tracker: ProcessTracker,
    cancel: Option<CancelFlag>,
}

struct Stage {
    program: String,
    child: Child,
    status: Option<ExitStatus>,
}

impl ProcessRunner {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            grace_period: DEFAULT_GRACE_PERIOD,
            tracker: ProcessTracker::new(),
            cancel: None,
        }
    }

    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// Register every spawned pid with `tracker` (shared with the owner)
    pub fn with_tracker(mut self, tracker: ProcessTracker) -> Self {
        self.tracker = tracker;
        self
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn tracker(&self) -> &ProcessTracker {
        &self.tracker
    }

    /// Run a single process
    pub fn run(&self, spec: &ProcessSpec) -> Result<ProcessOutcome, ProcessError> {
        self.run_pipeline(std::slice::from_ref(spec))
    }

    /// Run `stages` connected stdout → stdin; the last stage's output mode
    /// decides whether stdout is captured
    pub fn run_pipeline(&self, stages: &[ProcessSpec]) -> Result<ProcessOutcome, ProcessError> {
        let Some(last) = stages.last() else {
            return Err(ProcessError::EmptyPipeline);
        };
        let capture = last.output_mode() == OutputMode::Capture;
        let description = stages
            .iter()
            .map(ProcessSpec::display)
            .collect::<Vec<_>>()
            .join(" | ");
        debug!(command = %description, timeout_ms = self.timeout.as_millis() as u64, "Spawning process");

        let (mut running, stdout_rx) = self.spawn_all(stages, capture)?;
        let timed_out = self.wait_all(&mut running, last.program())?;

        let exit_code = running
            .last()
            .and_then(|stage| stage.status)
            .and_then(|status| status.code());
        let (stdout_lines, stdout_complete) = match stdout_rx {
            Some(rx) => drain_lines(&rx, &description),
            None => (Vec::new(), true),
        };

        if timed_out {
            warn!(command = %description, "Process timed out and was terminated");
        } else {
            info!(command = %description, exit_code = ?exit_code, "Process finished");
        }

        Ok(ProcessOutcome {
            exit_code,
            timed_out,
            stdout_lines,
            stdout_complete,
        })
    }

    #[allow(clippy::type_complexity)]
    fn spawn_all(
        &self,
        stages: &[ProcessSpec],
        capture: bool,
    ) -> Result<(Vec<Stage>, Option<mpsc::Receiver<String>>), ProcessError> {
        let mut running: Vec<Stage> = Vec::with_capacity(stages.len());
        let mut upstream = None;
        let mut stdout_rx = None;

        for (index, spec) in stages.iter().enumerate() {
            let is_last = index + 1 == stages.len();
            let inherit = spec.output_mode() == OutputMode::Inherit;
            let mut cmd = spec.command();

            match upstream.take() {
                Some(stdout) => {
                    cmd.stdin(Stdio::from(stdout));
                }
                None if spec.stdin.is_some() => {
                    cmd.stdin(Stdio::piped());
                }
                None if inherit => {
                    cmd.stdin(Stdio::inherit());
                }
                None => {
                    cmd.stdin(Stdio::null());
                }
            }
            if !is_last || capture {
                cmd.stdout(Stdio::piped());
            } else {
                cmd.stdout(Stdio::inherit());
            }
            if inherit {
                cmd.stderr(Stdio::inherit());
            } else {
                cmd.stderr(Stdio::piped());
            }

            let mut child = match cmd.spawn() {
                Ok(child) => child,
                Err(e) => {
                    self.terminate(&mut running);
                    return Err(ProcessError::StartFailed {
                        program: spec.program().to_string(),
                        reason: e.to_string(),
                    });
                }
            };
            self.tracker.register(child.id());

            if let (Some(mut stdin), Some(payload)) = (child.stdin.take(), spec.stdin.clone()) {
                let program = spec.program().to_string();
                thread::spawn(move || {
                    if let Err(e) = stdin.write_all(&payload.0) {
                        debug!(program = %program, error = %e, "Failed to write stdin");
                    }
                });
            }
            if let Some(stderr) = child.stderr.take() {
                let program = spec.program().to_string();
                thread::spawn(move || log_stderr(&program, stderr));
            }
            if is_last {
                if capture {
                    stdout_rx = child.stdout.take().map(spawn_line_reader);
                }
            } else {
                upstream = child.stdout.take();
            }

            running.push(Stage {
                program: spec.program().to_string(),
                child,
                status: None,
            });
        }

        Ok((running, stdout_rx))
    }

    /// Poll until every stage exits, the deadline passes, or the cancel flag
    /// is raised. Returns whether the deadline fired.
    fn wait_all(&self, running: &mut [Stage], program: &str) -> Result<bool, ProcessError> {
        let deadline = Instant::now() + self.timeout;
        loop {
            let mut failure = None;
            for stage in running.iter_mut().filter(|s| s.status.is_none()) {
                match stage.child.try_wait() {
                    Ok(Some(status)) => {
                        self.tracker.unregister(stage.child.id());
                        stage.status = Some(status);
                    }
                    Ok(None) => {}
                    Err(e) => {
                        failure = Some((stage.program.clone(), e.to_string()));
                        break;
                    }
                }
            }
            if let Some((name, reason)) = failure {
                self.terminate(running);
                return Err(ProcessError::WaitFailed {
                    program: name,
                    reason,
                });
            }
            if running.iter().all(|s| s.status.is_some()) {
                return Ok(false);
            }
            if let Some(cancel) = &self.cancel {
                if cancel.is_raised() {
                    self.terminate(running);
                    cancel.raise();
                    return Err(ProcessError::Interrupted {
                        program: program.to_string(),
                    });
                }
            }
            if Instant::now() >= deadline {
                self.terminate(running);
                return Ok(true);
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    /// Graceful stop, grace period, then forced kill for every live stage
    fn terminate(&self, running: &mut [Stage]) {
        for stage in running.iter_mut().filter(|s| s.status.is_none()) {
            if !tracker::request_stop(stage.child.id()) {
                let _ = stage.child.kill();
            }
        }

        let grace_deadline = Instant::now() + self.grace_period;
        while Instant::now() < grace_deadline {
            let mut alive = false;
            for stage in running.iter_mut().filter(|s| s.status.is_none()) {
                match stage.child.try_wait() {
                    Ok(Some(status)) => stage.status = Some(status),
                    _ => alive = true,
                }
            }
            if !alive {
                break;
            }
            thread::sleep(POLL_INTERVAL);
        }

        for stage in running.iter_mut() {
            if stage.status.is_none() {
                warn!(program = %stage.program, pid = stage.child.id(), "Force killing process");
                let _ = stage.child.kill();
                stage.status = stage.child.wait().ok();
            }
            self.tracker.unregister(stage.child.id());
        }
    }
}

/// Forward lines as they are read; the stream is closed at EOF or as soon
/// as the receiving side has gone away
fn spawn_line_reader<R: Read + Send + 'static>(stream: R) -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in BufReader::new(stream)
            .lines()
            .map_while(std::result::Result::ok)
        {
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// Collect forwarded lines until the reader hits EOF, goes idle, or the
/// drain limit passes. Returns the lines and whether EOF was reached.
fn drain_lines(rx: &mpsc::Receiver<String>, description: &str) -> (Vec<String>, bool) {
    let limit = Instant::now() + READER_DRAIN_LIMIT;
    let mut lines = Vec::new();
    loop {
        let wait = limit
            .saturating_duration_since(Instant::now())
            .min(READER_IDLE_TIMEOUT);
        match rx.recv_timeout(wait) {
            Ok(line) => lines.push(line),
            Err(mpsc::RecvTimeoutError::Disconnected) => return (lines, true),
            Err(mpsc::RecvTimeoutError::Timeout) => {
                warn!(
                    command = %description,
                    lines = lines.len(),
                    "Stdout still open after the process exited, keeping partial output"
                );
                return (lines, false);
            }
        }
    }
}

fn log_stderr<R: Read>(program: &str, stream: R) {
    for line in BufReader::new(stream)
        .lines()
        .map_while(std::result::Result::ok)
    {
        debug!(program = %program, "stderr: {}", line);
    }
}
