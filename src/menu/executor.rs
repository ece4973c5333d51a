//! Runs resolved actions and turns every outcome into a displayable result.
//!
//! Nothing here returns an error: spawn failures, non-zero exits, timeouts and
//! failed stat lookups all become an [`ExecutionResult`] with
//! `succeeded == false`, so the control loop can always render something.

#![allow(missing_docs)]

use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, unbounded};
use serde::Serialize;

use crate::core::errors::PanelError;
use crate::hal::display::{Frame, Geometry, truncate_chars};
use crate::menu::resolver::{ResolvedAction, resolve};
use crate::stats::StatsSource;

/// Bytes kept from each output pipe; the display shows far less.
const MAX_CAPTURE_BYTES: usize = 64 * 1024;
const POLL_INTERVAL: Duration = Duration::from_millis(10);
/// How long to wait for pipe readers after the child is gone.
const READER_GRACE: Duration = Duration::from_millis(250);

/// Outcome of one action, already cut to the display geometry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionResult {
    pub output_text: String,
    pub succeeded: bool,
    pub error_message: Option<String>,
    #[serde(skip)]
    pub elapsed: Duration,
}

impl ExecutionResult {
    fn success(output: String, elapsed: Duration) -> Self {
        Self {
            output_text: output,
            succeeded: true,
            error_message: None,
            elapsed,
        }
    }

    fn failure(output: String, message: String, elapsed: Duration) -> Self {
        Self {
            output_text: output,
            succeeded: false,
            error_message: Some(message),
            elapsed,
        }
    }

    /// Render the output as a display frame.
    #[must_use]
    pub fn frame(&self, geometry: Geometry) -> Frame {
        Frame::text(geometry, &self.output_text)
    }
}

/// Executes shell commands and stat lookups.
#[derive(Clone)]
pub struct CommandExecutor {
    stats: Arc<dyn StatsSource>,
    timeout: Duration,
    geometry: Geometry,
}

impl std::fmt::Debug for CommandExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandExecutor")
            .field("timeout", &self.timeout)
            .field("geometry", &self.geometry)
            .finish_non_exhaustive()
    }
}

impl CommandExecutor {
    #[must_use]
    pub fn new(stats: Arc<dyn StatsSource>, timeout: Duration, geometry: Geometry) -> Self {
        Self {
            stats,
            timeout,
            geometry,
        }
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Resolve `raw` and execute it. Resolution failures become failed results.
    pub fn run(&self, raw: &str) -> ExecutionResult {
        match resolve(raw) {
            Ok(action) => self.execute(&action),
            Err(PanelError::UnknownStatMethod { name }) => {
                let message = format!("Unknown stat: {name}");
                self.fit(ExecutionResult::failure(
                    message.clone(),
                    message,
                    Duration::ZERO,
                ))
            }
            Err(err) => self.fit(ExecutionResult::failure(
                "Error".to_string(),
                err.to_string(),
                Duration::ZERO,
            )),
        }
    }

    pub fn execute(&self, action: &ResolvedAction) -> ExecutionResult {
        let result = match action {
            ResolvedAction::StatLookup(method) => {
                let started = Instant::now();
                match self.stats.stat(*method) {
                    Ok(value) => ExecutionResult::success(value, started.elapsed()),
                    Err(err) => ExecutionResult::failure(
                        method.fallback_text().to_string(),
                        err.to_string(),
                        started.elapsed(),
                    ),
                }
            }
            ResolvedAction::ShellCommand(command) => self.run_shell(command),
        };
        self.fit(result)
    }

    fn fit(&self, mut result: ExecutionResult) -> ExecutionResult {
        result.output_text = truncate_output(&result.output_text, self.geometry);
        result
    }

    fn run_shell(&self, command: &str) -> ExecutionResult {
        let started = Instant::now();
        let mut child = match spawn_shell(command) {
            Ok(child) => child,
            Err(err) => {
                return ExecutionResult::failure(
                    "Error".to_string(),
                    format!("failed to spawn shell: {err}"),
                    started.elapsed(),
                );
            }
        };

        let stdout = capture(child.stdout.take());
        let stderr = capture(child.stderr.take());

        let deadline = started.checked_add(self.timeout).unwrap_or(started);
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break Some(status),
                Ok(None) if Instant::now() >= deadline => {
                    kill_process_group(&mut child);
                    break None;
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(err) => {
                    kill_process_group(&mut child);
                    return ExecutionResult::failure(
                        "Error".to_string(),
                        format!("failed to wait for command: {err}"),
                        started.elapsed(),
                    );
                }
            }
        };

        let Some(status) = status else {
            return ExecutionResult::failure(
                "Timed out".to_string(),
                format!("timed out after {}s", self.timeout.as_secs_f64()),
                started.elapsed(),
            );
        };

        let stdout = collect(&stdout);
        let stderr = collect(&stderr);
        let elapsed = started.elapsed();
        let output = pick_output(&stdout, &stderr, status.success());
        if status.success() {
            ExecutionResult::success(output, elapsed)
        } else {
            ExecutionResult::failure(output, describe_status(status), elapsed)
        }
    }
}

fn spawn_shell(command: &str) -> std::io::Result<Child> {
    let mut cmd = Command::new("sh");
    cmd.arg("-c")
        .arg(command)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }
    cmd.spawn()
}

/// Read a pipe on a helper thread so a chatty child never blocks on a full
/// pipe while we poll it. Chunks are forwarded as they arrive.
fn capture<R: Read + Send + 'static>(pipe: Option<R>) -> Receiver<Vec<u8>> {
    let (tx, rx) = unbounded();
    if let Some(mut pipe) = pipe {
        let spawned = thread::Builder::new()
            .name("lcdc-capture".to_string())
            .spawn(move || {
                let mut remaining = MAX_CAPTURE_BYTES;
                let mut chunk = [0_u8; 4096];
                while let Ok(n) = pipe.read(&mut chunk) {
                    if n == 0 {
                        break;
                    }
                    let keep = n.min(remaining);
                    remaining -= keep;
                    if keep > 0 && tx.send(chunk[..keep].to_vec()).is_err() {
                        break;
                    }
                }
            });
        if spawned.is_err() {
            eprintln!("[LCDC-EXEC] warning: could not spawn output reader thread");
        }
    }
    rx
}

/// Gather captured output. A background grandchild may keep the pipe open,
/// so stop after a short grace period instead of waiting for EOF.
fn collect(rx: &Receiver<Vec<u8>>) -> String {
    let deadline = Instant::now() + READER_GRACE;
    let mut bytes = Vec::new();
    while let Ok(chunk) = rx.recv_deadline(deadline) {
        bytes.extend_from_slice(&chunk);
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

#[cfg(unix)]
fn kill_process_group(child: &mut Child) {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    if let Ok(pid) = i32::try_from(child.id()) {
        let _ = killpg(Pid::from_raw(pid), Signal::SIGKILL);
    }
    let _ = child.kill();
    let _ = child.wait();
}

#[cfg(not(unix))]
fn kill_process_group(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn describe_status(status: ExitStatus) -> String {
    if let Some(code) = status.code() {
        return format!("exit status {code}");
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return format!("terminated by signal {signal}");
        }
    }
    "terminated abnormally".to_string()
}

/// Trimmed stdout, else trimmed stderr, else a fixed status word.
fn pick_output(stdout: &str, stderr: &str, success: bool) -> String {
    let stdout = stdout.trim();
    if !stdout.is_empty() {
        return stdout.to_string();
    }
    let stderr = stderr.trim();
    if !stderr.is_empty() {
        return stderr.to_string();
    }
    if success { "Done." } else { "Error" }.to_string()
}

/// First `rows` lines, first `cols` characters of each. Never wraps.
#[must_use]
pub fn truncate_output(text: &str, geometry: Geometry) -> String {
    text.lines()
        .take(geometry.rows)
        .map(|line| truncate_chars(line, geometry.cols))
        .collect::<Vec<_>>()
        .join("\n")
}
