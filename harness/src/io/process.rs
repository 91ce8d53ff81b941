//! Child process execution bounded in wall-clock time and in captured bytes.
//!
//! The child runs in its own process group so a timeout takes down anything it
//! backgrounded. Pipe readers report through a channel; once the child has been
//! reaped the harness waits at most [`DRAIN_GRACE`] for the pipes to close and
//! then leaves any reader still blocked behind.

use std::io::{ErrorKind, Read};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

/// How long pipes may stay open after the child is gone.
pub const DRAIN_GRACE: Duration = Duration::from_secs(2);

const READ_CHUNK: usize = 8192;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pipe {
    Stdout,
    Stderr,
}

enum PipeEvent {
    Bytes {
        pipe: Pipe,
        kept: Vec<u8>,
        dropped: usize,
    },
    Closed,
}

/// Bytes kept from one output stream, plus how many were discarded past the limit.
#[derive(Debug, Default)]
pub struct Capture {
    pub bytes: Vec<u8>,
    pub dropped: usize,
}

/// Result of one bounded child process run.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Capture,
    pub stderr: Capture,
    pub timed_out: bool,
    /// Set when a background process still held the pipes after the grace period.
    pub detached: bool,
}

impl CommandOutput {
    fn capture_mut(&mut self, pipe: Pipe) -> &mut Capture {
        match pipe {
            Pipe::Stdout => &mut self.stdout,
            Pipe::Stderr => &mut self.stderr,
        }
    }

    /// Render both streams as a log document with truncation and timeout notes.
    pub fn render_log(&self, label: &str) -> String {
        let mut buf = String::new();
        for (name, capture) in [("stdout", &self.stdout), ("stderr", &self.stderr)] {
            buf.push_str(&format!("=== {name} ===\n"));
            buf.push_str(&String::from_utf8_lossy(&capture.bytes));
            buf.push('\n');
            if capture.dropped > 0 {
                buf.push_str(&format!(
                    "[{label} {name} truncated {} bytes]\n",
                    capture.dropped
                ));
            }
        }
        if self.timed_out {
            buf.push_str(&format!("[{label} timed out]\n"));
        }
        if self.detached {
            buf.push_str(&format!(
                "[{label} output still held open by background processes; capture stopped]\n"
            ));
        }
        buf
    }
}

/// Run `cmd` with stdin closed, killing its whole process group after `timeout`.
///
/// The call returns within roughly `timeout + DRAIN_GRACE` even when the child
/// leaves background processes attached to its stdout or stderr. Each stream
/// keeps at most `output_limit_bytes`; the rest is drained and counted.
#[instrument(skip_all, fields(timeout_secs = timeout.as_secs(), output_limit_bytes))]
pub fn run_command_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    output_limit_bytes: usize,
) -> Result<CommandOutput> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    own_process_group(&mut cmd);

    debug!("spawning child process");
    let mut child = cmd
        .spawn()
        .inspect_err(|e| error!(err = %e, "failed to spawn command"))
        .context("spawn command")?;

    let (events_tx, events) = mpsc::channel();
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;
    spawn_reader(Pipe::Stdout, stdout, output_limit_bytes, events_tx.clone());
    spawn_reader(Pipe::Stderr, stderr, output_limit_bytes, events_tx);

    let (status, timed_out) = match child.wait_timeout(timeout).context("wait for command")? {
        Some(status) => (status, false),
        None => {
            warn!(
                timeout_secs = timeout.as_secs(),
                "command timed out, killing its process group"
            );
            terminate(&mut child);
            (child.wait().context("wait command after kill")?, true)
        }
    };

    let mut output = CommandOutput {
        status,
        stdout: Capture::default(),
        stderr: Capture::default(),
        timed_out,
        detached: false,
    };
    output.detached = !collect(&events, &mut output, Instant::now() + DRAIN_GRACE);

    if output.detached {
        warn!(
            grace_ms = DRAIN_GRACE.as_millis() as u64,
            "output pipes still open after the command exited, no longer reading them"
        );
    }
    if output.stdout.dropped > 0 || output.stderr.dropped > 0 {
        warn!(
            stdout_dropped = output.stdout.dropped,
            stderr_dropped = output.stderr.dropped,
            "output truncated"
        );
    }
    debug!(exit_code = ?output.status.code(), timed_out, "command finished");
    Ok(output)
}

#[cfg(unix)]
fn own_process_group(cmd: &mut Command) {
    use std::os::unix::process::CommandExt;
    cmd.process_group(0);
}

#[cfg(not(unix))]
fn own_process_group(_cmd: &mut Command) {}

/// Kill the child's process group, falling back to the child alone.
fn terminate(child: &mut Child) {
    #[cfg(unix)]
    {
        let group = format!("-{}", child.id());
        match Command::new("kill")
            .args(["-KILL", "--", &group])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
        {
            Ok(status) if status.success() => return,
            Ok(status) => debug!(?status, "process group kill failed"),
            Err(e) => debug!(err = %e, "kill binary unavailable"),
        }
    }
    if let Err(e) = child.kill() {
        debug!(err = %e, "kill child");
    }
}

fn spawn_reader<R>(pipe: Pipe, mut source: R, limit: usize, events: Sender<PipeEvent>)
where
    R: Read + Send + 'static,
{
    // Never joined: a reader blocked on a pipe held by a grandchild is left behind.
    thread::spawn(move || {
        let mut kept_total = 0usize;
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            let n = match source.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    debug!(?pipe, err = %e, "pipe read failed");
                    break;
                }
            };
            let keep = n.min(limit.saturating_sub(kept_total));
            kept_total += keep;
            let event = PipeEvent::Bytes {
                pipe,
                kept: chunk[..keep].to_vec(),
                dropped: n - keep,
            };
            if events.send(event).is_err() {
                return;
            }
        }
        let _ = events.send(PipeEvent::Closed);
    });
}

/// Fold reader events into `output` until both pipes close or `deadline` passes.
/// Returns false when the deadline cut collection short.
fn collect(events: &Receiver<PipeEvent>, output: &mut CommandOutput, deadline: Instant) -> bool {
    let mut open = 2;
    while open > 0 {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match events.recv_timeout(remaining) {
            Ok(PipeEvent::Bytes {
                pipe,
                kept,
                dropped,
            }) => {
                let capture = output.capture_mut(pipe);
                capture.bytes.extend_from_slice(&kept);
                capture.dropped += dropped;
            }
            Ok(PipeEvent::Closed) => open -= 1,
            Err(RecvTimeoutError::Timeout) => return false,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    true
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    #[test]
    fn captures_output_and_truncates_beyond_limit() {
        let cmd = sh("printf 'abcdefgh'; printf 'err' >&2");
        let output = run_command_with_timeout(cmd, Duration::from_secs(10), 4).expect("run");
        assert!(output.status.success());
        assert_eq!(output.stdout.bytes, b"abcd");
        assert_eq!(output.stdout.dropped, 4);
        assert_eq!(output.stderr.bytes, b"err");
        assert!(!output.timed_out);
        assert!(!output.detached);

        let log = output.render_log("script");
        assert!(log.contains("[script stdout truncated 4 bytes]"));
        assert!(!log.contains("stderr truncated"));
    }

    #[test]
    fn kills_commands_that_exceed_the_timeout() {
        let output =
            run_command_with_timeout(sh("exec sleep 5"), Duration::from_millis(200), 1000)
                .expect("run");
        assert!(output.timed_out);
        assert!(!output.status.success());
        assert!(output.render_log("script").contains("[script timed out]"));
    }

    #[test]
    fn backgrounded_child_does_not_hold_up_a_finished_script() {
        let started = Instant::now();
        let output = run_command_with_timeout(
            sh("echo started; sleep 8 & exit 0"),
            Duration::from_secs(1),
            1000,
        )
        .expect("run");

        assert!(started.elapsed() < Duration::from_secs(6));
        assert!(output.status.success());
        assert!(!output.timed_out);
        assert!(output.detached);
        assert_eq!(output.stdout.bytes, b"started\n");
    }

    #[test]
    fn timeout_kills_background_children_too() {
        let started = Instant::now();
        let output = run_command_with_timeout(
            sh("sleep 8 & sleep 30"),
            Duration::from_secs(1),
            1000,
        )
        .expect("run");

        assert!(started.elapsed() < Duration::from_secs(6));
        assert!(output.timed_out);
        assert!(!output.status.success());
    }
}
