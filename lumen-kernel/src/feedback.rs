//! Feedback process manager - one cancellable external evaluation at a time.
//!
//! Lifecycle: `Idle -> Running -> {Completed | TimedOut | Killed}`. The
//! manager owns at most one child process; the owning level must tear it
//! down before being destroyed so no process is ever left running without
//! an owner.

use std::io::Read;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::time::{Duration, Instant};

use nix::fcntl::{fcntl, FcntlArg, OFlag};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;

use lumen_api::FeedbackEntry;

use crate::nav::NavLevel;
use crate::template;

const LOADING_FRAMES: [&str; 3] = [".", "..", "..."];

/// Outcome of a completion poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Idle,
    Running,
    Completed,
}

struct RunningProcess {
    child: Child,
    stdout: ChildStdout,
    buf: Vec<u8>,
    started: Instant,
}

/// Owns the single in-flight feedback evaluation.
#[derive(Default)]
pub struct FeedbackManager {
    process: Option<RunningProcess>,
    loading_frame: usize,
}

fn is_loading_indicator(content: &str) -> bool {
    LOADING_FRAMES.contains(&content)
}

/// Remove the loading placeholder if it is still the newest entry.
fn remove_placeholder(level: &mut NavLevel) {
    if level
        .transcript
        .first()
        .is_some_and(|e| !e.is_user && is_loading_indicator(&e.content))
    {
        level.transcript.remove(0);
    }
}

/// Evict oldest entries until the transcript fits the level's limit.
fn trim_transcript(level: &mut NavLevel) {
    level.transcript.truncate(level.history_limit);
}

impl FeedbackManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.process.is_some()
    }

    /// The child's stdout pipe, for readiness polling.
    pub fn pipe_fd(&self) -> Option<BorrowedFd<'_>> {
        self.process.as_ref().map(|p| p.stdout.as_fd())
    }

    /// Time elapsed since the current evaluation was spawned.
    pub fn elapsed(&self, now: Instant) -> Option<Duration> {
        self.process
            .as_ref()
            .map(|p| now.saturating_duration_since(p.started))
    }

    /// Spawn an evaluation for the level's current input.
    ///
    /// A no-op when a process is already active or the input is empty. On
    /// success the user entry (if configured) and the loading placeholder
    /// are appended and the input buffer is cleared.
    pub fn spawn(&mut self, level: &mut NavLevel) -> bool {
        if self.process.is_some() || level.input.is_empty() {
            return false;
        }

        let mut dict = level.dict.clone();
        dict.set("input", level.input.as_str());
        let cmd = template::resolve(&level.eval_cmd, &dict);

        let mut child = match Command::new("sh")
            .arg("-c")
            .arg(&cmd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                tracing::warn!("failed to spawn feedback process: {}", e);
                return false;
            }
        };

        let Some(stdout) = child.stdout.take() else {
            tracing::warn!("feedback process has no stdout pipe");
            let _ = child.kill();
            let _ = child.wait();
            return false;
        };

        if let Err(e) = set_nonblocking(stdout.as_raw_fd()) {
            tracing::warn!("failed to set feedback pipe non-blocking: {}", e);
            let _ = child.kill();
            let _ = child.wait();
            return false;
        }

        if level.show_input && !level.display_input.is_empty() {
            let formatted = template::resolve(&level.display_input, &dict);
            level.transcript.insert(0, FeedbackEntry::user(formatted));
        }
        level
            .transcript
            .insert(0, FeedbackEntry::response(LOADING_FRAMES[0]));
        self.loading_frame = 0;

        level.input.clear();
        level.loading = true;

        self.process = Some(RunningProcess {
            child,
            stdout,
            buf: Vec::new(),
            started: Instant::now(),
        });
        true
    }

    /// Non-blocking completion check.
    ///
    /// Reads whatever output is available; once the pipe reaches EOF the
    /// child is reaped, the placeholder is replaced with the formatted
    /// response (or an error marker), and the transcript is trimmed.
    pub fn poll_for_completion(&mut self, level: &mut NavLevel) -> PollOutcome {
        let Some(mut process) = self.process.take() else {
            return PollOutcome::Idle;
        };

        let mut chunk = [0u8; 4096];
        loop {
            match process.stdout.read(&mut chunk) {
                Ok(0) => break, // EOF - peer closed
                Ok(n) => process.buf.extend_from_slice(&chunk[..n]),
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    self.process = Some(process);
                    return PollOutcome::Running;
                }
                Err(e) => {
                    tracing::debug!("feedback pipe read error: {}", e);
                    break;
                }
            }
        }

        let _ = process.child.wait();

        let mut output = String::from_utf8_lossy(&process.buf).to_string();
        while output.ends_with('\n') || output.ends_with('\r') {
            output.pop();
        }

        remove_placeholder(level);
        level.loading = false;

        let entry = if output.is_empty() {
            FeedbackEntry::response("Error: no output")
        } else if level.display_result.is_empty() {
            FeedbackEntry::response(output)
        } else {
            let mut dict = level.dict.clone();
            dict.set("result", &output);
            FeedbackEntry::response(template::resolve(&level.display_result, &dict))
        };
        level.transcript.insert(0, entry);
        trim_transcript(level);

        PollOutcome::Completed
    }

    /// Kill the evaluation if it has exceeded `timeout`.
    pub fn check_timeout(&mut self, now: Instant, timeout: Duration, level: &mut NavLevel) -> bool {
        let Some(process) = self.process.as_ref() else {
            return false;
        };
        if now.saturating_duration_since(process.started) < timeout {
            return false;
        }

        tracing::warn!("feedback process timed out, killing");
        self.kill_and_reap();

        remove_placeholder(level);
        level.loading = false;
        level
            .transcript
            .insert(0, FeedbackEntry::response("Error: timeout"));
        trim_transcript(level);
        true
    }

    /// Advance the loading indicator while the placeholder is still the
    /// newest entry. Stops animating once a real response replaced it.
    pub fn animate(&mut self, level: &mut NavLevel) -> bool {
        if self.process.is_none() {
            return false;
        }
        let Some(first) = level.transcript.first_mut() else {
            return false;
        };
        if first.is_user || !is_loading_indicator(&first.content) {
            return false;
        }

        self.loading_frame = (self.loading_frame + 1) % LOADING_FRAMES.len();
        first.content = LOADING_FRAMES[self.loading_frame].to_string();
        true
    }

    /// Forced teardown: kill and reap any in-flight process.
    ///
    /// Called when the owning level is popped mid-flight, before the level
    /// is destroyed, so no dangling output can be applied later.
    pub fn abort(&mut self) {
        if self.process.is_some() {
            tracing::debug!("aborting in-flight feedback process");
            self.kill_and_reap();
        }
    }

    fn kill_and_reap(&mut self) {
        if let Some(mut process) = self.process.take() {
            let pid = Pid::from_raw(process.child.id() as i32);
            if let Err(e) = kill(pid, Signal::SIGKILL) {
                tracing::debug!("failed to kill feedback process: {}", e);
            }
            let _ = process.child.wait();
        }
    }
}

impl Drop for FeedbackManager {
    fn drop(&mut self) {
        self.kill_and_reap();
    }
}

fn set_nonblocking(fd: i32) -> nix::Result<()> {
    let flags = fcntl(fd, FcntlArg::F_GETFL)?;
    let mut flags = OFlag::from_bits_truncate(flags);
    flags.insert(OFlag::O_NONBLOCK);
    fcntl(fd, FcntlArg::F_SETFL(flags))?;
    Ok(())
}
