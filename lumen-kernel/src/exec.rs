//! Command execution boundary.
//!
//! Resolved templates are handed either to the fire-and-forget runner (the
//! render loop blocks during `Exec` actions) or to the captured-output
//! runner used by the list collaborator and the calculator. Feedback
//! evaluations use the async spawn/poll path in [`crate::feedback`].

use std::collections::HashMap;
use std::process::{Command, Stdio};

use crate::dict::ValueDict;

/// In-process command handler. Receives the text after the builtin name and
/// the dict of the submitting level.
pub type BuiltinFn = Box<dyn Fn(&str, &ValueDict) -> bool>;

/// Registry of `@`-prefixed in-process commands.
///
/// A resolved command starting with `@` dispatches here instead of the
/// shell; unknown builtins log and fail without crashing.
#[derive(Default)]
pub struct Builtins {
    handlers: HashMap<String, BuiltinFn>,
}

impl Builtins {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, handler: BuiltinFn) {
        self.handlers.insert(name.into(), handler);
    }

    pub fn is_builtin(cmd: &str) -> bool {
        cmd.starts_with('@')
    }

    /// Dispatch a `@name args...` command.
    pub fn execute(&self, cmd: &str, dict: &ValueDict) -> bool {
        let body = &cmd[1..];
        let (name, rest) = match body.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim_start()),
            None => (body, ""),
        };

        match self.handlers.get(name) {
            Some(handler) => handler(rest, dict),
            None => {
                tracing::warn!("unknown builtin command: @{}", name);
                false
            }
        }
    }
}

/// Run a resolved command to completion via the shell.
///
/// Exit status is fire-and-forget: logged, never retried, never propagated.
pub fn run_detached(cmd: &str) {
    tracing::debug!("executing: {}", cmd);

    match Command::new("sh").arg("-c").arg(cmd).status() {
        Ok(status) if !status.success() => {
            tracing::warn!("command failed ({}): {}", status, cmd);
        }
        Ok(_) => {}
        Err(e) => {
            tracing::warn!("failed to run command '{}': {}", cmd, e);
        }
    }
}

/// Run a command and capture its stdout, trimmed of trailing newlines.
///
/// Returns `None` for spawn failures, non-zero exits, or empty output.
pub fn capture_output(cmd: &str) -> Option<String> {
    let output = Command::new("sh")
        .arg("-c")
        .arg(cmd)
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .map_err(|e| {
            tracing::warn!("failed to run '{}': {}", cmd, e);
            e
        })
        .ok()?;

    if !output.status.success() {
        tracing::debug!("command exited {}: {}", output.status, cmd);
        return None;
    }

    let text = String::from_utf8_lossy(&output.stdout)
        .trim_end_matches(['\n', '\r'])
        .to_string();

    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}
