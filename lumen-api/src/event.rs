//! Launcher events emitted by the kernel to subscribers (the view layer).

use serde::{Deserialize, Serialize};

/// Events emitted by the launcher kernel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LauncherEvent {
    /// Visible state changed; the view should re-render from the stack top.
    Redraw,

    /// A resolved command was handed to the executor.
    CommandExecuted { command: String },

    /// A navigation level was pushed.
    LevelPushed { depth: usize },

    /// A navigation level was popped; `depth` is the depth after the pop
    /// (0 means the base level is active again).
    LevelPopped { depth: usize },

    /// A feedback evaluation finished (completed, failed, or timed out).
    FeedbackFinished { timed_out: bool },

    /// The launcher should close.
    Closed,
}
