//! Launcher configuration.
//!
//! Timing constants are policy, not architecture: both the calculator
//! debounce delay and the feedback timeout ceiling are configurable. The
//! single-in-flight-evaluation invariant is not.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Tunable kernel behavior. Loaded by the outer config layer; the kernel
/// only reads it.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LauncherConfig {
    /// Delay between the last calc keystroke and the evaluation.
    pub calc_debounce_ms: u64,

    /// Hard ceiling on a feedback evaluation before it is killed.
    pub feedback_timeout_ms: u64,

    /// Interval between loading-indicator animation frames.
    pub loading_frame_ms: u64,

    /// Whether base-list labels carry their plugin's display prefix.
    pub show_display_prefixes: bool,

    /// Input prefix that switches the base level into expression mode.
    pub calc_prefix: String,

    /// Prefix shown on calculator result lines.
    pub calc_display_prefix: String,

    /// Command used to evaluate calculator expressions.
    pub calc_command: String,

    /// Directory for persisted feedback transcripts. Defaults to
    /// `~/.config/lumen/history`.
    pub history_dir: Option<PathBuf>,

    /// Prompt shown on the base level.
    pub base_prompt: String,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            calc_debounce_ms: 400,
            feedback_timeout_ms: 3 * 60 * 1000,
            loading_frame_ms: 400,
            show_display_prefixes: true,
            calc_prefix: "=".to_string(),
            calc_display_prefix: "Calc".to_string(),
            calc_command: "qalc -t".to_string(),
            history_dir: None,
            base_prompt: "run: ".to_string(),
        }
    }
}

impl LauncherConfig {
    pub fn calc_debounce(&self) -> Duration {
        Duration::from_millis(self.calc_debounce_ms)
    }

    pub fn feedback_timeout(&self) -> Duration {
        Duration::from_millis(self.feedback_timeout_ms)
    }

    /// Resolve the history directory, falling back to the default location.
    pub fn history_dir(&self) -> PathBuf {
        self.history_dir.clone().unwrap_or_else(|| {
            dirs::config_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("lumen")
                .join("history")
        })
    }
}
