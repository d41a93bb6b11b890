//! Lumen Kernel - The launcher's navigation and action-resolution core.
//!
//! This crate contains the interaction engine, including:
//! - Value dictionary and template resolution
//! - Navigation stack (push/pop with per-level state restoration)
//! - Submit resolution (the action-definition state machine)
//! - Feedback process lifecycle (spawn/poll/timeout/animate)
//! - Debounced calculator
//! - Transcript persistence

pub mod calc;
pub mod config;
pub mod dict;
pub mod exec;
pub mod feedback;
pub mod filter;
pub mod history;
pub mod input;
pub mod listcmd;
pub mod nav;
pub mod plugin;
pub mod runtime;
pub mod submit;
pub mod template;

mod error;

pub use config::LauncherConfig;
pub use dict::ValueDict;
pub use error::LauncherError;
pub use nav::{LevelMode, NavLevel, NavStack};
pub use submit::Effect;

use std::os::fd::BorrowedFd;
use std::time::{Duration, Instant};

use lumen_api::{LauncherEvent, NavResult, Plugin};
use tokio::sync::broadcast;

use calc::Calculator;
use exec::Builtins;
use feedback::{FeedbackManager, PollOutcome};
use filter::SubsequenceMatcher;
use input::InputBuffer;
use plugin::PluginRegistry;
use runtime::Deadlines;

/// The launcher kernel - owns navigation state and resolves submissions.
///
/// The base level (the root result list) lives here rather than on the
/// stack, with its own cursor storage, so popping the last pushed level
/// restores the base exactly as it was left.
pub struct Kernel {
    config: LauncherConfig,
    stack: NavStack,
    registry: PluginRegistry,
    builtins: Builtins,
    feedback: FeedbackManager,
    calc: Calculator,
    matcher: SubsequenceMatcher,
    event_tx: broadcast::Sender<LauncherEvent>,

    base_dict: ValueDict,
    base_input: InputBuffer,
    base_results: Vec<NavResult>,
    base_backup: Vec<NavResult>,
    base_selection: usize,
    base_first_result: usize,

    /// Next loading-animation frame deadline while a feedback evaluation
    /// is in flight.
    next_frame: Option<Instant>,
}

impl Kernel {
    /// Create a new kernel with an event broadcast channel.
    pub fn new(config: LauncherConfig) -> (Self, broadcast::Receiver<LauncherEvent>) {
        let (event_tx, event_rx) = broadcast::channel(1024);

        let calc_prefix = (config.show_display_prefixes && !config.calc_display_prefix.is_empty())
            .then(|| config.calc_display_prefix.clone());
        let calc = Calculator::new(config.calc_debounce(), 10, calc_prefix);
        let kernel = Self {
            config,
            stack: NavStack::new(),
            registry: PluginRegistry::new(),
            builtins: Builtins::new(),
            feedback: FeedbackManager::new(),
            calc,
            matcher: SubsequenceMatcher,
            event_tx,
            base_dict: ValueDict::new(),
            base_input: InputBuffer::new(),
            base_results: Vec::new(),
            base_backup: Vec::new(),
            base_selection: 0,
            base_first_result: 0,
            next_frame: None,
        };
        (kernel, event_rx)
    }

    pub fn config(&self) -> &LauncherConfig {
        &self.config
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    /// Register a parsed plugin definition.
    pub fn register_plugin(&mut self, plugin: Plugin) {
        self.registry.register(plugin);
    }

    /// Apply a comma-separated plugin enable filter (`apps,-windows,all`).
    pub fn apply_plugin_filter(&mut self, filter: &str) {
        self.registry.apply_filter(filter);
    }

    /// Register an in-process handler for `@name ...` commands.
    pub fn register_builtin(&mut self, name: impl Into<String>, handler: exec::BuiltinFn) {
        self.builtins.register(name, handler);
    }

    /// Subscribe to launcher events.
    pub fn subscribe(&self) -> broadcast::Receiver<LauncherEvent> {
        self.event_tx.subscribe()
    }

    /// Emit a launcher event.
    pub fn emit(&self, event: LauncherEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Rebuild the base result list from the plugin registry.
    ///
    /// Runs every enabled plugin's provider command, so this is called at
    /// startup and on explicit refresh, never per keystroke.
    pub fn refresh_base(&mut self) {
        let mut results = self.registry.populate_base_results();

        if self.config.show_display_prefixes {
            for result in &mut results {
                let prefix = self
                    .registry
                    .get(&result.source_plugin)
                    .map(|p| p.display_prefix.as_str())
                    .unwrap_or("");
                if !prefix.is_empty() {
                    result.label = format!("{} > {}", prefix, result.label);
                }
            }
        }

        self.base_backup = results;
        self.refilter_base();
        self.emit(LauncherEvent::Redraw);
    }

    /// True when no level is pushed and the base list is showing.
    pub fn is_base_active(&self) -> bool {
        self.stack.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.stack.depth()
    }

    pub fn stack(&self) -> &NavStack {
        &self.stack
    }

    /// The base level's dict, target of `Return` chains that unwind the
    /// whole stack.
    pub fn base_dict(&self) -> &ValueDict {
        &self.base_dict
    }

    /// Prompt for the active level.
    pub fn prompt(&self) -> &str {
        match self.stack.current() {
            Some(level) => &level.display_prompt,
            None => &self.config.base_prompt,
        }
    }

    /// Input text of the active level.
    pub fn input_text(&self) -> &str {
        match self.stack.current() {
            Some(level) => level.input.as_str(),
            None => self.base_input.as_str(),
        }
    }

    /// Displayed results of the active level.
    pub fn visible_results(&self) -> &[NavResult] {
        match self.stack.current() {
            Some(level) => &level.results,
            None => &self.base_results,
        }
    }

    pub fn selection(&self) -> usize {
        match self.stack.current() {
            Some(level) => level.selection,
            None => self.base_selection,
        }
    }

    /// Calculator display lines, newest first. Empty unless the base input
    /// is in expression mode.
    pub fn calc_lines(&self) -> Vec<String> {
        if self.is_base_active() && self.calc_expression().is_some() {
            self.calc.result_lines()
        } else {
            Vec::new()
        }
    }

    // ---- input editing ----

    pub fn insert_char(&mut self, ch: char) {
        self.active_input_mut().insert(ch);
        self.after_input_change();
    }

    pub fn delete_back(&mut self) {
        self.active_input_mut().delete_back();
        self.after_input_change();
    }

    pub fn delete_word(&mut self) {
        self.active_input_mut().delete_word();
        self.after_input_change();
    }

    pub fn clear_input(&mut self) {
        self.active_input_mut().clear();
        self.after_input_change();
    }

    pub fn cursor_left(&mut self) {
        self.active_input_mut().cursor_left();
        self.emit(LauncherEvent::Redraw);
    }

    pub fn cursor_right(&mut self) {
        self.active_input_mut().cursor_right();
        self.emit(LauncherEvent::Redraw);
    }

    // ---- selection movement ----

    pub fn select_next(&mut self) {
        let len = self.visible_results().len();
        if len == 0 {
            return;
        }
        match self.stack.current_mut() {
            Some(level) => level.selection = (level.selection + 1).min(len - 1),
            None => self.base_selection = (self.base_selection + 1).min(len - 1),
        }
        self.emit(LauncherEvent::Redraw);
    }

    pub fn select_previous(&mut self) {
        match self.stack.current_mut() {
            Some(level) => level.selection = level.selection.saturating_sub(1),
            None => self.base_selection = self.base_selection.saturating_sub(1),
        }
        self.emit(LauncherEvent::Redraw);
    }

    // ---- submission and navigation ----

    /// Resolve a submit on the active level and apply its effect.
    pub fn submit(&mut self) -> Effect {
        if self.is_base_active() {
            if self.calc_expression().is_some() {
                // Expression mode: settle the pending evaluation instead of
                // running a command.
                let cmd = self.config.calc_command.clone();
                self.calc
                    .force_update(|expr| calc::evaluate_expression(&cmd, expr));
                self.emit(LauncherEvent::Redraw);
                return Effect::NoOp;
            }

            let Some(result) = self
                .base_results
                .get(self.base_first_result + self.base_selection)
                .cloned()
            else {
                return Effect::NoOp;
            };
            let effect = self.resolve_base(&result);
            self.apply_effect(effect)
        } else {
            let history_dir = self.config.history_dir();
            let feedback = &mut self.feedback;
            let mut on_pop = |level: &mut NavLevel| {
                teardown_level(level, feedback, &history_dir);
            };
            let ctx = submit::SubmitCtx {
                registry: &self.registry,
                history_dir: &history_dir,
            };
            let effect =
                submit::submit_current(&mut self.stack, &mut self.base_dict, &ctx, &mut on_pop);
            self.apply_effect(effect)
        }
    }

    fn resolve_base(&mut self, result: &NavResult) -> Effect {
        let history_dir = self.config.history_dir();
        let feedback = &mut self.feedback;
        let mut on_pop = |level: &mut NavLevel| {
            teardown_level(level, feedback, &history_dir);
        };
        let ctx = submit::SubmitCtx {
            registry: &self.registry,
            history_dir: &history_dir,
        };
        submit::apply_result(
            &mut self.stack,
            &mut self.base_dict,
            result,
            &ctx,
            &mut on_pop,
        )
    }

    fn apply_effect(&mut self, effect: Effect) -> Effect {
        match &effect {
            Effect::RunCommand { cmd, dict } => {
                if Builtins::is_builtin(cmd) {
                    self.builtins.execute(cmd, dict);
                    self.emit(LauncherEvent::CommandExecuted {
                        command: cmd.clone(),
                    });
                    self.emit(LauncherEvent::Redraw);
                } else {
                    exec::run_detached(cmd);
                    self.emit(LauncherEvent::CommandExecuted {
                        command: cmd.clone(),
                    });
                    self.emit(LauncherEvent::Closed);
                }
            }
            Effect::Pushed => {
                self.emit(LauncherEvent::LevelPushed {
                    depth: self.stack.depth(),
                });
                self.emit(LauncherEvent::Redraw);
            }
            Effect::Popped => {
                self.emit(LauncherEvent::LevelPopped {
                    depth: self.stack.depth(),
                });
                self.emit(LauncherEvent::Redraw);
            }
            Effect::SpawnFeedback => {
                if let Some(level) = self.stack.current_mut() {
                    if self.feedback.spawn(level) {
                        self.next_frame = Some(Instant::now() + self.frame_interval());
                        self.emit(LauncherEvent::Redraw);
                    }
                }
            }
            Effect::NoOp => {}
        }
        effect
    }

    /// Pop the active level (escape/back). At the base, requests close.
    pub fn back(&mut self) {
        match self.stack.pop() {
            Some(mut level) => {
                let history_dir = self.config.history_dir();
                teardown_level(&mut level, &mut self.feedback, &history_dir);
                self.emit(LauncherEvent::LevelPopped {
                    depth: self.stack.depth(),
                });
                self.emit(LauncherEvent::Redraw);
            }
            None => self.emit(LauncherEvent::Closed),
        }
    }

    /// Persist every feedback transcript still on the stack. Called once
    /// at shutdown.
    pub fn shutdown(&mut self) {
        let history_dir = self.config.history_dir();
        self.feedback.abort();
        for level in self.stack.iter() {
            if level.mode == LevelMode::Feedback && level.persist_history {
                history::save(
                    &history_dir,
                    &level.history_name,
                    &level.transcript,
                    level.history_limit,
                );
            }
        }
    }

    // ---- cooperative deadlines and readiness ----

    /// Pending deadlines for the next poll cycle.
    pub fn deadlines(&self, now: Instant) -> Deadlines {
        let timeout = self.config.feedback_timeout();
        Deadlines {
            feedback_kill: self
                .feedback
                .elapsed(now)
                .map(|elapsed| now + timeout.saturating_sub(elapsed)),
            loading_frame: if self.feedback.is_active() {
                self.next_frame
            } else {
                None
            },
            calc_debounce: self.calc.deadline(),
        }
    }

    /// Fd to poll for subprocess output readability, if one is in flight.
    pub fn process_fd(&self) -> Option<BorrowedFd<'_>> {
        self.feedback.pipe_fd()
    }

    /// Handle expired deadlines. Called on every event-loop wake-up,
    /// including wake-ups caused purely by timeout expiry.
    pub fn tick(&mut self, now: Instant) {
        let timeout = self.config.feedback_timeout();
        if let Some(level) = self.stack.current_mut() {
            if level.mode == LevelMode::Feedback
                && self.feedback.check_timeout(now, timeout, level)
            {
                self.next_frame = None;
                self.emit(LauncherEvent::FeedbackFinished { timed_out: true });
                self.emit(LauncherEvent::Redraw);
            }
        }

        if self.next_frame.is_some_and(|frame| now >= frame) {
            if let Some(level) = self.stack.current_mut() {
                if self.feedback.animate(level) {
                    self.emit(LauncherEvent::Redraw);
                }
            }
            self.next_frame = if self.feedback.is_active() {
                Some(now + self.frame_interval())
            } else {
                None
            };
        }

        let cmd = self.config.calc_command.clone();
        if self
            .calc
            .update_if_ready(now, |expr| calc::evaluate_expression(&cmd, expr))
        {
            self.emit(LauncherEvent::Redraw);
        }
    }

    /// Drain subprocess output after the poll loop reported readability.
    pub fn on_process_readable(&mut self) {
        let Some(level) = self.stack.current_mut() else {
            return;
        };
        if level.mode != LevelMode::Feedback {
            return;
        }

        match self.feedback.poll_for_completion(level) {
            PollOutcome::Completed => {
                self.next_frame = None;
                self.emit(LauncherEvent::FeedbackFinished { timed_out: false });
                self.emit(LauncherEvent::Redraw);
            }
            PollOutcome::Running | PollOutcome::Idle => {}
        }
    }

    // ---- internals ----

    fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.config.loading_frame_ms)
    }

    fn active_input_mut(&mut self) -> &mut InputBuffer {
        match self.stack.current_mut() {
            Some(level) => &mut level.input,
            None => &mut self.base_input,
        }
    }

    /// The stripped expression when the base input is in expression mode.
    fn calc_expression(&self) -> Option<&str> {
        let text = self.base_input.as_str();
        let rest = text.strip_prefix(&self.config.calc_prefix)?;
        Some(rest.trim_start_matches(' '))
    }

    fn refilter_base(&mut self) {
        let kept = filter::filter_ranked(
            &self.matcher,
            self.base_input.as_str(),
            &self.base_backup,
            |r| r.label.as_str(),
        );
        self.base_results = kept
            .into_iter()
            .map(|i| self.base_backup[i].clone())
            .collect();
        self.base_selection = 0;
        self.base_first_result = 0;
    }

    fn after_input_change(&mut self) {
        if let Some(level) = self.stack.current_mut() {
            match level.mode {
                LevelMode::Select | LevelMode::Plugin => level.refilter(&self.matcher),
                // Input and Feedback levels have no list to filter.
                LevelMode::Input | LevelMode::Feedback => {}
            }
        } else {
            if let Some(expr) = self.calc_expression().map(str::to_string) {
                if expr.is_empty() {
                    // Back to a bare prefix: drop the pending evaluation
                    // and re-show the history.
                    self.calc.clear();
                } else {
                    self.calc.mark_dirty(&expr, Instant::now());
                }
            }
            self.refilter_base();
        }
        self.emit(LauncherEvent::Redraw);
    }
}

/// Persistence and process teardown for a level leaving the stack.
fn teardown_level(level: &mut NavLevel, feedback: &mut FeedbackManager, history_dir: &std::path::Path) {
    if level.mode != LevelMode::Feedback {
        return;
    }
    feedback.abort();
    if level.persist_history {
        history::save(
            history_dir,
            &level.history_name,
            &level.transcript,
            level.history_limit,
        );
    }
}
