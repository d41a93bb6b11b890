//! Navigation levels and the navigation stack.

use lumen_api::{ActionDef, ExecMode, FeedbackEntry, ListFormat, NavResult};

use crate::dict::ValueDict;
use crate::filter::{filter_ranked, Matcher};
use crate::input::InputBuffer;

/// Which action variant a pushed level belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelMode {
    Input,
    Select,
    Plugin,
    Feedback,
}

/// One frame of the navigation stack.
///
/// A level exclusively owns its dict, result lists, transcript, and cursor
/// state. The backup list keeps the unfiltered results so typing never
/// re-invokes the list command.
#[derive(Debug, Clone)]
pub struct NavLevel {
    pub mode: LevelMode,
    pub dict: ValueDict,

    pub exec_mode: ExecMode,
    pub template: String,
    pub bind_as: Option<String>,

    /// Prompt resolved against the dict at push time and cached here, so
    /// later dict mutations in descendants don't alter it.
    pub display_prompt: String,
    pub sensitive: bool,

    pub list_cmd: String,
    pub format: ListFormat,
    pub label_field: String,
    pub value_field: String,
    pub on_select: Option<Box<ActionDef>>,

    pub plugin_ref: String,

    pub results: Vec<NavResult>,
    pub backup_results: Vec<NavResult>,
    pub selection: usize,
    pub first_result: usize,
    pub input: InputBuffer,

    // Feedback-only state.
    pub eval_cmd: String,
    pub display_input: String,
    pub display_result: String,
    pub show_input: bool,
    pub history_limit: usize,
    pub persist_history: bool,
    pub history_name: String,
    /// Transcript, newest entry first.
    pub transcript: Vec<FeedbackEntry>,
    pub loading: bool,
}

impl NavLevel {
    pub fn new(mode: LevelMode, dict: ValueDict) -> Self {
        Self {
            mode,
            dict,
            exec_mode: ExecMode::Exec,
            template: String::new(),
            bind_as: None,
            display_prompt: String::new(),
            sensitive: false,
            list_cmd: String::new(),
            format: ListFormat::Lines,
            label_field: String::new(),
            value_field: String::new(),
            on_select: None,
            plugin_ref: String::new(),
            results: Vec::new(),
            backup_results: Vec::new(),
            selection: 0,
            first_result: 0,
            input: InputBuffer::new(),
            eval_cmd: String::new(),
            display_input: String::new(),
            display_result: String::new(),
            show_input: true,
            history_limit: 20,
            persist_history: false,
            history_name: String::new(),
            transcript: Vec::new(),
            loading: false,
        }
    }

    /// Re-filter the displayed results from the backup list.
    ///
    /// Resets selection and scroll; the backup list itself is untouched.
    pub fn refilter(&mut self, matcher: &dyn Matcher) {
        let kept = filter_ranked(matcher, self.input.as_str(), &self.backup_results, |r| {
            r.label.as_str()
        });
        self.results = kept
            .into_iter()
            .map(|i| self.backup_results[i].clone())
            .collect();
        self.selection = 0;
        self.first_result = 0;
    }

    /// The currently selected result, if any.
    pub fn selected_result(&self) -> Option<&NavResult> {
        self.results.get(self.first_result + self.selection)
    }
}

/// The ordered sequence of pushed levels. The implicit base level (the root
/// result list) lives outside the stack and is active when this is empty.
#[derive(Debug, Default)]
pub struct NavStack {
    levels: Vec<NavLevel>,
}

impl NavStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, level: NavLevel) {
        self.levels.push(level);
    }

    /// Remove and return the top level. The caller is responsible for
    /// persistence and process teardown before dropping it.
    pub fn pop(&mut self) -> Option<NavLevel> {
        self.levels.pop()
    }

    pub fn current(&self) -> Option<&NavLevel> {
        self.levels.last()
    }

    pub fn current_mut(&mut self) -> Option<&mut NavLevel> {
        self.levels.last_mut()
    }

    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Iterate over all levels, bottom first (for shutdown persistence).
    pub fn iter(&self) -> impl Iterator<Item = &NavLevel> {
        self.levels.iter()
    }
}
