//! Action definitions - what happens when a result is chosen.
//!
//! Actions form a finite tree built once when the declarative plugin source
//! is loaded: a `Select` or `Plugin` action may carry an `on_select` action
//! describing the next step after a pick. Nothing mutates the tree at
//! runtime, so there is no cycle risk.

use serde::{Deserialize, Serialize};

/// How a resolved command template is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecMode {
    /// Resolve the template and run it immediately.
    #[default]
    Exec,
    /// Merge the bound value into the parent level and resume the parent.
    Return,
}

/// Output format produced by a list command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListFormat {
    /// One result per line; label and value are the same string.
    #[default]
    Lines,
    /// A JSON array of objects with named label/value fields.
    Json,
}

/// The variant-specific part of an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionKind {
    /// The chosen result is itself the action: run (or return) directly.
    #[serde(rename = "self")]
    SelfRef,

    /// Prompt the user for a line of input.
    Input {
        /// Prompt template, resolved against the dict at push time.
        #[serde(default)]
        prompt: String,
        /// Mask the typed input in the view (passwords etc.).
        #[serde(default)]
        sensitive: bool,
    },

    /// Run a command once and let the user pick from its output.
    Select {
        list_cmd: String,
        #[serde(default)]
        format: ListFormat,
        #[serde(default)]
        label_field: String,
        #[serde(default)]
        value_field: String,
    },

    /// Delegate to another plugin's declared action list.
    Plugin { plugin: String },

    /// Converse with an external process: each submit spawns one evaluation.
    Feedback {
        /// Evaluation command template; `{input}` carries the typed text.
        eval_cmd: String,
        /// Template for the transcript entry echoing the user's input.
        #[serde(default)]
        display_input: String,
        /// Template for the transcript entry showing the response;
        /// `{result}` carries the process output.
        #[serde(default)]
        display_result: String,
        #[serde(default = "default_show_input")]
        show_input: bool,
        #[serde(default = "default_history_limit")]
        history_limit: usize,
        #[serde(default)]
        persist_history: bool,
        #[serde(default)]
        history_name: String,
    },
}

fn default_show_input() -> bool {
    true
}

fn default_history_limit() -> usize {
    20
}

/// A complete action definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionDef {
    /// Key under which the chosen result's value is bound into the dict.
    #[serde(default, rename = "as")]
    pub bind_as: Option<String>,

    /// Command (or display) template resolved against the dict.
    #[serde(default)]
    pub template: String,

    #[serde(default)]
    pub exec_mode: ExecMode,

    #[serde(flatten)]
    pub kind: ActionKind,

    /// What happens after a pick inside a `Select`/`Plugin` level.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_select: Option<Box<ActionDef>>,
}

impl ActionDef {
    /// An action that executes its template directly.
    pub fn exec(template: impl Into<String>) -> Self {
        Self {
            bind_as: None,
            template: template.into(),
            exec_mode: ExecMode::Exec,
            kind: ActionKind::SelfRef,
            on_select: None,
        }
    }

    /// An action that returns its bound value to the parent level.
    pub fn ret(bind_as: impl Into<String>) -> Self {
        Self {
            bind_as: Some(bind_as.into()),
            template: String::new(),
            exec_mode: ExecMode::Return,
            kind: ActionKind::SelfRef,
            on_select: None,
        }
    }
}

impl Default for ActionDef {
    fn default() -> Self {
        Self::exec("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_select_action() {
        let json = r#"{
            "type": "select",
            "as": "branch",
            "list_cmd": "git branch --format='%(refname:short)'",
            "exec_mode": "exec",
            "template": "git checkout {branch}"
        }"#;
        let action: ActionDef = serde_json::from_str(json).unwrap();
        assert_eq!(action.bind_as.as_deref(), Some("branch"));
        assert!(matches!(action.kind, ActionKind::Select { .. }));
        assert_eq!(action.exec_mode, ExecMode::Exec);
    }

    #[test]
    fn deserialize_nested_on_select() {
        let json = r#"{
            "type": "select",
            "list_cmd": "ls",
            "on_select": {
                "type": "input",
                "prompt": "rename {file} to: ",
                "as": "name",
                "template": "mv {file} {name}"
            }
        }"#;
        let action: ActionDef = serde_json::from_str(json).unwrap();
        let nested = action.on_select.unwrap();
        assert!(matches!(nested.kind, ActionKind::Input { .. }));
    }

    #[test]
    fn feedback_defaults() {
        let json = r#"{"type": "feedback", "eval_cmd": "qalc -t -- '{input}'"}"#;
        let action: ActionDef = serde_json::from_str(json).unwrap();
        match action.kind {
            ActionKind::Feedback {
                show_input,
                history_limit,
                persist_history,
                ..
            } => {
                assert!(show_input);
                assert_eq!(history_limit, 20);
                assert!(!persist_history);
            }
            _ => panic!("expected feedback action"),
        }
    }
}
