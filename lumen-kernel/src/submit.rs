//! Submit resolution - the launcher's transition function.
//!
//! Given the stack top and the chosen result (or the composed input),
//! decides the next stack mutation and/or execution. Every failure here is
//! absorbed: a broken definition or a missing plugin logs and leaves the
//! stack exactly as it was.

use std::path::Path;

use lumen_api::{ActionKind, ExecMode, NavResult};

use crate::dict::ValueDict;
use crate::history;
use crate::listcmd;
use crate::nav::{LevelMode, NavLevel, NavStack};
use crate::plugin::PluginRegistry;
use crate::template;

/// What the caller must do after a submit resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Run a resolved command (shell or builtin) with the dict it was
    /// resolved against.
    RunCommand { cmd: String, dict: ValueDict },
    /// A new level was pushed; re-render from the new top.
    Pushed,
    /// One or more levels were popped; re-render from the new top.
    Popped,
    /// A feedback level wants an evaluation spawned for its input.
    SpawnFeedback,
    /// Nothing happened.
    NoOp,
}

/// Shared collaborators the resolver consults during a transition.
pub struct SubmitCtx<'a> {
    pub registry: &'a PluginRegistry,
    pub history_dir: &'a Path,
}

/// Resolve a submit on a non-empty stack.
///
/// `on_pop` runs for every popped level before it is dropped; the caller
/// uses it for transcript persistence and process teardown.
pub fn submit_current(
    stack: &mut NavStack,
    base_dict: &mut ValueDict,
    ctx: &SubmitCtx,
    on_pop: &mut dyn FnMut(&mut NavLevel),
) -> Effect {
    let Some(level) = stack.current() else {
        return Effect::NoOp;
    };

    match level.mode {
        LevelMode::Input => submit_input(stack, base_dict, on_pop),
        LevelMode::Feedback => Effect::SpawnFeedback,
        LevelMode::Select | LevelMode::Plugin => {
            let Some(result) = level.selected_result().cloned() else {
                return Effect::NoOp;
            };
            apply_result(stack, base_dict, &result, ctx, on_pop)
        }
    }
}

/// Apply a chosen result's action against the current top (or the base
/// level when the stack is empty).
pub fn apply_result(
    stack: &mut NavStack,
    base_dict: &mut ValueDict,
    result: &NavResult,
    ctx: &SubmitCtx,
    on_pop: &mut dyn FnMut(&mut NavLevel),
) -> Effect {
    let parent_dict = match stack.current() {
        Some(level) => level.dict.clone(),
        None => base_dict.clone(),
    };

    let action = &result.action;
    let mut dict = parent_dict;
    if let Some(key) = action.bind_as.as_deref() {
        dict.set(key, &result.value);
    }

    match &action.kind {
        ActionKind::SelfRef => match action.exec_mode {
            ExecMode::Exec => {
                let cmd = template::resolve(&action.template, &dict);
                Effect::RunCommand { cmd, dict }
            }
            ExecMode::Return => pop_and_merge(stack, base_dict, dict, on_pop),
        },

        ActionKind::Input { prompt, sensitive } => {
            let mut level = NavLevel::new(LevelMode::Input, dict);
            level.display_prompt = template::resolve(prompt, &level.dict);
            level.sensitive = *sensitive;
            level.exec_mode = action.exec_mode;
            level.template = action.template.clone();
            level.bind_as = action.bind_as.clone();
            stack.push(level);
            Effect::Pushed
        }

        ActionKind::Select {
            list_cmd,
            format,
            label_field,
            value_field,
        } => {
            let mut level = NavLevel::new(LevelMode::Select, dict);
            level.display_prompt = result.label.clone();
            level.exec_mode = action.exec_mode;
            level.template = action.template.clone();
            level.bind_as = action.bind_as.clone();
            level.list_cmd = list_cmd.clone();
            level.format = *format;
            level.label_field = label_field.clone();
            level.value_field = value_field.clone();
            level.on_select = action.on_select.clone();

            // The list command runs exactly once, here. Filtering later is
            // in-memory over the backup list.
            level.backup_results = listcmd::run_list_cmd(
                list_cmd,
                *format,
                label_field,
                value_field,
                action.on_select.as_deref(),
                &action.template,
                action.bind_as.as_deref(),
                action.exec_mode,
            );
            level.results = level.backup_results.clone();
            stack.push(level);
            Effect::Pushed
        }

        ActionKind::Plugin { plugin } => {
            let Some(target) = ctx.registry.get(plugin) else {
                tracing::warn!("submit refers to unknown plugin: {}", plugin);
                return Effect::NoOp;
            };

            let mut level = NavLevel::new(LevelMode::Plugin, dict);
            level.display_prompt = if target.context_name.is_empty() {
                target.name.clone()
            } else {
                target.context_name.clone()
            };
            level.plugin_ref = target.name.clone();
            level.backup_results = ctx.registry.populate_plugin_actions(target);
            level.results = level.backup_results.clone();
            stack.push(level);
            Effect::Pushed
        }

        ActionKind::Feedback {
            eval_cmd,
            display_input,
            display_result,
            show_input,
            history_limit,
            persist_history,
            history_name,
        } => {
            let mut level = NavLevel::new(LevelMode::Feedback, dict);
            level.display_prompt = result.label.clone();
            level.eval_cmd = eval_cmd.clone();
            level.display_input = display_input.clone();
            level.display_result = display_result.clone();
            level.show_input = *show_input;
            level.history_limit = *history_limit;
            level.persist_history = *persist_history;
            level.history_name = conversation_name(history_name, result);

            if level.persist_history {
                level.transcript = history::load(ctx.history_dir, &level.history_name);
            }
            stack.push(level);
            Effect::Pushed
        }
    }
}

/// Submit of an `Input` level: bind the typed text and either run the
/// level's template or return the binding to the parent.
fn submit_input(
    stack: &mut NavStack,
    base_dict: &mut ValueDict,
    on_pop: &mut dyn FnMut(&mut NavLevel),
) -> Effect {
    let Some(level) = stack.current() else {
        return Effect::NoOp;
    };

    let mut dict = level.dict.clone();
    match level.bind_as.as_deref() {
        Some(key) => dict.set(key, level.input.as_str()),
        None => dict.set("input", level.input.as_str()),
    }

    match level.exec_mode {
        ExecMode::Exec => {
            // Terminal for this branch: the dict is not merged upward.
            let cmd = template::resolve(&level.template, &dict);
            Effect::RunCommand { cmd, dict }
        }
        ExecMode::Return => pop_and_merge(stack, base_dict, dict, on_pop),
    }
}

/// Pop exactly one level and merge `dict` into its parent. An `Exec`
/// parent with a template runs it with the merged dict; otherwise the
/// parent stays on the stack and is re-rendered, so nested `Return`
/// chains unwind one submit at a time.
fn pop_and_merge(
    stack: &mut NavStack,
    base_dict: &mut ValueDict,
    dict: ValueDict,
    on_pop: &mut dyn FnMut(&mut NavLevel),
) -> Effect {
    let Some(mut popped) = stack.pop() else {
        merge_into(base_dict, &dict);
        return Effect::Popped;
    };
    on_pop(&mut popped);

    let Some(parent) = stack.current_mut() else {
        merge_into(base_dict, &dict);
        return Effect::Popped;
    };
    merge_into(&mut parent.dict, &dict);

    match parent.exec_mode {
        ExecMode::Exec if !parent.template.is_empty() => {
            let cmd = template::resolve(&parent.template, &parent.dict);
            Effect::RunCommand {
                cmd,
                dict: parent.dict.clone(),
            }
        }
        _ => Effect::Popped,
    }
}

fn merge_into(target: &mut ValueDict, source: &ValueDict) {
    for (key, value) in source.iter() {
        target.set(key, value);
    }
}

/// Conversation name for transcript persistence: the action's explicit
/// name, else the result's source plugin, else a fixed fallback.
fn conversation_name(history_name: &str, result: &NavResult) -> String {
    if !history_name.is_empty() {
        history_name.to_string()
    } else if !result.source_plugin.is_empty() {
        result.source_plugin.clone()
    } else {
        "feedback".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_api::ActionDef;

    fn ctx_with<'a>(registry: &'a PluginRegistry, dir: &'a Path) -> SubmitCtx<'a> {
        SubmitCtx {
            registry,
            history_dir: dir,
        }
    }

    fn no_hook() -> impl FnMut(&mut NavLevel) {
        |_level: &mut NavLevel| {}
    }

    #[test]
    fn self_exec_resolves_with_bound_value() {
        let registry = PluginRegistry::new();
        let dir = std::env::temp_dir();
        let ctx = ctx_with(&registry, &dir);
        let mut stack = NavStack::new();
        let mut base_dict = ValueDict::new();

        let mut action = ActionDef::exec("open {file}");
        action.bind_as = Some("file".to_string());
        let result = NavResult::new("notes.txt", "notes.txt", action);

        let effect = apply_result(&mut stack, &mut base_dict, &result, &ctx, &mut no_hook());
        match effect {
            Effect::RunCommand { cmd, .. } => assert_eq!(cmd, "open notes.txt"),
            other => panic!("expected RunCommand, got {:?}", other),
        }
        assert!(stack.is_empty());
    }

    #[test]
    fn input_push_caches_prompt_at_push_time() {
        let registry = PluginRegistry::new();
        let dir = std::env::temp_dir();
        let ctx = ctx_with(&registry, &dir);
        let mut stack = NavStack::new();
        let mut base_dict = ValueDict::new();
        base_dict.set("file", "a.txt");

        let action = ActionDef {
            bind_as: Some("name".to_string()),
            template: "mv {file} {name}".to_string(),
            exec_mode: ExecMode::Exec,
            kind: ActionKind::Input {
                prompt: "rename {file} to: ".to_string(),
                sensitive: false,
            },
            on_select: None,
        };
        let result = NavResult::new("rename", "rename", action);

        let effect = apply_result(&mut stack, &mut base_dict, &result, &ctx, &mut no_hook());
        assert_eq!(effect, Effect::Pushed);

        let level = stack.current().unwrap();
        assert_eq!(level.display_prompt, "rename a.txt to: ");

        // Later dict mutation does not alter the cached prompt.
        stack.current_mut().unwrap().dict.set("file", "b.txt");
        assert_eq!(stack.current().unwrap().display_prompt, "rename a.txt to: ");
    }

    #[test]
    fn input_exec_runs_template_with_input() {
        let registry = PluginRegistry::new();
        let dir = std::env::temp_dir();
        let ctx = ctx_with(&registry, &dir);
        let mut stack = NavStack::new();
        let mut base_dict = ValueDict::new();

        let mut level = NavLevel::new(LevelMode::Input, ValueDict::new());
        level.bind_as = Some("name".to_string());
        level.template = "greet {name}".to_string();
        level.exec_mode = ExecMode::Exec;
        level.input.set("Ada");
        stack.push(level);

        let effect = submit_current(&mut stack, &mut base_dict, &ctx, &mut no_hook());
        match effect {
            Effect::RunCommand { cmd, .. } => assert_eq!(cmd, "greet Ada"),
            other => panic!("expected RunCommand, got {:?}", other),
        }
        // Exec input is terminal: nothing merged upward, nothing popped.
        assert_eq!(stack.depth(), 1);
        assert!(base_dict.get("name").is_none());
    }

    #[test]
    fn input_return_merges_binding_into_parent() {
        let registry = PluginRegistry::new();
        let dir = std::env::temp_dir();
        let ctx = ctx_with(&registry, &dir);
        let mut stack = NavStack::new();
        let mut base_dict = ValueDict::new();

        let mut level = NavLevel::new(LevelMode::Input, ValueDict::new());
        level.bind_as = Some("name".to_string());
        level.exec_mode = ExecMode::Return;
        level.input.set("Bob");
        stack.push(level);

        let effect = submit_current(&mut stack, &mut base_dict, &ctx, &mut no_hook());
        assert_eq!(effect, Effect::Popped);
        assert!(stack.is_empty());
        assert_eq!(base_dict.get("name"), Some("Bob"));
    }

    #[test]
    fn return_chain_runs_exec_parent_template() {
        let registry = PluginRegistry::new();
        let dir = std::env::temp_dir();
        let ctx = ctx_with(&registry, &dir);
        let mut stack = NavStack::new();
        let mut base_dict = ValueDict::new();

        // Parent select level pushed by an Exec action with a template.
        let mut parent = NavLevel::new(LevelMode::Select, ValueDict::new());
        parent.exec_mode = ExecMode::Exec;
        parent.template = "switch {ws}".to_string();
        stack.push(parent);

        // Child input level whose submission returns {ws} upward.
        let mut child = NavLevel::new(LevelMode::Input, ValueDict::new());
        child.bind_as = Some("ws".to_string());
        child.exec_mode = ExecMode::Return;
        child.input.set("3");
        stack.push(child);

        let effect = submit_current(&mut stack, &mut base_dict, &ctx, &mut no_hook());
        match effect {
            Effect::RunCommand { cmd, .. } => assert_eq!(cmd, "switch 3"),
            other => panic!("expected RunCommand, got {:?}", other),
        }
        assert_eq!(stack.depth(), 1);
    }

    #[test]
    fn select_push_invokes_list_once_and_caches_backup() {
        let registry = PluginRegistry::new();
        let dir = std::env::temp_dir();
        let ctx = ctx_with(&registry, &dir);
        let mut stack = NavStack::new();
        let mut base_dict = ValueDict::new();

        let action = ActionDef {
            bind_as: Some("item".to_string()),
            template: "open {item}".to_string(),
            exec_mode: ExecMode::Exec,
            kind: ActionKind::Select {
                list_cmd: "printf 'a\\nb\\nc\\n'".to_string(),
                format: Default::default(),
                label_field: String::new(),
                value_field: String::new(),
            },
            on_select: None,
        };
        let result = NavResult::new("pick", "pick", action);

        let effect = apply_result(&mut stack, &mut base_dict, &result, &ctx, &mut no_hook());
        assert_eq!(effect, Effect::Pushed);

        let level = stack.current().unwrap();
        assert_eq!(level.results.len(), 3);
        assert_eq!(level.backup_results.len(), 3);
        assert_eq!(level.results[1].label, "b");
    }

    #[test]
    fn missing_plugin_is_a_logged_noop() {
        let registry = PluginRegistry::new();
        let dir = std::env::temp_dir();
        let ctx = ctx_with(&registry, &dir);
        let mut stack = NavStack::new();
        let mut base_dict = ValueDict::new();

        let action = ActionDef {
            bind_as: None,
            template: String::new(),
            exec_mode: ExecMode::Exec,
            kind: ActionKind::Plugin {
                plugin: "does-not-exist".to_string(),
            },
            on_select: None,
        };
        let result = NavResult::new("x", "x", action);

        let effect = apply_result(&mut stack, &mut base_dict, &result, &ctx, &mut no_hook());
        assert_eq!(effect, Effect::NoOp);
        assert!(stack.is_empty());
    }

    #[test]
    fn empty_result_list_submit_is_noop() {
        let registry = PluginRegistry::new();
        let dir = std::env::temp_dir();
        let ctx = ctx_with(&registry, &dir);
        let mut stack = NavStack::new();
        let mut base_dict = ValueDict::new();

        stack.push(NavLevel::new(LevelMode::Select, ValueDict::new()));
        let effect = submit_current(&mut stack, &mut base_dict, &ctx, &mut no_hook());
        assert_eq!(effect, Effect::NoOp);
        assert_eq!(stack.depth(), 1);
    }

    #[test]
    fn feedback_push_spawns_nothing() {
        let registry = PluginRegistry::new();
        let dir = std::env::temp_dir();
        let ctx = ctx_with(&registry, &dir);
        let mut stack = NavStack::new();
        let mut base_dict = ValueDict::new();

        let action = ActionDef {
            bind_as: None,
            template: String::new(),
            exec_mode: ExecMode::Exec,
            kind: ActionKind::Feedback {
                eval_cmd: "qalc -t -- '{input}'".to_string(),
                display_input: String::new(),
                display_result: String::new(),
                show_input: true,
                history_limit: 20,
                persist_history: false,
                history_name: String::new(),
            },
            on_select: None,
        };
        let result = NavResult::new("calc", "calc", action);

        let effect = apply_result(&mut stack, &mut base_dict, &result, &ctx, &mut no_hook());
        assert_eq!(effect, Effect::Pushed);
        let level = stack.current().unwrap();
        assert!(level.transcript.is_empty());
        assert_eq!(level.history_name, "feedback");
    }

    #[test]
    fn feedback_history_name_falls_back_to_source_plugin() {
        let registry = PluginRegistry::new();
        let dir = std::env::temp_dir();
        let ctx = ctx_with(&registry, &dir);
        let mut stack = NavStack::new();
        let mut base_dict = ValueDict::new();

        let action = ActionDef {
            bind_as: None,
            template: String::new(),
            exec_mode: ExecMode::Exec,
            kind: ActionKind::Feedback {
                eval_cmd: "true".to_string(),
                display_input: String::new(),
                display_result: String::new(),
                show_input: true,
                history_limit: 20,
                persist_history: false,
                history_name: String::new(),
            },
            on_select: None,
        };
        let mut result = NavResult::new("ask", "ask", action);
        result.source_plugin = "assistant".to_string();

        apply_result(&mut stack, &mut base_dict, &result, &ctx, &mut no_hook());
        assert_eq!(stack.current().unwrap().history_name, "assistant");
    }

    #[test]
    fn return_into_return_parent_pops_one_level() {
        let registry = PluginRegistry::new();
        let dir = std::env::temp_dir();
        let ctx = ctx_with(&registry, &dir);
        let mut stack = NavStack::new();
        let mut base_dict = ValueDict::new();

        let mut mid = NavLevel::new(LevelMode::Select, ValueDict::new());
        mid.exec_mode = ExecMode::Return;
        stack.push(mid);

        let mut top = NavLevel::new(LevelMode::Input, ValueDict::new());
        top.bind_as = Some("v".to_string());
        top.exec_mode = ExecMode::Return;
        top.input.set("x");
        stack.push(top);

        let mut popped_modes = Vec::new();
        let mut hook = |level: &mut NavLevel| popped_modes.push(level.mode);
        let effect = submit_current(&mut stack, &mut base_dict, &ctx, &mut hook);

        // Only the input level pops; the Return parent stays put with the
        // merged binding and unwinds on its own next submit.
        assert_eq!(effect, Effect::Popped);
        assert_eq!(popped_modes, vec![LevelMode::Input]);
        assert_eq!(stack.depth(), 1);
        assert_eq!(stack.current().unwrap().dict.get("v"), Some("x"));
        assert!(base_dict.get("v").is_none());
    }
}
