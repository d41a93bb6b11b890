//! List-producing collaborator: run a command once, parse its output into
//! results.
//!
//! Invoked exactly once per `Select`/`Plugin` push; filtering afterwards is
//! purely in-memory over the cached backup list.

use lumen_api::{ActionDef, ActionKind, ExecMode, ListFormat, NavResult};

use crate::exec;

/// Run `list_cmd` and parse its output into an ordered result list.
///
/// Each produced result carries either a copy of `on_select` (when the
/// select action declares one) or a default `self` action built from the
/// select's own `template`/`bind_as`/`exec_mode`.
#[allow(clippy::too_many_arguments)]
pub fn run_list_cmd(
    list_cmd: &str,
    format: ListFormat,
    label_field: &str,
    value_field: &str,
    on_select: Option<&ActionDef>,
    template: &str,
    bind_as: Option<&str>,
    exec_mode: ExecMode,
) -> Vec<NavResult> {
    let Some(output) = exec::capture_output(list_cmd) else {
        tracing::debug!("list command produced no output: {}", list_cmd);
        return Vec::new();
    };

    let make_action = || -> ActionDef {
        match on_select {
            Some(action) => action.clone(),
            None => ActionDef {
                bind_as: bind_as.map(String::from),
                template: template.to_string(),
                exec_mode,
                kind: ActionKind::SelfRef,
                on_select: None,
            },
        }
    };

    match format {
        ListFormat::Lines => output
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| NavResult::new(line, line, make_action()))
            .collect(),
        ListFormat::Json => parse_json_results(&output, label_field, value_field, make_action),
    }
}

fn parse_json_results(
    output: &str,
    label_field: &str,
    value_field: &str,
    make_action: impl Fn() -> ActionDef,
) -> Vec<NavResult> {
    let items: Vec<serde_json::Map<String, serde_json::Value>> =
        match serde_json::from_str(output) {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!("list command output is not a JSON array of objects: {}", e);
                return Vec::new();
            }
        };

    items
        .iter()
        .filter_map(|obj| {
            let label = obj.get(label_field).and_then(|v| v.as_str())?;
            let value = obj
                .get(value_field)
                .and_then(|v| v.as_str())
                .unwrap_or(label);
            Some(NavResult::new(label, value, make_action()))
        })
        .collect()
}
