//! Plugin registry - consumes already-parsed plugin definitions.
//!
//! Loading and parsing the declarative source is the loader's concern; the
//! registry tracks enablement, checks dependencies, and produces result
//! lists for the base level and for `Plugin` levels.

use std::path::Path;

use lumen_api::{NavResult, Plugin};

use crate::listcmd;

#[derive(Default)]
pub struct PluginRegistry {
    plugins: Vec<Plugin>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a parsed plugin, checking its binary dependencies.
    pub fn register(&mut self, mut plugin: Plugin) {
        plugin.deps_satisfied = plugin.depends.iter().all(|bin| binary_exists(bin));
        if !plugin.deps_satisfied {
            tracing::debug!("plugin '{}' has unmet dependencies", plugin.name);
        }
        self.plugins.push(plugin);
    }

    pub fn get(&self, name: &str) -> Option<&Plugin> {
        self.plugins.iter().find(|p| p.name == name)
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Apply a comma-separated enable filter: `apps,windows`, `all`,
    /// `all,-windows`, `-apps`.
    ///
    /// A filter that only excludes starts from everything enabled; one that
    /// includes starts from everything disabled.
    pub fn apply_filter(&mut self, filter: &str) {
        let tokens: Vec<&str> = filter
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect();
        if tokens.is_empty() {
            return;
        }

        let only_excludes = tokens.iter().all(|t| t.starts_with('-'));
        for plugin in &mut self.plugins {
            plugin.enabled = only_excludes;
        }

        for token in tokens {
            let (exclude, name) = match token.strip_prefix('-') {
                Some(name) => (true, name),
                None => (false, token),
            };

            if name == "all" {
                for plugin in &mut self.plugins {
                    plugin.enabled = !exclude;
                }
            } else if let Some(plugin) = self.plugins.iter_mut().find(|p| p.name == name) {
                plugin.enabled = !exclude;
            } else {
                tracing::warn!("unknown plugin in filter: {}", name);
            }
        }
    }

    /// Produce the base-level result list from every global, enabled plugin
    /// with satisfied dependencies. Provider list commands run here, once.
    pub fn populate_base_results(&self) -> Vec<NavResult> {
        let mut results = Vec::new();

        for plugin in &self.plugins {
            if !plugin.global || !plugin.enabled || !plugin.deps_satisfied {
                continue;
            }

            if let Some(provider) = &plugin.provider {
                let provided = listcmd::run_list_cmd(
                    &provider.list_cmd,
                    provider.format,
                    &provider.label_field,
                    &provider.value_field,
                    provider.action.on_select.as_deref(),
                    &provider.action.template,
                    provider.action.bind_as.as_deref(),
                    provider.action.exec_mode,
                );
                for mut result in provided {
                    result.source_plugin = plugin.name.clone();
                    results.push(result);
                }
            }

            for action in &plugin.actions {
                let value = if action.value.is_empty() {
                    action.label.clone()
                } else {
                    action.value.clone()
                };
                let mut result = NavResult::new(&action.label, value, action.action.clone());
                result.source_plugin = plugin.name.clone();
                results.push(result);
            }
        }

        results
    }

    /// Produce the result list for a `Plugin` level: the target plugin's
    /// declared actions.
    pub fn populate_plugin_actions(&self, plugin: &Plugin) -> Vec<NavResult> {
        if !plugin.deps_satisfied {
            return Vec::new();
        }

        plugin
            .actions
            .iter()
            .map(|action| {
                let value = if action.value.is_empty() {
                    action.label.clone()
                } else {
                    action.value.clone()
                };
                let mut result = NavResult::new(&action.label, value, action.action.clone());
                result.source_plugin = plugin.name.clone();
                result
            })
            .collect()
    }
}

/// Check whether a binary exists on PATH.
fn binary_exists(name: &str) -> bool {
    if name.is_empty() {
        return false;
    }
    let Ok(path) = std::env::var("PATH") else {
        return false;
    };
    path.split(':').any(|dir| {
        let candidate = Path::new(dir).join(name);
        candidate.is_file()
    })
}
