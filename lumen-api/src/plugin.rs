//! Plugin definitions - already-parsed declarative action lists.
//!
//! The kernel only consumes these; loading and validating the declarative
//! source is the loader's job.

use serde::{Deserialize, Serialize};

use crate::{ActionDef, ListFormat};

/// One named entry in a plugin's action list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginAction {
    pub label: String,
    #[serde(default)]
    pub value: String,
    pub action: ActionDef,
}

/// A provider runs a command to produce a plugin's results dynamically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginProvider {
    pub list_cmd: String,
    #[serde(default)]
    pub format: ListFormat,
    #[serde(default)]
    pub label_field: String,
    #[serde(default)]
    pub value_field: String,
    pub action: ActionDef,
}

/// A fully-formed plugin definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plugin {
    pub name: String,
    /// Prefix prepended to this plugin's labels in the base list.
    #[serde(default)]
    pub display_prefix: String,
    /// Prompt shown while inside this plugin's sub-menu.
    #[serde(default)]
    pub context_name: String,
    /// Whether this plugin's actions appear in the base list.
    #[serde(default = "default_true")]
    pub global: bool,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Binaries that must exist on PATH for this plugin to be usable.
    #[serde(default)]
    pub depends: Vec<String>,
    #[serde(default)]
    pub provider: Option<PluginProvider>,
    #[serde(default)]
    pub actions: Vec<PluginAction>,
    /// Set by the registry after checking `depends`.
    #[serde(default = "default_true", skip_serializing)]
    pub deps_satisfied: bool,
}

fn default_true() -> bool {
    true
}
