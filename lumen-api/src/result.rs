//! Result and transcript entry types.

use serde::{Deserialize, Serialize};

use crate::ActionDef;

/// One selectable entry in a level's result list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavResult {
    /// Text shown in the list (may carry a display prefix).
    pub label: String,
    /// Value bound into the dict when the result is chosen.
    pub value: String,
    /// Name of the plugin that produced this result, if any.
    #[serde(default)]
    pub source_plugin: String,
    pub action: ActionDef,
}

impl NavResult {
    pub fn new(label: impl Into<String>, value: impl Into<String>, action: ActionDef) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
            source_plugin: String::new(),
            action,
        }
    }
}

/// One entry in a feedback conversation transcript.
///
/// Transcripts are ordered newest-first, both in memory and on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackEntry {
    pub is_user: bool,
    pub content: String,
}

impl FeedbackEntry {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            is_user: true,
            content: content.into(),
        }
    }

    pub fn response(content: impl Into<String>) -> Self {
        Self {
            is_user: false,
            content: content.into(),
        }
    }
}
