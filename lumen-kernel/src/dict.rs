//! Value dictionary - the ordered substitution environment for templates.

use indexmap::IndexMap;

/// An ordered string-to-string map with last-write-wins semantics.
///
/// Setting an existing key overwrites the value in place, preserving the
/// key's original position. Cloning produces a fully independent copy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValueDict {
    entries: IndexMap<String, String>,
}

impl ValueDict {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a key. Overwriting keeps the original position.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}
