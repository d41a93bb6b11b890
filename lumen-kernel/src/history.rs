//! Persisted feedback transcripts - one JSON file per conversation name.
//!
//! Entries are stored newest-first, matching the in-memory transcript
//! convention, and capped at the owning level's history limit on every
//! save. Persistence failures are logged and skipped; the conversation
//! proceeds without history.

use std::fs;
use std::path::{Path, PathBuf};

use lumen_api::FeedbackEntry;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
struct HistoryFile {
    entries: Vec<FeedbackEntry>,
}

fn history_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{}.json", name))
}

/// Load a persisted transcript, newest entry first. Missing or unreadable
/// files yield an empty transcript.
pub fn load(dir: &Path, name: &str) -> Vec<FeedbackEntry> {
    if name.is_empty() {
        return Vec::new();
    }

    let path = history_path(dir, name);
    let data = match fs::read_to_string(&path) {
        Ok(data) => data,
        Err(_) => return Vec::new(),
    };

    match serde_json::from_str::<HistoryFile>(&data) {
        Ok(file) => file.entries,
        Err(e) => {
            tracing::debug!("ignoring malformed history file {:?}: {}", path, e);
            Vec::new()
        }
    }
}

/// Write a transcript back, truncated to `limit` entries (newest kept).
pub fn save(dir: &Path, name: &str, transcript: &[FeedbackEntry], limit: usize) {
    if name.is_empty() {
        return;
    }

    if let Err(e) = fs::create_dir_all(dir) {
        tracing::warn!("failed to create history dir {:?}: {}", dir, e);
        return;
    }

    let capped = &transcript[..transcript.len().min(limit)];
    let file = HistoryFile {
        entries: capped.to_vec(),
    };

    let path = history_path(dir, name);
    match serde_json::to_string_pretty(&file) {
        Ok(json) => {
            if let Err(e) = fs::write(&path, json) {
                tracing::warn!("failed to write history file {:?}: {}", path, e);
            }
        }
        Err(e) => tracing::warn!("failed to serialize history '{}': {}", name, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let transcript = vec![
            FeedbackEntry::response("4"),
            FeedbackEntry::user("2+2"),
        ];

        save(dir.path(), "calc", &transcript, 20);
        let loaded = load(dir.path(), "calc");
        assert_eq!(loaded, transcript);
    }

    #[test]
    fn save_caps_to_limit() {
        let dir = tempfile::tempdir().unwrap();
        let transcript: Vec<FeedbackEntry> = (0..10)
            .map(|i| FeedbackEntry::response(format!("entry {}", i)))
            .collect();

        save(dir.path(), "chat", &transcript, 3);
        let loaded = load(dir.path(), "chat");
        assert_eq!(loaded.len(), 3);
        // Newest-first: the first three entries survive.
        assert_eq!(loaded[0].content, "entry 0");
        assert_eq!(loaded[2].content, "entry 2");
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load(dir.path(), "nothing").is_empty());
    }

    #[test]
    fn malformed_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("bad.json"), "not json{{").unwrap();
        assert!(load(dir.path(), "bad").is_empty());
    }

    #[test]
    fn empty_name_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        save(dir.path(), "", &[FeedbackEntry::user("x")], 5);
        assert!(load(dir.path(), "").is_empty());
    }
}
