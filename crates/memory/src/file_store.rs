//! File persistence for conversation records.
//!
//! One JSON document per conversation, named `{user}_{session}.json` inside
//! the configured data directory. Records are loaded once at startup and
//! flushed on every mutation. This keeps reads fast and writes durable
//! without an external database.

use pili_core::error::MemoryError;
use pili_core::memory::ConversationRecord;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// JSON-file persistence for conversations.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn file_path(&self, user_id: &str, session_id: &str) -> PathBuf {
        self.dir
            .join(format!("{}_{}.json", sanitize(user_id), sanitize(session_id)))
    }

    /// Load every conversation found in the data directory.
    ///
    /// Files that fail to parse are skipped with a warning rather than
    /// aborting startup.
    pub fn load_all(&self) -> Vec<ConversationRecord> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(rd) => rd,
            Err(_) => return Vec::new(), // Directory doesn't exist yet
        };

        let mut records = Vec::new();
        for entry in entries.filter_map(|e| e.ok()) {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match Self::read_record(&path) {
                Ok(record) => records.push(record),
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable conversation file"),
            }
        }
        debug!(count = records.len(), dir = %self.dir.display(), "Loaded conversations from disk");
        records
    }

    fn read_record(path: &Path) -> Result<ConversationRecord, MemoryError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| MemoryError::Storage(e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| MemoryError::Storage(e.to_string()))
    }

    /// Write one conversation to disk.
    pub fn save(&self, record: &ConversationRecord) -> Result<(), MemoryError> {
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| MemoryError::Storage(format!("Failed to create memory directory: {e}")))?;

        let content = serde_json::to_string_pretty(record)
            .map_err(|e| MemoryError::Storage(format!("Failed to serialize conversation: {e}")))?;

        let path = self.file_path(&record.user_id, &record.session_id);
        std::fs::write(&path, content)
            .map_err(|e| MemoryError::Storage(format!("Failed to write conversation file: {e}")))
    }

    /// Remove one conversation's backing file.
    pub fn remove(&self, user_id: &str, session_id: &str) {
        let path = self.file_path(user_id, session_id);
        if path.exists()
            && let Err(e) = std::fs::remove_file(&path)
        {
            warn!(path = %path.display(), error = %e, "Failed to remove conversation file");
        }
    }
}

/// Keep filenames flat regardless of what callers put in ids.
fn sanitize(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '.' { c } else { '_' })
        .collect()
}
