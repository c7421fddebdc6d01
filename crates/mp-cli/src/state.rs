use std::fs;
use std::path::{Path, PathBuf};

use mp_core::storage::{KeyValueStore, MemoryStore, StorageError};

/// Display state kept in a JSON file (`{"storage_key": "timestamp"}`),
/// standing in for the browser's `localStorage`.
pub struct JsonFileStore {
    path: PathBuf,
    entries: MemoryStore,
}

impl JsonFileStore {
    /// Open `path`, starting empty if the file does not exist yet.
    pub fn open(path: &Path) -> Result<Self, String> {
        let entries = if path.exists() {
            let content = fs::read_to_string(path)
                .map_err(|e| format!("Failed to read '{}': {}", path.display(), e))?;
            if content.trim().is_empty() {
                MemoryStore::new()
            } else {
                serde_json::from_str(&content)
                    .map_err(|e| format!("Invalid state file '{}': {}", path.display(), e))?
            }
        } else {
            MemoryStore::new()
        };

        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }

    fn save(&self) -> Result<(), StorageError> {
        let write_error = |reason: String| StorageError::Write {
            key: self.path.display().to_string(),
            reason,
        };
        let json = serde_json::to_string_pretty(&self.entries).map_err(|e| write_error(e.to_string()))?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| write_error(e.to_string()))?;
        }
        fs::write(&self.path, json).map_err(|e| write_error(e.to_string()))
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.entries.get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries.set(key, value)?;
        self.save()
    }
}
