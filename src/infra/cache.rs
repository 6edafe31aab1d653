//! Flat-file cache tier.

use std::collections::HashMap;
use std::fs::{create_dir_all, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::warn;

use crate::core::{LocalCache, ScheduleError};

/// One JSON file per key under a directory.
pub struct FileCache {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileCache {
    /// Create a cache rooted at `path`, creating the directory if needed.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, ScheduleError> {
        let path = path.as_ref().to_path_buf();
        create_dir_all(&path).map_err(|e| ScheduleError::Cache(e.to_string()))?;
        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    fn file_path(&self, key: &str) -> PathBuf {
        let safe: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.path.join(format!("{safe}.json"))
    }
}

impl LocalCache for FileCache {
    fn load(&self, key: &str) -> Option<serde_json::Value> {
        let file_path = self.file_path(key);
        if !file_path.exists() {
            return None;
        }
        let mut raw = String::new();
        let read = OpenOptions::new()
            .read(true)
            .open(&file_path)
            .and_then(|mut file| file.read_to_string(&mut raw));
        if let Err(err) = read {
            warn!(path = %file_path.display(), error = %err, "cache file unreadable");
            return None;
        }
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(path = %file_path.display(), error = %err, "cache file is not valid JSON");
                None
            }
        }
    }

    fn store(&self, key: &str, value: &serde_json::Value) -> Result<(), ScheduleError> {
        let file_path = self.file_path(key);
        let tmp_path = file_path.with_extension("json.tmp");
        let body = serde_json::to_string_pretty(value).map_err(|e| ScheduleError::Cache(e.to_string()))?;
        let _guard = self.write_lock.lock();
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)
            .map_err(|e| ScheduleError::Cache(e.to_string()))?;
        file.write_all(body.as_bytes())
            .map_err(|e| ScheduleError::Cache(e.to_string()))?;
        std::fs::rename(&tmp_path, &file_path).map_err(|e| ScheduleError::Cache(e.to_string()))
    }
}

/// Process-local cache for tests and cache-less deployments.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, serde_json::Value>>,
}

impl MemoryCache {
    /// Empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored keys.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.lock().keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl LocalCache for MemoryCache {
    fn load(&self, key: &str) -> Option<serde_json::Value> {
        self.entries.lock().get(key).cloned()
    }

    fn store(&self, key: &str, value: &serde_json::Value) -> Result<(), ScheduleError> {
        self.entries.lock().insert(key.to_string(), value.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_cache_round_trips_values() {
        let dir = std::env::temp_dir().join(format!("seat_cache_{}", uuid::Uuid::new_v4()));
        let cache = FileCache::new(&dir).unwrap();
        assert!(cache.load("schedule_2026-10-19").is_none());
        let value = serde_json::json!({"employees": ["Ann", "Bob"]});
        cache.store("schedule_2026-10-19", &value).unwrap();
        assert_eq!(cache.load("schedule_2026-10-19"), Some(value));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_file_cache_ignores_corrupt_file() {
        let dir = std::env::temp_dir().join(format!("seat_cache_{}", uuid::Uuid::new_v4()));
        let cache = FileCache::new(&dir).unwrap();
        std::fs::write(dir.join("admins.json"), "{not json").unwrap();
        assert!(cache.load("admins").is_none());
        std::fs::remove_dir_all(&dir).ok();
    }
}
