//! Best-effort key-value persistence
//!
//! Holds the high score, the last good leaderboard and the config. Every
//! caller treats failures as non-fatal: log and fall back to memory.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use thiserror::Error;

/// Storage key for the local high score
pub const HIGH_SCORE_KEY: &str = "neo-breakout-highscore";
/// Storage key for the cached leaderboard array
pub const LEADERBOARD_KEY: &str = "neo-breakout-leaderboard";
/// Storage key for the game config
pub const CONFIG_KEY: &str = "neo-breakout-config";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage i/o failed: {0}")]
    Io(#[from] io::Error),
    #[error("storage is unavailable")]
    Unavailable,
    #[error("invalid storage key: {0:?}")]
    InvalidKey(String),
}

/// String key-value store (LocalStorage-shaped)
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// Shared handle passed to every component that persists something
pub type SharedStore = Arc<dyn KeyValueStore>;

/// In-memory store, used for tests and when no config dir is available
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedStore {
        Arc::new(Self::new())
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.lock().map_err(|_| StorageError::Unavailable)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::Unavailable)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// One file per key inside a directory
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `$XDG_CONFIG_HOME/neon-breakout`, else `~/.config/neon-breakout`, else `./neon-breakout`
    pub fn default_location() -> Self {
        let base = match std::env::var("XDG_CONFIG_HOME") {
            Ok(xdg) if !xdg.is_empty() => PathBuf::from(xdg),
            _ => match std::env::var("HOME") {
                Ok(home) => PathBuf::from(home).join(".config"),
                Err(_) => PathBuf::from("."),
            },
        };
        Self::new(base.join("neon-breakout"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(key))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(path) {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.dir)?;
        // Write-then-rename so a crash never leaves a half-written value
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, value)?;
        fs::rename(tmp, path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "neon-breakout-{}-{}",
            name,
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemoryStore::new();
        assert_eq!(store.get(HIGH_SCORE_KEY).unwrap(), None);
        store.set(HIGH_SCORE_KEY, "1200").unwrap();
        assert_eq!(store.get(HIGH_SCORE_KEY).unwrap().as_deref(), Some("1200"));
    }

    #[test]
    fn test_file_store_missing_key_is_none() {
        let store = FileStore::new(scratch_dir("missing"));
        assert_eq!(store.get(HIGH_SCORE_KEY).unwrap(), None);
    }

    #[test]
    fn test_file_store_creates_dir_and_overwrites() {
        let dir = scratch_dir("overwrite");
        let store = FileStore::new(&dir);
        store.set(LEADERBOARD_KEY, "[]").unwrap();
        store.set(LEADERBOARD_KEY, "[1]").unwrap();
        assert_eq!(store.get(LEADERBOARD_KEY).unwrap().as_deref(), Some("[1]"));
        assert!(dir.join(LEADERBOARD_KEY).exists());
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_file_store_rejects_path_like_keys() {
        let store = FileStore::new(scratch_dir("keys"));
        assert!(matches!(
            store.set("../escape", "x"),
            Err(StorageError::InvalidKey(_))
        ));
    }
}
