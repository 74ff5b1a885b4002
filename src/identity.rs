//! Local Identity
//!
//! The only identity in the system is a self-chosen nickname kept in
//! client-local storage. There is no session and no server round trip.
//!
//! [`LocalStorage`] is a small string key/value file standing in for the
//! browser's `localStorage`; [`NicknameStore`] keeps the nickname under
//! [`NICKNAME_KEY`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Storage key holding the display nickname
pub const NICKNAME_KEY: &str = "rytup-nickname";

/// Name shown and stored for users who never picked a nickname
pub const ANONYMOUS: &str = "Anonymous";

#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("Failed to write {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode local storage: {0}")]
    Encode(#[from] serde_json::Error),
}

/// File-backed string key/value store
#[derive(Debug, Clone)]
pub struct LocalStorage {
    path: PathBuf,
    items: BTreeMap<String, String>,
}

impl LocalStorage {
    /// Open the store at `path`. A missing or unreadable file reads as empty;
    /// an unreadable one is first copied to `{path}.bak` so the next write
    /// does not lose it.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let items = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                let backup = backup_path(&path);
                match std::fs::copy(&path, &backup) {
                    Ok(_) => tracing::warn!(
                        "Ignoring unreadable local storage {:?} ({}); kept a copy at {:?}",
                        path,
                        e,
                        backup
                    ),
                    Err(copy_err) => tracing::warn!(
                        "Ignoring unreadable local storage {:?} ({}); backup failed: {}",
                        path,
                        e,
                        copy_err
                    ),
                }
                BTreeMap::new()
            }),
            Err(_) => BTreeMap::new(),
        };

        Self { path, items }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get_item(&self, key: &str) -> Option<&str> {
        self.items.get(key).map(String::as_str)
    }

    pub fn set_item(&mut self, key: &str, value: &str) -> Result<(), IdentityError> {
        self.items.insert(key.to_string(), value.to_string());
        self.persist()
    }

    fn persist(&self) -> Result<(), IdentityError> {
        let write_err = |source| IdentityError::Write {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        let content = serde_json::to_string_pretty(&self.items)?;
        std::fs::write(&self.path, content).map_err(write_err)
    }
}

/// `local_storage.json` -> `local_storage.json.bak`
fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".bak");
    PathBuf::from(name)
}

/// The persisted display nickname
#[derive(Debug, Clone)]
pub struct NicknameStore {
    storage: LocalStorage,
    nickname: String,
}

impl NicknameStore {
    pub fn new(storage: LocalStorage) -> Self {
        let nickname = storage.get_item(NICKNAME_KEY).unwrap_or_default().to_string();
        Self { storage, nickname }
    }

    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self::new(LocalStorage::open(path))
    }

    /// Current nickname, empty if never set
    pub fn get(&self) -> &str {
        &self.nickname
    }

    /// Persist the trimmed nickname and update the in-memory copy
    pub fn set(&mut self, name: &str) -> Result<(), IdentityError> {
        let trimmed = name.trim();
        self.storage.set_item(NICKNAME_KEY, trimmed)?;
        self.nickname = trimmed.to_string();
        tracing::debug!(nickname = %self.nickname, "nickname updated");
        Ok(())
    }

    /// Name to attach to new rows
    pub fn display_name(&self) -> String {
        display_name(&self.nickname)
    }
}

/// `nickname` or [`ANONYMOUS`] when it is blank
pub fn display_name(nickname: &str) -> String {
    let trimmed = nickname.trim();
    if trimmed.is_empty() {
        ANONYMOUS.to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_unset_nickname_is_empty() {
        let dir = tempdir().unwrap();
        let store = NicknameStore::open(dir.path().join("local_storage.json"));

        assert_eq!(store.get(), "");
        assert_eq!(store.display_name(), ANONYMOUS);
    }

    #[test]
    fn test_set_trims_and_persists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("local_storage.json");

        let mut store = NicknameStore::open(&path);
        store.set("  Priya  ").unwrap();
        assert_eq!(store.get(), "Priya");

        let reopened = NicknameStore::open(&path);
        assert_eq!(reopened.get(), "Priya");
        assert_eq!(reopened.display_name(), "Priya");
    }

    #[test]
    fn test_blank_nickname_is_stored_as_blank() {
        let dir = tempdir().unwrap();
        let mut store = NicknameStore::open(dir.path().join("ls.json"));
        store.set("   ").unwrap();

        assert_eq!(store.get(), "");
        assert_eq!(store.display_name(), ANONYMOUS);
    }

    #[test]
    fn test_other_keys_survive() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ls.json");

        let mut storage = LocalStorage::open(&path);
        storage.set_item("theme", "dark").unwrap();

        let mut store = NicknameStore::open(&path);
        store.set("Ravi").unwrap();

        let storage = LocalStorage::open(&path);
        assert_eq!(storage.get_item("theme"), Some("dark"));
        assert_eq!(storage.get_item(NICKNAME_KEY), Some("Ravi"));
    }

    #[test]
    fn test_corrupt_file_reads_as_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ls.json");
        std::fs::write(&path, "not json").unwrap();

        assert_eq!(NicknameStore::open(&path).get(), "");
    }

    #[test]
    fn test_corrupt_file_is_backed_up_before_overwrite() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("local_storage.json");
        std::fs::write(&path, "{\"rytup-nickname\": \"Mee").unwrap();

        let mut store = NicknameStore::open(&path);
        store.set("Meera").unwrap();

        let backup = dir.path().join("local_storage.json.bak");
        assert_eq!(
            std::fs::read_to_string(&backup).unwrap(),
            "{\"rytup-nickname\": \"Mee"
        );
        assert_eq!(NicknameStore::open(&path).get(), "Meera");
    }
}
