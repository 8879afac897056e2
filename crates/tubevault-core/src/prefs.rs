//! User preferences.
//!
//! Theme, per-view filter state and the pinned playlist live in a string
//! key/value store. Storage is a convenience: reads that fail yield the
//! default, writes that fail are dropped.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Key holding the theme name.
pub const THEME_KEY: &str = "tubevault-theme";

/// Prefix of per-route filter keys.
pub const FILTERS_PREFIX: &str = "tv_filters_";

/// Key holding the pinned playlist.
pub const PINNED_PLAYLIST_KEY: &str = "tv_quick_playlist";

/// Storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Malformed storage contents: {0}")]
    Format(#[from] serde_json::Error),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// A string key/value store.
pub trait KeyValueStore: Send + Sync {
    /// Read a value.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write a value.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove a value. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.values.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.values.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.values.lock().remove(key);
        Ok(())
    }
}

/// Store persisted as one JSON object in a file.
///
/// The file is re-read on every access, so edits by other processes are
/// picked up. A missing file reads as empty.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<Map<String, Value>, StorageError> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) if raw.trim().is_empty() => Ok(Map::new()),
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Map::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, values: &Map<String, Value>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(values)?)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let _guard = self.lock.lock();
        Ok(match self.read()?.remove(key) {
            Some(Value::String(s)) => Some(s),
            Some(other) => Some(other.to_string()),
            None => None,
        })
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let _guard = self.lock.lock();
        let mut values = self.read()?;
        values.insert(key.to_string(), Value::String(value.to_string()));
        self.write(&values)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let _guard = self.lock.lock();
        let mut values = self.read()?;
        if values.remove(key).is_some() {
            self.write(&values)?;
        }
        Ok(())
    }
}

/// Colour theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Theme {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Dark => "dark",
            Theme::Light => "light",
        }
    }

    /// The other theme.
    #[must_use]
    pub fn toggled(self) -> Self {
        match self {
            Theme::Dark => Theme::Light,
            Theme::Light => Theme::Dark,
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "dark" => Some(Theme::Dark),
            "light" => Some(Theme::Light),
            _ => None,
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The playlist targeted by one-click "add to playlist".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinnedPlaylist {
    pub id: i64,
    pub name: String,
}

/// Typed preferences over a [`KeyValueStore`].
pub struct Preferences<S> {
    store: S,
}

impl<S: KeyValueStore> Preferences<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    fn read(&self, key: &str) -> Option<String> {
        match self.store.get(key) {
            Ok(value) => value,
            Err(e) => {
                debug!(key, error = %e, "Preference read failed");
                None
            }
        }
    }

    fn write(&self, key: &str, value: &str) {
        if let Err(e) = self.store.set(key, value) {
            debug!(key, error = %e, "Preference write failed");
        }
    }

    fn delete(&self, key: &str) {
        if let Err(e) = self.store.remove(key) {
            debug!(key, error = %e, "Preference remove failed");
        }
    }

    /// Stored theme, dark when unset.
    pub fn theme(&self) -> Theme {
        self.read(THEME_KEY)
            .and_then(|s| Theme::parse(&s))
            .unwrap_or_default()
    }

    pub fn set_theme(&self, theme: Theme) {
        self.write(THEME_KEY, theme.as_str());
    }

    /// Flip the theme and return the new one.
    pub fn toggle_theme(&self) -> Theme {
        let next = self.theme().toggled();
        self.set_theme(next);
        next
    }

    /// Saved filters of a route, empty when unset or unreadable.
    pub fn load_filters(&self, route: &str) -> Map<String, Value> {
        let key = format!("{FILTERS_PREFIX}{route}");
        self.read(&key)
            .and_then(|raw| match serde_json::from_str(&raw) {
                Ok(filters) => Some(filters),
                Err(e) => {
                    debug!(key, error = %e, "Discarding malformed filters");
                    None
                }
            })
            .unwrap_or_default()
    }

    /// Merge `filters` over the saved filters of a route.
    pub fn save_filters(&self, route: &str, filters: Map<String, Value>) {
        let mut merged = self.load_filters(route);
        merged.extend(filters);
        let key = format!("{FILTERS_PREFIX}{route}");
        match serde_json::to_string(&merged) {
            Ok(raw) => self.write(&key, &raw),
            Err(e) => debug!(key, error = %e, "Filter encode failed"),
        }
    }

    /// A single saved filter value.
    pub fn filter(&self, route: &str, key: &str) -> Option<Value> {
        self.load_filters(route).remove(key)
    }

    pub fn clear_filters(&self, route: &str) {
        self.delete(&format!("{FILTERS_PREFIX}{route}"));
    }

    /// The pinned playlist, if any.
    pub fn pinned_playlist(&self) -> Option<PinnedPlaylist> {
        let raw = self.read(PINNED_PLAYLIST_KEY)?;
        serde_json::from_str(&raw)
            .map_err(|e| debug!(error = %e, "Discarding malformed pinned playlist"))
            .ok()
    }

    pub fn pin_playlist(&self, id: i64, name: impl Into<String>) {
        let pinned = PinnedPlaylist {
            id,
            name: name.into(),
        };
        match serde_json::to_string(&pinned) {
            Ok(raw) => self.write(PINNED_PLAYLIST_KEY, &raw),
            Err(e) => debug!(error = %e, "Pinned playlist encode failed"),
        }
    }

    pub fn unpin_playlist(&self) {
        self.delete(PINNED_PLAYLIST_KEY);
    }
}

impl<S: fmt::Debug> fmt::Debug for Preferences<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Preferences")
            .field("store", &self.store)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Err(StorageError::Unavailable("blocked".into()))
        }

        fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("quota exceeded".into()))
        }

        fn remove(&self, _key: &str) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("blocked".into()))
        }
    }

    fn filters(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_theme_defaults_and_toggles() {
        let prefs = Preferences::new(MemoryStore::new());
        assert_eq!(prefs.theme(), Theme::Dark);

        assert_eq!(prefs.toggle_theme(), Theme::Light);
        assert_eq!(prefs.store().get(THEME_KEY).unwrap().as_deref(), Some("light"));
        assert_eq!(prefs.toggle_theme(), Theme::Dark);

        prefs.store().set(THEME_KEY, "neon").unwrap();
        assert_eq!(prefs.theme(), Theme::Dark);
    }

    #[test]
    fn test_filters_merge_on_save() {
        let prefs = Preferences::new(MemoryStore::new());
        prefs.save_filters("library", filters(json!({"sort": "title", "type": "short"})));
        prefs.save_filters("library", filters(json!({"sort": "date", "page": 2})));

        let saved = prefs.load_filters("library");
        assert_eq!(Value::Object(saved), json!({"sort": "date", "type": "short", "page": 2}));
        assert_eq!(prefs.filter("library", "type"), Some(json!("short")));
        assert_eq!(prefs.filter("library", "missing"), None);
        assert!(prefs.load_filters("feed").is_empty());

        prefs.clear_filters("library");
        assert!(prefs.load_filters("library").is_empty());
    }

    #[test]
    fn test_malformed_values_read_as_default() {
        let store = MemoryStore::new();
        store.set("tv_filters_feed", "{not json").unwrap();
        store.set(PINNED_PLAYLIST_KEY, "[]").unwrap();

        let prefs = Preferences::new(store);
        assert!(prefs.load_filters("feed").is_empty());
        assert_eq!(prefs.pinned_playlist(), None);
    }

    #[test]
    fn test_pinned_playlist() {
        let prefs = Preferences::new(MemoryStore::new());
        assert_eq!(prefs.pinned_playlist(), None);

        prefs.pin_playlist(7, "Watch later");
        assert_eq!(
            prefs.pinned_playlist(),
            Some(PinnedPlaylist {
                id: 7,
                name: "Watch later".into(),
            })
        );

        prefs.unpin_playlist();
        assert_eq!(prefs.pinned_playlist(), None);
    }

    #[test]
    fn test_storage_failures_are_swallowed() {
        let prefs = Preferences::new(BrokenStore);
        prefs.set_theme(Theme::Light);
        assert_eq!(prefs.theme(), Theme::Dark);
        prefs.save_filters("library", filters(json!({"sort": "title"})));
        assert!(prefs.load_filters("library").is_empty());
        prefs.pin_playlist(1, "x");
        prefs.unpin_playlist();
        prefs.clear_filters("library");
        assert_eq!(prefs.pinned_playlist(), None);
    }

    #[test]
    fn test_file_store_persists() {
        let dir = std::env::temp_dir().join(format!("tubevault-prefs-{}", std::process::id()));
        let path = dir.join("prefs.json");
        let _ = std::fs::remove_file(&path);

        let store = FileStore::new(&path);
        assert_eq!(store.get("a").unwrap(), None);
        store.set("a", "1").unwrap();
        store.set("b", "2").unwrap();
        store.remove("b").unwrap();
        store.remove("missing").unwrap();

        let reopened = Preferences::new(FileStore::new(&path));
        assert_eq!(reopened.store().get("a").unwrap().as_deref(), Some("1"));
        assert_eq!(reopened.store().get("b").unwrap(), None);

        std::fs::write(&path, "garbage").unwrap();
        assert!(matches!(reopened.store().get("a"), Err(StorageError::Format(_))));
        assert_eq!(reopened.theme(), Theme::Dark);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
