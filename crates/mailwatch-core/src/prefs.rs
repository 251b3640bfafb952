//! Durable user preferences: two independent booleans read on demand, no
//! caching beyond the store's own persistence. The trait enables mock
//! injection for testing.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Preference key: desktop notifications enabled.
pub const PREF_NOTIFICATIONS_ENABLED: &str = "notifications_enabled";

/// Preference key: engagement tracking enabled.
pub const PREF_TRACKING_ENABLED: &str = "tracking_enabled";

#[derive(Debug, Error)]
pub enum PrefsError {
    #[error("prefs io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("prefs decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Durable boolean preference storage. Reads happen on demand per
/// operation; unknown keys fall back to `true` (features default on).
pub trait PrefStore: Send + Sync {
    fn get(&self, key: &str) -> bool;
    fn set(&self, key: &str, value: bool) -> Result<(), PrefsError>;
}

impl<T: PrefStore + ?Sized> PrefStore for &T {
    fn get(&self, key: &str) -> bool {
        (**self).get(key)
    }
    fn set(&self, key: &str, value: bool) -> Result<(), PrefsError> {
        (**self).set(key, value)
    }
}

impl<T: PrefStore + ?Sized> PrefStore for std::sync::Arc<T> {
    fn get(&self, key: &str) -> bool {
        (**self).get(key)
    }
    fn set(&self, key: &str, value: bool) -> Result<(), PrefsError> {
        (**self).set(key, value)
    }
}

// ─── File-backed store ────────────────────────────────────────────

/// JSON-file preference store. Every `get` re-reads the file so an external
/// edit (or a second process) is picked up on the next operation.
pub struct FilePrefStore {
    path: PathBuf,
}

impl FilePrefStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the default per-user config location.
    pub fn default_location() -> Self {
        Self::new(default_prefs_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> BTreeMap<String, bool> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_default(),
            Err(_) => BTreeMap::new(),
        }
    }
}

impl PrefStore for FilePrefStore {
    fn get(&self, key: &str) -> bool {
        self.read_map().get(key).copied().unwrap_or(true)
    }

    fn set(&self, key: &str, value: bool) -> Result<(), PrefsError> {
        let mut map = self.read_map();
        map.insert(key.to_string(), value);
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        // Write-then-rename so a crash mid-write cannot truncate the file.
        let tmp = self.path.with_extension("json.tmp");
        let mut file = std::fs::File::create(&tmp)?;
        file.write_all(serde_json::to_string_pretty(&map)?.as_bytes())?;
        file.sync_all()?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// Default prefs path using XDG config dir, falling back to ~/.config.
pub fn default_prefs_path() -> PathBuf {
    if let Ok(dir) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(dir).join("mailwatch").join("prefs.json");
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home)
        .join(".config")
        .join("mailwatch")
        .join("prefs.json")
}

// ─── In-memory store (tests and fakes) ────────────────────────────

/// Mutex-backed in-memory store, primarily for tests.
#[derive(Debug, Default)]
pub struct MemPrefStore {
    map: std::sync::Mutex<BTreeMap<String, bool>>,
}

impl MemPrefStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(key: &str, value: bool) -> Self {
        let store = Self::new();
        let _ = store.set(key, value);
        store
    }
}

impl PrefStore for MemPrefStore {
    fn get(&self, key: &str) -> bool {
        self.map
            .lock()
            .map(|m| m.get(key).copied().unwrap_or(true))
            .unwrap_or(true)
    }

    fn set(&self, key: &str, value: bool) -> Result<(), PrefsError> {
        if let Ok(mut m) = self.map.lock() {
            m.insert(key.to_string(), value);
        }
        Ok(())
    }
}
