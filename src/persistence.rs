//! Durable per-view column preferences (order, visibility, widths).
//!
//! Each slice is stored under its own key as a versioned JSON blob:
//! `{"version": 1, "data": ...}`. Blobs written before versioning existed
//! (a bare array or object) are read as version 0 and migrated on load.
//! Version 1 visibility also records the columns the user hid; version 0
//! only knew the visible keys.
//! Nothing in here ever fails the caller: unreadable or unknown blobs are
//! logged and treated as absent, and write failures are only logged.

use color_eyre::eyre::eyre;
use color_eyre::Result;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

use crate::config::ConfigManager;

pub const PREFERENCES_VERSION: u64 = 1;
const PREFERENCES_DIR: &str = "preferences";

/// Key/value blob storage.
pub trait PreferenceStore: Send {
    fn read(&self, key: &str) -> Result<Option<String>>;
    fn write(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// One JSON file per key under `<config_dir>/preferences/`.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(config: &ConfigManager) -> Self {
        Self {
            dir: config.config_path(PREFERENCES_DIR),
        }
    }

    pub fn with_dir(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{name}.json"))
    }

    /// Remove every stored preference.
    pub fn clear_all(&self) -> Result<()> {
        if self.dir.exists() {
            fs::remove_dir_all(&self.dir)?;
        }
        Ok(())
    }
}

impl PreferenceStore for FileStore {
    fn read(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        fs::read_to_string(&path)
            .map(Some)
            .map_err(|e| eyre!("Failed to read {}: {}", path.display(), e))
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);

        use fs2::FileExt;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)?;

        file.lock_exclusive()?;
        file.write_all(value.as_bytes())?;
        file.flush()?;
        file.unlock()?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }
}

/// In-memory store. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    pub fn insert(&self, key: &str, value: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_string(), value.to_string());
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PreferenceStore for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| eyre!("preference store poisoned"))?;
        Ok(entries.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| eyre!("preference store poisoned"))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| eyre!("preference store poisoned"))?;
        entries.remove(key);
        Ok(())
    }
}

/// Storage identifiers for the three preference slices of one list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageKeys {
    pub order: String,
    pub visibility: String,
    pub widths: String,
}

impl StorageKeys {
    pub fn new(
        order: impl Into<String>,
        visibility: impl Into<String>,
        widths: impl Into<String>,
    ) -> Self {
        Self {
            order: order.into(),
            visibility: visibility.into(),
            widths: widths.into(),
        }
    }

    /// Keys scoped to a view id, so two grids never share preferences.
    pub fn for_view(view: &str) -> Self {
        Self::new(
            format!("{view}.columnOrder"),
            format!("{view}.visibleColumns"),
            format!("{view}.columnWidths"),
        )
    }
}

#[derive(Serialize, Deserialize)]
struct Blob<T> {
    version: u64,
    data: T,
}

/// Decoded blob contents plus the version it was stored with.
#[derive(Debug)]
struct Decoded {
    version: u64,
    data: Value,
}

fn decode_blob(raw: &str) -> Result<Decoded> {
    let value: Value = serde_json::from_str(raw)?;
    match value {
        Value::Object(ref map)
            if map.len() == 2 && map.contains_key("version") && map.contains_key("data") =>
        {
            let version = map
                .get("version")
                .and_then(Value::as_u64)
                .ok_or_else(|| eyre!("blob version is not an unsigned integer"))?;
            let data = map.get("data").cloned().unwrap_or(Value::Null);
            Ok(Decoded { version, data })
        }
        legacy => Ok(Decoded {
            version: 0,
            data: legacy,
        }),
    }
}

/// Stored visibility. `hidden` lists columns the user switched off, so they
/// stay off even though the schema shows them by default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredVisibility {
    pub visible: Vec<String>,
    pub hidden: Vec<String>,
}

/// Reads and writes the preference slices for one list instance.
pub struct Preferences {
    store: Box<dyn PreferenceStore>,
    keys: StorageKeys,
}

impl Preferences {
    pub fn new(store: Box<dyn PreferenceStore>, keys: StorageKeys) -> Self {
        Self { store, keys }
    }

    pub fn keys(&self) -> &StorageKeys {
        &self.keys
    }

    pub fn load_order(&self) -> Option<Vec<String>> {
        let key = &self.keys.order;
        let (_, data) = self.load_data(key)?;
        let items: Vec<Value> = self.parse(key, data)?;
        Some(string_keys(key, items))
    }

    pub fn load_visibility(&self) -> Option<StoredVisibility> {
        let key = &self.keys.visibility;
        let (version, data) = self.load_data(key)?;
        if version == 0 {
            // Version 0 stored only the visible keys.
            let items: Vec<Value> = self.parse(key, data)?;
            return Some(StoredVisibility {
                visible: string_keys(key, items),
                hidden: Vec::new(),
            });
        }

        #[derive(Deserialize)]
        struct Raw {
            #[serde(default)]
            visible: Vec<Value>,
            #[serde(default)]
            hidden: Vec<Value>,
        }
        let raw: Raw = self.parse(key, data)?;
        Some(StoredVisibility {
            visible: string_keys(key, raw.visible),
            hidden: string_keys(key, raw.hidden),
        })
    }

    pub fn load_widths(&self) -> Option<BTreeMap<String, u32>> {
        let (_, data) = self.load_data(&self.keys.widths)?;
        // Version 0 widths may be fractional.
        let raw: BTreeMap<String, f64> = self.parse(&self.keys.widths, data)?;
        Some(
            raw.into_iter()
                .filter(|(_, w)| w.is_finite())
                .map(|(k, w)| (k, w.max(0.0).round() as u32))
                .collect(),
        )
    }

    pub fn save_order(&self, order: &[String]) {
        self.save(&self.keys.order, &order);
    }

    pub fn save_visibility(&self, visibility: &StoredVisibility) {
        self.save(&self.keys.visibility, visibility);
    }

    pub fn save_widths(&self, widths: &BTreeMap<String, u32>) {
        self.save(&self.keys.widths, widths);
    }

    /// Forget all three slices.
    pub fn reset(&self) {
        for key in [&self.keys.order, &self.keys.visibility, &self.keys.widths] {
            if let Err(e) = self.store.remove(key) {
                warn!(key = %key, error = %e, "failed to remove preference");
            }
        }
    }

    fn load_data(&self, key: &str) -> Option<(u64, Value)> {
        let raw = match self.store.read(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(key, error = %e, "failed to read preference, using defaults");
                return None;
            }
        };
        let decoded = match decode_blob(&raw) {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!(key, error = %e, "corrupt preference, using defaults");
                return None;
            }
        };
        if decoded.version > PREFERENCES_VERSION {
            warn!(
                key,
                version = decoded.version,
                supported = PREFERENCES_VERSION,
                "preference written by a newer version, using defaults"
            );
            return None;
        }
        if decoded.version < PREFERENCES_VERSION {
            debug!(key, from = decoded.version, "migrating preference");
        }
        Some((decoded.version, decoded.data))
    }

    fn parse<T: DeserializeOwned>(&self, key: &str, data: Value) -> Option<T> {
        match serde_json::from_value(data) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(key, error = %e, "unexpected preference shape, using defaults");
                None
            }
        }
    }

    fn save<T: Serialize + ?Sized>(&self, key: &str, data: &T) {
        let blob = Blob {
            version: PREFERENCES_VERSION,
            data,
        };
        let result = serde_json::to_string(&blob)
            .map_err(Into::into)
            .and_then(|json| self.store.write(key, &json));
        if let Err(e) = result {
            warn!(key, error = %e, "failed to persist preference");
        }
    }
}

/// Column keys must be strings; anything else is dropped.
fn string_keys(key: &str, items: Vec<Value>) -> Vec<String> {
    let total = items.len();
    let keys: Vec<String> = items
        .into_iter()
        .filter_map(|v| match v {
            Value::String(s) => Some(s),
            _ => None,
        })
        .collect();
    if keys.len() != total {
        debug!(key, dropped = total - keys.len(), "dropped non-string column keys");
    }
    keys
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefs(store: &MemoryStore) -> Preferences {
        Preferences::new(Box::new(store.clone()), StorageKeys::for_view("loans"))
    }

    #[test]
    fn test_storage_keys_are_scoped_per_view() {
        let a = StorageKeys::for_view("loans");
        let b = StorageKeys::for_view("lenders");
        assert_eq!(a.order, "loans.columnOrder");
        assert_ne!(a.order, b.order);
        assert_ne!(a.visibility, a.widths);
    }

    #[test]
    fn test_save_writes_versioned_blob() {
        let store = MemoryStore::new();
        prefs(&store).save_order(&["b".to_string(), "a".to_string()]);
        let raw = store.get("loans.columnOrder").unwrap();
        let value: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value, serde_json::json!({"version": 1, "data": ["b", "a"]}));
        assert_eq!(
            prefs(&store).load_order(),
            Some(vec!["b".to_string(), "a".to_string()])
        );
    }

    #[test]
    fn test_legacy_unversioned_blob_is_migrated() {
        let store = MemoryStore::new();
        store.insert("loans.columnOrder", r#"["amount", "name"]"#);
        store.insert("loans.columnWidths", r#"{"amount": 150.6, "name": 90}"#);
        let p = prefs(&store);
        assert_eq!(
            p.load_order(),
            Some(vec!["amount".to_string(), "name".to_string()])
        );
        let widths = p.load_widths().unwrap();
        assert_eq!(widths.get("amount"), Some(&151));
        assert_eq!(widths.get("name"), Some(&90));
    }

    #[test]
    fn test_corrupt_blob_falls_back() {
        let store = MemoryStore::new();
        store.insert("loans.visibleColumns", "{not json");
        assert_eq!(prefs(&store).load_visibility(), None);
    }

    #[test]
    fn test_newer_version_is_ignored() {
        let store = MemoryStore::new();
        store.insert("loans.columnOrder", r#"{"version": 99, "data": ["a"]}"#);
        assert_eq!(prefs(&store).load_order(), None);
    }

    #[test]
    fn test_wrong_shape_falls_back() {
        let store = MemoryStore::new();
        store.insert("loans.columnOrder", r#"{"version": 1, "data": {"a": 1}}"#);
        assert_eq!(prefs(&store).load_order(), None);
    }

    #[test]
    fn test_non_string_keys_are_filtered() {
        let store = MemoryStore::new();
        store.insert("loans.visibleColumns", r#"["name", 3, null, "amount"]"#);
        let stored = prefs(&store).load_visibility().unwrap();
        assert_eq!(stored.visible, vec!["name".to_string(), "amount".to_string()]);
        assert!(stored.hidden.is_empty());
    }

    #[test]
    fn test_visibility_round_trip_keeps_hidden() {
        let store = MemoryStore::new();
        let stored = StoredVisibility {
            visible: vec!["name".to_string()],
            hidden: vec!["amount".to_string()],
        };
        prefs(&store).save_visibility(&stored);
        assert_eq!(prefs(&store).load_visibility(), Some(stored));
    }

    #[test]
    fn test_reset_removes_all_slices() {
        let store = MemoryStore::new();
        let p = prefs(&store);
        p.save_order(&["a".to_string()]);
        p.save_visibility(&StoredVisibility {
            visible: vec!["a".to_string()],
            hidden: Vec::new(),
        });
        p.save_widths(&BTreeMap::from([("a".to_string(), 120)]));
        assert_eq!(store.len(), 3);
        p.reset();
        assert!(store.is_empty());
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::with_dir(dir.path().join("preferences"));
        assert_eq!(store.read("view/one").unwrap(), None);
        store.write("view/one", "[1]").unwrap();
        assert_eq!(store.read("view/one").unwrap().as_deref(), Some("[1]"));
        assert!(dir.path().join("preferences/view_one.json").exists());
        store.remove("view/one").unwrap();
        assert_eq!(store.read("view/one").unwrap(), None);
        store.write("x", "1").unwrap();
        store.clear_all().unwrap();
        assert!(!store.dir().exists());
    }
}
