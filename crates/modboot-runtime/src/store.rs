//! Persisted per-user state

use dashmap::DashMap;
use std::fmt;

/// Store key holding the last known host version record
pub const HOST_VERSION_KEY: &str = "cc.version";

/// Store key of a mod's enabled override
pub fn mod_enabled_key(mod_id: &str) -> String {
    format!("modEnabled-{}", mod_id.to_lowercase())
}

/// String key-value store for user overrides and cached state
pub trait KeyValueStore: Send + Sync + fmt::Debug {
    /// Read a value
    fn get(&self, key: &str) -> Option<String>;

    /// Write a value
    fn set(&self, key: &str, value: String);

    /// Delete a value
    fn remove(&self, key: &str);

    /// Whether a mod is enabled: only the exact override `"false"` disables
    fn is_mod_enabled(&self, mod_id: &str) -> bool {
        self.get(&mod_enabled_key(mod_id)).as_deref() != Some("false")
    }
}

/// In-memory store
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, String>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from key-value pairs
    pub fn from_entries<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let store = Self::new();
        for (key, value) in entries {
            store.entries.insert(key.into(), value.into());
        }
        store
    }

    /// Build a store from a JSON object; non-string values are kept as
    /// their JSON text
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        let object: serde_json::Map<String, serde_json::Value> = serde_json::from_str(text)?;

        Ok(Self::from_entries(object.into_iter().map(|(key, value)| {
            let value = match value {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            (key, value)
        })))
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|v| v.value().clone())
    }

    fn set(&self, key: &str, value: String) {
        self.entries.insert(key.to_string(), value);
    }

    fn remove(&self, key: &str) {
        self.entries.remove(key);
    }
}
