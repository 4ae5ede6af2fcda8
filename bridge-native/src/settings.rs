//! Settings Storage backed by one JSON document
//!
//! Mirrors the plist-style preference storage mobile hosts provide: a flat
//! key-value map persisted as a single file in the app data directory. Every
//! mutation rewrites the document.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::SettingsStore,
};
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// JSON-file-backed settings store.
pub struct JsonFileSettingsStore {
    /// Document path; `None` keeps the store memory-only (tests).
    path: Option<PathBuf>,
    values: Mutex<HashMap<String, Value>>,
}

impl JsonFileSettingsStore {
    /// Open (or create) the settings document at `path`.
    pub async fn new(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(BridgeError::Io)?;
        }

        let values = match tokio::fs::read(&path).await {
            Ok(raw) => match serde_json::from_slice(&raw) {
                Ok(map) => map,
                Err(e) => {
                    warn!(path = ?path, error = %e, "settings document unreadable, starting empty");
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(BridgeError::Io(e)),
        };

        debug!(path = ?path, keys = values.len(), "Initialized settings store");

        Ok(Self {
            path: Some(path),
            values: Mutex::new(values),
        })
    }

    /// Create a memory-only settings store (for testing).
    pub fn in_memory() -> Self {
        Self {
            path: None,
            values: Mutex::new(HashMap::new()),
        }
    }

    async fn persist(&self, values: &HashMap<String, Value>) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let raw = serde_json::to_vec_pretty(values)
            .map_err(|e| BridgeError::OperationFailed(format!("settings encode: {}", e)))?;
        tokio::fs::write(path, raw).await.map_err(BridgeError::Io)
    }

    async fn set_value(&self, key: &str, value: Value) -> Result<()> {
        let mut values = self.values.lock().await;
        values.insert(key.to_string(), value);
        self.persist(&values).await
    }

    async fn get_value(&self, key: &str) -> Option<Value> {
        self.values.lock().await.get(key).cloned()
    }
}

#[async_trait]
impl SettingsStore for JsonFileSettingsStore {
    async fn set_string(&self, key: &str, value: &str) -> Result<()> {
        self.set_value(key, Value::String(value.to_string())).await
    }

    async fn get_string(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .get_value(key)
            .await
            .and_then(|v| v.as_str().map(str::to_string)))
    }

    async fn set_bool(&self, key: &str, value: bool) -> Result<()> {
        self.set_value(key, Value::Bool(value)).await
    }

    async fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        Ok(self.get_value(key).await.and_then(|v| v.as_bool()))
    }

    async fn set_i64(&self, key: &str, value: i64) -> Result<()> {
        self.set_value(key, Value::from(value)).await
    }

    async fn get_i64(&self, key: &str) -> Result<Option<i64>> {
        Ok(self.get_value(key).await.and_then(|v| v.as_i64()))
    }

    async fn set_f64(&self, key: &str, value: f64) -> Result<()> {
        self.set_value(key, Value::from(value)).await
    }

    async fn get_f64(&self, key: &str) -> Result<Option<f64>> {
        Ok(self.get_value(key).await.and_then(|v| v.as_f64()))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut values = self.values.lock().await;
        values.remove(key);
        self.persist(&values).await
    }

    async fn has_key(&self, key: &str) -> Result<bool> {
        Ok(self.values.lock().await.contains_key(key))
    }
}
