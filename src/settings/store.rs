//! Key/value persistence behind the settings snapshot
//!
//! Each setting lives under its own key. The engine only ever reads the whole
//! document and writes single keys.

use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::settings::snapshot::SettingKey;

/// Raw stored document: setting key → JSON value
pub type RawSettings = serde_json::Map<String, Value>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to access settings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse settings file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Settings file {0} does not contain a JSON object")]
    NotAnObject(PathBuf),

    #[error("Settings store unavailable: {0}")]
    Unavailable(String),
}

/// Persistent settings backend
pub trait SettingsStore {
    /// Read every stored key
    fn load(&self) -> Result<RawSettings, StoreError>;

    /// Write a single key
    fn save(&mut self, key: SettingKey, value: Value) -> Result<(), StoreError>;
}

/// In-memory store, used for tests and scripted sessions
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    values: HashMap<String, Value>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_raw(raw: RawSettings) -> Self {
        Self {
            values: raw.into_iter().collect(),
        }
    }

    pub fn get(&self, key: SettingKey) -> Option<&Value> {
        self.values.get(key.as_str())
    }

    /// Write a value as another browsing context would, bypassing the engine
    pub fn set_external(&mut self, key: SettingKey, value: Value) {
        self.values.insert(key.as_str().to_string(), value);
    }
}

impl SettingsStore for MemoryStore {
    fn load(&self) -> Result<RawSettings, StoreError> {
        Ok(self.values.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }

    fn save(&mut self, key: SettingKey, value: Value) -> Result<(), StoreError> {
        self.values.insert(key.as_str().to_string(), value);
        Ok(())
    }
}

/// JSON document on disk
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<config dir>/link-preview/settings.json`
    pub fn default_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(crate::constants::config::APP_DIR);
        path.push(crate::constants::config::FILENAME);
        path
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl SettingsStore for JsonFileStore {
    fn load(&self) -> Result<RawSettings, StoreError> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "No settings file, using defaults");
            return Ok(RawSettings::new());
        }

        let contents = fs::read_to_string(&self.path).map_err(|e| self.io_error(e))?;
        let document: Value = serde_json::from_str(&contents).map_err(|source| StoreError::Json {
            path: self.path.clone(),
            source,
        })?;

        match document {
            Value::Object(map) => Ok(map),
            _ => Err(StoreError::NotAnObject(self.path.clone())),
        }
    }

    fn save(&mut self, key: SettingKey, value: Value) -> Result<(), StoreError> {
        let mut document = self.load()?;
        document.insert(key.as_str().to_string(), value);

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }

        let json = serde_json::to_string_pretty(&Value::Object(document)).map_err(|source| StoreError::Json {
            path: self.path.clone(),
            source,
        })?;
        fs::write(&self.path, json).map_err(|e| self.io_error(e))?;

        info!(path = %self.path.display(), key = key.as_str(), "Saved setting");
        Ok(())
    }
}
