//! Named snapshots of the value map, grouped per shader id and persisted as
//! one JSON record through a small key-value storage trait.
//!
//! Loading never fails: missing or unreadable records start an empty table.
//! Every add or remove rewrites the whole record; a failed write is logged
//! and the in-memory table stays authoritative for the session.
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use catalog::ParameterValueMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::store::{ParameterStore, StoreError};

/// Storage key of the preset table.
pub const PRESET_STORAGE_KEY: &str = "shader-playground-presets";

#[derive(Debug, Error)]
pub enum PresetError {
    #[error("preset name must not be empty")]
    EmptyName,
    #[error("no shader is active")]
    NoActiveShader,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("failed to serialise presets: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("preset storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preset {
    pub id: String,
    pub name: String,
    pub shader_id: String,
    pub uniform_values: ParameterValueMap,
    /// Milliseconds since the Unix epoch.
    pub created_at: i64,
}

/// Presets keyed by shader id, each list in creation order.
pub type PresetTable = BTreeMap<String, Vec<Preset>>;

pub trait PresetStorage {
    fn read(&self, key: &str) -> Result<Option<String>, PresetError>;
    fn write(&mut self, key: &str, value: &str) -> Result<(), PresetError>;
}

/// Stores each key as `<dir>/<key>.json`, or every key in one fixed file.
#[derive(Debug, Clone)]
pub struct FileStorage {
    location: Location,
}

#[derive(Debug, Clone)]
enum Location {
    Directory(PathBuf),
    File(PathBuf),
}

impl FileStorage {
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            location: Location::Directory(dir.into()),
        }
    }

    pub fn at_file(path: impl Into<PathBuf>) -> Self {
        Self {
            location: Location::File(path.into()),
        }
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        match &self.location {
            Location::Directory(dir) => dir.join(format!("{key}.json")),
            Location::File(path) => path.clone(),
        }
    }
}

impl PresetStorage for FileStorage {
    fn read(&self, key: &str) -> Result<Option<String>, PresetError> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(path)?))
    }

    fn write(&mut self, key: &str, value: &str) -> Result<(), PresetError> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, value)?;
        fs::rename(&staging, &path)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: HashMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(key: &str, value: &str) -> Self {
        let mut storage = Self::new();
        storage.entries.insert(key.to_string(), value.to_string());
        storage
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }
}

impl PresetStorage for MemoryStorage {
    fn read(&self, key: &str) -> Result<Option<String>, PresetError> {
        Ok(self.entries.get(key).cloned())
    }

    fn write(&mut self, key: &str, value: &str) -> Result<(), PresetError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

pub struct PresetManager<S> {
    storage: S,
    table: PresetTable,
}

impl<S: PresetStorage> PresetManager<S> {
    pub fn load(storage: S) -> Self {
        let table = match storage.read(PRESET_STORAGE_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<PresetTable>(&raw) {
                Ok(table) => table,
                Err(err) => {
                    warn!(error = %err, "preset storage is corrupt; starting empty");
                    PresetTable::new()
                }
            },
            Ok(None) => PresetTable::new(),
            Err(err) => {
                warn!(error = %err, "failed to read preset storage; starting empty");
                PresetTable::new()
            }
        };
        debug!(
            shaders = table.len(),
            presets = table.values().map(Vec::len).sum::<usize>(),
            "loaded presets"
        );
        Self { storage, table }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn table(&self) -> &PresetTable {
        &self.table
    }

    pub fn presets_for(&self, shader_id: &str) -> &[Preset] {
        self.table.get(shader_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn find(&self, id: &str) -> Option<&Preset> {
        self.table.values().flatten().find(|preset| preset.id == id)
    }

    pub fn save(&mut self, store: &ParameterStore, name: &str) -> Result<Preset, PresetError> {
        self.save_at(store, name, Utc::now())
    }

    /// Snapshots the store's value map under `name` for the active shader.
    pub fn save_at(
        &mut self,
        store: &ParameterStore,
        name: &str,
        now: DateTime<Utc>,
    ) -> Result<Preset, PresetError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(PresetError::EmptyName);
        }
        let descriptor = store.descriptor().ok_or(PresetError::NoActiveShader)?;
        let shader_id = descriptor.id().to_string();
        let created_at = now.timestamp_millis();

        let base = format!("{shader_id}-{created_at}");
        let mut id = base.clone();
        let mut suffix = 2;
        while self.find(&id).is_some() {
            id = format!("{base}-{suffix}");
            suffix += 1;
        }

        let preset = Preset {
            id,
            name: name.to_string(),
            shader_id: shader_id.clone(),
            uniform_values: store.values().clone(),
            created_at,
        };
        self.table
            .entry(shader_id)
            .or_default()
            .push(preset.clone());
        self.persist();
        info!(preset = %preset.id, name = %preset.name, shader = %preset.shader_id, "saved preset");
        Ok(preset)
    }

    /// Removes a preset from whichever shader owns it.
    pub fn remove(&mut self, id: &str) -> Option<Preset> {
        let mut removed = None;
        for list in self.table.values_mut() {
            if let Some(index) = list.iter().position(|preset| preset.id == id) {
                removed = Some(list.remove(index));
                break;
            }
        }
        if removed.is_some() {
            self.table.retain(|_, list| !list.is_empty());
            self.persist();
            info!(preset = %id, "removed preset");
        }
        removed
    }

    /// Replaces the store's value map with a preset of the active shader.
    /// Returns false when the active shader has no preset with that id.
    pub fn apply(&self, id: &str, store: &mut ParameterStore) -> Result<bool, PresetError> {
        let Some(preset) = self
            .presets_for(store.shader_id())
            .iter()
            .find(|preset| preset.id == id)
        else {
            debug!(preset = %id, shader = %store.shader_id(), "preset not found for active shader");
            return Ok(false);
        };
        store.replace_values(&preset.uniform_values)?;
        info!(preset = %preset.id, name = %preset.name, "applied preset");
        Ok(true)
    }

    fn persist(&mut self) {
        let result = serde_json::to_string(&self.table)
            .map_err(PresetError::from)
            .and_then(|raw| self.storage.write(PRESET_STORAGE_KEY, &raw));
        if let Err(err) = result {
            warn!(error = %err, "failed to persist presets");
        }
    }
}

/// Reads a preset table straight from a file, for tooling that does not need a store.
pub fn read_table(path: &Path) -> PresetTable {
    let storage = FileStorage::at_file(path);
    PresetManager::load(storage).table
}
