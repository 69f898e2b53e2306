// JSON file store
// One pretty-printed file per crate under crates/, plus locations.json

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::{CrateStore, LocationIndex, StoredConfig};
use crate::config::files;
use crate::crates::CrateConfig;
use crate::error::StoreError;

pub struct JsonFileStore {
    crates_dir: PathBuf,
    locations_path: PathBuf,
}

impl JsonFileStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        let data_dir = data_dir.as_ref();
        Self {
            crates_dir: data_dir.join(files::CRATES_DIR),
            locations_path: data_dir.join(files::LOCATIONS),
        }
    }

    pub fn crates_dir(&self) -> &Path {
        &self.crates_dir
    }

    fn crate_path(&self, id: &str) -> PathBuf {
        self.crates_dir.join(format!("{id}.json"))
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    let raw = fs::read_to_string(path).map_err(|e| StoreError::io(path, e))?;
    serde_json::from_str(&raw).map_err(|e| StoreError::json(path, e))
}

/// Write through a sibling temp file so a crash never leaves half a file
fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
    }
    let raw = serde_json::to_string_pretty(value).map_err(|e| StoreError::json(path, e))?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, raw).map_err(|e| StoreError::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| StoreError::io(path, e))
}

impl CrateStore for JsonFileStore {
    fn load_crate_definitions(&self) -> Result<Vec<StoredConfig>, StoreError> {
        if !self.crates_dir.is_dir() {
            warn!(dir = %self.crates_dir.display(), "Crates folder not found!");
            return Ok(Vec::new());
        }

        let mut paths: Vec<PathBuf> = fs::read_dir(&self.crates_dir)
            .map_err(|e| StoreError::io(&self.crates_dir, e))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();

        if paths.is_empty() {
            warn!("No crate configuration files found!");
        }

        Ok(paths.iter().map(|path| read_json(path)).collect())
    }

    fn save_crate_definition(&self, config: &CrateConfig) -> Result<(), StoreError> {
        write_json(&self.crate_path(&config.id), config)
    }

    fn delete_crate_definition(&self, id: &str) -> Result<bool, StoreError> {
        let path = self.crate_path(id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::io(&path, e)),
        }
    }

    fn load_location_index(&self) -> Result<LocationIndex, StoreError> {
        if !self.locations_path.exists() {
            return Ok(LocationIndex::new());
        }
        let index: LocationIndex = read_json(&self.locations_path)?;
        info!(crates = index.len(), "Read crate location file");
        Ok(index)
    }

    fn save_location_index(&self, index: &LocationIndex) -> Result<(), StoreError> {
        write_json(&self.locations_path, index)
    }
}
