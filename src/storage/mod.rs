/// Persistence layer for crate definitions and the location index
///
/// - `JsonFileStore`: `crates/<id>.json` plus `locations.json` under a data directory
/// - `SqliteStore`: single database file (native targets only)
/// - `MemoryStore`: in-process, used by tests and embedders without a disk
/// - `BackgroundStore`: write-behind wrapper around any of the above

use std::collections::BTreeMap;

use crate::crates::CrateConfig;
use crate::error::StoreError;

mod json;
mod memory;
#[cfg(not(target_family = "wasm"))]
mod sqlite;
mod writer;

pub use json::JsonFileStore;
pub use memory::MemoryStore;
#[cfg(not(target_family = "wasm"))]
pub use sqlite::SqliteStore;
pub use writer::BackgroundStore;

/// Crate id -> ordered `world:x:y:z` strings
pub type LocationIndex = BTreeMap<String, Vec<String>>;

/// One stored definition; unreadable entries are reported, not fatal
pub type StoredConfig = Result<CrateConfig, StoreError>;

pub trait CrateStore: Send + Sync {
    /// Every stored definition. The outer error means the store itself
    /// could not be read; inner errors are per-definition.
    fn load_crate_definitions(&self) -> Result<Vec<StoredConfig>, StoreError>;

    fn save_crate_definition(&self, config: &CrateConfig) -> Result<(), StoreError>;

    /// `Ok(false)` when nothing was stored under `id`
    fn delete_crate_definition(&self, id: &str) -> Result<bool, StoreError>;

    /// Empty index when nothing has been saved yet
    fn load_location_index(&self) -> Result<LocationIndex, StoreError>;

    fn save_location_index(&self, index: &LocationIndex) -> Result<(), StoreError>;

    /// Block until queued writes have reached the backing store
    fn flush(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
