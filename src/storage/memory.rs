// In-process store
// Counts writes and can be told to fail, which is what the registry tests lean on

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;

use super::{CrateStore, LocationIndex, StoredConfig};
use crate::crates::CrateConfig;
use crate::error::StoreError;

#[derive(Default)]
struct MemoryState {
    crates: BTreeMap<String, CrateConfig>,
    locations: LocationIndex,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    writes: AtomicUsize,
    failing: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with definitions; seeding is not counted as writes
    pub fn with_crates(configs: impl IntoIterator<Item = CrateConfig>) -> Self {
        let store = Self::new();
        {
            let mut state = store.state.lock();
            for config in configs {
                state.crates.insert(config.id.clone(), config);
            }
        }
        store
    }

    /// Number of successful save/delete calls
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// While set, every write returns an error and leaves the contents alone
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn crate_config(&self, id: &str) -> Option<CrateConfig> {
        self.state.lock().crates.get(id).cloned()
    }

    pub fn location_index(&self) -> LocationIndex {
        self.state.lock().locations.clone()
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::ExecuteFailed("memory store is failing writes".to_string()));
        }
        Ok(())
    }

    fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

impl CrateStore for MemoryStore {
    fn load_crate_definitions(&self) -> Result<Vec<StoredConfig>, StoreError> {
        Ok(self.state.lock().crates.values().cloned().map(Ok).collect())
    }

    fn save_crate_definition(&self, config: &CrateConfig) -> Result<(), StoreError> {
        self.check_writable()?;
        self.state.lock().crates.insert(config.id.clone(), config.clone());
        self.record_write();
        Ok(())
    }

    fn delete_crate_definition(&self, id: &str) -> Result<bool, StoreError> {
        self.check_writable()?;
        let removed = self.state.lock().crates.remove(id).is_some();
        self.record_write();
        Ok(removed)
    }

    fn load_location_index(&self) -> Result<LocationIndex, StoreError> {
        Ok(self.state.lock().locations.clone())
    }

    fn save_location_index(&self, index: &LocationIndex) -> Result<(), StoreError> {
        self.check_writable()?;
        self.state.lock().locations = index.clone();
        self.record_write();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failing_writes_leave_contents() {
        let store = MemoryStore::with_crates([CrateConfig::template("vote", "Vote")]);
        assert_eq!(store.write_count(), 0);

        store.set_failing(true);
        assert!(store.delete_crate_definition("vote").is_err());
        assert!(store.crate_config("vote").is_some());

        store.set_failing(false);
        assert!(store.delete_crate_definition("vote").unwrap());
        assert_eq!(store.write_count(), 1);
    }
}
