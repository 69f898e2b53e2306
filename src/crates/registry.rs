// Crate registry
// Owns every crate definition and the block -> crate index. Each mutation is
// written to the store before it returns; a failed write keeps the in-memory
// change and is reported as Mutation::Unsaved.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{error, info, warn};

use super::definition::{CrateConfig, CrateDefinition};
use super::location::CrateLocation;
use crate::error::{CrateError, StoreError};
use crate::keys::KeyRegistry;
use crate::reward::{ItemPayload, RewardEntry};
use crate::storage::{CrateStore, LocationIndex};

/// Result of a registry mutation
#[derive(Debug)]
pub enum Mutation {
    /// Applied and persisted
    Applied,
    /// Refused; nothing changed
    Rejected,
    /// Applied in memory, but the store write failed
    Unsaved(StoreError),
}

impl Mutation {
    /// True when the in-memory state changed (saved or not)
    pub fn succeeded(&self) -> bool {
        !matches!(self, Mutation::Rejected)
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, Mutation::Applied)
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Mutation::Rejected)
    }
}

fn persisted(result: Result<(), StoreError>, what: &str) -> Mutation {
    match result {
        Ok(()) => Mutation::Applied,
        Err(err) => {
            error!(%err, "Failed to save {what}");
            Mutation::Unsaved(err)
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub loaded: usize,
    /// Unreadable, invalid or duplicate definitions
    pub skipped: usize,
    pub locations: RestoreReport,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreReport {
    pub restored: usize,
    /// Locations listed under crate ids that are not loaded
    pub unknown_crate: usize,
    pub malformed: usize,
}

#[derive(Default)]
struct RegistryState {
    definitions: HashMap<String, CrateDefinition>,
    locations: HashMap<CrateLocation, String>,
}

impl RegistryState {
    /// Persisted index: crate id -> its locations in placement order
    fn location_index(&self) -> LocationIndex {
        self.definitions
            .values()
            .filter(|definition| !definition.locations().is_empty())
            .map(|definition| {
                let locations: Vec<String> =
                    definition.locations().iter().map(|l| l.to_string()).collect();
                (definition.id().to_string(), locations)
            })
            .collect()
    }

    /// Unmap `location` from the index and from its owner's list
    fn unmap(&mut self, location: &CrateLocation) -> Option<String> {
        let owner = self.locations.remove(location)?;
        if let Some(definition) = self.definitions.get_mut(&owner) {
            definition.remove_location(location);
        }
        Some(owner)
    }

    /// Crate already using `key_id`
    fn key_owner(&self, key_id: &str) -> Option<&str> {
        self.definitions
            .values()
            .find(|definition| definition.key_id() == key_id)
            .map(|definition| definition.id())
    }

    fn assign(&mut self, crate_id: &str, location: CrateLocation) -> bool {
        let Some(definition) = self.definitions.get_mut(crate_id) else {
            return false;
        };
        definition.add_location(location.clone());
        self.locations.insert(location, crate_id.to_string());
        true
    }
}

pub struct LocationRegistry {
    store: Arc<dyn CrateStore>,
    keys: Arc<KeyRegistry>,
    state: Mutex<RegistryState>,
}

impl LocationRegistry {
    pub fn new(store: Arc<dyn CrateStore>, keys: Arc<KeyRegistry>) -> Self {
        Self {
            store,
            keys,
            state: Mutex::new(RegistryState::default()),
        }
    }

    pub fn keys(&self) -> &Arc<KeyRegistry> {
        &self.keys
    }

    pub fn store(&self) -> &Arc<dyn CrateStore> {
        &self.store
    }

    // ========================================================================
    // LOADING
    // ========================================================================

    /// Replace every definition with `configs`. Invalid entries are logged and
    /// skipped; the rest still load. Locations are cleared.
    pub fn load(&self, configs: impl IntoIterator<Item = CrateConfig>) -> LoadReport {
        let mut state = self.state.lock();
        for old_id in state.definitions.keys() {
            self.keys.unregister_crate(old_id);
        }
        *state = RegistryState::default();

        let mut report = LoadReport::default();
        for config in configs {
            let id = config.id.clone();
            if state.definitions.contains_key(&id) {
                warn!(crate_id = %id, "Duplicate crate definition, keeping the first");
                report.skipped += 1;
                continue;
            }
            match CrateDefinition::from_config(config) {
                Ok(definition) if state.key_owner(definition.key_id()).is_some() => {
                    warn!(
                        crate_id = %id,
                        key_id = %definition.key_id(),
                        "Key id already used by another crate, skipping"
                    );
                    report.skipped += 1;
                }
                Ok(definition) => {
                    self.keys.register(&definition);
                    info!(crate_id = %id, "Loaded crate");
                    state.definitions.insert(id, definition);
                    report.loaded += 1;
                }
                Err(err) => {
                    warn!(%err, "Invalid crate config");
                    report.skipped += 1;
                }
            }
        }

        info!("Loaded {} crate(s).", report.loaded);
        report
    }

    /// Map persisted locations onto the loaded definitions. Nothing is saved.
    pub fn restore_locations(&self, index: &LocationIndex) -> RestoreReport {
        let mut state = self.state.lock();
        let mut report = RestoreReport::default();

        for (crate_id, raw_locations) in index {
            if !state.definitions.contains_key(crate_id) {
                warn!(crate_id = %crate_id, "Unknown crate in locations file");
                report.unknown_crate += raw_locations.len();
                continue;
            }
            for raw in raw_locations {
                let Some(location) = CrateLocation::parse(raw) else {
                    report.malformed += 1;
                    continue;
                };
                state.unmap(&location);
                state.assign(crate_id, location);
                report.restored += 1;
            }
        }

        info!("Loaded {} crate location(s).", state.locations.len());
        report
    }

    /// Load definitions and locations from the store. Both are read before
    /// anything is replaced, so a failed read leaves the registry as it was.
    /// An unreadable location index keeps the placements currently mapped.
    pub fn load_from_store(&self) -> Result<LoadReport, StoreError> {
        let stored = self.store.load_crate_definitions()?;
        let index = match self.store.load_location_index() {
            Ok(index) => index,
            Err(err) => {
                error!(%err, "Failed to load crate locations, keeping current placements");
                self.location_index()
            }
        };

        let mut unreadable = 0;
        let configs: Vec<CrateConfig> = stored
            .into_iter()
            .filter_map(|stored| match stored {
                Ok(config) => Some(config),
                Err(err) => {
                    error!(%err, "Failed to load crate config");
                    unreadable += 1;
                    None
                }
            })
            .collect();

        let mut report = self.load(configs);
        report.skipped += unreadable;
        report.locations = self.restore_locations(&index);
        Ok(report)
    }

    /// Reload definitions and locations from the store
    pub fn reload(&self) -> Result<LoadReport, StoreError> {
        info!("Reloading crates from store...");
        self.load_from_store()
    }

    // ========================================================================
    // LOCATIONS
    // ========================================================================

    /// Place `crate_id` at `location`, replacing whatever crate was there
    pub fn set_location(&self, crate_id: &str, location: CrateLocation) -> Mutation {
        let mut state = self.state.lock();
        if !state.definitions.contains_key(crate_id) {
            return Mutation::Rejected;
        }
        if state.locations.get(&location).is_some_and(|owner| owner == crate_id) {
            return Mutation::Applied;
        }

        if let Some(previous) = state.unmap(&location) {
            info!(crate_id = %previous, "Replaced crate at {}", location.display_string());
        }
        let shown = location.display_string();
        state.assign(crate_id, location);
        info!("Set crate {crate_id} at {shown}");

        persisted(self.store.save_location_index(&state.location_index()), "crate locations")
    }

    pub fn remove_location(&self, location: &CrateLocation) -> Mutation {
        let mut state = self.state.lock();
        if state.unmap(location).is_none() {
            return Mutation::Rejected;
        }
        info!("Removed crate from {}", location.display_string());
        persisted(self.store.save_location_index(&state.location_index()), "crate locations")
    }

    pub fn get_crate_at(&self, location: &CrateLocation) -> Option<CrateDefinition> {
        let state = self.state.lock();
        let crate_id = state.locations.get(location)?;
        state.definitions.get(crate_id).cloned()
    }

    pub fn crate_id_at(&self, location: &CrateLocation) -> Option<String> {
        self.state.lock().locations.get(location).cloned()
    }

    pub fn is_crate_location(&self, location: &CrateLocation) -> bool {
        self.state.lock().locations.contains_key(location)
    }

    pub fn total_locations(&self) -> usize {
        self.state.lock().locations.len()
    }

    /// Snapshot of what `save_location_index` would be given
    pub fn location_index(&self) -> LocationIndex {
        self.state.lock().location_index()
    }

    // ========================================================================
    // DEFINITIONS
    // ========================================================================

    pub fn get_crate(&self, id: &str) -> Option<CrateDefinition> {
        self.state.lock().definitions.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.state.lock().definitions.contains_key(id)
    }

    /// Sorted crate ids
    pub fn crate_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.state.lock().definitions.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Every definition, sorted by id
    pub fn all_crates(&self) -> Vec<CrateDefinition> {
        let mut crates: Vec<CrateDefinition> =
            self.state.lock().definitions.values().cloned().collect();
        crates.sort_by(|a, b| a.id().cmp(b.id()));
        crates
    }

    pub fn crate_count(&self) -> usize {
        self.state.lock().definitions.len()
    }

    /// Register a new crate. Rejected when the id or its key id is already taken.
    pub fn create_crate(&self, mut definition: CrateDefinition) -> Mutation {
        let mut state = self.state.lock();
        if state.definitions.contains_key(definition.id()) {
            warn!(crate_id = %definition.id(), "Crate already exists");
            return Mutation::Rejected;
        }
        if let Some(owner) = state.key_owner(definition.key_id()) {
            warn!(
                crate_id = %definition.id(),
                key_id = %definition.key_id(),
                owner = %owner,
                "Key id already used by another crate"
            );
            return Mutation::Rejected;
        }

        definition.take_locations();
        let saved = self.store.save_crate_definition(&definition.to_config());
        self.keys.register(&definition);
        info!(crate_id = %definition.id(), "Created crate");
        state.definitions.insert(definition.id().to_string(), definition);

        persisted(saved, "crate config")
    }

    /// Validate `config` and register it
    pub fn create_from_config(&self, config: CrateConfig) -> Result<Mutation, CrateError> {
        if self.contains(&config.id) {
            return Err(CrateError::Duplicate(config.id));
        }
        let definition = CrateDefinition::from_config(config)?;
        Ok(self.create_crate(definition))
    }

    /// Remove a crate with all of its locations and its key binding
    pub fn delete_crate(&self, id: &str) -> Mutation {
        let mut state = self.state.lock();
        let Some(mut definition) = state.definitions.remove(id) else {
            return Mutation::Rejected;
        };

        for location in definition.take_locations() {
            state.locations.remove(&location);
        }
        self.keys.unregister_crate(id);

        let deleted = match self.store.delete_crate_definition(id) {
            Ok(true) => Ok(()),
            Ok(false) => {
                warn!(crate_id = %id, "No stored config to delete");
                Ok(())
            }
            Err(err) => Err(err),
        };
        let saved = self.store.save_location_index(&state.location_index());
        info!(crate_id = %id, "Deleted crate");

        persisted(deleted.and(saved), "crate deletion")
    }

    // ========================================================================
    // EDITING
    // ========================================================================

    /// Apply `edit` to a crate and persist its config. `edit` returning false
    /// rejects the change and must leave the definition untouched.
    fn edit_crate(&self, id: &str, edit: impl FnOnce(&mut CrateDefinition) -> bool) -> Mutation {
        let mut state = self.state.lock();
        let Some(definition) = state.definitions.get_mut(id) else {
            return Mutation::Rejected;
        };
        if !edit(definition) {
            return Mutation::Rejected;
        }
        persisted(self.store.save_crate_definition(&definition.to_config()), "crate config")
    }

    pub fn add_reward(&self, crate_id: &str, entry: RewardEntry) -> Mutation {
        self.edit_crate(crate_id, |definition| {
            definition.rewards_mut().push(entry);
            true
        })
    }

    /// Rejected for an out-of-range index or the last remaining reward
    pub fn remove_reward(&self, crate_id: &str, index: usize) -> Mutation {
        self.edit_crate(crate_id, |definition| {
            let rewards = definition.rewards_mut();
            if rewards.len() <= 1 || index >= rewards.len() {
                return false;
            }
            rewards.remove(index).is_some()
        })
    }

    pub fn update_reward(&self, crate_id: &str, index: usize, entry: RewardEntry) -> Mutation {
        self.edit_crate(crate_id, |definition| {
            definition.rewards_mut().replace(index, entry).is_some()
        })
    }

    pub fn update_display_name(&self, crate_id: &str, display_name: &str) -> Mutation {
        if display_name.trim().is_empty() {
            return Mutation::Rejected;
        }
        self.edit_crate(crate_id, |definition| {
            definition.set_display_name(display_name.to_string());
            true
        })
    }

    /// Change the key item; the key binding is re-registered with it
    pub fn update_key_item(&self, crate_id: &str, key_item: ItemPayload) -> Mutation {
        let keys = Arc::clone(&self.keys);
        self.edit_crate(crate_id, |definition| {
            definition.set_key_item(key_item);
            keys.register(definition);
            true
        })
    }
}
