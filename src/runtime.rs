// Composition root
// Wires config, store, registries and the opener for one data directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;
use tracing::{error, info, warn};

use crate::config::{files, CratesConfig, StorageBackend, StorageConfig};
use crate::crates::{CrateConfig, LoadReport, LocationRegistry};
use crate::error::StoreError;
use crate::host::InventorySink;
use crate::keys::KeyRegistry;
use crate::opener::CrateOpener;
use crate::reward::RewardSelector;
use crate::storage::{BackgroundStore, CrateStore, JsonFileStore};

/// Crate shipped on first start so a fresh server has something to place
pub const DEFAULT_CRATE_ID: &str = "vote_crate";
const DEFAULT_CRATE_NAME: &str = "&6&lVote Crate";

pub struct CratesRuntime {
    data_dir: PathBuf,
    config: Arc<ArcSwap<CratesConfig>>,
    registry: Arc<LocationRegistry>,
    opener: CrateOpener,
    sink: Arc<dyn InventorySink>,
}

impl CratesRuntime {
    /// Open (or initialise) the data directory using the backend named in
    /// its config.json.
    pub fn open(data_dir: impl AsRef<Path>, sink: Arc<dyn InventorySink>) -> Result<Self, StoreError> {
        let data_dir = data_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&data_dir).map_err(|e| StoreError::io(&data_dir, e))?;
        if let Err(err) = CratesConfig::ensure_default(&data_dir) {
            error!(%err, "Failed to write default config");
        }

        let config = CratesConfig::load_or_default(&data_dir);
        let store = open_store(&data_dir, &config.storage)?;
        Self::with_store(data_dir, config, store, sink, RewardSelector::from_entropy())
    }

    /// Build around an already opened store
    pub fn with_store(
        data_dir: PathBuf,
        config: CratesConfig,
        store: Arc<dyn CrateStore>,
        sink: Arc<dyn InventorySink>,
        selector: RewardSelector,
    ) -> Result<Self, StoreError> {
        let config = Arc::new(ArcSwap::from_pointee(config));
        let keys = Arc::new(KeyRegistry::new());
        let registry = Arc::new(LocationRegistry::new(store, keys));

        let report = registry.load_from_store()?;
        if report.loaded == 0 && report.skipped == 0 {
            seed_default_crate(&registry);
        }

        let opener = CrateOpener::new(
            Arc::clone(&registry),
            Arc::new(selector),
            Arc::clone(&sink),
            Arc::clone(&config),
        );

        info!(crates = registry.crate_count(), "Crate system ready");
        Ok(Self {
            data_dir,
            config,
            registry,
            opener,
            sink,
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Current config snapshot
    pub fn config(&self) -> Arc<CratesConfig> {
        self.config.load_full()
    }

    pub fn registry(&self) -> &Arc<LocationRegistry> {
        &self.registry
    }

    pub fn keys(&self) -> &Arc<KeyRegistry> {
        self.registry.keys()
    }

    pub fn opener(&self) -> &CrateOpener {
        &self.opener
    }

    /// Re-read config.json and every crate definition. Running reveals keep
    /// the definition they started with.
    pub fn reload(&self) -> Result<LoadReport, StoreError> {
        info!("Reloading crate configurations...");
        let fresh = CratesConfig::load_or_default(&self.data_dir);
        if fresh.storage != self.config.load().storage {
            warn!("Storage settings changed; restart to switch backends");
        }
        self.config.store(Arc::new(fresh));
        self.registry.reload()
    }

    /// Hand `amount` keys for `crate_id` to `player`.
    /// False when the crate has no key or the inventory refused them.
    pub fn give_key(&self, player: &str, crate_id: &str, amount: u32) -> bool {
        let Some(binding) = self.keys().key_for_crate(crate_id) else {
            warn!(crate_id, "No key registered for crate");
            return false;
        };
        self.keys()
            .issue_key(self.sink.as_ref(), player, &binding.key_id, amount)
    }

    /// Settle running reveals and wait for pending writes
    pub fn shutdown(&self) -> Result<(), StoreError> {
        let players = self.opener.sessions().players();
        for player in &players {
            self.opener.on_player_quit(player);
        }
        if !players.is_empty() {
            info!(count = players.len(), "Finished reveals on shutdown");
        }
        self.registry.store().flush()
    }
}

/// Store for `settings`, wrapped in a writer thread when configured
pub fn open_store(data_dir: &Path, settings: &StorageConfig) -> Result<Arc<dyn CrateStore>, StoreError> {
    let store: Arc<dyn CrateStore> = match settings.backend {
        StorageBackend::Json => Arc::new(JsonFileStore::new(data_dir)),
        #[cfg(not(target_family = "wasm"))]
        StorageBackend::Sqlite => Arc::new(crate::storage::SqliteStore::open(data_dir.join(files::SQLITE_DB))?),
        #[cfg(target_family = "wasm")]
        StorageBackend::Sqlite => {
            warn!("SQLite is unavailable on this target, using JSON files");
            Arc::new(JsonFileStore::new(data_dir))
        }
    };

    if !settings.background_writes {
        return Ok(store);
    }
    let writer = BackgroundStore::new(store).map_err(|e| StoreError::io(data_dir, e))?;
    Ok(Arc::new(writer))
}

fn seed_default_crate(registry: &LocationRegistry) {
    let config = CrateConfig::template(DEFAULT_CRATE_ID, DEFAULT_CRATE_NAME);
    match registry.create_from_config(config) {
        Ok(mutation) if mutation.succeeded() => {
            info!("Created default config: {}/{}.json", files::CRATES_DIR, DEFAULT_CRATE_ID);
        }
        Ok(_) => {}
        Err(err) => error!(%err, "Failed to create default crate"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crates::CrateLocation;
    use crate::opener::{OpenOutcome, OpenRequest};
    use crate::reward::ItemPayload;
    use crate::storage::tests::scratch_dir;
    use crate::storage::MemoryStore;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Backpack {
        items: Mutex<Vec<(String, ItemPayload, u32)>>,
    }

    impl InventorySink for Backpack {
        fn grant(&self, player: &str, item: &ItemPayload, quantity: u32) -> bool {
            self.items.lock().push((player.to_string(), item.clone(), quantity));
            true
        }

        fn consume_one_held_item(&self, _player: &str) -> bool {
            true
        }
    }

    #[test]
    fn test_first_start_writes_defaults() {
        let dir = scratch_dir("runtime-first");
        let runtime = CratesRuntime::open(&dir, Arc::new(Backpack::default())).unwrap();

        assert!(dir.join(files::MAIN_CONFIG).exists());
        assert!(dir.join(files::CRATES_DIR).join("vote_crate.json").exists());
        assert_eq!(runtime.registry().crate_ids(), vec![DEFAULT_CRATE_ID.to_string()]);
        assert!(runtime.keys().key_for_crate(DEFAULT_CRATE_ID).is_some());
        assert_eq!(*runtime.config(), CratesConfig::default());
    }

    #[test]
    fn test_locations_survive_restart() {
        let dir = scratch_dir("runtime-restart");
        {
            let runtime = CratesRuntime::open(&dir, Arc::new(Backpack::default())).unwrap();
            let mutation = runtime
                .registry()
                .set_location(DEFAULT_CRATE_ID, CrateLocation::new("world", 4, 70, -2));
            assert!(mutation.is_applied());
            runtime.shutdown().unwrap();
        }

        let runtime = CratesRuntime::open(&dir, Arc::new(Backpack::default())).unwrap();
        assert_eq!(
            runtime
                .registry()
                .crate_id_at(&CrateLocation::new("world", 4, 70, -2))
                .as_deref(),
            Some(DEFAULT_CRATE_ID)
        );
    }

    #[test]
    fn test_reload_applies_new_settings() {
        let dir = scratch_dir("runtime-reload");
        let runtime = CratesRuntime::open(&dir, Arc::new(Backpack::default())).unwrap();

        let mut edited = CratesConfig::default();
        edited.settings.cooldown_seconds = 30;
        edited.animation.enabled = false;
        edited.save(&dir).unwrap();

        let report = runtime.reload().unwrap();
        assert_eq!(report.loaded, 1);
        assert_eq!(runtime.config().settings.cooldown_seconds, 30);
        assert!(runtime.keys().key_for_crate(DEFAULT_CRATE_ID).is_some());
    }

    #[test]
    fn test_give_key_and_open() {
        let backpack = Arc::new(Backpack::default());
        let mut config = CratesConfig::default();
        config.animation.enabled = false;
        let runtime = CratesRuntime::with_store(
            scratch_dir("runtime-open"),
            config,
            Arc::new(MemoryStore::new()),
            backpack.clone(),
            RewardSelector::seeded(3),
        )
        .unwrap();

        assert!(runtime.give_key("alice", DEFAULT_CRATE_ID, 2));
        assert!(!runtime.give_key("alice", "missing", 1));
        let key = backpack.items.lock()[0].1.clone();
        assert_eq!(backpack.items.lock()[0].2, 2);

        let spot = CrateLocation::new("world", 0, 64, 0);
        runtime.registry().set_location(DEFAULT_CRATE_ID, spot.clone());
        let outcome = runtime.opener().open(OpenRequest::new("alice", &spot).holding(&key));
        assert!(matches!(outcome, OpenOutcome::Opened { key_consumed: true, .. }));
        assert_eq!(backpack.items.lock().len(), 2);
    }

    #[test]
    fn test_shutdown_settles_reveals() {
        let backpack = Arc::new(Backpack::default());
        let runtime = CratesRuntime::with_store(
            scratch_dir("runtime-shutdown"),
            CratesConfig::default(),
            Arc::new(MemoryStore::new()),
            backpack.clone(),
            RewardSelector::seeded(8),
        )
        .unwrap();
        let spot = CrateLocation::new("world", 1, 64, 1);
        runtime.registry().set_location(DEFAULT_CRATE_ID, spot.clone());
        let key = runtime.keys().key_for_crate(DEFAULT_CRATE_ID).unwrap().tagged_item();

        let outcome = runtime.opener().open(OpenRequest::new("bob", &spot).holding(&key));
        assert!(matches!(outcome, OpenOutcome::Revealing { .. }));
        assert!(backpack.items.lock().is_empty());

        runtime.shutdown().unwrap();
        assert!(runtime.opener().sessions().is_empty());
        assert_eq!(backpack.items.lock().len(), 1);
    }

    #[test]
    fn test_sqlite_backend_with_writer() {
        let dir = scratch_dir("runtime-sqlite");
        let settings = StorageConfig {
            backend: StorageBackend::Sqlite,
            background_writes: true,
        };
        let store = open_store(&dir, &settings).unwrap();
        store
            .save_crate_definition(&CrateConfig::template("daily", "Daily"))
            .unwrap();
        store.flush().unwrap();
        assert_eq!(store.load_crate_definitions().unwrap().len(), 1);
        assert!(dir.join(files::SQLITE_DB).exists());
    }
}
