use std::collections::BTreeMap;

use dashmap::DashMap;
use tracing::{info, warn};

use crate::config::{limits, tags};
use crate::crates::CrateDefinition;
use crate::host::{InventorySink, TagReader};
use crate::reward::ItemPayload;

/// Key type accepted by exactly one crate
#[derive(Debug, Clone, PartialEq)]
pub struct KeyBinding {
    pub key_id: String,
    pub crate_id: String,
    /// Item handed out when the key is granted (tags not yet applied)
    pub item: ItemPayload,
}

impl KeyBinding {
    pub fn for_crate(definition: &CrateDefinition) -> Self {
        Self {
            key_id: definition.key_id().to_string(),
            crate_id: definition.id().to_string(),
            item: definition.key_item().clone(),
        }
    }

    /// Tags stamped on every issued key item
    pub fn tags(&self) -> BTreeMap<String, String> {
        let mut stamped = BTreeMap::new();
        stamped.insert(tags::KEY_ID.to_string(), self.key_id.clone());
        stamped.insert(tags::CRATE_ID.to_string(), self.crate_id.clone());
        stamped
    }

    /// Key item with tags applied, ready for an inventory
    pub fn tagged_item(&self) -> ItemPayload {
        let mut item = self.item.clone();
        item.tags.extend(self.tags());
        item
    }
}

/// Key bindings by key id. At most one binding per crate id.
#[derive(Default)]
pub struct KeyRegistry {
    bindings: DashMap<String, KeyBinding>,
}

impl KeyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind the crate's key, replacing whatever that crate was bound to before
    pub fn register(&self, definition: &CrateDefinition) {
        self.register_binding(KeyBinding::for_crate(definition));
    }

    pub fn register_binding(&self, binding: KeyBinding) {
        self.bindings
            .retain(|_, existing| existing.crate_id != binding.crate_id);

        if let Some(previous) = self.bindings.get(&binding.key_id) {
            warn!(
                key_id = %binding.key_id,
                previous_crate = %previous.crate_id,
                crate_id = %binding.crate_id,
                "Key id already bound to another crate, rebinding"
            );
        }

        info!(key_id = %binding.key_id, crate_id = %binding.crate_id, "Registered key");
        self.bindings.insert(binding.key_id.clone(), binding);
    }

    pub fn unregister(&self, key_id: &str) -> Option<KeyBinding> {
        self.bindings.remove(key_id).map(|(_, binding)| binding)
    }

    /// Drop the binding owned by `crate_id`, if any
    pub fn unregister_crate(&self, crate_id: &str) -> bool {
        let before = self.bindings.len();
        self.bindings.retain(|_, binding| binding.crate_id != crate_id);
        self.bindings.len() != before
    }

    pub fn clear(&self) {
        self.bindings.clear();
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn get(&self, key_id: &str) -> Option<KeyBinding> {
        self.bindings.get(key_id).map(|entry| entry.value().clone())
    }

    pub fn key_for_crate(&self, crate_id: &str) -> Option<KeyBinding> {
        self.bindings
            .iter()
            .find(|entry| entry.crate_id == crate_id)
            .map(|entry| entry.value().clone())
    }

    /// Binding named by the held item's key tag. `None` for untagged items
    /// and for tags naming a key that is no longer registered.
    pub fn validate(&self, held: &dyn TagReader) -> Option<KeyBinding> {
        let key_id = held.read_tag(tags::KEY_ID)?;
        self.get(&key_id)
    }

    pub fn is_key(&self, held: &dyn TagReader) -> bool {
        self.validate(held).is_some()
    }

    pub fn matches_crate(binding: &KeyBinding, crate_id: &str) -> bool {
        binding.crate_id == crate_id
    }

    /// Grant `amount` keys (clamped to a single stack) to `player`
    pub fn issue_key(&self, sink: &dyn InventorySink, player: &str, key_id: &str, amount: u32) -> bool {
        let Some(binding) = self.get(key_id) else {
            warn!(key_id, "Cannot issue unknown key");
            return false;
        };

        let amount = amount.clamp(limits::MIN_AMOUNT, limits::MAX_AMOUNT);
        let mut item = binding.tagged_item();
        item.amount = amount;

        let granted = sink.grant(player, &item, amount);
        if granted {
            info!(player, key_id, amount, "Issued crate key");
        } else {
            warn!(player, key_id, amount, "Inventory refused crate key");
        }
        granted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crates::CrateConfig;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    fn definition(id: &str) -> CrateDefinition {
        CrateDefinition::from_config(CrateConfig::template(id, id)).unwrap()
    }

    #[derive(Default)]
    struct RecordingSink {
        granted: Mutex<Vec<(String, ItemPayload, u32)>>,
    }

    impl InventorySink for RecordingSink {
        fn grant(&self, player: &str, item: &ItemPayload, quantity: u32) -> bool {
            self.granted.lock().push((player.to_string(), item.clone(), quantity));
            true
        }

        fn consume_one_held_item(&self, _player: &str) -> bool {
            true
        }
    }

    #[test]
    fn test_validate_then_match() {
        let keys = KeyRegistry::new();
        keys.register(&definition("vote"));
        keys.register(&definition("daily"));

        let mut held: HashMap<String, String> = HashMap::new();
        assert!(keys.validate(&held).is_none());

        held.insert(tags::KEY_ID.to_string(), "vote_key".to_string());
        let binding = keys.validate(&held).unwrap();
        assert!(KeyRegistry::matches_crate(&binding, "vote"));
        assert!(!KeyRegistry::matches_crate(&binding, "daily"));

        held.insert(tags::KEY_ID.to_string(), "removed_key".to_string());
        assert!(keys.validate(&held).is_none());
    }

    #[test]
    fn test_one_binding_per_crate() {
        let keys = KeyRegistry::new();
        keys.register(&definition("vote"));

        let mut config = CrateConfig::template("vote", "Vote");
        config.key_id = "vote_key_v2".to_string();
        keys.register(&CrateDefinition::from_config(config).unwrap());

        assert_eq!(keys.len(), 1);
        assert!(keys.get("vote_key").is_none());
        assert_eq!(keys.key_for_crate("vote").unwrap().key_id, "vote_key_v2");

        assert!(keys.unregister_crate("vote"));
        assert!(keys.is_empty());
    }

    #[test]
    fn test_issued_key_is_tagged_and_clamped() {
        let keys = KeyRegistry::new();
        keys.register(&definition("vote"));
        let sink = RecordingSink::default();

        assert!(keys.issue_key(&sink, "alice", "vote_key", 500));
        assert!(!keys.issue_key(&sink, "alice", "missing_key", 1));

        let granted = sink.granted.lock();
        assert_eq!(granted.len(), 1);
        let (player, item, quantity) = &granted[0];
        assert_eq!(player, "alice");
        assert_eq!(*quantity, 64);
        assert_eq!(item.amount, 64);
        assert_eq!(item.material, "STICK");
        assert!(keys.is_key(item));
        assert_eq!(item.read_tag(tags::CRATE_ID).as_deref(), Some("vote"));
    }
}
