//! Interfaces the game server implements for the crate system.
//!
//! The core only calls these after it has made a key or reward decision; it
//! never inspects inventories or schedules work on its own.

use std::collections::{BTreeMap, HashMap};

use crate::reward::ItemPayload;

/// Inventory mutation on behalf of a player
pub trait InventorySink: Send + Sync {
    /// Give `quantity` of `item` to the player. False when it did not fit.
    fn grant(&self, player: &str, item: &ItemPayload, quantity: u32) -> bool;

    /// Remove one item from the stack the player is holding.
    fn consume_one_held_item(&self, player: &str) -> bool;
}

/// Read access to the opaque tag payload carried by a held item
pub trait TagReader {
    fn read_tag(&self, key: &str) -> Option<String>;
}

impl TagReader for HashMap<String, String> {
    fn read_tag(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

impl TagReader for BTreeMap<String, String> {
    fn read_tag(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

impl TagReader for ItemPayload {
    fn read_tag(&self, key: &str) -> Option<String> {
        self.tags.get(key).cloned()
    }
}

/// Deferred execution on the host's tick loop. Reveal animations only hand
/// out delays; the caller decides how to honour them.
pub trait Scheduler {
    fn schedule_after(&self, delay_ms: u64, callback: Box<dyn FnOnce() + Send>);
}
