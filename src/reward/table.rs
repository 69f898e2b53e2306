// Reward table data model
// A crate owns one RewardTable; entries carry an item payload, rarity and weight

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::rarity::Rarity;
use crate::config::limits;

/// Item handed to the inventory sink. Opaque to the core apart from the
/// display name used as a simulation key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ItemPayload {
    pub material: String,
    pub amount: u32,
    pub display_name: String,
    pub enchanted: bool,
    pub lore: Vec<String>,
    pub enchantments: BTreeMap<String, u32>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
}

impl Default for ItemPayload {
    fn default() -> Self {
        Self {
            material: "STONE".to_string(),
            amount: 1,
            display_name: String::new(),
            enchanted: false,
            lore: Vec::new(),
            enchantments: BTreeMap::new(),
            tags: BTreeMap::new(),
        }
    }
}

impl ItemPayload {
    pub fn new(material: impl Into<String>, amount: u32, display_name: impl Into<String>) -> Self {
        Self {
            material: material.into(),
            amount: amount.max(limits::MIN_AMOUNT),
            display_name: display_name.into(),
            ..Self::default()
        }
    }

    /// Display name, or the material when none is configured
    pub fn display_name(&self) -> &str {
        if self.display_name.is_empty() {
            &self.material
        } else {
            &self.display_name
        }
    }
}

/// One possible outcome of a crate
#[derive(Debug, Clone, PartialEq)]
pub struct RewardEntry {
    item: ItemPayload,
    rarity: Rarity,
    weight: i32,
    chance: f64, // display only, refreshed by the owning table
}

impl RewardEntry {
    /// Weight is clamped to at least 1
    pub fn new(item: ItemPayload, rarity: Rarity, weight: i32) -> Self {
        Self {
            item,
            rarity,
            weight: weight.max(limits::MIN_WEIGHT),
            chance: 0.0,
        }
    }

    pub fn with_default_weight(item: ItemPayload, rarity: Rarity) -> Self {
        Self::new(item, rarity, rarity.default_weight())
    }

    /// Skips the weight clamp. Only for exercising degenerate tables.
    #[cfg(test)]
    pub(crate) fn with_unclamped_weight(item: ItemPayload, rarity: Rarity, weight: i32) -> Self {
        Self {
            item,
            rarity,
            weight,
            chance: 0.0,
        }
    }

    pub fn item(&self) -> &ItemPayload {
        &self.item
    }

    pub fn rarity(&self) -> Rarity {
        self.rarity
    }

    pub fn weight(&self) -> i32 {
        self.weight
    }

    /// Percentage computed when the entry was last placed in a table
    pub fn chance(&self) -> f64 {
        self.chance
    }

    pub fn amount(&self) -> u32 {
        self.item.amount
    }

    /// Key used when counting simulated draws
    pub fn display_key(&self) -> &str {
        self.item.display_name()
    }

    /// Display name prefixed with the rarity colour code
    pub fn colored_display_name(&self) -> String {
        format!("{}{}", self.rarity.color_code(), self.item.display_name())
    }
}

/// `100 * weight / total`, or 0 for a degenerate total
pub fn chance_percent(weight: i32, total_weight: i64) -> f64 {
    if total_weight <= 0 {
        return 0.0;
    }
    f64::from(weight) / total_weight as f64 * 100.0
}

/// Ordered, weighted list of rewards. The total weight is kept in sync with
/// the entries on every change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RewardTable {
    entries: Vec<RewardEntry>,
    total_weight: i64,
}

impl RewardTable {
    pub fn new(entries: Vec<RewardEntry>) -> Self {
        let mut table = Self {
            entries,
            total_weight: 0,
        };
        table.refresh();
        table
    }

    pub fn entries(&self) -> &[RewardEntry] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&RewardEntry> {
        self.entries.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RewardEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_weight(&self) -> i64 {
        self.total_weight
    }

    pub fn push(&mut self, entry: RewardEntry) {
        self.entries.push(entry);
        self.refresh();
    }

    pub fn remove(&mut self, index: usize) -> Option<RewardEntry> {
        if index >= self.entries.len() {
            return None;
        }
        let removed = self.entries.remove(index);
        self.refresh();
        Some(removed)
    }

    /// Swap the entry at `index`, returning the previous one
    pub fn replace(&mut self, index: usize, entry: RewardEntry) -> Option<RewardEntry> {
        let slot = self.entries.get_mut(index)?;
        let previous = std::mem::replace(slot, entry);
        self.refresh();
        Some(previous)
    }

    pub fn by_rarity(&self, rarity: Rarity) -> Vec<&RewardEntry> {
        self.entries.iter().filter(|e| e.rarity == rarity).collect()
    }

    pub fn has_rarity(&self, rarity: Rarity) -> bool {
        self.entries.iter().any(|e| e.rarity == rarity)
    }

    fn refresh(&mut self) {
        self.total_weight = self.entries.iter().map(|e| i64::from(e.weight)).sum();
        let total = self.total_weight;
        for entry in &mut self.entries {
            entry.chance = chance_percent(entry.weight, total);
        }
    }
}

impl<'a> IntoIterator for &'a RewardTable {
    type Item = &'a RewardEntry;
    type IntoIter = std::slice::Iter<'a, RewardEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
