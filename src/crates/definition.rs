// Crate definitions and their persisted configuration
// CrateConfig is what lives in crates/<id>.json; CrateDefinition is the validated runtime form

use serde::{Deserialize, Serialize};

use super::location::CrateLocation;
use crate::config::limits;
use crate::error::CrateError;
use crate::reward::{ItemPayload, Rarity, RewardEntry, RewardTable};

/// One reward as written in a crate file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RewardConfig {
    pub item: ItemPayload,
    pub rarity: String,
    pub weight: i32,
    /// Informational only; recomputed from weights on load
    pub chance: f64,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            item: ItemPayload::default(),
            rarity: Rarity::Common.name().to_string(),
            weight: 50,
            chance: 50.0,
        }
    }
}

impl RewardConfig {
    pub fn new(item: ItemPayload, rarity: Rarity, weight: i32) -> Self {
        Self {
            item,
            rarity: rarity.name().to_string(),
            weight,
            chance: 0.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HologramConfig {
    pub enabled: bool,
    pub lines: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CrateConfig {
    pub id: String,
    pub display_name: String,
    pub block_type: String,
    pub key_id: String,
    pub key_item: ItemPayload,
    pub rewards: Vec<RewardConfig>,
    pub hologram: HologramConfig,
}

impl Default for CrateConfig {
    fn default() -> Self {
        Self {
            id: String::new(),
            display_name: String::new(),
            block_type: "CHEST".to_string(),
            key_id: String::new(),
            key_item: ItemPayload::default(),
            rewards: Vec::new(),
            hologram: HologramConfig::default(),
        }
    }
}

/// `^[a-z0-9_]+$`
pub fn is_valid_crate_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
}

/// Lowercase and replace anything outside `[a-z0-9_]` with `_`.
/// Never applied implicitly; callers opt in before creating a crate.
pub fn sanitize_crate_id(id: &str) -> String {
    id.to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

pub fn clamp_weight(weight: i32) -> i32 {
    weight.clamp(limits::MIN_WEIGHT, limits::MAX_WEIGHT)
}

pub fn clamp_amount(amount: u32) -> u32 {
    amount.clamp(limits::MIN_AMOUNT, limits::MAX_AMOUNT)
}

/// Remove `&x` colour codes from a display string
pub fn strip_color_codes(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '&' {
            if let Some(&next) = chars.peek() {
                if matches!(next, '0'..='9' | 'a'..='f' | 'k'..='o' | 'r') {
                    chars.next();
                    continue;
                }
            }
        }
        out.push(c);
    }
    out
}

fn item_problems(item: &ItemPayload, prefix: &str, problems: &mut Vec<String>) {
    if item.material.trim().is_empty() {
        problems.push(format!("{prefix}: Material is required"));
    }
    if item.amount < limits::MIN_AMOUNT {
        problems.push(format!("{prefix}: Amount must be at least {}", limits::MIN_AMOUNT));
    }
    if item.amount > limits::MAX_AMOUNT {
        problems.push(format!("{prefix}: Amount cannot exceed {}", limits::MAX_AMOUNT));
    }
}

impl CrateConfig {
    /// Every validation problem, empty when the config is usable
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.id.trim().is_empty() {
            problems.push("Crate ID is required".to_string());
        } else if !is_valid_crate_id(&self.id) {
            problems.push(
                "Crate ID must only contain lowercase letters, numbers, and underscores".to_string(),
            );
        }
        if self.display_name.trim().is_empty() {
            problems.push("Display name is required".to_string());
        }
        if self.key_id.trim().is_empty() {
            problems.push("Key ID is required".to_string());
        }
        item_problems(&self.key_item, "Key item", &mut problems);

        if self.rewards.is_empty() {
            problems.push("At least one reward is required".to_string());
        }
        for (i, reward) in self.rewards.iter().enumerate() {
            let prefix = format!("Reward #{}", i + 1);
            item_problems(&reward.item, &prefix, &mut problems);
            if reward.rarity.trim().is_empty() {
                problems.push(format!("{prefix}: Rarity is required"));
            } else if let Err(err) = reward.rarity.parse::<Rarity>() {
                problems.push(format!("{prefix}: {err}"));
            }
            if reward.weight < limits::MIN_WEIGHT {
                problems.push(format!("{prefix}: Weight must be at least {}", limits::MIN_WEIGHT));
            }
        }

        problems
    }

    pub fn is_valid(&self) -> bool {
        self.problems().is_empty()
    }

    /// Starter crate with one reward per rarity tier
    pub fn template(id: &str, display_name: &str) -> Self {
        let plain_name = strip_color_codes(display_name);
        let key_item = ItemPayload {
            material: "STICK".to_string(),
            display_name: format!("&b{plain_name} Key"),
            enchanted: true,
            lore: vec![
                format!("&7Right-click on a {display_name}"),
                "&7to claim your reward!".to_string(),
            ],
            ..ItemPayload::default()
        };

        let rewards = [
            ("IRON_INGOT", 8, "&7Iron Ingots", Rarity::Common),
            ("GOLD_INGOT", 4, "&6Gold Ingots", Rarity::Uncommon),
            ("DIAMOND", 2, "&bDiamonds", Rarity::Rare),
            ("EMERALD", 4, "&aEmeralds", Rarity::Epic),
            ("NETHERITE_INGOT", 1, "&4&lNetherite Ingot", Rarity::Legendary),
        ]
        .into_iter()
        .map(|(material, amount, name, rarity)| RewardConfig {
            item: ItemPayload::new(material, amount, name),
            rarity: rarity.name().to_string(),
            weight: rarity.default_weight(),
            chance: f64::from(rarity.default_weight()),
        })
        .collect();

        Self {
            id: id.to_string(),
            display_name: display_name.to_string(),
            block_type: "CHEST".to_string(),
            key_id: format!("{id}_key"),
            key_item,
            rewards,
            hologram: HologramConfig {
                enabled: true,
                lines: vec![
                    display_name.to_string(),
                    "&7Right-click with a key".to_string(),
                    "&7to open!".to_string(),
                ],
            },
        }
    }
}

/// Validated crate with its reward table and placed locations
#[derive(Debug, Clone, PartialEq)]
pub struct CrateDefinition {
    id: String,
    display_name: String,
    block_type: String,
    key_id: String,
    key_item: ItemPayload,
    table: RewardTable,
    hologram: HologramConfig,
    locations: Vec<CrateLocation>,
}

impl CrateDefinition {
    pub fn from_config(config: CrateConfig) -> Result<Self, CrateError> {
        if !is_valid_crate_id(&config.id) {
            return Err(CrateError::InvalidId(config.id));
        }
        let problems = config.problems();
        if !problems.is_empty() {
            return Err(CrateError::InvalidConfig {
                id: config.id,
                problems,
            });
        }

        let entries = config
            .rewards
            .into_iter()
            .map(|reward| {
                RewardEntry::new(
                    reward.item,
                    Rarity::from_name_or_common(&reward.rarity),
                    reward.weight,
                )
            })
            .collect();

        Ok(Self {
            id: config.id,
            display_name: config.display_name,
            block_type: config.block_type,
            key_id: config.key_id,
            key_item: config.key_item,
            table: RewardTable::new(entries),
            hologram: config.hologram,
            locations: Vec::new(),
        })
    }

    /// Persisted form; chances reflect the current weights
    pub fn to_config(&self) -> CrateConfig {
        CrateConfig {
            id: self.id.clone(),
            display_name: self.display_name.clone(),
            block_type: self.block_type.clone(),
            key_id: self.key_id.clone(),
            key_item: self.key_item.clone(),
            rewards: self
                .table
                .iter()
                .map(|entry| RewardConfig {
                    item: entry.item().clone(),
                    rarity: entry.rarity().name().to_string(),
                    weight: entry.weight(),
                    chance: entry.chance(),
                })
                .collect(),
            hologram: self.hologram.clone(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn stripped_display_name(&self) -> String {
        strip_color_codes(&self.display_name)
    }

    pub fn block_type(&self) -> &str {
        &self.block_type
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    pub fn key_item(&self) -> &ItemPayload {
        &self.key_item
    }

    pub fn rewards(&self) -> &RewardTable {
        &self.table
    }

    pub fn hologram(&self) -> &HologramConfig {
        &self.hologram
    }

    pub fn locations(&self) -> &[CrateLocation] {
        &self.locations
    }

    pub fn is_at(&self, location: &CrateLocation) -> bool {
        self.locations.contains(location)
    }

    pub fn has_legendary_rewards(&self) -> bool {
        self.table.has_rarity(Rarity::Legendary)
    }

    pub(crate) fn rewards_mut(&mut self) -> &mut RewardTable {
        &mut self.table
    }

    pub(crate) fn set_display_name(&mut self, display_name: String) {
        self.display_name = display_name;
    }

    pub(crate) fn set_key_item(&mut self, key_item: ItemPayload) {
        self.key_item = key_item;
    }

    pub(crate) fn add_location(&mut self, location: CrateLocation) {
        if !self.locations.contains(&location) {
            self.locations.push(location);
        }
    }

    pub(crate) fn remove_location(&mut self, location: &CrateLocation) -> bool {
        let before = self.locations.len();
        self.locations.retain(|l| l != location);
        self.locations.len() != before
    }

    pub(crate) fn take_locations(&mut self) -> Vec<CrateLocation> {
        std::mem::take(&mut self.locations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_is_valid() {
        let config = CrateConfig::template("vote", "&bVote Crate");
        assert!(config.is_valid(), "{:?}", config.problems());
        assert_eq!(config.key_id, "vote_key");
        assert_eq!(config.key_item.display_name, "&bVote Crate Key");
        assert_eq!(config.rewards.len(), 5);

        let definition = CrateDefinition::from_config(config).unwrap();
        assert_eq!(definition.rewards().total_weight(), 100);
        assert!(definition.has_legendary_rewards());
        assert_eq!(definition.stripped_display_name(), "Vote Crate");
    }

    #[test]
    fn test_invalid_id_rejected_not_sanitized() {
        let config = CrateConfig::template("Vote Crate", "Vote");
        match CrateDefinition::from_config(config) {
            Err(CrateError::InvalidId(id)) => assert_eq!(id, "Vote Crate"),
            other => panic!("expected InvalidId, got {other:?}"),
        }
        assert_eq!(sanitize_crate_id("Vote Crate!"), "vote_crate_");
        assert!(is_valid_crate_id(&sanitize_crate_id("Vote Crate!")));
    }

    #[test]
    fn test_problems_listed() {
        let mut config = CrateConfig::template("daily", "Daily");
        config.display_name.clear();
        config.key_item.amount = 65;
        config.rewards[1].rarity = "MYTHIC".to_string();
        config.rewards[2].weight = 0;

        let problems = config.problems();
        assert_eq!(problems.len(), 4, "{problems:?}");
        assert!(problems.iter().any(|p| p == "Display name is required"));
        assert!(problems.iter().any(|p| p.starts_with("Reward #2: invalid rarity 'MYTHIC'")));
        assert!(problems.iter().any(|p| p == "Reward #3: Weight must be at least 1"));
        assert!(matches!(
            CrateDefinition::from_config(config),
            Err(CrateError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_empty_rewards_invalid() {
        let mut config = CrateConfig::template("daily", "Daily");
        config.rewards.clear();
        assert_eq!(config.problems(), vec!["At least one reward is required".to_string()]);
    }

    #[test]
    fn test_config_roundtrip_refreshes_chance() {
        let mut config = CrateConfig::template("daily", "Daily");
        config.rewards[0].chance = 99.0;
        let definition = CrateDefinition::from_config(config).unwrap();
        let saved = definition.to_config();
        assert_eq!(saved.rewards[0].chance, 50.0);
        assert_eq!(saved.rewards[4].rarity, "LEGENDARY");
    }

    #[test]
    fn test_json_uses_camel_case() {
        let json: CrateConfig = serde_json::from_str(
            r#"{"id":"vote","displayName":"Vote","keyId":"vote_key",
                "rewards":[{"item":{"material":"DIAMOND","amount":2},"rarity":"rare","weight":15}]}"#,
        )
        .unwrap();
        assert_eq!(json.block_type, "CHEST");
        assert!(json.is_valid(), "{:?}", json.problems());
        let definition = CrateDefinition::from_config(json).unwrap();
        assert_eq!(definition.rewards().get(0).unwrap().rarity(), Rarity::Rare);
    }

    #[test]
    fn test_clamps() {
        assert_eq!(clamp_weight(0), 1);
        assert_eq!(clamp_weight(5000), 1000);
        assert_eq!(clamp_amount(0), 1);
        assert_eq!(clamp_amount(100), 64);
    }

    #[test]
    fn test_strip_color_codes() {
        assert_eq!(strip_color_codes("&4&lNetherite &zIngot&"), "Netherite &zIngot&");
    }

    #[test]
    fn test_locations_deduplicated() {
        let mut definition = CrateDefinition::from_config(CrateConfig::template("vote", "Vote")).unwrap();
        let location = CrateLocation::new("world", 1, 2, 3);
        definition.add_location(location.clone());
        definition.add_location(location.clone());
        assert_eq!(definition.locations().len(), 1);
        assert!(definition.remove_location(&location));
        assert!(!definition.remove_location(&location));
    }
}
