// Rarity tiers and their per-tier data
// Lookups go through RARITY_TABLE so adding a tier is a data change

use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Behaviour switches attached to a rarity tier
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RarityFlags: u8 {
        /// Broadcast wins of this tier
        const ANNOUNCE = 1 << 0;
        /// Play the special win effects
        const SPECIAL = 1 << 1;
    }
}

/// Rarity tiers, ordered from most to least common
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
#[repr(u8)]
pub enum Rarity {
    Common = 0,
    Uncommon = 1,
    Rare = 2,
    Epic = 3,
    Legendary = 4,
}

/// Static data for one tier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RarityInfo {
    pub color_code: &'static str,
    pub color_name: &'static str,
    pub default_weight: i32,
    pub flags: RarityFlags,
}

const RARITY_TABLE: [RarityInfo; 5] = [
    RarityInfo {
        color_code: "&7",
        color_name: "Gray",
        default_weight: 50,
        flags: RarityFlags::empty(),
    },
    RarityInfo {
        color_code: "&a",
        color_name: "Green",
        default_weight: 25,
        flags: RarityFlags::empty(),
    },
    RarityInfo {
        color_code: "&9",
        color_name: "Blue",
        default_weight: 15,
        flags: RarityFlags::ANNOUNCE,
    },
    RarityInfo {
        color_code: "&5",
        color_name: "Purple",
        default_weight: 7,
        flags: RarityFlags::ANNOUNCE.union(RarityFlags::SPECIAL),
    },
    RarityInfo {
        color_code: "&6",
        color_name: "Gold",
        default_weight: 3,
        flags: RarityFlags::ANNOUNCE.union(RarityFlags::SPECIAL),
    },
];

impl Rarity {
    pub const ALL: [Rarity; 5] = [
        Rarity::Common,
        Rarity::Uncommon,
        Rarity::Rare,
        Rarity::Epic,
        Rarity::Legendary,
    ];

    #[inline]
    pub fn info(self) -> &'static RarityInfo {
        &RARITY_TABLE[self as usize]
    }

    pub fn color_code(self) -> &'static str {
        self.info().color_code
    }

    pub fn default_weight(self) -> i32 {
        self.info().default_weight
    }

    pub fn should_announce(self) -> bool {
        self.info().flags.contains(RarityFlags::ANNOUNCE)
    }

    pub fn is_special(self) -> bool {
        self.info().flags.contains(RarityFlags::SPECIAL)
    }

    pub fn name(self) -> &'static str {
        match self {
            Rarity::Common => "COMMON",
            Rarity::Uncommon => "UNCOMMON",
            Rarity::Rare => "RARE",
            Rarity::Epic => "EPIC",
            Rarity::Legendary => "LEGENDARY",
        }
    }

    /// Lenient parse used when reading configs: unknown or empty names are Common.
    pub fn from_name_or_common(name: &str) -> Self {
        name.parse().unwrap_or(Rarity::Common)
    }
}

impl fmt::Display for Rarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRarity(pub String);

impl fmt::Display for UnknownRarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid rarity '{}'. Valid values: COMMON, UNCOMMON, RARE, EPIC, LEGENDARY",
            self.0
        )
    }
}

impl std::error::Error for UnknownRarity {}

impl FromStr for Rarity {
    type Err = UnknownRarity;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        Rarity::ALL
            .into_iter()
            .find(|rarity| rarity.name() == upper)
            .ok_or_else(|| UnknownRarity(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_weights_sum_to_hundred() {
        let total: i32 = Rarity::ALL.iter().map(|r| r.default_weight()).sum();
        assert_eq!(total, 100);
    }

    #[test]
    fn test_ordering() {
        assert!(Rarity::Common < Rarity::Uncommon);
        assert!(Rarity::Epic < Rarity::Legendary);
    }

    #[test]
    fn test_announce_and_special_flags() {
        assert!(!Rarity::Common.should_announce());
        assert!(!Rarity::Uncommon.should_announce());
        assert!(Rarity::Rare.should_announce());
        assert!(!Rarity::Rare.is_special());
        assert!(Rarity::Epic.is_special());
        assert!(Rarity::Legendary.is_special());
    }

    #[test]
    fn test_parse_case_insensitive() {
        assert_eq!("legendary".parse::<Rarity>(), Ok(Rarity::Legendary));
        assert_eq!("Epic".parse::<Rarity>(), Ok(Rarity::Epic));
        assert!("mythic".parse::<Rarity>().is_err());
        assert_eq!(Rarity::from_name_or_common("mythic"), Rarity::Common);
        assert_eq!(Rarity::from_name_or_common(""), Rarity::Common);
    }

    #[test]
    fn test_color_codes() {
        assert_eq!(Rarity::Legendary.color_code(), "&6");
        assert_eq!(Rarity::Common.info().color_name, "Gray");
    }
}
