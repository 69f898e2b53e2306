// Reward model and selection

mod rarity;
mod table;
pub(crate) mod selection;

pub use rarity::{Rarity, RarityFlags, RarityInfo, UnknownRarity};
pub use selection::{summarize, RandomSource, RewardSelector, SimulationRow, StdRandom};
pub use table::{chance_percent, ItemPayload, RewardEntry, RewardTable};
