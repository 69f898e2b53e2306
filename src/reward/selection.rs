// Weighted reward selection
// Cumulative-weight walk over the table; integer weights only

use std::cmp::Reverse;
use std::collections::HashMap;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::warn;

use super::table::{chance_percent, RewardEntry, RewardTable};

/// Uniform integer source, injected so draws can be made deterministic
pub trait RandomSource: Send {
    /// Uniform value in `[0, bound)`. Callers never pass 0.
    fn next_below(&mut self, bound: u64) -> u64;
}

/// `rand`-backed source used in production
pub struct StdRandom {
    rng: StdRng,
}

impl StdRandom {
    pub fn from_os() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl RandomSource for StdRandom {
    fn next_below(&mut self, bound: u64) -> u64 {
        self.rng.random_range(0..bound)
    }
}

/// Draw one entry. Empty tables yield `None`; a non-positive total weight
/// falls back to a uniform pick over the entries.
fn draw<'t>(table: &'t RewardTable, rng: &mut dyn RandomSource) -> Option<&'t RewardEntry> {
    let entries = table.entries();
    if entries.is_empty() {
        warn!("Attempted to select reward from empty reward table");
        return None;
    }

    let total_weight = table.total_weight();
    if total_weight <= 0 {
        warn!(
            entries = entries.len(),
            total_weight, "Reward table has no positive weight, selecting uniformly"
        );
        let index = rng.next_below(entries.len() as u64) as usize;
        return entries.get(index);
    }

    let roll = rng.next_below(total_weight as u64) as i64;
    let mut cumulative: i64 = 0;
    for entry in entries {
        cumulative += i64::from(entry.weight());
        if roll < cumulative {
            return Some(entry);
        }
    }

    // Unreachable with consistent weights
    entries.last()
}

/// Selection engine shared by live opens, animation filler and simulations
pub struct RewardSelector {
    rng: Mutex<Box<dyn RandomSource>>,
}

impl RewardSelector {
    pub fn new(source: impl RandomSource + 'static) -> Self {
        Self {
            rng: Mutex::new(Box::new(source)),
        }
    }

    pub fn from_entropy() -> Self {
        Self::new(StdRandom::from_os())
    }

    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRandom::seeded(seed))
    }

    /// Weighted draw from `table`
    pub fn select(&self, table: &RewardTable) -> Option<RewardEntry> {
        self.select_ref(table).cloned()
    }

    pub fn select_ref<'t>(&self, table: &'t RewardTable) -> Option<&'t RewardEntry> {
        let mut rng = self.rng.lock();
        draw(table, &mut **rng)
    }

    /// Display percentage for `entry` within `table`; never used for draws
    pub fn calculate_chance(entry: &RewardEntry, table: &RewardTable) -> f64 {
        chance_percent(entry.weight(), table.total_weight())
    }

    /// `count` independent draws in draw order, used as animation filler
    pub fn pre_roll(&self, table: &RewardTable, count: usize) -> Vec<RewardEntry> {
        if table.is_empty() {
            return Vec::new();
        }
        let mut rng = self.rng.lock();
        (0..count)
            .filter_map(|_| draw(table, &mut **rng).cloned())
            .collect()
    }

    /// Count how often each reward (by display key) comes up in `iterations` draws
    pub fn simulate(&self, table: &RewardTable, iterations: u32) -> HashMap<String, u32> {
        let mut results = HashMap::new();
        if table.is_empty() {
            return results;
        }
        let mut rng = self.rng.lock();
        for _ in 0..iterations {
            if let Some(entry) = draw(table, &mut **rng) {
                *results.entry(entry.display_key().to_string()).or_insert(0) += 1;
            }
        }
        results
    }
}

/// One row of a simulation summary
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationRow {
    pub display_key: String,
    pub count: u32,
    pub percentage: f64,
}

/// Sort simulation counts by frequency, most common first
pub fn summarize(results: &HashMap<String, u32>, iterations: u32) -> Vec<SimulationRow> {
    let mut rows: Vec<SimulationRow> = results
        .iter()
        .map(|(key, &count)| SimulationRow {
            display_key: key.clone(),
            count,
            percentage: if iterations == 0 {
                0.0
            } else {
                f64::from(count) / f64::from(iterations) * 100.0
            },
        })
        .collect();
    rows.sort_by_key(|row| (Reverse(row.count), row.display_key.clone()));
    rows
}
