//! Key-operated reward crates for a multiplayer game server.
//!
//! Players use keys on registered world locations and receive a reward drawn
//! from a weighted table, optionally preceded by a slot-machine style reveal.
//! The host server supplies inventory, item tags and scheduling through the
//! traits in [`host`].

macro_rules! debug_log {
    ($($arg:tt)*) => {
        if cfg!(feature = "debug_logs") {
            tracing::debug!($($arg)*);
        }
    };
}

pub mod config;  // Tuning constants and config.json model
pub mod error;
pub mod logging;
pub mod host;  // Collaborator traits implemented by the game server
pub mod reward;
pub mod crates;
pub mod keys;
pub mod animation;
pub mod storage;  // JSON / SQLite / write-behind persistence
pub mod opener;
pub mod runtime;  // Composition root

pub use animation::{AnimationTiming, Frame, RevealAnimation, RevealState, SessionTracker};
pub use config::CratesConfig;
pub use crates::{CrateConfig, CrateDefinition, CrateLocation, LocationRegistry, Mutation};
pub use error::{AnimationError, CrateError, StoreError};
pub use keys::{KeyBinding, KeyRegistry};
pub use opener::{BreakDecision, CrateEvent, CrateOpener, OpenOutcome};
pub use reward::{ItemPayload, Rarity, RewardEntry, RewardSelector, RewardTable};
pub use runtime::CratesRuntime;
