// Crate definitions, placed locations and the registry tying them together

mod definition;
mod location;
mod registry;

pub use definition::{
    clamp_amount, clamp_weight, is_valid_crate_id, sanitize_crate_id, strip_color_codes,
    CrateConfig, CrateDefinition, HologramConfig, RewardConfig,
};
pub use location::{CrateLocation, ParseLocationError};
pub use registry::{LoadReport, LocationRegistry, Mutation, RestoreReport};
