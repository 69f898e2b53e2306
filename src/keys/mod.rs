// Crate keys: bindings from key ids to crates and held-item validation

mod key_registry;

pub use key_registry::{KeyBinding, KeyRegistry};
