/// Centralized configuration for the crate system
///
/// The constant modules below are the defaults; `CratesConfig` is the
/// runtime view loaded from `config.json` in the data directory.
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::error::StoreError;

/// Reveal animation pacing
pub mod animation {
    /// Default spin length in milliseconds
    pub const SPIN_DURATION_MS: u32 = 4000;

    /// Steps every animation has regardless of duration
    pub const BASE_STEP_FLOOR: u32 = 30;

    /// One extra step per this many milliseconds of duration
    pub const STEP_DURATION_DIVISOR: u32 = 100;

    /// Delay after the first frames (fast start)
    pub const INITIAL_DELAY_MS: u32 = 50;

    /// Delay approached by the last frames (slow end)
    pub const FINAL_DELAY_MS: u32 = 400;

    /// Upper bound on steps in one reveal
    pub const MAX_STEPS: u32 = 1000;

    /// Longest accepted wait between two frames
    pub const MAX_DELAY_MS: u32 = 10_000;
}

/// Reward and item limits
pub mod limits {
    pub const MIN_WEIGHT: i32 = 1;
    pub const MAX_WEIGHT: i32 = 1000;

    /// Stack size bounds for reward and key items
    pub const MIN_AMOUNT: u32 = 1;
    pub const MAX_AMOUNT: u32 = 64;
}

/// Item tag names stamped on key items
pub mod tags {
    pub const KEY_ID: &str = "CratesKey";
    pub const CRATE_ID: &str = "CratesCrate";
}

/// File layout inside the data directory
pub mod files {
    pub const MAIN_CONFIG: &str = "config.json";
    pub const CRATES_DIR: &str = "crates";
    pub const LOCATIONS: &str = "locations.json";
    pub const SQLITE_DB: &str = "crates.db";
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CratesConfig {
    pub animation: AnimationConfig,
    pub announcements: AnnouncementConfig,
    pub settings: SettingsConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnimationConfig {
    pub enabled: bool,
    pub spin_duration: u32,
    pub base_steps: u32,
    pub step_duration_divisor: u32,
    pub initial_delay: u32,
    pub final_delay: u32,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            spin_duration: animation::SPIN_DURATION_MS,
            base_steps: animation::BASE_STEP_FLOOR,
            step_duration_divisor: animation::STEP_DURATION_DIVISOR,
            initial_delay: animation::INITIAL_DELAY_MS,
            final_delay: animation::FINAL_DELAY_MS,
        }
    }
}

impl AnimationConfig {
    /// Pull out-of-range values back to something playable. Returns one
    /// message per corrected field.
    pub fn normalize(&mut self) -> Vec<String> {
        let mut fixed = Vec::new();

        if self.step_duration_divisor == 0 {
            fixed.push("animation.stepDurationDivisor must be at least 1".to_string());
            self.step_duration_divisor = animation::STEP_DURATION_DIVISOR;
        }
        let steps = u64::from(self.base_steps)
            + u64::from(self.spin_duration / self.step_duration_divisor);
        if steps > u64::from(animation::MAX_STEPS) {
            fixed.push(format!(
                "animation produces {steps} steps, limit is {}",
                animation::MAX_STEPS
            ));
            self.base_steps = self.base_steps.min(animation::MAX_STEPS);
            let room = animation::MAX_STEPS - self.base_steps;
            self.spin_duration = self
                .spin_duration
                .min(room.saturating_mul(self.step_duration_divisor));
        }
        for (name, delay) in [
            ("initialDelay", &mut self.initial_delay),
            ("finalDelay", &mut self.final_delay),
        ] {
            if *delay > animation::MAX_DELAY_MS {
                fixed.push(format!(
                    "animation.{name} {} exceeds {} ms",
                    *delay,
                    animation::MAX_DELAY_MS
                ));
                *delay = animation::MAX_DELAY_MS;
            }
        }

        fixed
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnnouncementConfig {
    pub enabled: bool,
}

impl Default for AnnouncementConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SettingsConfig {
    pub require_key_in_hand: bool,
    pub consume_key_on_use: bool,
    pub prevent_crate_break: bool,
    pub cooldown_seconds: u32,
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            require_key_in_hand: true,
            consume_key_on_use: true,
            prevent_crate_break: true,
            cooldown_seconds: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Queue saves to a writer thread instead of writing inline
    pub background_writes: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// crates/<id>.json and locations.json
    #[default]
    Json,
    /// crates.db in the data directory
    Sqlite,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Json,
            background_writes: false,
        }
    }
}

impl CratesConfig {
    /// Load `config.json`, falling back to defaults when the file is missing
    /// or unreadable.
    pub fn load_or_default(data_dir: &Path) -> Self {
        match Self::load(data_dir) {
            Ok(Some(mut config)) => {
                for problem in config.animation.normalize() {
                    warn!("config.json: {problem}");
                }
                info!("Loaded main configuration.");
                config
            }
            Ok(None) => CratesConfig::default(),
            Err(err) => {
                error!(%err, "Failed to load config.json, using defaults");
                CratesConfig::default()
            }
        }
    }

    pub fn load(data_dir: &Path) -> Result<Option<Self>, StoreError> {
        let path = data_dir.join(files::MAIN_CONFIG);
        if !path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&path).map_err(|e| StoreError::io(&path, e))?;
        let config = serde_json::from_str(&raw).map_err(|e| StoreError::json(&path, e))?;
        Ok(Some(config))
    }

    pub fn save(&self, data_dir: &Path) -> Result<(), StoreError> {
        std::fs::create_dir_all(data_dir).map_err(|e| StoreError::io(data_dir, e))?;
        let path = data_dir.join(files::MAIN_CONFIG);
        let raw = serde_json::to_string_pretty(self).map_err(|e| StoreError::json(&path, e))?;
        std::fs::write(&path, raw).map_err(|e| StoreError::io(&path, e))
    }

    /// Write defaults when no config.json exists yet.
    pub fn ensure_default(data_dir: &Path) -> Result<(), StoreError> {
        if data_dir.join(files::MAIN_CONFIG).exists() {
            return Ok(());
        }
        CratesConfig::default().save(data_dir)?;
        info!("Created default config: {}", files::MAIN_CONFIG);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: CratesConfig =
            serde_json::from_str(r#"{"settings": {"cooldownSeconds": 5}}"#).unwrap();
        assert_eq!(config.settings.cooldown_seconds, 5);
        assert!(config.settings.require_key_in_hand);
        assert_eq!(config.animation.spin_duration, animation::SPIN_DURATION_MS);
    }

    #[test]
    fn test_camel_case_keys() {
        let json = serde_json::to_value(CratesConfig::default()).unwrap();
        assert_eq!(json["animation"]["spinDuration"], 4000);
        assert_eq!(json["settings"]["consumeKeyOnUse"], true);
        assert_eq!(json["storage"]["backgroundWrites"], false);
        assert_eq!(json["storage"]["backend"], "json");
    }

    #[test]
    fn test_oversized_animation_normalized() {
        let mut config: AnimationConfig = serde_json::from_str(
            r#"{"spinDuration": 4000000000, "stepDurationDivisor": 0, "finalDelay": 90000}"#,
        )
        .unwrap();
        let fixed = config.normalize();
        assert_eq!(fixed.len(), 3, "{fixed:?}");
        assert_eq!(config.step_duration_divisor, animation::STEP_DURATION_DIVISOR);
        assert!(config.base_steps + config.spin_duration / config.step_duration_divisor <= animation::MAX_STEPS);
        assert_eq!(config.final_delay, animation::MAX_DELAY_MS);

        let mut defaults = AnimationConfig::default();
        assert!(defaults.normalize().is_empty());
        assert_eq!(defaults, AnimationConfig::default());
    }

    #[test]
    fn test_load_normalizes_animation() {
        let dir = crate::storage::tests::scratch_dir("config-normalize");
        std::fs::write(
            dir.join(files::MAIN_CONFIG),
            r#"{"animation": {"baseSteps": 4294967295, "spinDuration": 4000}}"#,
        )
        .unwrap();
        let config = CratesConfig::load_or_default(&dir);
        assert_eq!(config.animation.base_steps, animation::MAX_STEPS);
        assert_eq!(config.animation.spin_duration, 0);

        let fresh = crate::storage::tests::scratch_dir("config-default");
        CratesConfig::ensure_default(&fresh).unwrap();
        assert_eq!(CratesConfig::load(&fresh).unwrap(), Some(CratesConfig::default()));
    }
}
