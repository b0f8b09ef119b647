//! In-memory settings adapter.
//!
//! Implements [`SettingsPort`] over a locked map.  Hosts that keep their
//! settings elsewhere implement the port directly; this adapter covers
//! embedding, simulation and tests, and can be seeded from a flat JSON
//! object of the same shape the host persists.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use log::info;

use crate::app::ports::SettingsPort;
use crate::config::{HeaterConfig, SettingValue, keys};

#[derive(Debug, Default)]
pub struct MemorySettings {
    values: RwLock<HashMap<String, SettingValue>>,
}

impl MemorySettings {
    /// Empty store; every lookup falls through to the built-in defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with the documented defaults, stored the way
    /// the host stores them (numbers as strings).
    pub fn with_defaults() -> Self {
        let bed = HeaterConfig::BED_DEFAULT;
        let tool = HeaterConfig::TOOL_DEFAULT;
        let store = Self::new();
        store.set(keys::NUMBER_EXTRUDERS, 1u32);
        store.set(keys::EMERGENCY_GCODE, "M112");
        store.set(keys::BED_MAX_DIFF, bed.max_deviation.to_string());
        store.set(keys::BED_MAX_OFF_TEMP, bed.off_ceiling.to_string());
        store.set(keys::BED_DELAY, bed.confirm_delay_secs.to_string());
        store.set(keys::TOOL_MAX_DIFF, tool.max_deviation.to_string());
        store.set(keys::TOOL_MAX_OFF_TEMP, tool.off_ceiling.to_string());
        store.set(keys::TOOL_DELAY, tool.confirm_delay_secs.to_string());
        store.set(keys::TRIGGER_ON_EQUAL, true);
        store
    }

    /// Defaults overlaid with the keys of a flat JSON object.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        let overrides: HashMap<String, SettingValue> = serde_json::from_str(json)?;
        let store = Self::with_defaults();
        info!("MemorySettings: {} override(s) from JSON", overrides.len());
        store
            .values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(overrides);
        Ok(store)
    }

    pub fn set(&self, key: &str, value: impl Into<SettingValue>) {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_owned(), value.into());
    }

    pub fn remove(&self, key: &str) -> Option<SettingValue> {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
    }
}

impl SettingsPort for MemorySettings {
    fn get(&self, key: &str) -> Option<SettingValue> {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }
}
