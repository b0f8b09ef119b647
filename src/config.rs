//! Runaway-detection configuration.
//!
//! Settings live in the host's key/value store and may change at any time.
//! The supervisor assembles one [`RunawaySettings`] snapshot per evaluation
//! tick and hands each monitor a plain [`HeaterConfig`], so a setting edited
//! mid-tick never produces a half-updated view.

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::app::ports::SettingsPort;
use crate::error::ConfigError;
use crate::heater::HeaterKind;

/// Setting keys understood by the monitor.
pub mod keys {
    pub const NUMBER_EXTRUDERS: &str = "numberExtruders";
    pub const EMERGENCY_GCODE: &str = "emergencyGcode";
    pub const BED_MAX_DIFF: &str = "bMaxDiff";
    pub const BED_MAX_OFF_TEMP: &str = "bMaxOffTemp";
    pub const BED_DELAY: &str = "bDelay";
    pub const TOOL_MAX_DIFF: &str = "tMaxDiff";
    pub const TOOL_MAX_OFF_TEMP: &str = "tMaxOffTemp";
    pub const TOOL_DELAY: &str = "tDelay";
    pub const TRIGGER_ON_EQUAL: &str = "triggerOnEqual";
}

pub const DEFAULT_EXTRUDERS: u8 = 1;
pub const DEFAULT_EMERGENCY_GCODE: &str = "M112";

// ───────────────────────────────────────────────────────────────
// Raw setting values
// ───────────────────────────────────────────────────────────────

/// A value as stored by the host.  Numeric settings are commonly saved as
/// strings (`"10"`), so every numeric accessor accepts both forms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl SettingValue {
    fn invalid(&self, key: &'static str) -> ConfigError {
        let value = match self {
            Self::Bool(b) => b.to_string(),
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s.clone(),
        };
        ConfigError::Invalid { key, value }
    }

    pub fn as_f32(&self, key: &'static str) -> Result<f32, ConfigError> {
        match self {
            Self::Number(n) => Ok(*n as f32),
            Self::Text(s) => s.trim().parse::<f32>().map_err(|_| self.invalid(key)),
            Self::Bool(_) => Err(self.invalid(key)),
        }
    }

    pub fn as_bool(&self, key: &'static str) -> Result<bool, ConfigError> {
        match self {
            Self::Bool(b) => Ok(*b),
            Self::Text(s) if s.trim().eq_ignore_ascii_case("true") => Ok(true),
            Self::Text(s) if s.trim().eq_ignore_ascii_case("false") => Ok(false),
            _ => Err(self.invalid(key)),
        }
    }

    pub fn as_count(&self, key: &'static str) -> Result<u64, ConfigError> {
        match self {
            Self::Number(n) if n.fract() == 0.0 && *n >= 0.0 => Ok(*n as u64),
            Self::Text(s) => s.trim().parse::<u64>().map_err(|_| self.invalid(key)),
            _ => Err(self.invalid(key)),
        }
    }
}

impl From<bool> for SettingValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for SettingValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<u32> for SettingValue {
    fn from(n: u32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<&str> for SettingValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<String> for SettingValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

// ───────────────────────────────────────────────────────────────
// HeaterConfig
// ───────────────────────────────────────────────────────────────

/// Thresholds for one heater, derived fresh each evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeaterConfig {
    /// Allowed deviation (°C) either side of a non-zero target.
    pub max_deviation: f32,
    /// Highest temperature (°C) tolerated while the heater is off.
    pub off_ceiling: f32,
    /// Seconds a heater must stay out of band before an alert can fire.
    pub confirm_delay_secs: f32,
    /// Whether touching the watermark counts as "not improved".
    pub trigger_on_equal: bool,
}

impl HeaterConfig {
    pub const BED_DEFAULT: Self = Self {
        max_deviation: 10.0,
        off_ceiling: 30.0,
        confirm_delay_secs: 20.0,
        trigger_on_equal: true,
    };

    pub const TOOL_DEFAULT: Self = Self {
        max_deviation: 20.0,
        off_ceiling: 30.0,
        confirm_delay_secs: 25.0,
        trigger_on_equal: true,
    };

    pub const fn default_for(kind: HeaterKind) -> Self {
        match kind {
            HeaterKind::Bed => Self::BED_DEFAULT,
            HeaterKind::Tool => Self::TOOL_DEFAULT,
        }
    }
}

/// Setting keys for each heater family.
struct KindKeys {
    max_diff: &'static str,
    max_off_temp: &'static str,
    delay: &'static str,
}

const fn keys_for(kind: HeaterKind) -> KindKeys {
    match kind {
        HeaterKind::Bed => KindKeys {
            max_diff: keys::BED_MAX_DIFF,
            max_off_temp: keys::BED_MAX_OFF_TEMP,
            delay: keys::BED_DELAY,
        },
        HeaterKind::Tool => KindKeys {
            max_diff: keys::TOOL_MAX_DIFF,
            max_off_temp: keys::TOOL_MAX_OFF_TEMP,
            delay: keys::TOOL_DELAY,
        },
    }
}

/// Reject values that would silently disable detection.
pub fn validate_heater_config(cfg: &HeaterConfig, kind: HeaterKind) -> Result<(), ConfigError> {
    let k = keys_for(kind);
    let checks = [
        (k.max_diff, cfg.max_deviation),
        (k.max_off_temp, cfg.off_ceiling),
        (k.delay, cfg.confirm_delay_secs),
    ];
    for (key, value) in checks {
        if !value.is_finite() {
            return Err(ConfigError::OutOfRange {
                key,
                reason: "must be a finite number",
            });
        }
        if value < 0.0 {
            return Err(ConfigError::OutOfRange {
                key,
                reason: "must not be negative",
            });
        }
    }
    Ok(())
}

// ───────────────────────────────────────────────────────────────
// Per-tick snapshot
// ───────────────────────────────────────────────────────────────

/// All settings the supervisor needs for one evaluation tick.
///
/// Bed and tool configs are loaded independently: a malformed `tMaxDiff`
/// skips the tools for this tick but the bed is still monitored.
#[derive(Debug, Clone, PartialEq)]
pub struct RunawaySettings {
    pub emergency_gcode: String,
    pub bed: Result<HeaterConfig, ConfigError>,
    pub tool: Result<HeaterConfig, ConfigError>,
}

impl Default for RunawaySettings {
    fn default() -> Self {
        Self {
            emergency_gcode: DEFAULT_EMERGENCY_GCODE.to_owned(),
            bed: Ok(HeaterConfig::BED_DEFAULT),
            tool: Ok(HeaterConfig::TOOL_DEFAULT),
        }
    }
}

impl RunawaySettings {
    /// Read every runaway setting once.  Missing keys fall back to the
    /// defaults; unparseable ones surface as `Err` on the affected family.
    pub fn load(settings: &(impl SettingsPort + ?Sized)) -> Self {
        let trigger_on_equal = read(settings, keys::TRIGGER_ON_EQUAL)
            .map_or(Ok(true), |v| v.as_bool(keys::TRIGGER_ON_EQUAL));

        let emergency_gcode = match read(settings, keys::EMERGENCY_GCODE) {
            Some(SettingValue::Text(g)) if !g.trim().is_empty() => g,
            Some(other) => {
                warn!(
                    "CONFIG | {} unusable ({:?}), falling back to {}",
                    keys::EMERGENCY_GCODE,
                    other,
                    DEFAULT_EMERGENCY_GCODE
                );
                DEFAULT_EMERGENCY_GCODE.to_owned()
            }
            None => DEFAULT_EMERGENCY_GCODE.to_owned(),
        };

        Self {
            emergency_gcode,
            bed: load_heater(settings, HeaterKind::Bed, &trigger_on_equal),
            tool: load_heater(settings, HeaterKind::Tool, &trigger_on_equal),
        }
    }

    pub fn config_for(&self, kind: HeaterKind) -> &Result<HeaterConfig, ConfigError> {
        match kind {
            HeaterKind::Bed => &self.bed,
            HeaterKind::Tool => &self.tool,
        }
    }
}

/// Number of tool heaters, read once when the supervisor is built.
pub fn read_extruder_count(settings: &(impl SettingsPort + ?Sized)) -> Result<u8, ConfigError> {
    let Some(value) = read(settings, keys::NUMBER_EXTRUDERS) else {
        return Ok(DEFAULT_EXTRUDERS);
    };
    let count = value.as_count(keys::NUMBER_EXTRUDERS)?;
    u8::try_from(count).map_err(|_| ConfigError::OutOfRange {
        key: keys::NUMBER_EXTRUDERS,
        reason: "must be at most 255",
    })
}

fn read(settings: &(impl SettingsPort + ?Sized), key: &'static str) -> Option<SettingValue> {
    let value = settings.get(key);
    if value.is_none() {
        debug!("CONFIG | {key} not set, using default");
    }
    value
}

fn read_f32(
    settings: &(impl SettingsPort + ?Sized),
    key: &'static str,
    default: f32,
) -> Result<f32, ConfigError> {
    read(settings, key).map_or(Ok(default), |v| v.as_f32(key))
}

fn load_heater(
    settings: &(impl SettingsPort + ?Sized),
    kind: HeaterKind,
    trigger_on_equal: &Result<bool, ConfigError>,
) -> Result<HeaterConfig, ConfigError> {
    let k = keys_for(kind);
    let defaults = HeaterConfig::default_for(kind);
    let cfg = HeaterConfig {
        max_deviation: read_f32(settings, k.max_diff, defaults.max_deviation)?,
        off_ceiling: read_f32(settings, k.max_off_temp, defaults.off_ceiling)?,
        confirm_delay_secs: read_f32(settings, k.delay, defaults.confirm_delay_secs)?,
        trigger_on_equal: trigger_on_equal.clone()?,
    };
    validate_heater_config(&cfg, kind)?;
    Ok(cfg)
}
