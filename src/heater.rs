//! Heater identifiers and the per-tick temperature snapshot.
//!
//! The host labels heaters with short strings (`"B"` for the bed,
//! `"T0"`, `"T1"`, … for tools).  Inside the crate they are a typed
//! [`HeaterId`]; the string form only exists at the serde boundary.

use core::fmt;
use core::str::FromStr;
use std::collections::BTreeMap;

use log::debug;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ───────────────────────────────────────────────────────────────
// HeaterId
// ───────────────────────────────────────────────────────────────

/// One independently controlled temperature zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum HeaterId {
    Bed,
    Tool(u8),
}

impl HeaterId {
    /// Which settings family configures this heater.
    pub const fn kind(self) -> HeaterKind {
        match self {
            Self::Bed => HeaterKind::Bed,
            Self::Tool(_) => HeaterKind::Tool,
        }
    }

    /// The bed plus `extruders` tools, in label order.
    pub fn configured(extruders: u8) -> Vec<Self> {
        core::iter::once(Self::Bed)
            .chain((0..extruders).map(Self::Tool))
            .collect()
    }
}

impl fmt::Display for HeaterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bed => write!(f, "B"),
            Self::Tool(n) => write!(f, "T{n}"),
        }
    }
}

/// Returned when a heater label is neither `B` nor `T<n>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseHeaterIdError(pub String);

impl fmt::Display for ParseHeaterIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown heater label {:?}", self.0)
    }
}

impl std::error::Error for ParseHeaterIdError {}

impl FromStr for HeaterId {
    type Err = ParseHeaterIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "B" {
            return Ok(Self::Bed);
        }
        s.strip_prefix('T')
            .filter(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|digits| digits.parse::<u8>().ok())
            .map(Self::Tool)
            .ok_or_else(|| ParseHeaterIdError(s.to_owned()))
    }
}

impl TryFrom<String> for HeaterId {
    type Error = ParseHeaterIdError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<HeaterId> for String {
    fn from(id: HeaterId) -> Self {
        id.to_string()
    }
}

/// Heater family; bed and tools read separate setting keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeaterKind {
    Bed,
    Tool,
}

// ───────────────────────────────────────────────────────────────
// Samples
// ───────────────────────────────────────────────────────────────

/// One `(current, target)` reading.  Serialised as a two-element array,
/// matching how the host reports temperatures.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "(f32, f32)", into = "(f32, f32)")]
pub struct TemperatureSample {
    pub current: f32,
    pub target: f32,
}

impl TemperatureSample {
    pub const fn new(current: f32, target: f32) -> Self {
        Self { current, target }
    }
}

impl From<(f32, f32)> for TemperatureSample {
    fn from((current, target): (f32, f32)) -> Self {
        Self { current, target }
    }
}

impl From<TemperatureSample> for (f32, f32) {
    fn from(s: TemperatureSample) -> Self {
        (s.current, s.target)
    }
}

/// Every heater's reading for one host sampling tick.
///
/// Entries whose label is not a heater (`"C"` for a chamber sensor, say) or
/// whose value is not a `(current, target)` pair are kept verbatim, so the
/// snapshot serialises back to exactly what the host sent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemperatureSnapshot {
    samples: BTreeMap<HeaterId, TemperatureSample>,
    passthrough: BTreeMap<String, serde_json::Value>,
}

impl TemperatureSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, id: HeaterId, current: f32, target: f32) -> Self {
        self.insert(id, TemperatureSample::new(current, target));
        self
    }

    pub fn insert(&mut self, id: HeaterId, sample: TemperatureSample) {
        self.samples.insert(id, sample);
    }

    pub fn get(&self, id: HeaterId) -> Option<TemperatureSample> {
        self.samples.get(&id).copied()
    }

    /// Number of heater samples; passthrough entries are not counted.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl Serialize for TemperatureSnapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.samples.len() + self.passthrough.len()))?;
        for (id, sample) in &self.samples {
            map.serialize_entry(&id.to_string(), sample)?;
        }
        for (label, value) in &self.passthrough {
            map.serialize_entry(label, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for TemperatureSnapshot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, serde_json::Value>::deserialize(deserializer)?;
        let mut snapshot = Self::new();
        for (label, value) in raw {
            let Ok(id) = label.parse::<HeaterId>() else {
                debug!("SNAPSHOT | {label:?} is not a heater, passing through");
                snapshot.passthrough.insert(label, value);
                continue;
            };
            match TemperatureSample::deserialize(&value) {
                Ok(sample) => snapshot.insert(id, sample),
                Err(e) => {
                    debug!("SNAPSHOT | {id}: unreadable sample {value}: {e}");
                    snapshot.passthrough.insert(label, value);
                }
            }
        }
        Ok(snapshot)
    }
}
