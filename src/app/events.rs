//! Outbound runaway events.
//!
//! Every alert fires the generic [`RunawayEvent::Triggered`] plus one
//! direction-specific event.  Observers subscribe by event through the
//! [`ObserverRegistry`](super::ports::ObserverRegistry) port.

use core::fmt;

use serde::Serialize;

use crate::heater::HeaterId;
use crate::monitor::{Direction, RunawayAlert};

/// Events observers can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RunawayEvent {
    /// Any runaway, either direction.
    #[serde(rename = "runaway_triggered")]
    Triggered,
    /// Temperature ran above its band.
    #[serde(rename = "over_runaway_triggered")]
    OverTriggered,
    /// Temperature fell below its band.
    #[serde(rename = "under_runaway_triggered")]
    UnderTriggered,
}

impl RunawayEvent {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Triggered => "runaway_triggered",
            Self::OverTriggered => "over_runaway_triggered",
            Self::UnderTriggered => "under_runaway_triggered",
        }
    }

    /// Events fired for an alert in `direction`, generic first.
    pub const fn for_direction(direction: Direction) -> [Self; 2] {
        match direction {
            Direction::Over => [Self::Triggered, Self::OverTriggered],
            Direction::Under => [Self::Triggered, Self::UnderTriggered],
        }
    }
}

impl fmt::Display for RunawayEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Payload handed to each observer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RunawayNotification {
    pub event: RunawayEvent,
    pub heater: HeaterId,
    pub target_temp: f32,
    pub current_temp: f32,
}

impl RunawayNotification {
    pub fn new(event: RunawayEvent, alert: &RunawayAlert) -> Self {
        Self {
            event,
            heater: alert.heater,
            target_temp: alert.target_temp,
            current_temp: alert.current_temp,
        }
    }
}
