//! Per-heater runaway detection.
//!
//! A [`HeaterMonitor`] owns one heater's [`HeaterState`] and turns each
//! `(current, target)` sample into a [`Decision`].  Both directions are
//! tracked independently; each has its own episode timer and watermark.
//!
//! ## Episode lifecycle (per direction)
//!
//! ```text
//!             out of band                 elapsed >= delay && not improved
//!  InRange ───────────────▶ Warning(d) ──────────────────────────────────▶ Alert(d)
//!     ▲                      │    ▲  │                                        │
//!     │      back in band    │    │  │ elapsed < delay, or improved           │
//!     ├──────────────────────┘    └──┘ (baseline moves to current)            │
//!     │                                                                       │
//!     └───────────── timer cleared; next out-of-band sample opens ◀───────────┘
//!                    a fresh episode
//! ```
//!
//! 1. Bounds are recomputed from the target every sample.
//! 2. The first out-of-band sample stamps `since` and seeds the watermark.
//! 3. While `elapsed < confirm_delay` the watermark follows the worst reading.
//! 4. Once the delay has passed, a reading no better than the watermark
//!    alerts and clears `since`; a better reading moves the watermark and the
//!    episode continues.
//!
//! Confirmation is pure timestamp arithmetic.  Nothing here sleeps, so one
//! heater confirming an excursion never holds up another.

use log::{debug, warn};
use serde::Serialize;

use crate::config::HeaterConfig;
use crate::heater::HeaterId;
use crate::time::Timestamp;

// ───────────────────────────────────────────────────────────────
// Direction & bounds
// ───────────────────────────────────────────────────────────────

/// Which side of the band a heater left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Above `max`.
    Over,
    /// Below `min`.
    Under,
}

impl Direction {
    pub const BOTH: [Self; 2] = [Self::Over, Self::Under];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Over => "over",
            Self::Under => "under",
        }
    }

    fn violates(self, temp: f32, bounds: Bounds) -> bool {
        match self {
            Self::Over => temp > bounds.max,
            Self::Under => temp < bounds.min,
        }
    }

    /// `temp` has not improved relative to `watermark`.
    fn not_improved(self, temp: f32, watermark: f32, inclusive: bool) -> bool {
        match (self, inclusive) {
            (Self::Over, true) => temp >= watermark,
            (Self::Over, false) => temp > watermark,
            (Self::Under, true) => temp <= watermark,
            (Self::Under, false) => temp < watermark,
        }
    }

    fn more_extreme(self, a: f32, b: f32) -> f32 {
        match self {
            Self::Over => a.max(b),
            Self::Under => a.min(b),
        }
    }

    fn toward_center(self, watermark: f32, temp: f32) -> f32 {
        match self {
            Self::Over => watermark.min(temp),
            Self::Under => watermark.max(temp),
        }
    }
}

impl core::fmt::Display for Direction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inclusive operating band for one sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: f32,
    pub max: f32,
}

impl Bounds {
    /// `target ± max_deviation` while heating; `[0, off_ceiling]` while off.
    pub fn for_target(target: f32, config: &HeaterConfig) -> Self {
        if target > 0.0 {
            Self {
                min: target - config.max_deviation,
                max: target + config.max_deviation,
            }
        } else {
            Self {
                min: 0.0,
                max: config.off_ceiling,
            }
        }
    }

    pub fn contains(&self, temp: f32) -> bool {
        temp >= self.min && temp <= self.max
    }
}

// ───────────────────────────────────────────────────────────────
// Decisions
// ───────────────────────────────────────────────────────────────

/// A confirmed runaway on one heater.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RunawayAlert {
    pub heater: HeaterId,
    pub direction: Direction,
    pub target_temp: f32,
    pub current_temp: f32,
    #[serde(skip)]
    pub at: Timestamp,
}

/// Outcome of one sample.  Produced per evaluation, never stored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decision {
    InRange,
    Warning(Direction),
    Alert(RunawayAlert),
}

impl Decision {
    pub fn is_in_range(&self) -> bool {
        matches!(self, Self::InRange)
    }

    pub fn direction(&self) -> Option<Direction> {
        match self {
            Self::InRange => None,
            Self::Warning(d) => Some(*d),
            Self::Alert(a) => Some(a.direction),
        }
    }

    pub fn alert(&self) -> Option<&RunawayAlert> {
        match self {
            Self::Alert(a) => Some(a),
            _ => None,
        }
    }
}

// ───────────────────────────────────────────────────────────────
// State
// ───────────────────────────────────────────────────────────────

/// Mutable detection state for one heater.  Lives for the process uptime.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct HeaterState {
    pub current_temp: f32,
    pub target_temp: f32,
    /// Lowest reading of the current under-band episode.
    pub low_watermark: f32,
    /// Highest reading of the current over-band episode.
    pub high_watermark: f32,
    /// Start of the current over-band episode; `None` while in range.
    pub high_since: Option<Timestamp>,
    /// Start of the current under-band episode; `None` while in range.
    pub low_since: Option<Timestamp>,
    /// Samples observed since startup.
    pub samples_seen: u64,
}

impl HeaterState {
    /// Split-borrow the timer and watermark for one direction.
    fn episode_mut(&mut self, direction: Direction) -> (&mut Option<Timestamp>, &mut f32) {
        match direction {
            Direction::Over => (&mut self.high_since, &mut self.high_watermark),
            Direction::Under => (&mut self.low_since, &mut self.low_watermark),
        }
    }

    pub fn since(&self, direction: Direction) -> Option<Timestamp> {
        match direction {
            Direction::Over => self.high_since,
            Direction::Under => self.low_since,
        }
    }
}

/// Per-direction result before it is folded into a [`Decision`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Clear,
    Confirming,
    Confirmed,
}

// ───────────────────────────────────────────────────────────────
// HeaterMonitor
// ───────────────────────────────────────────────────────────────

/// Runaway detector for a single heater.
#[derive(Debug, Clone)]
pub struct HeaterMonitor {
    id: HeaterId,
    state: HeaterState,
}

impl HeaterMonitor {
    pub fn new(id: HeaterId) -> Self {
        Self {
            id,
            state: HeaterState::default(),
        }
    }

    pub fn id(&self) -> HeaterId {
        self.id
    }

    pub fn state(&self) -> &HeaterState {
        &self.state
    }

    /// Feed one sample and decide whether the heater is in range, still
    /// confirming an excursion, or in runaway.
    pub fn observe(
        &mut self,
        current: f32,
        target: f32,
        config: &HeaterConfig,
        now: Timestamp,
    ) -> Decision {
        if self.state.samples_seen == 0 {
            self.state.low_watermark = current;
            self.state.high_watermark = current;
        }
        self.state.samples_seen = self.state.samples_seen.saturating_add(1);
        self.state.current_temp = current;
        self.state.target_temp = target;

        let bounds = Bounds::for_target(target, config);
        debug!(
            "{}: current={:.1} target={:.1} band=[{:.1}, {:.1}]",
            self.id, current, target, bounds.min, bounds.max
        );

        let mut decision = Decision::InRange;
        for direction in Direction::BOTH {
            match self.step(direction, current, bounds, config, now) {
                Step::Clear => {}
                Step::Confirming => decision = Decision::Warning(direction),
                Step::Confirmed => {
                    decision = Decision::Alert(RunawayAlert {
                        heater: self.id,
                        direction,
                        target_temp: target,
                        current_temp: current,
                        at: now,
                    });
                }
            }
        }
        decision
    }

    fn step(
        &mut self,
        direction: Direction,
        current: f32,
        bounds: Bounds,
        config: &HeaterConfig,
        now: Timestamp,
    ) -> Step {
        let id = self.id;
        let (since, watermark) = self.state.episode_mut(direction);

        if !direction.violates(current, bounds) {
            if since.take().is_some() {
                debug!("{id}: back in band ({direction}), current={current:.1}");
            }
            *watermark = direction.toward_center(*watermark, current);
            return Step::Clear;
        }

        let Some(started) = *since else {
            warn!(
                "RUNAWAY WARNING | {id} {direction} band: current={current:.1} band=[{:.1}, {:.1}]",
                bounds.min, bounds.max
            );
            *since = Some(now);
            *watermark = current;
            return Step::Confirming;
        };

        if now.secs_since(started) < config.confirm_delay_secs {
            *watermark = direction.more_extreme(*watermark, current);
            return Step::Confirming;
        }

        if direction.not_improved(current, *watermark, config.trigger_on_equal) {
            *since = None;
            Step::Confirmed
        } else {
            debug!("{id}: recovering ({direction}), baseline {:.1} -> {current:.1}", *watermark);
            *watermark = current;
            Step::Confirming
        }
    }
}
