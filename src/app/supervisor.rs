//! Runaway supervisor: the hexagonal core.
//!
//! [`RunawaySupervisor`] owns one [`HeaterMonitor`] per configured heater,
//! fans each temperature snapshot out to them, and dispatches alerts.
//! All I/O flows through the port traits injected at construction.
//!
//! ```text
//!  SettingsPort ──▶ ┌──────────────────────────┐ ──▶ CommandPort
//!                   │    RunawaySupervisor      │
//!         Clock ──▶ │  B · T0 · T1 … monitors   │ ──▶ ObserverRegistry
//!                   └──────────────────────────┘       (one thread each)
//! ```
//!
//! Locking: the monitor map sits behind an `RwLock` that is only written
//! when a heater is seen for the first time; each monitor has its own
//! `Mutex`.  Overlapping evaluations therefore contend per heater, never
//! across heaters, and nothing is held across a wait.

use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use heapless::HistoryBuffer;
use log::{error, info, warn};

use super::events::{RunawayEvent, RunawayNotification};
use super::notify::{panic_message, spawn_observer};
use super::ports::{Clock, CommandPort, ObserverRegistry, SettingsPort};
use crate::config::{RunawaySettings, read_extruder_count};
use crate::error::{ConfigError, DispatchError, Error};
use crate::heater::{HeaterId, TemperatureSnapshot};
use crate::monitor::{Decision, HeaterMonitor, HeaterState, RunawayAlert};
use crate::time::Timestamp;

/// Number of recent alerts kept for diagnostics.
pub const ALERT_HISTORY: usize = 16;

type SharedMonitor = Arc<Mutex<HeaterMonitor>>;

/// What happened when an alert was dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchReport {
    /// The emergency command was accepted by the command port.
    pub command_sent: bool,
    /// Observer threads started.
    pub observers_started: usize,
    /// Observers whose thread could not be started.
    pub observers_failed: usize,
}

// ───────────────────────────────────────────────────────────────
// RunawaySupervisor
// ───────────────────────────────────────────────────────────────

pub struct RunawaySupervisor {
    settings: Arc<dyn SettingsPort>,
    commands: Arc<dyn CommandPort>,
    observers: Arc<dyn ObserverRegistry>,
    clock: Arc<dyn Clock>,
    /// Heater set fixed at construction from `numberExtruders`.
    heaters: Vec<HeaterId>,
    monitors: RwLock<BTreeMap<HeaterId, SharedMonitor>>,
    history: Mutex<HistoryBuffer<RunawayAlert, ALERT_HISTORY>>,
}

impl RunawaySupervisor {
    /// Build the supervisor and one monitor per configured heater.
    ///
    /// Fails only if `numberExtruders` is unreadable; every other setting
    /// is re-read on each tick.
    pub fn new(
        settings: Arc<dyn SettingsPort>,
        commands: Arc<dyn CommandPort>,
        observers: Arc<dyn ObserverRegistry>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        let extruders = read_extruder_count(settings.as_ref())?;
        let heaters = HeaterId::configured(extruders);
        let monitors = heaters
            .iter()
            .map(|&id| (id, Arc::new(Mutex::new(HeaterMonitor::new(id)))))
            .collect();

        info!(
            "RunawaySupervisor monitoring {} heater(s): {}",
            heaters.len(),
            heaters
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        );

        Ok(Self {
            settings,
            commands,
            observers,
            clock,
            heaters,
            monitors: RwLock::new(monitors),
            history: Mutex::new(HistoryBuffer::new()),
        })
    }

    // ── Host hook ─────────────────────────────────────────────

    /// Evaluate a snapshot at the clock's current time, dispatch every
    /// alert, and hand the snapshot back untouched.
    ///
    /// The monitor observes the temperature stream; it never filters it.
    pub fn on_temperatures(&self, snapshot: TemperatureSnapshot) -> TemperatureSnapshot {
        let now = self.clock.now();
        let settings = RunawaySettings::load(self.settings.as_ref());
        for decision in self.evaluate_with(&settings, &snapshot, now) {
            if let Decision::Alert(alert) = decision {
                self.dispatch_with(&settings.emergency_gcode, &alert);
            }
        }
        snapshot
    }

    // ── Evaluation ────────────────────────────────────────────

    /// Route each configured heater's sample to its monitor and return the
    /// decisions that are not `InRange`.  Does not dispatch.
    pub fn evaluate(&self, snapshot: &TemperatureSnapshot, now: Timestamp) -> Vec<Decision> {
        let settings = RunawaySettings::load(self.settings.as_ref());
        self.evaluate_with(&settings, snapshot, now)
    }

    fn evaluate_with(
        &self,
        settings: &RunawaySettings,
        snapshot: &TemperatureSnapshot,
        now: Timestamp,
    ) -> Vec<Decision> {
        let mut decisions = Vec::new();

        for &id in &self.heaters {
            let config = match settings.config_for(id.kind()) {
                Ok(config) => *config,
                Err(e) => {
                    skip(id, &Error::from(e.clone()));
                    continue;
                }
            };
            let Some(sample) = snapshot.get(id) else {
                skip(id, &Error::MissingSample(id));
                continue;
            };

            let monitor = self.monitor(id);
            let decision = monitor
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .observe(sample.current, sample.target, &config, now);

            if let Decision::Alert(alert) = decision {
                error!(
                    "Thermal Runaway ({} temp) caught on heater {}. Reported temp is {}, set temp is {}",
                    alert.direction, alert.heater, alert.current_temp, alert.target_temp
                );
                self.history
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .write(alert);
            }
            if !decision.is_in_range() {
                decisions.push(decision);
            }
        }

        decisions
    }

    // ── Dispatch ──────────────────────────────────────────────

    /// Send the configured emergency command, then notify observers of the
    /// generic and the direction-specific event.
    ///
    /// The command is always attempted first.  Observers run on their own
    /// threads; this returns as soon as they are started.
    pub fn dispatch(&self, alert: &RunawayAlert) -> DispatchReport {
        let settings = RunawaySettings::load(self.settings.as_ref());
        self.dispatch_with(&settings.emergency_gcode, alert)
    }

    fn dispatch_with(&self, gcode: &str, alert: &RunawayAlert) -> DispatchReport {
        let mut report = DispatchReport::default();

        match self.send_emergency(gcode) {
            Ok(()) => {
                info!("DISPATCH | sent {gcode:?} for heater {}", alert.heater);
                report.command_sent = true;
            }
            Err(e) => error!("DISPATCH | emergency command {gcode:?}: {}", Error::from(e)),
        }

        for event in RunawayEvent::for_direction(alert.direction) {
            let notification = RunawayNotification::new(event, alert);
            for observer in self.observers.observers(event) {
                match spawn_observer(observer, notification) {
                    Ok(_detached) => report.observers_started += 1,
                    Err(e) => {
                        error!("DISPATCH | {event}: {}", Error::from(e));
                        report.observers_failed += 1;
                    }
                }
            }
        }

        if report.observers_started > 0 {
            info!(
                "DISPATCH | notified {} observer(s) for heater {}",
                report.observers_started, alert.heater
            );
        }
        report
    }

    /// A panicking command port is reported like a failed send, so the
    /// observers still run and the host still gets its snapshot back.
    fn send_emergency(&self, gcode: &str) -> Result<(), DispatchError> {
        panic::catch_unwind(AssertUnwindSafe(|| self.commands.send_command(gcode))).unwrap_or_else(
            |payload| Err(DispatchError::CommandFailed(panic_message(payload.as_ref()))),
        )
    }

    // ── Queries ───────────────────────────────────────────────

    /// Heaters evaluated each tick, bed first.
    pub fn heaters(&self) -> &[HeaterId] {
        &self.heaters
    }

    /// Copy of one heater's detection state.
    pub fn heater_state(&self, id: HeaterId) -> Option<HeaterState> {
        let monitors = self.monitors.read().unwrap_or_else(PoisonError::into_inner);
        let monitor = monitors.get(&id)?;
        let state = *monitor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .state();
        Some(state)
    }

    /// Most recent alerts, oldest first.
    pub fn recent_alerts(&self) -> Vec<RunawayAlert> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .oldest_ordered()
            .copied()
            .collect()
    }

    // ── Internal ──────────────────────────────────────────────

    /// Monitor for `id`, created with fresh state on first use.
    fn monitor(&self, id: HeaterId) -> SharedMonitor {
        if let Some(m) = self
            .monitors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
        {
            return Arc::clone(m);
        }
        let mut monitors = self.monitors.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            monitors
                .entry(id)
                .or_insert_with(|| Arc::new(Mutex::new(HeaterMonitor::new(id)))),
        )
    }
}

/// The heater keeps its state; it is simply not evaluated this tick.
fn skip(id: HeaterId, err: &Error) {
    warn!("SKIP | heater {id} this tick: {err}");
}
