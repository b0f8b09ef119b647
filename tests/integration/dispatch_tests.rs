//! Integration tests for the alert path: emergency command, then observers.

use std::sync::Arc;
use std::sync::mpsc;

use thermal_runaway::adapters::settings::MemorySettings;
use thermal_runaway::app::events::RunawayEvent;
use thermal_runaway::config::keys;
use thermal_runaway::{Direction, HeaterId, RunawayAlert, Timestamp};

use super::mock_ports::{OBSERVER_WAIT, RecordingCommands, Rig};

fn alert(heater: HeaterId, direction: Direction) -> RunawayAlert {
    RunawayAlert {
        heater,
        direction,
        target_temp: 210.0,
        current_temp: if direction == Direction::Over { 260.0 } else { 150.0 },
        at: Timestamp::from_secs(42),
    }
}

#[test]
fn over_alert_notifies_generic_and_over_observers() {
    let rig = Rig::new(MemorySettings::with_defaults());
    let generic = rig.listen(RunawayEvent::Triggered, "generic");
    let over = rig.listen(RunawayEvent::OverTriggered, "over");
    let under = rig.listen(RunawayEvent::UnderTriggered, "under");

    let report = rig.supervisor.dispatch(&alert(HeaterId::Tool(0), Direction::Over));
    assert!(report.command_sent);
    assert_eq!(report.observers_started, 2);
    assert_eq!(report.observers_failed, 0);

    let n = generic.recv_timeout(OBSERVER_WAIT).unwrap();
    assert_eq!(n.event, RunawayEvent::Triggered);
    assert_eq!(n.heater, HeaterId::Tool(0));
    assert_eq!(n.target_temp, 210.0);
    assert_eq!(n.current_temp, 260.0);

    let n = over.recv_timeout(OBSERVER_WAIT).unwrap();
    assert_eq!(n.event, RunawayEvent::OverTriggered);

    assert!(under.try_recv().is_err());
    assert_eq!(rig.commands.sent(), vec!["M112".to_owned()]);
}

#[test]
fn under_alert_notifies_under_observers() {
    let rig = Rig::new(MemorySettings::with_defaults());
    let over = rig.listen(RunawayEvent::OverTriggered, "over");
    let under = rig.listen(RunawayEvent::UnderTriggered, "under");

    rig.supervisor.dispatch(&alert(HeaterId::Bed, Direction::Under));

    let n = under.recv_timeout(OBSERVER_WAIT).unwrap();
    assert_eq!(n.heater, HeaterId::Bed);
    assert_eq!(n.current_temp, 150.0);
    assert!(over.try_recv().is_err());
}

#[test]
fn configured_gcode_is_sent() {
    let s = MemorySettings::with_defaults();
    s.set(keys::EMERGENCY_GCODE, "M104 S0\nM140 S0");
    let rig = Rig::new(s);

    rig.supervisor.dispatch(&alert(HeaterId::Bed, Direction::Over));
    assert_eq!(rig.commands.sent(), vec!["M104 S0\nM140 S0".to_owned()]);
}

#[test]
fn command_is_sent_before_any_observer_runs() {
    let rig = Rig::new(MemorySettings::with_defaults());
    let commands = Arc::clone(&rig.commands);
    let (tx, rx) = mpsc::channel();
    rig.observers
        .register(RunawayEvent::Triggered, "order-check", move |_| {
            tx.send(commands.sent().len())?;
            Ok(())
        });

    rig.supervisor.dispatch(&alert(HeaterId::Bed, Direction::Over));
    assert_eq!(rx.recv_timeout(OBSERVER_WAIT).unwrap(), 1);
}

#[test]
fn failing_command_still_notifies_observers() {
    let rig = Rig::with_commands(MemorySettings::with_defaults(), RecordingCommands::failing());
    let generic = rig.listen(RunawayEvent::Triggered, "generic");

    let report = rig.supervisor.dispatch(&alert(HeaterId::Bed, Direction::Over));
    assert!(!report.command_sent);
    assert_eq!(report.observers_started, 1);
    assert!(generic.recv_timeout(OBSERVER_WAIT).is_ok());
    assert_eq!(rig.commands.sent().len(), 1, "no retry after failure");
}

#[test]
fn broken_observers_do_not_stop_the_rest() {
    let rig = Rig::new(MemorySettings::with_defaults());
    rig.observers
        .register(RunawayEvent::Triggered, "erroring", |_| {
            anyhow::bail!("webhook unreachable")
        });
    rig.observers
        .register(RunawayEvent::Triggered, "panicking", |_| panic!("observer bug"));
    let healthy = rig.listen(RunawayEvent::Triggered, "healthy");

    let report = rig.supervisor.dispatch(&alert(HeaterId::Tool(0), Direction::Over));
    assert_eq!(report.observers_started, 3);
    assert!(healthy.recv_timeout(OBSERVER_WAIT).is_ok());
}

#[test]
fn alert_from_stream_dispatches_exactly_once_per_episode() {
    let s = MemorySettings::with_defaults();
    s.set(keys::BED_DELAY, "2");
    let rig = Rig::new(s);
    let generic = rig.listen(RunawayEvent::Triggered, "generic");

    let hot = thermal_runaway::TemperatureSnapshot::new()
        .with(HeaterId::Bed, 95.0, 60.0)
        .with(HeaterId::Tool(0), 22.0, 0.0);
    for secs in [0, 1, 2, 3] {
        rig.clock.set_secs(secs);
        rig.supervisor.on_temperatures(hot.clone());
    }

    // t=0 opens, t=2 confirms, t=3 opens a new episode.
    assert_eq!(rig.commands.sent().len(), 1);
    let n = generic.recv_timeout(OBSERVER_WAIT).unwrap();
    assert_eq!(n.heater, HeaterId::Bed);
    assert!(generic.try_recv().is_err());
}

#[test]
fn panicking_command_port_is_reported_as_unsent() {
    let rig = Rig::with_commands(MemorySettings::with_defaults(), RecordingCommands::panicking());
    let generic = rig.listen(RunawayEvent::Triggered, "generic");

    let report = rig.supervisor.dispatch(&alert(HeaterId::Bed, Direction::Over));
    assert!(!report.command_sent);
    assert_eq!(report.observers_started, 1);
    assert!(generic.recv_timeout(OBSERVER_WAIT).is_ok());
}

#[test]
fn panicking_command_port_still_hands_the_snapshot_back() {
    let s = MemorySettings::with_defaults();
    s.set(keys::BED_DELAY, "0");
    let rig = Rig::with_commands(s, RecordingCommands::panicking());

    let hot = thermal_runaway::TemperatureSnapshot::new()
        .with(HeaterId::Bed, 95.0, 60.0)
        .with(HeaterId::Tool(0), 22.0, 0.0);
    rig.clock.set_secs(0);
    assert_eq!(rig.supervisor.on_temperatures(hot.clone()), hot);
    rig.clock.set_secs(1);
    assert_eq!(rig.supervisor.on_temperatures(hot.clone()), hot);

    assert_eq!(rig.commands.sent().len(), 1);
    assert_eq!(rig.supervisor.recent_alerts().len(), 1);
}
