//! Integration tests for snapshot evaluation across heaters.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use thermal_runaway::adapters::settings::MemorySettings;
use thermal_runaway::config::keys;
use thermal_runaway::{Decision, Direction, HeaterId, TemperatureSnapshot, Timestamp};

use super::mock_ports::Rig;

fn at(secs: u64) -> Timestamp {
    Timestamp::from_secs(secs)
}

fn bed_scenario_settings() -> MemorySettings {
    let s = MemorySettings::with_defaults();
    s.set(keys::BED_MAX_DIFF, "10");
    s.set(keys::BED_DELAY, "20");
    s.set(keys::TRIGGER_ON_EQUAL, true);
    s
}

fn snap(bed: (f32, f32), tool: (f32, f32)) -> TemperatureSnapshot {
    TemperatureSnapshot::new()
        .with(HeaterId::Bed, bed.0, bed.1)
        .with(HeaterId::Tool(0), tool.0, tool.1)
}

const TOOL_OK: (f32, f32) = (210.0, 210.0);

#[test]
fn bed_overshoot_walks_through_warning_alert_warning() {
    let rig = Rig::new(bed_scenario_settings());
    let sup = &rig.supervisor;

    let d = sup.evaluate(&snap((225.0, 200.0), TOOL_OK), at(0));
    assert_eq!(d, vec![Decision::Warning(Direction::Over)]);
    assert_eq!(sup.heater_state(HeaterId::Bed).unwrap().high_watermark, 225.0);

    let d = sup.evaluate(&snap((230.0, 200.0), TOOL_OK), at(10));
    assert_eq!(d, vec![Decision::Warning(Direction::Over)]);
    assert_eq!(sup.heater_state(HeaterId::Bed).unwrap().high_watermark, 230.0);

    let d = sup.evaluate(&snap((230.0, 200.0), TOOL_OK), at(21));
    assert_eq!(d.len(), 1);
    let alert = d[0].alert().copied().expect("alert at t=21");
    assert_eq!(alert.heater, HeaterId::Bed);
    assert_eq!(alert.direction, Direction::Over);
    assert_eq!(sup.heater_state(HeaterId::Bed).unwrap().high_since, None);

    let d = sup.evaluate(&snap((230.0, 200.0), TOOL_OK), at(22));
    assert_eq!(d, vec![Decision::Warning(Direction::Over)]);

    assert_eq!(sup.recent_alerts(), vec![alert]);
}

#[test]
fn heater_off_uses_off_ceiling() {
    let rig = Rig::new(MemorySettings::with_defaults());
    let sup = &rig.supervisor;

    assert!(sup.evaluate(&snap((25.0, 0.0), TOOL_OK), at(0)).is_empty());
    assert_eq!(
        sup.evaluate(&snap((35.0, 0.0), TOOL_OK), at(1)),
        vec![Decision::Warning(Direction::Over)]
    );
}

#[test]
fn drift_within_band_never_alerts() {
    let s = bed_scenario_settings();
    s.set(keys::BED_DELAY, "0");
    let rig = Rig::new(s);

    for (i, current) in [195.0, 201.0, 198.0].into_iter().enumerate() {
        let d = rig
            .supervisor
            .evaluate(&snap((current, 200.0), TOOL_OK), at(i as u64));
        assert!(d.is_empty(), "sample {current} should be in range");
    }
    assert!(rig.supervisor.recent_alerts().is_empty());
}

#[test]
fn bed_alert_leaves_tool_state_untouched() {
    let s = bed_scenario_settings();
    s.set(keys::BED_DELAY, "0");
    let rig = Rig::new(s);
    let sup = &rig.supervisor;

    sup.evaluate(&snap((210.0, 210.0), (200.0, 200.0)), at(0));
    let tool_before = sup.heater_state(HeaterId::Tool(0)).unwrap();

    sup.evaluate(&snap((300.0, 60.0), (200.0, 200.0)), at(1));
    let d = sup.evaluate(&snap((300.0, 60.0), (200.0, 200.0)), at(2));
    assert!(d.iter().any(|d| d.alert().is_some_and(|a| a.heater == HeaterId::Bed)));

    let tool_after = sup.heater_state(HeaterId::Tool(0)).unwrap();
    assert_eq!(tool_after.high_since, None);
    assert_eq!(tool_after.low_since, None);
    assert_eq!(tool_after.high_watermark, tool_before.high_watermark);
    assert_eq!(tool_after.low_watermark, tool_before.low_watermark);
}

#[test]
fn confirming_heater_does_not_delay_others() {
    let s = MemorySettings::with_defaults();
    s.set(keys::BED_DELAY, "3600");
    let rig = Rig::new(s);
    let sup = &rig.supervisor;

    let started = Instant::now();
    sup.evaluate(&snap((300.0, 60.0), (100.0, 210.0)), at(0));
    let d = sup.evaluate(&snap((300.0, 60.0), (100.0, 210.0)), at(1));
    assert!(started.elapsed() < Duration::from_secs(1));

    // Bed is still confirming; the tool warned on its own clock.
    assert!(d.contains(&Decision::Warning(Direction::Over)));
    assert!(d.contains(&Decision::Warning(Direction::Under)));
    assert_eq!(sup.heater_state(HeaterId::Tool(0)).unwrap().low_since, Some(at(0)));
}

#[test]
fn missing_sample_skips_only_that_heater() {
    let s = MemorySettings::with_defaults();
    s.set(keys::NUMBER_EXTRUDERS, 2u32);
    let rig = Rig::new(s);
    let sup = &rig.supervisor;

    let partial = TemperatureSnapshot::new()
        .with(HeaterId::Bed, 120.0, 60.0)
        .with(HeaterId::Tool(1), 205.0, 210.0);
    let d = sup.evaluate(&partial, at(0));

    assert_eq!(d, vec![Decision::Warning(Direction::Over)]);
    assert_eq!(sup.heater_state(HeaterId::Tool(0)).unwrap().samples_seen, 0);
    assert_eq!(sup.heater_state(HeaterId::Tool(1)).unwrap().samples_seen, 1);
}

#[test]
fn bad_setting_skips_heater_family_and_keeps_state() {
    let rig = Rig::new(MemorySettings::with_defaults());
    let sup = &rig.supervisor;

    sup.evaluate(&snap((120.0, 60.0), TOOL_OK), at(0));
    let bed_before = sup.heater_state(HeaterId::Bed).unwrap();
    assert_eq!(bed_before.high_since, Some(at(0)));

    rig.settings.set(keys::BED_MAX_DIFF, "lots");
    let d = sup.evaluate(&snap((20.0, 60.0), (150.0, 210.0)), at(5));
    assert_eq!(d, vec![Decision::Warning(Direction::Under)], "tool still evaluated");
    assert_eq!(sup.heater_state(HeaterId::Bed).unwrap(), bed_before);

    rig.settings.set(keys::BED_MAX_DIFF, "10");
    let d = sup.evaluate(&snap((65.0, 60.0), (150.0, 210.0)), at(6));
    assert_eq!(d, vec![Decision::Warning(Direction::Under)]);
    assert_eq!(sup.heater_state(HeaterId::Bed).unwrap().high_since, None);
}

#[test]
fn settings_changes_apply_on_next_tick() {
    let rig = Rig::new(MemorySettings::with_defaults());
    let sup = &rig.supervisor;

    // Default bed band is ±10: 75 is over.
    assert_eq!(
        sup.evaluate(&snap((75.0, 60.0), TOOL_OK), at(0)),
        vec![Decision::Warning(Direction::Over)]
    );
    rig.settings.set(keys::BED_MAX_DIFF, "20");
    assert!(sup.evaluate(&snap((75.0, 60.0), TOOL_OK), at(1)).is_empty());
}

#[test]
fn overlapping_evaluations_keep_state_consistent() {
    let rig = Rig::new(MemorySettings::with_defaults());
    let workers: Vec<_> = (0..8)
        .map(|w| {
            let sup = Arc::clone(&rig.supervisor);
            thread::spawn(move || {
                for i in 0..50u64 {
                    let d = sup.evaluate(&snap((60.0, 60.0), TOOL_OK), at(w * 100 + i));
                    assert!(d.is_empty());
                }
            })
        })
        .collect();
    for w in workers {
        w.join().unwrap();
    }

    let bed = rig.supervisor.heater_state(HeaterId::Bed).unwrap();
    assert_eq!(bed.samples_seen, 400);
    assert_eq!(bed.high_since, None);
    assert_eq!(bed.low_since, None);
}

#[test]
fn on_temperatures_returns_snapshot_unchanged() {
    let s = bed_scenario_settings();
    s.set(keys::BED_DELAY, "0");
    let rig = Rig::new(s);

    let input = snap((400.0, 60.0), (20.0, 0.0));
    rig.clock.set_secs(0);
    assert_eq!(rig.supervisor.on_temperatures(input.clone()), input);
    rig.clock.set_secs(1);
    assert_eq!(rig.supervisor.on_temperatures(input.clone()), input);

    assert_eq!(rig.commands.sent(), vec!["M112".to_owned()]);
}

#[test]
fn host_snapshot_with_chamber_entry_is_evaluated_and_returned_whole() {
    let rig = Rig::new(MemorySettings::with_defaults());
    let json = r#"{"B": [75.0, 60.0], "T0": [210.0, 210.0], "C": [31.5, 0.0]}"#;
    let input: TemperatureSnapshot = serde_json::from_str(json).unwrap();

    let d = rig.supervisor.evaluate(&input, at(0));
    assert_eq!(d, vec![Decision::Warning(Direction::Over)]);

    let back = rig.supervisor.on_temperatures(input.clone());
    assert_eq!(
        serde_json::to_value(&back).unwrap(),
        serde_json::from_str::<serde_json::Value>(json).unwrap()
    );
}
