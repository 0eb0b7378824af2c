//! End-to-end scenarios: a fault debounced to a latch, a charger
//! session with balancing, and recovery from `Faulted` through `Boot`.

use crate::mock_hw::{EventLog, MockOutputs, healthy_pack};

use bms_core::FaultCode;
use bms_core::adapters::sim::derive_stats;
use bms_core::app::commands::AppCommand;
use bms_core::app::events::{AppEvent, FaultTimerKind};
use bms_core::app::service::BmsController;
use bms_core::config::BmsConfig;
use bms_core::fsm::StateId;

fn timer_events(sink: &EventLog, kind: FaultTimerKind) -> usize {
    sink.count(|e| matches!(e, AppEvent::FaultTimer(t) if t.kind == kind))
}

/// 50 A against a 40 A limit, held for the default 55 s window and
/// sampled every `spacing_ms`.  Returns the tick index (0 = arming tick)
/// that latched, after checking the fault holds for a while longer.
fn ticks_until_over_current_latch(spacing_ms: u64) -> u64 {
    let mut ctl = BmsController::new(BmsConfig::default()).unwrap();
    let mut pack = healthy_pack();
    let mut out = MockOutputs::new();
    let mut sink = EventLog::new();

    pack.pack_current = 50.0;
    pack.cont_discharge_limit = 40.0;
    let mut latched_at = None;
    for tick in 0..=1_000 {
        ctl.handle_tick(&mut pack, tick * spacing_ms, &mut out, &mut sink);
        match latched_at {
            None if pack.fault_code_crit != 0 => latched_at = Some(tick),
            None => assert_eq!(pack.current_state, StateId::Ready, "tick {tick}"),
            Some(_) => {}
        }
        if latched_at.is_some() {
            assert_eq!(pack.fault_code_crit, FaultCode::DischargeLimitEnforcement.mask());
            assert_eq!(pack.current_state, StateId::Faulted);
        }
        if latched_at.is_some_and(|at| tick >= at + 20) {
            break;
        }
    }
    latched_at.expect("over-current never latched")
}

#[test]
fn over_current_latches_after_window_at_one_second_ticks() {
    assert_eq!(ticks_until_over_current_latch(1_000), 55);
}

#[test]
fn over_current_latches_after_window_at_fast_ticks() {
    assert_eq!(ticks_until_over_current_latch(100), 550);
}

#[test]
fn flicker_inside_window_stays_silent() {
    let config = BmsConfig {
        over_current_ms: 1_000,
        ..BmsConfig::default()
    };
    let mut ctl = BmsController::new(config).unwrap();
    let mut pack = healthy_pack();
    let mut out = MockOutputs::new();
    let mut sink = EventLog::new();

    // 900 ms over the limit, one clean sample, then over again.
    for tick in 0..30u64 {
        pack.pack_current = if tick % 10 == 9 { 50.0 } else { 250.0 };
        ctl.handle_tick(&mut pack, tick * 100, &mut out, &mut sink);
        assert_eq!(pack.fault_code_crit, 0, "tick {tick}");
    }

    assert_eq!(pack.current_state, StateId::Ready);
    assert_eq!(timer_events(&sink, FaultTimerKind::Faulted), 0);
    assert_eq!(timer_events(&sink, FaultTimerKind::Started), 3);
    assert_eq!(timer_events(&sink, FaultTimerKind::Cleared), 3);
}

#[test]
fn charger_session_balances_high_cells() {
    let config = BmsConfig {
        balance_min_voltage: 3.9,
        ..BmsConfig::default()
    };
    let mut ctl = BmsController::new(config).unwrap();
    let mut pack = healthy_pack();
    let mut out = MockOutputs::new();
    let mut sink = EventLog::new();

    for chip in &mut pack.chips {
        chip.open_cell_voltage.fill(3.80);
        chip.cell_voltage.fill(3.80);
    }
    let cells = [3.95, 4.00, 3.80, 3.90];
    pack.chips[0].open_cell_voltage[..4].copy_from_slice(&cells);
    pack.chips[0].cell_voltage[..4].copy_from_slice(&cells);
    derive_stats(&mut pack);

    ctl.handle_command(AppCommand::ChargerDetected, &mut pack, 0, &mut out, &mut sink)
        .unwrap();
    ctl.handle_tick(&mut pack, 0, &mut out, &mut sink);
    assert_eq!(pack.current_state, StateId::Charging);

    ctl.handle_tick(&mut pack, 100, &mut out, &mut sink);
    assert!(pack.should_balance);
    assert_eq!(&pack.discharge_config.chip(0)[..4], &[true, true, false, true]);
    assert_eq!(pack.discharge_config.active_count(), 3);
    assert_eq!(ctl.build_telemetry(&pack).balancing_cells, 3);
}

#[test]
fn faulted_recovers_through_boot_into_charging() {
    let config = BmsConfig {
        under_volt_ms: 500,
        ..BmsConfig::default()
    };
    let mut ctl = BmsController::new(config).unwrap();
    let mut pack = healthy_pack();
    let mut out = MockOutputs::new();
    let mut sink = EventLog::new();

    ctl.handle_command(AppCommand::ChargerDetected, &mut pack, 0, &mut out, &mut sink)
        .unwrap();
    ctl.handle_tick(&mut pack, 0, &mut out, &mut sink);
    assert_eq!(pack.current_state, StateId::Charging);

    pack.min_voltage.val = 2.2;
    ctl.handle_tick(&mut pack, 100, &mut out, &mut sink);
    ctl.handle_tick(&mut pack, 600, &mut out, &mut sink);
    assert_eq!(pack.current_state, StateId::Faulted);

    // Still low: holds in Faulted.
    ctl.handle_tick(&mut pack, 700, &mut out, &mut sink);
    assert_eq!(pack.current_state, StateId::Faulted);

    pack.min_voltage.val = 3.6;
    ctl.handle_tick(&mut pack, 800, &mut out, &mut sink);
    assert_eq!(pack.current_state, StateId::Boot);
    ctl.handle_tick(&mut pack, 900, &mut out, &mut sink);
    assert_eq!(pack.current_state, StateId::Charging);

    let path: Vec<(StateId, StateId)> = sink
        .events
        .iter()
        .filter_map(|e| match e {
            AppEvent::StateChanged { from, to } => Some((*from, *to)),
            _ => None,
        })
        .collect();
    assert_eq!(
        path,
        vec![
            (StateId::Boot, StateId::Charging),
            (StateId::Charging, StateId::Faulted),
            (StateId::Faulted, StateId::Boot),
            (StateId::Boot, StateId::Charging),
        ]
    );
    assert!(sink.events.contains(&AppEvent::FaultCleared));
}

#[test]
fn over_voltage_holds_faulted_through_charger_detection() {
    let config = BmsConfig {
        over_volt_ms: 1_000,
        ..BmsConfig::default()
    };
    let mut ctl = BmsController::new(config).unwrap();
    let mut pack = healthy_pack();
    let mut out = MockOutputs::new();
    let mut sink = EventLog::new();

    pack.max_voltage.val = 4.30;
    ctl.handle_tick(&mut pack, 0, &mut out, &mut sink);
    ctl.handle_tick(&mut pack, 1_000, &mut out, &mut sink);
    assert_eq!(pack.current_state, StateId::Faulted);

    ctl.handle_command(AppCommand::ChargerDetected, &mut pack, 1_050, &mut out, &mut sink)
        .unwrap();
    out.clear();
    for now in (1_100..=20_000).step_by(100) {
        ctl.handle_tick(&mut pack, now, &mut out, &mut sink);
        assert_eq!(pack.current_state, StateId::Faulted, "t={now}");
        assert_eq!(pack.fault_code_crit, FaultCode::CellVoltageTooHigh.mask());
        assert!(!pack.is_charging_enabled);
    }
    assert!(out.charge_commands().iter().all(|c| !c.enabled));
    assert!(!sink.events.contains(&AppEvent::FaultCleared));
}
