//! Integration tests for the controller → FSM → outputs pipeline.
//!
//! Every test drives [`BmsController`] tick by tick with explicit
//! timestamps against [`MockOutputs`] and asserts on the commands it
//! issued and the events it emitted.

use crate::mock_hw::{EventLog, MockOutputs, healthy_pack};

use bms_core::FaultCode;
use bms_core::app::commands::AppCommand;
use bms_core::app::events::AppEvent;
use bms_core::app::ports::{ChargeCommand, DriveLimits};
use bms_core::app::service::BmsController;
use bms_core::config::BmsConfig;
use bms_core::fsm::StateId;
use bms_core::pack::{PackSnapshot, shared};

struct Bench {
    ctl: BmsController,
    pack: PackSnapshot,
    out: MockOutputs,
    sink: EventLog,
}

impl Bench {
    fn new(config: BmsConfig) -> Self {
        let mut sink = EventLog::new();
        let mut ctl = BmsController::new(config).expect("valid config");
        let pack = healthy_pack();
        ctl.start(&pack, &mut sink);
        Self {
            ctl,
            pack,
            out: MockOutputs::new(),
            sink,
        }
    }

    fn tick(&mut self, now: u64) {
        self.ctl
            .handle_tick(&mut self.pack, now, &mut self.out, &mut self.sink);
    }

    fn command(&mut self, cmd: AppCommand, now: u64) -> bms_core::Result<()> {
        self.ctl
            .handle_command(cmd, &mut self.pack, now, &mut self.out, &mut self.sink)
    }
}

// ── Start-up routing ──────────────────────────────────────────

#[test]
fn start_announces_boot_state() {
    let bench = Bench::new(BmsConfig::default());
    assert_eq!(bench.sink.events[0], AppEvent::Started(StateId::Boot));
}

#[test]
fn ready_advertises_pack_limits() {
    let mut b = Bench::new(BmsConfig::default());
    b.tick(0);
    assert_eq!(b.pack.current_state, StateId::Ready);

    b.tick(100);
    assert_eq!(
        b.out.last_limits(),
        Some(DriveLimits {
            charge_limit: 40.0,
            discharge_limit: 200.0,
        })
    );
    assert_eq!(b.out.fault_signal(), Some(false));
    assert!(b.out.charge_commands().is_empty());
}

// ── Charging ──────────────────────────────────────────────────

#[test]
fn charging_enables_charger_and_zeroes_drive_limits() {
    let mut b = Bench::new(BmsConfig::default());
    b.command(AppCommand::ChargerDetected, 0).unwrap();
    b.tick(0);
    assert_eq!(b.pack.current_state, StateId::Charging);

    b.tick(100);
    let cmds = b.out.charge_commands();
    assert_eq!(cmds.len(), 1);
    assert!(cmds[0].enabled);
    assert!((cmds[0].voltage - b.ctl.config().pack_charge_voltage()).abs() < 1e-3);
    assert!((cmds[0].current - 3.5).abs() < 1e-6);
    assert!(b.pack.is_charging_enabled);
    assert_eq!(b.out.last_limits(), Some(DriveLimits::zero()));
}

#[test]
fn charge_enable_is_rate_limited() {
    let mut b = Bench::new(BmsConfig::default());
    b.command(AppCommand::ChargerDetected, 0).unwrap();
    b.tick(0);
    for now in (100..=1_000).step_by(100) {
        b.tick(now);
    }
    assert_eq!(b.out.charge_commands().len(), 1);

    // Command interval (1 s) has elapsed since the first enable at 100 ms.
    b.tick(1_100);
    assert_eq!(b.out.charge_commands().len(), 2);
}

#[test]
fn charge_interval_forces_rest_then_resumes() {
    let config = BmsConfig {
        charge_interval_ms: 1_000,
        charge_settle_ms: 500,
        ..BmsConfig::default()
    };
    let mut b = Bench::new(config);
    b.command(AppCommand::ChargerDetected, 0).unwrap();
    b.tick(0);
    b.tick(100);
    assert!(b.pack.is_charging_enabled);

    b.out.clear();
    b.tick(1_100);
    assert!(!b.pack.is_charging_enabled);
    assert_eq!(b.out.charge_commands(), vec![ChargeCommand::disabled()]);

    b.tick(1_400);
    assert!(!b.pack.is_charging_enabled);

    b.tick(1_600);
    assert!(b.pack.is_charging_enabled);
    assert_eq!(b.pack.current_state, StateId::Charging);
}

#[test]
fn charging_after_fault_starts_a_fresh_interval() {
    let config = BmsConfig {
        charge_interval_ms: 1_000,
        charge_settle_ms: 500,
        under_volt_ms: 200,
        ..BmsConfig::default()
    };
    let mut b = Bench::new(config);
    b.command(AppCommand::ChargerDetected, 0).unwrap();
    b.tick(0);
    b.tick(100);
    assert!(b.pack.is_charging_enabled);

    b.pack.min_voltage.val = 2.2;
    b.tick(200);
    b.tick(400);
    assert_eq!(b.pack.current_state, StateId::Faulted);

    b.pack.min_voltage.val = 3.6;
    b.tick(500);
    assert_eq!(b.pack.current_state, StateId::Boot);
    b.tick(600);
    assert_eq!(b.pack.current_state, StateId::Charging);

    // Well past where the interrupted interval would have ended.
    b.out.clear();
    b.tick(2_000);
    assert!(b.pack.is_charging_enabled);
    assert!(b.out.charge_commands().iter().all(|c| c.enabled));
    b.tick(2_999);
    assert!(b.pack.is_charging_enabled);
    b.tick(3_000);
    assert!(!b.pack.is_charging_enabled);
}

// ── Faults ────────────────────────────────────────────────────

#[test]
fn non_critical_fault_does_not_leave_ready() {
    let config = BmsConfig {
        chip_temp_ms: 1_000,
        ..BmsConfig::default()
    };
    let mut b = Bench::new(config);
    b.pack.max_chip_temp.val = 75.0;
    b.tick(0);
    b.tick(1_000);

    assert_eq!(b.pack.current_state, StateId::Ready);
    assert_eq!(b.pack.fault_code_crit, 0);
    assert_eq!(b.pack.fault_code_noncrit, FaultCode::DieTempMaximum.mask());
    assert_eq!(
        b.pack.fault_display_code(),
        FaultCode::DieTempMaximum.bit_index() + 1
    );
}

#[test]
fn critical_fault_shuts_down_charging() {
    let config = BmsConfig {
        high_temp_ms: 1_000,
        ..BmsConfig::default()
    };
    let mut b = Bench::new(config);
    b.command(AppCommand::ChargerDetected, 0).unwrap();
    b.tick(0);
    b.pack.max_temp.val = 65.0;
    b.tick(100);
    assert!(b.pack.is_charging_enabled);

    b.tick(1_100);
    assert_eq!(b.pack.current_state, StateId::Faulted);
    assert!(!b.pack.is_charging_enabled);
    assert!(b.pack.discharge_config.is_all_off());
    assert_eq!(b.out.fault_signal(), Some(true));
    assert_eq!(b.out.charge_commands().last(), Some(&ChargeCommand::disabled()));
    let hot = FaultCode::PackTooHot.mask();
    assert_eq!(
        b.sink
            .count(|e| matches!(e, AppEvent::FaultLatched(m) if *m == hot)),
        1
    );
    assert_eq!(b.ctl.diagnostics().fault_latches, 1);
}

#[test]
fn hot_reload_keeps_latched_fault_clearable() {
    let config = BmsConfig {
        over_current_ms: 1_000,
        ..BmsConfig::default()
    };
    let mut b = Bench::new(config.clone());
    b.pack.pack_current = 250.0;
    b.tick(0);
    b.tick(1_000);
    assert_eq!(b.pack.current_state, StateId::Faulted);

    let looser = BmsConfig {
        over_current_ms: 5_000,
        ..config
    };
    b.command(AppCommand::UpdateConfig(looser), 1_100).unwrap();
    assert_eq!(b.ctl.config().over_current_ms, 5_000);

    b.pack.pack_current = 10.0;
    b.tick(1_200);
    assert_eq!(b.pack.fault_code_crit, 0);
    assert_eq!(b.pack.current_state, StateId::Boot);
    b.tick(1_300);
    assert_eq!(b.pack.current_state, StateId::Ready);
}

// ── Commands ──────────────────────────────────────────────────

#[test]
fn illegal_request_is_rejected_and_counted() {
    let mut b = Bench::new(BmsConfig::default());
    b.tick(0);
    b.command(AppCommand::RequestState(StateId::Boot), 50).unwrap();

    assert_eq!(b.pack.current_state, StateId::Ready);
    assert_eq!(b.ctl.diagnostics().rejected_transitions, 1);
    assert!(b.sink.events.contains(&AppEvent::TransitionRejected {
        from: StateId::Ready,
        to: StateId::Boot,
    }));
}

#[test]
fn invalid_config_update_is_refused() {
    let mut b = Bench::new(BmsConfig::default());
    let bad = BmsConfig {
        lock_timeout_ms: 500,
        ..BmsConfig::default()
    };
    assert!(b.command(AppCommand::UpdateConfig(bad), 0).is_err());
    assert_eq!(b.ctl.config().lock_timeout_ms, 50);
}

#[test]
fn clear_diagnostics_resets_counters() {
    let mut b = Bench::new(BmsConfig::default());
    b.tick(0);
    b.tick(100);
    assert_eq!(b.ctl.diagnostics().ticks, 2);
    b.command(AppCommand::ClearDiagnostics, 200).unwrap();
    assert_eq!(b.ctl.diagnostics().ticks, 0);
}

#[test]
fn telemetry_counts_ticks_in_state() {
    let mut b = Bench::new(BmsConfig::default());
    b.tick(0);
    assert_eq!(b.pack.current_state, StateId::Ready);
    assert_eq!(b.ctl.build_telemetry(&b.pack).ticks_in_state, 0);

    for now in [100, 200, 300] {
        b.tick(now);
    }
    assert_eq!(b.ctl.build_telemetry(&b.pack).ticks_in_state, 3);

    b.command(AppCommand::RequestState(StateId::Charging), 350).unwrap();
    assert_eq!(b.pack.current_state, StateId::Charging);
    assert_eq!(b.ctl.build_telemetry(&b.pack).ticks_in_state, 0);
    b.tick(400);
    assert_eq!(b.ctl.build_telemetry(&b.pack).ticks_in_state, 1);
}

// ── Shared snapshot ───────────────────────────────────────────

#[test]
fn shared_tick_runs_under_the_lock() {
    let mut ctl = BmsController::new(BmsConfig::default()).unwrap();
    let pack = shared(healthy_pack());
    let mut out = MockOutputs::new();
    let mut sink = EventLog::new();

    ctl.tick_shared(&pack, 0, &mut out, &mut sink).unwrap();
    assert_eq!(pack.lock().current_state, StateId::Ready);
}

#[test]
fn held_lock_skips_the_tick() {
    let mut ctl = BmsController::new(BmsConfig::default()).unwrap();
    let pack = shared(healthy_pack());
    let mut out = MockOutputs::new();
    let mut sink = EventLog::new();

    let guard = pack.lock();
    assert_eq!(
        ctl.tick_shared(&pack, 0, &mut out, &mut sink),
        Err(bms_core::Error::LockTimeout)
    );
    drop(guard);

    assert_eq!(ctl.diagnostics().lock_timeouts, 1);
    assert_eq!(ctl.diagnostics().ticks, 0);
    assert!(sink.events.contains(&AppEvent::LockTimeout));
    assert!(out.calls.is_empty());
}
