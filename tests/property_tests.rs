//! Property tests for the control core's safety invariants.
//!
//! Runs on the host only; proptest is not available for bare-metal
//! targets, where these tests are compiled out.

#![cfg(not(target_os = "none"))]

use bms_core::adapters::sim::derive_stats;
use bms_core::app::events::AppEvent;
use bms_core::app::ports::{ChargeCommand, DriveLimits, EventSink, OutputPort};
use bms_core::app::commands::AppCommand;
use bms_core::app::service::BmsController;
use bms_core::balancing::{BalanceParams, select_chip};
use bms_core::config::{BmsConfig, NUM_CELLS_PER_CHIP};
use bms_core::diagnostics::Diagnostics;
use bms_core::fsm::StateId;
use bms_core::pack::PackSnapshot;
use proptest::prelude::*;

struct Discard;

impl OutputPort for Discard {
    fn send_charge_command(&mut self, _cmd: ChargeCommand) {}
    fn send_drive_limits(&mut self, _limits: DriveLimits) {}
    fn set_fault_signal(&mut self, _asserted: bool) {}
}

#[derive(Default)]
struct Moves(Vec<(StateId, StateId)>);

impl EventSink for Moves {
    fn emit(&mut self, event: &AppEvent) {
        if let AppEvent::StateChanged { from, to } = event {
            self.0.push((*from, *to));
        }
    }
}

// ── Controller op sequences ───────────────────────────────────

#[derive(Debug, Clone)]
enum Op {
    /// Advance time and tick with the given live readings.
    Tick {
        dt_ms: u64,
        current: f32,
        min_cell: f32,
        max_temp: f32,
    },
    ChargerDetected,
    Request(StateId),
}

fn arb_state() -> impl Strategy<Value = StateId> {
    prop::sample::select(StateId::ALL.to_vec())
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        6 => (1u64..=2_000, -60.0f32..260.0, 2.0f32..4.1, 20.0f32..70.0).prop_map(
            |(dt_ms, current, min_cell, max_temp)| Op::Tick {
                dt_ms,
                current,
                min_cell,
                max_temp,
            }
        ),
        1 => Just(Op::ChargerDetected),
        1 => arb_state().prop_map(Op::Request),
    ]
}

fn fast_config() -> BmsConfig {
    BmsConfig {
        over_current_ms: 1_000,
        over_charge_current_ms: 1_000,
        under_volt_ms: 1_000,
        high_temp_ms: 1_000,
        charge_interval_ms: 3_000,
        charge_settle_ms: 1_000,
        balance_min_voltage: 3.5,
        ..BmsConfig::default()
    }
}

fn seeded_pack() -> PackSnapshot {
    let mut pack = PackSnapshot::new();
    pack.cont_discharge_limit = 200.0;
    pack.cont_charge_limit = 40.0;
    for (c, chip) in pack.chips.iter_mut().enumerate() {
        for cell in 0..NUM_CELLS_PER_CHIP {
            let v = 3.8 + ((c * NUM_CELLS_PER_CHIP + cell) % 7) as f32 * 0.02;
            chip.open_cell_voltage[cell] = v;
            chip.cell_voltage[cell] = v;
            chip.cell_temp[cell] = 25.0;
        }
        chip.die_temp = 35.0;
    }
    derive_stats(&mut pack);
    pack
}

proptest! {
    /// Whatever happens, a pack in `Faulted` is never charging or
    /// bleeding, `Faulted` is only ever left for `Boot`, and a tick never
    /// ends in `Faulted` with the critical mask clear.
    #[test]
    fn faulted_state_is_safe_and_only_exits_through_boot(
        ops in proptest::collection::vec(arb_op(), 1..=60),
    ) {
        let config = fast_config();
        let max_per_chip = config.max_balance_per_chip;
        let mut ctl = BmsController::new(config).unwrap();
        let mut pack = seeded_pack();
        let mut moves = Moves::default();
        let mut now = 0u64;

        for op in &ops {
            match op {
                Op::Tick { dt_ms, current, min_cell, max_temp } => {
                    now += dt_ms;
                    pack.pack_current = *current;
                    pack.min_voltage.val = *min_cell;
                    pack.max_temp.val = *max_temp;
                    ctl.handle_tick(&mut pack, now, &mut Discard, &mut moves);
                    prop_assert!(
                        !(pack.current_state == StateId::Faulted && pack.fault_code_crit == 0),
                        "tick ended in Faulted with no critical fault"
                    );
                }
                Op::ChargerDetected => {
                    let cmd = AppCommand::ChargerDetected;
                    ctl.handle_command(cmd, &mut pack, now, &mut Discard, &mut moves).unwrap();
                }
                Op::Request(target) => {
                    let cmd = AppCommand::RequestState(*target);
                    ctl.handle_command(cmd, &mut pack, now, &mut Discard, &mut moves).unwrap();
                }
            }

            if pack.current_state == StateId::Faulted {
                prop_assert!(!pack.is_charging_enabled);
                prop_assert!(!pack.should_balance);
                prop_assert!(pack.discharge_config.is_all_off());
            }
            if pack.current_state != StateId::Charging {
                prop_assert!(pack.discharge_config.is_all_off());
            }
            for chip in 0..pack.chips.len() {
                let active = pack.discharge_config.chip(chip).iter().filter(|f| **f).count();
                prop_assert!(active <= max_per_chip);
            }
        }

        for (from, to) in &moves.0 {
            prop_assert!(from.can_transition_to(*to), "{from:?} -> {to:?} taken");
            if *from == StateId::Faulted {
                prop_assert_eq!(*to, StateId::Boot);
            }
        }
    }

    /// The selector never flags more than the cap, and never flags a cell
    /// at or below the threshold.
    #[test]
    fn selection_respects_cap_and_threshold(
        ocv in proptest::collection::vec(3.0f32..4.2, 1..=NUM_CELLS_PER_CHIP),
        fraction in 0.0f32..=1.0,
        cap in 1usize..=NUM_CELLS_PER_CHIP,
    ) {
        let min = ocv.iter().copied().fold(f32::MAX, f32::min);
        let max = ocv.iter().copied().fold(f32::MIN, f32::max);
        let params = BalanceParams { threshold_fraction: fraction, max_per_chip: cap };
        let threshold = params.threshold(min, max - min);

        let mut out = [false; NUM_CELLS_PER_CHIP];
        select_chip(&ocv, min, max - min, &params, &mut out);

        prop_assert!(out.iter().filter(|f| **f).count() <= cap);
        for (i, flagged) in out.iter().enumerate().take(ocv.len()) {
            if *flagged {
                prop_assert!(ocv[i] > threshold);
            }
        }
        prop_assert!(out[ocv.len()..].iter().all(|f| !f));
    }

    /// The latch history never grows past its ring size and keeps the
    /// newest records.
    #[test]
    fn fault_history_is_bounded(latches in 1usize..=40) {
        let mut diag = Diagnostics::new();
        for i in 0..latches {
            diag.record_fault_latch(i as u64, 1);
        }
        let history: Vec<_> = diag.fault_history().collect();
        prop_assert!(history.len() <= 8);
        prop_assert_eq!(history.last().map(|r| r.at_ms), Some(latches as u64 - 1));
        prop_assert_eq!(diag.fault_latches as usize, latches);
    }
}
