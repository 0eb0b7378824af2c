//! State hooks.
//!
//! Dispatch is a plain `match` on [`StateId`]; adding a state without
//! handling it here is a compile error.  `handle` returns the state it
//! wants next, and the engine checks that against the transition matrix.

use super::StateId;
use super::context::FsmContext;
use crate::app::ports::{ChargeCommand, DriveLimits, OutputPort};
use crate::balancing::{BalanceParams, balance_pack};
use crate::charging::should_balance;
use crate::pack::PackSnapshot;
use log::{debug, info};

/// Runs once when `state` becomes current.
pub fn init<O: OutputPort>(state: StateId, ctx: &mut FsmContext<'_, O>) {
    match state {
        StateId::Boot | StateId::Ready => {}
        StateId::Charging => charging_init(ctx),
        StateId::Faulted => faulted_init(ctx),
    }
}

/// Runs every tick while `state` is current.
pub fn handle<O: OutputPort>(state: StateId, ctx: &mut FsmContext<'_, O>) -> Option<StateId> {
    match state {
        StateId::Boot => boot_handle(ctx),
        StateId::Ready => ready_handle(ctx),
        StateId::Charging => charging_handle(ctx),
        StateId::Faulted => faulted_handle(ctx),
    }
}

/// Runs once when `state` stops being current.
pub fn exit<O: OutputPort>(state: StateId, ctx: &mut FsmContext<'_, O>) {
    match state {
        StateId::Charging => charging_exit(ctx),
        StateId::Boot | StateId::Ready | StateId::Faulted => {}
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  BOOT
// ═══════════════════════════════════════════════════════════════════════════

fn boot_handle<O: OutputPort>(ctx: &mut FsmContext<'_, O>) -> Option<StateId> {
    if ctx.pack.is_charger_connected {
        Some(StateId::Charging)
    } else {
        Some(StateId::Ready)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  READY
// ═══════════════════════════════════════════════════════════════════════════

fn ready_handle<O: OutputPort>(ctx: &mut FsmContext<'_, O>) -> Option<StateId> {
    ctx.out.send_drive_limits(DriveLimits {
        charge_limit: ctx.pack.cont_charge_limit,
        discharge_limit: ctx.pack.cont_discharge_limit,
    });
    ctx.out.set_fault_signal(false);
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  CHARGING
// ═══════════════════════════════════════════════════════════════════════════

fn charging_init<O: OutputPort>(ctx: &mut FsmContext<'_, O>) {
    info!("Charging: session start");
    ctx.admission.reset();
}

fn charging_handle<O: OutputPort>(ctx: &mut FsmContext<'_, O>) -> Option<StateId> {
    let now = ctx.now;

    if ctx.admission.may_charge(ctx.pack.is_charger_connected, now) {
        ctx.pack.is_charging_enabled = true;
        if !ctx.charge_cmd_timer.is_running(now) {
            ctx.out.send_charge_command(ChargeCommand::enable(
                ctx.config.pack_charge_voltage(),
                ctx.config.charge_current,
            ));
            ctx.charge_cmd_timer
                .start(now, ctx.config.charge_command_interval_ms);
        }
    } else {
        ctx.pack.is_charging_enabled = false;
        ctx.out.send_charge_command(ChargeCommand::disabled());
    }

    if should_balance(ctx.pack, ctx.config, ctx.admission, now) {
        let params = BalanceParams::from_config(ctx.config);
        let PackSnapshot {
            chips,
            min_ocv,
            delta_ocv,
            discharge_config,
            ..
        } = &mut *ctx.pack;
        balance_pack(
            chips.iter().map(|c| c.open_cell_voltage.as_slice()),
            min_ocv.val,
            *delta_ocv,
            &params,
            discharge_config,
        );
        ctx.pack.should_balance = true;
        debug!(
            "Charging: balancing {} cells",
            ctx.pack.discharge_config.active_count()
        );
    } else {
        ctx.pack.should_balance = false;
        ctx.pack.discharge_config.clear();
    }

    // Motor controller must not pull or push current while on the charger.
    ctx.out.send_drive_limits(DriveLimits::zero());
    None
}

fn charging_exit<O: OutputPort>(ctx: &mut FsmContext<'_, O>) {
    ctx.pack.is_charging_enabled = false;
    ctx.pack.should_balance = false;
    ctx.pack.discharge_config.clear();
    ctx.charge_cmd_timer.cancel();
}

// ═══════════════════════════════════════════════════════════════════════════
//  FAULTED
// ═══════════════════════════════════════════════════════════════════════════

fn faulted_init<O: OutputPort>(ctx: &mut FsmContext<'_, O>) {
    shut_down(ctx.pack);
    ctx.out.send_drive_limits(DriveLimits::zero());
}

fn faulted_handle<O: OutputPort>(ctx: &mut FsmContext<'_, O>) -> Option<StateId> {
    if ctx.pack.fault_code_crit == 0 {
        info!("Faulted: critical faults cleared, rebooting");
        ctx.out.set_fault_signal(false);
        return Some(StateId::Boot);
    }

    ctx.out.set_fault_signal(true);
    shut_down(ctx.pack);
    if ctx.pack.is_charger_connected {
        ctx.out.send_charge_command(ChargeCommand::disabled());
    }
    None
}

fn shut_down(pack: &mut PackSnapshot) {
    pack.should_balance = false;
    pack.is_charging_enabled = false;
    pack.discharge_config.clear();
}
