//! Control service: the hexagonal core.
//!
//! [`BmsController`] owns the state machine, the fault table, and the
//! charging bookkeeping.  It never owns the pack snapshot: each tick it
//! borrows it (directly, or through the [`SharedPack`] lock) and all I/O
//! flows through port traits injected at call sites, so the whole
//! controller is testable with mock adapters.
//!
//! ```text
//!  SharedPack ──▶ ┌────────────────────────┐ ──▶ EventSink
//!                 │     BmsController      │
//!  OutputPort ◀── │  Faults · FSM · Charge │
//!                 └────────────────────────┘
//! ```
//!
//! Tick order is fixed: fault table, forced `Faulted` entry if any
//! critical bit is set, then the current state's handler.

use std::time::Duration;

use log::{info, warn};

use crate::charging::ChargeAdmission;
use crate::config::BmsConfig;
use crate::diagnostics::Diagnostics;
use crate::error::{Error, Result};
use crate::fsm::context::FsmContext;
use crate::fsm::{Fsm, StateId, Transition};
use crate::pack::{PackSnapshot, SharedPack};
use crate::safety::FaultTable;
use crate::timer::{Millis, Timer};

use super::commands::AppCommand;
use super::events::{AppEvent, TelemetryData};
use super::ports::{EventSink, OutputPort};

// ───────────────────────────────────────────────────────────────
// BmsController
// ───────────────────────────────────────────────────────────────

/// The pack controller.
pub struct BmsController {
    fsm: Fsm,
    faults: FaultTable,
    admission: ChargeAdmission,
    /// Rate limit for charger enable commands.
    charge_cmd_timer: Timer,
    config: BmsConfig,
    diagnostics: Diagnostics,
    /// Queue drop total at the last diagnostics clear.
    queue_drops_base: u32,
}

impl BmsController {
    /// Construct the controller.  Fails if `config` does not validate.
    pub fn new(config: BmsConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            fsm: Fsm::new(),
            faults: FaultTable::new(&config),
            admission: ChargeAdmission::new(&config),
            charge_cmd_timer: Timer::new(),
            config,
            diagnostics: Diagnostics::new(),
            queue_drops_base: 0,
        })
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Announce the controller.  The pack starts in whatever state the
    /// snapshot says, normally `Boot`.
    pub fn start(&mut self, pack: &PackSnapshot, sink: &mut impl EventSink) {
        info!("BmsController started in {}", pack.current_state.name());
        sink.emit(&AppEvent::Started(pack.current_state));
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one control cycle on a snapshot the caller already holds.
    pub fn handle_tick<O: OutputPort>(
        &mut self,
        pack: &mut PackSnapshot,
        now: Millis,
        out: &mut O,
        sink: &mut impl EventSink,
    ) {
        // 1. Fault table, every tick, every state.
        let prev_crit = pack.fault_code_crit;
        let crit = self.faults.evaluate_all(pack, now, sink);
        if prev_crit == 0 && crit != 0 {
            self.diagnostics.record_fault_latch(now, crit);
            sink.emit(&AppEvent::FaultLatched(crit));
        } else if prev_crit != 0 && crit == 0 {
            sink.emit(&AppEvent::FaultCleared);
        }

        // 2. Forced entry into Faulted, then 3. the state handler.
        let (forced, handled) = {
            let mut ctx = FsmContext {
                pack: &mut *pack,
                config: &self.config,
                now,
                admission: &mut self.admission,
                charge_cmd_timer: &mut self.charge_cmd_timer,
                out: &mut *out,
            };
            let forced = if crit != 0 {
                self.fsm.request_transition(&mut ctx, StateId::Faulted)
            } else {
                Transition::Stayed
            };
            let handled = self.fsm.tick(&mut ctx);
            (forced, handled)
        };

        self.record(forced, sink);
        self.record(handled, sink);
        self.diagnostics.ticks += 1;
    }

    /// Run one control cycle against the shared snapshot.
    ///
    /// The lock is held for the whole read-evaluate-write section.  If it
    /// cannot be taken within `lock_timeout_ms` the tick is skipped and
    /// [`Error::LockTimeout`] returned; the caller should simply try again
    /// next period.
    pub fn tick_shared<O: OutputPort>(
        &mut self,
        shared: &SharedPack,
        now: Millis,
        out: &mut O,
        sink: &mut impl EventSink,
    ) -> Result<()> {
        let timeout = Duration::from_millis(u64::from(self.config.lock_timeout_ms));
        let Some(mut pack) = shared.try_lock_for(timeout) else {
            self.diagnostics.lock_timeouts = self.diagnostics.lock_timeouts.saturating_add(1);
            warn!("pack lock not acquired within {timeout:?}, tick skipped");
            sink.emit(&AppEvent::LockTimeout);
            return Err(Error::LockTimeout);
        };
        self.handle_tick(&mut pack, now, out, sink);
        Ok(())
    }

    // ── Command handling ──────────────────────────────────────

    /// Process an external command.
    ///
    /// Only `UpdateConfig` can fail, and only on validation; the running
    /// configuration is left untouched in that case.
    pub fn handle_command<O: OutputPort>(
        &mut self,
        cmd: AppCommand,
        pack: &mut PackSnapshot,
        now: Millis,
        out: &mut O,
        sink: &mut impl EventSink,
    ) -> Result<()> {
        match cmd {
            AppCommand::ChargerDetected => {
                if !pack.is_charger_connected {
                    info!("Charger detected");
                }
                pack.note_charger_detected();
            }
            AppCommand::RequestState(target) => {
                let mut ctx = FsmContext {
                    pack,
                    config: &self.config,
                    now,
                    admission: &mut self.admission,
                    charge_cmd_timer: &mut self.charge_cmd_timer,
                    out,
                };
                let outcome = self.fsm.request_transition(&mut ctx, target);
                self.record(outcome, sink);
            }
            AppCommand::UpdateConfig(new_config) => {
                new_config.validate()?;
                self.faults.reconfigure(&new_config);
                self.admission.reconfigure(&new_config);
                self.config = new_config;
                info!("Configuration updated at runtime");
            }
            AppCommand::ClearDiagnostics => {
                self.queue_drops_base =
                    self.queue_drops_base.saturating_add(self.diagnostics.queue_drops);
                self.diagnostics.clear();
            }
        }
        Ok(())
    }

    // ── Queries ───────────────────────────────────────────────

    /// Telemetry snapshot of `pack` as seen by this controller.
    pub fn build_telemetry(&self, pack: &PackSnapshot) -> TelemetryData {
        TelemetryData {
            state: pack.current_state,
            fault_code_crit: pack.fault_code_crit,
            fault_code_noncrit: pack.fault_code_noncrit,
            fault_display_code: pack.fault_display_code(),
            pack_current: pack.pack_current,
            min_ocv: pack.min_ocv.val,
            max_ocv: pack.max_ocv.val,
            delta_ocv: pack.delta_ocv,
            charger_connected: pack.is_charger_connected,
            charging_enabled: pack.is_charging_enabled,
            balancing_cells: pack.discharge_config.active_count(),
            ticks_in_state: self.fsm.ticks_in_current_state(),
        }
    }

    pub fn config(&self) -> &BmsConfig {
        &self.config
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Publish the bus queue's running drop total into diagnostics,
    /// counted from the last `ClearDiagnostics`.
    pub fn record_queue_drops(&mut self, total: u32) {
        self.diagnostics.queue_drops = total.saturating_sub(self.queue_drops_base);
    }

    // ── Internal ──────────────────────────────────────────────

    fn record(&mut self, outcome: Transition, sink: &mut impl EventSink) {
        match outcome {
            Transition::Stayed => {}
            Transition::Moved { from, to } => {
                sink.emit(&AppEvent::StateChanged { from, to });
            }
            Transition::Rejected { from, to } => {
                self.diagnostics.rejected_transitions =
                    self.diagnostics.rejected_transitions.saturating_add(1);
                sink.emit(&AppEvent::TransitionRejected { from, to });
            }
        }
    }
}
