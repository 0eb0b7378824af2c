//! Mock outputs for integration tests.
//!
//! Records every command the controller issues so tests can assert on the
//! full history without a CAN bus or fault relay.

use bms_core::adapters::sim::derive_stats;
use bms_core::app::events::AppEvent;
use bms_core::app::ports::{ChargeCommand, DriveLimits, EventSink, OutputPort};
use bms_core::config::NUM_CELLS_PER_CHIP;
use bms_core::pack::PackSnapshot;

// ── Output record ─────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum OutputCall {
    Charge(ChargeCommand),
    Limits(DriveLimits),
    FaultSignal(bool),
}

#[derive(Default)]
pub struct MockOutputs {
    pub calls: Vec<OutputCall>,
}

#[allow(dead_code)]
impl MockOutputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn charge_commands(&self) -> Vec<ChargeCommand> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                OutputCall::Charge(cmd) => Some(*cmd),
                _ => None,
            })
            .collect()
    }

    pub fn last_limits(&self) -> Option<DriveLimits> {
        self.calls.iter().rev().find_map(|c| match c {
            OutputCall::Limits(l) => Some(*l),
            _ => None,
        })
    }

    pub fn fault_signal(&self) -> Option<bool> {
        self.calls.iter().rev().find_map(|c| match c {
            OutputCall::FaultSignal(on) => Some(*on),
            _ => None,
        })
    }

    pub fn clear(&mut self) {
        self.calls.clear();
    }
}

impl OutputPort for MockOutputs {
    fn send_charge_command(&mut self, cmd: ChargeCommand) {
        self.calls.push(OutputCall::Charge(cmd));
    }

    fn send_drive_limits(&mut self, limits: DriveLimits) {
        self.calls.push(OutputCall::Limits(limits));
    }

    fn set_fault_signal(&mut self, asserted: bool) {
        self.calls.push(OutputCall::FaultSignal(asserted));
    }
}

// ── Event recorder ────────────────────────────────────────────

#[derive(Default)]
pub struct EventLog {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for EventLog {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── Pack fixtures ─────────────────────────────────────────────

/// A pack with every quantity comfortably inside its limits.
#[allow(dead_code)]
pub fn healthy_pack() -> PackSnapshot {
    let mut pack = PackSnapshot::new();
    pack.cont_discharge_limit = 200.0;
    pack.cont_charge_limit = 40.0;
    for chip in &mut pack.chips {
        chip.cell_voltage = [3.9; NUM_CELLS_PER_CHIP];
        chip.open_cell_voltage = [3.9; NUM_CELLS_PER_CHIP];
        chip.cell_temp = [25.0; NUM_CELLS_PER_CHIP];
        chip.cell_resistance = [0.012; NUM_CELLS_PER_CHIP];
        chip.die_temp = 35.0;
    }
    derive_stats(&mut pack);
    pack
}
