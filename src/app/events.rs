//! Outbound application events and bus messages.
//!
//! The [`BmsController`](super::service::BmsController) and the fault
//! engine emit [`AppEvent`]s through the [`EventSink`](super::ports::EventSink)
//! port.  Adapters on the other side decide what to do with them: log
//! them, forward fault-timer notices to the bus, etc.
//!
//! [`BusMessage`] is the unit that travels through the outgoing bus queue.

use serde::Serialize;

use super::ports::{ChargeCommand, DriveLimits};
use crate::error::FaultCode;
use crate::fsm::StateId;

/// Structured events emitted by the control core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// Controller constructed (carries the initial state).
    Started(StateId),

    /// The FSM moved between states.
    StateChanged { from: StateId, to: StateId },

    /// A transition was requested that the matrix forbids.
    TransitionRejected { from: StateId, to: StateId },

    /// A fault rule's debounce timer started, expired or cleared.
    FaultTimer(FaultTimerEvent),

    /// The critical mask went from zero to non-zero (carries the mask).
    FaultLatched(u32),

    /// The critical mask returned to zero.
    FaultCleared,

    /// The pack lock could not be taken within the timeout; tick skipped.
    LockTimeout,

    /// Periodic telemetry snapshot.
    Telemetry(TelemetryData),
}

/// Progress of one fault rule's debounce timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FaultTimerKind {
    /// Condition became true; timer armed.
    Started,
    /// Timer expired with the condition still true.
    Faulted,
    /// Condition went false; timer cancelled.
    Cleared,
}

/// Fault-timer notice, mirrored onto the bus for offboard diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FaultTimerEvent {
    pub kind: FaultTimerKind,
    pub code: FaultCode,
    /// Primary operand value at the time of the event.
    pub value: f32,
}

/// A point-in-time telemetry snapshot suitable for logging or transmission.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TelemetryData {
    pub state: StateId,
    pub fault_code_crit: u32,
    pub fault_code_noncrit: u32,
    pub fault_display_code: u8,
    pub pack_current: f32,
    pub min_ocv: f32,
    pub max_ocv: f32,
    pub delta_ocv: f32,
    pub charger_connected: bool,
    pub charging_enabled: bool,
    pub balancing_cells: usize,
    /// Control ticks since the current state was entered.
    pub ticks_in_state: u64,
}

/// One message for the outgoing bus queue.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum BusMessage {
    Charge(ChargeCommand),
    DriveLimits(DriveLimits),
    FaultTimer(FaultTimerEvent),
}
