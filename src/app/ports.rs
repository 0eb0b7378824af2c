//! Port traits: the boundary between the control core and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ BmsController (domain)
//! ```
//!
//! Driven adapters (bus queue, fault relay, event sinks, config storage)
//! implement these traits.  The [`BmsController`](super::service::BmsController)
//! consumes them via generics, so the core never touches a bus or pin
//! directly.

use serde::{Deserialize, Serialize};

use crate::config::BmsConfig;
use crate::error::Result;
use crate::timer::Millis;

// ───────────────────────────────────────────────────────────────
// Outbound payloads
// ───────────────────────────────────────────────────────────────

/// Setpoint for the external charger.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChargeCommand {
    /// Pack-level target voltage (V).
    pub voltage: f32,
    /// Charge current (A).
    pub current: f32,
    pub enabled: bool,
}

impl ChargeCommand {
    pub fn enable(voltage: f32, current: f32) -> Self {
        Self {
            voltage,
            current,
            enabled: true,
        }
    }

    /// Stop charging: zero setpoints, output off.
    pub fn disabled() -> Self {
        Self {
            voltage: 0.0,
            current: 0.0,
            enabled: false,
        }
    }
}

/// Current limits advertised to the motor controller (A).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DriveLimits {
    pub charge_limit: f32,
    pub discharge_limit: f32,
}

impl DriveLimits {
    pub fn zero() -> Self {
        Self {
            charge_limit: 0.0,
            discharge_limit: 0.0,
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Output port (driven adapter: domain → bus / pins)
// ───────────────────────────────────────────────────────────────

/// Write-side port: state hooks command the outside world through this.
///
/// Implementations must not block; the controller calls them while it
/// holds the pack lock.
pub trait OutputPort {
    /// Queue a charger setpoint message.
    fn send_charge_command(&mut self, cmd: ChargeCommand);

    /// Queue a motor-controller current-limit message.
    fn send_drive_limits(&mut self, limits: DriveLimits);

    /// Drive the hardware fault line (true = asserted).
    fn set_fault_signal(&mut self, asserted: bool);
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The core emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go (log, bus, etc.).
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

/// Fan one event out to two sinks.
impl<A: EventSink, B: EventSink> EventSink for (A, B) {
    fn emit(&mut self, event: &super::events::AppEvent) {
        self.0.emit(event);
        self.1.emit(event);
    }
}

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Monotonic millisecond time source.
pub trait Clock {
    fn now_ms(&self) -> Millis;
}

// ───────────────────────────────────────────────────────────────
// Bus transmit port (driven adapter: dispatcher → CAN)
// ───────────────────────────────────────────────────────────────

/// Blocking transmit of one outgoing bus message.  Only the dispatcher
/// calls this, never while the pack lock is held.
pub trait BusTransmit {
    fn transmit(&mut self, msg: &super::events::BusMessage) -> Result<()>;
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists [`BmsConfig`].
///
/// Implementations must validate before persisting and return
/// [`BmsConfig::default()`] when nothing is stored.
pub trait ConfigPort {
    fn load(&self) -> Result<BmsConfig>;

    fn save(&self, config: &BmsConfig) -> Result<()>;
}
