//! Application core: pure domain logic, zero I/O.
//!
//! The control service and the vocabulary it speaks: commands in, events
//! and output commands out.  All interaction with the bus, the fault line
//! and the clock happens through **port traits** defined in [`ports`],
//! keeping this layer fully testable without real peripherals.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
