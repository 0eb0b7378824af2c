//! Unified error and fault-code types for the BMS core.
//!
//! Two very different things live here:
//!
//! - [`Error`] covers infrastructure failures (bad configuration, a lock
//!   that could not be taken in time, a full bus queue).  These are the
//!   only things that travel through `Result`.
//! - [`FaultCode`] names the safety faults.  Faults are *data*: they are
//!   latched into the pack's bitmasks by the fault engine and never
//!   unwind the control loop.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible infrastructure operation funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Configuration is invalid.  The message names the field.
    Config(&'static str),
    /// The shared pack snapshot lock was not acquired within the timeout.
    LockTimeout,
    /// The outgoing bus queue was full and the message was dropped.
    QueueFull,
    /// Configuration storage could not be read or written.
    Storage(&'static str),
    /// The bus transmitter rejected a frame.
    Bus(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::LockTimeout => write!(f, "pack lock acquisition timed out"),
            Self::QueueFull => write!(f, "outgoing bus queue full"),
            Self::Storage(msg) => write!(f, "storage: {msg}"),
            Self::Bus(msg) => write!(f, "bus: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Fault codes
// ---------------------------------------------------------------------------

/// Named fault bits.  The critical and non-critical bitmasks on the pack
/// share this numbering; which mask a bit lands in is decided by the rule
/// that raised it, not by the code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[repr(u32)]
pub enum FaultCode {
    CellsNotBalancing = 0x1,
    CellVoltageTooHigh = 0x2,
    CellVoltageTooLow = 0x4,
    PackTooHot = 0x8,
    /// Cell tap wire weakly connected or disconnected.
    OpenWiring = 0x10,
    InternalSoftware = 0x20,
    /// Onboard temperatures too high.
    InternalThermal = 0x40,
    /// Invalid CRC while retrieving cell values.
    InternalCellComm = 0x80,
    CurrentSensor = 0x100,
    /// Charge voltage seen while not supposed to be charging.
    ChargeReadingMismatch = 0x200,
    LowCellVoltage = 0x400,
    WeakPack = 0x800,
    ExternalCan = 0x1000,
    DischargeLimitEnforcement = 0x2000,
    ChargerSafetyRelay = 0x4000,
    BatteryThermistor = 0x8000,
    ChargerCan = 0x1_0000,
    ChargeLimitEnforcement = 0x2_0000,
    DieTempMaximum = 0x4_0000,
}

impl FaultCode {
    /// Every named code, lowest bit first.
    pub const ALL: [FaultCode; 19] = [
        Self::CellsNotBalancing,
        Self::CellVoltageTooHigh,
        Self::CellVoltageTooLow,
        Self::PackTooHot,
        Self::OpenWiring,
        Self::InternalSoftware,
        Self::InternalThermal,
        Self::InternalCellComm,
        Self::CurrentSensor,
        Self::ChargeReadingMismatch,
        Self::LowCellVoltage,
        Self::WeakPack,
        Self::ExternalCan,
        Self::DischargeLimitEnforcement,
        Self::ChargerSafetyRelay,
        Self::BatteryThermistor,
        Self::ChargerCan,
        Self::ChargeLimitEnforcement,
        Self::DieTempMaximum,
    ];

    /// Return the bitmask for this fault.
    pub const fn mask(self) -> u32 {
        self as u32
    }

    /// Bit position (0-based) of this code; what the diagnostic bus
    /// message carries instead of the mask.
    pub const fn bit_index(self) -> u8 {
        (self as u32).trailing_zeros() as u8
    }

    /// Names of every code set in `mask`, lowest bit first.
    pub fn iter_set(mask: u32) -> impl Iterator<Item = FaultCode> {
        Self::ALL.into_iter().filter(move |c| mask & c.mask() != 0)
    }
}

impl fmt::Display for FaultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::CellsNotBalancing => "cells not balancing",
            Self::CellVoltageTooHigh => "cell voltage too high",
            Self::CellVoltageTooLow => "cell voltage too low",
            Self::PackTooHot => "pack too hot",
            Self::OpenWiring => "open wiring",
            Self::InternalSoftware => "internal software fault",
            Self::InternalThermal => "internal thermal error",
            Self::InternalCellComm => "internal cell comm fault",
            Self::CurrentSensor => "current sensor fault",
            Self::ChargeReadingMismatch => "charge reading mismatch",
            Self::LowCellVoltage => "low cell voltage",
            Self::WeakPack => "weak pack",
            Self::ExternalCan => "external CAN fault",
            Self::DischargeLimitEnforcement => "discharge limit enforcement",
            Self::ChargerSafetyRelay => "charger safety relay",
            Self::BatteryThermistor => "battery thermistor",
            Self::ChargerCan => "charger CAN fault",
            Self::ChargeLimitEnforcement => "charge limit enforcement",
            Self::DieTempMaximum => "die temperature maximum",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
