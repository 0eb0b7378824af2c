//! System configuration parameters
//!
//! Pack geometry is fixed at compile time; everything else is a tunable
//! that can be loaded from storage through
//! [`ConfigPort`](crate::app::ports::ConfigPort).  Defaults describe a
//! 5-segment pack of Molicel P45B cells.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// --- Pack geometry ---
pub const NUM_SEGMENTS: usize = 5;
pub const CHIPS_PER_SEGMENT: usize = 2;
pub const NUM_CHIPS: usize = NUM_SEGMENTS * CHIPS_PER_SEGMENT;
pub const NUM_CELLS_PER_CHIP: usize = 14;
pub const NUM_CELLS: usize = NUM_CHIPS * NUM_CELLS_PER_CHIP;

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BmsConfig {
    // --- Timing ---
    /// Control loop period (milliseconds)
    pub tick_period_ms: u32,
    /// Longest wait for the shared pack lock before the tick is skipped
    pub lock_timeout_ms: u32,

    // --- Cell limits ---
    /// Minimum cell voltage (V) before an under-voltage fault
    pub min_cell_voltage: f32,
    /// Cell voltage (V) treated as a dead cell
    pub extremely_low_cell_voltage: f32,
    /// Maximum cell voltage (V) while not charging
    pub max_cell_voltage: f32,
    /// Maximum cell voltage (V) under charge before a fault
    pub max_charge_voltage_fault: f32,
    /// Maximum cell temperature (Celsius)
    pub max_cell_temp_c: f32,
    /// Maximum monitor-IC die temperature (Celsius)
    pub max_chip_temp_c: f32,

    // --- Fault debounce windows (milliseconds) ---
    pub over_current_ms: u32,
    pub over_charge_current_ms: u32,
    pub under_volt_ms: u32,
    pub over_volt_charge_ms: u32,
    pub over_volt_ms: u32,
    pub low_cell_ms: u32,
    pub high_temp_ms: u32,
    pub chip_temp_ms: u32,

    // --- Charging ---
    /// Per-cell charge target voltage (V)
    pub charge_voltage_per_cell: f32,
    /// Charger current setpoint (A)
    pub charge_current: f32,
    /// How long to charge before forcing a rest (milliseconds)
    pub charge_interval_ms: u32,
    /// Zero-current rest before charging resumes (milliseconds)
    pub charge_settle_ms: u32,
    /// Minimum spacing between charger enable commands (milliseconds)
    pub charge_command_interval_ms: u32,

    // --- Balancing ---
    /// Fraction of the pack OCV spread above the minimum that is left alone
    pub balance_threshold_fraction: f32,
    /// Most cells discharged at once on one chip (thermal limit)
    pub max_balance_per_chip: usize,
    /// Highest cell OCV (V) must exceed this before balancing starts
    pub balance_min_voltage: f32,
    /// OCV spread (V) below which the pack counts as balanced
    pub balance_min_delta: f32,
}

impl Default for BmsConfig {
    fn default() -> Self {
        Self {
            // Timing
            tick_period_ms: 100, // 10 Hz
            lock_timeout_ms: 50,

            // Cell limits
            min_cell_voltage: 2.5,
            extremely_low_cell_voltage: 0.9,
            max_cell_voltage: 4.2,
            max_charge_voltage_fault: 4.25,
            max_cell_temp_c: 60.0,
            max_chip_temp_c: 60.0,

            // Debounce
            over_current_ms: 55_000,
            over_charge_current_ms: 55_000,
            under_volt_ms: 55_000,
            over_volt_charge_ms: 15_000,
            over_volt_ms: 55_000,
            low_cell_ms: 55_000,
            high_temp_ms: 55_000,
            chip_temp_ms: 55_000,

            // Charging
            charge_voltage_per_cell: 4.19,
            charge_current: 3.5,
            charge_interval_ms: 300_000, // 5 min
            charge_settle_ms: 60_000,    // 1 min
            charge_command_interval_ms: 1_000,

            // Balancing
            balance_threshold_fraction: 0.4,
            max_balance_per_chip: 7,
            balance_min_voltage: 4.0,
            balance_min_delta: 0.010,
        }
    }
}

impl BmsConfig {
    /// Full-pack charger voltage target (V).
    pub fn pack_charge_voltage(&self) -> f32 {
        self.charge_voltage_per_cell * NUM_CELLS_PER_CHIP as f32 * CHIPS_PER_SEGMENT as f32
    }

    /// Reject settings that would make the controller unsafe or
    /// meaningless.  Values are never clamped.
    pub fn validate(&self) -> Result<()> {
        if self.tick_period_ms == 0 {
            return Err(Error::Config("tick_period_ms must be non-zero"));
        }
        if self.lock_timeout_ms == 0 || self.lock_timeout_ms >= self.tick_period_ms {
            return Err(Error::Config("lock_timeout_ms must be within one tick"));
        }
        if !(0.0..=1.0).contains(&self.balance_threshold_fraction) {
            return Err(Error::Config("balance_threshold_fraction outside [0, 1]"));
        }
        if self.max_balance_per_chip == 0 || self.max_balance_per_chip > NUM_CELLS_PER_CHIP {
            return Err(Error::Config("max_balance_per_chip outside 1..=cells per chip"));
        }
        if self.extremely_low_cell_voltage >= self.min_cell_voltage
            || self.min_cell_voltage >= self.max_cell_voltage
        {
            return Err(Error::Config("cell voltage limits out of order"));
        }
        if self.balance_min_voltage >= self.max_cell_voltage {
            return Err(Error::Config("balance_min_voltage above max_cell_voltage"));
        }
        if self.charge_voltage_per_cell > self.max_charge_voltage_fault {
            return Err(Error::Config("charge target above charge fault limit"));
        }
        let debounce = [
            self.over_current_ms,
            self.over_charge_current_ms,
            self.under_volt_ms,
            self.over_volt_charge_ms,
            self.over_volt_ms,
            self.low_cell_ms,
            self.high_temp_ms,
            self.chip_temp_ms,
        ];
        if debounce.contains(&0) {
            return Err(Error::Config("fault debounce windows must be non-zero"));
        }
        if self.charge_interval_ms == 0 || self.charge_settle_ms == 0 {
            return Err(Error::Config("charge interval and settle must be non-zero"));
        }
        Ok(())
    }

    /// Compact binary form for flash storage.
    pub fn to_blob(&self) -> Result<Vec<u8>> {
        postcard::to_allocvec(self).map_err(|_| Error::Storage("config encode failed"))
    }

    /// Decode and validate a stored blob.
    pub fn from_blob(bytes: &[u8]) -> Result<Self> {
        let config: Self =
            postcard::from_bytes(bytes).map_err(|_| Error::Storage("config blob corrupted"))?;
        config.validate()?;
        Ok(config)
    }
}
