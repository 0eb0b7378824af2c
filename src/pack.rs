//! Shared pack snapshot.
//!
//! [`PackSnapshot`] is the one aggregate that the analytics layer and the
//! control loop both mutate.  Analytics fills the measured and derived
//! fields; the control loop owns the decision fields (`current_state`,
//! fault masks, charging/balancing flags and the discharge matrix).  Both
//! sides hold the [`SharedPack`] lock for their whole read-modify-write
//! section, so neither ever sees a half-updated snapshot.

use std::sync::Arc;

use crate::config::{NUM_CELLS_PER_CHIP, NUM_CHIPS};
use crate::fsm::StateId;

/// The lock-guarded snapshot shared between threads.
pub type SharedPack = Arc<parking_lot::Mutex<PackSnapshot>>;

/// Wrap a snapshot for sharing.
pub fn shared(pack: PackSnapshot) -> SharedPack {
    Arc::new(parking_lot::Mutex::new(pack))
}

// ---------------------------------------------------------------------------
// Critical-value records
// ---------------------------------------------------------------------------

/// A pack-wide extreme and the cell it was found on.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CritCellVal {
    pub val: f32,
    pub chip: u8,
    pub cell: u8,
}

impl CritCellVal {
    pub fn new(val: f32, chip: u8, cell: u8) -> Self {
        Self { val, chip, cell }
    }
}

/// A pack-wide extreme of a per-chip quantity (die temperature).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CritChipVal {
    pub val: f32,
    pub chip: u8,
}

// ---------------------------------------------------------------------------
// Per-chip data
// ---------------------------------------------------------------------------

/// Derived readings for one monitor chip, produced by the analytics layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChipData {
    pub cell_voltage: [f32; NUM_CELLS_PER_CHIP],
    pub open_cell_voltage: [f32; NUM_CELLS_PER_CHIP],
    pub cell_temp: [f32; NUM_CELLS_PER_CHIP],
    pub cell_resistance: [f32; NUM_CELLS_PER_CHIP],
    pub die_temp: f32,
}

impl Default for ChipData {
    fn default() -> Self {
        Self {
            cell_voltage: [0.0; NUM_CELLS_PER_CHIP],
            open_cell_voltage: [0.0; NUM_CELLS_PER_CHIP],
            cell_temp: [0.0; NUM_CELLS_PER_CHIP],
            cell_resistance: [0.0; NUM_CELLS_PER_CHIP],
            die_temp: 0.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Discharge command matrix
// ---------------------------------------------------------------------------

/// Chip × cell balancing command surface consumed by the segment driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DischargeMatrix(pub [[bool; NUM_CELLS_PER_CHIP]; NUM_CHIPS]);

impl Default for DischargeMatrix {
    fn default() -> Self {
        Self([[false; NUM_CELLS_PER_CHIP]; NUM_CHIPS])
    }
}

impl DischargeMatrix {
    /// Command every cell off.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn is_all_off(&self) -> bool {
        self.0.iter().flatten().all(|on| !on)
    }

    /// Number of cells commanded to discharge.
    pub fn active_count(&self) -> usize {
        self.0.iter().flatten().filter(|on| **on).count()
    }

    pub fn chip(&self, chip: usize) -> &[bool; NUM_CELLS_PER_CHIP] {
        &self.0[chip]
    }

    pub fn chip_mut(&mut self, chip: usize) -> &mut [bool; NUM_CELLS_PER_CHIP] {
        &mut self.0[chip]
    }
}

// ---------------------------------------------------------------------------
// PackSnapshot
// ---------------------------------------------------------------------------

/// Aggregate state of the pack.
#[derive(Debug, Clone, PartialEq)]
pub struct PackSnapshot {
    // -- Measured / derived (analytics layer) --
    pub chips: [ChipData; NUM_CHIPS],
    /// Pack current (A); positive = discharge.
    pub pack_current: f32,
    pub cont_discharge_limit: f32,
    pub cont_charge_limit: f32,

    pub max_voltage: CritCellVal,
    pub min_voltage: CritCellVal,
    pub max_ocv: CritCellVal,
    pub min_ocv: CritCellVal,
    pub avg_ocv: f32,
    /// Spread between the highest and lowest OCV.
    pub delta_ocv: f32,
    pub max_temp: CritCellVal,
    pub min_temp: CritCellVal,
    pub max_chip_temp: CritChipVal,

    // -- Control decisions (control loop) --
    pub current_state: StateId,
    pub fault_code_crit: u32,
    pub fault_code_noncrit: u32,
    /// One-way latch for the session; see [`note_charger_detected`](Self::note_charger_detected).
    pub is_charger_connected: bool,
    pub is_charging_enabled: bool,
    pub should_balance: bool,
    pub discharge_config: DischargeMatrix,
}

impl Default for PackSnapshot {
    fn default() -> Self {
        Self {
            chips: [ChipData::default(); NUM_CHIPS],
            pack_current: 0.0,
            cont_discharge_limit: 0.0,
            cont_charge_limit: 0.0,
            max_voltage: CritCellVal::default(),
            min_voltage: CritCellVal::default(),
            max_ocv: CritCellVal::default(),
            min_ocv: CritCellVal::default(),
            avg_ocv: 0.0,
            delta_ocv: 0.0,
            max_temp: CritCellVal::default(),
            min_temp: CritCellVal::default(),
            max_chip_temp: CritChipVal::default(),
            current_state: StateId::Boot,
            fault_code_crit: 0,
            fault_code_noncrit: 0,
            is_charger_connected: false,
            is_charging_enabled: false,
            should_balance: false,
            discharge_config: DischargeMatrix::default(),
        }
    }
}

impl PackSnapshot {
    /// Boot-time snapshot: no faults, BOOT state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Latch the charger as connected.  Nothing in the core ever clears
    /// it; only a power cycle does.
    pub fn note_charger_detected(&mut self) {
        self.is_charger_connected = true;
    }

    /// Single number for the fault LED / display: 1-based bit index of the
    /// lowest critical fault, else of the lowest non-critical fault, else 0.
    pub fn fault_display_code(&self) -> u8 {
        let lowest = |mask: u32| (mask.trailing_zeros() + 1) as u8;
        if self.fault_code_crit != 0 {
            lowest(self.fault_code_crit)
        } else if self.fault_code_noncrit != 0 {
            lowest(self.fault_code_noncrit)
        } else {
            0
        }
    }
}
