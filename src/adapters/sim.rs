//! Synthetic analytics for host runs.
//!
//! Stands in for the segment driver and analyzer: evolves per-cell OCV,
//! temperatures and pack current, writes them into the snapshot, then
//! recomputes the pack-wide extremes the control core reads.  It only
//! reads the control-decision fields (charging enable, discharge matrix)
//! to make the simulated pack react to them.

use serde::{Deserialize, Serialize};

use crate::config::{NUM_CELLS, NUM_CELLS_PER_CHIP, NUM_CHIPS};
use crate::pack::{CritCellVal, CritChipVal, PackSnapshot};
use crate::timer::Millis;

/// Scenario knobs for the simulated pack.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimProfile {
    /// Mean starting OCV (V).
    pub base_ocv: f32,
    /// Peak-to-peak starting imbalance across the pack (V).
    pub spread: f32,
    /// Discharge current while off the charger (A).
    pub drive_current: f32,
    /// Cell temperature (°C).
    pub cell_temp_c: f32,
    /// When the charger shows up, if ever.
    pub charger_at_ms: Option<Millis>,
    /// OCV gained per second while charging (V/s).
    pub charge_rate: f32,
    /// OCV lost per second by a bleeding cell (V/s).
    pub bleed_rate: f32,
    pub cont_discharge_limit: f32,
    pub cont_charge_limit: f32,
}

impl Default for SimProfile {
    fn default() -> Self {
        Self {
            base_ocv: 4.02,
            spread: 0.08,
            drive_current: 0.0,
            cell_temp_c: 28.0,
            charger_at_ms: Some(2_000),
            charge_rate: 0.000_5,
            bleed_rate: 0.000_3,
            cont_discharge_limit: 200.0,
            cont_charge_limit: 40.0,
        }
    }
}

/// Evolving synthetic pack.
#[derive(Debug, Clone)]
pub struct PackSimulator {
    profile: SimProfile,
    ocv: [[f32; NUM_CELLS_PER_CHIP]; NUM_CHIPS],
    last_ms: Option<Millis>,
    charger_reported: bool,
}

impl PackSimulator {
    pub fn new(profile: SimProfile) -> Self {
        // Deterministic imbalance: a sawtooth over the whole pack.
        let ocv = core::array::from_fn(|chip| {
            core::array::from_fn(|cell| {
                let i = (chip * NUM_CELLS_PER_CHIP + cell) as f32;
                let phase = (i * 7.0) % NUM_CELLS as f32 / NUM_CELLS as f32;
                profile.base_ocv + profile.spread * (phase - 0.5)
            })
        });
        Self {
            profile,
            ocv,
            last_ms: None,
            charger_reported: false,
        }
    }

    pub fn profile(&self) -> &SimProfile {
        &self.profile
    }

    /// Whether the charger is plugged in at `now`.
    pub fn charger_present(&self, now: Millis) -> bool {
        self.profile.charger_at_ms.is_some_and(|at| now >= at)
    }

    /// True exactly once, the first time the charger is seen.
    pub fn take_charger_arrival(&mut self, now: Millis) -> bool {
        if !self.charger_reported && self.charger_present(now) {
            self.charger_reported = true;
            return true;
        }
        false
    }

    /// Advance to `now` and publish into `pack`.
    pub fn update(&mut self, pack: &mut PackSnapshot, now: Millis) {
        let dt_s = self
            .last_ms
            .map_or(0.0, |last| now.saturating_sub(last) as f32 / 1000.0);
        self.last_ms = Some(now);

        let charging = pack.is_charging_enabled && self.charger_present(now);
        for (chip, cells) in self.ocv.iter_mut().enumerate() {
            for (cell, v) in cells.iter_mut().enumerate() {
                if charging {
                    *v += self.profile.charge_rate * dt_s;
                }
                if pack.discharge_config.chip(chip)[cell] {
                    *v -= self.profile.bleed_rate * dt_s;
                }
            }
        }

        pack.pack_current = if charging {
            -3.5
        } else if self.charger_present(now) {
            0.0
        } else {
            self.profile.drive_current
        };
        pack.cont_discharge_limit = self.profile.cont_discharge_limit;
        pack.cont_charge_limit = self.profile.cont_charge_limit;

        for (chip, data) in pack.chips.iter_mut().enumerate() {
            data.open_cell_voltage = self.ocv[chip];
            for cell in 0..NUM_CELLS_PER_CHIP {
                data.cell_resistance[cell] = 0.012;
                // Terminal voltage sags under discharge, rises under charge.
                data.cell_voltage[cell] =
                    self.ocv[chip][cell] - pack.pack_current * data.cell_resistance[cell];
                data.cell_temp[cell] = self.profile.cell_temp_c + cell as f32 * 0.1;
            }
            data.die_temp = self.profile.cell_temp_c + 8.0;
        }

        derive_stats(pack);
    }
}

/// Recompute pack-wide extremes and averages from the per-chip data.
pub fn derive_stats(pack: &mut PackSnapshot) {
    let mut max_v = CritCellVal::new(f32::MIN, 0, 0);
    let mut min_v = CritCellVal::new(f32::MAX, 0, 0);
    let mut max_ocv = CritCellVal::new(f32::MIN, 0, 0);
    let mut min_ocv = CritCellVal::new(f32::MAX, 0, 0);
    let mut max_t = CritCellVal::new(f32::MIN, 0, 0);
    let mut min_t = CritCellVal::new(f32::MAX, 0, 0);
    let mut max_chip = CritChipVal::default();
    let mut total_ocv = 0.0f32;

    for (c, chip) in pack.chips.iter().enumerate() {
        let c8 = c as u8;
        for cell in 0..NUM_CELLS_PER_CHIP {
            let n = cell as u8;
            let v = chip.cell_voltage[cell];
            let ocv = chip.open_cell_voltage[cell];
            let t = chip.cell_temp[cell];
            if v > max_v.val {
                max_v = CritCellVal::new(v, c8, n);
            }
            if v < min_v.val {
                min_v = CritCellVal::new(v, c8, n);
            }
            if ocv > max_ocv.val {
                max_ocv = CritCellVal::new(ocv, c8, n);
            }
            if ocv < min_ocv.val {
                min_ocv = CritCellVal::new(ocv, c8, n);
            }
            if t > max_t.val {
                max_t = CritCellVal::new(t, c8, n);
            }
            if t < min_t.val {
                min_t = CritCellVal::new(t, c8, n);
            }
            total_ocv += ocv;
        }
        if chip.die_temp > max_chip.val {
            max_chip = CritChipVal {
                val: chip.die_temp,
                chip: c8,
            };
        }
    }

    pack.max_voltage = max_v;
    pack.min_voltage = min_v;
    pack.max_ocv = max_ocv;
    pack.min_ocv = min_ocv;
    pack.max_temp = max_t;
    pack.min_temp = min_t;
    pack.max_chip_temp = max_chip;
    pack.avg_ocv = total_ocv / NUM_CELLS as f32;
    pack.delta_ocv = max_ocv.val - min_ocv.val;
}
