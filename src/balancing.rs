//! Cell balancing selector.
//!
//! For each chip independently: rank the cells by open-circuit voltage
//! (highest first, ties by cell index), then walk at most
//! `max_per_chip` of them and command a discharge on every cell whose OCV
//! is above `min_ocv + fraction × delta_ocv`.  Every other cell on the chip
//! is explicitly commanded off, so nothing from the previous tick survives.
//!
//! Pure computation: it writes the matrix and nothing else.  Applying the
//! matrix to the monitor ICs is the segment driver's job.

use heapless::Vec;

use crate::config::{BmsConfig, NUM_CELLS_PER_CHIP};
use crate::pack::DischargeMatrix;

/// Tunables for the selector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BalanceParams {
    /// Fraction of the OCV spread above the pack minimum to leave alone.
    pub threshold_fraction: f32,
    /// Most cells discharged at once on one chip.
    pub max_per_chip: usize,
}

impl BalanceParams {
    pub fn from_config(config: &BmsConfig) -> Self {
        Self {
            threshold_fraction: config.balance_threshold_fraction,
            max_per_chip: config.max_balance_per_chip,
        }
    }

    /// OCV a cell must exceed to be discharged.
    pub fn threshold(&self, min_ocv: f32, delta_ocv: f32) -> f32 {
        min_ocv + self.threshold_fraction * delta_ocv
    }
}

/// Cell indices of one chip ordered by OCV, highest first.  Equal
/// voltages keep ascending index order.
pub fn rank_cells(ocv: &[f32]) -> Vec<usize, NUM_CELLS_PER_CHIP> {
    let mut order: Vec<usize, NUM_CELLS_PER_CHIP> =
        (0..ocv.len().min(NUM_CELLS_PER_CHIP)).collect();
    // `sort_by` is stable, so ties stay in index order.
    order.sort_by(|&a, &b| ocv[b].total_cmp(&ocv[a]));
    order
}

/// Fill `out` (one flag per cell) for a single chip.  Cells past
/// `ocv.len()` are cleared as well.
pub fn select_chip(
    ocv: &[f32],
    min_ocv: f32,
    delta_ocv: f32,
    params: &BalanceParams,
    out: &mut [bool],
) {
    out.iter_mut().for_each(|flag| *flag = false);

    let threshold = params.threshold(min_ocv, delta_ocv);
    let ranked = rank_cells(ocv);
    let limit = ranked.len().min(params.max_per_chip);

    for &cell in &ranked[..limit] {
        if let Some(flag) = out.get_mut(cell) {
            *flag = ocv[cell] > threshold;
        }
    }
}

/// Run the selector over every chip and overwrite `matrix`.
pub fn balance_pack<'a>(
    chip_ocvs: impl IntoIterator<Item = &'a [f32]>,
    min_ocv: f32,
    delta_ocv: f32,
    params: &BalanceParams,
    matrix: &mut DischargeMatrix,
) {
    matrix.clear();
    for (chip, ocv) in chip_ocvs.into_iter().enumerate().take(matrix.0.len()) {
        select_chip(ocv, min_ocv, delta_ocv, params, matrix.chip_mut(chip));
    }
}
