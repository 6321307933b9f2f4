//! Minute values and the add/move merge rule

use hexreach_common::Result;

use crate::formats::MinutesMatrix;

/// Whole minutes, rounded up, saturating at `u16::MAX`
pub fn secs_to_minutes(secs: u32) -> u16 {
    u16::try_from(secs.div_ceil(60)).unwrap_or(u16::MAX)
}

/// A new site can only bring a cell closer: keep the smaller value
pub fn merge_min(old: Option<u16>, new: u16) -> u16 {
    old.map_or(new, |old| old.min(new))
}

/// Merge `(cell, minutes)` into `brand`'s column, returning how many cells changed
///
/// Cells missing from the matrix are appended; no row is ever removed.
pub fn apply_min(
    matrix: &mut MinutesMatrix,
    brand: &str,
    values: &[(u64, u16)],
) -> Result<usize> {
    let column = matrix.column_index(brand)?;
    let mut changed = 0;
    for &(cell, minutes) in values {
        let row = matrix.row_index(cell);
        let slot = matrix.value_mut(column, row);
        let merged = merge_min(*slot, minutes);
        if *slot != Some(merged) {
            *slot = Some(merged);
            changed += 1;
        }
    }
    Ok(changed)
}
