//! H3 cells touched by a change
//!
//! The ring radius in cells is `ceil(radius_km / average_edge_km(res))`. This
//! is a coarse heuristic: hexagon edge lengths vary with latitude and the
//! distance between cell centres is about sqrt(3) edges, so the ring covers
//! somewhat more ground than `radius_km`. It is not geodesically exact.

use h3o::{CellIndex, LatLng, Resolution};
use hexreach_common::{Error, Result};
use rustc_hash::FxHashSet;

/// Average hexagon edge length in km per resolution 0..=15
pub const EDGE_LENGTH_KM: [f64; 16] = [
    1281.256011,
    483.0568391,
    182.5129565,
    68.97922179,
    26.07175968,
    9.854090990,
    3.724532667,
    1.406475763,
    0.531414010,
    0.200786148,
    0.075863783,
    0.028663897,
    0.010830188,
    0.004092010,
    0.001546100,
    0.000584169,
];

/// Disks larger than this many rings are refused (~750k cells)
pub const MAX_RING_K: u32 = 500;

pub fn resolution(res: u8) -> Result<Resolution> {
    Resolution::try_from(res).map_err(|e| Error::Config(format!("resolution {res}: {e}")))
}

/// Grid distance covering `radius_km` at `res`
pub fn ring_k(radius_km: f64, res: u8) -> Result<u32> {
    let edge = EDGE_LENGTH_KM
        .get(res as usize)
        .ok_or_else(|| Error::Config(format!("resolution {res} outside 0..=15")))?;
    let k = (radius_km / edge).ceil();
    if !k.is_finite() || k < 0.0 || k > MAX_RING_K as f64 {
        return Err(Error::Config(format!(
            "ring of {radius_km} km at resolution {res} needs {k} rings, limit is {MAX_RING_K}"
        )));
    }
    Ok(k as u32)
}

/// Cell containing (lat, lon) at `res`
pub fn cell_at(lat: f64, lon: f64, res: Resolution) -> Result<CellIndex> {
    let ll = LatLng::new(lat, lon)
        .map_err(|e| Error::InvalidInput(format!("coordinate ({lat}, {lon}): {e}")))?;
    Ok(ll.to_cell(res))
}

/// Cells within the ring around (lat, lon)
pub fn affected_cells(lat: f64, lon: f64, res: u8, radius_km: f64) -> Result<FxHashSet<u64>> {
    let k = ring_k(radius_km, res)?;
    let center = cell_at(lat, lon, resolution(res)?)?;
    let disk: Vec<CellIndex> = center.grid_disk(k);
    Ok(disk.into_iter().map(u64::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_k() {
        assert_eq!(ring_k(0.0, 9).unwrap(), 0);
        // 2 km / 0.2008 km
        assert_eq!(ring_k(2.0, 9).unwrap(), 10);
        assert_eq!(ring_k(2.0, 7).unwrap(), 2);
        assert_eq!(ring_k(1.406475763, 7).unwrap(), 1);
        assert!(ring_k(2.0, 16).is_err());
        assert!(ring_k(100.0, 15).is_err());
    }

    #[test]
    fn test_affected_cells_counts() {
        // a k-ring away from pentagons holds 3k(k+1)+1 cells
        let cells = affected_cells(37.7749, -122.4194, 9, 0.0).unwrap();
        assert_eq!(cells.len(), 1);
        let cells = affected_cells(37.7749, -122.4194, 9, 0.4).unwrap();
        assert_eq!(cells.len(), 19);
    }

    #[test]
    fn test_center_cell_included() {
        let res = resolution(8).unwrap();
        let center = u64::from(cell_at(48.8566, 2.3522, res).unwrap());
        let cells = affected_cells(48.8566, 2.3522, 8, 1.0).unwrap();
        assert!(cells.contains(&center));
    }

    #[test]
    fn test_invalid_coordinate() {
        assert!(cell_at(f64::NAN, 0.0, resolution(5).unwrap()).is_err());
    }
}
