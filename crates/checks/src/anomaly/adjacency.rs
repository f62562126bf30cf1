//! Adjacent-cell consistency check
//!
//! Compares each cell against its valid 8-neighbors. A sounding that
//! disagrees with nearly all of its neighborhood by more than the flier
//! height is structurally inconsistent with the surrounding seabed.
//! Requires at least [`MIN_VALID`] valid neighbors so sparse coverage
//! does not produce spurious flags; the margin checks cover those cells.

use bathyqc_core::grid::Neighborhood;
use ndarray::Array2;
use rayon::prelude::*;
use std::ops::Range;

/// Minimum valid neighbors for the check to apply
const MIN_VALID: usize = 4;

/// Fraction of valid neighbors that must disagree
const DEVIANT_FRACTION: f64 = 0.8;

pub(crate) fn scan(z: &Array2<f64>, interior: Range<usize>, height: f64) -> Vec<(usize, usize)> {
    let (rows, cols) = z.dim();
    let offsets = Neighborhood::Queen3x3.offsets_no_center();

    interior
        .into_par_iter()
        .flat_map_iter(|row| {
            let mut row_flags = Vec::new();
            for col in 0..cols {
                let zc = z[(row, col)];
                if !zc.is_finite() {
                    continue;
                }

                let mut valid = 0usize;
                let mut deviant = 0usize;
                for &(dr, dc) in &offsets {
                    let nr = row as isize + dr;
                    let nc = col as isize + dc;
                    if nr < 0 || nc < 0 || nr as usize >= rows || nc as usize >= cols {
                        continue;
                    }
                    let zn = z[(nr as usize, nc as usize)];
                    if !zn.is_finite() {
                        continue;
                    }
                    valid += 1;
                    if (zn - zc).abs() > height {
                        deviant += 1;
                    }
                }

                if valid >= MIN_VALID && deviant as f64 >= DEVIANT_FRACTION * valid as f64 {
                    row_flags.push((row, col));
                }
            }
            row_flags
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_seabed() -> Array2<f64> {
        Array2::from_elem((10, 10), -30.0)
    }

    #[test]
    fn test_flat_seabed_clean() {
        let z = flat_seabed();
        assert!(scan(&z, 0..10, 1.0).is_empty());
    }

    #[test]
    fn test_outlier_flagged() {
        let mut z = flat_seabed();
        z[(4, 4)] = -25.0;

        let flags = scan(&z, 0..10, 1.0);
        assert_eq!(flags, vec![(4, 4)]);
    }

    #[test]
    fn test_neighbors_of_outlier_spared() {
        let mut z = flat_seabed();
        z[(4, 4)] = -25.0;

        let flags = scan(&z, 0..10, 1.0);
        assert!(!flags.contains(&(4, 5)));
        assert!(!flags.contains(&(3, 3)));
    }

    #[test]
    fn test_corner_outlier_flagged() {
        // Corner cells have exactly 3 valid neighbors: below MIN_VALID
        let mut z = flat_seabed();
        z[(0, 0)] = -25.0;
        assert!(scan(&z, 0..10, 1.0).is_empty());

        // An edge cell has 5: enough
        let mut z = flat_seabed();
        z[(0, 4)] = -25.0;
        assert_eq!(scan(&z, 0..10, 1.0), vec![(0, 4)]);
    }

    #[test]
    fn test_step_escarpment_not_flagged() {
        // A depth discontinuity (shoal edge) deviates on one side only
        let mut z = flat_seabed();
        for r in 0..10 {
            for c in 5..10 {
                z[(r, c)] = -20.0;
            }
        }
        assert!(scan(&z, 0..10, 1.0).is_empty());
    }
}
