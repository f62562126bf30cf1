//! Isolated-node check
//!
//! A valid sounding with no valid company in its 5x5 window is a lone
//! node detached from the survey coverage, almost always a blunder
//! (a bird, a wreck-avoidance ping, an unflagged outlier) rather than
//! seabed. No height threshold applies; isolation itself is the flag.

use bathyqc_core::grid::Neighborhood;
use ndarray::Array2;
use std::ops::Range;

pub(crate) fn scan(z: &Array2<f64>, interior: Range<usize>) -> Vec<(usize, usize)> {
    let (rows, cols) = z.dim();
    let offsets = Neighborhood::Queen5x5.offsets_no_center();
    let mut flags = Vec::new();

    for row in interior {
        for col in 0..cols {
            if !z[(row, col)].is_finite() {
                continue;
            }

            let mut company = false;
            for &(dr, dc) in &offsets {
                let nr = row as isize + dr;
                let nc = col as isize + dc;
                if nr < 0 || nc < 0 || nr as usize >= rows || nc as usize >= cols {
                    continue;
                }
                if z[(nr as usize, nc as usize)].is_finite() {
                    company = true;
                    break;
                }
            }

            if !company {
                flags.push((row, col));
            }
        }
    }

    flags
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lone_node_flagged() {
        let mut z = Array2::from_elem((11, 11), f64::NAN);
        z[(5, 5)] = -12.0;

        assert_eq!(scan(&z, 0..11), vec![(5, 5)]);
    }

    #[test]
    fn test_pair_within_window_spared() {
        let mut z = Array2::from_elem((11, 11), f64::NAN);
        z[(5, 5)] = -12.0;
        z[(5, 7)] = -12.1;

        assert!(scan(&z, 0..11).is_empty());
    }

    #[test]
    fn test_full_coverage_clean() {
        let z = Array2::from_elem((8, 8), -20.0);
        assert!(scan(&z, 0..8).is_empty());
    }
}
