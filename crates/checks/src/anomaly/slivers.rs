//! Edge-sliver check
//!
//! Thin protrusions at the edge of coverage: a valid cell holding on to
//! the survey by at most two valid 8-neighbors, whose depth disagrees
//! with the surrounding seabed. The reference depth is the median of the
//! valid cells in the outer 5x5 ring, so the sliver's own partner cells
//! do not vote.

use ndarray::Array2;
use std::ops::Range;

/// Maximum valid 8-neighbors for a cell to count as a sliver tip
const MAX_ATTACHED: usize = 2;

pub(crate) fn scan(z: &Array2<f64>, interior: Range<usize>, height: f64) -> Vec<(usize, usize)> {
    let (rows, cols) = z.dim();
    let mut flags = Vec::new();
    let mut ring: Vec<f64> = Vec::with_capacity(16);

    for row in interior {
        for col in 0..cols {
            let zc = z[(row, col)];
            if !zc.is_finite() {
                continue;
            }

            let mut attached = 0usize;
            for dr in -1isize..=1 {
                for dc in -1isize..=1 {
                    if dr == 0 && dc == 0 {
                        continue;
                    }
                    let nr = row as isize + dr;
                    let nc = col as isize + dc;
                    if nr < 0 || nc < 0 || nr as usize >= rows || nc as usize >= cols {
                        continue;
                    }
                    if z[(nr as usize, nc as usize)].is_finite() {
                        attached += 1;
                    }
                }
            }
            if attached == 0 || attached > MAX_ATTACHED {
                continue;
            }

            // Outer 5x5 ring: |dr| == 2 or |dc| == 2
            ring.clear();
            for dr in -2isize..=2 {
                for dc in -2isize..=2 {
                    if dr.abs() != 2 && dc.abs() != 2 {
                        continue;
                    }
                    let nr = row as isize + dr;
                    let nc = col as isize + dc;
                    if nr < 0 || nc < 0 || nr as usize >= rows || nc as usize >= cols {
                        continue;
                    }
                    let v = z[(nr as usize, nc as usize)];
                    if v.is_finite() {
                        ring.push(v);
                    }
                }
            }
            if ring.is_empty() {
                continue;
            }

            ring.sort_by(|a, b| a.total_cmp(b));
            let n = ring.len();
            let median = if n % 2 == 1 {
                ring[n / 2]
            } else {
                0.5 * (ring[n / 2 - 1] + ring[n / 2])
            };

            if (zc - median).abs() > height {
                flags.push((row, col));
            }
        }
    }

    flags
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Coverage ends at column 5; a two-cell sliver sticks out at row 4
    fn seabed_with_sliver(tip_depth: f64) -> Array2<f64> {
        let mut z = Array2::from_elem((10, 10), f64::NAN);
        for r in 0..10 {
            for c in 0..5 {
                z[(r, c)] = -40.0;
            }
        }
        z[(4, 5)] = -40.0;
        z[(4, 6)] = tip_depth;
        z
    }

    #[test]
    fn test_shoal_sliver_tip_flagged() {
        let z = seabed_with_sliver(-37.0);
        let flags = scan(&z, 0..10, 1.0);
        assert_eq!(flags, vec![(4, 6)]);
    }

    #[test]
    fn test_conforming_sliver_spared() {
        let z = seabed_with_sliver(-40.1);
        assert!(scan(&z, 0..10, 1.0).is_empty());
    }

    #[test]
    fn test_interior_cells_not_slivers() {
        let z = Array2::from_elem((10, 10), -40.0);
        assert!(scan(&z, 0..10, 1.0).is_empty());
    }
}
