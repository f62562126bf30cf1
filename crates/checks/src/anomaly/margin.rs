//! Noisy coverage-margin check
//!
//! The outermost swath of a survey carries the worst geometry (outer
//! beams, turns) and shows it as jitter right at the coverage edge.
//! A cell adjacent to nodata is flagged when it is the strict extremum
//! of its valid 3x3 window and the window's range exceeds twice the
//! flier height; interior cells never qualify.

use ndarray::Array2;
use std::ops::Range;

pub(crate) fn scan(z: &Array2<f64>, interior: Range<usize>, height: f64) -> Vec<(usize, usize)> {
    let (rows, cols) = z.dim();
    let threshold = 2.0 * height;
    let mut flags = Vec::new();

    for row in interior {
        for col in 0..cols {
            let zc = z[(row, col)];
            if !zc.is_finite() {
                continue;
            }

            let mut on_margin = false;
            let mut min = zc;
            let mut max = zc;
            let mut neighbor_min = f64::INFINITY;
            let mut neighbor_max = f64::NEG_INFINITY;

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
                    let v = z[(nr as usize, nc as usize)];
                    if v.is_finite() {
                        min = min.min(v);
                        max = max.max(v);
                        neighbor_min = neighbor_min.min(v);
                        neighbor_max = neighbor_max.max(v);
                    } else {
                        on_margin = true;
                    }
                }
            }

            if !on_margin || neighbor_min > neighbor_max {
                continue;
            }

            let extremum = zc > neighbor_max || zc < neighbor_min;
            if extremum && max - min > threshold {
                flags.push((row, col));
            }
        }
    }

    flags
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Smooth seabed covering the left half of the grid
    fn half_coverage() -> Array2<f64> {
        let mut z = Array2::from_elem((10, 10), f64::NAN);
        for r in 0..10 {
            for c in 0..5 {
                z[(r, c)] = -25.0 - 0.05 * r as f64;
            }
        }
        z
    }

    #[test]
    fn test_smooth_margin_clean() {
        let z = half_coverage();
        assert!(scan(&z, 0..10, 0.5).is_empty());
    }

    #[test]
    fn test_jittery_margin_cell_flagged() {
        let mut z = half_coverage();
        z[(5, 4)] = -23.0;

        let flags = scan(&z, 0..10, 0.5);
        assert_eq!(flags, vec![(5, 4)]);
    }

    #[test]
    fn test_interior_jitter_left_to_other_checks() {
        let mut z = half_coverage();
        z[(5, 2)] = -23.0;

        assert!(scan(&z, 0..10, 0.5).is_empty());
    }
}
