//! Laplacian operator check
//!
//! Discrete 4-neighbor Laplacian on the elevation band:
//!
//! ```text
//! lap = z_n + z_s + z_e + z_w - 4*z_c
//! ```
//!
//! A single-cell spike of amplitude `h` on locally planar terrain yields
//! `|lap| = 4h`, while planar and uniformly sloped seabeds yield zero, so
//! cells are flagged when `|lap| >= 4*height`. The center must also be a
//! strict extremum of its rook window, which keeps the rook neighbors of
//! a large spike (whose own Laplacian response exceeds the threshold)
//! from being dragged in.

use ndarray::Array2;
use std::ops::Range;

pub(crate) fn scan(z: &Array2<f64>, interior: Range<usize>, height: f64) -> Vec<(usize, usize)> {
    let (rows, cols) = z.dim();
    let threshold = 4.0 * height;
    let mut flags = Vec::new();

    for row in interior {
        if row == 0 || row + 1 >= rows {
            continue;
        }
        for col in 1..cols.saturating_sub(1) {
            let zc = z[(row, col)];
            if !zc.is_finite() {
                continue;
            }

            let zn = z[(row - 1, col)];
            let zs = z[(row + 1, col)];
            let zw = z[(row, col - 1)];
            let ze = z[(row, col + 1)];
            if !(zn.is_finite() && zs.is_finite() && zw.is_finite() && ze.is_finite()) {
                continue;
            }

            let lap = zn + zs + ze + zw - 4.0 * zc;
            if lap.abs() < threshold {
                continue;
            }

            let max = zn.max(zs).max(ze).max(zw);
            let min = zn.min(zs).min(ze).min(zw);
            if zc > max || zc < min {
                flags.push((row, col));
            }
        }
    }

    flags
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Tilted plane z = -(row + col) * 0.5, zero Laplacian everywhere
    fn tilted_plane() -> Array2<f64> {
        Array2::from_shape_fn((10, 10), |(r, c)| -0.5 * (r + c) as f64)
    }

    #[test]
    fn test_plane_is_clean() {
        let z = tilted_plane();
        assert!(scan(&z, 0..10, 0.5).is_empty());
    }

    #[test]
    fn test_spike_flagged_neighbors_spared() {
        let mut z = tilted_plane();
        z[(5, 5)] += 3.0;

        let flags = scan(&z, 0..10, 0.5);
        assert_eq!(flags, vec![(5, 5)]);
    }

    #[test]
    fn test_deep_flier_flagged() {
        let mut z = tilted_plane();
        z[(4, 6)] -= 5.0;

        let flags = scan(&z, 0..10, 1.0);
        assert_eq!(flags, vec![(4, 6)]);
    }

    #[test]
    fn test_spike_below_threshold_ignored() {
        let mut z = tilted_plane();
        z[(5, 5)] += 0.4;

        assert!(scan(&z, 0..10, 0.5).is_empty());
    }

    #[test]
    fn test_nodata_neighbor_skipped() {
        let mut z = tilted_plane();
        z[(5, 4)] = f64::NAN;
        z[(5, 5)] += 3.0;

        assert!(scan(&z, 0..10, 0.5).is_empty());
    }

    #[test]
    fn test_interior_restricts_rows() {
        let mut z = tilted_plane();
        z[(2, 5)] += 3.0;
        z[(7, 5)] += 3.0;

        let flags = scan(&z, 5..10, 0.5);
        assert_eq!(flags, vec![(7, 5)]);
    }
}
