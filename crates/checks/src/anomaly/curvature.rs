//! Gaussian curvature check
//!
//! Second-order partials estimated from the 3x3 window (Zevenbergen &
//! Thorne 1987):
//!
//! ```text
//! z1 z2 z3      p = dz/dx   = (z6 - z4) / (2*cs)
//! z4 z5 z6      q = dz/dy   = (z2 - z8) / (2*cs)
//! z7 z8 z9      r = d2z/dx2 = (z4 - 2*z5 + z6) / cs^2
//!               s = d2z/dxdy = (z3 - z1 - z9 + z7) / (4*cs^2)
//!               t = d2z/dy2 = (z2 - 2*z5 + z8) / cs^2
//! ```
//!
//! Gaussian curvature `K = (r*t - s^2) / (1 + p^2 + q^2)^2` is zero on
//! planes and cylinders and spikes hard on point anomalies: an isolated
//! spike of amplitude `h` responds with `|K| ~= 4*h^2 / cs^4`. Cells are
//! flagged at half that response for `h = height`.

use ndarray::Array2;
use rayon::prelude::*;
use std::ops::Range;

use bathyqc_core::error::Result;
use bathyqc_core::grid::Grid;

/// Gaussian curvature of the window centered at (row, col), or `None`
/// when the window is incomplete.
pub(crate) fn window(z: &Array2<f64>, row: usize, col: usize, cs: f64) -> Option<f64> {
    let (rows, cols) = z.dim();
    if row == 0 || col == 0 || row + 1 >= rows || col + 1 >= cols {
        return None;
    }

    let z1 = z[(row - 1, col - 1)];
    let z2 = z[(row - 1, col)];
    let z3 = z[(row - 1, col + 1)];
    let z4 = z[(row, col - 1)];
    let z5 = z[(row, col)];
    let z6 = z[(row, col + 1)];
    let z7 = z[(row + 1, col - 1)];
    let z8 = z[(row + 1, col)];
    let z9 = z[(row + 1, col + 1)];

    if [z1, z2, z3, z4, z5, z6, z7, z8, z9]
        .iter()
        .any(|v| !v.is_finite())
    {
        return None;
    }

    let cs2 = cs * cs;
    let p = (z6 - z4) / (2.0 * cs);
    let q = (z2 - z8) / (2.0 * cs);
    let r = (z4 - 2.0 * z5 + z6) / cs2;
    let s = (z3 - z1 - z9 + z7) / (4.0 * cs2);
    let t = (z2 - 2.0 * z5 + z8) / cs2;

    let norm = 1.0 + p * p + q * q;
    Some((r * t - s * s) / (norm * norm))
}

pub(crate) fn scan(
    z: &Array2<f64>,
    interior: Range<usize>,
    height: f64,
    cs: f64,
) -> Vec<(usize, usize)> {
    let cols = z.ncols();
    let threshold = 2.0 * (height / (cs * cs)).powi(2);

    interior
        .into_par_iter()
        .flat_map_iter(|row| {
            let mut row_flags = Vec::new();
            for col in 0..cols {
                if let Some(k) = window(z, row, col, cs) {
                    if k.abs() >= threshold {
                        row_flags.push((row, col));
                    }
                }
            }
            row_flags
        })
        .collect()
}

/// Fill `out` with curvature values for the tile's interior rows
/// (debug export).
pub(crate) fn raster_into(
    z: &Array2<f64>,
    interior: Range<usize>,
    row_offset: usize,
    cs: f64,
    out: &mut Grid<f64>,
) -> Result<()> {
    let cols = z.ncols();

    for row in interior {
        for col in 0..cols {
            if let Some(k) = window(z, row, col, cs) {
                out.set(row_offset + row, col, k)?;
            }
        }
    }

    Ok(())
}
