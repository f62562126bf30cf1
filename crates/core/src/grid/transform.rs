//! Affine georeferencing for survey grids

use serde::{Deserialize, Serialize};

/// Affine transformation between cell coordinates (col, row) and projected
/// coordinates (x, y).
///
/// ```text
/// x = origin_x + col * cell_width
/// y = origin_y + row * cell_height
/// ```
///
/// Survey grids are north-up, so `cell_height` is negative and no rotation
/// terms are carried.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridTransform {
    /// X coordinate of the upper-left corner
    pub origin_x: f64,
    /// Y coordinate of the upper-left corner
    pub origin_y: f64,
    /// Cell size in X direction
    pub cell_width: f64,
    /// Cell size in Y direction (negative for north-up grids)
    pub cell_height: f64,
}

impl GridTransform {
    pub fn new(origin_x: f64, origin_y: f64, cell_width: f64, cell_height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            cell_width,
            cell_height,
        }
    }

    /// Convert cell coordinates to projected coordinates (cell center)
    pub fn cell_to_geo(&self, col: usize, row: usize) -> (f64, f64) {
        let x = self.origin_x + (col as f64 + 0.5) * self.cell_width;
        let y = self.origin_y + (row as f64 + 0.5) * self.cell_height;
        (x, y)
    }

    /// Convert projected coordinates to fractional cell coordinates
    ///
    /// Returns (col, row); use `.floor()` for integer indices.
    pub fn geo_to_cell(&self, x: f64, y: f64) -> (f64, f64) {
        let col = (x - self.origin_x) / self.cell_width - 0.5;
        let row = (y - self.origin_y) / self.cell_height - 0.5;
        (col, row)
    }

    /// Cell size in projected units (assumes square cells)
    pub fn cell_size(&self) -> f64 {
        self.cell_width.abs()
    }

    /// Bounding box (min_x, min_y, max_x, max_y) for a grid of given shape
    pub fn bounds(&self, cols: usize, rows: usize) -> (f64, f64, f64, f64) {
        let x0 = self.origin_x;
        let x1 = self.origin_x + cols as f64 * self.cell_width;
        let y0 = self.origin_y;
        let y1 = self.origin_y + rows as f64 * self.cell_height;
        (x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1))
    }
}

impl Default for GridTransform {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0, -1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_cell_to_geo_roundtrip() {
        let gt = GridTransform::new(100.0, 200.0, 10.0, -10.0);

        let (x, y) = gt.cell_to_geo(5, 10);
        let (col, row) = gt.geo_to_cell(x, y);

        assert_relative_eq!(col, 5.0, epsilon = 1e-10);
        assert_relative_eq!(row, 10.0, epsilon = 1e-10);
    }

    #[test]
    fn test_bounds() {
        let gt = GridTransform::new(0.0, 100.0, 1.0, -1.0);
        let (min_x, min_y, max_x, max_y) = gt.bounds(100, 100);

        assert_relative_eq!(min_x, 0.0, epsilon = 1e-10);
        assert_relative_eq!(min_y, 0.0, epsilon = 1e-10);
        assert_relative_eq!(max_x, 100.0, epsilon = 1e-10);
        assert_relative_eq!(max_y, 100.0, epsilon = 1e-10);
    }
}
