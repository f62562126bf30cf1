//! Coverage hole ("holiday") finder
//!
//! A holiday is an uncovered area inside a grid's nominal coverage
//! footprint: a connected region of nodata cells that does not reach
//! the grid border. Regions are grown by breadth-first flood fill over
//! 4-connected nodata cells, classified by size, and reported largest
//! first.

use bathyqc_core::error::{Error, Result};
use bathyqc_core::source::{GridSource, LAYER_ELEVATION};
use ndarray::Array2;
use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Parameters for the hole finder
#[derive(Debug, Clone)]
pub struct HoleParams {
    /// Smallest gap, in cells, worth reporting
    pub min_size: usize,
    /// Upper bound for reporting, in cells (none = unbounded); gaps
    /// larger than this are survey-scale and usually intentional
    pub max_size: Option<usize>,
}

impl Default for HoleParams {
    fn default() -> Self {
        Self {
            min_size: 1,
            max_size: None,
        }
    }
}

/// One coverage gap
#[derive(Debug, Clone, PartialEq)]
pub struct Hole {
    /// Number of uncovered cells
    pub cells: usize,
    /// Row/column extent (inclusive)
    pub min_row: usize,
    pub max_row: usize,
    pub min_col: usize,
    pub max_col: usize,
    /// Projected centroid of the gap
    pub centroid: (f64, f64),
}

const ROOK: [(isize, isize); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

/// Find coverage holidays in a grid.
///
/// Streams all tiles to build the validity mask, then flood-fills
/// nodata regions. Regions touching the grid border are open water,
/// not holidays.
pub fn find_holes<S: GridSource>(src: &mut S, params: &HoleParams) -> Result<Vec<Hole>> {
    let (rows, cols) = src.shape();
    if rows == 0 || cols == 0 {
        return Err(Error::InvalidDimensions { rows, cols });
    }

    let mut valid = Array2::from_elem((rows, cols), false);
    src.reset();
    while let Some(tile) = src.read_next_tile(&[LAYER_ELEVATION])? {
        let z = tile
            .layer(LAYER_ELEVATION)
            .ok_or_else(|| Error::UnknownLayer(LAYER_ELEVATION.into()))?;
        let row_offset = tile.row_offset();
        for row in tile.interior_local() {
            for col in 0..cols {
                if z[(row, col)].is_finite() {
                    valid[(row_offset + row, col)] = true;
                }
            }
        }
    }
    src.reset();

    let transform = *src.transform();
    let mut visited = Array2::from_elem((rows, cols), false);
    let mut holes = Vec::new();
    let mut queue = VecDeque::new();

    for start_row in 0..rows {
        for start_col in 0..cols {
            if valid[(start_row, start_col)] || visited[(start_row, start_col)] {
                continue;
            }

            // Grow one nodata region
            visited[(start_row, start_col)] = true;
            queue.push_back((start_row, start_col));

            let mut cells = 0usize;
            let mut touches_border = false;
            let mut min_row = start_row;
            let mut max_row = start_row;
            let mut min_col = start_col;
            let mut max_col = start_col;
            let mut sum_row = 0f64;
            let mut sum_col = 0f64;

            while let Some((row, col)) = queue.pop_front() {
                cells += 1;
                sum_row += row as f64;
                sum_col += col as f64;
                min_row = min_row.min(row);
                max_row = max_row.max(row);
                min_col = min_col.min(col);
                max_col = max_col.max(col);

                if row == 0 || row == rows - 1 || col == 0 || col == cols - 1 {
                    touches_border = true;
                }

                for (dr, dc) in ROOK {
                    let nr = row as isize + dr;
                    let nc = col as isize + dc;
                    if nr < 0 || nc < 0 || nr as usize >= rows || nc as usize >= cols {
                        continue;
                    }
                    let (nr, nc) = (nr as usize, nc as usize);
                    if !valid[(nr, nc)] && !visited[(nr, nc)] {
                        visited[(nr, nc)] = true;
                        queue.push_back((nr, nc));
                    }
                }
            }

            if touches_border || cells < params.min_size {
                continue;
            }
            if let Some(max) = params.max_size {
                if cells > max {
                    continue;
                }
            }

            let centroid_cell = (sum_col / cells as f64, sum_row / cells as f64);
            let centroid = (
                transform.origin_x + (centroid_cell.0 + 0.5) * transform.cell_width,
                transform.origin_y + (centroid_cell.1 + 0.5) * transform.cell_height,
            );

            holes.push(Hole {
                cells,
                min_row,
                max_row,
                min_col,
                max_col,
                centroid,
            });
        }
    }

    holes.sort_by(|a, b| b.cells.cmp(&a.cells));
    Ok(holes)
}

/// Export holes as CSV (`cells,min_row,max_row,min_col,max_col,x,y`);
/// returns the written path.
pub fn save_holes(holes: &[Hole], dir: &Path, stem: &str) -> Result<PathBuf> {
    let path = dir.join(format!("{stem}_holidays.csv"));
    let mut writer = BufWriter::new(File::create(&path)?);

    writeln!(writer, "cells,min_row,max_row,min_col,max_col,x,y")?;
    for h in holes {
        writeln!(
            writer,
            "{},{},{},{},{},{:.3},{:.3}",
            h.cells, h.min_row, h.max_row, h.min_col, h.max_col, h.centroid.0, h.centroid.1
        )?;
    }
    writer.flush()?;
    Ok(path)
}
