//! Tiled access to survey grid datasets
//!
//! A [`GridSource`] opens a grid file and serves it as a sequence of
//! row-band [`Tile`]s. Tiles carry a fixed halo of overlap rows so that
//! windowed operators stay exact across tile seams; flags must only be
//! emitted for a tile's interior rows.

mod geotiff;

pub use geotiff::{probe_layer_names, write_grid, write_layers, GeoTiffSource};

use crate::error::Result;
use crate::grid::{Grid, GridTransform};
use ndarray::Array2;
use std::collections::BTreeMap;
use std::ops::Range;
use std::path::Path;

/// Elevation layer name (meters, negative down)
pub const LAYER_ELEVATION: &str = "elevation";
/// Uncertainty layer name (meters, 1-sigma vertical)
pub const LAYER_UNCERTAINTY: &str = "uncertainty";
/// Designated-sounding layer name (nonzero where a cell carries a
/// hydrographer-flagged representative sounding)
pub const LAYER_DESIGNATED: &str = "designated";

/// Overlap rows served above and below each tile's interior
pub const TILE_HALO: usize = 2;

/// One row-band of a grid dataset.
///
/// Stored rows span `row_offset .. row_offset + nrows` in global
/// coordinates; `interior` names the global rows owned by this tile.
/// Halo rows exist only so 3x3 and 5x5 windows centered on interior
/// rows see real data.
#[derive(Debug, Clone)]
pub struct Tile {
    row_offset: usize,
    interior: Range<usize>,
    layers: BTreeMap<String, Array2<f64>>,
}

impl Tile {
    pub(crate) fn new(
        row_offset: usize,
        interior: Range<usize>,
        layers: BTreeMap<String, Array2<f64>>,
    ) -> Self {
        Self {
            row_offset,
            interior,
            layers,
        }
    }

    /// Global row index of the first stored row (halo included)
    pub fn row_offset(&self) -> usize {
        self.row_offset
    }

    /// Global rows owned by this tile
    pub fn interior(&self) -> Range<usize> {
        self.interior.clone()
    }

    /// Tile-local row range corresponding to [`Tile::interior`]
    pub fn interior_local(&self) -> Range<usize> {
        self.interior.start - self.row_offset..self.interior.end - self.row_offset
    }

    /// Access a layer band; nodata is normalized to NaN at read time
    pub fn layer(&self, name: &str) -> Option<&Array2<f64>> {
        self.layers.get(name)
    }

    /// Stored shape (rows including halo, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.layers
            .values()
            .next()
            .map(|a| a.dim())
            .unwrap_or((0, 0))
    }
}

/// Abstraction over a tiled grid dataset (BAG/CSAR-style multi-layer file).
pub trait GridSource {
    /// Open a dataset for sequential tile reading
    fn open_to_read(path: &Path, chunk_size: usize) -> Result<Self>
    where
        Self: Sized;

    /// Path of the backing file
    fn path(&self) -> &Path;

    /// Names of the available layers, in band order
    fn layer_names(&self) -> &[String];

    /// Full dataset shape as (rows, cols)
    fn shape(&self) -> (usize, usize);

    /// Georeferencing transform
    fn transform(&self) -> &GridTransform;

    /// Geographic bounds (min_x, min_y, max_x, max_y)
    fn bbox(&self) -> (f64, f64, f64, f64);

    /// Number of tiles a full pass will serve
    fn tile_count(&self) -> usize;

    /// Serve the next tile restricted to the requested layers, or `None`
    /// once the pass is complete. Unknown layer names are an error.
    fn read_next_tile(&mut self, layers: &[&str]) -> Result<Option<Tile>>;

    /// Rewind the tile cursor so another pass can be made
    fn reset(&mut self);

    /// Whether the dataset carries the named layer
    fn has_layer(&self, name: &str) -> bool {
        self.layer_names().iter().any(|n| n == name)
    }

    /// Assemble one full layer into an in-memory [`Grid`], leaving the
    /// tile cursor rewound
    fn read_layer(&mut self, name: &str) -> Result<Grid<f64>> {
        let (rows, cols) = self.shape();
        let mut grid = Grid::filled(rows, cols, f64::NAN);
        grid.set_transform(*self.transform());
        grid.set_nodata(Some(f64::NAN));

        self.reset();
        while let Some(tile) = self.read_next_tile(&[name])? {
            let band = tile
                .layer(name)
                .ok_or_else(|| crate::error::Error::UnknownLayer(name.to_string()))?;
            let row_offset = tile.row_offset();
            for row in tile.interior_local() {
                for col in 0..cols {
                    grid.set(row_offset + row, col, band[(row, col)])?;
                }
            }
        }
        self.reset();

        Ok(grid)
    }
}
