//! Flier / anomaly detection over tiled survey grids
//!
//! Six independent structural checks classify spurious soundings in an
//! elevation grid: a Laplacian operator, Gaussian curvature, adjacent-cell
//! consistency, edge slivers, isolated nodes, and noisy coverage margins.
//! Each check scans tile windows and flags cells; flagged cells become
//! [`AnomalyRecord`]s deduplicated per cell (first check wins).

mod adjacency;
mod curvature;
pub mod height;
mod isolated;
mod laplacian;
mod margin;
mod slivers;

pub use height::HeightSpec;

use bathyqc_core::config::{DetectionConfig, FilterConfig};
use bathyqc_core::error::{Error, Result};
use bathyqc_core::grid::Grid;
use bathyqc_core::progress::ProgressSink;
use bathyqc_core::source::{GridSource, LAYER_ELEVATION};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// The structural checks, in evaluation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CheckKind {
    Laplacian,
    GaussianCurvature,
    Adjacency,
    EdgeSliver,
    IsolatedNode,
    NoisyMargin,
}

impl CheckKind {
    pub const ALL: [CheckKind; 6] = [
        CheckKind::Laplacian,
        CheckKind::GaussianCurvature,
        CheckKind::Adjacency,
        CheckKind::EdgeSliver,
        CheckKind::IsolatedNode,
        CheckKind::NoisyMargin,
    ];

    /// Stable label used in exports and CLI toggles
    pub fn label(&self) -> &'static str {
        match self {
            CheckKind::Laplacian => "laplacian",
            CheckKind::GaussianCurvature => "gaussian_curvature",
            CheckKind::Adjacency => "adjacency",
            CheckKind::EdgeSliver => "edge_sliver",
            CheckKind::IsolatedNode => "isolated_node",
            CheckKind::NoisyMargin => "noisy_margin",
        }
    }

    fn enabled(&self, config: &DetectionConfig) -> bool {
        match self {
            CheckKind::Laplacian => config.laplacian,
            CheckKind::GaussianCurvature => config.gaussian_curvature,
            CheckKind::Adjacency => config.adjacency,
            CheckKind::EdgeSliver => config.edge_slivers,
            CheckKind::IsolatedNode => config.isolated_nodes,
            CheckKind::NoisyMargin => config.noisy_edges,
        }
    }
}

/// One flagged cell
#[derive(Debug, Clone, PartialEq)]
pub struct AnomalyRecord {
    pub row: usize,
    pub col: usize,
    /// Projected coordinates of the cell center
    pub x: f64,
    pub y: f64,
    /// Depth in meters, positive down
    pub depth: f64,
    pub check: CheckKind,
}

/// The anomalies detected in one grid file, deduplicated by cell
#[derive(Debug, Clone, Default)]
pub struct AnomalySet {
    records: Vec<AnomalyRecord>,
    cells: HashSet<(usize, usize)>,
}

impl AnomalySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record unless its cell is already flagged
    pub fn push_unique(&mut self, record: AnomalyRecord) -> bool {
        if self.cells.insert((record.row, record.col)) {
            self.records.push(record);
            true
        } else {
            false
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AnomalyRecord> {
        self.records.iter()
    }

    /// Keep only records satisfying the predicate
    pub fn retain<F: FnMut(&AnomalyRecord) -> bool>(&mut self, mut f: F) {
        self.records.retain(|r| {
            let keep = f(r);
            if !keep {
                self.cells.remove(&(r.row, r.col));
            }
            keep
        });
    }

    /// Export as CSV (`row,col,x,y,depth,check`); returns the written path
    pub fn save_csv(&self, dir: &Path, stem: &str) -> Result<PathBuf> {
        let path = dir.join(format!("{stem}_anomalies.csv"));
        let mut writer = BufWriter::new(File::create(&path)?);

        writeln!(writer, "row,col,x,y,depth,check")?;
        for r in &self.records {
            writeln!(
                writer,
                "{},{},{:.3},{:.3},{:.3},{}",
                r.row,
                r.col,
                r.x,
                r.y,
                r.depth,
                r.check.label()
            )?;
        }
        writer.flush()?;
        Ok(path)
    }
}

/// Parameters for one detector invocation
#[derive(Debug, Clone, Default)]
pub struct DetectionParams {
    /// Flier height threshold specification
    pub height: HeightSpec,
    /// Check and export toggles
    pub detection: DetectionConfig,
    /// Corroboration filter toggles and thresholds
    pub filter: FilterConfig,
}

/// Output of one detector invocation
#[derive(Debug, Default)]
pub struct Detection {
    pub anomalies: AnomalySet,
    /// The resolved flier height the checks ran with
    pub height: f64,
    /// Per-check flag masks, present when `export_proxies` is set
    pub proxies: Vec<(CheckKind, Grid<f64>)>,
    /// Gaussian curvature raster, present when `export_curvature` is set
    pub curvature: Option<Grid<f64>>,
}

/// Progress window a detector reports within: absolute `base` value plus
/// a `span` of the caller's already-started range.
#[derive(Debug, Clone, Copy)]
pub struct ProgressWindow {
    pub base: u64,
    pub span: u64,
}

/// Run the enabled structural checks over every tile of an open grid.
///
/// The caller must have started `progress`; the detector reports within
/// `window` and observes cancellation between tiles.
pub fn detect<S: GridSource>(
    src: &mut S,
    params: &DetectionParams,
    height: f64,
    progress: &mut dyn ProgressSink,
    window: ProgressWindow,
) -> Result<Detection> {
    if !(height.is_finite() && height > 0.0) {
        return Err(Error::InvalidParameter {
            name: "height",
            value: height.to_string(),
            reason: "must be a positive number of meters".into(),
        });
    }

    let transform = *src.transform();
    let cell_size = transform.cell_size();
    let (rows, cols) = src.shape();
    let tile_count = src.tile_count().max(1);

    let mut detection = Detection {
        height,
        ..Detection::default()
    };

    let mut proxies: Vec<(CheckKind, Grid<f64>)> = if params.detection.export_proxies {
        CheckKind::ALL
            .iter()
            .filter(|k| k.enabled(&params.detection))
            .map(|&k| {
                let mut mask: Grid<f64> = Grid::new(rows, cols);
                mask.set_transform(transform);
                (k, mask)
            })
            .collect()
    } else {
        Vec::new()
    };

    let mut curvature_grid: Option<Grid<f64>> = if params.detection.export_curvature {
        let mut grid = Grid::filled(rows, cols, f64::NAN);
        grid.set_transform(transform);
        grid.set_nodata(Some(f64::NAN));
        Some(grid)
    } else {
        None
    };

    src.reset();
    let mut tiles_done = 0u64;

    while let Some(tile) = src.read_next_tile(&[LAYER_ELEVATION])? {
        if progress.canceled() {
            return Err(Error::Canceled);
        }

        let z = tile
            .layer(LAYER_ELEVATION)
            .ok_or_else(|| Error::UnknownLayer(LAYER_ELEVATION.into()))?;
        let interior = tile.interior_local();
        let row_offset = tile.row_offset();

        for kind in CheckKind::ALL {
            if !kind.enabled(&params.detection) {
                continue;
            }

            let flags = match kind {
                CheckKind::Laplacian => laplacian::scan(z, interior.clone(), height),
                CheckKind::GaussianCurvature => {
                    curvature::scan(z, interior.clone(), height, cell_size)
                }
                CheckKind::Adjacency => adjacency::scan(z, interior.clone(), height),
                CheckKind::EdgeSliver => slivers::scan(z, interior.clone(), height),
                CheckKind::IsolatedNode => isolated::scan(z, interior.clone()),
                CheckKind::NoisyMargin => margin::scan(z, interior.clone(), height),
            };

            for (r, c) in flags {
                let row = row_offset + r;
                let (x, y) = transform.cell_to_geo(c, row);
                let record = AnomalyRecord {
                    row,
                    col: c,
                    x,
                    y,
                    depth: -z[(r, c)],
                    check: kind,
                };
                detection.anomalies.push_unique(record);

                if let Some((_, mask)) = proxies.iter_mut().find(|(k, _)| *k == kind) {
                    mask.set(row, c, 1.0)?;
                }
            }
        }

        if let Some(grid) = curvature_grid.as_mut() {
            curvature::raster_into(z, interior, row_offset, cell_size, grid)?;
        }

        tiles_done += 1;
        let value = window.base + window.span * tiles_done / tile_count as u64;
        progress.update(value, None, false)?;
    }

    detection.proxies = proxies;
    detection.curvature = curvature_grid;
    Ok(detection)
}
