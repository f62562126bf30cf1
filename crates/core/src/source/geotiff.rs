//! Native GeoTIFF grid source
//!
//! Uses the `tiff` crate for TIFF decode/encode. Each TIFF directory is
//! exposed as one layer, named `elevation`, `uncertainty`, `designated`
//! in band order. The BAG nodata sentinel (1,000,000) and NaN are both
//! normalized to NaN on load.

use crate::error::{Error, Result};
use crate::grid::{Grid, GridElement, GridTransform};
use crate::source::{GridSource, Tile, LAYER_DESIGNATED, LAYER_ELEVATION, LAYER_UNCERTAINTY, TILE_HALO};
use ndarray::{s, Array2};
use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::Gray32Float;
use tiff::encoder::TiffEncoder;
use tiff::tags::Tag;

/// BAG-convention nodata sentinel
const BAG_NODATA: f64 = 1_000_000.0;

/// Band-order layer names for multi-directory survey TIFFs
const BAND_NAMES: [&str; 3] = [LAYER_ELEVATION, LAYER_UNCERTAINTY, LAYER_DESIGNATED];

fn band_name(index: usize) -> String {
    BAND_NAMES
        .get(index)
        .map(|s| s.to_string())
        .unwrap_or_else(|| format!("band_{index}"))
}

/// Grid source backed by a (multi-directory) GeoTIFF file.
///
/// The whole dataset is decoded on open; tiles are served as row bands of
/// `chunk_size` rows with a [`TILE_HALO`]-row overlap.
pub struct GeoTiffSource {
    path: PathBuf,
    layer_names: Vec<String>,
    layers: BTreeMap<String, Array2<f64>>,
    transform: GridTransform,
    rows: usize,
    cols: usize,
    chunk_size: usize,
    cursor: usize,
}

impl GridSource for GeoTiffSource {
    fn open_to_read(path: &Path, chunk_size: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::InvalidParameter {
                name: "chunk_size",
                value: "0".into(),
                reason: "must be at least one row".into(),
            });
        }

        let open_err = |reason: String| Error::GridOpen {
            path: path.to_path_buf(),
            reason,
        };

        let file = File::open(path).map_err(|e| open_err(e.to_string()))?;
        let mut decoder = Decoder::new(file).map_err(|e| open_err(e.to_string()))?;

        let mut layer_names = Vec::new();
        let mut layers = BTreeMap::new();
        let mut shape: Option<(usize, usize)> = None;
        let mut transform = GridTransform::default();

        loop {
            let (width, height) = decoder
                .dimensions()
                .map_err(|e| open_err(format!("cannot read dimensions: {e}")))?;
            let (rows, cols) = (height as usize, width as usize);

            match shape {
                None => {
                    shape = Some((rows, cols));
                    // Georeferencing tags only need to be read once
                    if let Ok(t) = read_transform(&mut decoder) {
                        transform = t;
                    }
                }
                Some(expected) if expected != (rows, cols) => {
                    return Err(open_err(format!(
                        "layer {} shape {}x{} differs from {}x{}",
                        layer_names.len(),
                        rows,
                        cols,
                        expected.0,
                        expected.1
                    )));
                }
                Some(_) => {}
            }

            let data = decode_band(&mut decoder).map_err(|e| open_err(e.to_string()))?;
            if data.len() != rows * cols {
                return Err(Error::InvalidDimensions { rows, cols });
            }

            let name = band_name(layer_names.len());
            let array = Array2::from_shape_vec((rows, cols), data)
                .map_err(|e| open_err(e.to_string()))?;
            layer_names.push(name.clone());
            layers.insert(name, array);

            if !decoder.more_images() {
                break;
            }
            decoder
                .next_image()
                .map_err(|e| open_err(format!("cannot advance to next layer: {e}")))?;
        }

        let (rows, cols) = shape.ok_or_else(|| open_err("no image data".into()))?;

        Ok(Self {
            path: path.to_path_buf(),
            layer_names,
            layers,
            transform,
            rows,
            cols,
            chunk_size,
            cursor: 0,
        })
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn layer_names(&self) -> &[String] {
        &self.layer_names
    }

    fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    fn transform(&self) -> &GridTransform {
        &self.transform
    }

    fn bbox(&self) -> (f64, f64, f64, f64) {
        self.transform.bounds(self.cols, self.rows)
    }

    fn tile_count(&self) -> usize {
        self.rows.div_ceil(self.chunk_size)
    }

    fn read_next_tile(&mut self, layers: &[&str]) -> Result<Option<Tile>> {
        if self.cursor >= self.rows {
            return Ok(None);
        }

        for name in layers {
            if !self.layers.contains_key(*name) {
                return Err(Error::UnknownLayer((*name).to_string()));
            }
        }

        let interior_start = self.cursor;
        let interior_end = (interior_start + self.chunk_size).min(self.rows);
        let stored_start = interior_start.saturating_sub(TILE_HALO);
        let stored_end = (interior_end + TILE_HALO).min(self.rows);

        let mut bands = BTreeMap::new();
        for name in layers {
            let full = &self.layers[*name];
            let band = full.slice(s![stored_start..stored_end, ..]).to_owned();
            bands.insert((*name).to_string(), band);
        }

        self.cursor = interior_end;
        Ok(Some(Tile::new(
            stored_start,
            interior_start..interior_end,
            bands,
        )))
    }

    fn reset(&mut self) {
        self.cursor = 0;
    }
}

/// Decode the current TIFF directory into normalized f64 cells.
///
/// Integer nodata sentinels, the BAG sentinel and NaN all map to NaN.
fn decode_band<R: std::io::Read + std::io::Seek>(decoder: &mut Decoder<R>) -> Result<Vec<f64>> {
    let result = decoder
        .read_image()
        .map_err(|e| Error::Other(format!("cannot read image data: {e}")))?;

    fn normalize<T: GridElement>(buf: &[T]) -> Vec<f64> {
        buf.iter()
            .map(|v| {
                if v.is_nodata(Some(T::default_nodata())) {
                    return f64::NAN;
                }
                match v.to_f64() {
                    Some(x) if (x - BAG_NODATA).abs() < 1e-3 => f64::NAN,
                    Some(x) => x,
                    None => f64::NAN,
                }
            })
            .collect()
    }

    let data = match result {
        DecodingResult::F32(buf) => normalize(&buf),
        DecodingResult::F64(buf) => normalize(&buf),
        DecodingResult::U8(buf) => normalize(&buf),
        DecodingResult::U16(buf) => normalize(&buf),
        DecodingResult::U32(buf) => normalize(&buf),
        DecodingResult::I16(buf) => normalize(&buf),
        DecodingResult::I32(buf) => normalize(&buf),
        _ => {
            return Err(Error::UnsupportedDataType(
                "unsupported TIFF pixel format".to_string(),
            ))
        }
    };

    Ok(data)
}

/// Read the affine transform from GeoTIFF tags
/// (ModelPixelScaleTag 33550 + ModelTiepointTag 33922).
fn read_transform<R: std::io::Read + std::io::Seek>(
    decoder: &mut Decoder<R>,
) -> Result<GridTransform> {
    let scale = decoder
        .get_tag_f64_vec(Tag::ModelPixelScaleTag)
        .map_err(|_| Error::Other("no pixel scale tag".into()))?;

    let tiepoint = decoder
        .get_tag_f64_vec(Tag::ModelTiepointTag)
        .map_err(|_| Error::Other("no tiepoint tag".into()))?;

    if scale.len() >= 2 && tiepoint.len() >= 6 {
        // tiepoint: [I, J, K, X, Y, Z], scale: [ScaleX, ScaleY, ScaleZ]
        let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
        let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
        return Ok(GridTransform::new(origin_x, origin_y, scale[0], -scale[1]));
    }

    Err(Error::Other("cannot determine transform".into()))
}

/// Header-only scan of a grid file's layer names.
///
/// Walks the TIFF directory chain without decoding pixel data, so the
/// scan preconditions (designated layer present?) stay cheap even for
/// large surveys.
pub fn probe_layer_names(path: &Path) -> Result<Vec<String>> {
    let open_err = |reason: String| Error::GridOpen {
        path: path.to_path_buf(),
        reason,
    };

    let file = File::open(path).map_err(|e| open_err(e.to_string()))?;
    let mut decoder = Decoder::new(file).map_err(|e| open_err(e.to_string()))?;

    let mut names = vec![band_name(0)];
    while decoder.more_images() {
        decoder
            .next_image()
            .map_err(|e| open_err(e.to_string()))?;
        names.push(band_name(names.len()));
    }
    Ok(names)
}

/// Write a single-layer grid as GeoTIFF (32-bit float).
pub fn write_grid(grid: &Grid<f64>, path: &Path) -> Result<()> {
    write_layers(path, &[grid])
}

/// Write a multi-layer survey grid, one TIFF directory per layer in band
/// order. All layers must share the first layer's shape and transform.
pub fn write_layers(path: &Path, layers: &[&Grid<f64>]) -> Result<()> {
    let first = layers
        .first()
        .ok_or_else(|| Error::EmptyInput("layer"))?;
    let shape = first.shape();
    let gt = *first.transform();

    let file = File::create(path)?;
    let mut encoder =
        TiffEncoder::new(file).map_err(|e| Error::Other(format!("TIFF encoder error: {e}")))?;

    for grid in layers {
        if grid.shape() != shape {
            let (rows, cols) = grid.shape();
            return Err(Error::InvalidDimensions { rows, cols });
        }

        let (rows, cols) = grid.shape();
        let data: Vec<f32> = grid.data().iter().map(|&v| v as f32).collect();

        let mut image = encoder
            .new_image::<Gray32Float>(cols as u32, rows as u32)
            .map_err(|e| Error::Other(format!("cannot create TIFF image: {e}")))?;

        let scale = vec![gt.cell_width, gt.cell_height.abs(), 0.0];
        image
            .encoder()
            .write_tag(Tag::ModelPixelScaleTag, scale.as_slice())
            .map_err(|e| Error::Other(format!("cannot write scale tag: {e}")))?;

        let tiepoint = vec![0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
        image
            .encoder()
            .write_tag(Tag::ModelTiepointTag, tiepoint.as_slice())
            .map_err(|e| Error::Other(format!("cannot write tiepoint tag: {e}")))?;

        image
            .write_data(&data)
            .map_err(|e| Error::Other(format!("cannot write image data: {e}")))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sloped_grid(rows: usize, cols: usize) -> Grid<f64> {
        let mut grid = Grid::new(rows, cols);
        grid.set_transform(GridTransform::new(500.0, 4000.0, 2.0, -2.0));
        for r in 0..rows {
            for c in 0..cols {
                grid.set(r, c, -10.0 - (r + c) as f64 * 0.1).unwrap();
            }
        }
        grid
    }

    #[test]
    fn test_roundtrip_single_layer() {
        let grid = sloped_grid(12, 8);
        let tmp = tempfile::NamedTempFile::with_suffix(".tif").unwrap();
        write_grid(&grid, tmp.path()).unwrap();

        let mut src = GeoTiffSource::open_to_read(tmp.path(), 4).unwrap();
        assert_eq!(src.shape(), (12, 8));
        assert_eq!(src.layer_names(), &[LAYER_ELEVATION.to_string()]);
        assert!((src.transform().cell_size() - 2.0).abs() < 1e-9);

        let tile = src.read_next_tile(&[LAYER_ELEVATION]).unwrap().unwrap();
        let band = tile.layer(LAYER_ELEVATION).unwrap();
        assert!((band[(0, 0)] - (-10.0)).abs() < 1e-4);
    }

    #[test]
    fn test_tile_halo_and_interiors_cover_grid() {
        let grid = sloped_grid(10, 5);
        let tmp = tempfile::NamedTempFile::with_suffix(".tif").unwrap();
        write_grid(&grid, tmp.path()).unwrap();

        let mut src = GeoTiffSource::open_to_read(tmp.path(), 4).unwrap();
        assert_eq!(src.tile_count(), 3);

        let mut covered = 0usize;
        let mut last_end = 0usize;
        while let Some(tile) = src.read_next_tile(&[LAYER_ELEVATION]).unwrap() {
            let interior = tile.interior();
            assert_eq!(interior.start, last_end, "interiors must not overlap");
            last_end = interior.end;
            covered += interior.len();

            // First tile has no upper halo, middle tiles carry TILE_HALO rows
            if interior.start > 0 {
                assert_eq!(interior.start - tile.row_offset(), TILE_HALO);
            }
        }
        assert_eq!(covered, 10);
    }

    #[test]
    fn test_unknown_layer_rejected() {
        let grid = sloped_grid(4, 4);
        let tmp = tempfile::NamedTempFile::with_suffix(".tif").unwrap();
        write_grid(&grid, tmp.path()).unwrap();

        let mut src = GeoTiffSource::open_to_read(tmp.path(), 4).unwrap();
        assert!(matches!(
            src.read_next_tile(&["reflectance"]),
            Err(Error::UnknownLayer(_))
        ));
    }

    #[test]
    fn test_probe_layer_names() {
        let elevation = sloped_grid(6, 6);
        let designated = elevation.with_same_meta::<f64>();
        let uncertainty = elevation.with_same_meta::<f64>();

        let tmp = tempfile::NamedTempFile::with_suffix(".tif").unwrap();
        write_layers(tmp.path(), &[&elevation, &uncertainty, &designated]).unwrap();

        let names = probe_layer_names(tmp.path()).unwrap();
        assert_eq!(
            names,
            vec![
                LAYER_ELEVATION.to_string(),
                LAYER_UNCERTAINTY.to_string(),
                LAYER_DESIGNATED.to_string(),
            ]
        );
    }

    #[test]
    fn test_open_missing_file() {
        let err = GeoTiffSource::open_to_read(Path::new("/nonexistent/survey.tif"), 16)
            .err()
            .unwrap();
        assert!(matches!(err, Error::GridOpen { .. }));
    }
}
