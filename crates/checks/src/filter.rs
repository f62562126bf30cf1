//! Anomaly corroboration filter
//!
//! Second pass over a detection result: an anomaly that sits within
//! `distance` grid nodes of a vetted reference sounding, at nearly the
//! same depth, is not a flier — it is a charted feature or a
//! hydrographer-designated sounding showing through the grid. Such
//! records are discarded.

use crate::anomaly::AnomalySet;
use bathyqc_core::config::FilterConfig;
use bathyqc_core::error::{Error, Result};
use bathyqc_core::grid::GridTransform;
use bathyqc_core::soundings::{Sounding, SoundingSet};
use bathyqc_core::source::{GridSource, LAYER_DESIGNATED, LAYER_ELEVATION};
use tracing::debug;

/// Distance / delta-Z thresholds for the corroboration filter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterThresholds {
    /// Search radius in grid nodes
    pub distance: f64,
    /// Maximum depth difference in meters
    pub delta_z: f64,
}

impl Default for FilterThresholds {
    fn default() -> Self {
        let defaults = FilterConfig::default();
        Self {
            distance: defaults.distance,
            delta_z: defaults.delta_z,
        }
    }
}

impl FilterThresholds {
    /// Thresholds persisted in the filter configuration
    pub fn from_config(config: &FilterConfig) -> Self {
        Self {
            distance: config.distance,
            delta_z: config.delta_z,
        }
    }

    /// Parse threshold text fields against the built-in defaults.
    ///
    /// Empty or whitespace-only input yields the default for that
    /// field; unparsable or non-positive input is an error the caller
    /// resolves by substituting the default (and warning), so a bad
    /// numeric field never hard-fails a run.
    pub fn parse(distance: &str, delta_z: &str) -> Result<Self> {
        Self::parse_with(distance, delta_z, Self::default())
    }

    /// Parse threshold text fields with explicit fallbacks (usually the
    /// persisted configuration values)
    pub fn parse_with(distance: &str, delta_z: &str, defaults: Self) -> Result<Self> {
        Ok(Self {
            distance: parse_field("distance", distance, defaults.distance)?,
            delta_z: parse_field("delta_z", delta_z, defaults.delta_z)?,
        })
    }
}

fn parse_field(name: &'static str, text: &str, default: f64) -> Result<f64> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(default);
    }
    let value: f64 = text.parse().map_err(|_| Error::InvalidParameter {
        name,
        value: text.to_string(),
        reason: "not a number".into(),
    })?;
    if !(value.is_finite() && value > 0.0) {
        return Err(Error::InvalidParameter {
            name,
            value: text.to_string(),
            reason: "must be positive".into(),
        });
    }
    Ok(value)
}

/// Collect designated soundings from a grid's `designated` layer.
///
/// Cells with a nonzero designated flag contribute their elevation-layer
/// depth at the cell center. Grids without the layer yield an empty set.
pub fn gather_designated<S: GridSource>(src: &mut S) -> Result<SoundingSet> {
    let mut set = SoundingSet::new();
    if !src.has_layer(LAYER_DESIGNATED) {
        return Ok(set);
    }

    let transform = *src.transform();
    src.reset();
    while let Some(tile) = src.read_next_tile(&[LAYER_ELEVATION, LAYER_DESIGNATED])? {
        let z = tile
            .layer(LAYER_ELEVATION)
            .ok_or_else(|| Error::UnknownLayer(LAYER_ELEVATION.into()))?;
        let flags = tile
            .layer(LAYER_DESIGNATED)
            .ok_or_else(|| Error::UnknownLayer(LAYER_DESIGNATED.into()))?;
        let row_offset = tile.row_offset();

        for row in tile.interior_local() {
            for col in 0..z.ncols() {
                let flag = flags[(row, col)];
                let elevation = z[(row, col)];
                if flag.is_finite() && flag != 0.0 && elevation.is_finite() {
                    let (x, y) = transform.cell_to_geo(col, row_offset + row);
                    set.push(Sounding {
                        x,
                        y,
                        z: -elevation,
                    });
                }
            }
        }
    }
    src.reset();

    Ok(set)
}

/// Apply the corroboration filter to a detection result.
///
/// `src` must be a freshly opened source for the same grid file — the
/// detection pass consumes the tile cursor, and designated soundings
/// are gathered here when enabled. Feature soundings are passed in by
/// the caller. Returns the surviving anomaly set.
pub fn filter_pass<S: GridSource>(
    src: &mut S,
    mut anomalies: AnomalySet,
    features: &SoundingSet,
    config: &FilterConfig,
    thresholds: &FilterThresholds,
) -> Result<AnomalySet> {
    let mut refs = SoundingSet::new();
    if config.use_features {
        for s in features.iter() {
            refs.push(*s);
        }
    }
    if config.use_designated {
        refs.extend(gather_designated(src)?);
    }

    if refs.is_empty() {
        return Ok(anomalies);
    }

    let transform = *src.transform();
    let before = anomalies.len();
    anomalies.retain(|record| !corroborated(record.row, record.col, record.depth, &refs, &transform, thresholds));
    debug!(
        discarded = before - anomalies.len(),
        remaining = anomalies.len(),
        "corroboration filter applied"
    );

    Ok(anomalies)
}

fn corroborated(
    row: usize,
    col: usize,
    depth: f64,
    refs: &SoundingSet,
    transform: &GridTransform,
    thresholds: &FilterThresholds,
) -> bool {
    refs.iter().any(|s| {
        let (sc, sr) = transform.geo_to_cell(s.x, s.y);
        let d_nodes = ((sc - col as f64).powi(2) + (sr - row as f64).powi(2)).sqrt();
        d_nodes <= thresholds.distance && (s.z - depth).abs() <= thresholds.delta_z
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty_is_default_and_idempotent() {
        let first = FilterThresholds::parse("", "").unwrap();
        let second = FilterThresholds::parse("", "").unwrap();
        assert_eq!(first, FilterThresholds::default());
        assert_eq!(first, second);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(FilterThresholds::parse("wide", "0.05").is_err());
        assert!(FilterThresholds::parse("2.0", "-1").is_err());
        let partial = FilterThresholds::parse("3.5", "").unwrap();
        assert_eq!(partial.distance, 3.5);
        assert_eq!(partial.delta_z, FilterThresholds::default().delta_z);
    }

    #[test]
    fn test_corroborated_by_nearby_sounding() {
        let transform = GridTransform::new(0.0, 100.0, 1.0, -1.0);
        let mut refs = SoundingSet::new();
        let (x, y) = transform.cell_to_geo(11, 10);
        refs.push(Sounding { x, y, z: 15.02 });

        let thresholds = FilterThresholds {
            distance: 2.0,
            delta_z: 0.05,
        };

        // One node away, 2 cm off: corroborated
        assert!(corroborated(10, 10, 15.0, &refs, &transform, &thresholds));
        // Same spot but half a meter off in depth: kept
        assert!(!corroborated(10, 10, 15.5, &refs, &transform, &thresholds));
        // Same depth but five nodes away: kept
        assert!(!corroborated(10, 15, 15.0, &refs, &transform, &thresholds));
    }
}
