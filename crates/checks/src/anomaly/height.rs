//! Flier height resolution
//!
//! The flier height is the depth-delta a sounding must stand proud of
//! its neighborhood before the structural checks call it an anomaly.
//! It comes from user text (one value for all grids, or one per grid),
//! or is estimated per file from the depth distribution against the
//! IHO S-44 order-1a vertical uncertainty model.

use bathyqc_core::error::{Error, Result};
use bathyqc_core::source::{GridSource, LAYER_ELEVATION};

/// Height threshold specification for a scan invocation
#[derive(Debug, Clone, PartialEq, Default)]
pub enum HeightSpec {
    /// Estimate per file from the depth distribution
    #[default]
    Auto,
    /// One height for every grid file, in meters
    Fixed(f64),
    /// One height per grid file, indexed by file position
    PerFile(Vec<f64>),
}

impl HeightSpec {
    /// The effective height for the file at `index`, or `None` for auto
    pub fn for_file(&self, index: usize) -> Option<f64> {
        match self {
            HeightSpec::Auto => None,
            HeightSpec::Fixed(h) => Some(*h),
            HeightSpec::PerFile(v) => v.get(index).copied(),
        }
    }
}

/// Parse the raw height text field against a grid list of length `grids`.
///
/// - empty text means auto-estimation;
/// - a single token is a fixed height for every file;
/// - `grids` comma-separated tokens give one height per file.
///
/// Any unparsable or non-positive token, or a token count that is
/// neither 1 nor `grids`, fails the whole parse; the caller decides to
/// fall back to [`HeightSpec::Auto`] (never a hard stop for the run).
pub fn parse_height_text(text: &str, grids: usize) -> Result<HeightSpec> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(HeightSpec::Auto);
    }

    let tokens: Vec<&str> = text.split(',').map(str::trim).collect();

    let parse_one = |token: &str| -> Result<f64> {
        let value: f64 = token.parse().map_err(|_| Error::InvalidParameter {
            name: "height",
            value: token.to_string(),
            reason: "not a number".into(),
        })?;
        if !(value.is_finite() && value > 0.0) {
            return Err(Error::InvalidParameter {
                name: "height",
                value: token.to_string(),
                reason: "must be positive".into(),
            });
        }
        Ok(value)
    };

    if tokens.len() == 1 {
        return Ok(HeightSpec::Fixed(parse_one(tokens[0])?));
    }

    if tokens.len() != grids {
        return Err(Error::HeightCount {
            tokens: tokens.len(),
            grids,
        });
    }

    let heights = tokens
        .iter()
        .map(|t| parse_one(t))
        .collect::<Result<Vec<f64>>>()?;
    Ok(HeightSpec::PerFile(heights))
}

/// IHO S-44 order-1a total vertical uncertainty at depth `d` (meters,
/// positive down): `sqrt(a^2 + (b*d)^2)` with a = 0.5 m, b = 0.013.
fn tvu(depth: f64) -> f64 {
    (0.25 + (0.013 * depth).powi(2)).sqrt()
}

/// Detection heights the estimator snaps to, matching the discrete
/// steps a reviewer would pick by hand
const HEIGHT_STEPS: [f64; 5] = [0.5, 1.0, 2.0, 4.0, 8.0];

/// Estimate a flier height from the median survey depth.
///
/// Twice the order-1a TVU, snapped up to the next discrete step.
pub fn estimate_height(median_depth: f64) -> f64 {
    let raw = 2.0 * tvu(median_depth.abs());
    for step in HEIGHT_STEPS {
        if raw <= step {
            return step;
        }
    }
    HEIGHT_STEPS[HEIGHT_STEPS.len() - 1]
}

/// Resolve the auto height for an open grid: stream every tile, take the
/// median valid depth, and apply [`estimate_height`]. Rewinds the source
/// when done so detection can make its own pass.
pub fn resolve_auto_height<S: GridSource>(src: &mut S) -> Result<f64> {
    let mut depths: Vec<f64> = Vec::new();

    src.reset();
    while let Some(tile) = src.read_next_tile(&[LAYER_ELEVATION])? {
        let z = tile
            .layer(LAYER_ELEVATION)
            .ok_or_else(|| Error::UnknownLayer(LAYER_ELEVATION.into()))?;
        for row in tile.interior_local() {
            for col in 0..z.ncols() {
                let v = z[(row, col)];
                if v.is_finite() {
                    depths.push(-v);
                }
            }
        }
    }
    src.reset();

    if depths.is_empty() {
        return Err(Error::Algorithm(
            "cannot estimate a flier height from an empty grid".into(),
        ));
    }

    let mid = depths.len() / 2;
    let (_, median, _) = depths.select_nth_unstable_by(mid, |a, b| a.total_cmp(b));
    Ok(estimate_height(*median))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text_is_auto_and_idempotent() {
        assert_eq!(parse_height_text("", 3).unwrap(), HeightSpec::Auto);
        assert_eq!(parse_height_text("", 3).unwrap(), HeightSpec::Auto);
        assert_eq!(parse_height_text("  ", 0).unwrap(), HeightSpec::Auto);
    }

    #[test]
    fn test_single_token() {
        assert_eq!(
            parse_height_text("1.5", 4).unwrap(),
            HeightSpec::Fixed(1.5)
        );
        assert!(parse_height_text("abc", 4).is_err());
        assert!(parse_height_text("-2.0", 4).is_err());
        assert!(parse_height_text("0", 4).is_err());
    }

    #[test]
    fn test_per_file_list_matches_order() {
        let spec = parse_height_text("1.0, 2.0, 0.5", 3).unwrap();
        assert_eq!(spec, HeightSpec::PerFile(vec![1.0, 2.0, 0.5]));
        assert_eq!(spec.for_file(0), Some(1.0));
        assert_eq!(spec.for_file(2), Some(0.5));
    }

    #[test]
    fn test_count_mismatch_rejected() {
        assert!(matches!(
            parse_height_text("1.0,2.0", 3),
            Err(Error::HeightCount { tokens: 2, grids: 3 })
        ));
        assert!(parse_height_text("1.0,2.0,3.0,4.0", 3).is_err());
    }

    #[test]
    fn test_bad_list_member_invalidates_whole_list() {
        assert!(parse_height_text("1.0,oops,3.0", 3).is_err());
        assert!(parse_height_text("1.0,-2.0,3.0", 3).is_err());
    }

    #[test]
    fn test_estimate_height_steps() {
        // Shallow water: 2*tvu(10) ~= 1.03 -> 2.0
        assert_eq!(estimate_height(10.0), 2.0);
        // 100 m: 2*tvu(100) ~= 2.79 -> 4.0
        assert_eq!(estimate_height(100.0), 4.0);
        // Deep water clamps at the largest step
        assert_eq!(estimate_height(2000.0), 8.0);
        // Elevation-convention input behaves the same
        assert_eq!(estimate_height(-10.0), 2.0);
    }
}
