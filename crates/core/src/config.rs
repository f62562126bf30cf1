//! Persistent configuration
//!
//! Settings that survive across sessions live in an explicit `Config`
//! struct serialized as TOML, loaded and saved at process boundaries
//! only. Every field has a documented default; a missing file yields
//! the defaults, unknown keys are rejected.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Structural check and export toggles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DetectionConfig {
    /// Laplacian operator check
    pub laplacian: bool,
    /// Gaussian curvature check
    pub gaussian_curvature: bool,
    /// Adjacent-cell consistency check
    pub adjacency: bool,
    /// Edge-sliver check
    pub edge_slivers: bool,
    /// Isolated-node check
    pub isolated_nodes: bool,
    /// Noisy coverage-margin check
    pub noisy_edges: bool,
    /// Write per-check flag masks beside the anomaly export
    pub export_proxies: bool,
    /// Record the resolved detection height per file
    pub export_heights: bool,
    /// Write the Gaussian curvature raster
    pub export_curvature: bool,
    /// Tile height in rows for grid reading
    pub chunk_size: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            laplacian: true,
            gaussian_curvature: true,
            adjacency: true,
            edge_slivers: true,
            isolated_nodes: true,
            noisy_edges: true,
            export_proxies: false,
            export_heights: false,
            export_curvature: false,
            chunk_size: 256,
        }
    }
}

/// Anomaly filter toggles and thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FilterConfig {
    /// Corroborate anomalies against S-57 feature soundings
    pub use_features: bool,
    /// Corroborate anomalies against the designated-sounding layer
    pub use_designated: bool,
    /// Search radius in grid nodes
    pub distance: f64,
    /// Maximum depth difference in meters
    pub delta_z: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            use_features: false,
            use_designated: false,
            distance: 2.0,
            delta_z: 0.05,
        }
    }
}

/// Coverage-gap finder settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HolesConfig {
    /// Smallest gap, in cells, worth reporting
    pub min_size: usize,
    /// Upper bound for reporting, in cells (none = unbounded)
    pub max_size: Option<usize>,
}

impl Default for HolesConfig {
    fn default() -> Self {
        Self {
            min_size: 1,
            max_size: None,
        }
    }
}

/// Process-wide configuration for the QC engine
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub detection: DetectionConfig,
    pub filter: FilterConfig,
    pub holes: HolesConfig,
}

impl Config {
    /// Load from a TOML file; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Save as TOML
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_yields_defaults() {
        let config = Config::load(Path::new("/nonexistent/bathyqc.toml")).unwrap();
        assert_eq!(config, Config::default());
        assert!(config.detection.laplacian);
        assert_eq!(config.filter.distance, 2.0);
    }

    #[test]
    fn test_roundtrip() {
        let mut config = Config::default();
        config.detection.noisy_edges = false;
        config.filter.use_designated = true;
        config.filter.delta_z = 0.1;

        let tmp = tempfile::NamedTempFile::with_suffix(".toml").unwrap();
        config.save(tmp.path()).unwrap();

        let reloaded = Config::load(tmp.path()).unwrap();
        assert_eq!(reloaded, config);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let tmp = tempfile::NamedTempFile::with_suffix(".toml").unwrap();
        fs::write(tmp.path(), "[detection]\nlaplacean = true\n").unwrap();
        assert!(matches!(Config::load(tmp.path()), Err(Error::Config(_))));
    }
}
