//! # bathyqc Checks
//!
//! Quality-control analysis for bathymetric survey grids.
//!
//! ## Modules
//!
//! - **anomaly**: flier detection via six structural checks
//! - **filter**: corroboration filtering against vetted soundings
//! - **holes**: coverage holiday finder
//! - **pipeline**: the multi-file survey scan

pub mod anomaly;
pub mod filter;
pub mod holes;
pub mod pipeline;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::anomaly::{
        detect, AnomalyRecord, AnomalySet, CheckKind, Detection, DetectionParams, HeightSpec,
    };
    pub use crate::filter::{filter_pass, FilterThresholds};
    pub use crate::holes::{find_holes, save_holes, Hole, HoleParams};
    pub use crate::pipeline::{ScanOptions, ScanReport, SurveyScan};
    pub use bathyqc_core::prelude::*;
}
