//! # bathyqc Core
//!
//! Core types and I/O for the bathyqc survey quality-control engine.
//!
//! This crate provides:
//! - `Grid<T>`: in-memory grid layer with nodata handling
//! - `GridTransform`: affine georeferencing
//! - `GridSource`: tiled access to multi-layer survey grid files
//! - `ProgressSink`: progress feedback with cooperative cancellation
//! - `SoundingSet`: vetted reference soundings
//! - `Config`: persistent settings

pub mod config;
pub mod error;
pub mod grid;
pub mod progress;
pub mod soundings;
pub mod source;

pub use config::Config;
pub use error::{Error, Result};
pub use grid::{Grid, GridElement, GridTransform};
pub use progress::{CancelHandle, ConsoleProgress, MemoryProgress, ProgressSink};
pub use soundings::{Sounding, SoundingSet};
pub use source::{GeoTiffSource, GridSource, Tile};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::grid::{Grid, GridElement, GridTransform};
    pub use crate::progress::ProgressSink;
    pub use crate::source::{GridSource, Tile};
}
