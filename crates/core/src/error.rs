//! Error types for bathyqc

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for bathyqc operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cannot open grid {path}: {reason}")]
    GridOpen { path: PathBuf, reason: String },

    #[error("Invalid grid dimensions: {rows}x{cols}")]
    InvalidDimensions { rows: usize, cols: usize },

    #[error("Index out of bounds: ({row}, {col}) in grid of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Unknown layer: {0}")]
    UnknownLayer(String),

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Height list has {tokens} entries for {grids} grid files")]
    HeightCount { tokens: usize, grids: usize },

    #[error("The {0} list is empty")]
    EmptyInput(&'static str),

    #[error("Progress error: {0}")]
    Progress(String),

    #[error("Run aborted by the user")]
    Aborted,

    #[error("Run canceled")]
    Canceled,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Algorithm error: {0}")]
    Algorithm(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for bathyqc operations
pub type Result<T> = std::result::Result<T, Error>;
