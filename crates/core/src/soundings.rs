//! Reference soundings for anomaly corroboration
//!
//! Vetted depths the filter pass compares anomalies against: charted
//! soundings exported from S-57 feature files (VALSOU attribute) and
//! designated soundings carried by the grid itself. Feature exports are
//! read as `x,y,z` CSV records, one sounding per line, `#` comments and
//! an optional header allowed. Depths are positive down.

use crate::error::{Error, Result};
use std::fs;
use std::path::Path;

/// One vetted sounding in projected coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sounding {
    pub x: f64,
    pub y: f64,
    /// Depth in meters, positive down
    pub z: f64,
}

/// A set of reference soundings
#[derive(Debug, Clone, Default)]
pub struct SoundingSet {
    soundings: Vec<Sounding>,
}

impl SoundingSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load soundings from an `x,y,z` CSV export
    pub fn from_csv(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let mut set = Self::new();

        for (lineno, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let fields: Vec<&str> = line.split(',').map(str::trim).collect();
            if fields.len() != 3 {
                return Err(Error::InvalidParameter {
                    name: "sounding",
                    value: line.to_string(),
                    reason: format!("line {}: expected x,y,z", lineno + 1),
                });
            }

            // A single header line is tolerated
            if lineno == 0 && fields[0].parse::<f64>().is_err() {
                continue;
            }

            let parse = |field: &str| -> Result<f64> {
                field.parse::<f64>().map_err(|_| Error::InvalidParameter {
                    name: "sounding",
                    value: line.to_string(),
                    reason: format!("line {}: not a number: {field}", lineno + 1),
                })
            };

            set.push(Sounding {
                x: parse(fields[0])?,
                y: parse(fields[1])?,
                z: parse(fields[2])?,
            });
        }

        Ok(set)
    }

    pub fn push(&mut self, sounding: Sounding) {
        self.soundings.push(sounding);
    }

    /// Merge another set into this one
    pub fn extend(&mut self, other: SoundingSet) {
        self.soundings.extend(other.soundings);
    }

    pub fn len(&self) -> usize {
        self.soundings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.soundings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sounding> {
        self.soundings.iter()
    }
}
