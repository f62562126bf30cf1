//! Multi-file survey scan pipeline
//!
//! Drives anomaly detection over an ordered list of grid files:
//! per-file height resolution, detection, optional corroboration
//! filtering, export, and a human-readable run summary. Preconditions
//! are enforced up front; per-file failures are recorded and the loop
//! continues with the next file.

use crate::anomaly::height::{parse_height_text, resolve_auto_height};
use crate::anomaly::{detect, DetectionParams, HeightSpec, ProgressWindow};
use crate::filter::{filter_pass, FilterThresholds};
use bathyqc_core::error::{Error, Result};
use bathyqc_core::progress::ProgressSink;
use bathyqc_core::soundings::SoundingSet;
use bathyqc_core::source::{probe_layer_names, write_grid, GeoTiffSource, GridSource, LAYER_DESIGNATED};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Progress units allotted per grid file
const FILE_SPAN: u64 = 100;
/// Units spent within a file before the detector starts
const OPEN_SPAN: u64 = 5;
/// Units the detector reports across
const DETECT_SPAN: u64 = 85;

/// Options for one scan invocation
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    /// Detection parameters; `params.height` is overridden when raw
    /// height text is supplied
    pub params: DetectionParams,
    /// Corroboration thresholds
    pub thresholds: FilterThresholds,
    /// Raw height text to resolve against the grid list, if any
    pub height_text: Option<String>,
    /// Export folder; defaults to each grid's own folder
    pub output_dir: Option<PathBuf>,
}

/// What happened to one grid file
#[derive(Debug, Clone)]
pub struct FileOutcome {
    pub path: PathBuf,
    /// The flier height the checks ran with
    pub height: Option<f64>,
    /// Surviving anomaly count
    pub anomalies: Option<usize>,
    /// Where the anomaly CSV was written
    pub export: Option<PathBuf>,
    pub error: Option<String>,
}

impl FileOutcome {
    fn failed(path: &Path, error: String) -> Self {
        Self {
            path: path.to_path_buf(),
            height: None,
            anomalies: None,
            export: None,
            error: Some(error),
        }
    }
}

/// Aggregated result of a scan
#[derive(Debug, Default)]
pub struct ScanReport {
    pub outcomes: Vec<FileOutcome>,
    pub warnings: Vec<String>,
}

impl ScanReport {
    /// Per-file summary, one line per grid
    pub fn summary(&self) -> String {
        let mut text = String::new();
        for outcome in &self.outcomes {
            let name = outcome
                .path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| outcome.path.display().to_string());
            match (&outcome.error, outcome.anomalies) {
                (Some(e), _) => text.push_str(&format!("- {name}: error ({e})\n")),
                (None, Some(n)) => text.push_str(&format!("- {name}: {n}\n")),
                (None, None) => text.push_str(&format!("- {name}: skipped\n")),
            }
        }
        text
    }

    /// Total anomalies across successful files
    pub fn total_anomalies(&self) -> usize {
        self.outcomes
            .iter()
            .filter_map(|o| o.anomalies)
            .sum()
    }
}

/// A multi-file anomaly scan.
///
/// Confirmation and folder-opening side effects are injected so
/// front-ends can route them to a dialog, the terminal, or a test.
pub struct SurveyScan<'a> {
    grids: Vec<PathBuf>,
    features: Vec<PathBuf>,
    options: ScanOptions,
    confirm: Box<dyn FnMut(&str) -> bool + 'a>,
    open_folder: Box<dyn FnMut(&Path) + 'a>,
}

impl<'a> SurveyScan<'a> {
    /// Build a scan over an ordered grid list; duplicates are dropped
    /// (keeping first occurrence).
    pub fn new(grids: Vec<PathBuf>, options: ScanOptions) -> Self {
        let mut seen = HashSet::new();
        let grids: Vec<PathBuf> = grids
            .into_iter()
            .filter(|p| {
                let fresh = seen.insert(p.clone());
                if !fresh {
                    warn!(path = %p.display(), "duplicate grid file dropped");
                }
                fresh
            })
            .collect();

        Self {
            grids,
            features: Vec::new(),
            options,
            confirm: Box::new(|_| true),
            open_folder: Box::new(|dir| info!(dir = %dir.display(), "results folder ready")),
        }
    }

    /// S-57 feature sounding exports used for corroboration
    pub fn with_features(mut self, features: Vec<PathBuf>) -> Self {
        self.features = features;
        self
    }

    /// Route precondition warnings to a yes/no prompt
    pub fn with_confirm(mut self, confirm: impl FnMut(&str) -> bool + 'a) -> Self {
        self.confirm = Box::new(confirm);
        self
    }

    /// Receive each distinct output folder exactly once per run
    pub fn with_open_folder(mut self, open_folder: impl FnMut(&Path) + 'a) -> Self {
        self.open_folder = Box::new(open_folder);
        self
    }

    /// Run the scan. Per-file failures are recorded in the report and
    /// the loop continues; only empty input, a declined confirmation,
    /// or cancellation abort the whole run.
    pub fn run(mut self, progress: &mut dyn ProgressSink) -> Result<ScanReport> {
        if self.grids.is_empty() {
            return Err(Error::EmptyInput("grid"));
        }

        let mut report = ScanReport::default();

        // Precondition: corroboration sources must plausibly exist, or
        // the operator explicitly waives them before any side effect.
        if self.options.params.filter.use_features && self.features.is_empty() {
            if !(self.confirm)(
                "No feature files are loaded; continue without feature corroboration?",
            ) {
                return Err(Error::Aborted);
            }
            report
                .warnings
                .push("feature corroboration requested with no feature files".into());
        }

        if self.options.params.filter.use_designated {
            let any_designated = self.grids.iter().any(|p| {
                probe_layer_names(p)
                    .map(|names| names.iter().any(|n| n == LAYER_DESIGNATED))
                    .unwrap_or(false)
            });
            if !any_designated
                && !(self.confirm)(
                    "No grid carries a designated-sounding layer; continue without it?",
                )
            {
                return Err(Error::Aborted);
            }
            if !any_designated {
                report
                    .warnings
                    .push("designated corroboration requested with no designated layer".into());
            }
        }

        // Height text is resolved once per invocation, never per file
        let mut params = self.options.params.clone();
        if let Some(text) = &self.options.height_text {
            params.height = match parse_height_text(text, self.grids.len()) {
                Ok(spec) => spec,
                Err(e) => {
                    warn!(error = %e, "height text invalid, falling back to auto estimation");
                    report.warnings.push(format!("height text invalid: {e}"));
                    HeightSpec::Auto
                }
            };
        }

        let features = self.load_features(&mut report);
        let chunk_size = params.detection.chunk_size.max(1);
        let total = self.grids.len();

        progress.start(
            "Anomaly scan",
            &format!("{total} grid file(s)"),
            0,
            total as u64 * FILE_SPAN,
            0,
        )?;

        let mut opened_folders: HashSet<PathBuf> = HashSet::new();

        for (index, path) in self.grids.iter().enumerate() {
            if progress.canceled() {
                progress.end();
                return Err(Error::Canceled);
            }

            let base = index as u64 * FILE_SPAN;
            let file_end = base + FILE_SPAN;
            let label = format!(
                "file {}/{}: {}",
                index + 1,
                total,
                path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
            );
            progress.update(base, Some(label.as_str()), false)?;

            let outcome = match self.scan_one(
                path,
                index,
                &params,
                &features,
                chunk_size,
                progress,
                base,
            ) {
                Ok(outcome) => outcome,
                Err(Error::Canceled) => {
                    progress.end();
                    return Err(Error::Canceled);
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "grid file failed");
                    FileOutcome::failed(path, e.to_string())
                }
            };

            if let Some(export) = &outcome.export {
                if let Some(dir) = export.parent() {
                    if opened_folders.insert(dir.to_path_buf()) {
                        (self.open_folder)(dir);
                    }
                }
            }

            report.outcomes.push(outcome);
            // A failed file still accounts for its share of the bar
            progress.update(file_end, None, false)?;
        }

        progress.end();
        info!(
            files = total,
            anomalies = report.total_anomalies(),
            "anomaly scan complete"
        );
        Ok(report)
    }

    fn load_features(&self, report: &mut ScanReport) -> SoundingSet {
        let mut features = SoundingSet::new();
        if !self.options.params.filter.use_features {
            return features;
        }
        for path in &self.features {
            match SoundingSet::from_csv(path) {
                Ok(set) => features.extend(set),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "feature file skipped");
                    report
                        .warnings
                        .push(format!("feature file {} skipped: {e}", path.display()));
                }
            }
        }
        features
    }

    #[allow(clippy::too_many_arguments)]
    fn scan_one(
        &self,
        path: &Path,
        index: usize,
        params: &DetectionParams,
        features: &SoundingSet,
        chunk_size: usize,
        progress: &mut dyn ProgressSink,
        base: u64,
    ) -> Result<FileOutcome> {
        let mut src = GeoTiffSource::open_to_read(path, chunk_size)?;
        progress.update(base + OPEN_SPAN, None, false)?;

        let height = match params.height.for_file(index) {
            Some(h) => h,
            None => resolve_auto_height(&mut src)?,
        };

        let detection = detect(
            &mut src,
            params,
            height,
            progress,
            ProgressWindow {
                base: base + OPEN_SPAN,
                span: DETECT_SPAN,
            },
        )?;
        let mut anomalies = detection.anomalies;

        // The detection pass consumed the source; the filter inspects
        // neighborhood data again, so reopen the same file.
        if params.filter.use_features || params.filter.use_designated {
            drop(src);
            let mut fresh = GeoTiffSource::open_to_read(path, chunk_size)?;
            anomalies = filter_pass(
                &mut fresh,
                anomalies,
                features,
                &params.filter,
                &self.options.thresholds,
            )?;
        }

        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "grid".into());
        let dir = self
            .options
            .output_dir
            .clone()
            .or_else(|| path.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("."));
        std::fs::create_dir_all(&dir)?;

        let export = anomalies.save_csv(&dir, &stem)?;

        for (kind, mask) in &detection.proxies {
            write_grid(mask, &dir.join(format!("{stem}_proxy_{}.tif", kind.label())))?;
        }
        if let Some(curvature) = &detection.curvature {
            write_grid(curvature, &dir.join(format!("{stem}_curvature.tif")))?;
        }
        if params.detection.export_heights {
            std::fs::write(
                dir.join(format!("{stem}_height.txt")),
                format!("{height}\n"),
            )?;
        }

        Ok(FileOutcome {
            path: path.to_path_buf(),
            height: Some(height),
            anomalies: Some(anomalies.len()),
            export: Some(export),
            error: None,
        })
    }
}
