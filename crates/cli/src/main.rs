//! bathyqc CLI - quality control for bathymetric survey grids

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use bathyqc_checks::anomaly::{CheckKind, DetectionParams};
use bathyqc_checks::filter::FilterThresholds;
use bathyqc_checks::holes::{find_holes, save_holes, HoleParams};
use bathyqc_checks::pipeline::{ScanOptions, SurveyScan};
use bathyqc_core::progress::ConsoleProgress;
use bathyqc_core::source::{GeoTiffSource, GridSource};
use bathyqc_core::Config;

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "bathyqc")]
#[command(author, version, about = "Quality control for bathymetric survey grids", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (TOML); missing file means defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show information about a survey grid file
    Info {
        /// Input grid file
        input: PathBuf,
    },
    /// Scan grid files for fliers / anomalies
    Scan {
        /// Input grid files, scanned in order
        #[arg(required = true)]
        grids: Vec<PathBuf>,
        /// Flier height text: empty = auto, one value, or one per grid
        /// ("1.0,2.0,...")
        #[arg(long, default_value = "")]
        height: String,
        /// Disable a check (repeatable): laplacian, gaussian_curvature,
        /// adjacency, edge_sliver, isolated_node, noisy_margin
        #[arg(long, value_name = "CHECK")]
        skip: Vec<String>,
        /// Corroborate against S-57 feature sounding exports (x,y,z CSV)
        #[arg(long, value_name = "FILE")]
        features: Vec<PathBuf>,
        /// Corroborate against the grid's designated-sounding layer
        #[arg(long)]
        designated: bool,
        /// Corroboration search radius in grid nodes
        #[arg(long, default_value = "")]
        distance: String,
        /// Corroboration depth tolerance in meters
        #[arg(long, default_value = "")]
        delta_z: String,
        /// Output folder (default: beside each grid)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Write per-check flag masks
        #[arg(long)]
        export_proxies: bool,
        /// Record the resolved flier height per file
        #[arg(long)]
        export_heights: bool,
        /// Write the Gaussian curvature raster
        #[arg(long)]
        export_curvature: bool,
        /// Answer yes to all confirmation prompts
        #[arg(short = 'y', long)]
        yes: bool,
    },
    /// Find coverage holidays (gaps inside the survey footprint)
    Holes {
        /// Input grid file
        input: PathBuf,
        /// Smallest gap worth reporting, in cells
        #[arg(long)]
        min_size: Option<usize>,
        /// Largest gap worth reporting, in cells
        #[arg(long)]
        max_size: Option<usize>,
        /// Output folder (default: beside the grid)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path).context("Failed to load configuration"),
        None => Ok(Config::default()),
    }
}

fn apply_skips(config: &mut Config, skips: &[String]) -> Result<()> {
    for skip in skips {
        let kind = CheckKind::ALL
            .into_iter()
            .find(|k| k.label() == skip.to_lowercase());
        match kind {
            Some(CheckKind::Laplacian) => config.detection.laplacian = false,
            Some(CheckKind::GaussianCurvature) => config.detection.gaussian_curvature = false,
            Some(CheckKind::Adjacency) => config.detection.adjacency = false,
            Some(CheckKind::EdgeSliver) => config.detection.edge_slivers = false,
            Some(CheckKind::IsolatedNode) => config.detection.isolated_nodes = false,
            Some(CheckKind::NoisyMargin) => config.detection.noisy_edges = false,
            None => {
                let known: Vec<&str> = CheckKind::ALL.iter().map(|k| k.label()).collect();
                anyhow::bail!("Unknown check: {}. Use one of: {}", skip, known.join(", "));
            }
        }
    }
    Ok(())
}

fn confirm_prompt(question: &str) -> bool {
    if !std::io::stdin().is_terminal() {
        return false;
    }
    eprint!("{question} [y/N] ");
    let mut answer = String::new();
    if std::io::stdin().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);
    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        // ── Info ─────────────────────────────────────────────────────
        Commands::Info { input } => {
            let pb = spinner("Reading grid...");
            let mut src = GeoTiffSource::open_to_read(&input, config.detection.chunk_size)
                .context("Failed to open grid")?;
            let elevation = src
                .read_layer(bathyqc_core::source::LAYER_ELEVATION)
                .context("Failed to read elevation layer")?;
            pb.finish_and_clear();

            let (rows, cols) = src.shape();
            let bounds = src.bbox();
            let stats = elevation.statistics();

            println!("File: {}", input.display());
            println!("Dimensions: {} x {} ({} cells)", cols, rows, rows * cols);
            println!("Cell size: {}", src.transform().cell_size());
            println!(
                "Bounds: ({:.3}, {:.3}) - ({:.3}, {:.3})",
                bounds.0, bounds.1, bounds.2, bounds.3
            );
            println!("Layers: {}", src.layer_names().join(", "));
            // Depths are positive down; elevations are stored negative
            if let (Some(min), Some(max)) = (stats.min, stats.max) {
                println!("Depth range: {:.2} - {:.2} m", -max, -min);
            }
            if let Some(median) = stats.median {
                println!("Median depth: {:.2} m", -median);
            }
            println!(
                "Valid cells: {} ({:.1}%)",
                stats.valid_count,
                100.0 * stats.valid_count as f64 / (rows * cols).max(1) as f64
            );
        }

        // ── Scan ─────────────────────────────────────────────────────
        Commands::Scan {
            grids,
            height,
            skip,
            features,
            designated,
            distance,
            delta_z,
            output,
            export_proxies,
            export_heights,
            export_curvature,
            yes,
        } => {
            let mut config = config;
            apply_skips(&mut config, &skip)?;
            config.detection.export_proxies |= export_proxies;
            config.detection.export_heights |= export_heights;
            config.detection.export_curvature |= export_curvature;
            config.filter.use_features |= !features.is_empty();
            config.filter.use_designated |= designated;

            let configured = FilterThresholds::from_config(&config.filter);
            let thresholds = match FilterThresholds::parse_with(&distance, &delta_z, configured) {
                Ok(t) => t,
                Err(e) => {
                    // A bad numeric field never stops the run
                    tracing::warn!(error = %e, "threshold text invalid, using defaults");
                    configured
                }
            };

            let options = ScanOptions {
                params: DetectionParams {
                    height: Default::default(),
                    detection: config.detection.clone(),
                    filter: config.filter.clone(),
                },
                thresholds,
                height_text: Some(height),
                output_dir: output,
            };

            let start = Instant::now();
            let mut progress = ConsoleProgress::new();
            let report = SurveyScan::new(grids, options)
                .with_features(features)
                .with_confirm(move |question| yes || confirm_prompt(question))
                .with_open_folder(|dir| info!("results in {}", dir.display()))
                .run(&mut progress)
                .context("Anomaly scan failed")?;

            for warning in &report.warnings {
                eprintln!("warning: {warning}");
            }
            print!("{}", report.summary());
            println!(
                "Total: {} anomalies in {:.2?}",
                report.total_anomalies(),
                start.elapsed()
            );
        }

        // ── Holes ────────────────────────────────────────────────────
        Commands::Holes {
            input,
            min_size,
            max_size,
            output,
        } => {
            let pb = spinner("Reading grid...");
            let mut src = GeoTiffSource::open_to_read(&input, config.detection.chunk_size)
                .context("Failed to open grid")?;
            pb.finish_and_clear();

            let params = HoleParams {
                min_size: min_size.unwrap_or(config.holes.min_size),
                max_size: max_size.or(config.holes.max_size),
            };

            let start = Instant::now();
            let holes = find_holes(&mut src, &params).context("Hole search failed")?;
            let elapsed = start.elapsed();

            let stem = input
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "grid".into());
            let dir = output
                .or_else(|| input.parent().map(PathBuf::from))
                .unwrap_or_else(|| PathBuf::from("."));
            let path = save_holes(&holes, &dir, &stem).context("Failed to write holiday list")?;

            println!("{} holiday(s) found in {:.2?}", holes.len(), elapsed);
            for hole in holes.iter().take(10) {
                println!(
                    "  {} cells at ({:.1}, {:.1})",
                    hole.cells, hole.centroid.0, hole.centroid.1
                );
            }
            println!("Holiday list saved to: {}", path.display());
        }
    }

    Ok(())
}
