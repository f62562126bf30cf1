//! End-to-end tests for the survey scan pipeline on synthetic grids.

use bathyqc_checks::filter::FilterThresholds;
use bathyqc_checks::pipeline::{ScanOptions, SurveyScan};
use bathyqc_core::error::Error;
use bathyqc_core::grid::{Grid, GridTransform};
use bathyqc_core::progress::MemoryProgress;
use bathyqc_core::source::{write_grid, write_layers};
use std::cell::RefCell;
use std::path::PathBuf;

/// Smooth sloping seabed with `spikes` single-cell fliers of 5 m
fn survey_grid(rows: usize, cols: usize, spikes: &[(usize, usize)]) -> Grid<f64> {
    let mut grid = Grid::new(rows, cols);
    grid.set_transform(GridTransform::new(1000.0, 5000.0, 1.0, -1.0));
    for r in 0..rows {
        for c in 0..cols {
            grid.set(r, c, -22.0 - 0.01 * (r + c) as f64).unwrap();
        }
    }
    for &(r, c) in spikes {
        let v = grid.get(r, c).unwrap();
        grid.set(r, c, v + 5.0).unwrap();
    }
    grid
}

fn write_survey(dir: &std::path::Path, name: &str, spikes: &[(usize, usize)]) -> PathBuf {
    let path = dir.join(name);
    write_grid(&survey_grid(24, 24, spikes), &path).unwrap();
    path
}

fn new_progress() -> MemoryProgress {
    MemoryProgress::new()
}

#[test]
fn empty_grid_list_is_rejected_before_any_work() {
    let scan = SurveyScan::new(Vec::new(), ScanOptions::default());
    let mut progress = new_progress();
    let err = scan.run(&mut progress).err().unwrap();
    assert!(matches!(err, Error::EmptyInput("grid")));
    // The sink was never even started
    assert!(progress.history().is_empty());
}

#[test]
fn per_file_heights_are_applied_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_survey(dir.path(), "a.tif", &[(10, 10)]);
    let b = write_survey(dir.path(), "b.tif", &[(5, 5)]);

    let options = ScanOptions {
        height_text: Some("1.0,2.0".to_string()),
        ..ScanOptions::default()
    };

    let mut progress = new_progress();
    let report = SurveyScan::new(vec![a.clone(), b.clone()], options)
        .run(&mut progress)
        .unwrap();

    assert_eq!(report.outcomes.len(), 2);
    assert_eq!(report.outcomes[0].path, a);
    assert_eq!(report.outcomes[0].height, Some(1.0));
    assert_eq!(report.outcomes[1].path, b);
    assert_eq!(report.outcomes[1].height, Some(2.0));
    assert_eq!(report.outcomes[0].anomalies, Some(1));
    assert_eq!(report.outcomes[1].anomalies, Some(1));
    assert!(report.warnings.is_empty());
}

#[test]
fn bad_height_text_falls_back_to_auto_with_warning() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_survey(dir.path(), "a.tif", &[]);
    let b = write_survey(dir.path(), "b.tif", &[]);
    let c = write_survey(dir.path(), "c.tif", &[]);

    let options = ScanOptions {
        // Three grids, two tokens: invalid
        height_text: Some("1.0,2.0".to_string()),
        ..ScanOptions::default()
    };

    let mut progress = new_progress();
    let report = SurveyScan::new(vec![a, b, c], options)
        .run(&mut progress)
        .unwrap();

    assert_eq!(report.warnings.len(), 1);
    // Auto estimation at ~22 m median depth: 2 * tvu ~= 1.2 -> 2.0 step
    for outcome in &report.outcomes {
        assert_eq!(outcome.height, Some(2.0));
        assert!(outcome.error.is_none());
    }
}

#[test]
fn missing_file_is_recorded_and_the_loop_continues() {
    let dir = tempfile::tempdir().unwrap();
    let good = write_survey(dir.path(), "good.tif", &[(8, 8)]);
    let missing = dir.path().join("missing.tif");

    let options = ScanOptions {
        params: Default::default(),
        height_text: Some("1.0".to_string()),
        ..ScanOptions::default()
    };

    let mut progress = new_progress();
    let report = SurveyScan::new(vec![missing.clone(), good.clone()], options)
        .run(&mut progress)
        .unwrap();

    assert_eq!(report.outcomes.len(), 2);
    assert!(report.outcomes[0].error.is_some());
    assert_eq!(report.outcomes[1].anomalies, Some(1));

    let summary = report.summary();
    assert!(summary.contains("- missing.tif: error"));
    assert!(summary.contains("- good.tif: 1"));

    // The failed file's share of the bar was force-completed
    assert_eq!(progress.position(), Some(200));
}

#[test]
fn output_folder_opened_once_per_distinct_folder() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_survey(dir.path(), "a.tif", &[(4, 4)]);
    let b = write_survey(dir.path(), "b.tif", &[(6, 6)]);
    let c = write_survey(dir.path(), "c.tif", &[(8, 8)]);

    let opened: RefCell<Vec<PathBuf>> = RefCell::new(Vec::new());
    let options = ScanOptions {
        height_text: Some("1.0".to_string()),
        ..ScanOptions::default()
    };

    let mut progress = new_progress();
    SurveyScan::new(vec![a, b, c], options)
        .with_open_folder(|dir| opened.borrow_mut().push(dir.to_path_buf()))
        .run(&mut progress)
        .unwrap();

    let opened = opened.into_inner();
    assert_eq!(opened.len(), 1, "shared folder must be opened exactly once");
    assert_eq!(opened[0], dir.path());
}

#[test]
fn feature_flag_with_empty_list_asks_and_declining_aborts() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_survey(dir.path(), "a.tif", &[(4, 4)]);

    let mut options = ScanOptions {
        height_text: Some("1.0".to_string()),
        ..ScanOptions::default()
    };
    options.params.filter.use_features = true;

    let asked: RefCell<usize> = RefCell::new(0);
    let mut progress = new_progress();
    let err = SurveyScan::new(vec![a.clone()], options.clone())
        .with_confirm(|_| {
            *asked.borrow_mut() += 1;
            false
        })
        .run(&mut progress)
        .err()
        .unwrap();

    assert!(matches!(err, Error::Aborted));
    assert_eq!(*asked.borrow(), 1);
    // No side effects: nothing was exported
    assert!(!dir.path().join("a_anomalies.csv").exists());

    // Accepting proceeds with an empty reference set
    let mut progress = new_progress();
    let report = SurveyScan::new(vec![a], options)
        .with_confirm(|_| true)
        .run(&mut progress)
        .unwrap();
    assert_eq!(report.outcomes[0].anomalies, Some(1));
}

#[test]
fn designated_soundings_corroborate_fliers() {
    let dir = tempfile::tempdir().unwrap();

    // Two 5 m spikes; the one at (10, 10) is designated, so it is a
    // legitimate shoal sounding, not a flier.
    let elevation = survey_grid(24, 24, &[(10, 10), (18, 6)]);
    let mut uncertainty = Grid::<f64>::filled(24, 24, 0.3);
    uncertainty.set_transform(*elevation.transform());
    let mut designated = Grid::<f64>::new(24, 24);
    designated.set_transform(*elevation.transform());
    designated.set(10, 10, 1.0).unwrap();

    let path = dir.path().join("survey.tif");
    write_layers(&path, &[&elevation, &uncertainty, &designated]).unwrap();

    let mut options = ScanOptions {
        height_text: Some("1.0".to_string()),
        ..ScanOptions::default()
    };
    options.params.filter.use_designated = true;
    options.thresholds = FilterThresholds {
        distance: 2.0,
        delta_z: 0.05,
    };

    let mut progress = new_progress();
    let report = SurveyScan::new(vec![path], options)
        .run(&mut progress)
        .unwrap();

    // Only the undesignated spike survives the filter
    assert_eq!(report.outcomes[0].anomalies, Some(1));
}

#[test]
fn feature_soundings_corroborate_fliers() {
    let dir = tempfile::tempdir().unwrap();
    let grid_path = write_survey(dir.path(), "survey.tif", &[(10, 10), (18, 6)]);

    // A charted VALSOU sounding on top of the (10, 10) spike.
    // Cell (10, 10) center: x = 1000 + 10.5, y = 5000 - 10.5; the spike
    // depth is 22 + 0.01*20 - 5 = 17.2 m.
    let features_path = dir.path().join("valsou.csv");
    std::fs::write(&features_path, "x,y,z\n1010.5,4989.5,17.2\n").unwrap();

    let mut options = ScanOptions {
        height_text: Some("1.0".to_string()),
        ..ScanOptions::default()
    };
    options.params.filter.use_features = true;

    let mut progress = new_progress();
    let report = SurveyScan::new(vec![grid_path], options)
        .with_features(vec![features_path])
        .run(&mut progress)
        .unwrap();

    assert_eq!(report.outcomes[0].anomalies, Some(1));
}

#[test]
fn duplicate_grid_entries_are_dropped() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_survey(dir.path(), "a.tif", &[(4, 4)]);

    let options = ScanOptions {
        height_text: Some("1.0".to_string()),
        ..ScanOptions::default()
    };

    let mut progress = new_progress();
    let report = SurveyScan::new(vec![a.clone(), a], options)
        .run(&mut progress)
        .unwrap();
    assert_eq!(report.outcomes.len(), 1);
}

#[test]
fn cancellation_aborts_between_files() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_survey(dir.path(), "a.tif", &[]);
    let b = write_survey(dir.path(), "b.tif", &[]);

    let options = ScanOptions {
        height_text: Some("1.0".to_string()),
        ..ScanOptions::default()
    };

    let mut progress = new_progress();
    progress.cancel_handle().cancel();
    let err = SurveyScan::new(vec![a, b], options)
        .run(&mut progress)
        .err()
        .unwrap();
    assert!(matches!(err, Error::Canceled));
}

#[test]
fn exports_land_in_the_requested_output_dir() {
    let dir = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let a = write_survey(dir.path(), "a.tif", &[(4, 4)]);

    let mut options = ScanOptions {
        height_text: Some("1.0".to_string()),
        output_dir: Some(out.path().to_path_buf()),
        ..ScanOptions::default()
    };
    options.params.detection.export_heights = true;

    let mut progress = new_progress();
    let report = SurveyScan::new(vec![a], options)
        .run(&mut progress)
        .unwrap();

    let export = report.outcomes[0].export.clone().unwrap();
    assert_eq!(export, out.path().join("a_anomalies.csv"));
    assert!(export.exists());
    assert!(out.path().join("a_height.txt").exists());

    let csv = std::fs::read_to_string(export).unwrap();
    assert!(csv.lines().count() >= 2, "header plus one record");
    assert!(csv.contains("laplacian"));
}
