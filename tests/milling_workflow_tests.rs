use std::path::PathBuf;

use cryomill::config::MillConfig;
use cryomill::hardware::{PatternKind, SimMicroscope};
use cryomill::imaging::RelativeCoord;
use cryomill::milling::MillingRun;
use cryomill::selection::{Region, ScriptedOperator};

fn test_config(lamella_count: usize) -> MillConfig {
    let mut config = MillConfig {
        stages: MillConfig::default_stages(),
        output_dir: PathBuf::from("results"),
        ..Default::default()
    };
    config.imaging.resolution_width = 64;
    config.imaging.resolution_height = 64;
    config.imaging.pixel_size_m = 1e-8;
    config.drift.poll_interval_s = 0.001;
    config.lamella.count = lamella_count;
    config.stages.truncate(2);
    config.validate().expect("test config must be valid");
    config
}

fn region(x: f64, y: f64) -> Option<Region> {
    Some(Region {
        center: RelativeCoord { x, y },
    })
}

#[test]
fn full_run_mills_and_saves_step_images() {
    let config = test_config(1);
    let dir = tempfile::tempdir().unwrap();
    let mut scope = SimMicroscope::new(21).with_polls_per_stage(2);
    let mut operator = ScriptedOperator::new();
    operator.push_confirmation(true);
    operator.push_selection(region(0.3, 0.4)); // fiducial region
    operator.push_selection(region(0.5, 0.5)); // lamella center

    let report = MillingRun::new(&mut scope, &mut operator, &config, dir.path().to_path_buf())
        .execute()
        .unwrap();

    assert_eq!(report.completed, vec![0]);
    assert!(report.skipped.is_empty());

    assert!(dir.path().join("IB_lamella0_stage0_survey.tif").exists());
    assert!(dir.path().join("IB_lamella0_stage0_reference.tif").exists());
    assert!(dir.path().join("IB_lamella0_stage1_finished.tif").exists());
    assert!(dir.path().join("IB_lamella0_stage2_finished.tif").exists());

    // Last stage leaves its two cleaning cross sections in the queue.
    assert_eq!(scope.patterns().len(), 2);
    assert!(scope
        .patterns()
        .iter()
        .all(|p| p.kind == PatternKind::CleaningCrossSection));
    // Overtilt was taken back out.
    assert!(scope.stage_tilt_degrees().abs() < 1e-12);
}

#[test]
fn declined_selection_skips_that_lamella_only() {
    let config = test_config(2);
    let dir = tempfile::tempdir().unwrap();
    let mut scope = SimMicroscope::new(4).with_polls_per_stage(1);
    let mut operator = ScriptedOperator::new();
    // Lamella 0: confirmed but no fiducial selected.
    operator.push_confirmation(true);
    operator.push_selection(None);
    // Lamella 1: full set of answers.
    operator.push_confirmation(true);
    operator.push_selection(region(0.25, 0.25));
    operator.push_selection(region(0.5, 0.5));

    let report = MillingRun::new(&mut scope, &mut operator, &config, dir.path().to_path_buf())
        .execute()
        .unwrap();

    assert_eq!(report.completed, vec![1]);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].0, 0);
    assert!(report.skipped[0].1.contains("fiducial"));
    assert!(dir.path().join("IB_lamella1_stage1_finished.tif").exists());
}

#[test]
fn unconfirmed_lamella_is_not_milled() {
    let config = test_config(1);
    let dir = tempfile::tempdir().unwrap();
    let mut scope = SimMicroscope::new(4);
    let mut operator = ScriptedOperator::new();
    operator.push_confirmation(false);

    let report = MillingRun::new(&mut scope, &mut operator, &config, dir.path().to_path_buf())
        .execute()
        .unwrap();

    assert!(report.completed.is_empty());
    assert_eq!(report.skipped.len(), 1);
    assert!(scope.patterns().is_empty());
    assert!(!dir.path().join("IB_lamella0_stage0_survey.tif").exists());
}
