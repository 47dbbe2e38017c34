use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use healthcare_elt::config::{Config, SourceConfig, SourceKind};
use healthcare_elt::constants::{MART_HOSPITAL_QUALITY, MART_STATE_SUMMARY, RAW_COLUMNS, STG_HOSPITALS};
use healthcare_elt::pipeline::processing::models::hospital_quality::read_hospital_quality;
use healthcare_elt::pipeline::processing::models::staging::read_staged;
use healthcare_elt::pipeline::processing::models::state_summary::read_state_summaries;
use healthcare_elt::pipeline::{PipelineOrchestrator, Stage};
use healthcare_elt::types::{QualityClassification, QualityTier};
use tempfile::{tempdir, TempDir};

fn bundled_csv() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("data/hospitals.csv")
}

fn config_for(dir: &TempDir, csv_path: PathBuf) -> Config {
    let mut config = Config::default();
    config.warehouse.path = dir.path().join("healthcare.db");
    config.source = SourceConfig {
        kind: SourceKind::Csv,
        csv_path,
        ..Default::default()
    };
    config.output.dir = dir.path().join("output");
    config.output.docs_dir = dir.path().join("docs");
    config
}

/// Write a CSV with the canonical headers; each row lists all 13 columns.
fn write_csv(path: &Path, rows: &[[&str; 13]]) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(RAW_COLUMNS)?;
    for row in rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}

fn row<'a>(id: &'a str, state: &'a str, rating: &'a str, emergency: &'a str, ehr: &'a str) -> [&'a str; 13] {
    [
        id,
        "Test Hospital",
        "1 Main St",
        "Springfield",
        state,
        "00000",
        "County",
        "(555) 555-0100",
        "Acute Care Hospitals",
        "Proprietary",
        rating,
        emergency,
        ehr,
    ]
}

#[test]
fn test_full_run_on_bundled_csv() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let orchestrator = PipelineOrchestrator::new(config_for(&dir, bundled_csv()))?;
    let result = orchestrator.run()?;

    assert_eq!(result.steps.len(), Stage::ALL.len());
    assert_eq!(result.load.as_ref().map(|l| l.rows_loaded), Some(32));

    let states = read_state_summaries(orchestrator.warehouse())?;
    let order: Vec<_> = states.iter().filter_map(|s| s.state.as_deref()).collect();
    assert_eq!(order, vec!["CA", "TX", "FL", "NY", "WA", "OR", "AK"]);

    let ca = &states[0];
    assert_eq!(ca.total_hospitals, 7);
    assert_eq!(ca.acute_care_count, 5);
    assert_eq!(ca.critical_access_count, 1);
    assert_eq!(ca.avg_rating, Some(3.17));
    assert_eq!((ca.high_rated_count, ca.low_rated_count), (3, 2));
    assert_eq!(ca.pct_with_emergency, 71.4);
    assert_eq!(ca.pct_ehr_interop, Some(66.7));
    assert_eq!((ca.nonprofit_count, ca.government_count, ca.proprietary_count), (3, 1, 3));
    assert_eq!(ca.quality_tier, QualityTier::Average);

    let wa = states.iter().find(|s| s.state.as_deref() == Some("WA")).unwrap();
    assert_eq!(wa.quality_tier, QualityTier::AboveAverage);

    let insights = result.insights.as_ref().unwrap();
    assert_eq!(insights.access_risk_count, 4);
    assert_eq!(insights.highest_rated_state.as_ref().unwrap().state, "WA");
    assert_eq!(insights.lowest_rated_state.as_ref().unwrap().state, "OR");

    let output = dir.path().join("output");
    assert!(output.join("dashboard.svg").exists());
    assert!(dir.path().join("docs/manifest.json").exists());
    assert!(dir.path().join("docs/index.md").exists());

    let run_results: serde_json::Value = serde_json::from_str(&fs::read_to_string(output.join("run_results.json"))?)?;
    assert_eq!(run_results["run_id"], result.run_id.to_string());
    assert!(run_results["fingerprints"]["relations"][MART_STATE_SUMMARY].is_string());
    Ok(())
}

#[test]
fn test_rerun_on_unchanged_input_is_idempotent() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let first = PipelineOrchestrator::new(config_for(&dir, bundled_csv()))?.run()?;
    let second = PipelineOrchestrator::new(config_for(&dir, bundled_csv()))?.run()?;

    assert_eq!(first.fingerprints, second.fingerprints);
    assert!(second.changed_relations.is_empty());
    assert_ne!(first.run_id, second.run_id);
    Ok(())
}

#[test]
fn test_mart_invariants_hold() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let orchestrator = PipelineOrchestrator::new(config_for(&dir, bundled_csv()))?;
    orchestrator.run()?;
    let wh = orchestrator.warehouse();

    let staged = read_staged(wh)?;
    let ids: HashSet<_> = staged.iter().map(|h| h.facility_id.clone()).collect();
    assert_eq!(ids.len(), staged.len());
    assert!(staged.iter().all(|h| h.overall_rating.map_or(true, |r| (1..=5).contains(&r))));

    let states = read_state_summaries(wh)?;
    let total: i64 = states.iter().map(|s| s.total_hospitals).sum();
    assert_eq!(total as usize, staged.len());

    let in_range = |v: f64| (0.0..=100.0).contains(&v);
    for s in &states {
        assert!(s.acute_care_count + s.critical_access_count <= s.total_hospitals);
        assert!(in_range(s.pct_with_emergency));
        assert!(in_range(s.pct_high_rated));
        assert!(in_range(s.pct_nonprofit));
        assert!(s.pct_ehr_interop.map_or(true, in_range));
    }

    let hospitals = read_hospital_quality(wh)?;
    assert_eq!(hospitals.len(), staged.len());
    for h in &hospitals {
        assert_eq!(h.quality_classification, QualityClassification::from_rating(h.overall_rating));
        assert_eq!(
            h.access_risk_flag,
            h.overall_rating.map_or(false, |r| r <= 2) && !h.has_emergency_services
        );
    }
    Ok(())
}

#[test]
fn test_single_row_scenario() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let csv_path = dir.path().join("one.csv");
    write_csv(&csv_path, &[row("100001", "CA", "4", "Yes", "Y")])?;

    let orchestrator = PipelineOrchestrator::new(config_for(&dir, csv_path))?;
    orchestrator.run()?;

    let states = read_state_summaries(orchestrator.warehouse())?;
    assert_eq!(states.len(), 1);
    assert_eq!(states[0].total_hospitals, 1);
    assert_eq!(states[0].avg_rating, Some(4.0));
    assert_eq!(states[0].pct_with_emergency, 100.0);
    assert_eq!(states[0].pct_ehr_interop, Some(100.0));
    assert_eq!(states[0].quality_tier, QualityTier::AboveAverage);

    let hospitals = read_hospital_quality(orchestrator.warehouse())?;
    assert_eq!(hospitals[0].quality_classification, QualityClassification::HighQuality);
    assert!(!hospitals[0].access_risk_flag);
    Ok(())
}

#[test]
fn test_rows_without_facility_id_never_reach_the_marts() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let csv_path = dir.path().join("blank_ids.csv");
    write_csv(
        &csv_path,
        &[
            row("1", "CA", "4", "Yes", "Y"),
            row("", "CA", "1", "No", "N"),
            row("2", "CA", "Not Available", "No", ""),
        ],
    )?;

    let orchestrator = PipelineOrchestrator::new(config_for(&dir, csv_path))?;
    let result = orchestrator.run()?;
    assert_eq!(result.load.as_ref().map(|l| l.rows_loaded), Some(3));

    let wh = orchestrator.warehouse();
    assert_eq!(wh.row_count(STG_HOSPITALS)?, 2);
    assert_eq!(wh.row_count(MART_HOSPITAL_QUALITY)?, 2);
    let states = read_state_summaries(wh)?;
    assert_eq!(states[0].total_hospitals, 2);
    // The unavailable rating counts toward the total but not the average
    assert_eq!(states[0].avg_rating, Some(4.0));
    Ok(())
}

#[test]
fn test_duplicate_facility_id_fails_data_tests() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let csv_path = dir.path().join("dupes.csv");
    write_csv(&csv_path, &[row("1", "CA", "4", "Yes", "Y"), row("1", "CA", "3", "Yes", "Y")])?;

    let orchestrator = PipelineOrchestrator::new(config_for(&dir, csv_path))?;
    let err = orchestrator.run().unwrap_err();
    assert_eq!(err.exit_code(), 4);
    assert!(err.to_string().contains("unique_stg_hospitals_facility_id"));

    // Marts built before the test stage stay; delivery never ran
    assert!(orchestrator.warehouse().relation_exists(MART_STATE_SUMMARY)?);
    assert!(!dir.path().join("output/dashboard.svg").exists());
    assert!(!dir.path().join("output/run_results.json").exists());
    Ok(())
}

#[test]
fn test_missing_state_fails_data_tests_in_staging_and_mart() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let csv_path = dir.path().join("no_state.csv");
    write_csv(&csv_path, &[row("1", "CA", "4", "Yes", "Y"), row("2", "", "3", "No", "N")])?;

    let err = PipelineOrchestrator::new(config_for(&dir, csv_path))?.run().unwrap_err();
    assert_eq!(err.exit_code(), 4);
    let message = err.to_string();
    assert!(message.contains("not_null_stg_hospitals_state"));
    assert!(message.contains("not_null_mart_state_hospital_summary_state"));
    assert!(!dir.path().join("output/dashboard.svg").exists());
    Ok(())
}

#[test]
fn test_invalid_rating_fails_transform() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let csv_path = dir.path().join("bad_rating.csv");
    write_csv(&csv_path, &[row("1", "CA", "four", "Yes", "Y")])?;

    let err = PipelineOrchestrator::new(config_for(&dir, csv_path))?.run().unwrap_err();
    assert_eq!(err.exit_code(), 3);
    assert!(err.to_string().contains("1 = 'four'"));
    Ok(())
}

#[test]
fn test_missing_csv_fails_extract() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let err = PipelineOrchestrator::new(config_for(&dir, dir.path().join("absent.csv")))?
        .run()
        .unwrap_err();
    assert_eq!(err.exit_code(), 2);
    Ok(())
}

#[test]
fn test_single_stage_commands_against_existing_store() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let orchestrator = PipelineOrchestrator::new(config_for(&dir, bundled_csv()))?;

    let err = orchestrator.run_stages(&[Stage::Visualize]).unwrap_err();
    assert_eq!(err.exit_code(), 6);

    orchestrator.run_stages(&[Stage::ExtractLoad])?;
    orchestrator.run_stages(&Stage::TRANSFORM)?;
    let tested = orchestrator.run_stages(&[Stage::DataTests])?;
    assert!(tested.tests.as_ref().unwrap().is_success());

    let visualized = orchestrator.run_stages(&[Stage::Visualize])?;
    assert!(visualized.dashboard.as_ref().unwrap().exists());
    // Single stages do not record a run
    assert!(!orchestrator.run_results_path().exists());
    Ok(())
}
