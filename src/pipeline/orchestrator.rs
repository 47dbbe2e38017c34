use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::delivery::{self, Insights};
use super::ingestion::{extract_load, LoadSummary};
use super::processing::docs::{generate_docs, DocsOutput};
use super::processing::models::{all_models, build_model, mart_models, staging, ModelBuild};
use super::processing::quality_gate::{DefaultQualityGate, QualityGate, TestReport};
use crate::config::Config;
use crate::constants::*;
use crate::error::Result;
use crate::idempotency::RunFingerprints;
use crate::storage::Warehouse;

pub const RUN_RESULTS_FILE: &str = "run_results.json";

/// Pipeline stages in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    ExtractLoad,
    Staging,
    Marts,
    DataTests,
    Docs,
    Visualize,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::ExtractLoad,
        Stage::Staging,
        Stage::Marts,
        Stage::DataTests,
        Stage::Docs,
        Stage::Visualize,
    ];

    /// The transform step: staging view, then the marts
    pub const TRANSFORM: [Stage; 2] = [Stage::Staging, Stage::Marts];

    pub fn name(self) -> &'static str {
        match self {
            Stage::ExtractLoad => STAGE_EXTRACT_LOAD,
            Stage::Staging => STAGE_STAGING,
            Stage::Marts => STAGE_MARTS,
            Stage::DataTests => STAGE_DATA_TESTS,
            Stage::Docs => STAGE_DOCS,
            Stage::Visualize => STAGE_VISUALIZE,
        }
    }
}

/// Result of executing one pipeline stage
#[derive(Debug, Clone, Serialize)]
pub struct StepResult {
    pub stage: &'static str,
    pub processed_count: usize,
    pub message: String,
    pub elapsed_ms: u128,
}

impl StepResult {
    pub fn new(stage: Stage, processed: usize, message: String) -> Self {
        Self {
            stage: stage.name(),
            processed_count: processed,
            message,
            elapsed_ms: 0,
        }
    }
}

/// Result of executing a sequence of stages; written as `run_results.json` after a full run
#[derive(Debug, Clone, Serialize)]
pub struct PipelineExecutionResult {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub steps: Vec<StepResult>,
    pub load: Option<LoadSummary>,
    pub models: Vec<ModelBuild>,
    pub tests: Option<TestReport>,
    pub docs: Option<DocsOutput>,
    pub insights: Option<Insights>,
    pub dashboard: Option<PathBuf>,
    pub fingerprints: RunFingerprints,
    /// Relations whose fingerprint differs from the previous recorded run
    pub changed_relations: Vec<String>,
}

impl PipelineExecutionResult {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            completed_at: None,
            steps: Vec::new(),
            load: None,
            models: Vec::new(),
            tests: None,
            docs: None,
            insights: None,
            dashboard: None,
            fingerprints: RunFingerprints::default(),
            changed_relations: Vec::new(),
        }
    }

    pub fn complete(&mut self) {
        self.completed_at = Some(Utc::now());
    }

    pub fn duration(&self) -> Option<chrono::Duration> {
        self.completed_at.map(|end| end - self.started_at)
    }

    pub fn total_processed(&self) -> usize {
        self.steps.iter().map(|s| s.processed_count).sum()
    }
}

impl Default for PipelineExecutionResult {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs the stages in order against one warehouse connection
pub struct PipelineOrchestrator {
    config: Config,
    warehouse: Warehouse,
    gate: DefaultQualityGate,
}

impl PipelineOrchestrator {
    /// Open the configured warehouse file
    pub fn new(config: Config) -> Result<Self> {
        let warehouse = Warehouse::open(&config.warehouse.path)?;
        Ok(Self::with_warehouse(config, warehouse))
    }

    pub fn with_warehouse(config: Config, warehouse: Warehouse) -> Self {
        Self {
            config,
            warehouse,
            gate: DefaultQualityGate::new(),
        }
    }

    pub fn warehouse(&self) -> &Warehouse {
        &self.warehouse
    }

    pub fn run_results_path(&self) -> PathBuf {
        self.config.output.dir.join(RUN_RESULTS_FILE)
    }

    /// Run every stage, then fingerprint the relations and write `run_results.json`.
    pub fn run(&self) -> Result<PipelineExecutionResult> {
        let mut result = self.run_stages(&Stage::ALL)?;
        self.record_fingerprints(&mut result)?;
        self.write_run_results(&result)?;
        Ok(result)
    }

    /// Run `stages` in order, stopping at the first failure.
    ///
    /// Relations built by earlier stages stay in place when a later stage fails.
    pub fn run_stages(&self, stages: &[Stage]) -> Result<PipelineExecutionResult> {
        let mut result = PipelineExecutionResult::new();
        info!("🚀 Starting pipeline run {} ({} stages)", result.run_id, stages.len());

        for (index, &stage) in stages.iter().enumerate() {
            info!("🔄 Executing stage {}/{}: {}", index + 1, stages.len(), stage.name());
            let started = Instant::now();

            match self.execute(stage, &mut result) {
                Ok(mut step) => {
                    step.elapsed_ms = started.elapsed().as_millis();
                    info!("✅ Stage '{}' completed: {}", stage.name(), step.message);
                    result.steps.push(step);
                }
                Err(e) => {
                    error!(
                        "❌ Stage '{}' failed after {} ms: {}",
                        stage.name(),
                        started.elapsed().as_millis(),
                        e
                    );
                    warn!("⏹️ Stopping pipeline execution due to previous error");
                    return Err(e.in_stage(stage.name()));
                }
            }
        }

        result.complete();
        info!(
            "🎉 Pipeline run {} completed: {} stages, {} items processed",
            result.run_id,
            result.steps.len(),
            result.total_processed()
        );
        Ok(result)
    }

    fn execute(&self, stage: Stage, result: &mut PipelineExecutionResult) -> Result<StepResult> {
        match stage {
            Stage::ExtractLoad => {
                let load = extract_load(&self.config.source, &self.warehouse)?;
                let step = StepResult::new(
                    stage,
                    load.rows_loaded,
                    format!("loaded {} rows from {} ({})", load.rows_loaded, load.csv_path, load.source_kind),
                );
                result.load = Some(load);
                Ok(step)
            }
            Stage::Staging => {
                let build = build_model(&self.warehouse, &staging::model())?;
                let step = StepResult::new(
                    stage,
                    build.rows as usize,
                    format!("{} ready with {} rows", build.model, build.rows),
                );
                result.models.push(build);
                Ok(step)
            }
            Stage::Marts => {
                let mut names = Vec::new();
                for model in mart_models() {
                    let build = build_model(&self.warehouse, &model)?;
                    names.push(format!("{} ({} rows)", build.model, build.rows));
                    result.models.push(build);
                }
                Ok(StepResult::new(stage, names.len(), format!("built {}", names.join(", "))))
            }
            Stage::DataTests => {
                let report = self.gate.evaluate(&self.warehouse)?;
                let message = format!("{} passed, {} failed", report.passed(), report.failures().len());
                let processed = report.results.len();
                result.tests = Some(report.clone());
                report.into_result()?;
                Ok(StepResult::new(stage, processed, message))
            }
            Stage::Docs => {
                let docs = generate_docs(&self.config.output.docs_dir, &self.gate.suite)?;
                let step = StepResult::new(
                    stage,
                    docs.models,
                    format!("documented {} models in {}", docs.models, self.config.output.docs_dir.display()),
                );
                result.docs = Some(docs);
                Ok(step)
            }
            Stage::Visualize => {
                let output = delivery::visualize(&self.warehouse, &self.config.output)?;
                let step = StepResult::new(stage, 4, format!("dashboard saved to {}", output.dashboard.display()));
                result.dashboard = Some(output.dashboard);
                result.insights = Some(output.insights);
                Ok(step)
            }
        }
    }

    /// Fingerprint every model relation and compare against the last recorded run.
    pub fn record_fingerprints(&self, result: &mut PipelineExecutionResult) -> Result<()> {
        result.fingerprints.source = result.load.as_ref().map(|l| l.csv_sha256.clone());
        for model in all_models() {
            let fingerprint = self.warehouse.fingerprint(model.name, model.order_by)?;
            result.fingerprints.record(model.name, fingerprint);
        }

        let previous = self.previous_fingerprints();
        result.changed_relations = result.fingerprints.changed_since(&previous);
        if result.changed_relations.is_empty() {
            info!("No relation changed since the previous run");
        } else {
            info!("Changed since previous run: {}", result.changed_relations.join(", "));
        }
        Ok(())
    }

    /// Fingerprints from the last `run_results.json`; empty when there is none.
    fn previous_fingerprints(&self) -> RunFingerprints {
        let path = self.run_results_path();
        let Ok(content) = fs::read_to_string(&path) else {
            return RunFingerprints::default();
        };

        serde_json::from_str::<serde_json::Value>(&content)
            .ok()
            .and_then(|v| v.get("fingerprints").cloned())
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_else(|| {
                warn!("Ignoring unreadable previous run results at {}", path.display());
                RunFingerprints::default()
            })
    }

    pub fn write_run_results(&self, result: &PipelineExecutionResult) -> Result<()> {
        fs::create_dir_all(&self.config.output.dir)?;
        let path = self.run_results_path();
        fs::write(&path, serde_json::to_string_pretty(result)?)?;
        info!("Run results written to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SourceConfig, SourceKind};
    use tempfile::tempdir;

    fn sample_config(root: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.source = SourceConfig {
            kind: SourceKind::Sample,
            snapshot_path: root.join("snapshot.csv"),
            sample_size: 200,
            ..Default::default()
        };
        config.output.dir = root.join("output");
        config.output.docs_dir = root.join("docs");
        config
    }

    #[test]
    fn test_stage_names_match_exit_codes() {
        let codes: Vec<_> = Stage::ALL.iter().map(|s| stage_exit_code(s.name())).collect();
        assert_eq!(codes, vec![2, 3, 3, 4, 5, 6]);
    }

    #[test]
    fn test_full_run_on_sample_data() {
        let dir = tempdir().unwrap();
        let orchestrator =
            PipelineOrchestrator::with_warehouse(sample_config(dir.path()), Warehouse::open_in_memory().unwrap());

        let result = orchestrator.run().unwrap();
        assert_eq!(result.steps.len(), 6);
        assert_eq!(result.load.as_ref().unwrap().rows_loaded, 200);
        assert_eq!(result.models.len(), 3);
        assert!(result.tests.as_ref().unwrap().is_success());
        assert!(orchestrator.run_results_path().exists());
        assert_eq!(result.fingerprints.relations.len(), 3);
        assert!(result.duration().is_some_and(|d| d.num_milliseconds() >= 0));

        let again = orchestrator.run().unwrap();
        assert_eq!(again.fingerprints, result.fingerprints);
        assert!(again.changed_relations.is_empty());
    }

    #[test]
    fn test_transform_without_load_fails_in_staging() {
        let dir = tempdir().unwrap();
        let orchestrator =
            PipelineOrchestrator::with_warehouse(sample_config(dir.path()), Warehouse::open_in_memory().unwrap());
        let err = orchestrator.run_stages(&Stage::TRANSFORM).unwrap_err();
        assert_eq!(err.exit_code(), 3);
        assert!(err.to_string().starts_with("Stage 'staging' failed"));
    }
}
