use serde::Serialize;
use std::fmt;
use tracing::{error, info};

use crate::constants::{MART_HOSPITAL_QUALITY, MART_STATE_SUMMARY, STG_HOSPITALS};
use crate::error::{PipelineError, Result};
use crate::storage::{quote_ident, Warehouse};
use crate::types::{OwnershipCategory, QualityClassification, QualityTier};

/// Kind of assertion a data test makes about one column
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "values", rename_all = "snake_case")]
pub enum TestKind {
    /// No non-null value appears more than once
    Unique,
    /// No row has a NULL value
    NotNull,
    /// Every non-null value, compared as text, is in the set
    AcceptedValues(Vec<String>),
}

impl TestKind {
    pub fn slug(&self) -> &'static str {
        match self {
            TestKind::Unique => "unique",
            TestKind::NotNull => "not_null",
            TestKind::AcceptedValues(_) => "accepted_values",
        }
    }
}

/// One declarative assertion over a model column
#[derive(Debug, Clone, Serialize)]
pub struct DataTest {
    pub model: &'static str,
    pub column: &'static str,
    pub kind: TestKind,
}

impl DataTest {
    pub fn new(model: &'static str, column: &'static str, kind: TestKind) -> Self {
        Self { model, column, kind }
    }

    /// Stable identifier, e.g. `unique_stg_hospitals_facility_id`
    pub fn name(&self) -> String {
        format!("{}_{}_{}", self.kind.slug(), self.model, self.column)
    }

    /// SQL returning the number of offending rows.
    pub fn compile_sql(&self) -> String {
        let column = quote_ident(self.column);
        let model = quote_ident(self.model);
        match &self.kind {
            TestKind::Unique => format!(
                "SELECT COALESCE(SUM(n), 0) FROM (\
                 SELECT COUNT(*) AS n FROM {model} WHERE {column} IS NOT NULL \
                 GROUP BY {column} HAVING COUNT(*) > 1)"
            ),
            TestKind::NotNull => format!("SELECT COUNT(*) FROM {model} WHERE {column} IS NULL"),
            TestKind::AcceptedValues(values) => {
                let list = values
                    .iter()
                    .map(|v| format!("'{}'", v.replace('\'', "''")))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!(
                    "SELECT COUNT(*) FROM {model} WHERE {column} IS NOT NULL \
                     AND CAST({column} AS TEXT) NOT IN ({list})"
                )
            }
        }
    }
}

impl fmt::Display for DataTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Outcome of one data test
#[derive(Debug, Clone, Serialize)]
pub struct TestResult {
    pub name: String,
    pub passed: bool,
    pub failing_rows: i64,
}

/// Outcome of a whole suite, in declaration order
#[derive(Debug, Clone, Default, Serialize)]
pub struct TestReport {
    pub results: Vec<TestResult>,
}

impl TestReport {
    pub fn passed(&self) -> usize {
        self.results.iter().filter(|r| r.passed).count()
    }

    /// Failed tests; any one of them fails the phase
    pub fn failures(&self) -> Vec<&TestResult> {
        self.results.iter().filter(|r| !r.passed).collect()
    }

    pub fn is_success(&self) -> bool {
        self.results.iter().all(|r| r.passed)
    }

    /// Convert a report with any failure into the stage error.
    pub fn into_result(self) -> Result<TestReport> {
        let failures = self.failures();
        if failures.is_empty() {
            return Ok(self);
        }
        Err(PipelineError::DataTests {
            failed: failures.len(),
            names: failures.iter().map(|r| r.name.clone()).collect(),
        })
    }
}

/// Trait for running a data-test suite against the warehouse
pub trait QualityGate {
    fn evaluate(&self, warehouse: &Warehouse) -> Result<TestReport>;
}

/// Quality gate over a fixed list of declarative tests
pub struct DefaultQualityGate {
    pub suite: Vec<DataTest>,
}

impl DefaultQualityGate {
    /// Gate running the declared suite for the staging view and both marts
    pub fn new() -> Self {
        Self::with_suite(default_suite())
    }

    pub fn with_suite(suite: Vec<DataTest>) -> Self {
        Self { suite }
    }
}

impl Default for DefaultQualityGate {
    fn default() -> Self {
        Self::new()
    }
}

impl QualityGate for DefaultQualityGate {
    fn evaluate(&self, warehouse: &Warehouse) -> Result<TestReport> {
        let mut report = TestReport::default();

        for test in &self.suite {
            let failing_rows = warehouse.scalar_count(&test.compile_sql())?;
            let passed = failing_rows == 0;
            let name = test.name();

            if passed {
                info!("PASS {}", name);
            } else {
                error!("FAIL {} ({} failing rows)", name, failing_rows);
            }

            report.results.push(TestResult {
                name,
                passed,
                failing_rows,
            });
        }

        info!(
            "Data tests: {} passed, {} failed",
            report.passed(),
            report.failures().len()
        );
        Ok(report)
    }
}

fn accepted<I, S>(values: I) -> TestKind
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    TestKind::AcceptedValues(values.into_iter().map(Into::into).collect())
}

/// The declared test suite for the staging view and both marts.
pub fn default_suite() -> Vec<DataTest> {
    use TestKind::{NotNull, Unique};

    vec![
        DataTest::new(STG_HOSPITALS, "facility_id", Unique),
        DataTest::new(STG_HOSPITALS, "facility_id", NotNull),
        DataTest::new(STG_HOSPITALS, "has_emergency_services", NotNull),
        DataTest::new(STG_HOSPITALS, "overall_rating", accepted(["1", "2", "3", "4", "5"])),
        DataTest::new(STG_HOSPITALS, "state", NotNull),
        DataTest::new(MART_STATE_SUMMARY, "state", Unique),
        DataTest::new(MART_STATE_SUMMARY, "state", NotNull),
        DataTest::new(MART_STATE_SUMMARY, "quality_tier", accepted(QualityTier::labels())),
        DataTest::new(MART_HOSPITAL_QUALITY, "facility_id", Unique),
        DataTest::new(MART_HOSPITAL_QUALITY, "facility_id", NotNull),
        DataTest::new(
            MART_HOSPITAL_QUALITY,
            "quality_classification",
            accepted(QualityClassification::labels()),
        ),
        DataTest::new(MART_HOSPITAL_QUALITY, "ownership_category", accepted(OwnershipCategory::labels())),
        DataTest::new(MART_HOSPITAL_QUALITY, "access_risk_flag", NotNull),
    ]
}

/// Tests attached to one model, for the docs.
pub fn tests_for_model<'a>(suite: &'a [DataTest], model: &str) -> Vec<&'a DataTest> {
    suite.iter().filter(|t| t.model == model).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Materialization;

    fn warehouse_with(sql: &str) -> Warehouse {
        let wh = Warehouse::open_in_memory().unwrap();
        wh.materialize("t", Materialization::Table, sql).unwrap();
        wh
    }

    fn run_tests(wh: &Warehouse, suite: &[DataTest]) -> Result<TestReport> {
        DefaultQualityGate::with_suite(suite.to_vec()).evaluate(wh)?.into_result()
    }

    fn failing_rows(wh: &Warehouse, test: DataTest) -> i64 {
        wh.scalar_count(&test.compile_sql()).unwrap()
    }

    #[test]
    fn test_unique_counts_every_duplicated_row() {
        let wh = warehouse_with(
            "SELECT 'a' AS id UNION ALL SELECT 'a' UNION ALL SELECT 'b' \
             UNION ALL SELECT NULL UNION ALL SELECT NULL",
        );
        assert_eq!(failing_rows(&wh, DataTest::new("t", "id", TestKind::Unique)), 2);
        assert_eq!(failing_rows(&wh, DataTest::new("t", "id", TestKind::NotNull)), 2);
    }

    #[test]
    fn test_accepted_values_ignores_nulls_and_compares_as_text() {
        let wh = warehouse_with("SELECT 1 AS r UNION ALL SELECT 5 UNION ALL SELECT 7 UNION ALL SELECT NULL");
        let test = DataTest::new("t", "r", accepted(["1", "2", "3", "4", "5"]));
        assert_eq!(failing_rows(&wh, test), 1);
    }

    #[test]
    fn test_accepted_values_escapes_quotes() {
        let wh = warehouse_with("SELECT 'O''Brien' AS name");
        assert_eq!(failing_rows(&wh, DataTest::new("t", "name", accepted(["O'Brien"]))), 0);
    }

    #[test]
    fn test_names() {
        let test = DataTest::new(STG_HOSPITALS, "facility_id", TestKind::Unique);
        assert_eq!(test.name(), "unique_stg_hospitals_facility_id");
        let test = DataTest::new(MART_STATE_SUMMARY, "quality_tier", accepted(QualityTier::labels()));
        assert_eq!(test.name(), "accepted_values_mart_state_hospital_summary_quality_tier");
    }

    #[test]
    fn test_single_failing_assertion_fails_the_phase() {
        let wh = warehouse_with("SELECT 'x' AS id, NULL AS state");
        let suite = vec![
            DataTest::new("t", "id", TestKind::NotNull),
            DataTest::new("t", "state", TestKind::NotNull),
        ];

        let report = DefaultQualityGate::with_suite(suite.clone()).evaluate(&wh).unwrap();
        assert_eq!(report.passed(), 1);
        assert!(!report.is_success());

        match run_tests(&wh, &suite).unwrap_err() {
            PipelineError::DataTests { failed, names } => {
                assert_eq!(failed, 1);
                assert_eq!(names, vec!["not_null_t_state".to_string()]);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_failures_are_named_in_declaration_order() {
        let wh = warehouse_with("SELECT 'x' AS id UNION ALL SELECT 'x'");
        let suite = vec![
            DataTest::new("t", "id", TestKind::Unique),
            DataTest::new("t", "id", TestKind::NotNull),
            DataTest::new("t", "id", accepted(["y"])),
        ];
        match run_tests(&wh, &suite).unwrap_err() {
            PipelineError::DataTests { failed, names } => {
                assert_eq!(failed, 2);
                assert_eq!(names, vec!["unique_t_id".to_string(), "accepted_values_t_id".to_string()]);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_default_suite_shape() {
        let suite = default_suite();
        assert_eq!(suite.len(), 13);
        assert_eq!(tests_for_model(&suite, STG_HOSPITALS).len(), 5);
        assert_eq!(tests_for_model(&suite, MART_STATE_SUMMARY).len(), 3);
        assert_eq!(tests_for_model(&suite, MART_HOSPITAL_QUALITY).len(), 5);
    }

    #[test]
    fn test_missing_relation_is_a_warehouse_error() {
        let wh = Warehouse::open_in_memory().unwrap();
        let err = DefaultQualityGate::new().evaluate(&wh).unwrap_err();
        assert!(matches!(err, PipelineError::Warehouse(_)));
    }
}
