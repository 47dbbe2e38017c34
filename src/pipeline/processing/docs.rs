//! Model documentation: a JSON manifest plus a Markdown index with lineage.
//!
//! Output depends only on the declared models and tests, so regenerating it
//! without changes produces byte-identical files.

use serde::Serialize;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

use super::models::{all_models, ColumnDoc, Model};
use super::quality_gate::{tests_for_model, DataTest, TestKind};
use crate::constants::{RAW_COLUMNS, RAW_HOSPITALS};
use crate::error::{PipelineError, Result};

pub const MANIFEST_FILE: &str = "manifest.json";
pub const INDEX_FILE: &str = "index.md";

#[derive(Debug, Serialize)]
pub struct SourceDoc {
    pub name: &'static str,
    pub description: &'static str,
    pub columns: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct TestDoc {
    pub name: String,
    pub column: &'static str,
    #[serde(flatten)]
    pub kind: TestKind,
}

#[derive(Debug, Serialize)]
pub struct ModelDoc {
    #[serde(flatten)]
    pub model: Model,
    pub tests: Vec<TestDoc>,
}

#[derive(Debug, Serialize)]
pub struct Manifest {
    pub project: &'static str,
    pub sources: Vec<SourceDoc>,
    pub models: Vec<ModelDoc>,
}

/// Paths of the generated documents
#[derive(Debug, Clone, Serialize)]
pub struct DocsOutput {
    pub manifest: PathBuf,
    pub index: PathBuf,
    pub models: usize,
}

pub fn build_manifest(suite: &[DataTest]) -> Manifest {
    let models = all_models()
        .into_iter()
        .map(|model| {
            let tests = tests_for_model(suite, model.name)
                .into_iter()
                .map(|t| TestDoc {
                    name: t.name(),
                    column: t.column,
                    kind: t.kind.clone(),
                })
                .collect();
            ModelDoc { model, tests }
        })
        .collect();

    Manifest {
        project: env!("CARGO_PKG_NAME"),
        sources: vec![SourceDoc {
            name: RAW_HOSPITALS,
            description: "CMS Hospital General Information, loaded verbatim from CSV",
            columns: RAW_COLUMNS.to_vec(),
        }],
        models,
    }
}

fn column_table(out: &mut String, columns: &[ColumnDoc]) {
    out.push_str("| Column | Description |\n|---|---|\n");
    for c in columns {
        let _ = writeln!(out, "| `{}` | {} |", c.name, c.description.replace('|', "\\|"));
    }
}

pub fn render_index(manifest: &Manifest) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# {} models\n", manifest.project);

    out.push_str("## Lineage\n\n");
    for model in &manifest.models {
        for upstream in &model.model.depends_on {
            let _ = writeln!(out, "- `{}` → `{}`", upstream, model.model.name);
        }
    }

    out.push_str("\n## Sources\n\n");
    for source in &manifest.sources {
        let _ = writeln!(out, "### {}\n\n{}\n", source.name, source.description);
        for column in &source.columns {
            let _ = writeln!(out, "- `{column}`");
        }
    }

    out.push_str("\n## Models\n");
    for doc in &manifest.models {
        let m = &doc.model;
        let _ = writeln!(
            out,
            "\n### {}\n\n*{:?} layer, materialized as {:?}*\n\n{}\n",
            m.name, m.layer, m.materialization, m.description
        );
        column_table(&mut out, &m.columns);

        if !doc.tests.is_empty() {
            out.push_str("\nTests:\n\n");
            for t in &doc.tests {
                let _ = writeln!(out, "- `{}`", t.name);
            }
        }
    }
    out
}

fn write_doc(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents).map_err(|e| PipelineError::Docs(format!("cannot write {}: {}", path.display(), e)))
}

/// Write `manifest.json` and `index.md` into `docs_dir`.
#[instrument(skip(suite))]
pub fn generate_docs(docs_dir: &Path, suite: &[DataTest]) -> Result<DocsOutput> {
    fs::create_dir_all(docs_dir)
        .map_err(|e| PipelineError::Docs(format!("cannot create {}: {}", docs_dir.display(), e)))?;

    let manifest = build_manifest(suite);
    let manifest_path = docs_dir.join(MANIFEST_FILE);
    let index_path = docs_dir.join(INDEX_FILE);

    write_doc(&manifest_path, &serde_json::to_string_pretty(&manifest)?)?;
    write_doc(&index_path, &render_index(&manifest))?;

    info!("Wrote docs for {} models to {}", manifest.models.len(), docs_dir.display());
    Ok(DocsOutput {
        manifest: manifest_path,
        index: index_path,
        models: manifest.models.len(),
    })
}
