//! SQL models: the staging view and the two mart tables built on top of it.
//!
//! Each model is a SELECT over its upstream relations plus the metadata the docs
//! generator and the data tests need. Building a model replaces its relation in one
//! transaction.

pub mod hospital_quality;
pub mod staging;
pub mod state_summary;

use serde::Serialize;
use std::str::FromStr;
use std::time::Instant;
use tracing::{info, instrument};

use crate::error::{PipelineError, Result};
use crate::storage::{Materialization, Warehouse};
use crate::types::UnknownLabel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    Staging,
    Mart,
}

#[derive(Debug, Clone, Serialize)]
pub struct ColumnDoc {
    pub name: &'static str,
    pub description: &'static str,
}

pub const fn col(name: &'static str, description: &'static str) -> ColumnDoc {
    ColumnDoc { name, description }
}

/// Check run against the upstream data before a model is built
pub type BuildGuard = fn(&Warehouse) -> Result<()>;

#[derive(Debug, Clone, Serialize)]
pub struct Model {
    pub name: &'static str,
    pub layer: Layer,
    pub materialization: Materialization,
    pub description: &'static str,
    pub depends_on: Vec<&'static str>,
    pub columns: Vec<ColumnDoc>,
    pub sql: String,
    /// Deterministic ordering used when fingerprinting the relation
    pub order_by: &'static str,
    #[serde(skip)]
    pub guard: Option<BuildGuard>,
}

/// Outcome of building one model
#[derive(Debug, Clone, Serialize)]
pub struct ModelBuild {
    pub model: String,
    pub materialization: Materialization,
    pub rows: i64,
    pub elapsed_ms: u128,
}

/// Every model in dependency order.
pub fn all_models() -> Vec<Model> {
    let mut models = vec![staging::model()];
    models.extend(mart_models());
    models
}

pub fn mart_models() -> Vec<Model> {
    vec![state_summary::model(), hospital_quality::model()]
}

fn transform_error(model: &Model, err: impl std::fmt::Display) -> PipelineError {
    PipelineError::Transform {
        model: model.name.to_string(),
        message: err.to_string(),
    }
}

/// Build `model`: verify its inputs exist, run its guard, then replace its relation.
#[instrument(skip_all, fields(model = model.name))]
pub fn build_model(warehouse: &Warehouse, model: &Model) -> Result<ModelBuild> {
    let started = Instant::now();

    for upstream in &model.depends_on {
        if !warehouse.relation_exists(upstream)? {
            return Err(transform_error(model, format!("upstream relation '{upstream}' does not exist")));
        }
    }

    if let Some(guard) = model.guard {
        guard(warehouse)?;
    }

    warehouse
        .materialize(model.name, model.materialization, &model.sql)
        .map_err(|e| transform_error(model, e))?;
    let rows = warehouse.row_count(model.name).map_err(|e| transform_error(model, e))?;

    let build = ModelBuild {
        model: model.name.to_string(),
        materialization: model.materialization,
        rows,
        elapsed_ms: started.elapsed().as_millis(),
    };
    info!("Built {} ({:?}, {} rows)", model.name, model.materialization, rows);
    Ok(build)
}

/// Read a text column holding one of an enum's labels.
pub(crate) fn get_label<T>(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = UnknownLabel>,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e)))
}
