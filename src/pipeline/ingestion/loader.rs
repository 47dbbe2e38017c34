use serde::Serialize;
use tracing::{info, instrument, warn};

use super::{cms_api, csv_source, sample};
use crate::config::{SourceConfig, SourceKind};
use crate::constants::RAW_HOSPITALS;
use crate::error::Result;
use crate::idempotency::file_fingerprint;
use crate::storage::Warehouse;

/// Result of the extract-load stage
#[derive(Debug, Clone, Serialize)]
pub struct LoadSummary {
    pub source_kind: String,
    pub csv_path: String,
    pub rows_loaded: usize,
    pub csv_sha256: String,
}

/// Make sure the CSV to load exists, acquiring it for API and sample sources.
fn acquire_csv(config: &SourceConfig) -> Result<&'static str> {
    match config.kind {
        SourceKind::Csv => Ok("csv"),
        SourceKind::Api => match cms_api::extract_records(config) {
            Ok(records) => {
                csv_source::write_records(&config.snapshot_path, &records)?;
                info!("Wrote API snapshot of {} records to {}", records.len(), config.snapshot_path.display());
                Ok("api")
            }
            Err(e) if config.fallback_to_sample => {
                warn!("API extraction failed ({}), falling back to sample data", e);
                write_sample(config)?;
                Ok("sample")
            }
            Err(e) => Err(e),
        },
        SourceKind::Sample => {
            write_sample(config)?;
            Ok("sample")
        }
    }
}

fn write_sample(config: &SourceConfig) -> Result<()> {
    let records = sample::generate(config.sample_size, config.sample_seed)?;
    csv_source::write_records(&config.snapshot_path, &records)?;
    info!(
        "Wrote {} sample records (seed {}) to {}",
        records.len(),
        config.sample_seed,
        config.snapshot_path.display()
    );
    Ok(())
}

/// Extract the hospital CSV and load it verbatim into the raw relation.
#[instrument(skip_all, fields(source = ?config.kind))]
pub fn extract_load(config: &SourceConfig, warehouse: &Warehouse) -> Result<LoadSummary> {
    let source_kind = acquire_csv(config)?;
    let path = config.load_path();

    let records = csv_source::read_records(path)?;
    let csv_sha256 = file_fingerprint(path)?;
    let rows_loaded = warehouse.replace_raw_hospitals(&records)?;

    info!("Loaded {} rows into {}", rows_loaded, RAW_HOSPITALS);

    Ok(LoadSummary {
        source_kind: source_kind.to_string(),
        csv_path: path.display().to_string(),
        rows_loaded,
        csv_sha256,
    })
}
