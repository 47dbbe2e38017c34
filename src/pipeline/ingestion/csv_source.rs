use std::fs;
use std::path::Path;
use tracing::{debug, warn};

use crate::constants::*;
use crate::error::{PipelineError, Result};
use crate::types::RawHospitalRecord;

/// Header spellings accepted for each canonical column.
const HEADER_ALIASES: &[(&str, &[&str])] = &[
    (COL_FACILITY_ID, &["facility_id"]),
    (COL_FACILITY_NAME, &["facility_name"]),
    (COL_ADDRESS, &["address"]),
    (COL_CITY, &["City/Town", "citytown"]),
    (COL_STATE, &["state"]),
    (COL_ZIP_CODE, &["zip_code"]),
    (COL_COUNTY_NAME, &["County/Parish", "countyparish"]),
    (COL_PHONE_NUMBER, &["Telephone Number", "telephone_number"]),
    (COL_HOSPITAL_TYPE, &["hospital_type"]),
    (COL_HOSPITAL_OWNERSHIP, &["hospital_ownership"]),
    (COL_OVERALL_RATING, &["hospital_overall_rating"]),
    (COL_EMERGENCY_SERVICES, &["emergency_services"]),
    (COL_EHR_INTEROP, &["meets_criteria_for_promoting_interoperability_of_ehrs"]),
];

/// Canonical columns with no matching header. Headers must already be trimmed.
pub fn missing_columns(headers: &csv::StringRecord) -> Vec<&'static str> {
    HEADER_ALIASES
        .iter()
        .filter(|(canonical, aliases)| !headers.iter().any(|h| h == *canonical || aliases.contains(&h)))
        .map(|(canonical, _)| *canonical)
        .collect()
}

/// Read every record of the hospital CSV at `path`.
///
/// Fails on an unreadable file, a header row missing any canonical column, or a
/// malformed row. Extra columns are ignored. Header names are trimmed before both
/// the column check and row decoding.
pub fn read_records(path: &Path) -> Result<Vec<RawHospitalRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .from_path(path)
        .map_err(|e| PipelineError::Extract(format!("Failed to open CSV file {}: {}", path.display(), e)))?;

    let headers = reader.headers()?.clone();
    let missing = missing_columns(&headers);
    if !missing.is_empty() {
        return Err(PipelineError::Extract(format!(
            "CSV file {} is missing column(s): {}",
            path.display(),
            missing.join(", ")
        )));
    }
    if headers.len() > RAW_COLUMNS.len() {
        debug!("Ignoring {} extra column(s) in {}", headers.len() - RAW_COLUMNS.len(), path.display());
    }

    let mut records = Vec::new();
    for (idx, result) in reader.deserialize::<RawHospitalRecord>().enumerate() {
        // Header is line 1
        let record = result.map_err(|e| {
            PipelineError::Extract(format!("Malformed row at line {} of {}: {}", idx + 2, path.display(), e))
        })?;
        records.push(record);
    }

    if records.is_empty() {
        warn!("CSV file {} has a header but no rows", path.display());
    }

    Ok(records)
}

/// Write `records` as a CSV snapshot with the canonical headers.
pub fn write_records(path: &Path, records: &[RawHospitalRecord]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)?;
    if records.is_empty() {
        writer.write_record(RAW_COLUMNS)?;
    }
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}
