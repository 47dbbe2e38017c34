use super::{col, Layer, Model};
use crate::constants::*;
use crate::error::{PipelineError, Result};
use crate::storage::{quote_ident, Materialization, Warehouse};
use crate::types::StagedHospital;

/// Rename, filter and cast the raw rows. Row-local only.
pub fn sql() -> String {
    let q = quote_ident;
    format!(
        r#"SELECT
    {id} AS facility_id,
    {name} AS facility_name,
    {address} AS address,
    {city} AS city,
    {state} AS state,
    {zip} AS zip_code,
    {county} AS county_name,
    {phone} AS phone_number,
    {htype} AS hospital_type,
    {ownership} AS hospital_ownership,
    CASE
        WHEN {rating} IS NULL OR TRIM({rating}) IN ('', '{na}') THEN NULL
        ELSE CAST(TRIM({rating}) AS INTEGER)
    END AS overall_rating,
    CASE WHEN {emergency} = 'Yes' THEN 1 ELSE 0 END AS has_emergency_services,
    CASE {ehr} WHEN 'Y' THEN 1 WHEN 'N' THEN 0 ELSE NULL END AS meets_ehr_interop_criteria
FROM {raw}
WHERE {id} IS NOT NULL AND TRIM({id}) <> ''"#,
        id = q(COL_FACILITY_ID),
        name = q(COL_FACILITY_NAME),
        address = q(COL_ADDRESS),
        city = q(COL_CITY),
        state = q(COL_STATE),
        zip = q(COL_ZIP_CODE),
        county = q(COL_COUNTY_NAME),
        phone = q(COL_PHONE_NUMBER),
        htype = q(COL_HOSPITAL_TYPE),
        ownership = q(COL_HOSPITAL_OWNERSHIP),
        rating = q(COL_OVERALL_RATING),
        na = RATING_NOT_AVAILABLE,
        emergency = q(COL_EMERGENCY_SERVICES),
        ehr = q(COL_EHR_INTEROP),
        raw = RAW_HOSPITALS,
    )
}

/// Ratings that are neither the missing-value sentinel nor 1..5 fail the build.
pub fn check_ratings(warehouse: &Warehouse) -> Result<()> {
    let id = quote_ident(COL_FACILITY_ID);
    let rating = quote_ident(COL_OVERALL_RATING);
    let offending_where = format!(
        "{id} IS NOT NULL AND TRIM({id}) <> '' AND {rating} IS NOT NULL \
         AND TRIM({rating}) NOT IN ('', '{na}', '1', '2', '3', '4', '5')",
        na = RATING_NOT_AVAILABLE,
    );

    let count = warehouse.scalar_count(&format!("SELECT COUNT(*) FROM {RAW_HOSPITALS} WHERE {offending_where}"))?;
    if count == 0 {
        return Ok(());
    }

    let examples = warehouse.query_rows(
        &format!("SELECT {id}, {rating} FROM {RAW_HOSPITALS} WHERE {offending_where} LIMIT 3"),
        |row| Ok(format!("{} = '{}'", row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
    )?;

    Err(PipelineError::Transform {
        model: STG_HOSPITALS.to_string(),
        message: format!(
            "{} row(s) have a rating outside 1..5 / '{}': {}",
            count,
            RATING_NOT_AVAILABLE,
            examples.join(", ")
        ),
    })
}

pub fn model() -> Model {
    Model {
        name: STG_HOSPITALS,
        layer: Layer::Staging,
        materialization: Materialization::View,
        description: "One row per raw hospital record with a facility id; columns renamed, \
                      rating cast to an integer, Yes/No flags normalized.",
        depends_on: vec![RAW_HOSPITALS],
        columns: vec![
            col("facility_id", "CMS facility identifier; present and unique"),
            col("facility_name", "Hospital name"),
            col("address", "Street address"),
            col("city", "City"),
            col("state", "Two-letter state code"),
            col("zip_code", "ZIP code"),
            col("county_name", "County"),
            col("phone_number", "Phone number"),
            col("hospital_type", "CMS hospital type"),
            col("hospital_ownership", "Ownership text as published"),
            col("overall_rating", "Star rating 1-5, NULL when not available"),
            col("has_emergency_services", "True iff the source says exactly 'Yes'"),
            col("meets_ehr_interop_criteria", "Y/N flag as a tri-state boolean, NULL when unknown"),
        ],
        sql: sql(),
        order_by: "facility_id",
        guard: Some(check_ratings),
    }
}

pub fn read_staged(warehouse: &Warehouse) -> Result<Vec<StagedHospital>> {
    warehouse.query_rows(
        &format!("SELECT * FROM {STG_HOSPITALS} ORDER BY facility_id"),
        |row| {
            Ok(StagedHospital {
                facility_id: row.get(0)?,
                facility_name: row.get(1)?,
                address: row.get(2)?,
                city: row.get(3)?,
                state: row.get(4)?,
                zip_code: row.get(5)?,
                county_name: row.get(6)?,
                phone_number: row.get(7)?,
                hospital_type: row.get(8)?,
                hospital_ownership: row.get(9)?,
                overall_rating: row.get(10)?,
                has_emergency_services: row.get(11)?,
                meets_ehr_interop_criteria: row.get(12)?,
            })
        },
    )
}
