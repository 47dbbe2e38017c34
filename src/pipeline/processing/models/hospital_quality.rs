use super::{col, get_label, Layer, Model};
use crate::constants::{MART_HOSPITAL_QUALITY, STG_HOSPITALS};
use crate::error::Result;
use crate::storage::{Materialization, Warehouse};
use crate::types::{HospitalQualityRow, OwnershipCategory, QualityClassification};

pub fn sql() -> String {
    format!(
        r#"SELECT
    facility_id,
    facility_name,
    city,
    state,
    hospital_type,
    hospital_ownership,
    overall_rating,
    has_emergency_services,
    meets_ehr_interop_criteria,
    CASE
        WHEN overall_rating >= 4 THEN '{high}'
        WHEN overall_rating = 3 THEN '{average}'
        WHEN overall_rating <= 2 THEN '{needs_improvement}'
        ELSE '{not_rated}'
    END AS quality_classification,
    CASE
        WHEN instr(hospital_ownership, 'non-profit') > 0 THEN '{non_profit}'
        WHEN hospital_ownership = 'Proprietary' THEN '{for_profit}'
        WHEN instr(hospital_ownership, 'Government') > 0 THEN '{government}'
        ELSE '{other}'
    END AS ownership_category,
    CASE WHEN overall_rating <= 2 AND has_emergency_services = 0 THEN 1 ELSE 0 END AS access_risk_flag
FROM {stg}
ORDER BY facility_id"#,
        high = QualityClassification::HighQuality,
        average = QualityClassification::Average,
        needs_improvement = QualityClassification::NeedsImprovement,
        not_rated = QualityClassification::NotRated,
        non_profit = OwnershipCategory::NonProfit,
        for_profit = OwnershipCategory::ForProfit,
        government = OwnershipCategory::Government,
        other = OwnershipCategory::Other,
        stg = STG_HOSPITALS,
    )
}

pub fn model() -> Model {
    Model {
        name: MART_HOSPITAL_QUALITY,
        layer: Layer::Mart,
        materialization: Materialization::Table,
        description: "One row per hospital with quality, ownership and access-risk classifications.",
        depends_on: vec![STG_HOSPITALS],
        columns: vec![
            col("facility_id", "CMS facility identifier"),
            col("facility_name", "Hospital name"),
            col("city", "City"),
            col("state", "State code"),
            col("hospital_type", "CMS hospital type"),
            col("hospital_ownership", "Ownership text as published"),
            col("overall_rating", "Star rating 1-5 or NULL"),
            col("has_emergency_services", "Emergency services offered"),
            col("meets_ehr_interop_criteria", "EHR interoperability, NULL when unknown"),
            col("quality_classification", "High Quality (4-5), Average (3), Needs Improvement (1-2), Not Rated"),
            col("ownership_category", "Non-Profit, For-Profit, Government or Other"),
            col("access_risk_flag", "Rated 2 or lower and no emergency services"),
        ],
        sql: sql(),
        order_by: "facility_id",
        guard: None,
    }
}

pub fn read_hospital_quality(warehouse: &Warehouse) -> Result<Vec<HospitalQualityRow>> {
    warehouse.query_rows(
        &format!("SELECT * FROM {MART_HOSPITAL_QUALITY} ORDER BY facility_id"),
        |row| {
            Ok(HospitalQualityRow {
                facility_id: row.get(0)?,
                facility_name: row.get(1)?,
                city: row.get(2)?,
                state: row.get(3)?,
                hospital_type: row.get(4)?,
                hospital_ownership: row.get(5)?,
                overall_rating: row.get(6)?,
                has_emergency_services: row.get(7)?,
                meets_ehr_interop_criteria: row.get(8)?,
                quality_classification: get_label(row, 9)?,
                ownership_category: get_label(row, 10)?,
                access_risk_flag: row.get(11)?,
            })
        },
    )
}
