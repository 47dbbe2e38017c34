use super::{col, get_label, Layer, Model};
use crate::constants::{ACUTE_CARE_TYPE, CRITICAL_ACCESS_TYPE, MART_STATE_SUMMARY, STG_HOSPITALS};
use crate::error::Result;
use crate::storage::{Materialization, Warehouse};
use crate::types::{QualityTier, StateSummary};

/// Per-state rollup. The first pass aggregates, the second derives ratios and the tier.
pub fn sql() -> String {
    format!(
        r#"WITH by_state AS (
    SELECT
        state,
        COUNT(*) AS total_hospitals,
        SUM(CASE WHEN hospital_type = '{acute}' THEN 1 ELSE 0 END) AS acute_care_count,
        SUM(CASE WHEN hospital_type = '{critical}' THEN 1 ELSE 0 END) AS critical_access_count,
        ROUND(AVG(overall_rating), 2) AS avg_rating,
        SUM(CASE WHEN overall_rating >= 4 THEN 1 ELSE 0 END) AS high_rated_count,
        SUM(CASE WHEN overall_rating <= 2 THEN 1 ELSE 0 END) AS low_rated_count,
        SUM(has_emergency_services) AS emergency_count,
        ROUND(100.0 * SUM(has_emergency_services) / COUNT(*), 1) AS pct_with_emergency,
        ROUND(
            100.0 * SUM(CASE WHEN meets_ehr_interop_criteria = 1 THEN 1 ELSE 0 END)
                / NULLIF(COUNT(meets_ehr_interop_criteria), 0),
            1
        ) AS pct_ehr_interop,
        SUM(CASE WHEN instr(hospital_ownership, 'non-profit') > 0 THEN 1 ELSE 0 END) AS nonprofit_count,
        SUM(CASE WHEN instr(hospital_ownership, 'Government') > 0 THEN 1 ELSE 0 END) AS government_count,
        SUM(CASE WHEN hospital_ownership = 'Proprietary' THEN 1 ELSE 0 END) AS proprietary_count
    FROM {stg}
    GROUP BY state
)
SELECT
    *,
    ROUND(100.0 * high_rated_count / total_hospitals, 1) AS pct_high_rated,
    ROUND(100.0 * nonprofit_count / total_hospitals, 1) AS pct_nonprofit,
    CASE
        WHEN avg_rating >= 3.5 THEN '{above}'
        WHEN avg_rating >= 2.5 THEN '{average}'
        ELSE '{below}'
    END AS quality_tier
FROM by_state
ORDER BY total_hospitals DESC, state ASC"#,
        acute = ACUTE_CARE_TYPE,
        critical = CRITICAL_ACCESS_TYPE,
        stg = STG_HOSPITALS,
        above = QualityTier::AboveAverage,
        average = QualityTier::Average,
        below = QualityTier::BelowAverage,
    )
}

pub fn model() -> Model {
    Model {
        name: MART_STATE_SUMMARY,
        layer: Layer::Mart,
        materialization: Materialization::Table,
        description: "One row per state: hospital counts by type, rating thresholds, emergency and \
                      EHR interoperability percentages, ownership counts and a quality tier.",
        depends_on: vec![STG_HOSPITALS],
        columns: vec![
            col("state", "State code; one row each"),
            col("total_hospitals", "Staged hospitals in the state"),
            col("acute_care_count", "Acute Care Hospitals"),
            col("critical_access_count", "Critical Access Hospitals"),
            col("avg_rating", "Mean of non-null ratings, 2 decimals"),
            col("high_rated_count", "Hospitals rated 4 or 5"),
            col("low_rated_count", "Hospitals rated 1 or 2"),
            col("emergency_count", "Hospitals with emergency services"),
            col("pct_with_emergency", "emergency_count / total_hospitals, percent, 1 decimal"),
            col("pct_ehr_interop", "Share of known EHR flags that are true, percent; NULL if none known"),
            col("nonprofit_count", "Ownership containing 'non-profit'"),
            col("government_count", "Ownership containing 'Government'"),
            col("proprietary_count", "Ownership exactly 'Proprietary'"),
            col("pct_high_rated", "high_rated_count / total_hospitals, percent"),
            col("pct_nonprofit", "nonprofit_count / total_hospitals, percent"),
            col("quality_tier", "Above Average (>= 3.5), Average (>= 2.5), Below Average"),
        ],
        sql: sql(),
        order_by: "state",
        guard: None,
    }
}

/// Mart rows in published order (most hospitals first).
pub fn read_state_summaries(warehouse: &Warehouse) -> Result<Vec<StateSummary>> {
    warehouse.query_rows(
        &format!("SELECT * FROM {MART_STATE_SUMMARY} ORDER BY total_hospitals DESC, state ASC"),
        |row| {
            Ok(StateSummary {
                state: row.get(0)?,
                total_hospitals: row.get(1)?,
                acute_care_count: row.get(2)?,
                critical_access_count: row.get(3)?,
                avg_rating: row.get(4)?,
                high_rated_count: row.get(5)?,
                low_rated_count: row.get(6)?,
                emergency_count: row.get(7)?,
                pct_with_emergency: row.get(8)?,
                pct_ehr_interop: row.get(9)?,
                nonprofit_count: row.get(10)?,
                government_count: row.get(11)?,
                proprietary_count: row.get(12)?,
                pct_high_rated: row.get(13)?,
                pct_nonprofit: row.get(14)?,
                quality_tier: get_label(row, 15)?,
            })
        },
    )
}

#[cfg(test)]
mod tests {
    use super::super::{build_model, staging};
    use super::*;
    use crate::types::RawHospitalRecord;

    fn hospital(id: &str, state: &str, rating: &str, htype: &str, ownership: &str, emergency: &str, ehr: &str) -> RawHospitalRecord {
        RawHospitalRecord {
            facility_id: Some(id.into()),
            state: Some(state.into()),
            overall_rating: Some(rating.into()),
            hospital_type: Some(htype.into()),
            hospital_ownership: Some(ownership.into()),
            emergency_services: Some(emergency.into()),
            ehr_interop: Some(ehr.into()),
            ..Default::default()
        }
    }

    fn summarize(records: &[RawHospitalRecord]) -> Vec<StateSummary> {
        let wh = Warehouse::open_in_memory().unwrap();
        wh.replace_raw_hospitals(records).unwrap();
        build_model(&wh, &staging::model()).unwrap();
        build_model(&wh, &model()).unwrap();
        read_state_summaries(&wh).unwrap()
    }

    #[test]
    fn test_single_hospital_state() {
        let rows = summarize(&[hospital("100001", "CA", "4", ACUTE_CARE_TYPE, "Proprietary", "Yes", "Y")]);
        assert_eq!(rows.len(), 1);
        let ca = &rows[0];
        assert_eq!(ca.state.as_deref(), Some("CA"));
        assert_eq!(ca.total_hospitals, 1);
        assert_eq!(ca.avg_rating, Some(4.0));
        assert_eq!(ca.pct_with_emergency, 100.0);
        assert_eq!(ca.pct_ehr_interop, Some(100.0));
        assert_eq!(ca.quality_tier, QualityTier::AboveAverage);
    }

    #[test]
    fn test_not_available_rating_counts_in_total_only() {
        let rows = summarize(&[
            hospital("1", "NY", "Not Available", ACUTE_CARE_TYPE, "Proprietary", "No", "N"),
            hospital("2", "NY", "2", CRITICAL_ACCESS_TYPE, "Government - Local", "Yes", ""),
            hospital("3", "NY", "5", "Psychiatric", "Voluntary non-profit - Private", "Yes", ""),
        ]);
        let ny = &rows[0];
        assert_eq!(ny.total_hospitals, 3);
        assert_eq!(ny.avg_rating, Some(3.5));
        assert_eq!(ny.high_rated_count, 1);
        assert_eq!(ny.low_rated_count, 1);
        assert_eq!(ny.acute_care_count + ny.critical_access_count, 2);
        assert_eq!(ny.emergency_count, 2);
        assert_eq!(ny.pct_with_emergency, 66.7);
        // Only one known EHR flag, and it is false
        assert_eq!(ny.pct_ehr_interop, Some(0.0));
        assert_eq!((ny.nonprofit_count, ny.government_count, ny.proprietary_count), (1, 1, 1));
        assert_eq!(ny.pct_high_rated, 33.3);
        assert_eq!(ny.pct_nonprofit, 33.3);
        assert_eq!(ny.quality_tier, QualityTier::AboveAverage);
    }

    #[test]
    fn test_unknown_ehr_and_ratings_give_nulls_and_below_average() {
        let rows = summarize(&[hospital("1", "TX", "Not Available", ACUTE_CARE_TYPE, "Proprietary", "No", "")]);
        let tx = &rows[0];
        assert_eq!(tx.pct_ehr_interop, None);
        assert_eq!(tx.avg_rating, None);
        assert_eq!(tx.quality_tier, QualityTier::BelowAverage);
    }

    #[test]
    fn test_rows_ordered_by_total_desc() {
        let rows = summarize(&[
            hospital("1", "WA", "3", ACUTE_CARE_TYPE, "Proprietary", "Yes", "Y"),
            hospital("2", "OR", "3", ACUTE_CARE_TYPE, "Proprietary", "Yes", "Y"),
            hospital("3", "OR", "1", ACUTE_CARE_TYPE, "Proprietary", "Yes", "Y"),
            hospital("4", "AK", "2", ACUTE_CARE_TYPE, "Proprietary", "Yes", "Y"),
        ]);
        let states: Vec<_> = rows.iter().map(|r| r.state.clone().unwrap()).collect();
        assert_eq!(states, vec!["OR", "AK", "WA"]);
        assert_eq!(rows[0].quality_tier, QualityTier::BelowAverage);
        assert_eq!(rows[2].quality_tier, QualityTier::Average);
    }
}
