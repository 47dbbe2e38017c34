//! Relation, stage and column name constants shared across the pipeline.
//! SQL models, data tests, docs and the dashboard all refer to relations through these.

// Relations in the analytical store
pub const RAW_HOSPITALS: &str = "raw_hospitals";
pub const STG_HOSPITALS: &str = "stg_hospitals";
pub const MART_STATE_SUMMARY: &str = "mart_state_hospital_summary";
pub const MART_HOSPITAL_QUALITY: &str = "mart_hospital_quality";

// Stage names, in execution order
pub const STAGE_EXTRACT_LOAD: &str = "extract_load";
pub const STAGE_STAGING: &str = "staging";
pub const STAGE_MARTS: &str = "marts";
pub const STAGE_DATA_TESTS: &str = "data_tests";
pub const STAGE_DOCS: &str = "docs";
pub const STAGE_VISUALIZE: &str = "visualize";

/// CMS Provider Data datastore endpoint for Hospital General Information (dataset xubh-q36u)
pub const CMS_API_URL: &str = "https://data.cms.gov/provider-data/api/1/datastore/query/xubh-q36u";

// Canonical raw column headers, in load order
pub const COL_FACILITY_ID: &str = "Facility ID";
pub const COL_FACILITY_NAME: &str = "Facility Name";
pub const COL_ADDRESS: &str = "Address";
pub const COL_CITY: &str = "City";
pub const COL_STATE: &str = "State";
pub const COL_ZIP_CODE: &str = "ZIP Code";
pub const COL_COUNTY_NAME: &str = "County Name";
pub const COL_PHONE_NUMBER: &str = "Phone Number";
pub const COL_HOSPITAL_TYPE: &str = "Hospital Type";
pub const COL_HOSPITAL_OWNERSHIP: &str = "Hospital Ownership";
pub const COL_OVERALL_RATING: &str = "Hospital overall rating";
pub const COL_EMERGENCY_SERVICES: &str = "Emergency Services";
pub const COL_EHR_INTEROP: &str = "Meets criteria for promoting interoperability of EHRs";

pub const RAW_COLUMNS: [&str; 13] = [
    COL_FACILITY_ID,
    COL_FACILITY_NAME,
    COL_ADDRESS,
    COL_CITY,
    COL_STATE,
    COL_ZIP_CODE,
    COL_COUNTY_NAME,
    COL_PHONE_NUMBER,
    COL_HOSPITAL_TYPE,
    COL_HOSPITAL_OWNERSHIP,
    COL_OVERALL_RATING,
    COL_EMERGENCY_SERVICES,
    COL_EHR_INTEROP,
];

/// Source sentinel for a missing rating
pub const RATING_NOT_AVAILABLE: &str = "Not Available";

/// Hospital types counted separately in the state summary
pub const ACUTE_CARE_TYPE: &str = "Acute Care Hospitals";
pub const CRITICAL_ACCESS_TYPE: &str = "Critical Access Hospitals";

/// Map a stage name to the process exit code reported when it fails.
pub fn stage_exit_code(stage: &str) -> u8 {
    match stage {
        STAGE_EXTRACT_LOAD => 2,
        STAGE_STAGING | STAGE_MARTS => 3,
        STAGE_DATA_TESTS => 4,
        STAGE_DOCS => 5,
        STAGE_VISUALIZE => 6,
        _ => 1,
    }
}
