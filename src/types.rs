//! Row types for each layer of the pipeline.
//!
//! Raw records mirror the CMS headers and stay as source strings. Staged and mart
//! rows are read back from the warehouse into these structs for tests, docs and the
//! dashboard.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One line of the hospital CSV, exactly as the source provided it.
///
/// Accepts the canonical headers, the published CMS header variants and the keys of
/// the CMS datastore API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawHospitalRecord {
    #[serde(rename = "Facility ID", alias = "facility_id")]
    pub facility_id: Option<String>,
    #[serde(rename = "Facility Name", alias = "facility_name")]
    pub facility_name: Option<String>,
    #[serde(rename = "Address", alias = "address")]
    pub address: Option<String>,
    #[serde(rename = "City", alias = "City/Town", alias = "citytown")]
    pub city: Option<String>,
    #[serde(rename = "State", alias = "state")]
    pub state: Option<String>,
    #[serde(rename = "ZIP Code", alias = "zip_code")]
    pub zip_code: Option<String>,
    #[serde(rename = "County Name", alias = "County/Parish", alias = "countyparish")]
    pub county_name: Option<String>,
    #[serde(rename = "Phone Number", alias = "Telephone Number", alias = "telephone_number")]
    pub phone_number: Option<String>,
    #[serde(rename = "Hospital Type", alias = "hospital_type")]
    pub hospital_type: Option<String>,
    #[serde(rename = "Hospital Ownership", alias = "hospital_ownership")]
    pub hospital_ownership: Option<String>,
    #[serde(rename = "Hospital overall rating", alias = "hospital_overall_rating")]
    pub overall_rating: Option<String>,
    #[serde(rename = "Emergency Services", alias = "emergency_services")]
    pub emergency_services: Option<String>,
    #[serde(
        rename = "Meets criteria for promoting interoperability of EHRs",
        alias = "meets_criteria_for_promoting_interoperability_of_ehrs"
    )]
    pub ehr_interop: Option<String>,
}

impl RawHospitalRecord {
    /// Field values in `constants::RAW_COLUMNS` order, empty strings as NULL.
    pub fn values(&self) -> [Option<&str>; 13] {
        [
            &self.facility_id,
            &self.facility_name,
            &self.address,
            &self.city,
            &self.state,
            &self.zip_code,
            &self.county_name,
            &self.phone_number,
            &self.hospital_type,
            &self.hospital_ownership,
            &self.overall_rating,
            &self.emergency_services,
            &self.ehr_interop,
        ]
        .map(|v| v.as_deref().filter(|s| !s.is_empty()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StagedHospital {
    pub facility_id: String,
    pub facility_name: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub county_name: Option<String>,
    pub phone_number: Option<String>,
    pub hospital_type: Option<String>,
    pub hospital_ownership: Option<String>,
    pub overall_rating: Option<i64>,
    pub has_emergency_services: bool,
    pub meets_ehr_interop_criteria: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateSummary {
    pub state: Option<String>,
    pub total_hospitals: i64,
    pub acute_care_count: i64,
    pub critical_access_count: i64,
    pub avg_rating: Option<f64>,
    pub high_rated_count: i64,
    pub low_rated_count: i64,
    pub emergency_count: i64,
    pub pct_with_emergency: f64,
    pub pct_ehr_interop: Option<f64>,
    pub nonprofit_count: i64,
    pub government_count: i64,
    pub proprietary_count: i64,
    pub pct_high_rated: f64,
    pub pct_nonprofit: f64,
    pub quality_tier: QualityTier,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HospitalQualityRow {
    pub facility_id: String,
    pub facility_name: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub hospital_type: Option<String>,
    pub hospital_ownership: Option<String>,
    pub overall_rating: Option<i64>,
    pub has_emergency_services: bool,
    pub meets_ehr_interop_criteria: Option<bool>,
    pub quality_classification: QualityClassification,
    pub ownership_category: OwnershipCategory,
    pub access_risk_flag: bool,
}

/// Raised when a mart column holds a label outside its enumeration.
#[derive(Debug, Clone, PartialEq)]
pub struct UnknownLabel(pub String);

impl fmt::Display for UnknownLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown label '{}'", self.0)
    }
}

impl std::error::Error for UnknownLabel {}

/// Declares a label enum whose `Display`/`FromStr` match the SQL string literals.
macro_rules! label_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $label:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $label)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn label(&self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }

            /// Labels in declaration order, for accepted-values tests and docs
            pub fn labels() -> Vec<&'static str> {
                Self::ALL.iter().map(|v| v.label()).collect()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }

        impl FromStr for $name {
            type Err = UnknownLabel;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                match s {
                    $($label => Ok($name::$variant),)+
                    other => Err(UnknownLabel(other.to_string())),
                }
            }
        }
    };
}

label_enum! {
    /// State-level tier derived from the average rating
    QualityTier {
        AboveAverage => "Above Average",
        Average => "Average",
        BelowAverage => "Below Average",
    }
}

label_enum! {
    /// Hospital-level bucket derived from the overall rating
    QualityClassification {
        HighQuality => "High Quality",
        Average => "Average",
        NeedsImprovement => "Needs Improvement",
        NotRated => "Not Rated",
    }
}

label_enum! {
    OwnershipCategory {
        NonProfit => "Non-Profit",
        ForProfit => "For-Profit",
        Government => "Government",
        Other => "Other",
    }
}

impl QualityTier {
    /// Tier thresholds on the rounded state average (>= 3.5, >= 2.5, else).
    pub fn from_avg_rating(avg_rating: Option<f64>) -> Self {
        match avg_rating {
            Some(avg) if avg >= 3.5 => QualityTier::AboveAverage,
            Some(avg) if avg >= 2.5 => QualityTier::Average,
            _ => QualityTier::BelowAverage,
        }
    }
}

impl QualityClassification {
    pub fn from_rating(rating: Option<i64>) -> Self {
        match rating {
            Some(r) if r >= 4 => QualityClassification::HighQuality,
            Some(3) => QualityClassification::Average,
            Some(_) => QualityClassification::NeedsImprovement,
            None => QualityClassification::NotRated,
        }
    }
}

impl OwnershipCategory {
    /// First match wins: "non-profit" substring, exact "Proprietary", "Government" substring.
    pub fn from_ownership(ownership: Option<&str>) -> Self {
        match ownership {
            Some(o) if o.contains("non-profit") => OwnershipCategory::NonProfit,
            Some("Proprietary") => OwnershipCategory::ForProfit,
            Some(o) if o.contains("Government") => OwnershipCategory::Government,
            _ => OwnershipCategory::Other,
        }
    }
}
