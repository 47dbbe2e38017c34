//! Seeded sample dataset used when no CSV or API data is available.

use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::constants::{ACUTE_CARE_TYPE, CRITICAL_ACCESS_TYPE, RATING_NOT_AVAILABLE};
use crate::error::{PipelineError, Result};
use crate::types::RawHospitalRecord;

const STATES: [&str; 20] = [
    "NY", "CA", "TX", "FL", "IL", "PA", "OH", "CT", "MA", "NJ", "GA", "NC", "MI", "VA", "WA", "AZ", "TN", "MO",
    "MD", "WI",
];

const HOSPITAL_TYPES: [(&str, u32); 4] = [
    (ACUTE_CARE_TYPE, 65),
    (CRITICAL_ACCESS_TYPE, 20),
    ("Childrens", 5),
    ("Psychiatric", 10),
];

const OWNERSHIP: [(&str, u32); 6] = [
    ("Voluntary non-profit - Private", 35),
    ("Proprietary", 25),
    ("Government - Local", 15),
    ("Government - State", 10),
    ("Voluntary non-profit - Church", 10),
    ("Government - Federal", 5),
];

const RATINGS: [(&str, u32); 6] = [
    ("1", 5),
    ("2", 15),
    ("3", 35),
    ("4", 30),
    ("5", 10),
    (RATING_NOT_AVAILABLE, 5),
];

const EMERGENCY: [(&str, u32); 2] = [("Yes", 85), ("No", 15)];

const EHR: [(&str, u32); 3] = [("Y", 70), ("N", 15), (RATING_NOT_AVAILABLE, 15)];

/// Weighted choice over a fixed table of labels
struct Weighted {
    labels: Vec<&'static str>,
    index: WeightedIndex<u32>,
}

impl Weighted {
    fn new(table: &[(&'static str, u32)]) -> Result<Self> {
        let index = WeightedIndex::new(table.iter().map(|(_, w)| *w))
            .map_err(|e| PipelineError::Extract(format!("Invalid sample weights: {e}")))?;
        Ok(Self {
            labels: table.iter().map(|(l, _)| *l).collect(),
            index,
        })
    }

    fn pick(&self, rng: &mut StdRng) -> String {
        self.labels[self.index.sample(rng)].to_string()
    }
}

/// Generate `n` hospital records. The same `seed` always yields the same records.
pub fn generate(n: usize, seed: u64) -> Result<Vec<RawHospitalRecord>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let types = Weighted::new(&HOSPITAL_TYPES)?;
    let ownership = Weighted::new(&OWNERSHIP)?;
    let ratings = Weighted::new(&RATINGS)?;
    let emergency = Weighted::new(&EMERGENCY)?;
    let ehr = Weighted::new(&EHR)?;

    let records = (0..n)
        .map(|i| {
            let state = STATES.choose(&mut rng).copied().unwrap_or("NY");
            RawHospitalRecord {
                facility_id: Some(format!("{}", 10000 + i)),
                facility_name: Some(format!("Hospital_{i}")),
                address: Some(format!("{} Main St", rng.gen_range(100..9999))),
                city: Some(format!("City_{}", rng.gen_range(1..500))),
                state: Some(state.to_string()),
                zip_code: Some(format!("{}", rng.gen_range(10000..99999))),
                county_name: Some(format!("County_{}", rng.gen_range(1..200))),
                phone_number: Some(format!(
                    "({}) {}-{}",
                    rng.gen_range(200..999),
                    rng.gen_range(200..999),
                    rng.gen_range(1000..9999)
                )),
                hospital_type: Some(types.pick(&mut rng)),
                hospital_ownership: Some(ownership.pick(&mut rng)),
                overall_rating: Some(ratings.pick(&mut rng)),
                emergency_services: Some(emergency.pick(&mut rng)),
                ehr_interop: Some(ehr.pick(&mut rng)),
            }
        })
        .collect();

    Ok(records)
}
