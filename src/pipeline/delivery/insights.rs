use serde::Serialize;
use std::fmt;

use crate::types::{HospitalQualityRow, StateSummary};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateRating {
    pub state: String,
    pub avg_rating: f64,
}

/// Headline numbers printed after the dashboard is rendered
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insights {
    pub states: usize,
    pub hospitals: usize,
    /// Mean rating over rated hospitals
    pub overall_avg_rating: Option<f64>,
    pub highest_rated_state: Option<StateRating>,
    pub lowest_rated_state: Option<StateRating>,
    pub access_risk_count: usize,
    /// Mean of the per-state EHR rates that are known
    pub avg_ehr_interop: Option<f64>,
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

/// Ties keep the first state in mart order.
fn pick_state(states: &[StateSummary], better: impl Fn(f64, f64) -> bool) -> Option<StateRating> {
    let mut best: Option<StateRating> = None;
    for row in states {
        let (Some(state), Some(avg)) = (&row.state, row.avg_rating) else {
            continue;
        };
        if best.as_ref().map_or(true, |b| better(avg, b.avg_rating)) {
            best = Some(StateRating {
                state: state.clone(),
                avg_rating: avg,
            });
        }
    }
    best
}

pub fn compute(states: &[StateSummary], hospitals: &[HospitalQualityRow]) -> Insights {
    Insights {
        states: states.len(),
        hospitals: hospitals.len(),
        overall_avg_rating: mean(hospitals.iter().filter_map(|h| h.overall_rating).map(|r| r as f64)),
        highest_rated_state: pick_state(states, |a, b| a > b),
        lowest_rated_state: pick_state(states, |a, b| a < b),
        access_risk_count: hospitals.iter().filter(|h| h.access_risk_flag).count(),
        avg_ehr_interop: mean(states.iter().filter_map(|s| s.pct_ehr_interop)),
    }
}

fn or_na(value: Option<f64>, precision: usize) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.precision$}"))
}

impl fmt::Display for Insights {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  State summary: {} states", self.states)?;
        writeln!(f, "  Hospital detail: {} hospitals", self.hospitals)?;
        writeln!(f, "  Overall avg hospital rating: {} / 5.0", or_na(self.overall_avg_rating, 2))?;
        match &self.highest_rated_state {
            Some(s) => writeln!(f, "  Highest-rated state: {} (avg {:.2})", s.state, s.avg_rating)?,
            None => writeln!(f, "  Highest-rated state: n/a")?,
        }
        match &self.lowest_rated_state {
            Some(s) => writeln!(f, "  Lowest-rated state:  {} (avg {:.2})", s.state, s.avg_rating)?,
            None => writeln!(f, "  Lowest-rated state:  n/a")?,
        }
        writeln!(f, "  Hospitals flagged for access risk: {}", self.access_risk_count)?;
        write!(f, "  Avg EHR interoperability rate: {}%", or_na(self.avg_ehr_interop, 1))
    }
}
