// Delivery: the dashboard and headline insights built from the two marts

pub mod dashboard;
pub mod insights;

use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use tracing::{info, instrument};

use crate::config::OutputConfig;
use crate::constants::{MART_HOSPITAL_QUALITY, MART_STATE_SUMMARY};
use crate::error::{PipelineError, Result};
use crate::pipeline::processing::models::hospital_quality::read_hospital_quality;
use crate::pipeline::processing::models::state_summary::read_state_summaries;
use crate::storage::Warehouse;
use crate::types::{HospitalQualityRow, OwnershipCategory, QualityClassification, QualityTier, StateSummary};

use dashboard::{ChartKind, DashboardBuilder, DataPoint, LegendEntry, Panel};
pub use insights::Insights;

pub const DASHBOARD_FILE: &str = "dashboard.svg";
pub const DASHBOARD_TITLE: &str = "CMS Hospital Data Pipeline Dashboard";

#[derive(Debug, Clone, Serialize)]
pub struct VisualizeOutput {
    pub dashboard: PathBuf,
    pub insights: Insights,
}

fn tier_color(tier: QualityTier) -> &'static str {
    match tier {
        QualityTier::AboveAverage => "#2196F3",
        QualityTier::Average => "#FF9800",
        QualityTier::BelowAverage => "#F44336",
    }
}

fn rating_color(rating: i64) -> &'static str {
    match rating {
        1 => "#F44336",
        2 => "#FF9800",
        3 => "#FFC107",
        4 => "#8BC34A",
        _ => "#4CAF50",
    }
}

fn classification_color(class: QualityClassification) -> &'static str {
    match class {
        QualityClassification::HighQuality => "#4CAF50",
        QualityClassification::Average => "#FFC107",
        QualityClassification::NeedsImprovement => "#F44336",
        QualityClassification::NotRated => "#9E9E9E",
    }
}

fn ownership_color(category: OwnershipCategory) -> &'static str {
    match category {
        OwnershipCategory::NonProfit => "#2196F3",
        OwnershipCategory::ForProfit => "#FF9800",
        OwnershipCategory::Government => "#4CAF50",
        OwnershipCategory::Other => "#9E9E9E",
    }
}

/// Top `limit` states by hospital count, coloured by quality tier.
pub fn state_panel(states: &[StateSummary], limit: usize) -> Panel {
    let points = states
        .iter()
        .take(limit)
        .map(|s| {
            DataPoint::new(
                s.state.clone().unwrap_or_else(|| "(none)".to_string()),
                s.total_hospitals as f64,
                tier_color(s.quality_tier),
            )
        })
        .collect();

    Panel::new(format!("Hospital Count by State (Top {limit})"), ChartKind::HorizontalBar, points)
        .with_axis_label("Number of Hospitals")
        .with_legend(
            QualityTier::ALL
                .iter()
                .map(|&tier| LegendEntry {
                    label: tier.label(),
                    color: tier_color(tier),
                })
                .collect(),
        )
}

/// Hospitals per star rating; unrated hospitals are left out.
pub fn rating_panel(hospitals: &[HospitalQualityRow]) -> Panel {
    let points = (1..=5)
        .map(|rating| {
            let count = hospitals.iter().filter(|h| h.overall_rating == Some(rating)).count();
            DataPoint::new(rating.to_string(), count as f64, rating_color(rating))
        })
        .collect();

    Panel::new("Hospital Rating Distribution", ChartKind::VerticalBar { y_max: None }, points)
        .with_axis_label("Number of Hospitals")
}

/// Share of hospitals with emergency services per quality classification.
pub fn emergency_panel(hospitals: &[HospitalQualityRow]) -> Panel {
    let points = QualityClassification::ALL
        .iter()
        .filter_map(|&class| {
            let group: Vec<_> = hospitals.iter().filter(|h| h.quality_classification == class).collect();
            if group.is_empty() {
                return None;
            }
            let with_emergency = group.iter().filter(|h| h.has_emergency_services).count();
            let pct = 100.0 * with_emergency as f64 / group.len() as f64;
            Some(DataPoint::new(class.label(), (pct * 10.0).round() / 10.0, classification_color(class)))
        })
        .collect();

    Panel::new(
        "% with Emergency Services by Quality",
        ChartKind::VerticalBar { y_max: Some(100.0) },
        points,
    )
    .with_axis_label("% of Hospitals")
}

pub fn ownership_panel(hospitals: &[HospitalQualityRow]) -> Panel {
    let points = OwnershipCategory::ALL
        .iter()
        .map(|&category| {
            let count = hospitals.iter().filter(|h| h.ownership_category == category).count();
            DataPoint::new(category.label(), count as f64, ownership_color(category))
        })
        .collect();

    Panel::new("Hospital Ownership Breakdown", ChartKind::Pie, points)
}

pub fn build_dashboard(states: &[StateSummary], hospitals: &[HospitalQualityRow], top_states: usize) -> String {
    DashboardBuilder::new(DASHBOARD_TITLE)
        .add_panel(state_panel(states, top_states))
        .add_panel(rating_panel(hospitals))
        .add_panel(emergency_panel(hospitals))
        .add_panel(ownership_panel(hospitals))
        .build()
}

fn require_mart(warehouse: &Warehouse, name: &str) -> Result<()> {
    if !warehouse.relation_exists(name)? {
        return Err(PipelineError::Visualize(format!("mart '{name}' does not exist; run the transform first")));
    }
    Ok(())
}

/// Render the dashboard from both marts and compute the headline insights.
#[instrument(skip_all)]
pub fn visualize(warehouse: &Warehouse, output: &OutputConfig) -> Result<VisualizeOutput> {
    require_mart(warehouse, MART_STATE_SUMMARY)?;
    require_mart(warehouse, MART_HOSPITAL_QUALITY)?;

    let states = read_state_summaries(warehouse)?;
    let hospitals = read_hospital_quality(warehouse)?;
    if states.is_empty() || hospitals.is_empty() {
        return Err(PipelineError::Visualize("marts are empty, nothing to plot".to_string()));
    }

    fs::create_dir_all(&output.dir)
        .map_err(|e| PipelineError::Visualize(format!("cannot create {}: {}", output.dir.display(), e)))?;
    let path = output.dir.join(DASHBOARD_FILE);
    let svg = build_dashboard(&states, &hospitals, output.top_states);
    fs::write(&path, svg).map_err(|e| PipelineError::Visualize(format!("cannot write {}: {}", path.display(), e)))?;
    info!("Dashboard saved to {}", path.display());

    Ok(VisualizeOutput {
        dashboard: path,
        insights: insights::compute(&states, &hospitals),
    })
}
