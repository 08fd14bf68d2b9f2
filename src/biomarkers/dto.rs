use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::ai::RecommendationBundle;

use super::repo::{Biomarker, HistoryEntry, Trend};

#[derive(Debug, Serialize)]
pub struct BiomarkerView {
    pub name: String,
    pub value: String,
    pub unit: Option<String>,
    pub status: Option<String>,
    pub range: Option<String>,
    pub description: Option<String>,
    pub trend: Trend,
    pub history: Vec<HistoryEntry>,
    pub recommendations: Option<RecommendationBundle>,
    pub updated_at: OffsetDateTime,
}

impl From<Biomarker> for BiomarkerView {
    fn from(b: Biomarker) -> Self {
        Self {
            name: b.name,
            value: b.value,
            unit: b.unit,
            status: b.status,
            range: b.ref_range,
            description: b.description,
            trend: Trend::parse(&b.trend),
            history: b.history.0,
            recommendations: b.recommendations.map(|r| r.0),
            updated_at: b.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PutAlertRequest {
    pub enabled: bool,
    pub threshold_below: Option<f64>,
    pub threshold_above: Option<f64>,
}

/// One row of the alerts page: config joined with the biomarker's current
/// value and the live trigger evaluation.
#[derive(Debug, Serialize)]
pub struct AlertView {
    pub name: String,
    pub enabled: bool,
    pub threshold_below: Option<f64>,
    pub threshold_above: Option<f64>,
    pub current_value: Option<String>,
    pub triggered: bool,
}
