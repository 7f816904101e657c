//! API response and query types.
//!
//! Field names follow the CSV export columns for consistency across output
//! formats.

use serde::{Deserialize, Serialize};

use crate::grid::LineTable;
use crate::report::ScenarioSummary;
use crate::scenario::ScenarioOutcome;
use crate::study::loading::CriticalPoint;

/// Full view of one scenario.
#[derive(Debug, Serialize)]
pub struct ScenarioDetail {
    pub summary: ScenarioSummary,
    pub critical: CriticalPoint,
    /// Line table re-evaluated at the critical hour.
    pub critical_table: LineTable,
    pub loading_limit_pct: f64,
}

/// One line's loading in an hourly record.
#[derive(Debug, Serialize)]
pub struct LineRecord {
    pub line_id: usize,
    pub line_label: String,
    pub loading_percent: f64,
}

/// All line loadings of one hour, with the net demand that produced them.
#[derive(Debug, Serialize)]
pub struct HourRecord {
    pub hour: usize,
    pub net_kw: f64,
    pub lines: Vec<LineRecord>,
}

impl HourRecord {
    /// Extracts `hour` from an outcome; `None` past the last collected hour.
    pub fn from_outcome(outcome: &ScenarioOutcome, hour: usize) -> Option<Self> {
        let matrix = &outcome.sweep.matrix;
        let column = matrix.hour_column(hour)?;
        Some(Self {
            hour,
            net_kw: outcome.profiles.net_kw[hour],
            lines: matrix
                .lines()
                .iter()
                .zip(column)
                .map(|(line, &loading_percent)| LineRecord {
                    line_id: line.id,
                    line_label: line.label.clone(),
                    loading_percent,
                })
                .collect(),
        })
    }
}

/// Optional range query parameters for the loading endpoint.
#[derive(Debug, Deserialize)]
pub struct HourRangeQuery {
    /// Start hour (inclusive).
    pub from: Option<usize>,
    /// End hour (inclusive).
    pub to: Option<usize>,
}

/// Error response body for 4xx errors.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Human-readable error message.
    pub error: String,
}
