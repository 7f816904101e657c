//! Power-flow evaluation seam and the shipped radial feeder adapter.
//!
//! The study core only needs "scalar net demand in, per-line loading out".
//! Anything that can answer that question implements [`PowerFlow`]; the
//! hourly sweep never looks behind the trait.

/// Radial feeder description and its lossless loading evaluator.
pub mod feeder;

use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::error::StudyError;
use crate::io::export::export_line_table;

pub use feeder::FeederModel;

/// Identifier of a feeder line (stable across hours).
pub type LineId = usize;

/// Loading result for one line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineLoading {
    pub line_id: LineId,
    /// Human-readable label, e.g. `"Line 3 (Bus 4 -> Bus 5)"`.
    pub label: String,
    /// Carried current as a percentage of the thermal limit.
    pub loading_percent: f64,
}

/// Per-line results of one evaluation, in ascending line-id order.
pub type LineTable = Vec<LineLoading>;

/// Why a single power-flow evaluation produced no table.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PowerFlowFailure {
    #[error("power flow did not converge")]
    NotConverged,
    #[error("bus {bus} is not connected to any source bus")]
    Island { bus: usize },
    #[error("line {line} closes a loop; the feeder must be radial")]
    NotRadial { line: LineId },
    #[error("bus {bus} is not part of the feeder")]
    UnknownBus { bus: usize },
    #[error("line {line} produced a non-finite loading")]
    NonFinite { line: LineId },
    #[error("{0}")]
    Other(String),
}

/// Power-flow evaluation service.
///
/// `net_demand_kw` is applied uniformly at each of the service's community
/// buses: positive values are consumption, negative values are injection.
pub trait PowerFlow {
    /// Evaluates one operating point and returns per-line loadings.
    ///
    /// # Errors
    ///
    /// Returns a [`PowerFlowFailure`] on non-convergence or any other
    /// evaluation failure.
    fn evaluate(&self, net_demand_kw: f64) -> Result<LineTable, PowerFlowFailure>;
}

impl<F> PowerFlow for F
where
    F: Fn(f64) -> Result<LineTable, PowerFlowFailure>,
{
    fn evaluate(&self, net_demand_kw: f64) -> Result<LineTable, PowerFlowFailure> {
        self(net_demand_kw)
    }
}

/// Evaluates one operating point and persists its line table as `{stem}.csv`.
///
/// Used for the critical-hour re-evaluation after a sweep; `hour` only
/// labels the error if the evaluation fails.
///
/// # Errors
///
/// Returns [`StudyError::PowerFlowDivergence`] if the evaluation fails, or an
/// I/O / CSV error if the artifact cannot be written.
pub fn evaluate_with_artifacts<P: PowerFlow + ?Sized>(
    power_flow: &P,
    hour: usize,
    net_demand_kw: f64,
    stem: &Path,
) -> Result<LineTable, StudyError> {
    let table = power_flow
        .evaluate(net_demand_kw)
        .map_err(|failure| StudyError::PowerFlowDivergence {
            hour,
            reason: failure.to_string(),
        })?;
    let mut path = stem.as_os_str().to_owned();
    path.push(".csv");
    let path = PathBuf::from(path);
    export_line_table(&table, &path)?;
    tracing::info!(path = %path.display(), lines = table.len(), "line loading table written");
    Ok(table)
}
