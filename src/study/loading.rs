//! Hourly loading sweep and critical line/hour identification.

use serde::Serialize;
use tracing::{debug, info};

use crate::error::StudyError;
use crate::grid::{LineId, LineTable, PowerFlow, PowerFlowFailure};
use crate::profile::{HOURS, HourlyProfile};

/// Identity of a row in a [`LoadingMatrix`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineInfo {
    pub id: LineId,
    pub label: String,
}

/// Line loading percentages indexed by line and hour.
///
/// Built one hour-column at a time with [`LoadingMatrix::push_hour`]. Every
/// column must report the same lines in the same order as the first one.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoadingMatrix {
    lines: Vec<LineInfo>,
    /// `columns[hour][row]`, rows ordered like `lines`.
    columns: Vec<Vec<f64>>,
}

/// The (hour, line, loading) cell holding the global maximum of a matrix.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CriticalPoint {
    pub hour: usize,
    pub line_id: LineId,
    pub label: String,
    pub loading_percent: f64,
}

/// A completed 24-hour sweep.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadingSweep {
    pub matrix: LoadingMatrix,
    pub critical: CriticalPoint,
}

impl LoadingMatrix {
    /// Creates an empty matrix with no hours collected.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the column for the next hour.
    ///
    /// The first column fixes the line set.
    ///
    /// # Errors
    ///
    /// Returns [`StudyError::TopologyMismatch`] if `table` lists different
    /// lines (or a different order) than the columns already collected.
    pub fn push_hour(&mut self, table: LineTable) -> Result<(), StudyError> {
        let hour = self.columns.len();
        if self.columns.is_empty() {
            self.lines = table
                .iter()
                .map(|row| LineInfo {
                    id: row.line_id,
                    label: row.label.clone(),
                })
                .collect();
        } else if table.len() != self.lines.len()
            || table
                .iter()
                .zip(&self.lines)
                .any(|(row, line)| row.line_id != line.id)
        {
            return Err(StudyError::TopologyMismatch { hour });
        }
        self.columns
            .push(table.into_iter().map(|row| row.loading_percent).collect());
        Ok(())
    }

    /// Number of hour-columns collected so far.
    pub fn hours(&self) -> usize {
        self.columns.len()
    }

    /// Returns `true` once all 24 hours are present.
    pub fn is_complete(&self) -> bool {
        self.columns.len() == HOURS
    }

    /// Lines in row order.
    pub fn lines(&self) -> &[LineInfo] {
        &self.lines
    }

    /// Loading of `line` at `hour`, if both exist.
    pub fn get(&self, line: LineId, hour: usize) -> Option<f64> {
        let row = self.row_of(line)?;
        self.columns.get(hour).map(|column| column[row])
    }

    /// All line loadings for one hour, in row order.
    pub fn hour_column(&self, hour: usize) -> Option<&[f64]> {
        self.columns.get(hour).map(Vec::as_slice)
    }

    /// One line's loading across the collected hours.
    pub fn line_row(&self, line: LineId) -> Option<Vec<f64>> {
        let row = self.row_of(line)?;
        Some(self.columns.iter().map(|column| column[row]).collect())
    }

    /// Maximum cell of the matrix.
    ///
    /// Scans hour-major (hour 0 first, rows in line order within an hour)
    /// and only replaces the incumbent on a strictly greater value, so ties
    /// go to the lowest hour and then the first line in row order.
    pub fn critical_point(&self) -> Option<CriticalPoint> {
        let mut best: Option<(usize, usize, f64)> = None;
        for (hour, column) in self.columns.iter().enumerate() {
            for (row, &value) in column.iter().enumerate() {
                if best.is_none_or(|(_, _, incumbent)| value > incumbent) {
                    best = Some((hour, row, value));
                }
            }
        }
        best.map(|(hour, row, loading_percent)| CriticalPoint {
            hour,
            line_id: self.lines[row].id,
            label: self.lines[row].label.clone(),
            loading_percent,
        })
    }

    fn row_of(&self, line: LineId) -> Option<usize> {
        self.lines.iter().position(|info| info.id == line)
    }
}

/// Runs one power-flow evaluation per hour and locates the critical cell.
///
/// Hours are evaluated in order 0..23. The first hour whose evaluation fails
/// (non-convergence, an empty table, or a non-finite loading) aborts the
/// sweep; no partial matrix is returned.
///
/// # Errors
///
/// - [`StudyError::InvalidParameter`] if `net_demand_kw` has a non-finite
///   hour (checked before any evaluation)
/// - [`StudyError::PowerFlowDivergence`] naming the failing hour
/// - [`StudyError::TopologyMismatch`] if hours disagree on the line set
pub fn compute_hourly_loading<P: PowerFlow + ?Sized>(
    power_flow: &P,
    net_demand_kw: &HourlyProfile,
) -> Result<LoadingSweep, StudyError> {
    ensure_finite(net_demand_kw)?;
    info!(peak_kw = net_demand_kw.peak(), "starting hourly loading sweep");

    let mut matrix = LoadingMatrix::new();
    for (hour, demand_kw) in net_demand_kw.iter().enumerate() {
        let table = checked_table(hour, power_flow.evaluate(demand_kw))?;
        debug!(hour, demand_kw, lines = table.len(), "hour evaluated");
        matrix.push_hour(table)?;
    }

    finish(matrix)
}

/// Parallel variant of [`compute_hourly_loading`].
///
/// Evaluates all 24 hours on the rayon pool and waits for every result. If
/// any hours fail, the error of the lowest failing hour is returned, so the
/// outcome is identical to the sequential sweep.
///
/// # Errors
///
/// Same as [`compute_hourly_loading`].
#[cfg(feature = "parallel")]
pub fn compute_hourly_loading_parallel<P: PowerFlow + Sync + ?Sized>(
    power_flow: &P,
    net_demand_kw: &HourlyProfile,
) -> Result<LoadingSweep, StudyError> {
    use rayon::prelude::*;

    ensure_finite(net_demand_kw)?;
    info!(peak_kw = net_demand_kw.peak(), "starting parallel hourly loading sweep");

    let tables: Vec<Result<LineTable, PowerFlowFailure>> = net_demand_kw
        .as_slice()
        .par_iter()
        .map(|&demand_kw| power_flow.evaluate(demand_kw))
        .collect();

    let mut matrix = LoadingMatrix::new();
    for (hour, result) in tables.into_iter().enumerate() {
        matrix.push_hour(checked_table(hour, result)?)?;
    }

    finish(matrix)
}

fn ensure_finite(net_demand_kw: &HourlyProfile) -> Result<(), StudyError> {
    match net_demand_kw.iter().position(|v| !v.is_finite()) {
        Some(hour) => Err(StudyError::parameter(
            "net_demand_kw",
            format!("hour {hour} is not a finite number"),
        )),
        None => Ok(()),
    }
}

fn checked_table(
    hour: usize,
    result: Result<LineTable, PowerFlowFailure>,
) -> Result<LineTable, StudyError> {
    let divergence = |reason: String| StudyError::PowerFlowDivergence { hour, reason };
    let table = result.map_err(|failure| divergence(failure.to_string()))?;
    if table.is_empty() {
        return Err(divergence("power flow returned no lines".to_string()));
    }
    if let Some(row) = table.iter().find(|row| !row.loading_percent.is_finite()) {
        return Err(divergence(format!(
            "line {} returned a non-finite loading",
            row.line_id
        )));
    }
    Ok(table)
}

fn finish(matrix: LoadingMatrix) -> Result<LoadingSweep, StudyError> {
    let critical = matrix
        .critical_point()
        .ok_or_else(|| StudyError::parameter("loading_matrix", "no cells to scan"))?;
    info!(
        hour = critical.hour,
        line = critical.line_id,
        loading_pct = critical.loading_percent,
        "hourly loading sweep complete"
    );
    Ok(LoadingSweep { matrix, critical })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::LineLoading;

    fn table(values: &[(LineId, f64)]) -> LineTable {
        values
            .iter()
            .map(|&(line_id, loading_percent)| LineLoading {
                line_id,
                label: format!("Line {line_id}"),
                loading_percent,
            })
            .collect()
    }

    /// Line `i` loading = `(i + 1) * |demand|`.
    fn proportional(demand_kw: f64) -> Result<LineTable, PowerFlowFailure> {
        Ok(table(&[
            (0, demand_kw.abs()),
            (1, 2.0 * demand_kw.abs()),
            (2, 3.0 * demand_kw.abs()),
        ]))
    }

    #[test]
    fn sweep_collects_24_hours_and_finds_maximum() {
        let net = HourlyProfile::from_fn(|h| if h == 19 { 40.0 } else { 10.0 });
        let sweep = compute_hourly_loading(&proportional, &net);
        let sweep = sweep.ok();
        assert_eq!(sweep.as_ref().map(|s| s.matrix.hours()), Some(24));
        let critical = sweep.map(|s| s.critical);
        assert_eq!(critical.as_ref().map(|c| c.hour), Some(19));
        assert_eq!(critical.as_ref().map(|c| c.line_id), Some(2));
        assert_eq!(critical.map(|c| c.loading_percent), Some(120.0));
    }

    #[test]
    fn negative_net_demand_is_passed_through() {
        let seen = std::cell::RefCell::new(Vec::new());
        let recorder = |demand_kw: f64| {
            seen.borrow_mut().push(demand_kw);
            proportional(demand_kw)
        };
        let net = HourlyProfile::from_fn(|h| h as f64 - 12.0);
        assert!(compute_hourly_loading(&recorder, &net).is_ok());
        assert_eq!(seen.borrow().as_slice(), net.as_slice());
    }

    #[test]
    fn divergence_names_the_failing_hour() {
        let net = HourlyProfile::from_fn(|h| h as f64);
        let fails_at_13 = |demand_kw: f64| {
            if demand_kw == 13.0 {
                Err(PowerFlowFailure::NotConverged)
            } else {
                proportional(demand_kw)
            }
        };
        match compute_hourly_loading(&fails_at_13, &net) {
            Err(StudyError::PowerFlowDivergence { hour, .. }) => assert_eq!(hour, 13),
            other => panic!("expected divergence, got {other:?}"),
        }
    }

    #[test]
    fn empty_table_counts_as_divergence() {
        let empty = |_: f64| -> Result<LineTable, PowerFlowFailure> { Ok(Vec::new()) };
        assert!(matches!(
            compute_hourly_loading(&empty, &HourlyProfile::zeros()),
            Err(StudyError::PowerFlowDivergence { hour: 0, .. })
        ));
    }

    #[test]
    fn nan_loading_counts_as_divergence() {
        let net = HourlyProfile::from_fn(|h| h as f64);
        let nan_at_5 = |demand_kw: f64| -> Result<LineTable, PowerFlowFailure> {
            if demand_kw == 5.0 {
                Ok(table(&[(0, f64::NAN)]))
            } else {
                Ok(table(&[(0, 1.0)]))
            }
        };
        assert!(matches!(
            compute_hourly_loading(&nan_at_5, &net),
            Err(StudyError::PowerFlowDivergence { hour: 5, .. })
        ));
    }

    #[test]
    fn non_finite_net_demand_is_rejected_before_evaluation() {
        let calls = std::cell::Cell::new(0);
        let counting = |demand_kw: f64| {
            calls.set(calls.get() + 1);
            proportional(demand_kw)
        };
        let mut values = [1.0; HOURS];
        values[4] = f64::INFINITY;
        let result = compute_hourly_loading(&counting, &HourlyProfile::new(values));
        assert!(matches!(result, Err(StudyError::InvalidParameter { .. })));
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn changing_line_set_is_a_topology_mismatch() {
        let net = HourlyProfile::from_fn(|h| h as f64);
        let shifting = |demand_kw: f64| -> Result<LineTable, PowerFlowFailure> {
            if demand_kw >= 3.0 {
                Ok(table(&[(0, 1.0), (9, 1.0)]))
            } else {
                Ok(table(&[(0, 1.0), (1, 1.0)]))
            }
        };
        assert!(matches!(
            compute_hourly_loading(&shifting, &net),
            Err(StudyError::TopologyMismatch { hour: 3 })
        ));
    }

    #[test]
    fn ties_resolve_to_lowest_hour_then_first_line() {
        let mut matrix = LoadingMatrix::new();
        for hour in 0..HOURS {
            let peak = if hour == 4 || hour == 9 { 80.0 } else { 10.0 };
            matrix
                .push_hour(table(&[(3, 5.0), (5, peak), (7, peak)]))
                .ok();
        }
        let critical = matrix.critical_point();
        assert_eq!(critical.as_ref().map(|c| c.hour), Some(4));
        assert_eq!(critical.map(|c| c.line_id), Some(5));
    }

    #[test]
    fn matrix_accessors() {
        let mut matrix = LoadingMatrix::new();
        assert!(matrix.critical_point().is_none());
        matrix.push_hour(table(&[(2, 1.0), (4, 2.0)])).ok();
        matrix.push_hour(table(&[(2, 3.0), (4, 4.0)])).ok();
        assert_eq!(matrix.hours(), 2);
        assert!(!matrix.is_complete());
        assert_eq!(matrix.get(4, 1), Some(4.0));
        assert_eq!(matrix.get(3, 1), None);
        assert_eq!(matrix.get(2, 5), None);
        assert_eq!(matrix.hour_column(0), Some(&[1.0, 2.0][..]));
        assert_eq!(matrix.line_row(2), Some(vec![1.0, 3.0]));
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn parallel_sweep_matches_sequential() {
        let net = HourlyProfile::from_fn(|h| ((h * 37) % 24) as f64 - 8.0);
        let sequential = compute_hourly_loading(&proportional, &net).ok();
        let parallel = compute_hourly_loading_parallel(&proportional, &net).ok();
        assert!(sequential.is_some());
        assert_eq!(sequential, parallel);
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn parallel_sweep_reports_lowest_failing_hour() {
        let net = HourlyProfile::from_fn(|h| h as f64);
        let fails_late = |demand_kw: f64| {
            if demand_kw == 6.0 || demand_kw == 20.0 {
                Err(PowerFlowFailure::NotConverged)
            } else {
                proportional(demand_kw)
            }
        };
        assert!(matches!(
            compute_hourly_loading_parallel(&fails_late, &net),
            Err(StudyError::PowerFlowDivergence { hour: 6, .. })
        ));
    }
}
