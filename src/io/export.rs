//! CSV export for study artifacts.
//!
//! Every artifact has an `export_*` function writing to a path and a
//! `write_*` function writing to any [`Write`]. Output is deterministic for
//! identical inputs.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::grid::LineLoading;
use crate::profile::HOURS;
use crate::scenario::{ScenarioOutcome, ScenarioProfiles};
use crate::study::dispatch::DispatchResult;
use crate::study::loading::LoadingMatrix;

/// Column header of a single-hour line table.
const LINE_TABLE_HEADER: &str = "line_id,line_label,loading_percent";

/// Column header of the composed profiles.
const PROFILES_HEADER: &str = "hour,demand_kw,pv_kw,ev_kw,bess_kw,net_kw,price";

/// Column header of the battery dispatch.
const DISPATCH_HEADER: &str =
    "period,e_final_kwh,p_c_kw,p_d_kw,g_buy_kw,g_sell_kw,p_solar_kw,p_bess_kw";

fn create(path: &Path) -> io::Result<io::BufWriter<File>> {
    Ok(io::BufWriter::new(File::create(path)?))
}

/// Exports one evaluation's per-line loadings.
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_line_table(table: &[LineLoading], path: &Path) -> io::Result<()> {
    write_line_table(table, create(path)?)
}

/// Writes one evaluation's per-line loadings as CSV.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_line_table(table: &[LineLoading], writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(LINE_TABLE_HEADER.split(','))?;
    for row in table {
        wtr.write_record(&[
            row.line_id.to_string(),
            row.label.clone(),
            format!("{:.4}", row.loading_percent),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Exports the loading matrix, one row per line and one column per hour.
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_loading_matrix(matrix: &LoadingMatrix, path: &Path) -> io::Result<()> {
    write_loading_matrix(matrix, create(path)?)
}

/// Writes the loading matrix as CSV (`line_id,line_label,h0..h23`).
///
/// Hours not yet collected are left empty.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_loading_matrix(matrix: &LoadingMatrix, writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    let header = ["line_id".to_string(), "line_label".to_string()]
        .into_iter()
        .chain((0..HOURS).map(|h| format!("h{h}")));
    wtr.write_record(header)?;

    for line in matrix.lines() {
        let mut record = vec![line.id.to_string(), line.label.clone()];
        record.extend(
            (0..HOURS).map(|h| matrix.get(line.id, h).map_or(String::new(), |v| format!("{v:.4}"))),
        );
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Exports the composed hourly profiles of a scenario.
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_profiles(profiles: &ScenarioProfiles, path: &Path) -> io::Result<()> {
    write_profiles(profiles, create(path)?)
}

/// Writes the composed hourly profiles as CSV.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_profiles(profiles: &ScenarioProfiles, writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(PROFILES_HEADER.split(','))?;
    for h in 0..HOURS {
        wtr.write_record(&[
            h.to_string(),
            format!("{:.4}", profiles.demand_kw[h]),
            format!("{:.4}", profiles.pv_kw[h]),
            format!("{:.4}", profiles.ev_kw[h]),
            format!("{:.4}", profiles.bess_kw[h]),
            format!("{:.4}", profiles.net_kw[h]),
            format!("{:.4}", profiles.price[h]),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Exports the optimized battery dispatch.
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_dispatch(dispatch: &DispatchResult, path: &Path) -> io::Result<()> {
    write_dispatch(dispatch, create(path)?)
}

/// Writes the optimized battery dispatch as CSV, one row per period.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_dispatch(dispatch: &DispatchResult, writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(DISPATCH_HEADER.split(','))?;
    for r in &dispatch.records {
        wtr.write_record(&[
            r.period.to_string(),
            format!("{:.4}", r.e_final_kwh),
            format!("{:.4}", r.p_c_kw),
            format!("{:.4}", r.p_d_kw),
            format!("{:.4}", r.g_buy_kw),
            format!("{:.4}", r.g_sell_kw),
            format!("{:.4}", r.p_solar_kw),
            format!("{:.4}", r.p_bess_kw),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Writes the loading, profile and (if present) dispatch artifacts of a
/// scenario into `dir`, creating it if needed.
///
/// Returns the written paths in write order.
///
/// # Errors
///
/// Returns an `io::Error` if the directory or any file cannot be written.
pub fn export_scenario(outcome: &ScenarioOutcome, dir: &Path) -> io::Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;
    let name = &outcome.name;
    let mut written = Vec::with_capacity(3);

    let loading = dir.join(format!("{name}_loading.csv"));
    export_loading_matrix(&outcome.sweep.matrix, &loading)?;
    written.push(loading);

    let profiles = dir.join(format!("{name}_profiles.csv"));
    export_profiles(&outcome.profiles, &profiles)?;
    written.push(profiles);

    if let Some(dispatch) = &outcome.dispatch {
        let path = dir.join(format!("{name}_dispatch.csv"));
        export_dispatch(dispatch, &path)?;
        written.push(path);
    }
    Ok(written)
}
