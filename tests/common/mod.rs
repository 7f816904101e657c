//! Shared test fixtures for integration tests.

#![allow(dead_code)]

use feeder_study::grid::{LineId, LineLoading, LineTable, PowerFlow, PowerFlowFailure};
use feeder_study::profile::HourlyProfile;
use feeder_study::study::dispatch::BatteryParameters;

/// Stub whose line `i` loading is `coefficients[i] · |net demand|`.
pub struct LinearFlow {
    pub coefficients: Vec<f64>,
}

impl PowerFlow for LinearFlow {
    fn evaluate(&self, net_demand_kw: f64) -> Result<LineTable, PowerFlowFailure> {
        Ok(self
            .coefficients
            .iter()
            .enumerate()
            .map(|(line_id, k)| line(line_id, k * net_demand_kw.abs()))
            .collect())
    }
}

/// Stub that replays a fixed `cells[hour][line]` table.
///
/// Must be driven with [`hour_index_profile`] so each evaluation's scalar
/// is the hour it stands for. Hours listed in `diverging` fail.
pub struct TableFlow {
    pub cells: Vec<Vec<f64>>,
    pub diverging: Vec<usize>,
}

impl PowerFlow for TableFlow {
    fn evaluate(&self, net_demand_kw: f64) -> Result<LineTable, PowerFlowFailure> {
        let hour = net_demand_kw as usize;
        if self.diverging.contains(&hour) {
            return Err(PowerFlowFailure::NotConverged);
        }
        let row = self
            .cells
            .get(hour)
            .ok_or_else(|| PowerFlowFailure::Other(format!("no cells for hour {hour}")))?;
        Ok(row
            .iter()
            .enumerate()
            .map(|(line_id, &value)| line(line_id, value))
            .collect())
    }
}

/// Profile whose value at hour `h` is `h`.
pub fn hour_index_profile() -> HourlyProfile {
    HourlyProfile::from_fn(|h| h as f64)
}

/// One table row with the standard label format.
pub fn line(line_id: LineId, loading_percent: f64) -> LineLoading {
    LineLoading {
        line_id,
        label: format!("Line {line_id} (Bus {} -> Bus {})", line_id + 1, line_id + 2),
        loading_percent,
    }
}

/// Battery with room to act: 200 kWh, 50 kW, starting at 20 kWh.
pub fn small_battery() -> BatteryParameters {
    BatteryParameters {
        e_max_kwh: 200.0,
        e_min_kwh: 0.0,
        e_ini_kwh: 20.0,
        p_max_kw: 50.0,
        eta_c: 1.0,
        eta_d: 1.0,
        c_deg: 1.0,
    }
}

/// Fresh, empty directory under the system temp dir.
pub fn scratch_dir(tag: &str) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("feeder-study-{tag}-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).ok();
    dir
}
