//! Battery dispatch against an hourly price signal, formulated as an LP.
//!
//! Decision variables per period `t = 0..23` (plus the closing checkpoint
//! `e[24]`):
//!
//! - `e[t]` stored energy, bounded to `[E_MIN, E_MAX]`, `e[0] = E_INI`
//! - `p_c[t]`, `p_d[t]` charge / discharge power in `[0, P_MAX]`
//! - `g_buy[t]`, `g_sell[t]` grid purchase / sale, non-negative, uncapped
//! - `p_solar[t]` solar used, in `[0, pv[t]]`
//!
//! Constraints: `e[t+1] = e[t] + ETA_C·p_c[t] − p_d[t]/ETA_D`, the hourly
//! balance `load[t] = p_solar[t] − p_c[t] − g_sell[t] + p_d[t] + g_buy[t]`
//! and the terminal condition `e[24] ≥ E_INI`.
//!
//! Objective (maximise): `Σ price[t]·(g_sell[t] − g_buy[t]) − C_DEG·(p_c[t] + p_d[t])`.
//! Buy and sell use the same price. Charging and discharging in the same
//! period is not forbidden; only the degradation cost discourages it.

use good_lp::{
    Expression, ProblemVariables, Solution, SolverModel, constraint, default_solver, variable,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::StudyError;
use crate::profile::{HOURS, HourlyProfile};

/// Battery energy storage parameters.
///
/// Defaults describe the 900 kWh / 150 kW community battery.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BatteryParameters {
    /// Maximum stored energy (kWh).
    pub e_max_kwh: f64,
    /// Minimum stored energy (kWh).
    pub e_min_kwh: f64,
    /// Stored energy at the start of the day (kWh).
    pub e_ini_kwh: f64,
    /// Maximum charge and discharge power (kW).
    pub p_max_kw: f64,
    /// Charge efficiency, in (0, 1].
    pub eta_c: f64,
    /// Discharge efficiency, in (0, 1].
    pub eta_d: f64,
    /// Degradation cost per kW charged or discharged.
    pub c_deg: f64,
}

impl Default for BatteryParameters {
    fn default() -> Self {
        Self {
            e_max_kwh: 900.0,
            e_min_kwh: 0.0,
            e_ini_kwh: 5.0,
            p_max_kw: 150.0,
            eta_c: 1.0,
            eta_d: 1.0,
            c_deg: 15.0,
        }
    }
}

impl BatteryParameters {
    /// Usable energy window `E_MAX − E_MIN` (kWh).
    pub fn usable_capacity_kwh(&self) -> f64 {
        (self.e_max_kwh - self.e_min_kwh).max(0.0)
    }

    /// Checks the ranges the LP formulation relies on.
    ///
    /// Energy bounds are not cross-checked here: an initial energy outside
    /// `[E_MIN, E_MAX]` makes the model infeasible and is reported by the
    /// solver.
    ///
    /// # Errors
    ///
    /// Returns [`StudyError::InvalidParameter`] naming the offending field.
    pub fn validate(&self) -> Result<(), StudyError> {
        for (field, value) in [
            ("battery.e_max_kwh", self.e_max_kwh),
            ("battery.e_min_kwh", self.e_min_kwh),
            ("battery.e_ini_kwh", self.e_ini_kwh),
        ] {
            if !value.is_finite() {
                return Err(StudyError::parameter(field, "must be a finite number"));
            }
        }
        if !(self.p_max_kw.is_finite() && self.p_max_kw >= 0.0) {
            return Err(StudyError::parameter("battery.p_max_kw", "must be >= 0"));
        }
        if !(self.eta_c > 0.0 && self.eta_c <= 1.0) {
            return Err(StudyError::parameter("battery.eta_c", "must be in (0, 1]"));
        }
        if !(self.eta_d > 0.0 && self.eta_d <= 1.0) {
            return Err(StudyError::parameter("battery.eta_d", "must be in (0, 1]"));
        }
        if !(self.c_deg.is_finite() && self.c_deg >= 0.0) {
            return Err(StudyError::parameter("battery.c_deg", "must be >= 0"));
        }
        Ok(())
    }
}

/// Optimal decisions for one period.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DispatchRecord {
    /// Period index (0–23).
    pub period: usize,
    /// Stored energy at the end of the period (kWh).
    pub e_final_kwh: f64,
    /// Charge power (kW).
    pub p_c_kw: f64,
    /// Discharge power (kW).
    pub p_d_kw: f64,
    /// Grid purchase (kW).
    pub g_buy_kw: f64,
    /// Grid sale (kW).
    pub g_sell_kw: f64,
    /// Solar power used (kW).
    pub p_solar_kw: f64,
    /// Net battery power `p_c − p_d` (kW); positive means net charging.
    pub p_bess_kw: f64,
}

/// The optimized 24-period dispatch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchResult {
    /// `E_INI`, the energy checkpoint before period 0 (kWh).
    pub initial_energy_kwh: f64,
    /// One record per period, in order.
    pub records: Vec<DispatchRecord>,
    /// Objective value of the returned solution.
    pub objective: f64,
}

impl DispatchResult {
    /// Net battery power per hour (`p_c − p_d`).
    ///
    /// Positive values are charging and add to net demand; callers composing
    /// net demand add this profile, they do not subtract it.
    pub fn net_battery_profile(&self) -> HourlyProfile {
        HourlyProfile::from_fn(|h| self.records.get(h).map_or(0.0, |r| r.p_bess_kw))
    }

    /// The 25 energy checkpoints `e[0..=24]`.
    pub fn energy_checkpoints(&self) -> Vec<f64> {
        std::iter::once(self.initial_energy_kwh)
            .chain(self.records.iter().map(|r| r.e_final_kwh))
            .collect()
    }

    /// Energy stored at the end of the horizon, `e[24]`.
    pub fn final_energy_kwh(&self) -> f64 {
        self.records
            .last()
            .map_or(self.initial_energy_kwh, |r| r.e_final_kwh)
    }

    /// Total charged plus discharged energy over the day (kWh).
    pub fn throughput_kwh(&self) -> f64 {
        self.records.iter().map(|r| r.p_c_kw + r.p_d_kw).sum()
    }

    /// Throughput expressed as full cycles of a `capacity_kwh` battery.
    pub fn equivalent_full_cycles(&self, capacity_kwh: f64) -> f64 {
        if capacity_kwh > 0.0 {
            self.throughput_kwh() / (2.0 * capacity_kwh)
        } else {
            0.0
        }
    }
}

/// Builds the dispatch LP and solves it.
///
/// Missing `pv` / `ev` profiles are treated as all-zero. The effective load
/// is `demand + ev`; `pv` is the ceiling on solar usage.
///
/// # Errors
///
/// - [`StudyError::InvalidParameter`] for out-of-range battery parameters or
///   non-finite profile values (checked before the solver runs)
/// - [`StudyError::DispatchInfeasible`] if the solver reports infeasibility
///   or any other failure
pub fn optimize_dispatch(
    params: &BatteryParameters,
    price: &HourlyProfile,
    demand: &HourlyProfile,
    pv: Option<&HourlyProfile>,
    ev: Option<&HourlyProfile>,
) -> Result<DispatchResult, StudyError> {
    params.validate()?;
    let solar = pv.copied().unwrap_or_default();
    let load = *demand + ev.copied().unwrap_or_default();
    for (name, profile) in [("price", price), ("demand", &load), ("pv", &solar)] {
        if !profile.is_finite() {
            return Err(StudyError::parameter(name, "profile has non-finite values"));
        }
    }
    info!(
        e_max_kwh = params.e_max_kwh,
        p_max_kw = params.p_max_kw,
        "building battery dispatch model"
    );

    let mut vars = ProblemVariables::new();
    let e = vars.add_vector(
        variable().min(params.e_min_kwh).max(params.e_max_kwh),
        HOURS + 1,
    );
    let p_c = vars.add_vector(variable().min(0.0).max(params.p_max_kw), HOURS);
    let p_d = vars.add_vector(variable().min(0.0).max(params.p_max_kw), HOURS);
    let g_buy = vars.add_vector(variable().min(0.0), HOURS);
    let g_sell = vars.add_vector(variable().min(0.0), HOURS);
    let p_solar = vars.add_vector(variable().min(0.0), HOURS);

    let objective: Expression = (0..HOURS)
        .map(|t| {
            price[t] * g_sell[t] - price[t] * g_buy[t] - params.c_deg * (p_c[t] + p_d[t])
        })
        .sum();

    let inv_eta_d = 1.0 / params.eta_d;
    let mut model = vars
        .maximise(objective)
        .using(default_solver)
        .with(constraint!(e[0] == params.e_ini_kwh));
    for t in 0..HOURS {
        model = model
            .with(constraint!(
                e[t + 1] == e[t] + params.eta_c * p_c[t] - inv_eta_d * p_d[t]
            ))
            .with(constraint!(p_solar[t] <= solar[t]))
            .with(constraint!(
                p_solar[t] - p_c[t] - g_sell[t] + p_d[t] + g_buy[t] == load[t]
            ));
    }
    model = model.with(constraint!(e[HOURS] >= params.e_ini_kwh));

    let solution = model.solve().map_err(|err| StudyError::DispatchInfeasible {
        reason: err.to_string(),
    })?;

    let records: Vec<DispatchRecord> = (0..HOURS)
        .map(|t| {
            let p_c_kw = solution.value(p_c[t]);
            let p_d_kw = solution.value(p_d[t]);
            DispatchRecord {
                period: t,
                e_final_kwh: solution.value(e[t + 1]),
                p_c_kw,
                p_d_kw,
                g_buy_kw: solution.value(g_buy[t]),
                g_sell_kw: solution.value(g_sell[t]),
                p_solar_kw: solution.value(p_solar[t]),
                p_bess_kw: p_c_kw - p_d_kw,
            }
        })
        .collect();

    let objective = records
        .iter()
        .map(|r| {
            price[r.period] * (r.g_sell_kw - r.g_buy_kw) - params.c_deg * (r.p_c_kw + r.p_d_kw)
        })
        .sum();
    info!(objective, "battery dispatch optimized");

    Ok(DispatchResult {
        initial_energy_kwh: params.e_ini_kwh,
        records,
        objective,
    })
}
