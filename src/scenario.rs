//! Scenario composition and execution.
//!
//! A scenario scales the per-unit PV and EV shapes to installed capacities,
//! optionally plans a battery dispatch, composes the community net demand
//! and sweeps the feeder with it.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::StudyError;
use crate::grid::{LineTable, PowerFlow, evaluate_with_artifacts};
use crate::profile::HourlyProfile;
use crate::study::dispatch::{BatteryParameters, DispatchResult, optimize_dispatch};
use crate::study::loading::{LoadingSweep, compute_hourly_loading};

/// One configured scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScenarioDefinition {
    /// Scenario name, used for artifact names and API paths.
    pub name: String,
    /// Installed PV capacity (kW) used in the sweep.
    pub pv_kw: f64,
    /// Installed EV charging capacity (kW) used in the sweep.
    pub ev_kw: f64,
    /// Battery plan; when present the battery is dispatched and its net
    /// power added to the sweep's net demand.
    pub dispatch: Option<DispatchPlan>,
}

impl Default for ScenarioDefinition {
    fn default() -> Self {
        Self {
            name: "base".to_string(),
            pv_kw: 0.0,
            ev_kw: 0.0,
            dispatch: None,
        }
    }
}

/// Capacities the battery dispatch is optimized against.
///
/// These may differ from the swept capacities, which lets a study plan the
/// battery for one installation and check the feeder with a larger one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DispatchPlan {
    pub pv_kw: f64,
    pub ev_kw: f64,
}

/// Profiles and parameters shared by every scenario of a study.
#[derive(Debug, Clone, PartialEq)]
pub struct StudyInputs {
    pub demand_kw: HourlyProfile,
    pub pv_pu: HourlyProfile,
    pub ev_pu: HourlyProfile,
    pub price: HourlyProfile,
    pub battery: BatteryParameters,
    /// Critical loading above this value is reported as a violation.
    pub loading_limit_pct: f64,
}

/// The profiles a scenario composed, hour by hour.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioProfiles {
    pub demand_kw: HourlyProfile,
    pub pv_kw: HourlyProfile,
    pub ev_kw: HourlyProfile,
    /// Net battery power, positive while charging.
    pub bess_kw: HourlyProfile,
    pub net_kw: HourlyProfile,
    pub price: HourlyProfile,
}

/// Everything a completed scenario produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioOutcome {
    pub name: String,
    pub profiles: ScenarioProfiles,
    pub sweep: LoadingSweep,
    /// Line table re-evaluated at the critical hour.
    pub critical_table: LineTable,
    pub dispatch: Option<DispatchResult>,
    pub within_limit: bool,
    /// Peak of the installed PV profile (kW).
    pub peak_pv_kw: f64,
    /// Peak of the installed EV profile (kW).
    pub peak_ev_kw: f64,
}

/// How a study run sweeps and where it writes artifacts.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Directory for critical-hour tables; `None` skips writing them.
    pub artifact_dir: Option<PathBuf>,
    /// Evaluate the 24 hours on the rayon pool (feature `parallel`).
    pub parallel: bool,
}

/// Community net demand: `demand − pv + ev + bess`.
///
/// `bess` is positive while charging, so it is added.
pub fn compose_net_demand(
    demand_kw: &HourlyProfile,
    pv_kw: &HourlyProfile,
    ev_kw: &HourlyProfile,
    bess_kw: &HourlyProfile,
) -> HourlyProfile {
    *demand_kw - *pv_kw + *ev_kw + *bess_kw
}

/// Runs one scenario end to end.
///
/// # Errors
///
/// Returns the first [`StudyError`] raised by the dispatch, the sweep or the
/// critical-hour re-evaluation.
pub fn run_scenario<P: PowerFlow + Sync + ?Sized>(
    power_flow: &P,
    inputs: &StudyInputs,
    scenario: &ScenarioDefinition,
    options: &RunOptions,
) -> Result<ScenarioOutcome, StudyError> {
    info!(scenario = %scenario.name, pv_kw = scenario.pv_kw, ev_kw = scenario.ev_kw, "running scenario");
    let pv_kw = inputs.pv_pu.scaled(scenario.pv_kw);
    let ev_kw = inputs.ev_pu.scaled(scenario.ev_kw);

    let dispatch = match scenario.dispatch {
        Some(plan) => {
            let plan_pv = (plan.pv_kw > 0.0).then(|| inputs.pv_pu.scaled(plan.pv_kw));
            let plan_ev = (plan.ev_kw > 0.0).then(|| inputs.ev_pu.scaled(plan.ev_kw));
            Some(optimize_dispatch(
                &inputs.battery,
                &inputs.price,
                &inputs.demand_kw,
                plan_pv.as_ref(),
                plan_ev.as_ref(),
            )?)
        }
        None => None,
    };
    let bess_kw = dispatch
        .as_ref()
        .map(DispatchResult::net_battery_profile)
        .unwrap_or_default();

    let net_kw = compose_net_demand(&inputs.demand_kw, &pv_kw, &ev_kw, &bess_kw);
    let sweep = run_sweep(power_flow, &net_kw, options.parallel)?;

    let hour = sweep.critical.hour;
    let critical_table = match &options.artifact_dir {
        Some(dir) => {
            let stem = dir.join(format!("{}_hour{hour}", scenario.name));
            evaluate_with_artifacts(power_flow, hour, net_kw[hour], &stem)?
        }
        None => power_flow.evaluate(net_kw[hour]).map_err(|failure| {
            StudyError::PowerFlowDivergence {
                hour,
                reason: failure.to_string(),
            }
        })?,
    };

    let within_limit = sweep.critical.loading_percent <= inputs.loading_limit_pct;
    if !within_limit {
        warn!(
            scenario = %scenario.name,
            hour,
            line = sweep.critical.line_id,
            loading_pct = sweep.critical.loading_percent,
            limit_pct = inputs.loading_limit_pct,
            "critical loading exceeds limit"
        );
    }

    Ok(ScenarioOutcome {
        name: scenario.name.clone(),
        peak_pv_kw: pv_kw.peak(),
        peak_ev_kw: ev_kw.peak(),
        profiles: ScenarioProfiles {
            demand_kw: inputs.demand_kw,
            pv_kw,
            ev_kw,
            bess_kw,
            net_kw,
            price: inputs.price,
        },
        sweep,
        critical_table,
        dispatch,
        within_limit,
    })
}

/// Runs scenarios in order, stopping at the first failure.
///
/// # Errors
///
/// Returns the first scenario's [`StudyError`].
pub fn run_study<P: PowerFlow + Sync + ?Sized>(
    power_flow: &P,
    inputs: &StudyInputs,
    scenarios: &[ScenarioDefinition],
    options: &RunOptions,
) -> Result<Vec<ScenarioOutcome>, StudyError> {
    scenarios
        .iter()
        .map(|scenario| run_scenario(power_flow, inputs, scenario, options))
        .collect()
}

/// Keeps the scenarios named in `names`, in configured order.
///
/// An empty `names` keeps every scenario.
///
/// # Errors
///
/// Returns [`StudyError::UnknownScenario`] for the first name that matches
/// no scenario.
pub fn select_scenarios(
    scenarios: &[ScenarioDefinition],
    names: &[String],
) -> Result<Vec<ScenarioDefinition>, StudyError> {
    if names.is_empty() {
        return Ok(scenarios.to_vec());
    }
    if let Some(missing) = names
        .iter()
        .find(|name| !scenarios.iter().any(|s| &s.name == *name))
    {
        return Err(StudyError::UnknownScenario(missing.clone()));
    }
    Ok(scenarios
        .iter()
        .filter(|s| names.contains(&s.name))
        .cloned()
        .collect())
}

fn run_sweep<P: PowerFlow + Sync + ?Sized>(
    power_flow: &P,
    net_kw: &HourlyProfile,
    parallel: bool,
) -> Result<LoadingSweep, StudyError> {
    #[cfg(feature = "parallel")]
    if parallel {
        return crate::study::loading::compute_hourly_loading_parallel(power_flow, net_kw);
    }
    #[cfg(not(feature = "parallel"))]
    if parallel {
        warn!("built without the `parallel` feature; sweeping sequentially");
    }
    compute_hourly_loading(power_flow, net_kw)
}

/// Path of the critical-hour artifact a run writes for `outcome`.
pub fn critical_artifact_path(dir: &Path, outcome: &ScenarioOutcome) -> PathBuf {
    dir.join(format!("{}_hour{}.csv", outcome.name, outcome.sweep.critical.hour))
}
