//! Hosting-capacity search.
//!
//! Steps an installed capacity upward from zero, sweeping the feeder at each
//! step, until the critical loading exceeds the loading limit or the power
//! flow stops converging.

use serde::Serialize;
use tracing::{debug, info};

use super::loading::compute_hourly_loading;
use crate::error::StudyError;
use crate::grid::PowerFlow;
use crate::profile::HourlyProfile;

/// Whether the hosted resource injects or consumes power.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Generation (e.g. PV), subtracted from net demand.
    Generation,
    /// Load (e.g. EV charging), added to net demand.
    Load,
}

impl Direction {
    /// `-1.0` for generation, `+1.0` for load.
    pub fn sign(self) -> f64 {
        match self {
            Self::Generation => -1.0,
            Self::Load => 1.0,
        }
    }
}

/// One evaluated capacity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HostingStep {
    pub capacity_kw: f64,
    /// Critical loading of the sweep, absent if the sweep diverged.
    pub critical_loading_pct: Option<f64>,
    /// Divergence text when the sweep failed.
    pub failure: Option<String>,
}

impl HostingStep {
    fn within(&self, limit_pct: f64) -> bool {
        self.critical_loading_pct.is_some_and(|pct| pct <= limit_pct)
    }
}

/// Outcome of [`search_hosting_capacity`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HostingResult {
    pub direction: Direction,
    pub limit_pct: f64,
    /// Largest evaluated capacity within the limit; `None` if even zero
    /// capacity violates it.
    pub hosting_kw: Option<f64>,
    /// First capacity that exceeded the limit or diverged.
    pub first_violation: Option<HostingStep>,
    /// Every step evaluated, in increasing capacity.
    pub steps: Vec<HostingStep>,
}

/// Finds the largest capacity the feeder can host within `limit_pct`.
///
/// Capacities `0, step_kw, 2·step_kw, …` up to `max_kw` are evaluated on
/// `base_net_kw + sign · capacity · unit_profile`. The search stops at the
/// first step whose critical loading exceeds the limit. A step whose sweep
/// diverges also ends the search and is recorded as the violating step.
///
/// # Errors
///
/// - [`StudyError::InvalidParameter`] if `step_kw` is not positive, `max_kw`
///   is negative, `limit_pct` is not positive or either profile is not finite
/// - Any sweep error other than divergence (e.g. a topology mismatch)
pub fn search_hosting_capacity<P: PowerFlow + ?Sized>(
    power_flow: &P,
    base_net_kw: &HourlyProfile,
    unit_profile: &HourlyProfile,
    direction: Direction,
    step_kw: f64,
    max_kw: f64,
    limit_pct: f64,
) -> Result<HostingResult, StudyError> {
    if !(step_kw.is_finite() && step_kw > 0.0) {
        return Err(StudyError::parameter("hosting.step_kw", "must be > 0"));
    }
    if !(max_kw.is_finite() && max_kw >= 0.0) {
        return Err(StudyError::parameter("hosting.max_kw", "must be >= 0"));
    }
    if !(limit_pct.is_finite() && limit_pct > 0.0) {
        return Err(StudyError::parameter("study.loading_limit_pct", "must be > 0"));
    }
    if !base_net_kw.is_finite() || !unit_profile.is_finite() {
        return Err(StudyError::parameter(
            "hosting",
            "profiles must hold finite values",
        ));
    }

    // Small tolerance so max_kw = n·step_kw includes the last step.
    let count = (max_kw / step_kw + 1e-9).floor() as usize;
    info!(?direction, step_kw, max_kw, limit_pct, "starting hosting capacity search");

    let mut steps = Vec::new();
    let mut hosting_kw = None;
    let mut first_violation = None;
    for k in 0..=count {
        let capacity_kw = k as f64 * step_kw;
        let net = *base_net_kw + unit_profile.scaled(direction.sign() * capacity_kw);
        let step = match compute_hourly_loading(power_flow, &net) {
            Ok(sweep) => HostingStep {
                capacity_kw,
                critical_loading_pct: Some(sweep.critical.loading_percent),
                failure: None,
            },
            Err(err @ StudyError::PowerFlowDivergence { .. }) => HostingStep {
                capacity_kw,
                critical_loading_pct: None,
                failure: Some(err.to_string()),
            },
            Err(err) => return Err(err),
        };
        debug!(capacity_kw, loading_pct = ?step.critical_loading_pct, "hosting step evaluated");
        let within = step.within(limit_pct);
        steps.push(step.clone());
        if !within {
            first_violation = Some(step);
            break;
        }
        hosting_kw = Some(capacity_kw);
    }

    info!(?hosting_kw, "hosting capacity search complete");
    Ok(HostingResult {
        direction,
        limit_pct,
        hosting_kw,
        first_violation,
        steps,
    })
}
