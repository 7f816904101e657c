//! Post-hoc study summary derived from completed scenario outcomes.

use std::fmt;

use serde::Serialize;

use crate::scenario::ScenarioOutcome;
use crate::study::hosting::{Direction, HostingResult};

/// Battery figures of a dispatched scenario.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatterySummary {
    /// LP objective value (revenue minus purchases minus degradation).
    pub objective: f64,
    /// Charged plus discharged energy (kWh).
    pub throughput_kwh: f64,
    /// Throughput / (2 · usable capacity).
    pub equivalent_full_cycles: f64,
}

/// One scenario's headline results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioSummary {
    pub name: String,
    pub critical_hour: usize,
    pub critical_line_id: usize,
    pub critical_label: String,
    pub critical_loading_pct: f64,
    pub within_limit: bool,
    pub peak_pv_kw: f64,
    pub peak_ev_kw: f64,
    pub battery: Option<BatterySummary>,
}

impl ScenarioSummary {
    /// Summarizes an outcome; `usable_capacity_kwh` is `E_MAX − E_MIN`.
    pub fn from_outcome(outcome: &ScenarioOutcome, usable_capacity_kwh: f64) -> Self {
        let critical = &outcome.sweep.critical;
        Self {
            name: outcome.name.clone(),
            critical_hour: critical.hour,
            critical_line_id: critical.line_id,
            critical_label: critical.label.clone(),
            critical_loading_pct: critical.loading_percent,
            within_limit: outcome.within_limit,
            peak_pv_kw: outcome.peak_pv_kw,
            peak_ev_kw: outcome.peak_ev_kw,
            battery: outcome.dispatch.as_ref().map(|d| BatterySummary {
                objective: d.objective,
                throughput_kwh: d.throughput_kwh(),
                equivalent_full_cycles: d.equivalent_full_cycles(usable_capacity_kwh),
            }),
        }
    }
}

/// Summary of a whole study run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudyReport {
    pub loading_limit_pct: f64,
    pub scenarios: Vec<ScenarioSummary>,
    pub hosting: Vec<HostingResult>,
}

impl StudyReport {
    /// Builds the report from outcomes in run order.
    pub fn from_outcomes(
        outcomes: &[ScenarioOutcome],
        loading_limit_pct: f64,
        usable_capacity_kwh: f64,
    ) -> Self {
        Self {
            loading_limit_pct,
            scenarios: outcomes
                .iter()
                .map(|o| ScenarioSummary::from_outcome(o, usable_capacity_kwh))
                .collect(),
            hosting: Vec::new(),
        }
    }

    /// Attaches a hosting-capacity search result.
    pub fn with_hosting(mut self, hosting: HostingResult) -> Self {
        self.hosting.push(hosting);
        self
    }

    /// Number of scenarios whose critical loading exceeds the limit.
    pub fn violation_count(&self) -> usize {
        self.scenarios.iter().filter(|s| !s.within_limit).count()
    }
}

impl fmt::Display for StudyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Feeder Study Report ---")?;
        writeln!(f, "Loading limit:         {:.1}%", self.loading_limit_pct)?;
        for s in &self.scenarios {
            writeln!(f)?;
            writeln!(f, "[{}]", s.name)?;
            writeln!(
                f,
                "Critical point:        hour {} on {}",
                s.critical_hour, s.critical_label
            )?;
            writeln!(
                f,
                "Critical loading:      {:.2}% ({})",
                s.critical_loading_pct,
                if s.within_limit { "within limit" } else { "EXCEEDS LIMIT" }
            )?;
            writeln!(f, "Peak PV:               {:.2} kW", s.peak_pv_kw)?;
            writeln!(f, "Peak EV:               {:.2} kW", s.peak_ev_kw)?;
            if let Some(b) = &s.battery {
                writeln!(f, "Dispatch objective:    {:.2}", b.objective)?;
                writeln!(
                    f,
                    "Battery throughput:    {:.2} kWh ({:.2} equiv. cycles)",
                    b.throughput_kwh, b.equivalent_full_cycles
                )?;
            }
        }
        for h in &self.hosting {
            writeln!(f)?;
            let kind = match h.direction {
                Direction::Generation => "generation",
                Direction::Load => "load",
            };
            match h.hosting_kw {
                Some(kw) => writeln!(f, "Hosting capacity ({kind}): {kw:.1} kW")?,
                None => writeln!(f, "Hosting capacity ({kind}): none (base case over limit)")?,
            }
            if let Some(step) = &h.first_violation {
                match &step.failure {
                    Some(reason) => {
                        writeln!(f, "  first failure at {:.1} kW: {reason}", step.capacity_kw)?
                    }
                    None => writeln!(
                        f,
                        "  first violation at {:.1} kW ({:.2}%)",
                        step.capacity_kw,
                        step.critical_loading_pct.unwrap_or(f64::NAN)
                    )?,
                }
            }
        }
        write!(
            f,
            "\nScenarios over limit:  {}/{}",
            self.violation_count(),
            self.scenarios.len()
        )
    }
}
