mod common;

use approx::assert_relative_eq;

use common::scratch_dir;
use feeder_study::config::StudyConfig;
use feeder_study::io::export::export_scenario;
use feeder_study::report::StudyReport;
use feeder_study::scenario::{
    RunOptions, ScenarioOutcome, compose_net_demand, critical_artifact_path, run_study,
};
use feeder_study::study::loading::compute_hourly_loading;

/// Loading of a line carrying `buses` community buses at `net_kw` each.
fn trunk_loading(buses: f64, net_kw: f64, max_i_ka: f64) -> f64 {
    let current_a = buses * net_kw.abs() / (3.0_f64.sqrt() * 20.0);
    100.0 * current_a / (max_i_ka * 1000.0)
}

fn community_outcomes() -> Vec<ScenarioOutcome> {
    let cfg = StudyConfig::community();
    let inputs = cfg.study_inputs();
    let Ok(inputs) = inputs else {
        panic!("community inputs should build");
    };
    let outcomes = run_study(
        &cfg.feeder_model(),
        &inputs,
        &cfg.scenarios,
        &RunOptions::default(),
    );
    match outcomes {
        Ok(outcomes) => outcomes,
        Err(err) => panic!("community study should run: {err}"),
    }
}

fn find<'a>(outcomes: &'a [ScenarioOutcome], name: &str) -> &'a ScenarioOutcome {
    match outcomes.iter().find(|o| o.name == name) {
        Some(outcome) => outcome,
        None => panic!("missing scenario {name}"),
    }
}

#[test]
fn community_scenarios_locate_expected_critical_points() {
    let outcomes = community_outcomes();
    assert_eq!(outcomes.len(), 5);

    // Evening peak of 246 kW at hours 20 and 21; the first hour and the
    // first trunk line win the tie.
    let base = find(&outcomes, "base");
    assert_eq!(base.sweep.critical.hour, 20);
    assert_eq!(base.sweep.critical.line_id, 0);
    assert_relative_eq!(
        base.sweep.critical.loading_percent,
        trunk_loading(8.0, 246.0, 0.145),
        max_relative = 1e-9
    );
    assert!(base.within_limit);

    // Noon reverse flow: 123 − 800 kW per bus.
    let pv = find(&outcomes, "pv");
    assert_eq!(pv.sweep.critical.hour, 13);
    assert_relative_eq!(
        pv.sweep.critical.loading_percent,
        trunk_loading(8.0, 677.0, 0.145),
        max_relative = 1e-9
    );
    assert!(!pv.within_limit);
    assert_eq!(pv.peak_pv_kw, 800.0);

    // Evening EV peak: 246 + 360 kW per bus.
    let ev = find(&outcomes, "ev");
    assert_eq!(ev.sweep.critical.hour, 20);
    assert_relative_eq!(
        ev.sweep.critical.loading_percent,
        trunk_loading(8.0, 606.0, 0.145),
        max_relative = 1e-9
    );
    assert_eq!(ev.peak_ev_kw, 360.0);
}

#[test]
fn battery_scenarios_carry_dispatch_into_net_demand() {
    let outcomes = community_outcomes();
    for name in ["pv_bess", "ev_bess"] {
        let outcome = find(&outcomes, name);
        let Some(dispatch) = &outcome.dispatch else {
            panic!("{name} should have a dispatch");
        };
        let p = &outcome.profiles;
        assert_eq!(p.bess_kw, dispatch.net_battery_profile());
        assert_eq!(p.net_kw, compose_net_demand(&p.demand_kw, &p.pv_kw, &p.ev_kw, &p.bess_kw));
    }
    assert_eq!(find(&outcomes, "pv_bess").peak_pv_kw, 950.0);
    assert_eq!(find(&outcomes, "ev_bess").peak_ev_kw, 510.0);
}

#[test]
fn recomputing_composed_net_demand_reproduces_critical_point() {
    let cfg = StudyConfig::community();
    let outcome_set = community_outcomes();
    let outcome = find(&outcome_set, "pv_bess");
    let p = &outcome.profiles;
    let independent = (p.demand_kw - p.pv_kw) + p.bess_kw;

    let sweep = compute_hourly_loading(&cfg.feeder_model(), &independent);
    assert_eq!(sweep.map(|s| s.critical).ok(), Some(outcome.sweep.critical.clone()));
}

#[test]
fn critical_table_matches_matrix_column() {
    for outcome in community_outcomes() {
        let hour = outcome.sweep.critical.hour;
        let column = outcome.sweep.matrix.hour_column(hour).unwrap_or_default();
        let table: Vec<f64> = outcome
            .critical_table
            .iter()
            .map(|l| l.loading_percent)
            .collect();
        assert_eq!(table, column, "scenario {}", outcome.name);
    }
}

#[test]
fn artifacts_are_written_per_scenario() {
    let dir = scratch_dir("artifacts");
    let cfg = StudyConfig::community();
    let Ok(inputs) = cfg.study_inputs() else {
        panic!("community inputs should build");
    };
    let options = RunOptions {
        artifact_dir: Some(dir.clone()),
        parallel: false,
    };
    let outcomes = run_study(&cfg.feeder_model(), &inputs, &cfg.scenarios, &options);
    let Ok(outcomes) = outcomes else {
        panic!("study should run");
    };

    for outcome in &outcomes {
        let written = export_scenario(outcome, &dir).unwrap_or_default();
        let expected = if outcome.dispatch.is_some() { 3 } else { 2 };
        assert_eq!(written.len(), expected, "scenario {}", outcome.name);
        assert!(written.iter().all(|p| p.exists()));
        assert!(critical_artifact_path(&dir, outcome).exists());
    }
    assert!(dir.join("base_hour20.csv").exists());
    assert!(dir.join("pv_bess_dispatch.csv").exists());
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn report_flags_scenarios_over_limit() {
    let outcomes = community_outcomes();
    let report = StudyReport::from_outcomes(&outcomes, 100.0, 900.0);
    assert!(report.violation_count() >= 1);
    let text = report.to_string();
    for name in ["base", "pv", "pv_bess", "ev", "ev_bess"] {
        assert!(text.contains(&format!("[{name}]")));
    }
    assert!(text.contains("Dispatch objective:"));
}

#[test]
fn flat_preset_battery_stays_idle() {
    let cfg = StudyConfig::flat();
    let Ok(inputs) = cfg.study_inputs() else {
        panic!("flat inputs should build");
    };
    let outcomes = run_study(&cfg.feeder_model(), &inputs, &cfg.scenarios, &RunOptions::default());
    let Ok(outcomes) = outcomes else {
        panic!("flat study should run");
    };
    let bess = find(&outcomes, "bess");
    assert!(bess.profiles.bess_kw.iter().all(|v| v.abs() < 1e-6));
    // Constant net demand ties every hour; the first one is reported.
    assert_eq!(find(&outcomes, "base").sweep.critical.hour, 0);
    assert_eq!(find(&outcomes, "pv").sweep.critical.hour, 13);
}
