#![cfg(feature = "api")]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tower::util::ServiceExt;

use feeder_study::api::{AppState, router};
use feeder_study::config::StudyConfig;
use feeder_study::scenario::{RunOptions, run_study};

fn community_state() -> Arc<AppState> {
    let cfg = StudyConfig::community();
    let inputs = cfg.study_inputs().expect("community inputs should build");
    let outcomes = run_study(
        &cfg.feeder_model(),
        &inputs,
        &cfg.scenarios,
        &RunOptions::default(),
    )
    .expect("community study should run");
    Arc::new(AppState::new(
        outcomes,
        cfg.study.loading_limit_pct,
        cfg.battery.usable_capacity_kwh(),
    ))
}

async fn get(state: Arc<AppState>, uri: &str) -> (StatusCode, Value) {
    let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let resp = router(state).oneshot(req).await.unwrap();
    let status = resp.status();
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn community_study_is_browsable() {
    let state = community_state();

    let (status, json) = get(Arc::clone(&state), "/scenarios").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json.as_array().map(Vec::len), Some(5));
    assert_eq!(json[1]["name"], "pv");
    assert_eq!(json[1]["within_limit"], false);

    let (status, json) = get(Arc::clone(&state), "/scenarios/ev").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["critical"]["hour"], 20);
    assert_eq!(json["critical_table"].as_array().map(Vec::len), Some(12));

    let (status, json) = get(Arc::clone(&state), "/scenarios/pv/loading?from=13&to=13").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json[0]["net_kw"], -677.0);
    assert_eq!(json[0]["lines"].as_array().map(Vec::len), Some(12));
}

#[tokio::test]
async fn dispatch_only_for_battery_scenarios() {
    let state = community_state();

    let (status, json) = get(Arc::clone(&state), "/scenarios/ev_bess/dispatch").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["records"].as_array().map(Vec::len), Some(24));
    assert_eq!(json["initial_energy_kwh"], 5.0);

    let (status, json) = get(state, "/scenarios/ev/dispatch").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json.get("error").is_some());
}
