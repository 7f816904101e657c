//! Request handlers for the API endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;

use super::AppState;
use super::types::{ErrorResponse, HourRangeQuery, HourRecord, ScenarioDetail};
use crate::profile::HOURS;
use crate::report::ScenarioSummary;
use crate::study::dispatch::DispatchResult;

type ApiError = (StatusCode, Json<ErrorResponse>);

fn error(status: StatusCode, message: String) -> ApiError {
    (status, Json(ErrorResponse { error: message }))
}

fn not_found(name: &str) -> ApiError {
    error(StatusCode::NOT_FOUND, format!("unknown scenario `{name}`"))
}

/// Returns the summary of every scenario in run order.
///
/// `GET /scenarios` → 200 + `Vec<ScenarioSummary>` JSON
pub async fn list_scenarios(State(state): State<Arc<AppState>>) -> Json<Vec<ScenarioSummary>> {
    Json(state.summaries.clone())
}

/// Returns one scenario's summary, critical point and critical-hour table.
///
/// `GET /scenarios/{name}` → 200 + `ScenarioDetail` JSON, 404 if unknown
pub async fn get_scenario(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<ScenarioDetail>, ApiError> {
    let (outcome, summary) = state.find(&name).ok_or_else(|| not_found(&name))?;
    Ok(Json(ScenarioDetail {
        summary: summary.clone(),
        critical: outcome.sweep.critical.clone(),
        critical_table: outcome.critical_table.clone(),
        loading_limit_pct: state.loading_limit_pct,
    }))
}

/// Returns hourly line loadings, optionally filtered by hour range.
///
/// `GET /scenarios/{name}/loading` → 200 + `Vec<HourRecord>` JSON
/// `GET /scenarios/{name}/loading?from=N&to=M` → filtered range (inclusive)
/// `GET /scenarios/{name}/loading?from=10&to=5` → 400 + `ErrorResponse`
pub async fn get_loading(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Query(query): Query<HourRangeQuery>,
) -> Result<Json<Vec<HourRecord>>, ApiError> {
    let from = query.from.unwrap_or(0);
    let to = query.to.unwrap_or(HOURS - 1);

    if from > to {
        return Err(error(
            StatusCode::BAD_REQUEST,
            format!("`from` ({from}) must be <= `to` ({to})"),
        ));
    }
    let (outcome, _) = state.find(&name).ok_or_else(|| not_found(&name))?;

    let records: Vec<HourRecord> = (from..=to.min(HOURS - 1))
        .filter_map(|hour| HourRecord::from_outcome(outcome, hour))
        .collect();
    Ok(Json(records))
}

/// Returns the battery dispatch of a scenario.
///
/// `GET /scenarios/{name}/dispatch` → 200 + `DispatchResult` JSON, 404 if the
/// scenario is unknown or has no battery
pub async fn get_dispatch(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<DispatchResult>, ApiError> {
    let (outcome, _) = state.find(&name).ok_or_else(|| not_found(&name))?;
    match &outcome.dispatch {
        Some(dispatch) => Ok(Json(dispatch.clone())),
        None => Err(error(
            StatusCode::NOT_FOUND,
            format!("scenario `{name}` has no battery dispatch"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use tower::util::ServiceExt;

    use super::*;
    use crate::api::router;
    use crate::grid::{LineLoading, LineTable, PowerFlowFailure};
    use crate::profile::HourlyProfile;
    use crate::scenario::{
        DispatchPlan, RunOptions, ScenarioDefinition, StudyInputs, run_study,
    };
    use crate::study::dispatch::BatteryParameters;

    fn two_lines(net_kw: f64) -> Result<LineTable, PowerFlowFailure> {
        Ok((0..2)
            .map(|line_id| LineLoading {
                line_id,
                label: format!("Line {line_id} (Bus {} -> Bus {})", line_id + 1, line_id + 2),
                loading_percent: net_kw.abs() / (line_id as f64 + 1.0),
            })
            .collect())
    }

    fn make_test_state() -> Arc<AppState> {
        let inputs = StudyInputs {
            demand_kw: HourlyProfile::from_fn(|h| 10.0 + h as f64),
            pv_pu: HourlyProfile::zeros(),
            ev_pu: HourlyProfile::zeros(),
            price: HourlyProfile::constant(10.0),
            battery: BatteryParameters {
                eta_c: 0.9,
                eta_d: 0.9,
                ..BatteryParameters::default()
            },
            loading_limit_pct: 100.0,
        };
        let scenarios = vec![
            ScenarioDefinition::default(),
            ScenarioDefinition {
                name: "bess".to_string(),
                dispatch: Some(DispatchPlan::default()),
                ..ScenarioDefinition::default()
            },
        ];
        let outcomes = run_study(&two_lines, &inputs, &scenarios, &RunOptions::default())
            .unwrap_or_default();
        Arc::new(AppState::new(outcomes, 100.0, 900.0))
    }

    async fn get(uri: &str) -> (StatusCode, serde_json::Value) {
        let app = router(make_test_state());
        let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn scenarios_lists_every_outcome() {
        let (status, json) = get("/scenarios").await;
        assert_eq!(status, StatusCode::OK);
        let names: Vec<&str> = json
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|s| s["name"].as_str())
            .collect();
        assert_eq!(names, vec!["base", "bess"]);
    }

    #[tokio::test]
    async fn scenario_detail_has_critical_point() {
        let (status, json) = get("/scenarios/base").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["critical"]["hour"], 23);
        assert_eq!(json["critical"]["line_id"], 0);
        assert_eq!(json["critical_table"].as_array().map(Vec::len), Some(2));
    }

    #[tokio::test]
    async fn unknown_scenario_returns_404() {
        let (status, json) = get("/scenarios/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(json.get("error").is_some());
    }

    #[tokio::test]
    async fn loading_returns_all_hours() {
        let (status, json) = get("/scenarios/base/loading").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json.as_array().map(Vec::len), Some(24));
    }

    #[tokio::test]
    async fn loading_range_query() {
        let (status, json) = get("/scenarios/base/loading?from=5&to=10").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json.as_array().map(Vec::len), Some(6)); // hours 5..=10
        assert_eq!(json[0]["hour"], 5);
        assert_eq!(json[5]["hour"], 10);
        assert_eq!(json[0]["lines"][1]["line_label"], "Line 1 (Bus 2 -> Bus 3)");
    }

    #[tokio::test]
    async fn loading_invalid_range_returns_400() {
        let (status, json) = get("/scenarios/base/loading?from=10&to=5").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json.get("error").is_some());
    }

    #[tokio::test]
    async fn dispatch_returns_records() {
        let (status, json) = get("/scenarios/bess/dispatch").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["records"].as_array().map(Vec::len), Some(24));
    }

    #[tokio::test]
    async fn dispatch_without_battery_returns_404() {
        let (status, _) = get("/scenarios/base/dispatch").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
