//! Read-only REST API over completed scenario outcomes.
//!
//! Routes:
//! - `GET /scenarios`: headline summary of every scenario
//! - `GET /scenarios/{name}`: summary, critical point and critical-hour table
//! - `GET /scenarios/{name}/loading?from=&to=`: hourly loadings (inclusive range)
//! - `GET /scenarios/{name}/dispatch`: battery dispatch, 404 without a battery

mod handlers;
mod types;

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::get;

use crate::report::ScenarioSummary;
use crate::scenario::ScenarioOutcome;

/// Immutable application state shared across all request handlers.
///
/// Constructed once after the study completes and wrapped in `Arc`; no
/// locks are needed since all data is read-only.
pub struct AppState {
    /// Loading limit the outcomes were judged against (percent).
    pub loading_limit_pct: f64,
    /// Scenario outcomes in run order.
    pub outcomes: Vec<ScenarioOutcome>,
    /// One summary per outcome, same order.
    pub summaries: Vec<ScenarioSummary>,
}

impl AppState {
    /// Builds the state, summarizing each outcome.
    pub fn new(
        outcomes: Vec<ScenarioOutcome>,
        loading_limit_pct: f64,
        usable_capacity_kwh: f64,
    ) -> Self {
        let summaries = outcomes
            .iter()
            .map(|o| ScenarioSummary::from_outcome(o, usable_capacity_kwh))
            .collect();
        Self {
            loading_limit_pct,
            outcomes,
            summaries,
        }
    }

    fn find(&self, name: &str) -> Option<(&ScenarioOutcome, &ScenarioSummary)> {
        self.outcomes
            .iter()
            .zip(&self.summaries)
            .find(|(outcome, _)| outcome.name == name)
    }
}

/// Builds the axum router with all API routes.
///
/// # Arguments
///
/// * `state` - Shared application state
///
/// # Returns
///
/// Configured `Router` ready to serve.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/scenarios", get(handlers::list_scenarios))
        .route("/scenarios/{name}", get(handlers::get_scenario))
        .route("/scenarios/{name}/loading", get(handlers::get_loading))
        .route("/scenarios/{name}/dispatch", get(handlers::get_dispatch))
        .with_state(state)
}

/// Binds to the given address and serves the API until the process exits.
///
/// # Arguments
///
/// * `state` - Shared application state
/// * `addr` - Socket address to bind to
///
/// # Errors
///
/// Returns an `io::Error` if the listener cannot bind or the server fails.
pub async fn serve(state: Arc<AppState>, addr: SocketAddr) -> io::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "API server listening");
    axum::serve(listener, app).await
}
