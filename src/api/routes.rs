use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;

use super::health::HealthState;

#[derive(Clone)]
pub struct ApiState {
    pub health: Arc<HealthState>,
}

/// The process's ops surface (§1 "Ops surface"): liveness and readiness
/// only — the watch/user/filter CRUD façade is an external collaborator,
/// out of scope here.
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .with_state(state)
}

#[derive(Serialize)]
struct ProbeResponse {
    ok: bool,
    db_reachable: bool,
    event_log_connected: bool,
    search_index_reachable: bool,
    startup_complete: bool,
}

impl ProbeResponse {
    fn from(health: &HealthState, ok: bool) -> Self {
        Self {
            ok,
            db_reachable: health.db_reachable(),
            event_log_connected: health.event_log_connected(),
            search_index_reachable: health.search_index_reachable(),
            startup_complete: health.startup_complete(),
        }
    }
}

async fn healthz(State(state): State<ApiState>) -> (StatusCode, Json<ProbeResponse>) {
    let ok = state.health.is_live();
    let status = if ok { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status, Json(ProbeResponse::from(&state.health, ok)))
}

async fn readyz(State(state): State<ApiState>) -> (StatusCode, Json<ProbeResponse>) {
    let ok = state.health.is_ready();
    let status = if ok { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status, Json(ProbeResponse::from(&state.health, ok)))
}
