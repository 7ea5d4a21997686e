use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::routes::AppState;

pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let dispatcher = &state.dispatcher;
    let phase = *state.phase.borrow();
    let in_flight_jobs = dispatcher.jobs().len().await;
    let pending_replies = dispatcher.history().pending_count().await;

    Json(json!({
        "status": "ok",
        "node": dispatcher.node_name(),
        "address": dispatcher.address(),
        "workload": dispatcher.workload_class(),
        "destinations": dispatcher.destinations(),
        "phase": phase,
        "in_flight_jobs": in_flight_jobs,
        "handoffs": dispatcher.jobs().handoffs_in_progress(),
        "pending_replies": pending_replies,
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}
