use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};

use scheduling_cell::router::scheduling_routes;
use shared_database::ScheduleStore;

pub fn create_router(state: Arc<ScheduleStore>) -> Router {
    let system_routes = Router::new()
        .route("/", get(|| async { "Clinic scheduling API is running!" }))
        .route("/healthz", get(healthz))
        .with_state(state.clone());

    system_routes.merge(scheduling_routes(state))
}

async fn healthz(State(store): State<Arc<ScheduleStore>>) -> Json<Value> {
    let healthy = store.is_healthy().await;
    Json(json!({
        "status": if healthy { "ok" } else { "degraded" }
    }))
}
