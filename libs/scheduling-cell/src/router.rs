// libs/scheduling-cell/src/router.rs
use std::sync::Arc;

use axum::{
    routing::{get, post, put},
    Router,
};

use shared_database::ScheduleStore;

use crate::handlers;

pub fn scheduling_routes(state: Arc<ScheduleStore>) -> Router {
    Router::new()
        // Staff-facing schedule management
        .route("/schedule/{day}", put(handlers::publish_schedule))
        .route("/schedule", get(handlers::query_availability))
        // Client-facing booking lifecycle
        .route(
            "/appointments",
            post(handlers::book_slot).get(handlers::search_appointments),
        )
        .route("/appointments/{appointment_id}", get(handlers::get_appointment))
        .route(
            "/appointments/{appointment_id}/cancel",
            post(handlers::cancel_appointment),
        )
        .with_state(state)
}
