// libs/scheduling-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};

use shared_database::ScheduleStore;
use shared_models::error::AppError;

use crate::models::{
    AppointmentSearchQuery, AppointmentStatus, BookSlotRequest, PublishScheduleRequest,
    ScheduleError,
};
use crate::services::availability::AvailabilityService;
use crate::services::booking::BookingService;
use crate::services::cancellation::CancellationService;
use crate::services::publisher::SchedulePublisher;

// ==============================================================================
// QUERY PARAMETER STRUCTS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct AvailabilityParams {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct AppointmentQueryParams {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub status: Option<AppointmentStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

fn map_schedule_error(err: ScheduleError) -> AppError {
    match err {
        ScheduleError::Validation(msg) => AppError::ValidationError(msg),
        ScheduleError::NoSchedule(day) => {
            AppError::NotFound(format!("No schedule published for {}", day))
        }
        ScheduleError::SlotUnavailable { day, time } => {
            AppError::Conflict(format!("Slot {} on {} is not available", time, day))
        }
        ScheduleError::NotFound(id) => AppError::NotFound(format!("Appointment {} not found", id)),
        ScheduleError::AlreadyCancelled(id) => {
            AppError::Conflict(format!("Appointment {} is already cancelled", id))
        }
        ScheduleError::Store(msg) => AppError::Database(msg),
    }
}

// ==============================================================================
// SCHEDULE HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn publish_schedule(
    State(store): State<Arc<ScheduleStore>>,
    Path(day): Path<NaiveDate>,
    Json(request): Json<PublishScheduleRequest>,
) -> Result<Json<Value>, AppError> {
    let publisher = SchedulePublisher::new(&store);

    let outcome = publisher
        .publish_schedule(day, &request.slots)
        .await
        .map_err(map_schedule_error)?;

    Ok(Json(json!({
        "success": true,
        "schedule": outcome,
        "message": "Schedule published successfully"
    })))
}

#[axum::debug_handler]
pub async fn query_availability(
    State(store): State<Arc<ScheduleStore>>,
    Query(params): Query<AvailabilityParams>,
) -> Result<Json<Value>, AppError> {
    let availability = AvailabilityService::new(&store);

    let days = availability
        .query_availability(params.from, params.to)
        .await
        .map_err(map_schedule_error)?;

    Ok(Json(json!({ "days": days })))
}

// ==============================================================================
// APPOINTMENT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn book_slot(
    State(store): State<Arc<ScheduleStore>>,
    Json(request): Json<BookSlotRequest>,
) -> Result<Json<Value>, AppError> {
    let booking = BookingService::new(&store);

    let appointment_id = booking
        .book_slot(request)
        .await
        .map_err(map_schedule_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment_id": appointment_id,
        "message": "Appointment booked successfully"
    })))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(store): State<Arc<ScheduleStore>>,
    Path(appointment_id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    let cancellation = CancellationService::new(&store);

    let outcome = cancellation
        .cancel_appointment(appointment_id)
        .await
        .map_err(map_schedule_error)?;

    let message = if outcome.slot_released {
        "Appointment cancelled and slot released"
    } else {
        "Appointment cancelled; slot was no longer held by this appointment"
    };

    Ok(Json(json!({
        "success": true,
        "cancellation": outcome,
        "message": message
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(store): State<Arc<ScheduleStore>>,
    Path(appointment_id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    let booking = BookingService::new(&store);

    let appointment = booking
        .get_appointment(appointment_id)
        .await
        .map_err(map_schedule_error)?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn search_appointments(
    State(store): State<Arc<ScheduleStore>>,
    Query(params): Query<AppointmentQueryParams>,
) -> Result<Json<Value>, AppError> {
    let booking = BookingService::new(&store);

    let query = AppointmentSearchQuery {
        from_day: params.from,
        to_day: params.to,
        status: params.status,
        limit: params.limit,
        offset: params.offset,
    };

    let appointments = booking
        .search_appointments(query)
        .await
        .map_err(map_schedule_error)?;

    Ok(Json(json!({ "appointments": appointments })))
}
