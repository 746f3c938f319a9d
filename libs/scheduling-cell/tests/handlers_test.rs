use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use scheduling_cell::router::scheduling_routes;
use shared_database::ScheduleStore;

async fn create_test_app() -> (TempDir, Router) {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let db_path = dir.path().join("clinic.db");
    let url = format!("sqlite://{}", db_path.display());

    let store = ScheduleStore::from_url(&url).await.expect("failed to open store");
    store.init_schema().await.expect("failed to init schema");

    (dir, scheduling_routes(Arc::new(store)))
}

async fn send_json(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(value) => {
            builder = builder.header("content-type", "application/json");
            builder
                .body(Body::from(serde_json::to_vec(&value).expect("serialize body")))
                .expect("build request")
        }
        None => builder.body(Body::empty()).expect("build request"),
    };

    let response = app.clone().oneshot(request).await.expect("request failed");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("parse body")
    };

    (status, value)
}

#[tokio::test]
async fn test_publish_and_book_flow() {
    let (_dir, app) = create_test_app().await;

    let (status, body) = send_json(
        &app,
        "PUT",
        "/schedule/2025-03-10",
        Some(json!({ "slots": ["10:00", "09:00"] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["schedule"]["available"], json!(["09:00", "10:00"]));

    let (status, body) = send_json(
        &app,
        "POST",
        "/appointments",
        Some(json!({
            "day": "2025-03-10",
            "slot_time": "09:00",
            "patient_name": "Anna Keller",
            "patient_phone": "+41 79 555 01 01",
            "patient_email": "anna.keller@example.com",
            "reason": "checkup"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    let appointment_id = body["appointment_id"].as_i64().expect("appointment id");

    // Same slot again: conflict
    let (status, _) = send_json(
        &app,
        "POST",
        "/appointments",
        Some(json!({
            "day": "2025-03-10",
            "slot_time": "09:00",
            "patient_name": "Bruno Meier",
            "patient_phone": "+41 79 555 02 02",
            "patient_email": "bruno.meier@example.com"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // The booked slot shows up in the availability projection
    let (status, body) = send_json(&app, "GET", "/schedule?from=2025-03-01&to=2025-03-31", None).await;
    assert_eq!(status, StatusCode::OK);
    let entry = &body["days"]["2025-03-10"];
    assert_eq!(entry["available"], json!(["09:00", "10:00"]));
    assert_eq!(
        entry["booked"]["09:00"]["appointment_id"].as_i64(),
        Some(appointment_id)
    );

    // Cancel, then the ledger shows the status change
    let (status, body) = send_json(
        &app,
        "POST",
        &format!("/appointments/{}/cancel", appointment_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cancellation"]["slot_released"], json!(true));

    let (status, body) = send_json(&app, "GET", &format!("/appointments/{}", appointment_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("cancelled"));

    // Second cancel is a conflict, not a crash
    let (status, _) = send_json(
        &app,
        "POST",
        &format!("/appointments/{}/cancel", appointment_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_booking_error_status_codes() {
    let (_dir, app) = create_test_app().await;

    // No schedule published for the day
    let (status, body) = send_json(
        &app,
        "POST",
        "/appointments",
        Some(json!({
            "day": "2025-03-11",
            "slot_time": "09:00",
            "patient_name": "Anna Keller",
            "patient_phone": "+41 79 555 01 01",
            "patient_email": "anna.keller@example.com"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().expect("error message").contains("2025-03-11"));

    // Malformed slot time
    let (status, _) = send_json(
        &app,
        "POST",
        "/appointments",
        Some(json!({
            "day": "2025-03-11",
            "slot_time": "9am",
            "patient_name": "Anna Keller",
            "patient_phone": "+41 79 555 01 01",
            "patient_email": "anna.keller@example.com"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Missing contact field
    let (status, _) = send_json(
        &app,
        "POST",
        "/appointments",
        Some(json!({
            "day": "2025-03-11",
            "slot_time": "09:00",
            "patient_name": "",
            "patient_phone": "+41 79 555 01 01",
            "patient_email": "anna.keller@example.com"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_publish_error_status_codes() {
    let (_dir, app) = create_test_app().await;

    let (status, _) = send_json(
        &app,
        "PUT",
        "/schedule/2025-03-10",
        Some(json!({ "slots": ["25:00"] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send_json(&app, "GET", "/schedule?from=2025-03-31&to=2025-03-01", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_appointment_returns_not_found() {
    let (_dir, app) = create_test_app().await;

    let (status, _) = send_json(&app, "GET", "/appointments/4242", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send_json(&app, "POST", "/appointments/4242/cancel", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_search_appointments_endpoint() {
    let (_dir, app) = create_test_app().await;

    send_json(
        &app,
        "PUT",
        "/schedule/2025-03-10",
        Some(json!({ "slots": ["09:00", "10:00"] })),
    )
    .await;

    for (time, name) in [("09:00", "Anna Keller"), ("10:00", "Bruno Meier")] {
        let (status, _) = send_json(
            &app,
            "POST",
            "/appointments",
            Some(json!({
                "day": "2025-03-10",
                "slot_time": time,
                "patient_name": name,
                "patient_phone": "+41 79 555 01 01",
                "patient_email": "patient@example.com"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = send_json(
        &app,
        "GET",
        "/appointments?from=2025-03-10&to=2025-03-10&status=confirmed",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let appointments = body["appointments"].as_array().expect("appointments array");
    assert_eq!(appointments.len(), 2);
    assert_eq!(appointments[0]["slot_time"], json!("09:00"));
}
