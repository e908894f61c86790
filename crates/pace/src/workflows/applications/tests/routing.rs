use super::common::*;
use axum::body::Body;
use axum::extract::State;
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use crate::workflows::applications::domain::{Actor, NewApplication};
use crate::workflows::applications::router::{create_handler, ACTOR_HEADER};
use crate::workflows::applications::{ApplicationService, ApplicationStore};
use crate::workflows::dashboard::DashboardHub;

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(ACTOR_HEADER, COUNSELLOR.0.to_string())
        .body(Body::from(body.to_string()))
        .expect("request builds")
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request builds")
}

fn new_application_body() -> Value {
    json!({
        "student_id": REFERRED_STUDENT,
        "course_id": LEEDS_MSC,
        "status_id": SUBMITTED,
        "intake": "September",
        "year": 2025,
    })
}

#[tokio::test]
async fn create_route_returns_created_application() {
    let (service, _, _, _) = build_service();
    let router = application_router_with_service(service);

    let response = router
        .oneshot(json_request(
            "POST",
            "/api/v1/applications",
            new_application_body(),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = read_json_body(response).await;
    assert_eq!(body["application_manager"], json!(101));
    assert_eq!(body["created_by"], json!(COUNSELLOR.0));
    assert_eq!(body["current_status"], json!(SUBMITTED.0));
}

#[tokio::test]
async fn malformed_actor_header_is_rejected() {
    let (service, _, _, _) = build_service();
    let router = application_router_with_service(service);

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/applications")
        .header(header::CONTENT_TYPE, "application/json")
        .header(ACTOR_HEADER, "counsellor")
        .body(Body::from(new_application_body().to_string()))
        .expect("request builds");
    let response = router.oneshot(request).await.expect("router responds");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json_body(response).await;
    assert!(body["error"]
        .as_str()
        .is_some_and(|message| message.contains(ACTOR_HEADER)));
}

#[tokio::test]
async fn unknown_application_is_not_found() {
    let (service, _, _, _) = build_service();
    let router = application_router_with_service(service);

    let response = router
        .oneshot(get_request("/api/v1/applications/404"))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn status_route_reports_change_and_restriction() {
    let (service, _, _, _) = build_service();
    let application = service
        .create(
            NewApplication {
                student_id: REFERRED_STUDENT,
                course_id: Some(LEEDS_MSC),
                status_id: Some(SUBMITTED),
                intake: None,
                year: None,
            },
            Actor::system(),
        )
        .expect("application created");
    let router = application_router_with_service(service);
    let uri = format!("/api/v1/applications/{}/status", application.id);

    let response = router
        .clone()
        .oneshot(json_request("PUT", &uri, json!({ "status_id": VISA_GRANT })))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["changed"], json!(true));
    assert_eq!(body["previous_status"], json!(SUBMITTED.0));
    assert_eq!(body["log"]["created_by"], json!(COUNSELLOR.0));

    let restricted = router
        .oneshot(json_request("PUT", &uri, json!({ "status_id": COE_APPLIED })))
        .await
        .expect("router responds");
    assert_eq!(restricted.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn status_logs_route_lists_newest_first() {
    let (service, _, _, _) = build_service();
    let application = service
        .create(
            NewApplication {
                student_id: DIRECT_STUDENT,
                course_id: Some(LEEDS_MSC),
                status_id: Some(SUBMITTED),
                intake: None,
                year: None,
            },
            Actor::system(),
        )
        .expect("application created");
    service
        .update_status(application.id, CONDITIONAL_OFFER, Actor::system())
        .expect("status updated");
    let router = application_router_with_service(service);

    let response = router
        .oneshot(get_request(&format!(
            "/api/v1/applications/{}/status-logs",
            application.id
        )))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    let entries = body.as_array().expect("array payload");
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["status"], json!("Conditional Offer Received"));
    assert_eq!(entries[0]["previous_status"], json!("Application Submitted"));
}

#[tokio::test]
async fn next_manager_route_previews_round_robin() {
    let (service, _, _, _) = build_service();
    let router = application_router_with_service(service);

    let response = router
        .clone()
        .oneshot(get_request("/api/v1/universities/1/next-manager"))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["next_manager"]["staff_id"], json!(1));
    assert_eq!(body["last_assigned"], Value::Null);

    let missing = router
        .oneshot(get_request("/api/v1/universities/404/next-manager"))
        .await
        .expect("router responds");
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn status_type_routes_filter_by_country_and_reject_duplicates() {
    let (service, _, _, _) = build_service();
    let router = application_router_with_service(service);

    let response = router
        .clone()
        .oneshot(get_request("/api/v1/status-types?country=UK"))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body.as_array().map(Vec::len), Some(3));

    let duplicate = router
        .oneshot(json_request(
            "POST",
            "/api/v1/status-types",
            json!({ "name": "Application Submitted", "priority": 1 }),
        ))
        .await
        .expect("router responds");
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn dashboard_route_returns_current_counts() {
    let (service, _, _, _) = build_service();
    let router = application_router_with_service(service);

    let response = router
        .oneshot(get_request("/api/v1/dashboard"))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["student_count"], json!(2));
    assert_eq!(body["application_count"], json!(0));
}

#[tokio::test]
async fn create_handler_returns_internal_error_on_repository_failure() {
    let service = Arc::new(ApplicationService::new(
        Arc::new(UnavailableStore),
        Arc::new(MemoryNotifier::default()),
        DashboardHub::new(4),
    ));

    let request: NewApplication =
        serde_json::from_value(new_application_body()).expect("valid payload");
    let response = create_handler::<UnavailableStore, MemoryNotifier>(
        State(service),
        Actor::system(),
        axum::Json(request),
    )
    .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn student_route_saves_and_validates_partner() {
    let (service, store, _, _) = build_service();
    let router = application_router_with_service(service);

    let response = router
        .clone()
        .oneshot(json_request(
            "PUT",
            "/api/v1/students/3",
            json!({ "name": "Ana Souza", "partner_id": 1 }),
        ))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["id"], json!(3));
    assert_eq!(body["is_active"], json!(true));

    let response = router
        .oneshot(json_request(
            "PUT",
            "/api/v1/students/4",
            json!({ "name": "Tomas Diaz", "partner_id": 77 }),
        ))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let students = store
        .atomically(|tx| tx.students())
        .expect("students readable");
    assert_eq!(students.len(), 3);
}
