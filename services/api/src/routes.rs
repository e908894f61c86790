use crate::infra::AppState;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use pace::error::AppError;
use pace::workflows::applications::{
    application_router, ApplicationService, ApplicationStore, Notifier,
};
use pace::workflows::dashboard::dashboard_router;
use pace::workflows::roster::RosterImporter;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Serialize)]
pub(crate) struct RosterUploadResponse {
    pub(crate) loaded: usize,
}

pub(crate) fn with_application_routes<S, N>(service: Arc<ApplicationService<S, N>>) -> Router
where
    S: ApplicationStore + 'static,
    N: Notifier + 'static,
{
    let dashboard = dashboard_router(service.dashboard().clone());
    let roster = Router::new()
        .route("/api/v1/staff/roster", post(roster_upload_endpoint::<S, N>))
        .with_state(service.clone());

    application_router(service)
        .merge(dashboard)
        .merge(roster)
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// Loads a CSV roster sent as the request body.
pub(crate) async fn roster_upload_endpoint<S, N>(
    State(service): State<Arc<ApplicationService<S, N>>>,
    body: String,
) -> Result<Json<RosterUploadResponse>, AppError>
where
    S: ApplicationStore + 'static,
    N: Notifier + 'static,
{
    let members = RosterImporter::from_reader(body.as_bytes())?;
    let loaded = RosterImporter::load_into(service.store().as_ref(), members)?;
    info!(loaded, "staff roster uploaded");
    Ok(Json(RosterUploadResponse { loaded }))
}
