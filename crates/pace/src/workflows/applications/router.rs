use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Path, Query, State},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::domain::{
    Actor, ApplicationId, NewApplication, PartnerId, StaffId, StaffMember, StatusTypeId, Student,
    StudentId, UniversityId, UserId,
};
use super::notifications::Notifier;
use super::service::{ApplicationService, ApplicationServiceError};
use super::status::StatusError;
use super::store::{ApplicationStore, RepositoryError};

/// Header carrying the numeric id of the user performing the request.
pub const ACTOR_HEADER: &str = "x-actor-id";

#[axum::async_trait]
impl<St> FromRequestParts<St> for Actor
where
    St: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &St) -> Result<Self, Self::Rejection> {
        let Some(value) = parts.headers.get(ACTOR_HEADER) else {
            return Ok(Actor::system());
        };

        value
            .to_str()
            .ok()
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .map(|id| Actor::user(UserId(id)))
            .ok_or_else(|| {
                let payload = json!({
                    "error": format!("{ACTOR_HEADER} must be a numeric user id"),
                });
                (StatusCode::BAD_REQUEST, Json(payload)).into_response()
            })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct StatusChangeRequest {
    pub(crate) status_id: StatusTypeId,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReassignRequest {
    pub(crate) staff_id: StaffId,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ActiveFlagRequest {
    pub(crate) is_active: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StatusTypeRequest {
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) priority: i32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CountryStatusesRequest {
    pub(crate) status_ids: Vec<StatusTypeId>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StudentRequest {
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) partner_id: Option<PartnerId>,
    #[serde(default = "default_active")]
    pub(crate) is_active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct StatusTypeQuery {
    pub(crate) country: Option<String>,
}

/// Public projection of an employee; omits leave and university details.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct ManagerView {
    pub(crate) staff_id: StaffId,
    pub(crate) user_id: UserId,
    pub(crate) name: String,
}

impl From<StaffMember> for ManagerView {
    fn from(member: StaffMember) -> Self {
        Self {
            staff_id: member.id,
            user_id: member.user_id,
            name: member.name,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct NextManagerResponse {
    pub(crate) university_id: UniversityId,
    pub(crate) next_manager: Option<ManagerView>,
    pub(crate) last_assigned: Option<ManagerView>,
}

/// Router builder exposing the application workflow over HTTP.
pub fn application_router<S, N>(service: Arc<ApplicationService<S, N>>) -> Router
where
    S: ApplicationStore + 'static,
    N: Notifier + 'static,
{
    Router::new()
        .route("/api/v1/applications", post(create_handler::<S, N>))
        .route(
            "/api/v1/applications/:application_id",
            get(get_handler::<S, N>),
        )
        .route(
            "/api/v1/applications/:application_id/status",
            put(status_handler::<S, N>),
        )
        .route(
            "/api/v1/applications/:application_id/assignment",
            post(reassign_handler::<S, N>),
        )
        .route(
            "/api/v1/applications/:application_id/active",
            put(active_handler::<S, N>),
        )
        .route(
            "/api/v1/applications/:application_id/status-logs",
            get(status_logs_handler::<S, N>),
        )
        .route(
            "/api/v1/applications/:application_id/assignment-logs",
            get(assignment_logs_handler::<S, N>),
        )
        .route(
            "/api/v1/applications/:application_id/milestones",
            get(milestones_handler::<S, N>),
        )
        .route(
            "/api/v1/universities/:university_id/next-manager",
            get(next_manager_handler::<S, N>),
        )
        .route(
            "/api/v1/status-types",
            get(list_status_types_handler::<S, N>).post(create_status_type_handler::<S, N>),
        )
        .route(
            "/api/v1/status-types/:status_id",
            axum::routing::delete(deactivate_status_type_handler::<S, N>),
        )
        .route(
            "/api/v1/countries/:country/status-types",
            put(country_statuses_handler::<S, N>),
        )
        .route(
            "/api/v1/students/:student_id",
            put(save_student_handler::<S, N>),
        )
        .route("/api/v1/dashboard", get(dashboard_handler::<S, N>))
        .with_state(service)
}

type SharedService<S, N> = State<Arc<ApplicationService<S, N>>>;

pub(crate) async fn create_handler<S, N>(
    State(service): SharedService<S, N>,
    actor: Actor,
    Json(request): Json<NewApplication>,
) -> Response
where
    S: ApplicationStore + 'static,
    N: Notifier + 'static,
{
    match service.create(request, actor) {
        Ok(application) => (StatusCode::CREATED, Json(application)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn get_handler<S, N>(
    State(service): SharedService<S, N>,
    Path(application_id): Path<u64>,
) -> Response
where
    S: ApplicationStore + 'static,
    N: Notifier + 'static,
{
    match service.get(ApplicationId(application_id)) {
        Ok(application) => (StatusCode::OK, Json(application)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn status_handler<S, N>(
    State(service): SharedService<S, N>,
    Path(application_id): Path<u64>,
    actor: Actor,
    Json(request): Json<StatusChangeRequest>,
) -> Response
where
    S: ApplicationStore + 'static,
    N: Notifier + 'static,
{
    match service.update_status(ApplicationId(application_id), request.status_id, actor) {
        Ok(update) => {
            let payload = json!({
                "application": update.application,
                "previous_status": update.previous_status,
                "changed": update.changed(),
                "log": update.log,
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn save_student_handler<S, N>(
    State(service): SharedService<S, N>,
    Path(student_id): Path<u64>,
    Json(request): Json<StudentRequest>,
) -> Response
where
    S: ApplicationStore + 'static,
    N: Notifier + 'static,
{
    let student = Student {
        id: StudentId(student_id),
        name: request.name,
        partner_id: request.partner_id,
        is_active: request.is_active,
    };
    match service.save_student(student) {
        Ok(student) => (StatusCode::OK, Json(student)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn reassign_handler<S, N>(
    State(service): SharedService<S, N>,
    Path(application_id): Path<u64>,
    actor: Actor,
    Json(request): Json<ReassignRequest>,
) -> Response
where
    S: ApplicationStore + 'static,
    N: Notifier + 'static,
{
    match service.reassign(ApplicationId(application_id), request.staff_id, actor) {
        Ok(application) => (StatusCode::OK, Json(application)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn active_handler<S, N>(
    State(service): SharedService<S, N>,
    Path(application_id): Path<u64>,
    Json(request): Json<ActiveFlagRequest>,
) -> Response
where
    S: ApplicationStore + 'static,
    N: Notifier + 'static,
{
    match service.set_active(ApplicationId(application_id), request.is_active) {
        Ok(application) => (StatusCode::OK, Json(application)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn status_logs_handler<S, N>(
    State(service): SharedService<S, N>,
    Path(application_id): Path<u64>,
) -> Response
where
    S: ApplicationStore + 'static,
    N: Notifier + 'static,
{
    match service.status_history(ApplicationId(application_id)) {
        Ok(history) => (StatusCode::OK, Json(history)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn assignment_logs_handler<S, N>(
    State(service): SharedService<S, N>,
    Path(application_id): Path<u64>,
) -> Response
where
    S: ApplicationStore + 'static,
    N: Notifier + 'static,
{
    match service.assignment_history(ApplicationId(application_id)) {
        Ok(history) => (StatusCode::OK, Json(history)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn milestones_handler<S, N>(
    State(service): SharedService<S, N>,
    Path(application_id): Path<u64>,
) -> Response
where
    S: ApplicationStore + 'static,
    N: Notifier + 'static,
{
    match service.milestones(ApplicationId(application_id)) {
        Ok(milestones) => (StatusCode::OK, Json(milestones)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn next_manager_handler<S, N>(
    State(service): SharedService<S, N>,
    Path(university_id): Path<u64>,
) -> Response
where
    S: ApplicationStore + 'static,
    N: Notifier + 'static,
{
    let university_id = UniversityId(university_id);
    let preview = service
        .preview_next_manager(university_id)
        .and_then(|next| Ok((next, service.last_assigned_manager(university_id)?)));

    match preview {
        Ok((next, last)) => {
            let body = NextManagerResponse {
                university_id,
                next_manager: next.map(ManagerView::from),
                last_assigned: last.map(ManagerView::from),
            };
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn list_status_types_handler<S, N>(
    State(service): SharedService<S, N>,
    Query(query): Query<StatusTypeQuery>,
) -> Response
where
    S: ApplicationStore + 'static,
    N: Notifier + 'static,
{
    match service.status_types(query.country.as_deref()) {
        Ok(statuses) => (StatusCode::OK, Json(statuses)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn create_status_type_handler<S, N>(
    State(service): SharedService<S, N>,
    Json(request): Json<StatusTypeRequest>,
) -> Response
where
    S: ApplicationStore + 'static,
    N: Notifier + 'static,
{
    match service.create_status_type(&request.name, request.priority) {
        Ok(status) => (StatusCode::CREATED, Json(status)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn deactivate_status_type_handler<S, N>(
    State(service): SharedService<S, N>,
    Path(status_id): Path<u64>,
) -> Response
where
    S: ApplicationStore + 'static,
    N: Notifier + 'static,
{
    match service.deactivate_status_type(StatusTypeId(status_id)) {
        Ok(status) => (StatusCode::OK, Json(status)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn country_statuses_handler<S, N>(
    State(service): SharedService<S, N>,
    Path(country): Path<String>,
    Json(request): Json<CountryStatusesRequest>,
) -> Response
where
    S: ApplicationStore + 'static,
    N: Notifier + 'static,
{
    match service.set_country_statuses(&country, request.status_ids) {
        Ok(()) => match service.status_types(Some(&country)) {
            Ok(statuses) => (StatusCode::OK, Json(statuses)).into_response(),
            Err(err) => error_response(err),
        },
        Err(err) => error_response(err),
    }
}

pub(crate) async fn dashboard_handler<S, N>(State(service): SharedService<S, N>) -> Response
where
    S: ApplicationStore + 'static,
    N: Notifier + 'static,
{
    match service.dashboard_counts() {
        Ok(counts) => (StatusCode::OK, Json(counts)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) fn status_code_for(err: &ApplicationServiceError) -> StatusCode {
    match err {
        ApplicationServiceError::Repository(RepositoryError::NotFound)
        | ApplicationServiceError::Status(StatusError::Unknown(_))
        | ApplicationServiceError::UnknownUniversity(_)
        | ApplicationServiceError::UnknownStaff(_) => StatusCode::NOT_FOUND,
        ApplicationServiceError::Repository(RepositoryError::Conflict) => StatusCode::CONFLICT,
        ApplicationServiceError::Status(_)
        | ApplicationServiceError::UnknownStudent(_)
        | ApplicationServiceError::UnknownPartner(_)
        | ApplicationServiceError::UnknownCourse(_)
        | ApplicationServiceError::InactiveStaff(_)
        | ApplicationServiceError::MissingUniversity(_)
        | ApplicationServiceError::InvalidStatusName
        | ApplicationServiceError::InvalidStudentName => StatusCode::UNPROCESSABLE_ENTITY,
        ApplicationServiceError::Repository(RepositoryError::Unavailable(_)) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn error_response(err: ApplicationServiceError) -> Response {
    let status = status_code_for(&err);
    let payload = json!({
        "error": err.to_string(),
    });
    (status, Json(payload)).into_response()
}
