//! Course and certificate endpoints
//!
//! - GET /api/courses, GET /api/courses/{id_or_slug}
//! - POST /api/courses/{id}/certificate - Issue the caller's certificate
//! - GET /api/certificates - The caller's certificates
//! - GET /api/certificates/verify/{code} - Public verification
//! - POST /api/courses, DELETE /api/courses/{id} - Editors and admins

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};

use crate::api::common::{log_activity, PageQuery, SuccessResponse};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser, MaybeUser};
use crate::models::{CertificateView, CourseDetail, CourseSummary, CreateCourseInput, PagedResult};

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/courses", get(list_courses))
        .route("/courses/{id}", get(get_course))
        .route("/certificates/verify/{code}", get(verify_certificate))
}

pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/courses/{id}/certificate", post(issue_certificate))
        .route("/certificates", get(list_certificates))
}

/// Course management routes (editor middleware applied by the caller)
pub fn editor_router() -> Router<AppState> {
    Router::new()
        .route("/courses", post(create_course))
        .route("/courses/{id}", delete(delete_course))
}

/// GET /api/courses
async fn list_courses(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<PagedResult<CourseSummary>>, ApiError> {
    Ok(Json(state.course_service.list(&query.params()).await?))
}

/// GET /api/courses/{id_or_slug}
///
/// Signed-in callers also get their progress through the course.
async fn get_course(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Path(key): Path<String>,
) -> Result<Json<CourseDetail>, ApiError> {
    Ok(Json(state.course_service.get(&key, viewer.id()).await?))
}

/// POST /api/courses/{id}/certificate
async fn issue_certificate(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<CertificateView>, ApiError> {
    Ok(Json(state.course_service.issue_certificate(&user, id).await?))
}

/// GET /api/certificates
async fn list_certificates(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<Vec<CertificateView>>, ApiError> {
    Ok(Json(state.course_service.list_certificates(user.id).await?))
}

/// GET /api/certificates/verify/{code}
async fn verify_certificate(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<CertificateView>, ApiError> {
    Ok(Json(state.course_service.verify(&code).await?))
}

/// POST /api/courses
async fn create_course(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(body): Json<CreateCourseInput>,
) -> Result<(StatusCode, Json<CourseDetail>), ApiError> {
    let course = state.course_service.create(body, Some(user.id)).await?;
    log_activity(&state, user.id, "create", "course", Some(course.course.id), Some(&course.course.title)).await;
    Ok((StatusCode::CREATED, Json(course)))
}

/// DELETE /api/courses/{id}
async fn delete_course(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<SuccessResponse>, ApiError> {
    state.course_service.delete(id).await?;
    log_activity(&state, user.id, "delete", "course", Some(id), None).await;
    Ok(Json(SuccessResponse::ok()))
}
