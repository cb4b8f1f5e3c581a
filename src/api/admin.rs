//! Admin API endpoints
//!
//! All routes require the `admin` role:
//! - GET /api/admin/users, GET|DELETE /api/admin/users/{id}
//! - PUT /api/admin/users/{id}/role, PUT /api/admin/users/{id}/status
//! - GET /api/admin/roles, GET /api/admin/profiles
//! - GET /api/admin/analytics?days=, GET /api/admin/activity

use axum::{
    extract::{Path, Query, State},
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;

use crate::api::common::{log_activity, PageQuery, SuccessResponse};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{
    ActivityLog, AnalyticsSummary, ListParams, PagedResult, Role, User, UserProfile, UserRole,
    UserStatus,
};

const DEFAULT_ANALYTICS_DAYS: u32 = 30;

#[derive(Debug, Default, Deserialize)]
pub struct UserListQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub search: Option<String>,
    pub role: Option<UserRole>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoleRequest {
    pub role: UserRole,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: UserStatus,
}

#[derive(Debug, Default, Deserialize)]
pub struct AnalyticsQuery {
    pub days: Option<u32>,
}

/// Build the admin router (auth and admin middleware applied by the caller)
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/users", get(list_users))
        .route("/admin/users/{id}", get(get_user).delete(delete_user))
        .route("/admin/users/{id}/role", put(update_role))
        .route("/admin/users/{id}/status", put(update_status))
        .route("/admin/roles", get(list_roles))
        .route("/admin/profiles", get(list_profiles))
        .route("/admin/analytics", get(analytics))
        .route("/admin/activity", get(activity))
}

/// GET /api/admin/users
async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<UserListQuery>,
) -> Result<Json<PagedResult<User>>, ApiError> {
    let params = ListParams::from_query(query.page, query.per_page);
    let users = state
        .user_service
        .list_users(&params, query.search.as_deref(), query.role)
        .await?;
    Ok(Json(users))
}

/// GET /api/admin/users/{id}
async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<User>, ApiError> {
    Ok(Json(state.user_service.get_user(id).await?))
}

/// PUT /api/admin/users/{id}/role
async fn update_role(
    State(state): State<AppState>,
    AuthenticatedUser(admin): AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<UpdateRoleRequest>,
) -> Result<Json<User>, ApiError> {
    let user = state.user_service.update_role(&admin, id, body.role).await?;
    tracing::info!("{} set role of {} to {}", admin.username, user.username, body.role.as_str());
    log_activity(&state, admin.id, "update_role", "user", Some(id), Some(body.role.as_str())).await;
    Ok(Json(user))
}

/// PUT /api/admin/users/{id}/status
async fn update_status(
    State(state): State<AppState>,
    AuthenticatedUser(admin): AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<UpdateStatusRequest>,
) -> Result<Json<User>, ApiError> {
    let user = state.user_service.update_status(&admin, id, body.status).await?;
    tracing::info!("{} set status of {} to {}", admin.username, user.username, body.status.as_str());
    log_activity(&state, admin.id, "update_status", "user", Some(id), Some(body.status.as_str())).await;
    Ok(Json(user))
}

/// DELETE /api/admin/users/{id}
async fn delete_user(
    State(state): State<AppState>,
    AuthenticatedUser(admin): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<SuccessResponse>, ApiError> {
    state.user_service.delete_user(&admin, id).await?;
    tracing::info!("{} deleted user {}", admin.username, id);
    log_activity(&state, admin.id, "delete", "user", Some(id), None).await;
    Ok(Json(SuccessResponse::ok()))
}

/// GET /api/admin/roles
async fn list_roles(State(state): State<AppState>) -> Result<Json<Vec<Role>>, ApiError> {
    Ok(Json(state.user_service.list_roles().await?))
}

/// GET /api/admin/profiles
async fn list_profiles(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<PagedResult<UserProfile>>, ApiError> {
    Ok(Json(state.user_service.list_profiles(&query.params()).await?))
}

/// GET /api/admin/analytics?days=
async fn analytics(
    State(state): State<AppState>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<AnalyticsSummary>, ApiError> {
    let days = query.days.unwrap_or(DEFAULT_ANALYTICS_DAYS);
    Ok(Json(state.analytics_service.summary(days).await?))
}

/// GET /api/admin/activity
async fn activity(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<PagedResult<ActivityLog>>, ApiError> {
    Ok(Json(
        state
            .analytics_service
            .recent_activity(&query.params())
            .await?,
    ))
}
