//! Authentication API endpoints
//!
//! Handles HTTP requests for user accounts:
//! - POST /api/auth/signup - Create an account and sign in
//! - POST /api/auth/signin - Sign in with username or email
//! - POST /api/auth/signout - Clear the token cookie
//! - GET /api/auth/profile - Current user
//! - PUT /api/auth/profile - Update name, email, avatar, bio
//! - PUT /api/auth/password - Change password

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::common::SuccessResponse;
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser, RequestClient, TOKEN_COOKIE};
use crate::models::{SigninInput, SignupInput, UpdateProfileInput, User};
use crate::services::UserServiceError;

/// Response for successful authentication
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: User,
    pub token: String,
}

/// Request body for changing the password
#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Build public auth routes (no auth required)
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/signin", post(signin))
        .route("/auth/signout", post(signout))
}

/// Build protected auth routes (requires auth middleware)
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/auth/profile", get(get_profile).put(update_profile))
        .route("/auth/password", put(change_password))
}

/// `Set-Cookie` header carrying the token
fn token_cookie(state: &AppState, token: &str) -> Result<HeaderMap, ApiError> {
    let max_age = state.config.auth.jwt_expires_hours.max(0) * 3600;
    cookie_header(&format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        TOKEN_COOKIE, token, max_age
    ))
}

fn cookie_header(cookie: &str) -> Result<HeaderMap, ApiError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::SET_COOKIE,
        HeaderValue::from_str(cookie).map_err(ApiError::internal)?,
    );
    Ok(headers)
}

/// POST /api/auth/signup
async fn signup(
    State(state): State<AppState>,
    Json(body): Json<SignupInput>,
) -> Result<impl IntoResponse, ApiError> {
    let password = body.password.clone();
    let user = state.user_service.signup(body).await?;

    // Sign the new account in right away
    let (user, token) = state
        .user_service
        .signin(SigninInput {
            login: user.username,
            password,
        })
        .await?;

    state
        .analytics_service
        .log_activity(Some(user.id), "signup", Some("user"), Some(user.id), None)
        .await;

    Ok((
        StatusCode::CREATED,
        token_cookie(&state, &token)?,
        Json(AuthResponse { user, token }),
    ))
}

/// POST /api/auth/signin
///
/// Guarded by the per-IP request window and the per-identifier failure window.
async fn signin(
    State(state): State<AppState>,
    client: RequestClient,
    Json(body): Json<SigninInput>,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(ip) = client.ip() {
        if state.rate_limiter.is_ip_limited(ip).await {
            tracing::warn!("Sign-in rate limit hit for {}", ip);
            return Err(ApiError::rate_limited(
                "Too many sign-in requests, try again in a minute",
                60,
            ));
        }
        state.rate_limiter.record_ip_request(ip).await;
    }

    let identifier = body.login.trim().to_lowercase();
    if state.rate_limiter.is_identifier_limited(&identifier).await {
        tracing::warn!("Too many failed sign-ins for '{}'", identifier);
        return Err(ApiError::rate_limited(
            "Too many failed attempts, try again in 15 minutes",
            900,
        ));
    }

    match state.user_service.signin(body).await {
        Ok((user, token)) => {
            state.rate_limiter.clear_identifier(&identifier).await;
            tracing::info!("User {} signed in", user.username);
            Ok((token_cookie(&state, &token)?, Json(AuthResponse { user, token })))
        }
        Err(e) => {
            if matches!(
                e,
                UserServiceError::AuthenticationError(_) | UserServiceError::UserBanned
            ) {
                state.rate_limiter.record_failed_attempt(&identifier).await;
                tracing::warn!(
                    "Failed sign-in for '{}' from {}: {}",
                    identifier,
                    client.0.ip_address.as_deref().unwrap_or("unknown"),
                    e
                );
            }
            Err(e.into())
        }
    }
}

/// POST /api/auth/signout
///
/// Tokens are stateless; this only expires the browser cookie.
async fn signout() -> Result<impl IntoResponse, ApiError> {
    let headers = cookie_header(&format!(
        "{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0",
        TOKEN_COOKIE
    ))?;
    Ok((headers, Json(SuccessResponse::ok())))
}

/// GET /api/auth/profile
async fn get_profile(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<User>, ApiError> {
    Ok(Json(state.user_service.get_profile(user.id).await?))
}

/// PUT /api/auth/profile
async fn update_profile(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(body): Json<UpdateProfileInput>,
) -> Result<Json<User>, ApiError> {
    Ok(Json(state.user_service.update_profile(user.id, body).await?))
}

/// PUT /api/auth/password
async fn change_password(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(body): Json<ChangePasswordRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    state
        .user_service
        .change_password(user.id, &body.current_password, &body.new_password)
        .await?;
    tracing::info!("User {} changed their password", user.username);
    Ok(Json(SuccessResponse::ok()))
}
