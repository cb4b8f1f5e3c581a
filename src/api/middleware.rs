//! API middleware
//!
//! Contains:
//! - Application state shared by every handler
//! - The JSON error envelope and the mapping from service errors
//! - Authentication (JWT from bearer header or `token` cookie)
//! - Authorization (editor/admin checks)
//! - Request statistics

use axum::{
    extract::{ConnectInfo, FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cache::create_cache;
use crate::config::Config;
use crate::db::repositories::{
    ClientInfo, SqlxAnalyticsRepository, SqlxBookRepository, SqlxBookmarkRepository,
    SqlxCategoryRepository, SqlxCommentRepository, SqlxContentRepository, SqlxCourseRepository,
    SqlxHistoryRepository, SqlxRatingRepository, SqlxTagRepository, SqlxTutorialRepository,
    SqlxUserRepository,
};
use crate::db::DynDatabasePool;
use crate::models::User;
use crate::services::{
    AnalyticsError, AnalyticsService, BookService, BookmarkService, CategoryService,
    CategoryServiceError, CommentService, ContentServiceError, CourseService, CourseServiceError,
    EngagementError, HistoryService, LoginRateLimiter, RatingService, RequestStats, SearchService,
    TokenService, TutorialService, UploadError, UploadStore, UserService, UserServiceError,
};

/// Name of the cookie that carries the JWT for browser clients
pub const TOKEN_COOKIE: &str = "token";

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub pool: DynDatabasePool,
    pub config: Arc<Config>,
    pub user_service: Arc<UserService>,
    pub category_service: Arc<CategoryService>,
    pub book_service: Arc<BookService>,
    pub tutorial_service: Arc<TutorialService>,
    pub search_service: Arc<SearchService>,
    pub rating_service: Arc<RatingService>,
    pub bookmark_service: Arc<BookmarkService>,
    pub comment_service: Arc<CommentService>,
    pub history_service: Arc<HistoryService>,
    pub analytics_service: Arc<AnalyticsService>,
    pub course_service: Arc<CourseService>,
    pub uploads: Arc<UploadStore>,
    pub rate_limiter: Arc<LoginRateLimiter>,
    pub request_stats: Arc<RequestStats>,
}

impl AppState {
    /// Wire repositories, cache and services over one connection pool
    pub fn new(pool: DynDatabasePool, config: Config) -> Self {
        let cache = create_cache(&config.cache);
        let uploads = Arc::new(UploadStore::new(config.upload.clone()));
        let request_stats = Arc::new(RequestStats::new());

        let content_repo = SqlxContentRepository::boxed(pool.clone());
        let tag_repo = SqlxTagRepository::boxed(pool.clone());
        let rating_repo = SqlxRatingRepository::boxed(pool.clone());
        let book_repo = SqlxBookRepository::boxed(pool.clone());
        let tutorial_repo = SqlxTutorialRepository::boxed(pool.clone());
        let history_repo = SqlxHistoryRepository::boxed(pool.clone());

        let user_service = Arc::new(UserService::new(
            SqlxUserRepository::boxed(pool.clone()),
            TokenService::from_config(&config.auth),
            config.auth.bcrypt_cost,
        ));
        let category_service = Arc::new(CategoryService::new(
            SqlxCategoryRepository::boxed(pool.clone()),
            cache.clone(),
        ));
        let book_service = Arc::new(BookService::new(
            book_repo.clone(),
            tag_repo.clone(),
            rating_repo.clone(),
            category_service.clone(),
            uploads.clone(),
            cache.clone(),
        ));
        let tutorial_service = Arc::new(TutorialService::new(
            tutorial_repo.clone(),
            tag_repo,
            rating_repo.clone(),
            category_service.clone(),
            uploads.clone(),
            cache.clone(),
        ));
        let analytics_service = Arc::new(AnalyticsService::new(
            SqlxAnalyticsRepository::boxed(pool.clone()),
            content_repo.clone(),
            book_repo,
            tutorial_repo,
            cache,
            Duration::from_secs(config.cache.view_dedup_seconds),
            request_stats.clone(),
        ));
        let search_service = Arc::new(SearchService::new(
            book_service.clone(),
            tutorial_service.clone(),
            analytics_service.clone(),
        ));
        let rating_service = Arc::new(RatingService::new(rating_repo, content_repo.clone()));
        let bookmark_service = Arc::new(BookmarkService::new(
            SqlxBookmarkRepository::boxed(pool.clone()),
            content_repo.clone(),
        ));
        let comment_service = Arc::new(CommentService::new(
            SqlxCommentRepository::boxed(pool.clone()),
            content_repo.clone(),
        ));
        let history_service = Arc::new(HistoryService::new(history_repo.clone(), content_repo.clone()));
        let course_service = Arc::new(CourseService::new(
            SqlxCourseRepository::boxed(pool.clone()),
            history_repo,
            content_repo,
            category_service.clone(),
        ));

        Self {
            pool,
            config: Arc::new(config),
            user_service,
            category_service,
            book_service,
            tutorial_service,
            search_service,
            rating_service,
            bookmark_service,
            comment_service,
            history_service,
            analytics_service,
            course_service,
            uploads,
            rate_limiter: Arc::new(LoginRateLimiter::new()),
            request_stats,
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("CONFLICT", message)
    }

    pub fn rate_limited(message: impl Into<String>, retry_after_secs: u64) -> Self {
        Self::with_details(
            "RATE_LIMIT",
            message,
            serde_json::json!({ "retry_after": retry_after_secs }),
        )
    }

    /// Log the cause and hide it from the client
    pub fn internal(err: impl std::fmt::Display) -> Self {
        tracing::error!("Internal error: {}", err);
        Self::new("INTERNAL_ERROR", "Internal server error")
    }

    pub fn status(&self) -> StatusCode {
        match self.error.code.as_str() {
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" | "USER_BANNED" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "CONFLICT" => StatusCode::CONFLICT,
            "PAYLOAD_TOO_LARGE" => StatusCode::PAYLOAD_TOO_LARGE,
            "RATE_LIMIT" => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

impl From<UserServiceError> for ApiError {
    fn from(err: UserServiceError) -> Self {
        match err {
            UserServiceError::AuthenticationError(msg) => Self::unauthorized(msg),
            UserServiceError::UserBanned => Self::new("USER_BANNED", "Account is banned"),
            UserServiceError::ValidationError(msg) => Self::validation_error(msg),
            UserServiceError::UserExists(msg) => Self::conflict(format!("User already exists: {}", msg)),
            UserServiceError::NotFound => Self::not_found("User not found"),
            UserServiceError::Forbidden(msg) => Self::forbidden(msg),
            UserServiceError::InternalError(e) => Self::internal(e),
        }
    }
}

impl From<CategoryServiceError> for ApiError {
    fn from(err: CategoryServiceError) -> Self {
        match err {
            CategoryServiceError::DuplicateName(_) | CategoryServiceError::DuplicateSlug(_) => {
                Self::conflict(err.to_string())
            }
            CategoryServiceError::InUse(count) => Self::with_details(
                "CONFLICT",
                err.to_string(),
                serde_json::json!({ "item_count": count }),
            ),
            CategoryServiceError::NotFound(_) => Self::not_found(err.to_string()),
            CategoryServiceError::ValidationError(msg) => Self::validation_error(msg),
            CategoryServiceError::InternalError(e) => Self::internal(e),
        }
    }
}

impl From<UploadError> for ApiError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::TooLarge { size, max } => Self::with_details(
                "PAYLOAD_TOO_LARGE",
                err.to_string(),
                serde_json::json!({ "size": size, "max": max }),
            ),
            UploadError::TypeNotAllowed(_) | UploadError::InvalidEncoding | UploadError::Empty => {
                Self::validation_error(err.to_string())
            }
            UploadError::Io(e) => Self::internal(e),
        }
    }
}

impl From<ContentServiceError> for ApiError {
    fn from(err: ContentServiceError) -> Self {
        match err {
            ContentServiceError::NotFound(_) => Self::not_found(err.to_string()),
            ContentServiceError::CategoryNotFound(_) | ContentServiceError::ValidationError(_) => {
                Self::validation_error(err.to_string())
            }
            ContentServiceError::Upload(e) => e.into(),
            ContentServiceError::InternalError(e) => Self::internal(e),
        }
    }
}

impl From<EngagementError> for ApiError {
    fn from(err: EngagementError) -> Self {
        match err {
            EngagementError::ContentNotFound(_) | EngagementError::CommentNotFound(_) => {
                Self::not_found(err.to_string())
            }
            EngagementError::InvalidVote(_) | EngagementError::ValidationError(_) => {
                Self::validation_error(err.to_string())
            }
            EngagementError::Forbidden(msg) => Self::forbidden(msg),
            EngagementError::InternalError(e) => Self::internal(e),
        }
    }
}

impl From<AnalyticsError> for ApiError {
    fn from(err: AnalyticsError) -> Self {
        match err {
            AnalyticsError::ContentNotFound(_) => Self::not_found(err.to_string()),
            AnalyticsError::InternalError(e) => Self::internal(e),
        }
    }
}

impl From<CourseServiceError> for ApiError {
    fn from(err: CourseServiceError) -> Self {
        match err {
            CourseServiceError::NotFound(_) | CourseServiceError::CertificateNotFound(_) => {
                Self::not_found(err.to_string())
            }
            CourseServiceError::DuplicateSlug(_) => Self::conflict(err.to_string()),
            CourseServiceError::NotCompleted { completed, total } => Self::with_details(
                "FORBIDDEN",
                err.to_string(),
                serde_json::json!({ "completed": completed, "total": total }),
            ),
            CourseServiceError::ContentNotFound(_) | CourseServiceError::ValidationError(_) => {
                Self::validation_error(err.to_string())
            }
            CourseServiceError::InternalError(e) => Self::internal(e),
        }
    }
}

// ============================================================================
// Extractors
// ============================================================================

/// Authenticated user extracted from request
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}

/// The caller, if a valid token was presented
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<User>);

impl MaybeUser {
    pub fn id(&self) -> Option<i64> {
        self.0.as_ref().map(|u| u.id)
    }
}

impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(
            parts.extensions.get::<AuthenticatedUser>().map(|u| u.0.clone()),
        ))
    }
}

/// Who is calling: user, client address and user agent
#[derive(Debug, Clone)]
pub struct RequestClient(pub ClientInfo);

impl RequestClient {
    pub fn ip(&self) -> Option<IpAddr> {
        self.0.ip_address.as_deref().and_then(|ip| ip.parse().ok())
    }
}

impl FromRequestParts<AppState> for RequestClient {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        let ip = extract_ip_address(&parts.headers, peer, &state.config.server.trusted_proxies);
        Ok(RequestClient(ClientInfo {
            user_id: parts.extensions.get::<AuthenticatedUser>().map(|u| u.0.id),
            ip_address: ip.map(|ip| ip.to_string()),
            user_agent: parts
                .headers
                .get(header::USER_AGENT)
                .and_then(|h| h.to_str().ok())
                .map(|ua| ua.chars().take(255).collect()),
        }))
    }
}

/// Client address of a request.
///
/// Forwarding headers are only read when the socket peer is one of `trusted`.
/// The right-most `X-Forwarded-For` hop that is not itself a trusted proxy is
/// the client; `X-Real-IP` is used when every hop is trusted.
pub fn extract_ip_address(headers: &HeaderMap, peer: Option<IpAddr>, trusted: &[IpAddr]) -> Option<IpAddr> {
    let peer = peer?;
    if !trusted.contains(&peer) {
        return Some(peer);
    }

    let hops: Vec<&str> = headers
        .get_all("x-forwarded-for")
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|hop| !hop.is_empty())
        .collect();
    for hop in hops.into_iter().rev() {
        match hop.parse::<IpAddr>() {
            Ok(ip) if trusted.contains(&ip) => {}
            Ok(ip) => return Some(ip),
            // A malformed chain can't be attributed to anyone past the proxy
            Err(_) => return Some(peer),
        }
    }

    headers
        .get("x-real-ip")
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
        .or(Some(peer))
}

/// Extract the JWT from the request; the bearer header wins over the cookie
fn extract_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
    {
        return Some(token.trim().to_string());
    }

    headers
        .get(header::COOKIE)
        .and_then(|h| h.to_str().ok())
        .and_then(|cookies| {
            cookies.split(';').find_map(|cookie| {
                cookie
                    .trim()
                    .strip_prefix(TOKEN_COOKIE)
                    .and_then(|rest| rest.strip_prefix('='))
                    .map(str::to_string)
            })
        })
        .filter(|token| !token.is_empty())
}

// ============================================================================
// Middleware
// ============================================================================

/// Authentication middleware
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_token(request.headers())
        .ok_or_else(|| ApiError::unauthorized("Missing authentication token"))?;

    let user = state.user_service.authenticate(&token).await?;

    request.extensions_mut().insert(AuthenticatedUser(user));
    Ok(next.run(request).await)
}

/// Optional authentication middleware
///
/// Invalid or expired tokens are ignored so public pages keep working.
pub async fn optional_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(token) = extract_token(request.headers()) {
        if let Ok(user) = state.user_service.authenticate(&token).await {
            request.extensions_mut().insert(AuthenticatedUser(user));
        }
    }
    next.run(request).await
}

/// Admin authorization middleware
pub async fn require_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    let user = request
        .extensions()
        .get::<AuthenticatedUser>()
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    if !user.0.is_admin() {
        return Err(ApiError::forbidden("Admin privileges required"));
    }

    Ok(next.run(request).await)
}

/// Editor authorization middleware (admins pass too)
pub async fn require_editor(request: Request, next: Next) -> Result<Response, ApiError> {
    let user = request
        .extensions()
        .get::<AuthenticatedUser>()
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    if !user.0.is_editor() {
        return Err(ApiError::forbidden("Editor privileges required"));
    }

    Ok(next.run(request).await)
}

/// Request statistics middleware
///
/// Records status and latency of every request.
pub async fn request_stats_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let response = next.run(request).await;
    state
        .request_stats
        .record(response.status().as_u16(), start.elapsed());
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(header::HeaderName, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(name.clone(), HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn test_extract_token_from_bearer() {
        let map = headers(&[(header::AUTHORIZATION, "Bearer abc.def.ghi")]);
        assert_eq!(extract_token(&map), Some("abc.def.ghi".to_string()));
    }

    #[test]
    fn test_extract_token_from_cookie() {
        let map = headers(&[(header::COOKIE, "theme=dark; token=abc.def; other=1")]);
        assert_eq!(extract_token(&map), Some("abc.def".to_string()));
    }

    #[test]
    fn test_extract_token_bearer_priority() {
        let map = headers(&[
            (header::AUTHORIZATION, "Bearer from-header"),
            (header::COOKIE, "token=from-cookie"),
        ]);
        assert_eq!(extract_token(&map), Some("from-header".to_string()));
    }

    #[test]
    fn test_extract_token_none() {
        assert!(extract_token(&HeaderMap::new()).is_none());
        let basic = headers(&[(header::AUTHORIZATION, "Basic dXNlcjpwYXNz")]);
        assert!(extract_token(&basic).is_none());
        let similar = headers(&[(header::COOKIE, "tokens=nope; token=")]);
        assert!(extract_token(&similar).is_none());
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_extract_ip_address_ignores_headers_from_untrusted_peer() {
        let forwarded = headers(&[
            (header::HeaderName::from_static("x-forwarded-for"), "203.0.113.7"),
            (header::HeaderName::from_static("x-real-ip"), "198.51.100.2"),
        ]);
        let peer = ip("192.0.2.50");
        assert_eq!(extract_ip_address(&forwarded, Some(peer), &[]), Some(peer));
        assert_eq!(extract_ip_address(&forwarded, Some(peer), &[ip("10.0.0.1")]), Some(peer));
        assert!(extract_ip_address(&forwarded, None, &[]).is_none());
    }

    #[test]
    fn test_extract_ip_address_behind_trusted_proxies() {
        let proxy = ip("10.0.0.1");
        let trusted = [proxy, ip("10.0.0.2")];

        // Client-supplied hops to the left of the real client are ignored
        let chain = headers(&[(
            header::HeaderName::from_static("x-forwarded-for"),
            "1.1.1.1, 203.0.113.7, 10.0.0.2",
        )]);
        assert_eq!(extract_ip_address(&chain, Some(proxy), &trusted), Some(ip("203.0.113.7")));

        let real = headers(&[(header::HeaderName::from_static("x-real-ip"), "198.51.100.2")]);
        assert_eq!(extract_ip_address(&real, Some(proxy), &trusted), Some(ip("198.51.100.2")));

        let garbage = headers(&[(header::HeaderName::from_static("x-forwarded-for"), "not-an-ip")]);
        assert_eq!(extract_ip_address(&garbage, Some(proxy), &trusted), Some(proxy));
        assert_eq!(extract_ip_address(&HeaderMap::new(), Some(proxy), &trusted), Some(proxy));
    }

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(ApiError::unauthorized("x").status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::new("USER_BANNED", "x").status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::rate_limited("x", 60).status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(ApiError::new("SOMETHING_ELSE", "x").status(), StatusCode::INTERNAL_SERVER_ERROR);

        let too_large: ApiError = UploadError::TooLarge { size: 10, max: 5 }.into();
        assert_eq!(too_large.status(), StatusCode::PAYLOAD_TOO_LARGE);

        let in_use: ApiError = CategoryServiceError::InUse(3).into();
        assert_eq!(in_use.status(), StatusCode::CONFLICT);
        assert_eq!(in_use.error.details, Some(serde_json::json!({ "item_count": 3 })));
    }

    #[test]
    fn test_internal_error_hides_cause() {
        let err: ApiError = UserServiceError::InternalError(anyhow::anyhow!("db password leaked")).into();
        assert_eq!(err.error.code, "INTERNAL_ERROR");
        assert!(!err.error.message.contains("password"));
    }
}
