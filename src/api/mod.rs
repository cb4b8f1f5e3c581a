//! API layer - HTTP handlers and routing
//!
//! All endpoints live under `/api`; uploaded files are served from the
//! configured public prefix (`/uploads` by default). Route groups:
//! - public (optional auth, so signed-in callers see their own votes and progress)
//! - signed-in users (ratings, bookmarks, comments, history, certificates)
//! - editors and admins (catalog management, uploads)
//! - admins (users, roles, analytics)

pub mod admin;
pub mod auth;
pub mod books;
pub mod categories;
pub mod comments;
pub mod common;
pub mod courses;
pub mod engagement;
pub mod middleware;
pub mod search;
pub mod tutorials;
pub mod upload;

use axum::{
    extract::{DefaultBodyLimit, Request},
    http::{header, HeaderValue, Method},
    middleware::{self as axum_middleware, Next},
    response::{IntoResponse, Response},
    Router,
};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::config::UploadConfig;

pub use middleware::{ApiError, AppState, AuthenticatedUser, MaybeUser, RequestClient};

/// Build the `/api` router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    // Admin routes (need admin role)
    let admin_routes = admin::router()
        .route_layer(axum_middleware::from_fn(middleware::require_admin))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Catalog management (editor or admin)
    let editor_routes = Router::new()
        .merge(categories::editor_router())
        .merge(books::editor_router())
        .merge(tutorials::editor_router())
        .merge(courses::editor_router())
        .merge(upload::router())
        .route_layer(axum_middleware::from_fn(middleware::require_editor))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Protected routes (need auth but no particular role)
    let protected_routes = Router::new()
        .merge(auth::protected_router())
        .merge(engagement::protected_router())
        .merge(comments::protected_router())
        .merge(courses::protected_router())
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Public routes
    Router::new()
        .merge(auth::public_router())
        .merge(categories::router())
        .merge(books::router())
        .merge(tutorials::router())
        .merge(search::router())
        .merge(engagement::public_router())
        .merge(comments::public_router())
        .merge(courses::public_router())
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::optional_auth,
        ))
        .merge(admin_routes)
        .merge(editor_routes)
        .merge(protected_routes)
}

/// Build the complete application with middleware
pub fn build_router(state: AppState) -> Router {
    let upload = state.config.upload.clone();
    let cors = cors_layer(&state.config.server.cors_origin);

    Router::new()
        .nest("/api", build_api_router(state.clone()))
        .nest_service(&uploads_mount(&upload), uploads_service(&upload))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(body_limit(&upload)))
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        // Request stats middleware (outermost layer, runs for all requests)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::request_stats_middleware,
        ))
        .with_state(state)
}

/// Static files from the upload directory
fn uploads_service(upload: &UploadConfig) -> Router {
    Router::new()
        .fallback_service(ServeDir::new(&upload.path))
        .layer(axum_middleware::from_fn(inert_upload_headers))
}

/// Uploaded files never run as active content on the API origin
async fn inert_upload_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    headers.insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static("default-src 'none'; sandbox"),
    );
    response
}

async fn not_found() -> impl IntoResponse {
    ApiError::not_found("Route not found")
}

/// CORS for the SPA; `*` allows any origin without cookies
fn cors_layer(origin: &str) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE]);

    if origin.trim() == "*" {
        return base.allow_origin(tower_http::cors::Any);
    }
    match origin.trim().parse::<HeaderValue>() {
        Ok(origin) => base.allow_origin(origin).allow_credentials(true),
        Err(e) => {
            tracing::warn!("Invalid CORS origin '{}', allowing any origin: {}", origin, e);
            base.allow_origin(tower_http::cors::Any)
        }
    }
}

/// Mount point of the upload directory, always `/<segment>`
fn uploads_mount(config: &UploadConfig) -> String {
    match config.public_prefix.trim_matches('/') {
        "" => "/uploads".to_string(),
        prefix => format!("/{}", prefix),
    }
}

/// Room for the largest raw upload or a base64 payload (4 chars per 3 bytes)
/// plus multipart/JSON framing
fn body_limit(config: &UploadConfig) -> usize {
    const FRAMING: u64 = 64 * 1024;
    let base64 = config.max_base64_size.saturating_mul(4) / 3;
    config.max_file_size.max(base64).saturating_add(FRAMING) as usize
}
