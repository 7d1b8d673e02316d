use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use filegate_core::extension::POLICY_VERSION;
use filegate_core::AppState;
use serde_json::json;

pub mod error;
pub mod routes;

use error::ApiError;
use routes::upload::MULTIPART_OVERHEAD;

pub fn build_router(max_upload_size: u64) -> Router<AppState> {
    let body_limit = usize::try_from(max_upload_size.saturating_add(MULTIPART_OVERHEAD)).unwrap_or(usize::MAX);
    Router::new()
        // Health
        .route("/health", get(health))
        .route("/api/v1/health", get(health))
        // Policy
        .route("/api/v1/policy", get(routes::policy::get_policy))
        // Uploads
        .route(
            "/upload",
            post(routes::upload::upload_file).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route(
            "/api/v1/upload",
            post(routes::upload::upload_file).layer(DefaultBodyLimit::max(body_limit)),
        )
        .fallback(not_found)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

async fn health() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "service": "filegate",
            "policy_version": POLICY_VERSION,
        })),
    )
}

async fn not_found() -> ApiError {
    ApiError::NotFound
}
