//! API route modules.
//!
//! The notification service and the task API share one state type but mount
//! different route sets.

pub mod health;
pub mod logging;
pub mod notifications;
pub mod notify;
pub mod tasks;
pub mod webhooks;

use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::api::error::{ApiError, ApiResult};
use crate::api::openapi::{NotificationApiDoc, TaskApiDoc};
use crate::api::server::AppState;

/// Which binary's routes to mount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiSurface {
    /// Webhook receiver and inbox.
    Notifications,
    /// Tasks and webhook administration.
    Tasks,
}

/// Create the router for `surface`.
pub fn create_router(state: AppState, surface: ApiSurface) -> Router {
    let router = match surface {
        ApiSurface::Notifications => Router::new()
            .merge(notify::router())
            .merge(notifications::router())
            .merge(logging::router())
            .route("/health", get(health::health_check))
            .route(
                "/api-docs/openapi.json",
                get(|| async { Json(NotificationApiDoc::openapi()) }),
            ),
        ApiSurface::Tasks => Router::new()
            .merge(tasks::router())
            .merge(webhooks::router())
            .merge(logging::router())
            .route("/api/health", get(health::health_check))
            .route(
                "/api-docs/openapi.json",
                get(|| async { Json(TaskApiDoc::openapi()) }),
            ),
    };
    router.fallback(route_not_found).with_state(state)
}

async fn route_not_found() -> impl IntoResponse {
    ApiError::not_found("Route not found")
}

/// Parse a path id, which must be a positive integer.
pub(crate) fn path_id(raw: &str) -> ApiResult<i64> {
    raw.parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| ApiError::validation("ID must be a positive integer"))
}
