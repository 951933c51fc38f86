//! Inbox routes. Every route acts for the caller named by `X-User-Id`.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State, rejection::QueryRejection},
    routing::{get, patch},
};
use serde::Serialize;

use super::path_id;
use crate::api::error::{ApiError, ApiResult};
use crate::api::identity::CallerIdentity;
use crate::api::server::AppState;
use crate::notification::{ListQuery, Notification, NotificationInbox, NotificationPage};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/notifications",
            get(list_notifications).delete(delete_all_notifications),
        )
        .route(
            "/notifications/{id}",
            get(get_notification).delete(delete_notification),
        )
        .route("/notifications/{id}/read", patch(mark_notification_read))
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct DeleteResponse {
    pub message: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct DeleteAllResponse {
    pub message: String,
    pub deleted_count: u64,
}

fn inbox(state: &AppState) -> ApiResult<Arc<NotificationInbox>> {
    state
        .inbox
        .clone()
        .ok_or_else(|| ApiError::service_unavailable("Notification inbox not available"))
}

#[utoipa::path(
    get,
    path = "/notifications",
    tag = "notifications",
    params(ListQuery, ("X-User-Id" = i64, Header, description = "Authenticated user")),
    responses(
        (status = 200, description = "One page of notifications, newest first", body = NotificationPage),
        (status = 400, description = "Invalid query parameters", body = crate::api::error::ApiErrorResponse),
        (status = 401, description = "Missing caller identity", body = crate::api::error::ApiErrorResponse)
    )
)]
pub async fn list_notifications(
    State(state): State<AppState>,
    caller: CallerIdentity,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> ApiResult<Json<NotificationPage>> {
    let Query(query) = query.map_err(|e| ApiError::validation(e.body_text()))?;
    let page = inbox(&state)?.list(caller.user_id, &query).await?;
    Ok(Json(page))
}

#[utoipa::path(
    get,
    path = "/notifications/{id}",
    tag = "notifications",
    params(
        ("id" = i64, Path, description = "Notification ID"),
        ("X-User-Id" = i64, Header, description = "Authenticated user")
    ),
    responses(
        (status = 200, description = "Notification", body = Notification),
        (status = 403, description = "Owned by another user", body = crate::api::error::ApiErrorResponse),
        (status = 404, description = "Notification not found", body = crate::api::error::ApiErrorResponse)
    )
)]
pub async fn get_notification(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<String>,
) -> ApiResult<Json<Notification>> {
    let id = path_id(&id)?;
    Ok(Json(inbox(&state)?.get(caller.user_id, id).await?))
}

#[utoipa::path(
    patch,
    path = "/notifications/{id}/read",
    tag = "notifications",
    params(
        ("id" = i64, Path, description = "Notification ID"),
        ("X-User-Id" = i64, Header, description = "Authenticated user")
    ),
    responses(
        (status = 200, description = "Notification marked read", body = Notification),
        (status = 403, description = "Owned by another user", body = crate::api::error::ApiErrorResponse),
        (status = 404, description = "Notification not found", body = crate::api::error::ApiErrorResponse)
    )
)]
pub async fn mark_notification_read(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<String>,
) -> ApiResult<Json<Notification>> {
    let id = path_id(&id)?;
    Ok(Json(inbox(&state)?.mark_read(caller.user_id, id).await?))
}

#[utoipa::path(
    delete,
    path = "/notifications/{id}",
    tag = "notifications",
    params(
        ("id" = i64, Path, description = "Notification ID"),
        ("X-User-Id" = i64, Header, description = "Authenticated user")
    ),
    responses(
        (status = 200, description = "Notification deleted", body = DeleteResponse),
        (status = 403, description = "Owned by another user", body = crate::api::error::ApiErrorResponse),
        (status = 404, description = "Notification not found", body = crate::api::error::ApiErrorResponse)
    )
)]
pub async fn delete_notification(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<String>,
) -> ApiResult<Json<DeleteResponse>> {
    let id = path_id(&id)?;
    inbox(&state)?.delete(caller.user_id, id).await?;
    Ok(Json(DeleteResponse {
        message: "Notification deleted successfully".to_string(),
    }))
}

#[utoipa::path(
    delete,
    path = "/notifications",
    tag = "notifications",
    params(("X-User-Id" = i64, Header, description = "Authenticated user")),
    responses(
        (status = 200, description = "All of the caller's notifications deleted", body = DeleteAllResponse)
    )
)]
pub async fn delete_all_notifications(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> ApiResult<Json<DeleteAllResponse>> {
    let deleted_count = inbox(&state)?.delete_all(caller.user_id).await?;
    Ok(Json(DeleteAllResponse {
        message: format!("{deleted_count} notification(s) deleted successfully"),
        deleted_count,
    }))
}
