//! Task routes.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    routing::{get, post},
};
use serde::Deserialize;

use super::path_id;
use crate::api::error::{ApiError, ApiResult};
use crate::api::identity::CallerIdentity;
use crate::api::server::AppState;
use crate::task::{Task, TaskService};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/tasks", post(create_task))
        .route("/api/tasks/{id}", get(get_task))
        .route("/api/tasks/{id}/complete", post(complete_task))
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct CreateTaskRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

fn tasks(state: &AppState) -> ApiResult<Arc<TaskService>> {
    state
        .task_service
        .clone()
        .ok_or_else(|| ApiError::service_unavailable("Task service not available"))
}

#[utoipa::path(
    post,
    path = "/api/tasks",
    tag = "tasks",
    request_body = CreateTaskRequest,
    params(("X-User-Id" = i64, Header, description = "Authenticated user")),
    responses(
        (status = 201, description = "Task created", body = Task),
        (status = 400, description = "Invalid task", body = crate::api::error::ApiErrorResponse)
    )
)]
pub async fn create_task(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<CreateTaskRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Task>)> {
    let Json(request) = body.map_err(|e| ApiError::validation(e.body_text()))?;
    let task = tasks(&state)?
        .create(
            caller.user_id,
            &request.title,
            request.description.as_deref(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(task)))
}

#[utoipa::path(
    get,
    path = "/api/tasks/{id}",
    tag = "tasks",
    params(
        ("id" = i64, Path, description = "Task ID"),
        ("X-User-Id" = i64, Header, description = "Authenticated user")
    ),
    responses(
        (status = 200, description = "Task", body = Task),
        (status = 403, description = "Owned by another user", body = crate::api::error::ApiErrorResponse),
        (status = 404, description = "Task not found", body = crate::api::error::ApiErrorResponse)
    )
)]
pub async fn get_task(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<String>,
) -> ApiResult<Json<Task>> {
    let id = path_id(&id)?;
    Ok(Json(tasks(&state)?.get(caller.user_id, id).await?))
}

/// Complete a task. The webhook is sent in the background; the response
/// does not wait for it.
#[utoipa::path(
    post,
    path = "/api/tasks/{id}/complete",
    tag = "tasks",
    params(
        ("id" = i64, Path, description = "Task ID"),
        ("X-User-Id" = i64, Header, description = "Authenticated user")
    ),
    responses(
        (status = 200, description = "Task completed", body = Task),
        (status = 403, description = "Owned by another user", body = crate::api::error::ApiErrorResponse),
        (status = 404, description = "Task not found", body = crate::api::error::ApiErrorResponse)
    )
)]
pub async fn complete_task(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<String>,
) -> ApiResult<Json<Task>> {
    let id = path_id(&id)?;
    let completion = tasks(&state)?.complete(caller.user_id, id).await?;
    Ok(Json(completion.task))
}
