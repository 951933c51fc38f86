//! Logging routes.
//!
//! Reads and replaces the live log filter without a restart.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    routing::get,
};
use serde::{Deserialize, Serialize};

use crate::api::error::{ApiError, ApiResult};
use crate::api::identity::CallerIdentity;
use crate::api::server::AppState;
use crate::logging::LoggingConfig;

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/api/logging",
        get(get_logging_config).put(update_logging_config),
    )
}

/// Request to update the log filter.
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct UpdateLogFilterRequest {
    /// `EnvFilter` directive, e.g. `task_notify=debug,sqlx=warn`.
    pub filter: String,
}

/// Current logging configuration.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct LoggingConfigResponse {
    pub filter: String,
    pub log_dir: String,
}

fn logging(state: &AppState) -> ApiResult<Arc<LoggingConfig>> {
    state
        .logging_config
        .clone()
        .ok_or_else(|| ApiError::service_unavailable("Logging configuration not available"))
}

fn describe(config: &LoggingConfig) -> LoggingConfigResponse {
    LoggingConfigResponse {
        filter: config.filter(),
        log_dir: config.log_dir().display().to_string(),
    }
}

#[utoipa::path(
    get,
    path = "/api/logging",
    tag = "logging",
    params(("X-User-Id" = i64, Header, description = "Authenticated user")),
    responses(
        (status = 200, description = "Logging configuration", body = LoggingConfigResponse)
    )
)]
pub async fn get_logging_config(
    State(state): State<AppState>,
    _caller: CallerIdentity,
) -> ApiResult<Json<LoggingConfigResponse>> {
    let config = logging(&state)?;
    Ok(Json(describe(&config)))
}

#[utoipa::path(
    put,
    path = "/api/logging",
    tag = "logging",
    request_body = UpdateLogFilterRequest,
    params(("X-User-Id" = i64, Header, description = "Authenticated user")),
    responses(
        (status = 200, description = "Logging configuration updated", body = LoggingConfigResponse),
        (status = 400, description = "Invalid filter", body = crate::api::error::ApiErrorResponse)
    )
)]
pub async fn update_logging_config(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<UpdateLogFilterRequest>, JsonRejection>,
) -> ApiResult<Json<LoggingConfigResponse>> {
    let Json(request) = body.map_err(|e| ApiError::validation(e.body_text()))?;
    let config = logging(&state)?;
    config.set_filter(&request.filter)?;
    tracing::info!(user_id = caller.user_id, filter = %request.filter, "Log filter changed via API");
    Ok(Json(describe(&config)))
}
