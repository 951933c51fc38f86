//! Webhook administration routes.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use serde::Serialize;

use crate::api::error::{ApiError, ApiResult};
use crate::api::server::AppState;
use crate::resilience::CircuitBreakerState;
use crate::webhook::{DispatcherStatsSnapshot, WEBHOOK_SERVICE, WebhookDispatcher};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/webhooks/circuit-breaker", get(circuit_breaker_status))
        .route(
            "/api/webhooks/circuit-breaker/reset",
            post(reset_circuit_breaker),
        )
        .route("/api/webhooks/stats", get(dispatcher_stats))
}

/// Circuit breaker status of the outbound webhook.
#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CircuitBreakerStatusResponse {
    pub service: String,
    #[serde(flatten)]
    pub breaker: CircuitBreakerState,
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub timeout_secs: u64,
}

fn dispatcher(state: &AppState) -> ApiResult<Arc<WebhookDispatcher>> {
    state
        .dispatcher
        .clone()
        .ok_or_else(|| ApiError::service_unavailable("Webhook dispatcher not available"))
}

async fn status_of(dispatcher: &WebhookDispatcher) -> ApiResult<CircuitBreakerStatusResponse> {
    let breaker = dispatcher.breaker();
    let config = breaker.config();
    Ok(CircuitBreakerStatusResponse {
        service: WEBHOOK_SERVICE.to_string(),
        breaker: breaker.status(WEBHOOK_SERVICE).await?,
        failure_threshold: config.failure_threshold,
        success_threshold: config.success_threshold,
        timeout_secs: config.timeout.as_secs(),
    })
}

#[utoipa::path(
    get,
    path = "/api/webhooks/circuit-breaker",
    tag = "webhooks",
    responses(
        (status = 200, description = "Breaker state", body = CircuitBreakerStatusResponse)
    )
)]
pub async fn circuit_breaker_status(
    State(state): State<AppState>,
) -> ApiResult<Json<CircuitBreakerStatusResponse>> {
    let dispatcher = dispatcher(&state)?;
    Ok(Json(status_of(&dispatcher).await?))
}

#[utoipa::path(
    post,
    path = "/api/webhooks/circuit-breaker/reset",
    tag = "webhooks",
    responses(
        (status = 200, description = "Breaker closed", body = CircuitBreakerStatusResponse)
    )
)]
pub async fn reset_circuit_breaker(
    State(state): State<AppState>,
) -> ApiResult<Json<CircuitBreakerStatusResponse>> {
    let dispatcher = dispatcher(&state)?;
    dispatcher.breaker().reset(WEBHOOK_SERVICE).await?;
    tracing::info!(service = WEBHOOK_SERVICE, "Circuit breaker reset via API");
    Ok(Json(status_of(&dispatcher).await?))
}

#[utoipa::path(
    get,
    path = "/api/webhooks/stats",
    tag = "webhooks",
    responses(
        (status = 200, description = "Delivery counters since start", body = DispatcherStatsSnapshot)
    )
)]
pub async fn dispatcher_stats(
    State(state): State<AppState>,
) -> ApiResult<Json<DispatcherStatsSnapshot>> {
    Ok(Json(dispatcher(&state)?.stats()))
}
