//! Health check route.

use axum::{Json, extract::State, http::StatusCode};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::api::server::AppState;

/// Health check response.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    /// `OK`, or `DEGRADED` when the state store cannot be reached
    pub status: String,
    pub timestamp: DateTime<Utc>,
    /// Seconds since the server started
    pub uptime: f64,
    pub service: String,
    pub version: String,
    /// `ok`, `unreachable`, or `not_configured`
    pub state_store: String,
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "State store unreachable", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let state_store = match &state.state_store {
        None => "not_configured",
        Some(store) => match store.ping().await {
            Ok(()) => "ok",
            Err(e) => {
                tracing::warn!(error = %e, "State store health check failed");
                "unreachable"
            }
        },
    };
    let (code, status) = if state_store == "unreachable" {
        (StatusCode::SERVICE_UNAVAILABLE, "DEGRADED")
    } else {
        (StatusCode::OK, "OK")
    };

    (
        code,
        Json(HealthResponse {
            status: status.to_string(),
            timestamp: Utc::now(),
            uptime: state.start_time.elapsed().as_secs_f64(),
            service: state.service_name.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            state_store: state_store.to_string(),
        }),
    )
}
