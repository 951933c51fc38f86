//! Webhook intake route.

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
};
use serde::Serialize;

use crate::api::error::{ApiError, ApiResult};
use crate::api::server::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/notify", post(receive_notification))
}

/// Acknowledgement of a webhook delivery.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct NotifyResponse {
    pub notification_id: i64,
    pub message: String,
}

/// Accept a signed task-completion webhook.
///
/// The signature covers the raw request body, so the body is taken as bytes
/// and only parsed after it has been verified.
#[utoipa::path(
    post,
    path = "/notify",
    tag = "notify",
    request_body(content = crate::webhook::WebhookPayload, content_type = "application/json"),
    params(("X-Signature" = String, Header, description = "sha256=<hex HMAC of the body>")),
    responses(
        (status = 201, description = "Notification stored", body = NotifyResponse),
        (status = 200, description = "Event already received", body = NotifyResponse),
        (status = 400, description = "Malformed payload", body = crate::api::error::ApiErrorResponse),
        (status = 401, description = "Missing or invalid signature", body = crate::api::error::ApiErrorResponse)
    )
)]
pub async fn receive_notification(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<NotifyResponse>)> {
    let receiver = state
        .receiver
        .ok_or_else(|| ApiError::service_unavailable("Webhook receiver not available"))?;

    let signature = headers
        .get(webhook_signature::SIGNATURE_HEADER)
        .ok_or_else(ApiError::missing_signature)?
        .to_str()
        .map_err(|_| ApiError::from(crate::Error::SignatureInvalid))?;

    let receipt = receiver.receive(Some(signature), &body).await?;

    let (status, message) = if receipt.created {
        (StatusCode::CREATED, "Notification received successfully")
    } else {
        (StatusCode::OK, "Notification already processed")
    };
    Ok((
        status,
        Json(NotifyResponse {
            notification_id: receipt.notification_id,
            message: message.to_string(),
        }),
    ))
}
