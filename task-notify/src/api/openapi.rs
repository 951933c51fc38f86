//! OpenAPI documents, one per binary, served at `/api-docs/openapi.json`.

use utoipa::OpenApi;

use crate::api::error::ApiErrorResponse;
use crate::api::routes::health::HealthResponse;
use crate::api::routes::logging::{LoggingConfigResponse, UpdateLogFilterRequest};
use crate::api::routes::notifications::{DeleteAllResponse, DeleteResponse};
use crate::api::routes::notify::NotifyResponse;
use crate::api::routes::tasks::CreateTaskRequest;
use crate::api::routes::webhooks::CircuitBreakerStatusResponse;
use crate::database::models::{NotificationStatus, TaskStatus};
use crate::error::FieldError;
use crate::notification::{Notification, NotificationPage};
use crate::resilience::{CircuitBreakerState, CircuitState};
use crate::task::Task;
use crate::webhook::{DispatcherStatsSnapshot, WebhookPayload};

/// Notification service API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "task-notification-service",
        description = "Receives signed task-completion webhooks and serves each user's notification inbox."
    ),
    tags(
        (name = "notify", description = "Webhook intake"),
        (name = "notifications", description = "Per-user notification inbox"),
        (name = "health", description = "Health check"),
        (name = "logging", description = "Runtime log filter")
    ),
    paths(
        crate::api::routes::notify::receive_notification,
        crate::api::routes::notifications::list_notifications,
        crate::api::routes::notifications::get_notification,
        crate::api::routes::notifications::mark_notification_read,
        crate::api::routes::notifications::delete_notification,
        crate::api::routes::notifications::delete_all_notifications,
        crate::api::routes::health::health_check,
        crate::api::routes::logging::get_logging_config,
        crate::api::routes::logging::update_logging_config,
    ),
    components(schemas(
        WebhookPayload,
        NotifyResponse,
        Notification,
        NotificationPage,
        NotificationStatus,
        DeleteResponse,
        DeleteAllResponse,
        HealthResponse,
        LoggingConfigResponse,
        UpdateLogFilterRequest,
        ApiErrorResponse,
        FieldError,
    ))
)]
pub struct NotificationApiDoc;

/// Task API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "task-management-api",
        description = "Task records whose completion is announced to the notification service by signed webhook."
    ),
    tags(
        (name = "tasks", description = "Task management"),
        (name = "webhooks", description = "Outbound webhook circuit breaker and counters"),
        (name = "logging", description = "Runtime log filter")
    ),
    paths(
        crate::api::routes::tasks::create_task,
        crate::api::routes::tasks::get_task,
        crate::api::routes::tasks::complete_task,
        crate::api::routes::webhooks::circuit_breaker_status,
        crate::api::routes::webhooks::reset_circuit_breaker,
        crate::api::routes::webhooks::dispatcher_stats,
        crate::api::routes::logging::get_logging_config,
        crate::api::routes::logging::update_logging_config,
    ),
    components(schemas(
        CreateTaskRequest,
        Task,
        TaskStatus,
        CircuitBreakerStatusResponse,
        CircuitBreakerState,
        CircuitState,
        DispatcherStatsSnapshot,
        LoggingConfigResponse,
        UpdateLogFilterRequest,
        ApiErrorResponse,
    ))
)]
pub struct TaskApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_documents_list_their_routes() {
        let notify = NotificationApiDoc::openapi();
        assert!(notify.paths.paths.contains_key("/notify"));
        assert!(notify.paths.paths.contains_key("/notifications/{id}/read"));

        let tasks = TaskApiDoc::openapi();
        assert!(tasks.paths.paths.contains_key("/api/tasks/{id}/complete"));
        assert!(!tasks.paths.paths.contains_key("/notify"));
        assert!(notify.paths.paths.contains_key("/api/logging"));
        assert!(tasks.paths.paths.contains_key("/api/logging"));
    }
}
