//! Webhook payload.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Body of a task-completion webhook.
///
/// Field order is the canonical signing order; do not reorder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload {
    pub user_id: i64,
    pub task_id: i64,
    pub message: String,
    /// RFC 3339, fixed when the payload is built.
    pub timestamp: String,
}

impl WebhookPayload {
    /// Payload announcing that a task has been completed at `completed_at`.
    pub fn task_completed(
        user_id: i64,
        task_id: i64,
        title: &str,
        completed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            task_id,
            message: format!("Task '{title}' has been completed!"),
            timestamp: completed_at.to_rfc3339_opts(SecondsFormat::Secs, false),
        }
    }

    /// Canonical JSON body, the exact bytes that get signed and sent.
    pub fn canonical_body(&self) -> Result<String, webhook_signature::SignatureError> {
        webhook_signature::canonical_json(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_task_completed_payload() {
        let at = Utc.with_ymd_and_hms(2025, 1, 15, 10, 30, 0).unwrap();
        let payload = WebhookPayload::task_completed(1, 42, "Write report", at);
        assert_eq!(payload.message, "Task 'Write report' has been completed!");
        assert_eq!(payload.timestamp, "2025-01-15T10:30:00+00:00");
        assert_eq!(
            payload.canonical_body().unwrap(),
            r#"{"userId":1,"taskId":42,"message":"Task 'Write report' has been completed!","timestamp":"2025-01-15T10:30:00+00:00"}"#
        );
    }
}
