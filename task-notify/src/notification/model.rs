//! Notification views returned to callers.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::database::models::{NotificationDbModel, NotificationStatus};
use crate::database::time::ms_to_datetime;

/// A stored notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: i64,
    pub user_id: i64,
    pub task_id: i64,
    pub message: String,
    /// Event time as sent by the task API.
    pub timestamp: String,
    pub status: NotificationStatus,
    pub received_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_at: Option<DateTime<Utc>>,
}

impl From<NotificationDbModel> for Notification {
    fn from(row: NotificationDbModel) -> Self {
        let status = row.status();
        Self {
            id: row.id,
            user_id: row.user_id,
            task_id: row.task_id,
            message: row.message,
            timestamp: row.timestamp,
            status,
            received_at: ms_to_datetime(row.received_at),
            read_at: row.read_at.map(ms_to_datetime),
        }
    }
}

/// One page of a user's notifications.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct NotificationPage {
    pub items: Vec<Notification>,
    /// Matching notifications across all pages.
    pub total: i64,
    pub page: u32,
    pub limit: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_camel_case() {
        let mut row = NotificationDbModel::new_unread(
            5,
            1,
            42,
            "Task 'A' has been completed!",
            "2025-01-15T10:30:00+00:00",
            1_736_937_000_000,
            1_739_529_000_000,
        );
        let json = serde_json::to_value(Notification::from(row.clone())).unwrap();
        assert_eq!(json["id"], 5);
        assert_eq!(json["userId"], 1);
        assert_eq!(json["taskId"], 42);
        assert_eq!(json["status"], "unread");
        assert_eq!(json["receivedAt"], "2025-01-15T10:30:00Z");
        assert!(json.get("readAt").is_none());

        row.status = "read".to_string();
        row.read_at = Some(1_736_937_060_000);
        let json = serde_json::to_value(Notification::from(row)).unwrap();
        assert_eq!(json["status"], "read");
        assert_eq!(json["readAt"], "2025-01-15T10:31:00Z");
    }
}
