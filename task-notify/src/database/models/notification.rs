//! Notification database models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One row of the `notifications` table.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct NotificationDbModel {
    pub id: i64,
    pub user_id: i64,
    pub task_id: i64,
    pub message: String,
    /// Event time as sent by the task API (RFC 3339).
    pub timestamp: String,
    /// `unread` or `read`
    pub status: String,
    pub received_at: i64,
    pub read_at: Option<i64>,
    pub expires_at: i64,
}

impl NotificationDbModel {
    /// Build a fresh unread notification received at `received_at`.
    pub fn new_unread(
        id: i64,
        user_id: i64,
        task_id: i64,
        message: impl Into<String>,
        timestamp: impl Into<String>,
        received_at: i64,
        expires_at: i64,
    ) -> Self {
        Self {
            id,
            user_id,
            task_id,
            message: message.into(),
            timestamp: timestamp.into(),
            status: NotificationStatus::Unread.to_string(),
            received_at,
            read_at: None,
            expires_at,
        }
    }

    pub fn status(&self) -> NotificationStatus {
        self.status.parse().unwrap_or(NotificationStatus::Unread)
    }
}

/// Read state of a notification.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    utoipa::ToSchema,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    Unread,
    Read,
}
