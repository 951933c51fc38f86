//! Task database models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One row of the `tasks` table.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct TaskDbModel {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub description: Option<String>,
    /// `pending` or `done`
    pub status: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl TaskDbModel {
    pub fn status(&self) -> TaskStatus {
        self.status.parse().unwrap_or(TaskStatus::Pending)
    }
}

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
pub enum TaskStatus {
    Pending,
    Done,
}
