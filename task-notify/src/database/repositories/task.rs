//! Task repository.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::database::models::{TaskDbModel, TaskStatus};
use crate::database::time::datetime_to_ms;
use crate::utils::{Clock, system_clock};
use crate::{Error, Result};

#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn create(
        &self,
        user_id: i64,
        title: &str,
        description: Option<&str>,
    ) -> Result<TaskDbModel>;

    async fn get_by_id(&self, id: i64) -> Result<TaskDbModel>;

    /// Set the status unconditionally and return the updated row.
    async fn update_status(&self, id: i64, status: TaskStatus) -> Result<TaskDbModel>;
}

/// SQLx implementation of TaskRepository.
pub struct SqlxTaskRepository {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl SqlxTaskRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self::with_clock(pool, system_clock())
    }

    pub fn with_clock(pool: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }
}

#[async_trait]
impl TaskRepository for SqlxTaskRepository {
    async fn create(
        &self,
        user_id: i64,
        title: &str,
        description: Option<&str>,
    ) -> Result<TaskDbModel> {
        let now = datetime_to_ms(self.clock.now());
        let task = sqlx::query_as::<_, TaskDbModel>(
            r#"
            INSERT INTO tasks (user_id, title, description, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(title)
        .bind(description)
        .bind(TaskStatus::Pending.to_string())
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(task)
    }

    async fn get_by_id(&self, id: i64) -> Result<TaskDbModel> {
        sqlx::query_as::<_, TaskDbModel>("SELECT * FROM tasks WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::not_found("Task", id))
    }

    async fn update_status(&self, id: i64, status: TaskStatus) -> Result<TaskDbModel> {
        sqlx::query_as::<_, TaskDbModel>(
            "UPDATE tasks SET status = ?, updated_at = ? WHERE id = ? RETURNING *",
        )
        .bind(status.to_string())
        .bind(datetime_to_ms(self.clock.now()))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::not_found("Task", id))
    }
}
