//! Task service.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::info;

use crate::database::models::{TaskDbModel, TaskStatus};
use crate::database::repositories::TaskRepository;
use crate::database::time::ms_to_datetime;
use crate::utils::Clock;
use crate::webhook::{DeliveryOutcome, WebhookDispatcher, WebhookPayload};
use crate::{Error, Result};

/// Longest accepted task title, in characters.
pub const MAX_TITLE_CHARS: usize = 255;

/// A task as returned to its owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<TaskDbModel> for Task {
    fn from(row: TaskDbModel) -> Self {
        let status = row.status();
        Self {
            id: row.id,
            user_id: row.user_id,
            title: row.title,
            description: row.description,
            status,
            created_at: ms_to_datetime(row.created_at),
            updated_at: ms_to_datetime(row.updated_at),
        }
    }
}

/// A completed task and its webhook delivery running in the background.
#[derive(Debug)]
pub struct Completion {
    pub task: Task,
    pub delivery: JoinHandle<DeliveryOutcome>,
}

pub struct TaskService {
    repo: Arc<dyn TaskRepository>,
    dispatcher: Arc<WebhookDispatcher>,
    clock: Arc<dyn Clock>,
}

impl TaskService {
    pub fn new(
        repo: Arc<dyn TaskRepository>,
        dispatcher: Arc<WebhookDispatcher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repo,
            dispatcher,
            clock,
        }
    }

    pub async fn create(
        &self,
        user_id: i64,
        title: &str,
        description: Option<&str>,
    ) -> Result<Task> {
        let title = title.trim();
        if title.is_empty() {
            return Err(Error::validation("title is required"));
        }
        if title.chars().count() > MAX_TITLE_CHARS {
            return Err(Error::validation(format!(
                "title cannot exceed {MAX_TITLE_CHARS} characters"
            )));
        }
        let description = description.map(str::trim).filter(|d| !d.is_empty());

        let task = self.repo.create(user_id, title, description).await?;
        info!(task_id = task.id, user_id, "Task created");
        Ok(task.into())
    }

    pub async fn get(&self, user_id: i64, id: i64) -> Result<Task> {
        self.owned(user_id, id).await.map(Task::from)
    }

    /// Mark the task done and hand a completion webhook to the dispatcher.
    ///
    /// Completing an already completed task emits another webhook with a new
    /// timestamp. The returned delivery handle may be dropped; delivery keeps
    /// running.
    pub async fn complete(&self, user_id: i64, id: i64) -> Result<Completion> {
        self.owned(user_id, id).await?;
        let task = self.repo.update_status(id, TaskStatus::Done).await?;

        let payload =
            WebhookPayload::task_completed(task.user_id, task.id, &task.title, self.clock.now());
        info!(task_id = task.id, user_id, "Task completed, dispatching webhook");
        let delivery = self.dispatcher.enqueue(payload);

        Ok(Completion {
            task: task.into(),
            delivery,
        })
    }

    async fn owned(&self, user_id: i64, id: i64) -> Result<TaskDbModel> {
        let task = self.repo.get_by_id(id).await?;
        if task.user_id != user_id {
            return Err(Error::forbidden("Task", id));
        }
        Ok(task)
    }
}
