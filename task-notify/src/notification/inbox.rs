//! Per-user notification inbox.

use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use crate::database::models::{NotificationDbModel, NotificationStatus};
use crate::database::repositories::NotificationRepository;
use crate::notification::model::{Notification, NotificationPage};
use crate::{Error, Result};

/// Largest accepted page size.
pub const MAX_PAGE_LIMIT: u32 = 100;

/// Paging and filtering of a notification listing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, utoipa::IntoParams)]
#[serde(default)]
#[into_params(parameter_in = Query)]
pub struct ListQuery {
    /// 1-based page number.
    pub page: u32,
    /// Page size, 1 to 100.
    pub limit: u32,
    pub status: Option<NotificationStatus>,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 10,
            status: None,
        }
    }
}

impl ListQuery {
    pub fn validate(&self) -> Result<()> {
        if self.page < 1 {
            return Err(Error::validation("page must be at least 1"));
        }
        if !(1..=MAX_PAGE_LIMIT).contains(&self.limit) {
            return Err(Error::validation(format!(
                "limit must be between 1 and {MAX_PAGE_LIMIT}"
            )));
        }
        Ok(())
    }
}

/// Read and manage the notifications of one user at a time.
///
/// Acting on another user's notification is [`Error::Forbidden`]; an unknown
/// or expired id is [`Error::NotFound`].
#[derive(Clone)]
pub struct NotificationInbox {
    repo: Arc<dyn NotificationRepository>,
}

impl NotificationInbox {
    pub fn new(repo: Arc<dyn NotificationRepository>) -> Self {
        Self { repo }
    }

    pub async fn list(&self, user_id: i64, query: &ListQuery) -> Result<NotificationPage> {
        query.validate()?;
        let rows = self
            .repo
            .list_by_user(user_id, query.page, query.limit, query.status)
            .await?;
        let total = self.repo.count_by_user(user_id, query.status).await?;
        Ok(NotificationPage {
            items: rows.into_iter().map(Notification::from).collect(),
            total,
            page: query.page,
            limit: query.limit,
        })
    }

    pub async fn get(&self, user_id: i64, id: i64) -> Result<Notification> {
        self.owned(user_id, id).await.map(Notification::from)
    }

    /// Marking an already read notification keeps its first `readAt`.
    pub async fn mark_read(&self, user_id: i64, id: i64) -> Result<Notification> {
        self.owned(user_id, id).await?;
        let row = self.repo.mark_read(id).await?;
        debug!(user_id, notification_id = id, "Notification marked read");
        Ok(row.into())
    }

    pub async fn delete(&self, user_id: i64, id: i64) -> Result<()> {
        self.owned(user_id, id).await?;
        self.repo.delete_by_id(id).await?;
        debug!(user_id, notification_id = id, "Notification deleted");
        Ok(())
    }

    /// Delete every notification of `user_id`, returning how many went.
    pub async fn delete_all(&self, user_id: i64) -> Result<u64> {
        let removed = self.repo.delete_all_by_user(user_id).await?;
        debug!(user_id, removed, "Notifications cleared");
        Ok(removed)
    }

    async fn owned(&self, user_id: i64, id: i64) -> Result<NotificationDbModel> {
        let row = self.repo.get_by_id(id).await?;
        if row.user_id != user_id {
            return Err(Error::forbidden("Notification", id));
        }
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::repositories::SqlxNotificationRepository;
    use crate::database::time::{add_days_ms, datetime_to_ms};
    use crate::database::{init_pool_with_size, run_migrations};
    use crate::utils::{Clock, ManualClock};

    struct Fixture {
        inbox: NotificationInbox,
        repo: Arc<SqlxNotificationRepository>,
        clock: Arc<ManualClock>,
    }

    async fn setup() -> Fixture {
        let pool = init_pool_with_size("sqlite::memory:", 1).await.unwrap();
        run_migrations(&pool).await.unwrap();
        let clock = ManualClock::starting_now();
        let repo = Arc::new(SqlxNotificationRepository::with_clock(pool, clock.clone()));
        Fixture {
            inbox: NotificationInbox::new(repo.clone()),
            repo,
            clock,
        }
    }

    impl Fixture {
        async fn seed(&self, id: i64, user_id: i64) {
            let now = datetime_to_ms(self.clock.now());
            self.repo
                .save(&NotificationDbModel::new_unread(
                    id,
                    user_id,
                    id * 10,
                    format!("Task '{id}' has been completed!"),
                    "2025-01-15T10:30:00+00:00",
                    now,
                    add_days_ms(now, 30),
                ))
                .await
                .unwrap();
            self.clock.advance_secs(1);
        }
    }

    #[test]
    fn test_query_validation() {
        assert!(ListQuery::default().validate().is_ok());
        for query in [
            ListQuery {
                page: 0,
                ..Default::default()
            },
            ListQuery {
                limit: 0,
                ..Default::default()
            },
            ListQuery {
                limit: 101,
                ..Default::default()
            },
        ] {
            assert!(matches!(query.validate(), Err(Error::Validation(_))));
        }
    }

    #[tokio::test]
    async fn test_list_pages_and_filters() {
        let fx = setup().await;
        for id in 1..=12 {
            fx.seed(id, 7).await;
        }
        fx.seed(13, 8).await;
        fx.inbox.mark_read(7, 3).await.unwrap();

        let page = fx.inbox.list(7, &ListQuery::default()).await.unwrap();
        assert_eq!(page.total, 12);
        assert_eq!(page.items.len(), 10);
        assert_eq!(page.items[0].id, 12);

        let page = fx
            .inbox
            .list(
                7,
                &ListQuery {
                    page: 2,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let ids: Vec<i64> = page.items.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![2, 1]);

        let read = fx
            .inbox
            .list(
                7,
                &ListQuery {
                    status: Some(NotificationStatus::Read),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(read.total, 1);
        assert_eq!(read.items[0].id, 3);
    }

    #[tokio::test]
    async fn test_ownership_is_enforced() {
        let fx = setup().await;
        fx.seed(1, 7).await;

        assert!(fx.inbox.get(7, 1).await.is_ok());
        assert!(matches!(
            fx.inbox.get(8, 1).await,
            Err(Error::Forbidden { .. })
        ));
        assert!(matches!(
            fx.inbox.mark_read(8, 1).await,
            Err(Error::Forbidden { .. })
        ));
        assert!(matches!(
            fx.inbox.delete(8, 1).await,
            Err(Error::Forbidden { .. })
        ));
        assert!(matches!(
            fx.inbox.get(7, 99).await,
            Err(Error::NotFound { .. })
        ));

        // Still there after the rejected delete.
        assert_eq!(
            fx.inbox.get(7, 1).await.unwrap().status,
            NotificationStatus::Unread
        );
    }

    #[tokio::test]
    async fn test_mark_read_keeps_first_read_at() {
        let fx = setup().await;
        fx.seed(1, 7).await;

        let first = fx.inbox.mark_read(7, 1).await.unwrap();
        assert_eq!(first.status, NotificationStatus::Read);
        let read_at = first.read_at.unwrap();

        fx.clock.advance_secs(60);
        let second = fx.inbox.mark_read(7, 1).await.unwrap();
        assert_eq!(second.read_at, Some(read_at));
    }

    #[tokio::test]
    async fn test_delete_and_delete_all() {
        let fx = setup().await;
        fx.seed(1, 7).await;
        fx.seed(2, 7).await;
        fx.seed(3, 7).await;
        fx.seed(4, 8).await;

        fx.inbox.delete(7, 1).await.unwrap();
        assert!(matches!(
            fx.inbox.get(7, 1).await,
            Err(Error::NotFound { .. })
        ));

        assert_eq!(fx.inbox.delete_all(7).await.unwrap(), 2);
        assert_eq!(fx.inbox.delete_all(7).await.unwrap(), 0);
        assert_eq!(
            fx.inbox.list(8, &ListQuery::default()).await.unwrap().total,
            1
        );
    }
}
