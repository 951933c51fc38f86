//! Notification repository.
//!
//! Ownership is not checked here: callers that act on behalf of a user go
//! through [`crate::notification::NotificationInbox`].

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::database::models::{NotificationDbModel, NotificationStatus};
use crate::database::time::datetime_to_ms;
use crate::utils::{Clock, system_clock};
use crate::{Error, Result};

/// Notification repository trait.
///
/// Rows whose `expires_at` has passed are invisible to every read.
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn save(&self, notification: &NotificationDbModel) -> Result<()>;

    /// One page of a user's notifications, newest first. `page` starts at 1.
    async fn list_by_user(
        &self,
        user_id: i64,
        page: u32,
        limit: u32,
        status: Option<NotificationStatus>,
    ) -> Result<Vec<NotificationDbModel>>;

    async fn count_by_user(&self, user_id: i64, status: Option<NotificationStatus>) -> Result<i64>;

    async fn get_by_id(&self, id: i64) -> Result<NotificationDbModel>;

    /// Mark as read and return the updated row. The expiry is left untouched.
    async fn mark_read(&self, id: i64) -> Result<NotificationDbModel>;

    async fn delete_by_id(&self, id: i64) -> Result<()>;

    /// Returns the number of rows removed.
    async fn delete_all_by_user(&self, user_id: i64) -> Result<u64>;

    /// Physically remove expired rows.
    async fn purge_expired(&self) -> Result<u64>;
}

/// SQLx implementation of NotificationRepository.
pub struct SqlxNotificationRepository {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl SqlxNotificationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self::with_clock(pool, system_clock())
    }

    pub fn with_clock(pool: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }

    fn now_ms(&self) -> i64 {
        datetime_to_ms(self.clock.now())
    }
}

#[async_trait]
impl NotificationRepository for SqlxNotificationRepository {
    async fn save(&self, n: &NotificationDbModel) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO notifications
                (id, user_id, task_id, message, timestamp, status, received_at, read_at, expires_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(n.id)
        .bind(n.user_id)
        .bind(n.task_id)
        .bind(&n.message)
        .bind(&n.timestamp)
        .bind(&n.status)
        .bind(n.received_at)
        .bind(n.read_at)
        .bind(n.expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_by_user(
        &self,
        user_id: i64,
        page: u32,
        limit: u32,
        status: Option<NotificationStatus>,
    ) -> Result<Vec<NotificationDbModel>> {
        let offset = i64::from(page.saturating_sub(1)) * i64::from(limit);
        let status = status.map(|s| s.to_string());

        let rows = sqlx::query_as::<_, NotificationDbModel>(
            r#"
            SELECT * FROM notifications
            WHERE user_id = ? AND expires_at > ? AND (? IS NULL OR status = ?)
            ORDER BY received_at DESC, id DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(user_id)
        .bind(self.now_ms())
        .bind(&status)
        .bind(&status)
        .bind(i64::from(limit))
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn count_by_user(&self, user_id: i64, status: Option<NotificationStatus>) -> Result<i64> {
        let status = status.map(|s| s.to_string());
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM notifications
            WHERE user_id = ? AND expires_at > ? AND (? IS NULL OR status = ?)
            "#,
        )
        .bind(user_id)
        .bind(self.now_ms())
        .bind(&status)
        .bind(&status)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn get_by_id(&self, id: i64) -> Result<NotificationDbModel> {
        sqlx::query_as::<_, NotificationDbModel>(
            "SELECT * FROM notifications WHERE id = ? AND expires_at > ?",
        )
        .bind(id)
        .bind(self.now_ms())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::not_found("Notification", id))
    }

    async fn mark_read(&self, id: i64) -> Result<NotificationDbModel> {
        let now = self.now_ms();
        // The first read time sticks when marked again.
        sqlx::query_as::<_, NotificationDbModel>(
            r#"
            UPDATE notifications SET status = 'read', read_at = COALESCE(read_at, ?)
            WHERE id = ? AND expires_at > ?
            RETURNING *
            "#,
        )
        .bind(now)
        .bind(id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::not_found("Notification", id))
    }

    async fn delete_by_id(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = ? AND expires_at > ?")
            .bind(id)
            .bind(self.now_ms())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::not_found("Notification", id));
        }
        Ok(())
    }

    async fn delete_all_by_user(&self, user_id: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM notifications WHERE user_id = ? AND expires_at > ?")
            .bind(user_id)
            .bind(self.now_ms())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn purge_expired(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM notifications WHERE expires_at <= ?")
            .bind(self.now_ms())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::time::add_days_ms;
    use crate::database::{init_pool_with_size, run_migrations};
    use crate::utils::ManualClock;

    async fn setup() -> (SqlxNotificationRepository, Arc<ManualClock>) {
        let pool = init_pool_with_size("sqlite::memory:", 1).await.unwrap();
        run_migrations(&pool).await.unwrap();
        let clock = ManualClock::starting_now();
        (
            SqlxNotificationRepository::with_clock(pool, clock.clone()),
            clock,
        )
    }

    fn row(id: i64, user_id: i64, received_at: i64) -> NotificationDbModel {
        NotificationDbModel::new_unread(
            id,
            user_id,
            100 + id,
            format!("Task '{id}' has been completed!"),
            "2025-01-15T10:30:00Z",
            received_at,
            add_days_ms(received_at, 30),
        )
    }

    #[tokio::test]
    async fn test_save_and_get() {
        let (repo, clock) = setup().await;
        let now = datetime_to_ms(clock.now());
        repo.save(&row(1, 7, now)).await.unwrap();

        let fetched = repo.get_by_id(1).await.unwrap();
        assert_eq!(fetched, row(1, 7, now));
        assert!(matches!(
            repo.get_by_id(2).await,
            Err(Error::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_duplicate_id_is_rejected() {
        let (repo, clock) = setup().await;
        let now = datetime_to_ms(clock.now());
        repo.save(&row(1, 7, now)).await.unwrap();
        assert!(repo.save(&row(1, 7, now)).await.is_err());
    }

    #[tokio::test]
    async fn test_list_is_newest_first_and_paged() {
        let (repo, clock) = setup().await;
        let base = datetime_to_ms(clock.now());
        for id in 1..=25 {
            repo.save(&row(id, 7, base + id)).await.unwrap();
        }
        repo.save(&row(26, 8, base + 100)).await.unwrap();

        let page1 = repo.list_by_user(7, 1, 10, None).await.unwrap();
        let ids: Vec<i64> = page1.iter().map(|n| n.id).collect();
        assert_eq!(ids, (16..=25).rev().collect::<Vec<_>>());

        let page3 = repo.list_by_user(7, 3, 10, None).await.unwrap();
        assert_eq!(page3.len(), 5);
        assert_eq!(page3.last().map(|n| n.id), Some(1));

        assert_eq!(repo.count_by_user(7, None).await.unwrap(), 25);
        assert_eq!(repo.count_by_user(8, None).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_equal_received_at_orders_by_id() {
        let (repo, clock) = setup().await;
        let now = datetime_to_ms(clock.now());
        for id in 1..=3 {
            repo.save(&row(id, 7, now)).await.unwrap();
        }
        let ids: Vec<i64> = repo
            .list_by_user(7, 1, 10, None)
            .await
            .unwrap()
            .iter()
            .map(|n| n.id)
            .collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }

    #[tokio::test]
    async fn test_mark_read_preserves_expiry() {
        let (repo, clock) = setup().await;
        let now = datetime_to_ms(clock.now());
        let original = row(1, 7, now);
        repo.save(&original).await.unwrap();

        clock.advance_secs(60);
        let updated = repo.mark_read(1).await.unwrap();
        assert_eq!(updated.status(), NotificationStatus::Read);
        assert_eq!(updated.read_at, Some(now + 60_000));
        assert_eq!(updated.expires_at, original.expires_at);

        clock.advance_secs(60);
        let again = repo.mark_read(1).await.unwrap();
        assert_eq!(again.read_at, Some(now + 60_000));

        assert_eq!(
            repo.count_by_user(7, Some(NotificationStatus::Read))
                .await
                .unwrap(),
            1
        );
        assert_eq!(
            repo.count_by_user(7, Some(NotificationStatus::Unread))
                .await
                .unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_expired_rows_are_invisible() {
        let (repo, clock) = setup().await;
        let now = datetime_to_ms(clock.now());
        repo.save(&row(1, 7, now)).await.unwrap();

        clock.advance_secs(30 * 24 * 60 * 60);
        assert!(repo.get_by_id(1).await.is_err());
        assert!(repo.list_by_user(7, 1, 10, None).await.unwrap().is_empty());
        assert!(repo.mark_read(1).await.is_err());
        assert_eq!(repo.purge_expired().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete() {
        let (repo, clock) = setup().await;
        let now = datetime_to_ms(clock.now());
        for id in 1..=3 {
            repo.save(&row(id, 7, now)).await.unwrap();
        }
        repo.save(&row(4, 8, now)).await.unwrap();

        repo.delete_by_id(1).await.unwrap();
        assert!(matches!(
            repo.delete_by_id(1).await,
            Err(Error::NotFound { .. })
        ));

        assert_eq!(repo.delete_all_by_user(7).await.unwrap(), 2);
        assert_eq!(repo.count_by_user(7, None).await.unwrap(), 0);
        assert_eq!(repo.count_by_user(8, None).await.unwrap(), 1);
    }
}
