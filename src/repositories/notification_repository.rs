use crate::error::RepositoryError;
use crate::models::{NewNotification, Notification};
use sqlx::PgPool;
use uuid::Uuid;

const NOTIFICATION_COLUMNS: &str =
    "id, recipient_id, kind, title, body, deal_id, read_at, created_at";

/// Repository for in-app notifications
pub struct NotificationRepository {
    pool: PgPool,
}

impl NotificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, new: &NewNotification) -> Result<Notification, RepositoryError> {
        let sql = format!(
            r#"
            INSERT INTO notifications (recipient_id, kind, title, body, deal_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            NOTIFICATION_COLUMNS
        );
        let notification = sqlx::query_as::<_, Notification>(&sql)
            .bind(new.recipient_id)
            .bind(new.kind.as_str())
            .bind(&new.title)
            .bind(&new.body)
            .bind(new.deal_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(notification)
    }

    /// A recipient's notifications, newest first
    pub async fn list(
        &self,
        recipient_id: Uuid,
        unread_only: bool,
        limit: i64,
    ) -> Result<Vec<Notification>, RepositoryError> {
        let sql = format!(
            r#"
            SELECT {}
            FROM notifications
            WHERE recipient_id = $1 AND (NOT $2 OR read_at IS NULL)
            ORDER BY created_at DESC
            LIMIT $3
            "#,
            NOTIFICATION_COLUMNS
        );
        let notifications = sqlx::query_as::<_, Notification>(&sql)
            .bind(recipient_id)
            .bind(unread_only)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(notifications)
    }

    pub async fn unread_count(&self, recipient_id: Uuid) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM notifications WHERE recipient_id = $1 AND read_at IS NULL",
        )
        .bind(recipient_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// Mark one notification read; `None` when it does not belong to the recipient
    pub async fn mark_read(
        &self,
        id: Uuid,
        recipient_id: Uuid,
    ) -> Result<Option<Notification>, RepositoryError> {
        let sql = format!(
            r#"
            UPDATE notifications
            SET read_at = COALESCE(read_at, NOW())
            WHERE id = $1 AND recipient_id = $2
            RETURNING {}
            "#,
            NOTIFICATION_COLUMNS
        );
        let notification = sqlx::query_as::<_, Notification>(&sql)
            .bind(id)
            .bind(recipient_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(notification)
    }

    /// Mark every unread notification read, returning how many changed
    pub async fn mark_all_read(&self, recipient_id: Uuid) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            "UPDATE notifications SET read_at = NOW() WHERE recipient_id = $1 AND read_at IS NULL",
        )
        .bind(recipient_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
