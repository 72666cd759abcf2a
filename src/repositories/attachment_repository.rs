use crate::error::RepositoryError;
use crate::models::Attachment;
use sqlx::PgPool;
use uuid::Uuid;

const ATTACHMENT_COLUMNS: &str =
    "id, deal_id, uploaded_by, file_name, content_type, size_bytes, storage_key, created_at";

/// Repository for attachment metadata
pub struct AttachmentRepository {
    pool: PgPool,
}

impl AttachmentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        deal_id: Uuid,
        uploaded_by: Uuid,
        file_name: &str,
        content_type: &str,
        size_bytes: i64,
        storage_key: &str,
    ) -> Result<Attachment, RepositoryError> {
        let sql = format!(
            r#"
            INSERT INTO attachments (deal_id, uploaded_by, file_name, content_type, size_bytes, storage_key)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            ATTACHMENT_COLUMNS
        );
        let attachment = sqlx::query_as::<_, Attachment>(&sql)
            .bind(deal_id)
            .bind(uploaded_by)
            .bind(file_name)
            .bind(content_type)
            .bind(size_bytes)
            .bind(storage_key)
            .fetch_one(&self.pool)
            .await?;
        Ok(attachment)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Attachment>, RepositoryError> {
        let sql = format!("SELECT {} FROM attachments WHERE id = $1", ATTACHMENT_COLUMNS);
        let attachment = sqlx::query_as::<_, Attachment>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(attachment)
    }

    pub async fn list_by_deal(&self, deal_id: Uuid) -> Result<Vec<Attachment>, RepositoryError> {
        let sql = format!(
            "SELECT {} FROM attachments WHERE deal_id = $1 ORDER BY created_at DESC",
            ATTACHMENT_COLUMNS
        );
        let attachments = sqlx::query_as::<_, Attachment>(&sql)
            .bind(deal_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(attachments)
    }

    /// Storage keys of every attachment on a deal, used before deleting the deal
    pub async fn storage_keys_for_deal(&self, deal_id: Uuid) -> Result<Vec<String>, RepositoryError> {
        let keys = sqlx::query_scalar::<_, String>(
            "SELECT storage_key FROM attachments WHERE deal_id = $1",
        )
        .bind(deal_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(keys)
    }

    pub async fn delete(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM attachments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
