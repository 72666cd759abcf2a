use crate::error::RepositoryError;
use crate::models::{AuditLog, AuditLogFilter};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

const AUDIT_COLUMNS: &str = "id, actor_id, action, entity_type, entity_id, details, created_at";

const DEFAULT_LIMIT: i64 = 100;
const MAX_LIMIT: i64 = 1000;

/// Repository for the audit trail
pub struct AuditLogRepository {
    pool: PgPool,
}

impl AuditLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(
        &self,
        actor_id: Option<Uuid>,
        action: &str,
        entity_type: &str,
        entity_id: Option<Uuid>,
        details: &serde_json::Value,
    ) -> Result<AuditLog, RepositoryError> {
        let sql = format!(
            r#"
            INSERT INTO audit_logs (actor_id, action, entity_type, entity_id, details)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            AUDIT_COLUMNS
        );
        let entry = sqlx::query_as::<_, AuditLog>(&sql)
            .bind(actor_id)
            .bind(action)
            .bind(entity_type)
            .bind(entity_id)
            .bind(details)
            .fetch_one(&self.pool)
            .await?;
        Ok(entry)
    }

    /// Entries matching a filter, newest first
    pub async fn list(&self, filter: &AuditLogFilter) -> Result<Vec<AuditLog>, RepositoryError> {
        let mut query: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM audit_logs WHERE TRUE", AUDIT_COLUMNS));

        if let Some(actor_id) = filter.actor_id {
            query.push(" AND actor_id = ").push_bind(actor_id);
        }
        if let Some(entity_type) = &filter.entity_type {
            query.push(" AND entity_type = ").push_bind(entity_type.clone());
        }
        if let Some(entity_id) = filter.entity_id {
            query.push(" AND entity_id = ").push_bind(entity_id);
        }
        if let Some(action) = &filter.action {
            query.push(" AND action = ").push_bind(action.clone());
        }

        let limit = filter.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        query.push(" ORDER BY created_at DESC LIMIT ").push_bind(limit);

        let entries = query
            .build_query_as::<AuditLog>()
            .fetch_all(&self.pool)
            .await?;
        Ok(entries)
    }
}
