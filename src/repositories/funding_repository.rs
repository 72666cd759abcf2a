use crate::error::RepositoryError;
use crate::models::{FundingRequest, FundingStatus, FundingTotals};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

const FUNDING_COLUMNS: &str =
    "id, deal_id, investor_id, amount, status, message, decided_by, decided_at, created_at";

const TOTALS_SELECT: &str = r#"
    SELECT
        COUNT(*) FILTER (WHERE status = 'pending') AS pending_count,
        COALESCE(SUM(amount) FILTER (WHERE status = 'pending'), 0) AS pending_amount,
        COUNT(*) FILTER (WHERE status = 'approved') AS approved_count,
        COALESCE(SUM(amount) FILTER (WHERE status = 'approved'), 0) AS approved_amount
    FROM funding_requests
"#;

/// Repository for investor funding requests
pub struct FundingRepository {
    pool: PgPool,
}

impl FundingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        deal_id: Uuid,
        investor_id: Uuid,
        amount: Decimal,
        message: Option<&str>,
    ) -> Result<FundingRequest, RepositoryError> {
        let sql = format!(
            r#"
            INSERT INTO funding_requests (deal_id, investor_id, amount, message)
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            FUNDING_COLUMNS
        );
        let request = sqlx::query_as::<_, FundingRequest>(&sql)
            .bind(deal_id)
            .bind(investor_id)
            .bind(amount)
            .bind(message)
            .fetch_one(&self.pool)
            .await?;
        Ok(request)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<FundingRequest>, RepositoryError> {
        let sql = format!("SELECT {} FROM funding_requests WHERE id = $1", FUNDING_COLUMNS);
        let request = sqlx::query_as::<_, FundingRequest>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(request)
    }

    /// Requests matching any combination of deal, investor and status
    pub async fn list(
        &self,
        deal_id: Option<Uuid>,
        investor_id: Option<Uuid>,
        status: Option<FundingStatus>,
    ) -> Result<Vec<FundingRequest>, RepositoryError> {
        let sql = format!(
            r#"
            SELECT {}
            FROM funding_requests
            WHERE ($1::UUID IS NULL OR deal_id = $1)
              AND ($2::UUID IS NULL OR investor_id = $2)
              AND ($3::TEXT IS NULL OR status = $3)
            ORDER BY created_at DESC
            "#,
            FUNDING_COLUMNS
        );
        let requests = sqlx::query_as::<_, FundingRequest>(&sql)
            .bind(deal_id)
            .bind(investor_id)
            .bind(status.map(|s| s.as_str()))
            .fetch_all(&self.pool)
            .await?;
        Ok(requests)
    }

    /// Move a pending request to a final status. `None` if it was no longer pending.
    pub async fn transition_pending(
        &self,
        id: Uuid,
        status: FundingStatus,
        decided_by: Option<Uuid>,
    ) -> Result<Option<FundingRequest>, RepositoryError> {
        let sql = format!(
            r#"
            UPDATE funding_requests
            SET status = $2, decided_by = $3, decided_at = NOW()
            WHERE id = $1 AND status = 'pending'
            RETURNING {}
            "#,
            FUNDING_COLUMNS
        );
        let request = sqlx::query_as::<_, FundingRequest>(&sql)
            .bind(id)
            .bind(status.as_str())
            .bind(decided_by)
            .fetch_optional(&self.pool)
            .await?;
        Ok(request)
    }

    /// Totals for one deal
    pub async fn totals_for_deal(&self, deal_id: Uuid) -> Result<FundingTotals, RepositoryError> {
        let sql = format!("{} WHERE deal_id = $1", TOTALS_SELECT);
        let totals = sqlx::query_as::<_, FundingTotals>(&sql)
            .bind(deal_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(totals)
    }

    /// Totals for one investor
    pub async fn totals_for_investor(
        &self,
        investor_id: Uuid,
    ) -> Result<FundingTotals, RepositoryError> {
        let sql = format!("{} WHERE investor_id = $1", TOTALS_SELECT);
        let totals = sqlx::query_as::<_, FundingTotals>(&sql)
            .bind(investor_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(totals)
    }

    /// Platform-wide totals
    pub async fn totals(&self) -> Result<FundingTotals, RepositoryError> {
        let totals = sqlx::query_as::<_, FundingTotals>(TOTALS_SELECT)
            .fetch_one(&self.pool)
            .await?;
        Ok(totals)
    }
}
