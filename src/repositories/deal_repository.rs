use crate::error::RepositoryError;
use crate::models::{
    Deal, DealFilter, DealStatus, DealUpdate, DealWithProperty, NewDeal, Property,
};
use serde::Serialize;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

const DEAL_COLUMNS: &str = "id, agent_id, title, status, asking_price, notes, \
    assigned_underwriter_id, rejection_reason, created_at, updated_at";

const PROPERTY_COLUMNS: &str = "id, deal_id, address, city, state, zip, property_type, \
    bedrooms, bathrooms, square_feet, year_built, latitude, longitude, \
    estimated_arv, estimated_repairs, created_at";

/// Default and maximum page size for deal listings
const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 200;

/// Number of deals in a status
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct StatusCount {
    pub status: String,
    pub count: i64,
}

/// Repository for deal and property data access
pub struct DealRepository {
    pool: PgPool,
}

impl DealRepository {
    /// Create a new DealRepository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a deal and its property in one transaction
    pub async fn create(
        &self,
        agent_id: Uuid,
        new: &NewDeal,
    ) -> Result<DealWithProperty, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            r#"
            INSERT INTO deals (agent_id, title, asking_price, notes)
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            DEAL_COLUMNS
        );
        let deal = sqlx::query_as::<_, Deal>(&sql)
            .bind(agent_id)
            .bind(new.title.trim())
            .bind(new.asking_price)
            .bind(new.notes.as_deref())
            .fetch_one(&mut *tx)
            .await?;

        let p = &new.property;
        let sql = format!(
            r#"
            INSERT INTO properties (
                deal_id, address, city, state, zip, property_type, bedrooms, bathrooms,
                square_feet, year_built, latitude, longitude, estimated_arv, estimated_repairs
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING {}
            "#,
            PROPERTY_COLUMNS
        );
        let property = sqlx::query_as::<_, Property>(&sql)
            .bind(deal.id)
            .bind(p.address.trim())
            .bind(p.city.trim())
            .bind(p.state.trim())
            .bind(p.zip.trim())
            .bind(p.property_type.trim())
            .bind(p.bedrooms)
            .bind(p.bathrooms)
            .bind(p.square_feet)
            .bind(p.year_built)
            .bind(p.latitude)
            .bind(p.longitude)
            .bind(p.estimated_arv)
            .bind(p.estimated_repairs)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(DealWithProperty { deal, property })
    }

    /// Find a deal by UUID
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Deal>, RepositoryError> {
        let sql = format!("SELECT {} FROM deals WHERE id = $1", DEAL_COLUMNS);
        let deal = sqlx::query_as::<_, Deal>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(deal)
    }

    /// Find the property belonging to a deal
    pub async fn find_property(&self, deal_id: Uuid) -> Result<Option<Property>, RepositoryError> {
        let sql = format!("SELECT {} FROM properties WHERE deal_id = $1", PROPERTY_COLUMNS);
        let property = sqlx::query_as::<_, Property>(&sql)
            .bind(deal_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(property)
    }

    /// Find a deal together with its property
    pub async fn find_with_property(
        &self,
        id: Uuid,
    ) -> Result<Option<DealWithProperty>, RepositoryError> {
        let Some(deal) = self.find_by_id(id).await? else {
            return Ok(None);
        };
        let property = self.find_property(id).await?.ok_or_else(|| {
            RepositoryError::NotFound(format!("Property for deal {} is missing", id))
        })?;
        Ok(Some(DealWithProperty { deal, property }))
    }

    /// List deals matching a filter, newest first
    pub async fn list(&self, filter: &DealFilter) -> Result<Vec<Deal>, RepositoryError> {
        let mut query: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM deals WHERE TRUE", DEAL_COLUMNS));

        if let Some(status) = filter.status {
            query.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(agent_id) = filter.agent_id {
            query.push(" AND agent_id = ").push_bind(agent_id);
        }
        if let Some(underwriter_id) = filter.assigned_underwriter_id {
            query
                .push(" AND assigned_underwriter_id = ")
                .push_bind(underwriter_id);
        }
        if let Some(underwriter_id) = filter.underwriter_scope {
            query
                .push(" AND (assigned_underwriter_id = ")
                .push_bind(underwriter_id)
                .push(" OR (assigned_underwriter_id IS NULL AND status IN ('submitted', 'underwriting')))");
        }

        let limit = filter.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        let offset = filter.offset.unwrap_or(0).max(0);
        query
            .push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let deals = query.build_query_as::<Deal>().fetch_all(&self.pool).await?;
        Ok(deals)
    }

    /// Move a deal from `from` to `to`. `None` when the deal was no longer in `from`.
    ///
    /// The rejection reason is only kept for rejected deals.
    pub async fn update_status(
        &self,
        id: Uuid,
        from: DealStatus,
        to: DealStatus,
        rejection_reason: Option<&str>,
    ) -> Result<Option<Deal>, RepositoryError> {
        let sql = format!(
            r#"
            UPDATE deals
            SET status = $3, rejection_reason = $4, updated_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING {}
            "#,
            DEAL_COLUMNS
        );
        let reason = if to == DealStatus::Rejected {
            rejection_reason
        } else {
            None
        };
        let deal = sqlx::query_as::<_, Deal>(&sql)
            .bind(id)
            .bind(from.as_str())
            .bind(to.as_str())
            .bind(reason)
            .fetch_optional(&self.pool)
            .await?;
        Ok(deal)
    }

    /// Assign an underwriter to a deal
    pub async fn assign_underwriter(
        &self,
        id: Uuid,
        underwriter_id: Uuid,
    ) -> Result<Deal, RepositoryError> {
        let sql = format!(
            r#"
            UPDATE deals
            SET assigned_underwriter_id = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            DEAL_COLUMNS
        );
        let deal = sqlx::query_as::<_, Deal>(&sql)
            .bind(id)
            .bind(underwriter_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(deal)
    }

    /// Self-assignment: succeeds only if the deal is unassigned or already held by `underwriter_id`
    pub async fn claim(
        &self,
        id: Uuid,
        underwriter_id: Uuid,
    ) -> Result<Option<Deal>, RepositoryError> {
        let sql = format!(
            r#"
            UPDATE deals
            SET assigned_underwriter_id = $2, updated_at = NOW()
            WHERE id = $1 AND (assigned_underwriter_id IS NULL OR assigned_underwriter_id = $2)
            RETURNING {}
            "#,
            DEAL_COLUMNS
        );
        let deal = sqlx::query_as::<_, Deal>(&sql)
            .bind(id)
            .bind(underwriter_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(deal)
    }

    /// Apply a partial update to a deal and its property estimates.
    ///
    /// Only applies while the deal is still in `expected_status`; `None` means it moved on.
    pub async fn update(
        &self,
        id: Uuid,
        expected_status: DealStatus,
        update: &DealUpdate,
    ) -> Result<Option<DealWithProperty>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            r#"
            UPDATE deals
            SET title = COALESCE($2, title),
                asking_price = COALESCE($3, asking_price),
                notes = COALESCE($4, notes),
                updated_at = NOW()
            WHERE id = $1 AND status = $5
            RETURNING {}
            "#,
            DEAL_COLUMNS
        );
        let deal = sqlx::query_as::<_, Deal>(&sql)
            .bind(id)
            .bind(update.title.as_deref().map(str::trim))
            .bind(update.asking_price)
            .bind(update.notes.as_deref())
            .bind(expected_status.as_str())
            .fetch_optional(&mut *tx)
            .await?;

        let Some(deal) = deal else {
            return Ok(None);
        };

        let sql = format!(
            r#"
            UPDATE properties
            SET estimated_arv = COALESCE($2, estimated_arv),
                estimated_repairs = COALESCE($3, estimated_repairs)
            WHERE deal_id = $1
            RETURNING {}
            "#,
            PROPERTY_COLUMNS
        );
        let property = sqlx::query_as::<_, Property>(&sql)
            .bind(id)
            .bind(update.estimated_arv)
            .bind(update.estimated_repairs)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(Some(DealWithProperty { deal, property }))
    }

    /// Store geocoded coordinates on a deal's property
    pub async fn update_coordinates(
        &self,
        deal_id: Uuid,
        latitude: f64,
        longitude: f64,
    ) -> Result<Property, RepositoryError> {
        let sql = format!(
            r#"
            UPDATE properties
            SET latitude = $2, longitude = $3
            WHERE deal_id = $1
            RETURNING {}
            "#,
            PROPERTY_COLUMNS
        );
        let property = sqlx::query_as::<_, Property>(&sql)
            .bind(deal_id)
            .bind(latitude)
            .bind(longitude)
            .fetch_one(&self.pool)
            .await?;
        Ok(property)
    }

    /// Delete a deal; its property and children cascade
    pub async fn delete(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM deals WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Deal counts by status, optionally restricted to one agent or underwriter
    pub async fn count_by_status(
        &self,
        agent_id: Option<Uuid>,
        underwriter_id: Option<Uuid>,
    ) -> Result<Vec<StatusCount>, RepositoryError> {
        let counts = sqlx::query_as::<_, StatusCount>(
            r#"
            SELECT status, COUNT(*) AS count
            FROM deals
            WHERE ($1::UUID IS NULL OR agent_id = $1)
              AND ($2::UUID IS NULL OR assigned_underwriter_id = $2)
            GROUP BY status
            ORDER BY status
            "#,
        )
        .bind(agent_id)
        .bind(underwriter_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(counts)
    }

    /// Deals waiting in underwriting with nobody assigned
    pub async fn count_unassigned_queue(&self) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM deals
            WHERE status IN ('submitted', 'underwriting') AND assigned_underwriter_id IS NULL
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}
