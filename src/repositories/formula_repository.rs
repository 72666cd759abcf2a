use crate::error::RepositoryError;
use crate::models::{CustomFormula, NewCustomFormula};
use sqlx::PgPool;
use uuid::Uuid;

const FORMULA_COLUMNS: &str =
    "id, owner_id, name, expression, description, created_at, updated_at";

/// Repository for user-defined formulas
pub struct FormulaRepository {
    pool: PgPool,
}

impl FormulaRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        owner_id: Uuid,
        new: &NewCustomFormula,
    ) -> Result<CustomFormula, RepositoryError> {
        let sql = format!(
            r#"
            INSERT INTO custom_formulas (owner_id, name, expression, description)
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            FORMULA_COLUMNS
        );
        let formula = sqlx::query_as::<_, CustomFormula>(&sql)
            .bind(owner_id)
            .bind(new.name.trim())
            .bind(new.expression.trim())
            .bind(new.description.as_deref())
            .fetch_one(&self.pool)
            .await?;
        Ok(formula)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<CustomFormula>, RepositoryError> {
        let sql = format!("SELECT {} FROM custom_formulas WHERE id = $1", FORMULA_COLUMNS);
        let formula = sqlx::query_as::<_, CustomFormula>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(formula)
    }

    /// An owner's formulas in name order
    pub async fn list_by_owner(&self, owner_id: Uuid) -> Result<Vec<CustomFormula>, RepositoryError> {
        let sql = format!(
            "SELECT {} FROM custom_formulas WHERE owner_id = $1 ORDER BY name",
            FORMULA_COLUMNS
        );
        let formulas = sqlx::query_as::<_, CustomFormula>(&sql)
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(formulas)
    }

    pub async fn update(
        &self,
        id: Uuid,
        new: &NewCustomFormula,
    ) -> Result<CustomFormula, RepositoryError> {
        let sql = format!(
            r#"
            UPDATE custom_formulas
            SET name = $2, expression = $3, description = $4, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            FORMULA_COLUMNS
        );
        let formula = sqlx::query_as::<_, CustomFormula>(&sql)
            .bind(id)
            .bind(new.name.trim())
            .bind(new.expression.trim())
            .bind(new.description.as_deref())
            .fetch_one(&self.pool)
            .await?;
        Ok(formula)
    }

    pub async fn delete(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM custom_formulas WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
