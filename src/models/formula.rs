use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A user-defined underwriting expression
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CustomFormula {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub expression: String,
    pub description: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewCustomFormula {
    pub name: String,
    pub expression: String,
    pub description: Option<String>,
}
