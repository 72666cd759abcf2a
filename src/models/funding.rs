use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Funding request status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FundingStatus {
    Pending,
    Approved,
    Rejected,
    Withdrawn,
}

impl FundingStatus {
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(FundingStatus::Pending),
            "approved" => Ok(FundingStatus::Approved),
            "rejected" => Ok(FundingStatus::Rejected),
            "withdrawn" => Ok(FundingStatus::Withdrawn),
            _ => Err(format!("Invalid funding status: {}", s)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FundingStatus::Pending => "pending",
            FundingStatus::Approved => "approved",
            FundingStatus::Rejected => "rejected",
            FundingStatus::Withdrawn => "withdrawn",
        }
    }
}

/// An investor's offer to fund a deal
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FundingRequest {
    pub id: Uuid,
    pub deal_id: Uuid,
    pub investor_id: Uuid,
    pub amount: Decimal,
    pub status: String,
    pub message: Option<String>,
    pub decided_by: Option<Uuid>,
    pub decided_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

impl FundingRequest {
    pub fn status_enum(&self) -> FundingStatus {
        FundingStatus::from_str(&self.status).unwrap_or(FundingStatus::Pending)
    }

    pub fn is_pending(&self) -> bool {
        self.status_enum() == FundingStatus::Pending
    }
}

/// Aggregate funding for one deal
#[derive(Debug, Clone, Default, Serialize, Deserialize, FromRow)]
pub struct FundingTotals {
    pub pending_count: i64,
    pub pending_amount: Decimal,
    pub approved_count: i64,
    pub approved_amount: Decimal,
}
