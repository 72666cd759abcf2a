use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// Underwriter's verdict on a deal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recommendation {
    Approve,
    Reject,
    Counter,
}

impl Recommendation {
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "approve" => Ok(Recommendation::Approve),
            "reject" => Ok(Recommendation::Reject),
            "counter" => Ok(Recommendation::Counter),
            _ => Err(format!("Invalid recommendation: {}", s)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Recommendation::Approve => "approve",
            Recommendation::Reject => "reject",
            Recommendation::Counter => "counter",
        }
    }
}

/// A persisted underwriting evaluation: inputs, formula outputs and custom results
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UnderwritingRecord {
    pub id: Uuid,
    pub deal_id: Uuid,
    pub underwriter_id: Uuid,
    pub arv: Decimal,
    pub repair_costs: Decimal,
    pub holding_months: Decimal,
    pub monthly_holding_cost: Decimal,
    pub buying_closing_costs: Decimal,
    pub selling_closing_costs: Decimal,
    pub target_profit_percent: Decimal,
    pub buy_box_percent: Decimal,
    pub purchase_price: Option<Decimal>,
    pub max_allowable_offer: Decimal,
    pub seventy_rule_offer: Decimal,
    pub buy_box_offer: Decimal,
    pub total_investment: Decimal,
    pub profit: Decimal,
    pub profit_margin_percent: Decimal,
    pub roi_percent: Decimal,
    pub custom_results: Value, // JSONB: formula name -> decimal string or error
    pub recommendation: String,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
}
