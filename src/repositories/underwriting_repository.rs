use crate::error::RepositoryError;
use crate::models::{Recommendation, UnderwritingRecord};
use crate::underwriting::{UnderwritingInputs, UnderwritingResult};
use sqlx::PgPool;
use uuid::Uuid;

const RECORD_COLUMNS: &str = "id, deal_id, underwriter_id, arv, repair_costs, holding_months, \
    monthly_holding_cost, buying_closing_costs, selling_closing_costs, target_profit_percent, \
    buy_box_percent, purchase_price, max_allowable_offer, seventy_rule_offer, buy_box_offer, \
    total_investment, profit, profit_margin_percent, roi_percent, custom_results, \
    recommendation, notes, created_at";

/// Repository for underwriting records
pub struct UnderwritingRepository {
    pool: PgPool,
}

impl UnderwritingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Persist an evaluation
    #[allow(clippy::too_many_arguments)]
    pub async fn create(
        &self,
        deal_id: Uuid,
        underwriter_id: Uuid,
        inputs: &UnderwritingInputs,
        result: &UnderwritingResult,
        custom_results: &serde_json::Value,
        recommendation: Recommendation,
        notes: Option<&str>,
    ) -> Result<UnderwritingRecord, RepositoryError> {
        let sql = format!(
            r#"
            INSERT INTO underwriting_records (
                deal_id, underwriter_id, arv, repair_costs, holding_months, monthly_holding_cost,
                buying_closing_costs, selling_closing_costs, target_profit_percent,
                buy_box_percent, purchase_price, max_allowable_offer, seventy_rule_offer,
                buy_box_offer, total_investment, profit, profit_margin_percent, roi_percent,
                custom_results, recommendation, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                    $17, $18, $19, $20, $21)
            RETURNING {}
            "#,
            RECORD_COLUMNS
        );
        let record = sqlx::query_as::<_, UnderwritingRecord>(&sql)
            .bind(deal_id)
            .bind(underwriter_id)
            .bind(inputs.arv)
            .bind(inputs.repair_costs)
            .bind(inputs.holding_months)
            .bind(inputs.monthly_holding_cost)
            .bind(inputs.buying_closing_costs)
            .bind(inputs.selling_closing_costs)
            .bind(inputs.target_profit_percent)
            .bind(inputs.buy_box_percent)
            .bind(inputs.purchase_price)
            .bind(result.max_allowable_offer)
            .bind(result.seventy_rule_offer)
            .bind(result.buy_box_offer)
            .bind(result.total_investment)
            .bind(result.profit)
            .bind(result.profit_margin_percent)
            .bind(result.roi_percent)
            .bind(custom_results)
            .bind(recommendation.as_str())
            .bind(notes)
            .fetch_one(&self.pool)
            .await?;
        Ok(record)
    }

    /// All evaluations of a deal, newest first
    pub async fn list_by_deal(
        &self,
        deal_id: Uuid,
    ) -> Result<Vec<UnderwritingRecord>, RepositoryError> {
        let sql = format!(
            "SELECT {} FROM underwriting_records WHERE deal_id = $1 ORDER BY created_at DESC",
            RECORD_COLUMNS
        );
        let records = sqlx::query_as::<_, UnderwritingRecord>(&sql)
            .bind(deal_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(records)
    }

    /// Number of evaluations an underwriter has recorded
    pub async fn count_by_underwriter(&self, underwriter_id: Uuid) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM underwriting_records WHERE underwriter_id = $1",
        )
        .bind(underwriter_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}
