use crate::error::{AppError, AppResult};
use crate::models::{
    CustomFormula, DealStatus, NewCustomFormula, NewNotification, NotificationKind, Profile,
    Recommendation, Role, UnderwritingRecord,
};
use crate::repositories::{DealRepository, FormulaRepository, UnderwritingRepository};
use crate::services::access::{can_underwrite_deal, can_view_deal};
use crate::services::{AuditTrailService, NotificationService};
use crate::underwriting::{self, Formula, UnderwritingInputs, UnderwritingResult, VARIABLE_NAMES};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

const MAX_FORMULAS_PER_OWNER: usize = 50;
const MAX_FORMULA_NAME_LEN: usize = 64;

/// Outcome of one custom formula
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CustomResult {
    Value { value: Decimal },
    Error { error: String },
}

/// Standard figures plus the caller's custom formula results, keyed by formula name
#[derive(Debug, Clone, Serialize)]
pub struct Evaluation {
    pub inputs: UnderwritingInputs,
    pub result: UnderwritingResult,
    pub custom_results: BTreeMap<String, CustomResult>,
}

/// Body of a deal evaluation
#[derive(Debug, Clone, Deserialize)]
pub struct EvaluateDealRequest {
    #[serde(flatten)]
    pub inputs: UnderwritingInputs,
    pub recommendation: Recommendation,
    pub notes: Option<String>,
}

/// Answer to a formula syntax check
#[derive(Debug, Clone, Serialize)]
pub struct FormulaValidation {
    pub valid: bool,
    pub variables: BTreeSet<String>,
    pub error: Option<String>,
    /// Value against sample inputs, when the formula is valid
    pub sample_value: Option<Decimal>,
}

/// Service for underwriting evaluations and custom formulas
pub struct UnderwritingService {
    deal_repo: Arc<DealRepository>,
    record_repo: Arc<UnderwritingRepository>,
    formula_repo: Arc<FormulaRepository>,
    audit: Arc<AuditTrailService>,
    notifications: Arc<NotificationService>,
}

impl UnderwritingService {
    pub fn new(
        deal_repo: Arc<DealRepository>,
        record_repo: Arc<UnderwritingRepository>,
        formula_repo: Arc<FormulaRepository>,
        audit: Arc<AuditTrailService>,
        notifications: Arc<NotificationService>,
    ) -> Self {
        Self {
            deal_repo,
            record_repo,
            formula_repo,
            audit,
            notifications,
        }
    }

    /// Preview the figures for a set of inputs. Nothing is stored.
    pub async fn calculate(
        &self,
        actor: &Profile,
        inputs: UnderwritingInputs,
        include_custom: bool,
    ) -> AppResult<Evaluation> {
        let result = underwriting::evaluate(&inputs)?;
        let custom_results = if include_custom {
            let formulas = self.formula_repo.list_by_owner(actor.id).await?;
            run_custom_formulas(&formulas, &inputs, &result)
        } else {
            BTreeMap::new()
        };

        Ok(Evaluation {
            inputs,
            result,
            custom_results,
        })
    }

    /// Evaluate a deal under underwriting and store the record
    pub async fn evaluate_deal(
        &self,
        actor: &Profile,
        deal_id: Uuid,
        request: EvaluateDealRequest,
    ) -> AppResult<UnderwritingRecord> {
        let deal = self
            .deal_repo
            .find_by_id(deal_id)
            .await?
            .filter(|d| can_view_deal(actor.id, actor.role_enum(), d))
            .ok_or_else(|| AppError::NotFound(format!("Deal {} not found", deal_id)))?;

        if !can_underwrite_deal(actor.id, actor.role_enum(), &deal) {
            return Err(AppError::Forbidden(
                "Only the assigned underwriter or an admin can evaluate this deal".to_string(),
            ));
        }
        if deal.status_enum() != DealStatus::Underwriting {
            return Err(AppError::Conflict(format!(
                "Deal must be in underwriting to be evaluated, it is {}",
                deal.status
            )));
        }

        let evaluation = self.calculate(actor, request.inputs, true).await?;
        let custom_results = serde_json::to_value(&evaluation.custom_results)?;
        let notes = request.notes.as_deref().map(str::trim).filter(|n| !n.is_empty());

        let record = self
            .record_repo
            .create(
                deal_id,
                actor.id,
                &evaluation.inputs,
                &evaluation.result,
                &custom_results,
                request.recommendation,
                notes,
            )
            .await?;

        info!(
            "Deal {} evaluated by {}: MAO {}, recommendation {}",
            deal_id,
            actor.id,
            record.max_allowable_offer,
            record.recommendation
        );
        self.audit
            .record_quietly(
                Some(actor.id),
                "underwriting_recorded",
                "deal",
                Some(deal_id),
                json!({
                    "record_id": record.id,
                    "mao": record.max_allowable_offer.to_string(),
                    "recommendation": record.recommendation,
                }),
            )
            .await;

        if deal.agent_id != actor.id {
            let notification = NewNotification {
                recipient_id: deal.agent_id,
                kind: NotificationKind::UnderwritingCompleted,
                title: "Underwriting completed".to_string(),
                body: format!(
                    "{} was evaluated: {} (MAO {})",
                    deal.title, record.recommendation, record.max_allowable_offer
                ),
                deal_id: Some(deal_id),
            };
            if let Err(e) = self.notifications.notify(notification).await {
                warn!("Failed to notify agent {}: {}", deal.agent_id, e);
            }
        }

        Ok(record)
    }

    /// Evaluation history of a visible deal, newest first
    pub async fn records(&self, actor: &Profile, deal_id: Uuid) -> AppResult<Vec<UnderwritingRecord>> {
        self.deal_repo
            .find_by_id(deal_id)
            .await?
            .filter(|d| can_view_deal(actor.id, actor.role_enum(), d))
            .ok_or_else(|| AppError::NotFound(format!("Deal {} not found", deal_id)))?;
        Ok(self.record_repo.list_by_deal(deal_id).await?)
    }

    pub async fn list_formulas(&self, actor: &Profile) -> AppResult<Vec<CustomFormula>> {
        Ok(self.formula_repo.list_by_owner(actor.id).await?)
    }

    pub async fn create_formula(
        &self,
        actor: &Profile,
        new: &NewCustomFormula,
    ) -> AppResult<CustomFormula> {
        validate_formula(new)?;

        let existing = self.formula_repo.list_by_owner(actor.id).await?;
        if existing.len() >= MAX_FORMULAS_PER_OWNER {
            return Err(AppError::Conflict(format!(
                "At most {} formulas per user",
                MAX_FORMULAS_PER_OWNER
            )));
        }

        let formula = self.formula_repo.create(actor.id, new).await?;
        self.audit
            .record_quietly(
                Some(actor.id),
                "formula_created",
                "custom_formula",
                Some(formula.id),
                json!({ "name": formula.name, "expression": formula.expression }),
            )
            .await;
        Ok(formula)
    }

    pub async fn update_formula(
        &self,
        actor: &Profile,
        id: Uuid,
        new: &NewCustomFormula,
    ) -> AppResult<CustomFormula> {
        self.owned_formula(actor, id).await?;
        validate_formula(new)?;
        Ok(self.formula_repo.update(id, new).await?)
    }

    pub async fn delete_formula(&self, actor: &Profile, id: Uuid) -> AppResult<()> {
        let formula = self.owned_formula(actor, id).await?;
        self.formula_repo.delete(id).await?;
        self.audit
            .record_quietly(
                Some(actor.id),
                "formula_deleted",
                "custom_formula",
                Some(id),
                json!({ "name": formula.name }),
            )
            .await;
        Ok(())
    }

    async fn owned_formula(&self, actor: &Profile, id: Uuid) -> AppResult<CustomFormula> {
        let formula = self
            .formula_repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Formula {} not found", id)))?;
        // admins manage their own formulas like everyone else
        if formula.owner_id != actor.id {
            return Err(AppError::NotFound(format!("Formula {} not found", id)));
        }
        Ok(formula)
    }
}

/// Parse and check a formula without saving it
pub fn validate_expression(expression: &str) -> FormulaValidation {
    let parsed = Formula::parse(expression.trim())
        .and_then(|f| f.check_variables(&VARIABLE_NAMES).map(|_| f));

    match parsed {
        Ok(formula) => {
            let sample = sample_inputs();
            let sample_value = underwriting::evaluate(&sample)
                .ok()
                .and_then(|result| formula.evaluate(&result.variables(&sample)).ok());
            FormulaValidation {
                valid: true,
                variables: formula.variables(),
                error: None,
                sample_value,
            }
        }
        Err(e) => FormulaValidation {
            valid: false,
            variables: BTreeSet::new(),
            error: Some(e.to_string()),
            sample_value: None,
        },
    }
}

/// Which roles may keep custom formulas
pub fn can_own_formulas(role: Role) -> bool {
    matches!(role, Role::Underwriter | Role::Admin)
}

fn validate_formula(new: &NewCustomFormula) -> AppResult<()> {
    let name = new.name.trim();
    if name.is_empty() || name.chars().count() > MAX_FORMULA_NAME_LEN {
        return Err(AppError::Validation(format!(
            "name must be 1 to {} characters",
            MAX_FORMULA_NAME_LEN
        )));
    }
    let formula = Formula::parse(new.expression.trim())?;
    formula.check_variables(&VARIABLE_NAMES)?;
    Ok(())
}

/// Evaluate each saved formula. One bad formula never blocks the others.
pub fn run_custom_formulas(
    formulas: &[CustomFormula],
    inputs: &UnderwritingInputs,
    result: &UnderwritingResult,
) -> BTreeMap<String, CustomResult> {
    let vars = result.variables(inputs);
    formulas
        .iter()
        .map(|saved| {
            let outcome = Formula::parse(&saved.expression)
                .and_then(|formula| formula.evaluate(&vars))
                .map(|value| CustomResult::Value {
                    value: value.round_dp(2),
                })
                .unwrap_or_else(|e| CustomResult::Error {
                    error: e.to_string(),
                });
            (saved.name.clone(), outcome)
        })
        .collect()
}

fn sample_inputs() -> UnderwritingInputs {
    UnderwritingInputs {
        holding_months: Decimal::from(6),
        monthly_holding_cost: Decimal::from(1_500),
        buying_closing_costs: Decimal::from(3_000),
        selling_closing_costs: Decimal::from(2_000),
        ..UnderwritingInputs::new(Decimal::from(300_000), Decimal::from(20_000))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn saved(name: &str, expression: &str) -> CustomFormula {
        let now = chrono::Utc::now().naive_utc();
        CustomFormula {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            name: name.to_string(),
            expression: expression.to_string(),
            description: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_run_custom_formulas_isolates_failures() {
        let inputs = sample_inputs();
        let result = underwriting::evaluate(&inputs).unwrap();
        let formulas = vec![
            saved("spread", "mao - seventy_rule_offer"),
            saved("broken", "arv / 0"),
            saved("rounded", "round(arv / 7, 1)"),
        ];

        let results = run_custom_formulas(&formulas, &inputs, &result);
        assert_eq!(
            results["spread"],
            CustomResult::Value {
                value: Decimal::from(16_000)
            }
        );
        assert!(matches!(results["broken"], CustomResult::Error { .. }));
        assert_eq!(
            results["rounded"],
            CustomResult::Value {
                value: Decimal::new(428571, 1)
            }
        );
    }

    #[test]
    fn test_validate_expression() {
        let ok = validate_expression("arv * 0.7 - repair_costs");
        assert!(ok.valid);
        assert_eq!(ok.sample_value, Some(Decimal::from(190_000)));
        assert!(ok.variables.contains("repair_costs"));

        let unknown = validate_expression("arv * cap_rate");
        assert!(!unknown.valid);
        assert!(unknown.error.unwrap().contains("cap_rate"));

        let syntax = validate_expression("arv * (0.7");
        assert!(!syntax.valid);
    }

    #[test]
    fn test_validate_formula_name() {
        let new = NewCustomFormula {
            name: " ".to_string(),
            expression: "arv".to_string(),
            description: None,
        };
        assert!(validate_formula(&new).is_err());
    }

    #[test]
    fn test_custom_result_wire_format() {
        let value = serde_json::to_value(CustomResult::Value {
            value: Decimal::new(1250, 2),
        })
        .unwrap();
        assert_eq!(value, json!({ "value": "12.50" }));

        let error = serde_json::to_value(CustomResult::Error {
            error: "Division by zero".into(),
        })
        .unwrap();
        assert_eq!(error, json!({ "error": "Division by zero" }));
    }
}
