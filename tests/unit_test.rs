mod helpers;

use dealflow_backend::models::*;
use dealflow_backend::services::access::{can_transition_deal, can_view_deal};
use dealflow_backend::services::deal_service::scope_filter;
use dealflow_backend::services::underwriting_service::{run_custom_formulas, validate_expression};
use dealflow_backend::services::CustomResult;
use dealflow_backend::underwriting::{self, Formula};
use dealflow_backend::websocket::Channel;
use helpers::worked_example_inputs;
use rust_decimal::Decimal;
use tokio_test::{assert_err, assert_ok};
use uuid::Uuid;

fn deal(agent_id: Uuid, status: DealStatus, underwriter: Option<Uuid>) -> Deal {
    let now = chrono::Utc::now().naive_utc();
    Deal {
        id: Uuid::new_v4(),
        agent_id,
        title: "Test deal".to_string(),
        status: status.as_str().to_string(),
        asking_price: Decimal::from(100_000),
        notes: None,
        assigned_underwriter_id: underwriter,
        rejection_reason: None,
        created_at: now,
        updated_at: now,
    }
}

fn formula(name: &str, expression: &str) -> CustomFormula {
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

/// Unit tests for the underwriting calculator
#[test]
fn test_worked_example() {
    let result = underwriting::evaluate(&worked_example_inputs()).unwrap();

    assert_eq!(result.max_allowable_offer, Decimal::from(206_000));
    assert_eq!(result.seventy_rule_offer, Decimal::from(190_000));
    assert_eq!(result.buy_box_offer, Decimal::from(190_000));
    // purchase defaults to the MAO
    assert_eq!(result.purchase_price, result.max_allowable_offer);
    assert_eq!(result.total_investment, Decimal::from(240_000));
    assert_eq!(result.profit, Decimal::from(60_000));
    assert_eq!(result.roi_percent, Decimal::new(2500, 2));
}

#[test]
fn test_offers_never_negative() {
    let mut inputs = worked_example_inputs();
    inputs.repair_costs = Decimal::from(400_000);
    let result = underwriting::evaluate(&inputs).unwrap();

    assert_eq!(result.max_allowable_offer, Decimal::ZERO);
    assert_eq!(result.seventy_rule_offer, Decimal::ZERO);
    assert_eq!(result.buy_box_offer, Decimal::ZERO);
}

#[test]
fn test_invalid_inputs() {
    let mut inputs = worked_example_inputs();
    inputs.holding_months = Decimal::from(601);
    assert_err!(underwriting::evaluate(&inputs));

    let mut inputs = worked_example_inputs();
    inputs.buy_box_percent = Decimal::from(120);
    assert_err!(underwriting::evaluate(&inputs));

    // fractional months are fine
    let mut inputs = worked_example_inputs();
    inputs.holding_months = Decimal::new(45, 1);
    assert_ok!(underwriting::evaluate(&inputs));
}

/// Unit tests for custom formulas
#[test]
fn test_custom_formula_against_standard_figures() {
    let inputs = worked_example_inputs();
    let result = underwriting::evaluate(&inputs).unwrap();

    let outcomes = run_custom_formulas(
        &[
            formula("spread", "arv - mao"),
            formula("broken", "arv / (repair_costs - repair_costs)"),
        ],
        &inputs,
        &result,
    );

    assert_eq!(
        outcomes["spread"],
        CustomResult::Value {
            value: Decimal::from(94_000)
        }
    );
    assert!(matches!(outcomes["broken"], CustomResult::Error { .. }));
}

#[test]
fn test_validate_expression_reports_variables() {
    let ok = validate_expression("max(arv * 0.65 - repair_costs, 0)");
    assert!(ok.valid);
    assert!(ok.variables.contains("arv"));
    assert!(ok.sample_value.is_some());

    let unknown = validate_expression("arv - commission");
    assert!(!unknown.valid);
    assert!(unknown.error.is_some());

    assert!(Formula::parse("(arv").is_err());
}

/// Unit tests for visibility and pipeline rules
#[test]
fn test_investor_sees_only_offers() {
    let agent = Uuid::new_v4();
    let investor = Uuid::new_v4();

    for status in DealStatus::all() {
        let visible = can_view_deal(investor, Role::Investor, &deal(agent, status, None));
        assert_eq!(visible, status == DealStatus::Offer, "{}", status);
    }
}

#[test]
fn test_pipeline_edges() {
    use DealStatus::*;
    let legal = [
        (Submitted, Underwriting),
        (Underwriting, Offer),
        (Offer, Closed),
        (Submitted, Rejected),
        (Underwriting, Rejected),
        (Offer, Rejected),
    ];

    for from in DealStatus::all() {
        for to in DealStatus::all() {
            assert_eq!(
                from.can_transition_to(to),
                legal.contains(&(from, to)),
                "{} -> {}",
                from,
                to
            );
        }
    }
}

#[test]
fn test_underwriter_transition_rules() {
    let agent = Uuid::new_v4();
    let uw = Uuid::new_v4();
    let other = Uuid::new_v4();

    let queued = deal(agent, DealStatus::Submitted, None);
    assert!(can_transition_deal(uw, Role::Underwriter, &queued, DealStatus::Underwriting));

    let taken = deal(agent, DealStatus::Underwriting, Some(other));
    assert!(!can_transition_deal(uw, Role::Underwriter, &taken, DealStatus::Offer));
    assert!(can_transition_deal(other, Role::Underwriter, &taken, DealStatus::Offer));
    assert!(!can_transition_deal(agent, Role::Agent, &taken, DealStatus::Rejected));
}

#[test]
fn test_scope_filter_overrides_caller() {
    let actor = Uuid::new_v4();
    let requested = DealFilter {
        agent_id: Some(Uuid::new_v4()),
        status: Some(DealStatus::Submitted),
        ..Default::default()
    };

    let agent = scope_filter(actor, Role::Agent, requested.clone());
    assert_eq!(agent.agent_id, Some(actor));

    let investor = scope_filter(actor, Role::Investor, requested.clone());
    assert_eq!(investor.status, Some(DealStatus::Offer));

    let admin = scope_filter(actor, Role::Admin, requested);
    assert_eq!(admin.status, Some(DealStatus::Submitted));
    assert!(admin.underwriter_scope.is_none());
}

#[test]
fn test_channel_names() {
    let id = Uuid::new_v4();
    let channel = Channel::Deal(id);
    assert_eq!(Channel::parse(&channel.to_string()), Some(channel));
    assert_eq!(Channel::parse("market:abc"), None);
}
