use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Error types for underwriting calculations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum UnderwritingError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for underwriting calculations
pub type UnderwritingResultOf<T> = Result<T, UnderwritingError>;

/// Largest money amount accepted as an input (one trillion)
const MAX_AMOUNT: i64 = 1_000_000_000_000;

/// Longest holding period accepted, in months
const MAX_HOLDING_MONTHS: i64 = 600;

/// Decimal places kept for money inputs
const MONEY_DP: u32 = 2;

/// Decimal places kept for months and percents
const RATE_DP: u32 = 4;

/// Names every formula may reference, in the order they are documented
pub const VARIABLE_NAMES: [&str; 16] = [
    "arv",
    "repair_costs",
    "holding_months",
    "monthly_holding_cost",
    "buying_closing_costs",
    "selling_closing_costs",
    "target_profit_percent",
    "buy_box_percent",
    "purchase_price",
    "holding_costs",
    "closing_costs",
    "total_investment",
    "mao",
    "seventy_rule_offer",
    "buy_box_offer",
    "profit",
];

fn default_target_profit_percent() -> Decimal {
    Decimal::new(20, 0)
}

fn default_buy_box_percent() -> Decimal {
    Decimal::new(70, 0)
}

/// Numeric inputs to an underwriting evaluation.
///
/// Percent fields are whole percents: `20` means 20%.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnderwritingInputs {
    pub arv: Decimal,
    pub repair_costs: Decimal,
    #[serde(default)]
    pub holding_months: Decimal,
    #[serde(default)]
    pub monthly_holding_cost: Decimal,
    #[serde(default)]
    pub buying_closing_costs: Decimal,
    #[serde(default)]
    pub selling_closing_costs: Decimal,
    #[serde(default = "default_target_profit_percent")]
    pub target_profit_percent: Decimal,
    #[serde(default = "default_buy_box_percent")]
    pub buy_box_percent: Decimal,
    /// Actual or proposed purchase price; the MAO is used when absent
    #[serde(default)]
    pub purchase_price: Option<Decimal>,
}

impl UnderwritingInputs {
    /// Inputs with only ARV and repairs set and every other field at its default
    pub fn new(arv: Decimal, repair_costs: Decimal) -> Self {
        Self {
            arv,
            repair_costs,
            holding_months: Decimal::ZERO,
            monthly_holding_cost: Decimal::ZERO,
            buying_closing_costs: Decimal::ZERO,
            selling_closing_costs: Decimal::ZERO,
            target_profit_percent: default_target_profit_percent(),
            buy_box_percent: default_buy_box_percent(),
            purchase_price: None,
        }
    }

    /// Check every field is non-negative and within range
    pub fn validate(&self) -> UnderwritingResultOf<()> {
        let max_amount = Decimal::from(MAX_AMOUNT);
        let amounts = [
            ("arv", Some(self.arv)),
            ("repair_costs", Some(self.repair_costs)),
            ("monthly_holding_cost", Some(self.monthly_holding_cost)),
            ("buying_closing_costs", Some(self.buying_closing_costs)),
            ("selling_closing_costs", Some(self.selling_closing_costs)),
            ("purchase_price", self.purchase_price),
        ];

        for (name, value) in amounts {
            if let Some(value) = value {
                if value.is_sign_negative() && !value.is_zero() {
                    return Err(UnderwritingError::InvalidInput(format!(
                        "{} must not be negative",
                        name
                    )));
                }
                if value > max_amount {
                    return Err(UnderwritingError::InvalidInput(format!(
                        "{} exceeds the maximum of {}",
                        name, max_amount
                    )));
                }
                check_places(name, value, MONEY_DP)?;
            }
        }

        if self.holding_months < Decimal::ZERO
            || self.holding_months > Decimal::from(MAX_HOLDING_MONTHS)
        {
            return Err(UnderwritingError::InvalidInput(format!(
                "holding_months must be between 0 and {}",
                MAX_HOLDING_MONTHS
            )));
        }

        check_places("holding_months", self.holding_months, RATE_DP)?;

        for (name, value) in [
            ("target_profit_percent", self.target_profit_percent),
            ("buy_box_percent", self.buy_box_percent),
        ] {
            if value < Decimal::ZERO || value > Decimal::ONE_HUNDRED {
                return Err(UnderwritingError::InvalidInput(format!(
                    "{} must be between 0 and 100",
                    name
                )));
            }
            check_places(name, value, RATE_DP)?;
        }

        Ok(())
    }

    pub fn holding_costs(&self) -> Decimal {
        self.holding_months * self.monthly_holding_cost
    }

    pub fn closing_costs(&self) -> Decimal {
        self.buying_closing_costs + self.selling_closing_costs
    }
}

/// Profit figures for a given total investment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfitAndRoi {
    pub profit: Decimal,
    pub profit_margin_percent: Decimal,
    pub roi_percent: Decimal,
}

/// Every figure produced by an underwriting evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnderwritingResult {
    pub holding_costs: Decimal,
    pub closing_costs: Decimal,
    pub max_allowable_offer: Decimal,
    pub seventy_rule_offer: Decimal,
    pub buy_box_offer: Decimal,
    pub purchase_price: Decimal,
    pub total_investment: Decimal,
    pub profit: Decimal,
    pub profit_margin_percent: Decimal,
    pub roi_percent: Decimal,
}

fn check_places(name: &str, value: Decimal, places: u32) -> UnderwritingResultOf<()> {
    if value.normalize().scale() > places {
        return Err(UnderwritingError::InvalidInput(format!(
            "{} has more than {} decimal places",
            name, places
        )));
    }
    Ok(())
}

fn overflow(figure: &str) -> UnderwritingError {
    UnderwritingError::InvalidInput(format!("{} is out of range for these inputs", figure))
}

/// `numerator / denominator × 100`, or 0% over a zero denominator
fn ratio_percent(
    figure: &str,
    numerator: Decimal,
    denominator: Decimal,
) -> UnderwritingResultOf<Decimal> {
    if denominator.is_zero() {
        return Ok(Decimal::ZERO);
    }
    numerator
        .checked_div(denominator)
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
        .ok_or_else(|| overflow(figure))
}

fn floor_at_zero(value: Decimal) -> Decimal {
    value.max(Decimal::ZERO)
}

fn percent(value: Decimal) -> Decimal {
    value / Decimal::ONE_HUNDRED
}

/// Maximum Allowable Offer.
///
/// ARV × (1 − target profit) − repairs − holding − closing, never below zero.
pub fn max_allowable_offer(inputs: &UnderwritingInputs) -> Decimal {
    let retained = inputs.arv * (Decimal::ONE - percent(inputs.target_profit_percent));
    floor_at_zero(
        retained - inputs.repair_costs - inputs.holding_costs() - inputs.closing_costs(),
    )
}

/// 70% rule: ARV × 0.7 − repairs, never below zero
pub fn seventy_percent_rule(arv: Decimal, repair_costs: Decimal) -> Decimal {
    floor_at_zero(arv * Decimal::new(7, 1) - repair_costs)
}

/// Buy-box offer: ARV × buy-box percent − rehab, never below zero
pub fn buy_box_offer(arv: Decimal, buy_box_percent: Decimal, rehab_cost: Decimal) -> Decimal {
    floor_at_zero(arv * percent(buy_box_percent) - rehab_cost)
}

/// Profit over ARV and over total investment. A zero denominator yields 0%.
pub fn profit_and_roi(
    arv: Decimal,
    total_investment: Decimal,
) -> UnderwritingResultOf<ProfitAndRoi> {
    let profit = arv
        .checked_sub(total_investment)
        .ok_or_else(|| overflow("profit"))?;

    Ok(ProfitAndRoi {
        profit,
        profit_margin_percent: ratio_percent("profit_margin_percent", profit, arv)?,
        roi_percent: ratio_percent("roi_percent", profit, total_investment)?,
    })
}

/// Run every formula over validated inputs. Outputs are rounded to two places.
pub fn evaluate(inputs: &UnderwritingInputs) -> UnderwritingResultOf<UnderwritingResult> {
    inputs.validate()?;

    let holding_costs = inputs.holding_costs();
    let closing_costs = inputs.closing_costs();
    let mao = max_allowable_offer(inputs);
    let purchase_price = inputs.purchase_price.unwrap_or(mao);
    let total_investment = [inputs.repair_costs, holding_costs, closing_costs]
        .into_iter()
        .try_fold(purchase_price, |sum, cost| sum.checked_add(cost))
        .ok_or_else(|| overflow("total_investment"))?;
    let returns = profit_and_roi(inputs.arv, total_investment)?;

    Ok(UnderwritingResult {
        holding_costs: holding_costs.round_dp(2),
        closing_costs: closing_costs.round_dp(2),
        max_allowable_offer: mao.round_dp(2),
        seventy_rule_offer: seventy_percent_rule(inputs.arv, inputs.repair_costs).round_dp(2),
        buy_box_offer: buy_box_offer(inputs.arv, inputs.buy_box_percent, inputs.repair_costs)
            .round_dp(2),
        purchase_price: purchase_price.round_dp(2),
        total_investment: total_investment.round_dp(2),
        profit: returns.profit.round_dp(2),
        profit_margin_percent: returns.profit_margin_percent.round_dp(2),
        roi_percent: returns.roi_percent.round_dp(2),
    })
}

impl UnderwritingResult {
    /// Variable bindings for custom formulas
    pub fn variables(&self, inputs: &UnderwritingInputs) -> HashMap<String, Decimal> {
        let pairs = [
            ("arv", inputs.arv),
            ("repair_costs", inputs.repair_costs),
            ("holding_months", inputs.holding_months),
            ("monthly_holding_cost", inputs.monthly_holding_cost),
            ("buying_closing_costs", inputs.buying_closing_costs),
            ("selling_closing_costs", inputs.selling_closing_costs),
            ("target_profit_percent", inputs.target_profit_percent),
            ("buy_box_percent", inputs.buy_box_percent),
            ("purchase_price", self.purchase_price),
            ("holding_costs", self.holding_costs),
            ("closing_costs", self.closing_costs),
            ("total_investment", self.total_investment),
            ("mao", self.max_allowable_offer),
            ("seventy_rule_offer", self.seventy_rule_offer),
            ("buy_box_offer", self.buy_box_offer),
            ("profit", self.profit),
        ];

        pairs
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(value: i64) -> Decimal {
        Decimal::from(value)
    }

    fn worked_example() -> UnderwritingInputs {
        UnderwritingInputs {
            arv: d(300_000),
            repair_costs: d(20_000),
            holding_months: d(6),
            monthly_holding_cost: d(1_500),
            buying_closing_costs: d(3_000),
            selling_closing_costs: d(2_000),
            target_profit_percent: d(20),
            buy_box_percent: d(65),
            purchase_price: None,
        }
    }

    #[test]
    fn test_mao_worked_example() {
        // 300000 × 0.8 − 20000 − 9000 − 5000
        assert_eq!(max_allowable_offer(&worked_example()), d(206_000));
    }

    #[test]
    fn test_mao_floors_at_zero() {
        let mut inputs = worked_example();
        inputs.repair_costs = d(500_000);
        assert_eq!(max_allowable_offer(&inputs), Decimal::ZERO);
    }

    #[test]
    fn test_seventy_percent_rule() {
        assert_eq!(seventy_percent_rule(d(300_000), d(20_000)), d(190_000));
        assert_eq!(seventy_percent_rule(d(100_000), d(90_000)), Decimal::ZERO);
    }

    #[test]
    fn test_buy_box_offer() {
        assert_eq!(buy_box_offer(d(300_000), d(65), d(20_000)), d(175_000));
        assert_eq!(buy_box_offer(d(10_000), d(50), d(20_000)), Decimal::ZERO);
    }

    #[test]
    fn test_profit_and_roi() {
        let returns = profit_and_roi(d(300_000), d(240_000)).unwrap();
        assert_eq!(returns.profit, d(60_000));
        assert_eq!(returns.profit_margin_percent, d(20));
        assert_eq!(returns.roi_percent, d(25));
    }

    #[test]
    fn test_profit_and_roi_zero_denominators() {
        let returns = profit_and_roi(Decimal::ZERO, Decimal::ZERO).unwrap();
        assert_eq!(returns.profit, Decimal::ZERO);
        assert_eq!(returns.profit_margin_percent, Decimal::ZERO);
        assert_eq!(returns.roi_percent, Decimal::ZERO);
    }

    #[test]
    fn test_negative_profit_is_kept() {
        let returns = profit_and_roi(d(100_000), d(125_000)).unwrap();
        assert_eq!(returns.profit, d(-25_000));
        assert_eq!(returns.roi_percent, d(-20));
    }

    #[test]
    fn test_evaluate_defaults_purchase_to_mao() {
        let result = evaluate(&worked_example()).unwrap();
        assert_eq!(result.max_allowable_offer, d(206_000));
        assert_eq!(result.purchase_price, d(206_000));
        assert_eq!(result.holding_costs, d(9_000));
        assert_eq!(result.closing_costs, d(5_000));
        assert_eq!(result.total_investment, d(240_000));
        assert_eq!(result.profit, d(60_000));
        assert_eq!(result.profit_margin_percent, d(20));
        assert_eq!(result.roi_percent, d(25));
    }

    #[test]
    fn test_evaluate_with_purchase_price() {
        let mut inputs = worked_example();
        inputs.purchase_price = Some(d(180_000));
        let result = evaluate(&inputs).unwrap();
        assert_eq!(result.total_investment, d(214_000));
        assert_eq!(result.profit, d(86_000));
        // 86000 / 214000 = 40.186...%
        assert_eq!(result.roi_percent, Decimal::new(4019, 2));
    }

    #[test]
    fn test_evaluate_rejects_negative_input() {
        let mut inputs = worked_example();
        inputs.repair_costs = d(-1);
        assert!(matches!(
            evaluate(&inputs),
            Err(UnderwritingError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_evaluate_rejects_percent_out_of_range() {
        let mut inputs = worked_example();
        inputs.target_profit_percent = d(120);
        assert!(evaluate(&inputs).is_err());

        let mut inputs = worked_example();
        inputs.buy_box_percent = d(-5);
        assert!(evaluate(&inputs).is_err());
    }

    #[test]
    fn test_evaluate_rejects_sub_cent_amounts() {
        let mut inputs = UnderwritingInputs::new(d(999_999_999_999), Decimal::ZERO);
        inputs.target_profit_percent = d(100);
        inputs.purchase_price = Some(Decimal::new(1, 28));
        assert!(matches!(
            inputs.validate(),
            Err(UnderwritingError::InvalidInput(_))
        ));
        assert!(evaluate(&inputs).is_err());

        // trailing zeros are not extra precision
        let mut inputs = worked_example();
        inputs.repair_costs = Decimal::new(2_000_000_000, 5);
        assert!(evaluate(&inputs).is_ok());

        let mut inputs = worked_example();
        inputs.holding_months = Decimal::new(612_345, 5);
        assert!(evaluate(&inputs).is_err());
    }

    #[test]
    fn test_smallest_investment_stays_in_range() {
        let mut inputs = UnderwritingInputs::new(d(1_000_000_000_000), Decimal::ZERO);
        inputs.target_profit_percent = d(100);
        inputs.purchase_price = Some(Decimal::new(1, 2));
        let result = evaluate(&inputs).unwrap();
        assert_eq!(result.total_investment, Decimal::new(1, 2));
        assert!(result.roi_percent > d(1_000_000_000_000));
    }

    #[test]
    fn test_ratio_overflow_is_an_error() {
        let tiny = Decimal::new(1, 28);
        assert!(matches!(
            profit_and_roi(Decimal::MAX, tiny),
            Err(UnderwritingError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_inputs_deserialize_with_defaults() {
        let inputs: UnderwritingInputs =
            serde_json::from_str(r#"{"arv": "250000", "repair_costs": "30000"}"#).unwrap();
        assert_eq!(inputs, UnderwritingInputs::new(d(250_000), d(30_000)));
    }

    #[test]
    fn test_variables_cover_every_documented_name() {
        let inputs = worked_example();
        let result = evaluate(&inputs).unwrap();
        let vars = result.variables(&inputs);
        for name in VARIABLE_NAMES {
            assert!(vars.contains_key(name), "missing variable {}", name);
        }
        assert_eq!(vars.len(), VARIABLE_NAMES.len());
        assert_eq!(vars["mao"], d(206_000));
    }
}
